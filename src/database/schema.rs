pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY,
        fingerprint TEXT NOT NULL CHECK (length(fingerprint) = 64),
        name TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_files_fingerprint ON files(fingerprint);
    CREATE INDEX IF NOT EXISTS idx_files_name ON files(name);

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY,
        name TEXT UNIQUE NOT NULL
    );

    CREATE TABLE IF NOT EXISTS file_tags (
        id INTEGER PRIMARY KEY,
        file_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        FOREIGN KEY(file_id) REFERENCES files(id),
        FOREIGN KEY(tag_id) REFERENCES tags(id),
        UNIQUE(file_id, tag_id)
    );

    CREATE INDEX IF NOT EXISTS idx_file_tags_file ON file_tags(file_id);
    CREATE INDEX IF NOT EXISTS idx_file_tags_tag ON file_tags(tag_id);
";
