use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::database::models::{Association, FileId, FileRecord, NewFile, TagId, TagRecord};
use crate::database::queries;
use crate::database::schema::SCHEMA;
use crate::database::tagging::{TaggingOperation, TaggingReport, TaggingState};
use crate::error::{StoreError, StoreResult};
use crate::ingest::hasher::Fingerprint;

/// How long a writer waits on another connection's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A tag store over one SQLite connection.
///
/// Concurrent callers each open their own `Store` on the same database file;
/// writes are serialized by SQLite's lock and the `tags.name` constraint.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        debug!(path = %path.display(), "opening tag store");
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Adopts an already open connection, enabling foreign keys and creating
    /// any missing tables.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Starts a write transaction that takes the database lock up front.
    /// Dropping it without `commit()` rolls back.
    pub(crate) fn begin_write(&mut self) -> StoreResult<Transaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(tx)
    }

    pub fn insert_file(&mut self, file: &NewFile) -> StoreResult<FileRecord> {
        let mut records = self.insert_files(std::slice::from_ref(file))?;
        records
            .pop()
            .ok_or_else(|| StoreError::NotFound("inserted file".to_string()))
    }

    /// Persists `files` as one batch: either every record is stored or none is.
    pub fn insert_files(&mut self, files: &[NewFile]) -> StoreResult<Vec<FileRecord>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.begin_write()?;
        let mut records = Vec::with_capacity(files.len());
        {
            let mut stmt =
                tx.prepare("INSERT INTO files (fingerprint, name) VALUES (?1, ?2) RETURNING id")?;
            for file in files {
                let id: i64 = stmt.query_row(
                    params![file.fingerprint().as_str(), file.name()],
                    |row| row.get(0),
                )?;
                records.push(FileRecord {
                    id: FileId(id),
                    fingerprint: file.fingerprint().clone(),
                    name: file.name().to_string(),
                });
            }
        }
        tx.commit()?;

        debug!(count = records.len(), "stored files");
        Ok(records)
    }

    /// Tags `file` with every name in `names`, creating the tags that do not
    /// exist yet. Calling it again with the same names changes nothing.
    ///
    /// If the tags were created but linking failed, the error is
    /// [`StoreError::PartialTagging`] and the call can simply be repeated.
    pub fn tag_file<I, S>(&mut self, file: &FileRecord, names: I) -> StoreResult<TaggingReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut op = TaggingOperation::new(file, names);
        match op.run(self) {
            Ok(report) => {
                info!(
                    file = %file.id,
                    created = report.created.len(),
                    linked = report.linked.len(),
                    "tagged file"
                );
                Ok(report)
            }
            Err(err) => match op.state() {
                TaggingState::Linking { created, .. } => Err(StoreError::PartialTagging {
                    file_id: file.id,
                    created: created.iter().map(|t| t.name.clone()).collect(),
                    source: Box::new(err),
                }),
                _ => Err(err),
            },
        }
    }

    pub fn get_file(&self, id: FileId) -> StoreResult<Option<FileRecord>> {
        queries::get_file(&self.conn, id)
    }

    pub fn find_files_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> StoreResult<Vec<FileRecord>> {
        queries::find_files_by_fingerprint(&self.conn, fingerprint)
    }

    pub fn find_tag(&self, name: &str) -> StoreResult<Option<TagRecord>> {
        queries::find_tag(&self.conn, name)
    }

    pub fn list_tags(&self) -> StoreResult<Vec<TagRecord>> {
        queries::list_tags(&self.conn)
    }

    pub fn tags_for_file(&self, file_id: FileId) -> StoreResult<Vec<TagRecord>> {
        queries::tags_for_file(&self.conn, file_id)
    }

    pub fn files_for_tag(&self, tag_id: TagId) -> StoreResult<Vec<FileRecord>> {
        queries::files_for_tag(&self.conn, tag_id)
    }

    pub fn files_for_tag_name(&self, name: &str) -> StoreResult<Vec<FileRecord>> {
        queries::files_for_tag_name(&self.conn, name)
    }

    pub fn associations_for_file(&self, file_id: FileId) -> StoreResult<Vec<Association>> {
        queries::associations_for_file(&self.conn, file_id)
    }
}
