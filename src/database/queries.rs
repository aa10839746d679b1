//! Read-only traversal of the file↔tag graph.
//!
//! Every helper here is a plain query over `file_tags`; an empty result is a
//! valid answer, never an error.

use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::database::models::{
    Association, AssociationId, FileId, FileRecord, TagId, TagRecord,
};
use crate::error::StoreResult;
use crate::ingest::hasher::Fingerprint;

struct FileRow {
    id: i64,
    fingerprint: String,
    name: String,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            fingerprint: row.get(1)?,
            name: row.get(2)?,
        })
    }

    fn into_record(self) -> StoreResult<FileRecord> {
        Ok(FileRecord {
            id: FileId(self.id),
            fingerprint: Fingerprint::from_hex(&self.fingerprint)?,
            name: self.name,
        })
    }
}

pub(crate) fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<TagRecord> {
    Ok(TagRecord {
        id: TagId(row.get(0)?),
        name: row.get(1)?,
    })
}

fn collect_files(
    conn: &Connection,
    sql: &str,
    param: &dyn ToSql,
) -> StoreResult<Vec<FileRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![param], FileRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(FileRow::into_record).collect()
}

pub fn get_file(conn: &Connection, id: FileId) -> StoreResult<Option<FileRecord>> {
    let row = conn
        .query_row(
            "SELECT id, fingerprint, name FROM files WHERE id = ?1",
            params![id.0],
            FileRow::from_row,
        )
        .optional()?;
    row.map(FileRow::into_record).transpose()
}

pub fn find_files_by_fingerprint(
    conn: &Connection,
    fingerprint: &Fingerprint,
) -> StoreResult<Vec<FileRecord>> {
    collect_files(
        conn,
        "SELECT id, fingerprint, name FROM files WHERE fingerprint = ?1 ORDER BY id",
        &fingerprint.as_str(),
    )
}

pub fn find_tag(conn: &Connection, name: &str) -> StoreResult<Option<TagRecord>> {
    let tag = conn
        .query_row(
            "SELECT id, name FROM tags WHERE name = ?1",
            params![name],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

pub fn list_tags(conn: &Connection) -> StoreResult<Vec<TagRecord>> {
    let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY id")?;
    let tags = stmt
        .query_map([], tag_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

pub fn tags_for_file(conn: &Connection, file_id: FileId) -> StoreResult<Vec<TagRecord>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name FROM tags t
         JOIN file_tags ft ON t.id = ft.tag_id
         WHERE ft.file_id = ?1
         ORDER BY t.id",
    )?;
    let tags = stmt
        .query_map(params![file_id.0], tag_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

pub fn files_for_tag(conn: &Connection, tag_id: TagId) -> StoreResult<Vec<FileRecord>> {
    collect_files(
        conn,
        "SELECT f.id, f.fingerprint, f.name FROM files f
         JOIN file_tags ft ON f.id = ft.file_id
         WHERE ft.tag_id = ?1
         ORDER BY f.id",
        &tag_id.0,
    )
}

pub fn files_for_tag_name(conn: &Connection, name: &str) -> StoreResult<Vec<FileRecord>> {
    collect_files(
        conn,
        "SELECT f.id, f.fingerprint, f.name FROM files f
         JOIN file_tags ft ON f.id = ft.file_id
         JOIN tags t ON t.id = ft.tag_id
         WHERE t.name = ?1
         ORDER BY f.id",
        &name,
    )
}

pub fn associations_for_file(
    conn: &Connection,
    file_id: FileId,
) -> StoreResult<Vec<Association>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_id, tag_id FROM file_tags WHERE file_id = ?1 ORDER BY id",
    )?;
    let links = stmt
        .query_map(params![file_id.0], |row| {
            Ok(Association {
                id: AssociationId(row.get(0)?),
                file_id: FileId(row.get(1)?),
                tag_id: TagId(row.get(2)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(links)
}
