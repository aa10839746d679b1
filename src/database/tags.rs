//! Resolve-or-create for tag names.

use std::collections::{BTreeSet, HashSet};

use rusqlite::{params, params_from_iter, Connection, Transaction};
use tracing::{debug, warn};

use crate::database::models::{TagId, TagRecord};
use crate::database::queries::{find_tag, tag_from_row};
use crate::error::{is_unique_violation, StoreError, StoreResult};

/// Upper bound on bound parameters per `IN (...)` query.
const MAX_PARAMS: usize = 500;

/// Outcome of resolving a set of tag names.
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    /// One record per requested name.
    pub tags: Vec<TagRecord>,
    /// The subset of `tags` this resolution inserted.
    pub created: Vec<TagRecord>,
    /// Inserts that lost a race and reused the winner's row.
    pub conflicts: usize,
}

pub(crate) fn find_tags_by_names(
    conn: &Connection,
    names: &BTreeSet<String>,
) -> StoreResult<Vec<TagRecord>> {
    let names: Vec<&String> = names.iter().collect();
    let mut found = Vec::with_capacity(names.len());

    for chunk in names.chunks(MAX_PARAMS) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT id, name FROM tags WHERE name IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), tag_from_row)?;
        for row in rows {
            found.push(row?);
        }
    }
    Ok(found)
}

/// Looks up `names` and inserts the ones that are missing, all inside `tx`.
pub(crate) fn resolve_tags(
    tx: &mut Transaction<'_>,
    names: &BTreeSet<String>,
) -> StoreResult<Resolution> {
    if names.is_empty() {
        return Ok(Resolution::default());
    }

    let existing = find_tags_by_names(tx, names)?;
    let known: HashSet<&str> = existing.iter().map(|t| t.name.as_str()).collect();
    let missing: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| !known.contains(name))
        .collect();

    debug!(
        requested = names.len(),
        existing = existing.len(),
        missing = missing.len(),
        "resolving tags"
    );

    let mut resolution = insert_tags(tx, &missing)?;
    resolution.tags.extend(existing);
    Ok(resolution)
}

/// Inserts each name without trusting any earlier existence check.
///
/// A name that turns out to exist already (another writer committed it since
/// we looked) is rolled back to its savepoint and re-fetched, so the caller
/// sees a resolved tag instead of a constraint violation.
pub(crate) fn insert_tags(tx: &mut Transaction<'_>, names: &[&str]) -> StoreResult<Resolution> {
    let mut resolution = Resolution::default();

    for &name in names {
        let sp = tx.savepoint()?;
        let inserted = sp.query_row(
            "INSERT INTO tags (name) VALUES (?1) RETURNING id",
            params![name],
            |row| row.get::<_, i64>(0),
        );

        match inserted {
            Ok(id) => {
                sp.commit()?;
                let tag = TagRecord {
                    id: TagId(id),
                    name: name.to_string(),
                };
                resolution.created.push(tag.clone());
                resolution.tags.push(tag);
            }
            Err(err) if is_unique_violation(&err) => {
                drop(sp);
                warn!(tag = name, "tag created by a concurrent writer, reusing it");
                let tag = find_tag(tx, name)?
                    .ok_or_else(|| StoreError::NotFound(format!("tag {name:?}")))?;
                resolution.conflicts += 1;
                resolution.tags.push(tag);
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(resolution)
}
