//! Tagging a file: resolve the tag names, then link them.
//!
//! The two phases commit separately. A failure while linking leaves the
//! operation in [`TaggingState::Linking`]; running it again (or starting a
//! fresh operation with the same names) only writes what is still missing.

use std::collections::{BTreeSet, HashSet};

use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;
use tracing::debug;

use crate::database::models::{Association, AssociationId, FileId, FileRecord, TagId, TagRecord};
use crate::database::queries::{associations_for_file, get_file};
use crate::database::repo::Store;
use crate::database::tags::resolve_tags;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggingReport {
    pub file_id: FileId,
    /// Every requested tag, resolved to its stored record.
    pub tags: Vec<TagRecord>,
    /// Tags this operation inserted.
    pub created: Vec<TagRecord>,
    /// Links this operation inserted.
    pub linked: Vec<Association>,
    /// Tag inserts that raced another writer and reused its row.
    pub conflicts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggingState {
    Resolving,
    Linking {
        tags: Vec<TagRecord>,
        created: Vec<TagRecord>,
        conflicts: usize,
    },
    Complete(TaggingReport),
}

pub struct TaggingOperation {
    file_id: FileId,
    names: BTreeSet<String>,
    state: TaggingState,
}

impl TaggingOperation {
    /// Repeated names collapse; order does not matter.
    pub fn new<I, S>(file: &FileRecord, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_id: file.id,
            names: names.into_iter().map(Into::into).collect(),
            state: TaggingState::Resolving,
        }
    }

    pub fn state(&self) -> &TaggingState {
        &self.state
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Runs the current phase in its own transaction and advances on commit.
    /// On error the state is left unchanged.
    pub fn step(&mut self, store: &mut Store) -> StoreResult<()> {
        let next = match &self.state {
            TaggingState::Resolving => {
                let mut tx = store.begin_write()?;
                if get_file(&tx, self.file_id)?.is_none() {
                    return Err(StoreError::NotFound(format!("file {}", self.file_id)));
                }
                let resolution = resolve_tags(&mut tx, &self.names)?;
                tx.commit()?;

                debug!(
                    file = %self.file_id,
                    created = resolution.created.len(),
                    conflicts = resolution.conflicts,
                    "tags resolved"
                );
                TaggingState::Linking {
                    tags: resolution.tags,
                    created: resolution.created,
                    conflicts: resolution.conflicts,
                }
            }
            TaggingState::Linking {
                tags,
                created,
                conflicts,
            } => {
                let tx = store.begin_write()?;
                let linked = link_tags(&tx, self.file_id, tags)?;
                tx.commit()?;

                debug!(file = %self.file_id, linked = linked.len(), "tags linked");
                TaggingState::Complete(TaggingReport {
                    file_id: self.file_id,
                    tags: tags.clone(),
                    created: created.clone(),
                    linked,
                    conflicts: *conflicts,
                })
            }
            TaggingState::Complete(_) => return Ok(()),
        };
        self.state = next;
        Ok(())
    }

    /// Steps until complete. Safe to call again after an error.
    pub fn run(&mut self, store: &mut Store) -> StoreResult<TaggingReport> {
        loop {
            if let TaggingState::Complete(report) = &self.state {
                return Ok(report.clone());
            }
            self.step(store)?;
        }
    }
}

/// Inserts the `(file, tag)` links that do not exist yet.
fn link_tags(
    tx: &Transaction<'_>,
    file_id: FileId,
    tags: &[TagRecord],
) -> StoreResult<Vec<Association>> {
    let existing: HashSet<TagId> = associations_for_file(tx, file_id)?
        .into_iter()
        .map(|link| link.tag_id)
        .collect();

    let mut stmt = tx.prepare(
        "INSERT INTO file_tags (file_id, tag_id) VALUES (?1, ?2)
         ON CONFLICT(file_id, tag_id) DO NOTHING
         RETURNING id",
    )?;

    let mut linked = Vec::new();
    for tag in tags.iter().filter(|tag| !existing.contains(&tag.id)) {
        let id: Option<i64> = stmt
            .query_row(params![file_id.0, tag.id.0], |row| row.get(0))
            .optional()?;
        if let Some(id) = id {
            linked.push(Association {
                id: AssociationId(id),
                file_id,
                tag_id: tag.id,
            });
        }
    }
    Ok(linked)
}
