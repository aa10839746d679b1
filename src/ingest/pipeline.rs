use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use serde::Serialize;
use tracing::{error, info};

use crate::database::models::NewFile;
use crate::database::repo::Store;
use crate::error::StoreResult;
use crate::ingest::scanner;

const DEFAULT_BUFFER_LIMIT: usize = 1000;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub files: usize,
    pub tagged: usize,
    /// Files that could not be read plus stored files that could not be tagged.
    pub failed: usize,
}

/// Buffers fingerprinted files and stores them in batched transactions,
/// tagging each stored file with the same set of names.
pub struct IngestWriter<'a> {
    store: &'a mut Store,
    tags: Vec<String>,
    buffer: Vec<NewFile>,
    buffer_limit: usize,
    summary: IngestSummary,
}

impl<'a> IngestWriter<'a> {
    pub fn new(store: &'a mut Store, tags: Vec<String>) -> Self {
        Self::with_buffer_limit(store, tags, DEFAULT_BUFFER_LIMIT)
    }

    pub fn with_buffer_limit(store: &'a mut Store, tags: Vec<String>, buffer_limit: usize) -> Self {
        Self {
            store,
            tags,
            buffer: Vec::new(),
            buffer_limit: buffer_limit.max(1),
            summary: IngestSummary::default(),
        }
    }

    /// Takes one hashing outcome; unreadable files count as failed.
    pub fn accept(&mut self, hashed: StoreResult<NewFile>) -> Result<()> {
        match hashed {
            Ok(file) => self.add(file),
            Err(e) => {
                error!("Skipping unreadable file: {}", e);
                self.summary.failed += 1;
                Ok(())
            }
        }
    }

    pub fn add(&mut self, file: NewFile) -> Result<()> {
        self.buffer.push(file);
        if self.buffer.len() >= self.buffer_limit {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let records = self
            .store
            .insert_files(&self.buffer)
            .context("Failed to store file batch")?;
        self.buffer.clear();
        self.summary.files += records.len();

        if self.tags.is_empty() {
            return Ok(());
        }
        for record in &records {
            // One bad file must not abort the batch; retrying the tag call is safe.
            match self.store.tag_file(record, &self.tags) {
                Ok(_) => self.summary.tagged += 1,
                Err(e) => {
                    error!("Failed to tag {} ({}): {}", record.name, record.id, e);
                    self.summary.failed += 1;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<IngestSummary> {
        self.flush()?;
        Ok(self.summary)
    }
}

/// Walks `roots`, hashes files on `workers` threads and stores them through
/// an [`IngestWriter`] on the calling thread.
pub fn index_paths(
    store: &mut Store,
    roots: &[PathBuf],
    tags: Vec<String>,
    workers: usize,
) -> Result<IngestSummary> {
    let (scan_tx, scan_rx) = bounded::<PathBuf>(1024);
    let (hash_tx, hash_rx) = bounded::<StoreResult<NewFile>>(1024);

    thread::scope(|s| {
        s.spawn(move || {
            for root in roots {
                if let Err(e) = scanner::scan_directory(root, &scan_tx) {
                    error!("Scanner failed on {:?}: {}", root, e);
                }
            }
        });

        for _ in 0..workers.max(1) {
            let rx = scan_rx.clone();
            let tx = hash_tx.clone();
            s.spawn(move || hash_files(&rx, &tx));
        }
        // Workers hold their own clones; the channels close when they finish.
        drop(scan_rx);
        drop(hash_tx);

        let mut writer = IngestWriter::new(store, tags);
        for hashed in hash_rx {
            writer.accept(hashed)?;
        }
        let summary = writer.finish()?;
        info!(
            "Indexed {} file(s), tagged {}, failed {}",
            summary.files, summary.tagged, summary.failed
        );
        Ok(summary)
    })
}

/// Hashes every path from `rx`, forwarding failures as well as results.
fn hash_files(rx: &Receiver<PathBuf>, tx: &Sender<StoreResult<NewFile>>) {
    for path in rx {
        if tx.send(NewFile::from_path(&path)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::ingest::hasher::Fingerprint;
    use crossbeam::channel::unbounded;
    use std::fs;

    #[test]
    fn test_index_directory_with_tags() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.txt"), b"same")?;
        fs::write(dir.path().join("b.txt"), b"same")?;
        fs::create_dir(dir.path().join("docs"))?;
        fs::write(dir.path().join("docs").join("c.md"), b"# c")?;
        fs::write(dir.path().join(".secret"), b"skip me")?;

        let mut store = Store::open_in_memory()?;
        let summary = index_paths(
            &mut store,
            &[dir.path().to_path_buf()],
            vec!["inbox".to_string()],
            2,
        )?;

        assert_eq!(
            summary,
            IngestSummary {
                files: 3,
                tagged: 3,
                failed: 0
            }
        );
        assert_eq!(store.list_tags()?.len(), 1);
        assert_eq!(store.files_for_tag_name("inbox")?.len(), 3);
        assert_eq!(
            store
                .find_files_by_fingerprint(&Fingerprint::of(b"same"))?
                .len(),
            2
        );
        Ok(())
    }

    #[test]
    fn test_writer_flushes_in_batches() -> Result<()> {
        let mut store = Store::open_in_memory()?;
        let mut writer = IngestWriter::with_buffer_limit(&mut store, vec!["t".to_string()], 2);
        for i in 0..5u8 {
            writer.add(NewFile::from_bytes(format!("{i}.bin"), &[i]))?;
        }
        let summary = writer.finish()?;

        assert_eq!(summary.files, 5);
        assert_eq!(summary.tagged, 5);
        let tag = store.find_tag("t")?.expect("tag exists");
        assert_eq!(store.files_for_tag(tag.id)?.len(), 5);
        Ok(())
    }

    #[test]
    fn test_writer_without_tags_only_stores() -> Result<()> {
        let mut store = Store::open_in_memory()?;
        let mut writer = IngestWriter::new(&mut store, Vec::new());
        writer.add(NewFile::from_bytes("x", b"x"))?;
        let summary = writer.finish()?;

        assert_eq!(summary.files, 1);
        assert_eq!(summary.tagged, 0);
        assert!(store.list_tags()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_unreadable_files_count_as_failed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let readable = dir.path().join("ok.txt");
        fs::write(&readable, b"ok")?;
        let vanished = dir.path().join("gone.txt");

        let (path_tx, path_rx) = unbounded();
        let (hash_tx, hash_rx) = unbounded();
        path_tx.send(readable)?;
        path_tx.send(vanished)?;
        drop(path_tx);
        hash_files(&path_rx, &hash_tx);
        drop(hash_tx);

        let hashed: Vec<_> = hash_rx.iter().collect();
        assert!(matches!(hashed[1], Err(StoreError::Io { .. })));

        let mut store = Store::open_in_memory()?;
        let mut writer = IngestWriter::new(&mut store, vec!["inbox".to_string()]);
        for outcome in hashed {
            writer.accept(outcome)?;
        }
        let summary = writer.finish()?;

        assert_eq!(
            summary,
            IngestSummary {
                files: 1,
                tagged: 1,
                failed: 1
            }
        );
        assert_eq!(store.files_for_tag_name("inbox")?.len(), 1);
        Ok(())
    }
}
