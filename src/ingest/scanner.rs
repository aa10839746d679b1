use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossbeam::channel::Sender;
use walkdir::{DirEntry, WalkDir};

/// Feeds every regular file under `root` into `tx`.
///
/// Dot-prefixed entries below `root` are pruned; `root` itself is always
/// walked, even when it is `.` or a hidden directory. Returns early once
/// every receiver has hung up.
pub fn scan_directory(root: &Path, tx: &Sender<PathBuf>) -> Result<()> {
    let entries = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if tx.send(entry.into_path()).is_err() {
            break;
        }
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::fs;

    #[test]
    fn test_scan_skips_hidden_entries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.txt"), b"a")?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("nested").join("b.txt"), b"b")?;
        fs::write(dir.path().join(".hidden"), b"h")?;
        fs::create_dir(dir.path().join(".git"))?;
        fs::write(dir.path().join(".git").join("HEAD"), b"ref")?;

        let (tx, rx) = unbounded();
        scan_directory(dir.path(), &tx)?;
        drop(tx);

        let mut names: Vec<String> = rx
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        Ok(())
    }

    #[test]
    fn test_scan_single_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("only.md");
        fs::write(&path, b"# hi")?;

        let (tx, rx) = unbounded();
        scan_directory(&path, &tx)?;
        drop(tx);

        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![path]);
        Ok(())
    }

    #[test]
    fn test_scan_stops_without_receiver() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for i in 0..3 {
            fs::write(dir.path().join(format!("{i}.txt")), b"x")?;
        }

        let (tx, rx) = unbounded();
        drop(rx);
        scan_directory(dir.path(), &tx)?;
        Ok(())
    }
}
