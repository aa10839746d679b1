use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::StoreResult;
use crate::ingest::hasher::{self, Fingerprint};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(FileId);
id_type!(TagId);
id_type!(AssociationId);

/// A file that has been fingerprinted but not stored yet.
///
/// The fingerprint always comes from hashing the content; there is no way to
/// hand one in.
///
/// ```compile_fail
/// use std::path::Path;
/// use tag_store::{Fingerprint, NewFile};
///
/// let fingerprint = Fingerprint::from_hex(&"a".repeat(64)).unwrap();
/// let file = NewFile::from_fingerprint(Path::new("bogus.txt"), fingerprint);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    fingerprint: Fingerprint,
    name: String,
}

impl NewFile {
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            fingerprint: Fingerprint::of(bytes),
            name: name.into(),
        }
    }

    /// Hashes the file at `path` and names the record after its last component.
    pub fn from_path(path: &Path) -> StoreResult<Self> {
        let fingerprint = hasher::calculate_hash(path)?;
        Ok(Self::from_fingerprint(path, fingerprint))
    }

    fn from_fingerprint(path: &Path, fingerprint: Fingerprint) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { fingerprint, name }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: FileId,
    pub fingerprint: Fingerprint,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
}

/// One file↔tag link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Association {
    pub id: AssociationId,
    pub file_id: FileId,
    pub tag_id: TagId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repo::Store;
    use crate::ingest::hasher::EMPTY_FINGERPRINT;
    use std::fs;

    #[test]
    fn test_new_file_from_empty_bytes() {
        let file = NewFile::from_bytes("README.md", b"");
        assert_eq!(file.fingerprint().as_str(), EMPTY_FINGERPRINT);
        assert_eq!(file.name(), "README.md");
    }

    #[test]
    fn test_new_file_from_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("README.md");
        fs::write(&path, b"")?;

        let file = NewFile::from_path(&path)?;
        assert_eq!(file.fingerprint().as_str(), EMPTY_FINGERPRINT);
        assert_eq!(file.name(), "README.md");
        Ok(())
    }

    #[test]
    fn test_stored_fingerprint_is_content_digest() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bogus.txt");
        fs::write(&path, b"real content")?;

        let mut store = Store::open_in_memory()?;
        let record = store.insert_file(&NewFile::from_path(&path)?)?;
        assert_eq!(record.fingerprint, Fingerprint::of(b"real content"));
        assert_eq!(
            store.get_file(record.id)?.map(|f| f.fingerprint),
            Some(hasher::calculate_hash(&path)?)
        );
        Ok(())
    }

    #[test]
    fn test_same_content_same_fingerprint() {
        let a = NewFile::from_bytes("a.txt", b"same");
        let b = NewFile::from_bytes("b.txt", b"same");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a, b);
    }
}
