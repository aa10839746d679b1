use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::info;

use crate::database::repo::Store;

const APP_DIR: &str = "tag-store";
const DB_FILE: &str = "db.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    pub fn open(&self) -> Result<Store> {
        let store = match self {
            DatabaseLocation::Memory => Store::open_in_memory()?,
            DatabaseLocation::File(path) => Store::open(path)?,
        };
        Ok(store)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: DatabaseLocation,
    pub debug: bool,
    pub testing: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves settings through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let testing = lookup("TESTING").is_some() || lookup("TAG_STORE_TESTING").is_some();
        let debug = lookup("DEBUG").map(|v| is_truthy(&v)).unwrap_or(testing);

        let database = if testing {
            DatabaseLocation::Memory
        } else if let Some(path) = lookup("TAG_STORE_DB").filter(|p| !p.is_empty()) {
            DatabaseLocation::File(PathBuf::from(path))
        } else {
            DatabaseLocation::File(data_home(&lookup)?.join(APP_DIR).join(DB_FILE))
        };

        Ok(Self {
            database,
            debug,
            testing,
        })
    }

    /// An explicit path (e.g. from the command line) wins over the environment.
    pub fn with_database_path(mut self, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            self.database = DatabaseLocation::File(path.to_path_buf());
        }
        self
    }

    pub fn open_store(&self) -> Result<Store> {
        match &self.database {
            DatabaseLocation::Memory => info!("Using in-memory database"),
            DatabaseLocation::File(path) => info!("Using database at {:?}", path),
        }
        self.database.open()
    }
}

fn data_home<F>(lookup: &F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("XDG_DATA_HOME").filter(|d| !d.is_empty()) {
        return Ok(expand_home(&dir, lookup));
    }
    lookup("HOME")
        .map(|home| PathBuf::from(home).join(".local").join("share"))
        .ok_or_else(|| anyhow!("Neither XDG_DATA_HOME nor HOME is set"))
}

fn expand_home<F>(dir: &str, lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match (dir.strip_prefix("~/"), lookup("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(dir),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_testing_uses_memory_and_debug() -> Result<()> {
        let s = settings(&[("TESTING", ""), ("XDG_DATA_HOME", "/data")])?;
        assert_eq!(s.database, DatabaseLocation::Memory);
        assert!(s.debug);
        assert!(s.testing);
        Ok(())
    }

    #[test]
    fn test_debug_can_be_disabled_while_testing() -> Result<()> {
        let s = settings(&[("TAG_STORE_TESTING", "1"), ("DEBUG", "0")])?;
        assert!(!s.debug);
        Ok(())
    }

    #[test]
    fn test_xdg_data_home_location() -> Result<()> {
        let s = settings(&[("XDG_DATA_HOME", "~/data"), ("HOME", "/home/me")])?;
        assert_eq!(
            s.database,
            DatabaseLocation::File(PathBuf::from("/home/me/data/tag-store/db.sqlite3"))
        );
        assert!(!s.debug);
        Ok(())
    }

    #[test]
    fn test_home_fallback_and_explicit_path() -> Result<()> {
        let s = settings(&[("HOME", "/home/me"), ("DEBUG", "yes")])?;
        assert_eq!(
            s.database,
            DatabaseLocation::File(PathBuf::from("/home/me/.local/share/tag-store/db.sqlite3"))
        );
        assert!(s.debug);

        let s = settings(&[("HOME", "/home/me"), ("TAG_STORE_DB", "/tmp/t.db")])?;
        assert_eq!(s.database, DatabaseLocation::File(PathBuf::from("/tmp/t.db")));

        let s = s.with_database_path(Some(Path::new("/srv/tags.db")));
        assert_eq!(s.database, DatabaseLocation::File(PathBuf::from("/srv/tags.db")));
        Ok(())
    }

    #[test]
    fn test_missing_home_is_an_error() {
        assert!(settings(&[]).is_err());
    }

    #[test]
    fn test_open_file_store_creates_parents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join(DB_FILE);
        DatabaseLocation::File(path.clone()).open()?;
        assert!(path.exists());
        Ok(())
    }
}
