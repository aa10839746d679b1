//! Content-addressable file tagging on SQLite.
//!
//! Files are recorded by the SHA-256 of their content and linked to
//! uniquely named tags through a join table.

pub mod database;
pub mod error;
pub mod ingest;
pub mod utils;

pub use database::{FileId, FileRecord, NewFile, Store, TagId, TagRecord, TaggingReport};
pub use error::{StoreError, StoreResult};
pub use ingest::hasher::Fingerprint;
