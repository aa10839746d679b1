pub mod models;
pub mod queries;
pub mod repo;
pub mod schema;
pub mod tagging;
mod tags;

pub use models::{Association, AssociationId, FileId, FileRecord, NewFile, TagId, TagRecord};
pub use repo::Store;
pub use tagging::{TaggingOperation, TaggingReport, TaggingState};
