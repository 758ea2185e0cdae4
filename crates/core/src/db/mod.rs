//! Case database: persistent history of classification runs.
//!
//! - `CaseDb`: SQLite wrapper with `PRAGMA user_version` migrations.
//! - `ArtifactRecord` / `MappingRecord`: what a run stores per artifact and mapping.

mod case_db;
mod models;
mod util;

pub use case_db::{CaseDb, DbError, DbResult, CURRENT_SCHEMA_VERSION};
pub use models::{ArtifactRecord, ArtifactStatus, MappingRecord, StoredArtifact};
pub use util::open_case_db;
