use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

use crate::analysis::{ArtifactOutcome, ArtifactReport};
use crate::db::{ArtifactRecord, ArtifactStatus, MappingRecord, StoredArtifact};
use crate::model::Provenance;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Error type for case database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },

    /// A stored provenance string this build does not recognize.
    #[error("Unknown provenance {0:?} in case database")]
    UnknownProvenance(String),
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

/// SQLite-backed history of classification runs.
///
/// Thin wrapper around `rusqlite::Connection` responsible for:
/// - Opening/creating the DB file.
/// - Applying schema migrations.
/// - Recording artifact outcomes and reading them back.
#[derive(Debug)]
pub struct CaseDb {
    conn: Connection,
}

impl CaseDb {
    /// Open (or create) a case database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert an artifact row and return its id.
    pub fn insert_artifact(&self, record: &ArtifactRecord) -> DbResult<i64> {
        insert_artifact_row(&self.conn, record)
    }

    /// Insert the mapping verdicts of one artifact in a single transaction.
    pub fn insert_mappings(&self, artifact_id: i64, mappings: &[MappingRecord]) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_mapping_rows(&tx, artifact_id, mappings)?;
        tx.commit()?;
        Ok(())
    }

    /// Store a successful report with all of its verdicts.
    ///
    /// The artifact row and its mappings commit together or not at all.
    pub fn record_report(&self, report: &ArtifactReport, exe_hash: Option<&str>) -> DbResult<i64> {
        let record = ArtifactRecord {
            exe_path: report.exe_path.to_string_lossy().to_string(),
            core_path: report.core_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            exe_hash: exe_hash.map(str::to_string),
            status: ArtifactStatus::Classified,
            error: None,
            dlopen_capable: Some(report.dlopen_capable),
            analyzed_at: report.analyzed_at.clone(),
        };
        let mappings: Vec<MappingRecord> = report
            .libraries
            .iter()
            .map(|lib| MappingRecord {
                path: lib.path.to_string_lossy().to_string(),
                provenance: lib.provenance,
                literal_reference: lib.literal_reference,
            })
            .collect();

        let tx = self.conn.unchecked_transaction()?;
        let id = insert_artifact_row(&tx, &record)?;
        insert_mapping_rows(&tx, id, &mappings)?;
        tx.commit()?;
        Ok(id)
    }

    /// Store any batch outcome; failures keep their error text and no mappings.
    pub fn record_outcome(
        &self,
        outcome: &ArtifactOutcome,
        exe_hash: Option<&str>,
        analyzed_at: &str,
    ) -> DbResult<i64> {
        match outcome {
            ArtifactOutcome::Classified(report) => self.record_report(report, exe_hash),
            ArtifactOutcome::Failed { exe_path, core_path, error } => {
                self.insert_artifact(&ArtifactRecord {
                    exe_path: exe_path.to_string_lossy().to_string(),
                    core_path: core_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                    exe_hash: exe_hash.map(str::to_string),
                    status: ArtifactStatus::Failed,
                    error: Some(error.clone()),
                    dlopen_capable: None,
                    analyzed_at: analyzed_at.to_string(),
                })
            }
        }
    }

    /// List artifacts (ordered by id), optionally filtered by executable path.
    pub fn list_artifacts(&self, exe_path: Option<&str>) -> DbResult<Vec<StoredArtifact>> {
        fn map_artifact(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredArtifact> {
            let status: String = row.get(4)?;
            Ok(StoredArtifact {
                id: row.get(0)?,
                record: ArtifactRecord {
                    exe_path: row.get(1)?,
                    core_path: row.get(2)?,
                    exe_hash: row.get(3)?,
                    status: ArtifactStatus::from_db(&status),
                    error: row.get(5)?,
                    analyzed_at: row.get(6)?,
                    dlopen_capable: row.get(7)?,
                },
            })
        }

        let mut stmt = if exe_path.is_some() {
            self.conn.prepare(
                r#"
                SELECT id, exe_path, core_path, exe_hash, status, error, analyzed_at, dlopen_capable
                FROM artifacts
                WHERE exe_path = ?1
                ORDER BY id
                "#,
            )?
        } else {
            self.conn.prepare(
                r#"
                SELECT id, exe_path, core_path, exe_hash, status, error, analyzed_at, dlopen_capable
                FROM artifacts
                ORDER BY id
                "#,
            )?
        };

        let rows = if let Some(exe) = exe_path {
            stmt.query_map(params![exe], map_artifact)?
        } else {
            stmt.query_map([], map_artifact)?
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Mapping verdicts of one artifact in their original order.
    pub fn list_mappings(&self, artifact_id: i64) -> DbResult<Vec<MappingRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT path, provenance, literal_reference
            FROM mappings
            WHERE artifact_id = ?1
            ORDER BY idx
            "#,
        )?;
        let rows = stmt.query_map(params![artifact_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<bool>>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (path, provenance, literal_reference) = row?;
            let provenance =
                Provenance::parse(&provenance).ok_or(DbError::UnknownProvenance(provenance))?;
            out.push(MappingRecord { path, provenance, literal_reference });
        }
        Ok(out)
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: artifacts and mappings
/// - 2: add artifacts.dlopen_capable
fn insert_artifact_row(conn: &Connection, record: &ArtifactRecord) -> DbResult<i64> {
    conn.execute(
        r#"
        INSERT INTO artifacts
            (exe_path, core_path, exe_hash, status, error, analyzed_at, dlopen_capable)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            record.exe_path,
            record.core_path,
            record.exe_hash,
            record.status.as_str(),
            record.error,
            record.analyzed_at,
            record.dlopen_capable
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_mapping_rows(
    conn: &Connection,
    artifact_id: i64,
    mappings: &[MappingRecord],
) -> DbResult<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO mappings (artifact_id, idx, path, provenance, literal_reference)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for (idx, mapping) in mappings.iter().enumerate() {
        stmt.execute(params![
            artifact_id,
            idx as i64,
            mapping.path,
            mapping.provenance.as_str(),
            mapping.literal_reference
        ])?;
    }
    Ok(())
}

fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS artifacts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                exe_path    TEXT NOT NULL,
                core_path   TEXT,
                exe_hash    TEXT,
                status      TEXT NOT NULL,
                error       TEXT,
                analyzed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS mappings (
                artifact_id       INTEGER NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
                idx               INTEGER NOT NULL,
                path              TEXT NOT NULL,
                provenance        TEXT NOT NULL,
                literal_reference INTEGER,
                PRIMARY KEY (artifact_id, idx)
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            ALTER TABLE artifacts ADD COLUMN dlopen_capable INTEGER;
            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
