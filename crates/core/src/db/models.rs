use serde::{Deserialize, Serialize};

use crate::model::Provenance;

/// Outcome stored for one artifact row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Classified,
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Classified => "classified",
            ArtifactStatus::Failed => "failed",
        }
    }

    /// Decode a stored status; unknown values read as `Failed`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "classified" => ArtifactStatus::Classified,
            _ => ArtifactStatus::Failed,
        }
    }
}

/// One classification attempt for an executable (and optionally its core).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub exe_path: String,
    pub core_path: Option<String>,
    /// SHA-256 of the executable at analysis time, when the caller computed one.
    pub exe_hash: Option<String>,
    pub status: ArtifactStatus,
    pub error: Option<String>,
    /// `None` for failed attempts where the probe never settled.
    pub dlopen_capable: Option<bool>,
    pub analyzed_at: String,
}

/// An artifact row as read back, with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub id: i64,
    #[serde(flatten)]
    pub record: ArtifactRecord,
}

/// One classified mapping of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub path: String,
    pub provenance: Provenance,
    pub literal_reference: Option<bool>,
}
