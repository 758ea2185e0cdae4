use std::path::Path;

use anyhow::{Context, Result};

use crate::db::CaseDb;

/// Open a case database, creating parent directories as needed.
pub fn open_case_db(path: &Path) -> Result<CaseDb> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    CaseDb::open(path)
        .with_context(|| format!("Failed to open case database at {}", path.display()))
}
