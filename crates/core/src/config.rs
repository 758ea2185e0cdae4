use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::{ClassifyOptions, ProbeFailurePolicy};
use crate::model::DedupPolicy;

/// Serializable analysis configuration.
///
/// Every field has a default, so an empty document (or no file at all) is
/// equivalent to `AnalysisConfig::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Storage policy for dependencies reached along several graph edges.
    #[serde(default)]
    pub dedup: DedupPolicy,
    /// What to do when the executable cannot be probed for `dlopen`.
    #[serde(default)]
    pub on_probe_failure: ProbeFailurePolicy,
    /// Scan `.rodata` for library-name literals and attach the result to verdicts.
    #[serde(default)]
    pub corroborate_literals: bool,
    /// Library search settings for the default dependency walk.
    #[serde(default)]
    pub search: SearchConfig,
}

impl AnalysisConfig {
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            dedup: self.dedup,
            on_probe_failure: self.on_probe_failure,
            corroborate_literals: self.corroborate_literals,
        }
    }
}

/// Where the default dependency walk looks for shared objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Directories searched after `DT_RPATH` and before `DT_RUNPATH`.
    #[serde(default)]
    pub library_path: Vec<PathBuf>,
    /// Prepend the analyst's own `LD_LIBRARY_PATH` to `library_path`.
    #[serde(default)]
    pub use_ld_library_path_env: bool,
    /// Loader cache to consult; `null` disables it.
    #[serde(default = "default_ld_so_cache")]
    pub ld_so_cache: Option<PathBuf>,
    /// Override for the built-in system directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dirs: Option<Vec<PathBuf>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            library_path: Vec::new(),
            use_ld_library_path_env: false,
            ld_so_cache: default_ld_so_cache(),
            default_dirs: None,
        }
    }
}

fn default_ld_so_cache() -> Option<PathBuf> {
    Some(PathBuf::from("/etc/ld.so.cache"))
}
