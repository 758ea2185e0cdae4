pub mod commands;

use std::env;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use provenance_core::config::AnalysisConfig;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

/// Canonicalize a path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}

/// Parse a JSON or YAML document; `.json` selects JSON, anything else YAML.
pub fn load_structured<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read {what} at {}", path.display()))?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {what} JSON"))
    } else {
        serde_yaml::from_slice(&bytes).with_context(|| format!("Failed to parse {what} YAML"))
    }
}

/// Load the analysis config, or defaults when no file was given.
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => load_structured(path, "analysis config"),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Filter directive for a `-v` count; `None` defers to `RUST_LOG`.
pub fn verbosity_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Install the stderr subscriber. Repeated calls are ignored.
pub fn init_logging(verbose: u8) {
    let filter = match verbosity_directive(verbose) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
