use anyhow::Result;
use clap::{Parser, Subcommand};
use so_provenance::commands::{
    batch_command, classify_command, deps_command, history_command, literals_command,
    probe_command,
};
use so_provenance::init_logging;

/// Classify the shared libraries mapped into a crashed process as linked,
/// dlopened, or injected.
///
/// This CLI is a thin wrapper around `provenance-core`. All substantive logic
/// lives in the library so it can be tested and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "so-provenance",
    version,
    about = "Shared-library provenance triage for process core images",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). Overrides RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify every shared-library mapping of one process artifact.
    ///
    /// Mappings come from the `NT_FILE` note of a core image (`--core`) or
    /// from a list of paths (`--maps`, JSON array or one path per line).
    Classify {
        /// Path to the original executable on disk.
        #[arg(long)]
        exe: String,

        /// Core image captured from the process.
        #[arg(long, conflicts_with = "maps")]
        core: Option<String>,

        /// File listing the mapped library paths.
        #[arg(long)]
        maps: Option<String>,

        /// Analysis config (JSON or YAML).
        #[arg(long)]
        config: Option<String>,

        /// Record the result in this case database.
        #[arg(long)]
        db: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Classify every artifact listed in a manifest.
    ///
    /// Exits non-zero when any artifact failed; other artifacts are still
    /// classified and reported.
    Batch {
        /// Manifest (JSON or YAML) listing `exe` plus `core` or `maps` per artifact.
        #[arg(long)]
        manifest: String,

        /// Analysis config (JSON or YAML).
        #[arg(long)]
        config: Option<String>,

        /// Record every outcome in this case database.
        #[arg(long)]
        db: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the dependency walk the loader would perform for an executable.
    Deps {
        #[arg(long)]
        exe: String,

        /// Only the executable's own DT_NEEDED entries.
        #[arg(long, default_value_t = false)]
        direct: bool,

        /// Analysis config (JSON or YAML).
        #[arg(long)]
        config: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Check whether an executable imports a dynamic symbol.
    Probe {
        #[arg(long)]
        exe: String,

        #[arg(long, default_value = "dlopen")]
        symbol: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List `.so` string literals in an executable's read-only data.
    Literals {
        #[arg(long)]
        exe: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List classification runs recorded in a case database.
    History {
        #[arg(long)]
        db: String,

        /// Only runs for this executable path.
        #[arg(long)]
        exe: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!("so-provenance using provenance-core v{}", provenance_core::version());

    match cli.command {
        Command::Classify { exe, core, maps, config, db, json } => classify_command(
            &exe,
            core.as_deref(),
            maps.as_deref(),
            config.as_deref(),
            db.as_deref(),
            json,
        )?,
        Command::Batch { manifest, config, db, json } => {
            batch_command(&manifest, config.as_deref(), db.as_deref(), json)?
        }
        Command::Deps { exe, direct, config, json } => {
            deps_command(&exe, direct, config.as_deref(), json)?
        }
        Command::Probe { exe, symbol, json } => probe_command(&exe, &symbol, json)?,
        Command::Literals { exe, json } => literals_command(&exe, json)?,
        Command::History { db, exe, json } => history_command(&db, exe.as_deref(), json)?,
    }

    Ok(())
}
