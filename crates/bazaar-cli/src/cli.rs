//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Bazaar marketplace engine tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "bazaar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "BAZAAR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a configuration file with every default spelled out.
    InitConfig {
        /// Where to write the file.
        #[arg(short, long, default_value = "bazaar.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Run a JSONL request script against the engine.
    ///
    /// Each non-empty line is an object with a `request` and optionally an
    /// `actor`, an `idempotency_key` and a `save_as` alias. Strings of the
    /// form `$alias` are replaced with the ID saved under that alias; `$admin`
    /// is the first configured administrator.
    Replay {
        /// The script.
        script: PathBuf,

        /// Snapshot to resume from and save to. Overrides the configured path.
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Stop at the first failed request.
        #[arg(long)]
        fail_fast: bool,
    },

    /// Summarize a snapshot file.
    Show {
        /// Snapshot to read. Overrides the configured path.
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_arguments_parse() {
        let cli = Cli::try_parse_from([
            "bazaar",
            "replay",
            "script.jsonl",
            "--snapshot",
            "state.json",
            "--format",
            "json",
        ])
        .expect("parse");
        assert_eq!(cli.format, Format::Json);
        assert!(matches!(
            cli.command,
            Commands::Replay { ref script, ref snapshot, fail_fast: false }
                if script == &PathBuf::from("script.jsonl")
                    && snapshot.as_deref() == Some(std::path::Path::new("state.json"))
        ));
    }

    #[test]
    fn init_config_has_a_default_output() {
        let cli = Cli::try_parse_from(["bazaar", "init-config"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::InitConfig { ref output, force: false } if output == &PathBuf::from("bazaar.toml")
        ));
    }

    #[test]
    fn replay_requires_a_script() {
        assert!(Cli::try_parse_from(["bazaar", "replay"]).is_err());
    }
}
