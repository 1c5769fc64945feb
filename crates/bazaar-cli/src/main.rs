//! bazaar - marketplace engine tool
//!
//! Writes configuration files, replays request scripts against the engine
//! and inspects the snapshots it leaves behind.

mod cli;
mod replay;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bazaar_engine::{EngineConfig, JsonSnapshot, MarketState, Marketplace};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, Format};
use crate::replay::{Outcome, Replayer};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    match cli.command {
        Commands::InitConfig { output, force } => init_config(&output, force),
        Commands::Replay {
            script,
            snapshot,
            fail_fast,
        } => {
            let config = load_config(cli.config.as_deref())?;
            replay(config, &script, snapshot, fail_fast, cli.format)
        }
        Commands::Show { snapshot } => {
            let config = load_config(cli.config.as_deref())?;
            show(&config, snapshot, cli.format)
        }
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new("bazaar=info")?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::from_file(path)?;
            info!(config = %path.display(), currency = %config.currency, "loaded config");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn snapshot_for(config: &EngineConfig, flag: Option<PathBuf>) -> Option<JsonSnapshot> {
    flag.or_else(|| config.snapshot_path.clone())
        .map(JsonSnapshot::new)
}

fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            output.display()
        );
    }

    let rendered = EngineConfig::default().to_toml()?;
    std::fs::write(output, rendered)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Config written to {}", output.display());
    println!();
    println!("Add administrator account IDs, then run:");
    println!("  bazaar --config {} replay <script.jsonl>", output.display());
    Ok(())
}

fn replay(
    config: EngineConfig,
    script: &Path,
    snapshot: Option<PathBuf>,
    fail_fast: bool,
    format: Format,
) -> anyhow::Result<()> {
    let snapshot = snapshot_for(&config, snapshot);
    let state = match &snapshot {
        Some(snapshot) => snapshot.load_or_default()?,
        None => MarketState::default(),
    };
    let market = Marketplace::builder(config).with_state(state).build()?;

    let file = File::open(script).with_context(|| format!("failed to open {}", script.display()))?;
    let mut stdout = io::stdout().lock();
    let mut write_error = None;
    let mut replayer = Replayer::new(&market);
    let outcomes = replayer.run(BufReader::new(file), |outcome| {
        if let Err(e) = print_outcome(&mut stdout, outcome, format) {
            write_error = Some(e);
            return false;
        }
        outcome.response.success || !fail_fast
    })?;
    if let Some(e) = write_error {
        return Err(e);
    }

    let failed = outcomes.iter().filter(|o| !o.response.success).count();
    if format == Format::Table {
        writeln!(stdout)?;
        writeln!(
            stdout,
            "{} request(s), {} succeeded, {failed} failed",
            outcomes.len(),
            outcomes.len() - failed
        )?;
    }

    if let Some(snapshot) = snapshot {
        snapshot.save(&market.export_state())?;
        if format == Format::Table {
            writeln!(stdout, "Snapshot saved to {}", snapshot.path().display())?;
        }
    }
    Ok(())
}

fn print_outcome<W: Write>(out: &mut W, outcome: &Outcome, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => {
            serde_json::to_writer(&mut *out, outcome)?;
            writeln!(out)?;
        }
        Format::Table => match &outcome.response.error {
            None => writeln!(out, "{:>5}  {:<28} ok", outcome.line, outcome.op)?,
            Some(error) => writeln!(
                out,
                "{:>5}  {:<28} {:?}: {}",
                outcome.line, outcome.op, error.kind, error.message
            )?,
        },
    }
    Ok(())
}

fn show(config: &EngineConfig, snapshot: Option<PathBuf>, format: Format) -> anyhow::Result<()> {
    let Some(snapshot) = snapshot_for(config, snapshot) else {
        bail!("no snapshot given and none configured");
    };
    let state = snapshot.load()?;
    let mut stdout = io::stdout().lock();

    if format == Format::Json {
        serde_json::to_writer_pretty(&mut stdout, &state)?;
        writeln!(stdout)?;
        return Ok(());
    }

    let bids: usize = state.projects.iter().map(|p| p.bids.iter().count()).sum();
    writeln!(stdout, "Snapshot {}:", snapshot.path().display())?;
    writeln!(stdout)?;
    writeln!(stdout, "  Accounts: {}", state.accounts.len())?;
    writeln!(stdout, "  Projects: {}", state.projects.len())?;
    writeln!(stdout, "  Bids:     {bids}")?;
    writeln!(stdout, "  Services: {}", state.services.len())?;
    writeln!(stdout, "  Products: {}", state.products.len())?;
    writeln!(stdout, "  Orders:   {}", state.orders.len())?;
    writeln!(stdout)?;

    for account in &state.accounts {
        writeln!(
            stdout,
            "  {}  {:<20} {:<13} available {:>12}  pending {:>12}",
            account.id,
            account.display_name,
            account.membership.plan.to_string(),
            account.wallet.available,
            account.wallet.pending_withdrawal
        )?;
    }
    Ok(())
}
