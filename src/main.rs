//! celldevs - run a Cell-DEVS scenario from a JSON document
//!
//! Loads the scenario, builds the lattice with the built-in cell types,
//! runs until the horizon and writes the state and message logs.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use celldevs::{
    CellRegistry, Engine, EngineConfig, Lattice, MessageLog, NullObserver, Observer,
    ScenarioConfig, StateLog, Tee, VirtualTime,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "celldevs")]
#[command(about = "Run a Cell-DEVS scenario until a virtual-time horizon")]
struct Cli {
    /// Path to the scenario JSON document
    scenario: PathBuf,

    /// Last virtual instant to simulate, in ticks
    #[arg(default_value = "500")]
    horizon: u64,

    /// Where to write cell states
    #[arg(long, default_value = "results/state.txt")]
    state_log: PathBuf,

    /// Where to write delivered messages
    #[arg(long, default_value = "results/output_messages.txt")]
    message_log: PathBuf,

    /// Skip both log files
    #[arg(long)]
    no_logs: bool,

    /// Compute same-instant transitions in parallel
    #[arg(long)]
    parallel: bool,

    /// Print the final engine snapshot as JSON
    #[arg(long)]
    snapshot: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "celldevs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Loading scenario from: {}", cli.scenario.display());
    let scenario = ScenarioConfig::from_file(&cli.scenario)
        .with_context(|| format!("failed to load scenario {}", cli.scenario.display()))?;

    let registry = CellRegistry::<f64>::with_builtins();
    let lattice = Lattice::from_scenario(&scenario, &registry)
        .context("failed to build the cell lattice")?;

    let config = EngineConfig {
        parallel: cli.parallel,
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config(lattice, config);

    let mut observer: Box<dyn Observer<f64>> = if cli.no_logs {
        Box::new(NullObserver)
    } else {
        Box::new(Tee(
            StateLog::new(create_log(&cli.state_log)?),
            MessageLog::new(create_log(&cli.message_log)?),
        ))
    };

    println!("Model started");
    let report = engine
        .run_until(VirtualTime::new(cli.horizon), &mut *observer)
        .context("simulation failed")?;
    println!("Simulation finished");

    info!(
        reason = ?report.reason,
        clock = %report.clock,
        instants = report.instants,
        transitions = report.transitions,
        changes = report.changes,
        messages = report.messages_delivered,
        "run complete"
    );

    if cli.snapshot {
        let json = engine.snapshot_json().context("failed to serialize snapshot")?;
        println!("{json}");
    }

    Ok(())
}

fn create_log(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
