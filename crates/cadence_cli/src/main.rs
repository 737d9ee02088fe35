//! Cadence CLI
//!
//! Drive timer scenarios against a synthetic render loop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod simulate;

use config::Scenario;
use simulate::{Simulation, Summary};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cadence timer scenario runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print what every timer did
    Simulate {
        /// Scenario file, or a directory containing cadence.toml
        #[arg(default_value = ".")]
        scenario: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a scenario without running it
    Check {
        /// Scenario file, or a directory containing cadence.toml
        #[arg(default_value = ".")]
        scenario: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Simulate { scenario, json } => cmd_simulate(&scenario, json),
        Commands::Check { scenario } => cmd_check(&scenario),
    }
}

fn cmd_simulate(path: &Path, json: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let simulation = Simulation::build(&scenario)?;

    info!(
        "Simulating {} timers over {} frames at {} fps",
        simulation.timer_count(),
        scenario.driver.frames,
        scenario.driver.fps
    );

    let summary = simulation.run(&scenario);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)?;
    // Building catches option errors (unknown easing, empty cycles, ...)
    let simulation = Simulation::build(&scenario)?;

    info!(
        "Scenario OK: {} timers, {} frames at {} fps",
        simulation.timer_count(),
        scenario.driver.frames,
        scenario.driver.fps
    );
    Ok(())
}

fn print_summary(summary: &Summary) {
    println!("Cadence simulation");
    println!("==================");
    println!();
    println!("Frames:  {}", summary.frames);
    println!("Elapsed: {}ms", summary.elapsed_ms);
    println!("Active:  {}", summary.active);
    println!();
    println!(
        "{:<24} {:<11} {:>6} {:>8} {:>5}  state",
        "timer", "kind", "fires", "skipped", "ends"
    );
    for timer in &summary.timers {
        let state = if timer.playing {
            "playing"
        } else if timer.completed {
            "completed"
        } else {
            "idle"
        };
        println!(
            "{:<24} {:<11} {:>6} {:>8} {:>5}  {}",
            timer.name, timer.kind, timer.fires, timer.skipped, timer.ends, state
        );
    }
}
