//! CLI interface for risk-ledger
//!
//! Provides subcommands for:
//! - `size`: Size one trade, record and verify it
//! - `simulate`: Run a paper decision cycle end to end
//! - `config`: Show the effective configuration

mod simulate;
mod size;

pub use simulate::SimulateArgs;
pub use size::SizeArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "risk-ledger")]
#[command(about = "Fixed-fractional position sizing with a verifiable audit ledger")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Size one trade and print the verified ledger record
    Size(SizeArgs),
    /// Run a paper entry cycle and optional exit
    Simulate(SimulateArgs),
    /// Show configuration
    Config,
}
