use clap::Parser;
use risk_ledger::cli::{Cli, Commands};
use risk_ledger::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = risk_ledger::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Size(args) => {
            args.execute(&config)?;
        }
        Commands::Simulate(args) => {
            tracing::info!(symbol = %args.symbol, side = %args.side, "Starting paper simulation");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
