//! Pulsewatch CLI entry point

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pulsewatch_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => pulsewatch_cli::simulate::execute(args).await?,
        Commands::CheckConfig(args) => pulsewatch_cli::check_config(args)?,
        Commands::Version => {
            println!("pulsewatch-cli {}", env!("CARGO_PKG_VERSION"));
            println!("engine version: {}", pulsewatch::VERSION);
        }
    }

    Ok(())
}
