use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vivelog::cli::run::RunArgs;

#[derive(Parser)]
#[command(name = "vivelog")]
#[command(about = "Copy VIVE Wireless logs and send link statistics to InfluxDB over UDP", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/vivelog/config.yml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collector host name or address
    host: String,

    /// Collector UDP port
    port: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vivelog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    vivelog::cli::run::run(RunArgs {
        host: cli.host,
        port: cli.port,
        config: cli.config,
    })
    .await?;

    Ok(())
}
