mod cmd;

use clap::Parser;
use cmd::config::{Effective, ReplayArgs};

#[derive(Parser)]
#[command(name = "replay-server", about = "Replays a flight log as paced telemetry over TCP")]
struct Cli {
    #[command(flatten)]
    args: ReplayArgs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let eff = match Effective::new(&cli.args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match cmd::replay::run(&eff).await {
        Ok(summary) => {
            tracing::info!(
                sent = summary.sent,
                dropped = summary.dropped,
                cancelled = summary.cancelled,
                "replay finished"
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
