mod bootstrap;
mod cli;

use clap::Parser;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::Cli::parse();

    if let Err(err) = bootstrap::run(&cli.config).await {
        tracing::error!(error = %err, "fatal bootstrap error");
        std::process::exit(1);
    }
}
