use anyhow::Context;
use clap::Parser;
use ras_keycloak_cli::cli::Args;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let output = args
        .run()
        .await
        .with_context(|| format!("{} failed", args.command.name()))?;

    println!("{}", output);
    Ok(())
}
