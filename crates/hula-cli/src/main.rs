//! Hula CLI - command line client for service brokers.
//!
//! This is the entry point for the `hula` binary.

mod args;
mod commands;

use clap::Parser;
use hula_broker::BrokerClient;
use tracing_subscriber::EnvFilter;

use args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.debug);

    let config = args.broker_config();
    tracing::debug!(?config, "Using broker configuration");

    let client = BrokerClient::from_config(&config)?;
    let output = commands::execute(&client, args.command).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Log to stderr so stdout stays parseable JSON. `RUST_LOG` wins over `--debug`.
fn init_tracing(debug: bool) {
    let default = if debug {
        "hula_broker=debug,hula_cli=debug,info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
