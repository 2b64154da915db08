mod config;
mod store;

use std::io::Read;

use anyhow::Context;
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use lease_gate_core::ops;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, Operation};
use store::S3Opener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the result envelope.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let event = read_event(&config)?;

    info!("Running {:?} operation", config.operation);

    let client = build_client(&config).await;
    let opener = S3Opener::new(client);

    let response = match config.operation {
        Operation::Acquire => ops::acquire(&opener, &event).await,
        Operation::Check => ops::check_capacity(&opener, &event).await,
        Operation::Release => ops::release(&opener, &event).await,
    };

    // Failures inside the operations are reported in the envelope itself;
    // the process only fails when it cannot read the event or write the
    // result.
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Read the JSON event from the configured file, or stdin.
fn read_event(config: &Config) -> anyhow::Result<Value> {
    let raw = match &config.event_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Event is not valid JSON")
}

/// Build the S3 client from the provider-chain config plus any custom
/// endpoint settings.
async fn build_client(config: &Config) -> aws_sdk_s3::Client {
    let base = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&base);
    if let Some(endpoint) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }
    if config.force_path_style {
        builder = builder.force_path_style(true);
    }

    aws_sdk_s3::Client::from_conf(builder.build())
}
