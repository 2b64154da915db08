use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Configuration for the lease-gate-s3 CLI.
///
/// Credentials come from the standard AWS provider chain (environment,
/// shared config, instance metadata); only the endpoint shape is
/// configured here.
#[derive(Parser, Debug, Clone)]
#[command(name = "lease-gate-s3")]
#[command(about = "S3-backed admission gate: acquire, check, and release capacity leases")]
pub struct Config {
    /// Custom S3 endpoint URL (Cloudflare R2, MinIO); omit for AWS S3
    #[arg(long, env = "S3_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// AWS region
    #[arg(long, default_value = "us-east-1", env = "AWS_REGION")]
    pub region: String,

    /// Use path-style addressing (required by MinIO and some R2 setups)
    #[arg(long, env = "S3_FORCE_PATH_STYLE")]
    pub force_path_style: bool,

    /// Read the JSON event from this file instead of stdin
    #[arg(long, short = 'e')]
    pub event_file: Option<PathBuf>,

    #[command(subcommand)]
    pub operation: Operation,
}

/// The three lease operations; each reads one JSON event and prints one
/// JSON result envelope.
#[derive(Subcommand, Debug, Clone)]
pub enum Operation {
    /// Grant a lease unconditionally and print its handle merged into the event
    Acquire,
    /// Sweep stale leases, reconcile the counter, and report capacity
    Check,
    /// Delete a lease object and decrement the counter
    Release,
}
