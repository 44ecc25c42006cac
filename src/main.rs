//! Registry Storage Operator
//!
//! Watches Registry resources and keeps their storage backend configuration
//! valid and immutable-once-provisioned. `--crd` prints the CustomResource
//! manifest for installation.

use anyhow::Context as _;
use clap::Parser;
use kube::{Client, CustomResourceExt};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use registry_storage_operator::{controller, Registry};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Registry Storage Operator - storage backend management for registries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the Registry CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.crd {
        print!("{}", serde_yaml::to_string(&Registry::crd())?);
        return Ok(());
    }

    init_logging(&args);

    info!("Starting Registry Storage Operator");
    info!("  Version: {}", registry_storage_operator::VERSION);

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    controller::run(client).await?;

    info!("Operator shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("kube=info".parse().unwrap())
        .add_directive("tower=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
