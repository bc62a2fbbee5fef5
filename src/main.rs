mod config;
mod decoder;
mod metrics;
mod monitor;
mod node;
mod queries;
mod schema;
mod telemetry;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use crate::config::{get_global_config, init_global_config};
use crate::decoder::LogDecoder;
use crate::monitor::{CacheMonitor, MonitorConfig};
use crate::node::NodeClient;
use crate::telemetry::TelemetryConfig;

#[derive(Parser, Debug)]
#[clap(name = "evmcache")]
#[clap(about = "Mirror the canonical chain of an EVM network into PostgreSQL", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[clap(long, default_value = "config.toml")]
    config: String,

    /// Resume from this block instead of the stored maximum
    #[clap(long)]
    start_block: Option<i64>,

    /// Stop cleanly once the cursor reaches this block
    #[clap(long)]
    end_block: Option<i64>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_global_config(&args.config) {
        eprintln!("FATAL: cannot load config {}: {}", args.config, e);
        std::process::exit(1);
    }
    let config = get_global_config();

    let mut telemetry_config = TelemetryConfig::default();
    if let Ok(level) = config.get_string("telemetry.log_level") {
        telemetry_config.log_level = level;
    }
    if let Ok(format) = config.get_string("telemetry.log_format") {
        telemetry_config.log_format = format;
    }
    if let Ok(file) = config.get_string("telemetry.log_file") {
        telemetry_config.log_file = Some(file);
    }
    if let Err(e) = telemetry::init_tracing(telemetry_config) {
        eprintln!("FATAL: cannot initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!(error = %e, "cache monitor terminated");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = get_global_config();

    metrics::init_metrics()?;
    let metrics_addr: SocketAddr = config
        .get_string("metrics.listen_addr")
        .unwrap_or_else(|_| "0.0.0.0:3005".to_string())
        .parse()?;
    tokio::spawn(metrics::serve_metrics(metrics_addr));

    let database_url = config::get_database_url(config)?;
    let max_connections = config.get_int("database.max_connections").unwrap_or(8) as u32;
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await?;
    schema::ensure_schema(&pool).await?;

    let endpoints = config::get_rpc_endpoints(config)?;
    let timeout_ms = config.get_int("rpc.timeout_ms").unwrap_or(15000) as u64;
    let client = Arc::new(NodeClient::new(endpoints, timeout_ms)?);

    let decoder = match config.get_string("abi.path") {
        Ok(path) => {
            let decoder = LogDecoder::load(&path)?;
            info!(path, events = decoder.event_count(), "loaded ABI event registry");
            decoder
        }
        Err(_) => {
            info!("no ABI config, logs will be stored undecoded");
            LogDecoder::empty()
        }
    };

    let monitor_config = MonitorConfig {
        blockchain_id: config.get_int("monitor.blockchain_id").unwrap_or(1),
        start_block_override: args
            .start_block
            .or_else(|| config::get_optional_int(config, "monitor.start_block_override")),
        end_block_override: args
            .end_block
            .or_else(|| config::get_optional_int(config, "monitor.end_block_override")),
        review_block_limit: config.get_int("monitor.review_block_limit").unwrap_or(15),
        comprehensive_review_block_limit: config
            .get_int("monitor.comprehensive_review_block_limit")
            .unwrap_or(100),
        comprehensive_review_count_mod: config
            .get_int("monitor.comprehensive_review_count_mod")
            .unwrap_or(10) as u64,
    };

    let monitor = CacheMonitor::new(monitor_config, pool, client, Arc::new(decoder));
    monitor.run().await?;
    Ok(())
}
