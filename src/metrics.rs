/// Metrics - Prometheus instrumentation for the cache monitor
///
/// Registry plus a minimal /metrics HTTP surface. Counters cover the
/// pipeline's decision points so a dashboard can tell ingest, rewrite and
/// review activity apart.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tracing::{error, info};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Blocks persisted with a fresh block row
    pub static ref BLOCKS_PERSISTED: IntCounter = IntCounter::new(
        "evmcache_blocks_persisted_total",
        "Blocks persisted with a new block row"
    ).unwrap();

    /// Blocks whose associated data was rewritten in place
    /// Labels: reason (stale_height, hash_reorged)
    pub static ref BLOCKS_REWRITTEN: IntCounterVec = IntCounterVec::new(
        Opts::new("evmcache_blocks_rewritten_total", "Blocks whose associated rows were rewritten"),
        &["reason"]
    ).unwrap();

    /// Blocks found already stored and left untouched
    pub static ref BLOCKS_UNCHANGED: IntCounter = IntCounter::new(
        "evmcache_blocks_unchanged_total",
        "Blocks already stored with matching transaction counts"
    ).unwrap();

    /// Node endpoint failovers
    pub static ref NODE_CYCLES: IntCounter = IntCounter::new(
        "evmcache_node_cycles_total",
        "Node endpoint failovers after transient errors"
    ).unwrap();

    /// Review sweeps by cadence
    /// Labels: kind (short, comprehensive)
    pub static ref REVIEW_PASSES: IntCounterVec = IntCounterVec::new(
        Opts::new("evmcache_review_passes_total", "Review sweeps by cadence"),
        &["kind"]
    ).unwrap();

    /// Blocks discovered by a review sweep
    pub static ref FOUND_DURING_REVIEW: IntCounter = IntCounter::new(
        "evmcache_found_during_review_total",
        "Blocks discovered missing during review sweeps"
    ).unwrap();

    /// Transactions skipped because their receipt was not yet available
    pub static ref RECEIPTS_MISSING: IntCounter = IntCounter::new(
        "evmcache_receipts_missing_total",
        "Transactions skipped pending receipt availability"
    ).unwrap();

    /// Next height the monitor intends to fetch
    pub static ref CURSOR_HEIGHT: IntGauge = IntGauge::new(
        "evmcache_cursor_height",
        "Next block height the monitor will fetch"
    ).unwrap();
}

/// Register all metrics with the registry. Call once at startup.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    REGISTRY.register(Box::new(BLOCKS_PERSISTED.clone()))?;
    REGISTRY.register(Box::new(BLOCKS_REWRITTEN.clone()))?;
    REGISTRY.register(Box::new(BLOCKS_UNCHANGED.clone()))?;
    REGISTRY.register(Box::new(NODE_CYCLES.clone()))?;
    REGISTRY.register(Box::new(REVIEW_PASSES.clone()))?;
    REGISTRY.register(Box::new(FOUND_DURING_REVIEW.clone()))?;
    REGISTRY.register(Box::new(RECEIPTS_MISSING.clone()))?;
    REGISTRY.register(Box::new(CURSOR_HEIGHT.clone()))?;
    Ok(())
}

/// Gather metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

async fn metrics_handler() -> String {
    gather_metrics()
}

/// Serve /metrics on the given address until the process exits
pub async fn serve_metrics(addr: SocketAddr) {
    let app = axum::Router::new().route("/metrics", axum::routing::get(metrics_handler));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind metrics listener");
            return;
        }
    };
    info!(%addr, "metrics listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "metrics server failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_after_init() {
        // init_metrics is idempotent only per-process; tolerate repeat registration
        let _ = init_metrics();
        BLOCKS_PERSISTED.inc();
        let text = gather_metrics();
        assert!(text.contains("evmcache_blocks_persisted_total"));
    }
}
