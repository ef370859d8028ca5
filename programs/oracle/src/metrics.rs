//! Prometheus `/metrics` HTTP endpoint.

use std::net::SocketAddr;

use prometheus::{Encoder, TextEncoder};
use warp::Filter;

/// Serves the process's default Prometheus registry at `GET /metrics` on
/// `addr` until the process exits. Intended to be spawned as a background
/// task alongside the oracle's main loop.
pub async fn serve(addr: SocketAddr) {
    let metrics_route = warp::path("metrics").map(|| {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(%err, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    });

    tracing::info!(%addr, "metrics endpoint listening at /metrics");
    warp::serve(metrics_route).run(addr).await;
}
