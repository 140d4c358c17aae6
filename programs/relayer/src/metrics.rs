//! The prometheus endpoint.

use std::net::SocketAddr;

use prometheus::{Encoder, TextEncoder};
use tracing::{error, info};
use warp::Filter;

/// Renders every registered metric in the text exposition format.
///
/// # Errors
/// Returns an error if encoding fails.
pub fn render() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Serves `/metrics` on `addr` until the process exits.
pub async fn serve(addr: SocketAddr) {
    let metrics_route = warp::path("metrics".to_string()).map(|| {
        render().unwrap_or_else(|e| {
            error!(error = %e, "failed to render metrics");
            String::new()
        })
    });

    info!("Metrics available at http://{addr}/metrics");
    warp::serve(metrics_route).run(addr).await;
}
