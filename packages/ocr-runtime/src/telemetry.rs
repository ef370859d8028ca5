//! `TelemetryForwarder`: best-effort drain of a bounded telemetry channel.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::metrics;

/// Capacity of the telemetry channel. The sender side drops entries rather
/// than blocking when this fills — telemetry is best-effort.
pub const CHANNEL_CAPACITY: usize = 100;

/// An opaque telemetry entry forwarded from the inner protocol to the
/// monitoring endpoint. The inner protocol's own message shape is an
/// external collaborator's concern; this carries whatever payload it produces.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TelemetryEvent {
    /// Dot-separated event kind, e.g. `"report.transmitted"`.
    pub kind: String,
    /// Opaque JSON payload.
    pub payload: serde_json::Value,
}

/// A sink for serialized telemetry entries.
#[async_trait::async_trait]
pub trait MonitoringEndpoint: Send + Sync + 'static {
    /// Sends one length-prefixed, already-serialized telemetry entry.
    async fn send_log(&self, bytes: &[u8]) -> anyhow::Result<()>;
}

/// Creates the telemetry channel. The sender half is handed to the inner
/// protocol; the receiver half is consumed by [`run`].
#[must_use]
pub fn channel<T: Serialize + Send + 'static>() -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(CHANNEL_CAPACITY)
}

/// Serializes `entry` as a 4-byte big-endian length prefix followed by its
/// JSON encoding.
fn frame<T: Serialize>(entry: &T) -> Result<Vec<u8>, serde_json::Error> {
    let body = serde_json::to_vec(entry)?;
    let mut framed = Vec::with_capacity(4 + body.len());
    #[allow(clippy::cast_possible_truncation)]
    framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Drains `rx`, forwarding each entry to `endpoint` (if present) until the
/// channel closes or `cancel` fires.
pub async fn run<T, E>(mut rx: mpsc::Receiver<T>, endpoint: Option<std::sync::Arc<E>>, cancel: CancellationToken)
where
    T: Serialize + Send + 'static,
    E: MonitoringEndpoint,
{
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("TelemetryForwarder cancelled, exiting");
                return;
            }
            item = rx.recv() => item,
        };

        let Some(entry) = item else {
            tracing::warn!("telemetry channel closed unexpectedly, exiting forwarder");
            return;
        };

        let bytes = match frame(&entry) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "failed to serialize telemetry entry, dropping");
                metrics::TELEMETRY_DROPPED_TOTAL.inc();
                continue;
            }
        };

        if let Some(endpoint) = &endpoint {
            if let Err(err) = endpoint.send_log(&bytes).await {
                tracing::warn!(%err, "failed to forward telemetry entry");
                metrics::TELEMETRY_DROPPED_TOTAL.inc();
            }
        }
    }
}
