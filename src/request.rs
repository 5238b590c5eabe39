//! Request dispatch: issue one GET, race it against the engine-enforced
//! 1-second timeout. The underlying HTTP client's own per-connection
//! timeout is never trusted, since it can't distinguish a slow connect
//! from a slow body from a peer that never responds at all — the engine
//! needs that distinction to classify outcomes and to decide when to
//! recycle the connection.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::outcome::Outcome;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// The result of dispatching and racing one request to its terminus.
pub struct Dispatched {
    pub start_us: u64,
    pub end_us: u64,
    pub outcome: Outcome,
}

fn now_epoch_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Dispatch one `GET path` on `conn` and race it against the hard
/// timeout. Never returns an `Err` — every outcome, including transport
/// failure, is folded into [`Outcome`]; per-request faults never propagate
/// out of this call. The timeout covers the whole request, including
/// draining the response body, so a server that stalls partway through
/// sending the body is still caught.
pub async fn dispatch_and_await(conn: &Connection, url: &str) -> Dispatched {
    let start_us = now_epoch_us();
    let started_at = Instant::now();

    let send_fut = conn.client().get(url).send();
    let outcome = tokio::select! {
        biased;
        result = async { classify_response(send_fut.await).await } => result,
        _ = tokio::time::sleep(REQUEST_TIMEOUT) => {
            debug!(elapsed_ms = started_at.elapsed().as_millis() as u64, "request timed out");
            Outcome::Timeout
        }
    };

    Dispatched {
        start_us,
        end_us: now_epoch_us(),
        outcome,
    }
}

async fn classify_response(result: reqwest::Result<reqwest::Response>) -> Outcome {
    match result {
        Ok(response) => {
            let status = response.status().as_u16();
            // Drain the body so the connection can be reused/pooled
            // cleanly; the body's contents are out of scope (Non-goal:
            // response-body validation).
            if let Err(err) = response.bytes().await {
                warn!(error = %err, "failed draining response body");
                return Outcome::Error;
            }
            Outcome::Success { status }
        }
        Err(err) => {
            if is_peer_close(&err) {
                Outcome::Closed
            } else {
                Outcome::Error
            }
        }
    }
}

/// Detect a send failure whose underlying cause indicates the peer tore
/// the connection down mid-request, rather than a DNS/connect/timeout
/// failure. Only observable in the context of the one in-flight request
/// it breaks, not as an independent idle-connection event.
fn is_peer_close(err: &reqwest::Error) -> bool {
    use std::error::Error as _;

    if err.is_timeout() || err.is_connect() {
        return false;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string().to_lowercase();
        if msg.contains("connection closed")
            || msg.contains("incomplete message")
            || msg.contains("connection reset")
            || msg.contains("broken pipe")
        {
            return true;
        }
        source = cause.source();
    }
    false
}
