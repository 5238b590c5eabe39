//! Per-runner HTTP connection, rebuildable on recycle or timeout.
//!
//! `reqwest::Client` is treated as an opaque HTTP connection resource;
//! wire-format encoding/decoding is entirely its concern, not this
//! crate's. No TLS is configured here — this engine only ever targets
//! plain HTTP.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, HOST};

/// Immutable parameters needed to (re)build a connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host_hdr: String,
}

impl ConnectionConfig {
    /// Builds a fresh `reqwest::Client` capped to a single pooled
    /// connection per host, so replacing a `Connection` genuinely drops
    /// the old socket rather than letting reqwest's own pool keep it
    /// alive underneath us.
    fn build_client(&self) -> reqwest::Client {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.host_hdr) {
            headers.insert(HOST, value);
        }

        reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .expect("static client configuration is always valid")
    }
}

/// One logical connection slot owned by a runner. Replacing it (via
/// [`Connection::reconnect`]) is how the engine frees a connection and
/// establishes a new one in its place, on timeout or recycle.
pub struct Connection {
    client: reqwest::Client,
}

impl Connection {
    pub fn new(config: &ConnectionConfig) -> Self {
        Connection {
            client: config.build_client(),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Drop the current client and build a fresh one in its place.
    /// Dropping the old `reqwest::Client` closes its pooled sockets.
    pub fn reconnect(&mut self, config: &ConnectionConfig) {
        self.client = config.build_client();
    }
}
