//! Campaign configuration.
//!
//! A [`FuzzConfig`] is built once at process entry (the binary fills it
//! from flags and environment variables) and passed down by reference.
//! Nothing below this module reads the environment.

use crate::error::{Error, Result};
use crate::generator::{DEFAULT_BLOAT_ROUNDS, MAX_BLOAT_ROUNDS};
use crate::session::WaitPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default target endpoint.
pub const DEFAULT_SERVER_ENDPOINT: &str = "localhost:8080";

/// Default worker pool size. Each worker holds one live connection.
pub const DEFAULT_MAX_WORKERS: usize = 200;

/// Default capacity of the pending-session queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Upstream HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy host name or address
    pub host: String,
    /// Proxy port
    pub port: u16,
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything a campaign needs to know about its environment.
#[derive(Debug, Clone)]
pub struct FuzzConfig {
    /// Target `host:port`
    pub server_endpoint: String,
    /// Use `wss://` instead of `ws://`
    pub use_tls: bool,
    /// Request path of the WebSocket endpoint
    pub path: String,
    /// Number of sessions running at once
    pub max_workers: usize,
    /// Sessions waiting for a worker before submission blocks
    pub queue_capacity: usize,
    /// Upstream HTTP proxy, when enabled
    pub proxy: Option<ProxyConfig>,
    /// Response pacing
    pub wait: WaitPolicy,
    /// Match classifier keywords case-sensitively
    pub case_sensitive: bool,
    /// Where transcripts go; `None` disables them
    pub transcript_dir: Option<PathBuf>,
    /// Doubling rounds of the structural bloat tokenizer, at most
    /// [`MAX_BLOAT_ROUNDS`]
    pub bloat_rounds: u32,
    /// How long a closed session waits for the peer's close frame
    pub close_grace: Duration,
    /// Bound on the transport handshake
    pub connect_timeout: Duration,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            server_endpoint: DEFAULT_SERVER_ENDPOINT.to_string(),
            use_tls: false,
            path: "/".to_string(),
            max_workers: DEFAULT_MAX_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            proxy: None,
            wait: WaitPolicy::default(),
            case_sensitive: false,
            transcript_dir: None,
            bloat_rounds: DEFAULT_BLOAT_ROUNDS,
            close_grace: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl FuzzConfig {
    /// Check the invariants the scheduler and sessions rely on.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::config("max_workers must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be at least 1"));
        }
        if self.wait.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be positive"));
        }
        if self.wait.quiescence > self.wait.ceiling {
            return Err(Error::config("quiescence must not exceed the wait ceiling"));
        }
        if self.bloat_rounds > MAX_BLOAT_ROUNDS {
            return Err(Error::config(format!(
                "bloat_rounds must be at most {}",
                MAX_BLOAT_ROUNDS
            )));
        }
        self.endpoint_url().map(|_| ())
    }

    /// The WebSocket URL sessions connect to.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wsfuzz::FuzzConfig;
    ///
    /// let config = FuzzConfig {
    ///     server_endpoint: "node.test:443".into(),
    ///     use_tls: true,
    ///     path: "rpc".into(),
    ///     ..Default::default()
    /// };
    /// assert_eq!(config.endpoint_url().unwrap().as_str(), "wss://node.test:443/rpc");
    /// ```
    pub fn endpoint_url(&self) -> Result<Url> {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        let path = self.path.trim_start_matches('/');
        let raw = format!("{}://{}/{}", scheme, self.server_endpoint, path);
        let url = Url::parse(&raw)
            .map_err(|e| Error::config(format!("invalid endpoint {}: {}", raw, e)))?;
        if url.host_str().is_none() {
            return Err(Error::config(format!("endpoint {} has no host", raw)));
        }
        Ok(url)
    }

    /// WebSocket transport settings derived from this configuration.
    #[cfg(feature = "websocket")]
    pub fn websocket_config(&self) -> Result<crate::shared::WebSocketConfig> {
        Ok(crate::shared::WebSocketConfig {
            url: self.endpoint_url()?,
            proxy: self.proxy.clone(),
            connect_timeout: self.connect_timeout,
        })
    }
}
