//! Common utilities for gRPC clients.
//!
//! Channel configuration shared by the serving service clients.

use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::error::ConformanceError;

/// Configuration for gRPC clients.
#[derive(Debug, Clone)]
pub struct GrpcClientConfig {
    /// gRPC endpoint URL (e.g., "http://localhost:8500")
    pub endpoint: String,
    /// Per-call deadline
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// TCP keepalive interval
    pub tcp_keepalive: Option<Duration>,
    /// HTTP/2 keepalive interval
    pub http2_keepalive_interval: Option<Duration>,
}

impl Default for GrpcClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8500".to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: Some(Duration::from_secs(30)),
            http2_keepalive_interval: None,
        }
    }
}

impl GrpcClientConfig {
    /// Create a new config with the given endpoint
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the per-call deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a tonic Channel from this configuration
    ///
    /// The connection is established eagerly so an unreachable endpoint
    /// fails here rather than on the first call.
    pub async fn connect(&self) -> Result<Channel, ConformanceError> {
        let mut endpoint = Endpoint::from_shared(self.endpoint.clone()).map_err(|e| {
            ConformanceError::config_error(format!(
                "Invalid gRPC endpoint '{}': {}",
                self.endpoint, e
            ))
        })?;

        endpoint = endpoint
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout);

        if let Some(keepalive) = self.tcp_keepalive {
            endpoint = endpoint.tcp_keepalive(Some(keepalive));
        }

        if let Some(interval) = self.http2_keepalive_interval {
            endpoint = endpoint.http2_keep_alive_interval(interval);
        }

        debug!(endpoint = %self.endpoint, "Connecting to gRPC endpoint");

        endpoint
            .connect()
            .await
            .map_err(|e| ConformanceError::connection(&self.endpoint, format!("Failed to connect: {e}")))
    }
}
