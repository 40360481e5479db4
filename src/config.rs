//! # Harness Configuration
//!
//! Where the service under test lives and how to talk to it. Supports
//! environment variables and TOML config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::api_clients::{RestRequestFormat, ServingApiConfig};
use crate::error::{ConformanceError, ConformanceResult};
use crate::grpc_clients::GrpcClientConfig;

/// Harness configuration
///
/// # Examples
///
/// ```rust
/// use serving_conformance::config::{HarnessConfig, Transport};
///
/// let config = HarnessConfig::default();
/// assert_eq!(config.grpc_endpoint(), "http://localhost:8500");
/// assert_eq!(config.rest_base_url(), "http://localhost:8501");
/// assert_eq!(config.transport, Transport::Grpc);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Transport used by [`crate::transport::UnifiedServingClient::from_config`]
    #[serde(default)]
    pub transport: Transport,
    /// Location of the running service
    pub service: ServiceConfig,
    /// Per-call and connect timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// REST-specific settings
    #[serde(default)]
    pub rest: RestConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub grpc_port: u16,
    pub rest_port: u16,
    /// Name the model is served under
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_model_name() -> String {
    "resnet".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10000,
            connect_timeout_ms: 10000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default)]
    pub request_format: RestRequestFormat,
}

/// Wire binding used to reach the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Grpc,
    Rest,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Grpc => f.write_str("grpc"),
            Transport::Rest => f.write_str("rest"),
        }
    }
}

impl FromStr for Transport {
    type Err = ConformanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grpc" => Ok(Transport::Grpc),
            "rest" | "http" => Ok(Transport::Rest),
            other => Err(ConformanceError::config_error(format!(
                "Unknown transport: {other}"
            ))),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            service: ServiceConfig {
                host: "localhost".to_string(),
                grpc_port: 8500,
                rest_port: 8501,
                model_name: default_model_name(),
            },
            timeouts: TimeoutConfig::default(),
            rest: RestConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables and config file
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file
    /// 3. Default values
    pub fn load() -> ConformanceResult<Self> {
        let mut config = match Self::find_config_file() {
            Some(config_path) => {
                debug!("Loading config from: {}", config_path.display());
                Self::load_from_file(&config_path)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;

        debug!("Loaded harness configuration: {:?}", config);
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> ConformanceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConformanceError::config_error(format!("Failed to read config file: {e}"))
        })?;

        toml::from_str(&content).map_err(|e| {
            ConformanceError::config_error(format!("Failed to parse config file: {e}"))
        })
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut candidates = vec![
            PathBuf::from("./serving-conformance.toml"),
            PathBuf::from("./config/serving-conformance.toml"),
        ];
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".serving-conformance").join("config.toml"));
        }

        candidates.into_iter().find(|path| path.is_file())
    }

    /// Apply environment variable overrides
    ///
    /// An override that does not parse is an error.
    fn apply_env_overrides(&mut self) -> ConformanceResult<()> {
        if let Ok(host) = std::env::var("CONFORMANCE_HOST") {
            self.service.host = host;
        }
        if let Some(port) = env_parse("CONFORMANCE_GRPC_PORT")? {
            self.service.grpc_port = port;
        }
        if let Some(port) = env_parse("CONFORMANCE_REST_PORT")? {
            self.service.rest_port = port;
        }
        if let Ok(model) = std::env::var("CONFORMANCE_MODEL_NAME") {
            self.service.model_name = model;
        }
        if let Some(transport) = env_parse("CONFORMANCE_TRANSPORT")? {
            self.transport = transport;
        }
        if let Some(timeout_ms) = env_parse("CONFORMANCE_REQUEST_TIMEOUT_MS")? {
            self.timeouts.request_timeout_ms = timeout_ms;
        }
        if let Some(format) = env_parse("CONFORMANCE_REST_FORMAT")? {
            self.rest.request_format = format;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> ConformanceResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConformanceError::config_error(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            ConformanceError::config_error(format!("Failed to serialize config: {e}"))
        })?;

        std::fs::write(path, content).map_err(|e| {
            ConformanceError::config_error(format!("Failed to write config file: {e}"))
        })
    }

    pub fn grpc_endpoint(&self) -> String {
        format!("http://{}:{}", self.service.host, self.service.grpc_port)
    }

    pub fn rest_base_url(&self) -> String {
        format!("http://{}:{}", self.service.host, self.service.rest_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.connect_timeout_ms)
    }

    pub fn grpc_client_config(&self) -> GrpcClientConfig {
        GrpcClientConfig::new(self.grpc_endpoint())
            .with_timeout(self.request_timeout())
            .with_connect_timeout(self.connect_timeout())
    }

    pub fn rest_client_config(&self) -> ServingApiConfig {
        ServingApiConfig {
            base_url: self.rest_base_url(),
            timeout_ms: self.timeouts.request_timeout_ms,
            connect_timeout_ms: self.timeouts.connect_timeout_ms,
            request_format: self.rest.request_format,
        }
    }
}

fn env_parse<T>(key: &str) -> ConformanceResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|e| {
            ConformanceError::config_error(format!("Invalid value '{raw}' for {key}: {e}"))
        }),
        Err(_) => Ok(None),
    }
}
