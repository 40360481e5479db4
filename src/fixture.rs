//! # Service Fixture
//!
//! The running service is an external collaborator: something else starts
//! it and loads the model. The harness only needs to know the model name
//! and which ports the two transports listen on.

use crate::config::HarnessConfig;
use crate::descriptor::ModelDescriptor;
use crate::error::{ConformanceError, ConformanceResult};

/// Ports of a running service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePorts {
    pub grpc_port: u16,
    pub rest_port: u16,
}

/// A running service with its model already loaded
pub trait ServiceFixture: Send + Sync {
    fn model_name(&self) -> &str;

    fn ports(&self) -> ServicePorts;

    /// Host the ports are bound on
    fn host(&self) -> &str {
        "localhost"
    }

    /// Fail unless this service is the one `descriptor` describes.
    fn ensure_serves(&self, descriptor: &ModelDescriptor) -> ConformanceResult<()> {
        if self.model_name() == descriptor.name {
            return Ok(());
        }
        Err(ConformanceError::config_error(format!(
            "Service loads model '{}' but the checks expect '{}'",
            self.model_name(),
            descriptor.name
        )))
    }
}

/// Fixture for a service described by [`HarnessConfig`]
///
/// Used when the service is started outside the test process, e.g. by a
/// container runner that exports `CONFORMANCE_GRPC_PORT` and
/// `CONFORMANCE_REST_PORT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredService {
    host: String,
    model_name: String,
    ports: ServicePorts,
}

impl ConfiguredService {
    pub fn new(host: impl Into<String>, model_name: impl Into<String>, ports: ServicePorts) -> Self {
        Self {
            host: host.into(),
            model_name: model_name.into(),
            ports,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            config.service.host.clone(),
            config.service.model_name.clone(),
            ServicePorts {
                grpc_port: config.service.grpc_port,
                rest_port: config.service.rest_port,
            },
        )
    }
}

impl ServiceFixture for ConfiguredService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn ports(&self) -> ServicePorts {
        self.ports
    }

    fn host(&self) -> &str {
        &self.host
    }
}
