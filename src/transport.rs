//! # Unified Transport Abstraction
//!
//! One interface over the gRPC and REST bindings of the serving API. Both
//! return the same proto responses, so the normalizer and the conformance
//! rules are written once and run against either transport (or a mock).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use serving_conformance::{HarnessConfig, UnifiedServingClient};
//!
//! let config = HarnessConfig::load()?;
//! let client = UnifiedServingClient::from_config(&config).await?;
//!
//! // Works the same regardless of transport
//! let status = client.get_model_status("resnet", None).await?;
//! ```

use async_trait::async_trait;
use tracing::debug;

use crate::api_clients::{ServingApiClient, ServingApiConfig};
use crate::config::{HarnessConfig, Transport};
use crate::descriptor::ModelDescriptor;
use crate::error::ConformanceResult;
use crate::fixture::ServiceFixture;
use crate::grpc_clients::{GrpcClientConfig, ServingGrpcClient};
use crate::proto::{GetModelMetadataResponse, GetModelStatusResponse, PredictResponse};
use crate::request::{self, InferenceRequest};

/// Common interface for serving clients regardless of transport.
#[async_trait]
pub trait ServingTransport: Send + Sync {
    /// Get the transport name for debugging/logging.
    fn transport_name(&self) -> &'static str;

    /// Get the endpoint URL.
    fn endpoint(&self) -> &str;

    /// Run one inference call.
    async fn predict(&self, request: &InferenceRequest) -> ConformanceResult<PredictResponse>;

    /// Fetch signature metadata for a model.
    async fn get_model_metadata(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelMetadataResponse>;

    /// Fetch version status for a model.
    async fn get_model_status(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelStatusResponse>;
}

// ===================================================================================
// REST TRANSPORT IMPLEMENTATION
// ===================================================================================

/// REST transport wrapper that implements the unified interface.
#[derive(Debug, Clone)]
pub struct RestServingTransport {
    inner: ServingApiClient,
}

impl RestServingTransport {
    pub fn new(config: ServingApiConfig) -> ConformanceResult<Self> {
        Ok(Self {
            inner: ServingApiClient::new(config)?,
        })
    }

    pub fn from_harness_config(config: &HarnessConfig) -> ConformanceResult<Self> {
        Self::new(config.rest_client_config())
    }

    pub fn inner(&self) -> &ServingApiClient {
        &self.inner
    }
}

#[async_trait]
impl ServingTransport for RestServingTransport {
    fn transport_name(&self) -> &'static str {
        "REST"
    }

    fn endpoint(&self) -> &str {
        self.inner.base_url()
    }

    async fn predict(&self, request: &InferenceRequest) -> ConformanceResult<PredictResponse> {
        self.inner.predict(request).await
    }

    async fn get_model_metadata(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelMetadataResponse> {
        self.inner
            .get_model_metadata(model_name, model_version)
            .await
    }

    async fn get_model_status(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelStatusResponse> {
        self.inner.get_model_status(model_name, model_version).await
    }
}

// ===================================================================================
// GRPC TRANSPORT IMPLEMENTATION
// ===================================================================================

/// gRPC transport wrapper that implements the unified interface.
#[derive(Debug, Clone)]
pub struct GrpcServingTransport {
    inner: ServingGrpcClient,
}

impl GrpcServingTransport {
    /// Connect with default settings.
    pub async fn connect(endpoint: impl Into<String>) -> ConformanceResult<Self> {
        Ok(Self {
            inner: ServingGrpcClient::connect(endpoint).await?,
        })
    }

    pub async fn with_config(config: GrpcClientConfig) -> ConformanceResult<Self> {
        Ok(Self {
            inner: ServingGrpcClient::with_config(config).await?,
        })
    }

    pub async fn from_harness_config(config: &HarnessConfig) -> ConformanceResult<Self> {
        Self::with_config(config.grpc_client_config()).await
    }

    pub fn inner(&self) -> &ServingGrpcClient {
        &self.inner
    }
}

#[async_trait]
impl ServingTransport for GrpcServingTransport {
    fn transport_name(&self) -> &'static str {
        "gRPC"
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    async fn predict(&self, request: &InferenceRequest) -> ConformanceResult<PredictResponse> {
        self.inner.predict(request.to_predict_request()).await
    }

    async fn get_model_metadata(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelMetadataResponse> {
        self.inner
            .get_model_metadata(request::metadata_request(model_name, model_version))
            .await
    }

    async fn get_model_status(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelStatusResponse> {
        self.inner
            .get_model_status(request::status_request(model_name, model_version))
            .await
    }
}

// ===================================================================================
// UNIFIED CLIENT
// ===================================================================================

/// Serving client with the transport chosen at runtime.
#[derive(Debug, Clone)]
pub enum UnifiedServingClient {
    /// REST transport
    Rest(Box<RestServingTransport>),
    /// gRPC transport
    Grpc(Box<GrpcServingTransport>),
}

impl UnifiedServingClient {
    /// Create a client from configuration, selecting transport automatically.
    pub async fn from_config(config: &HarnessConfig) -> ConformanceResult<Self> {
        Self::with_transport(config.transport, config).await
    }

    /// Create a client for an explicit transport using the config's endpoints.
    pub async fn with_transport(
        transport: Transport,
        config: &HarnessConfig,
    ) -> ConformanceResult<Self> {
        debug!(%transport, "Creating serving client");
        match transport {
            Transport::Rest => {
                let client = RestServingTransport::from_harness_config(config)?;
                Ok(UnifiedServingClient::Rest(Box::new(client)))
            }
            Transport::Grpc => {
                let client = GrpcServingTransport::from_harness_config(config).await?;
                Ok(UnifiedServingClient::Grpc(Box::new(client)))
            }
        }
    }

    /// Create a client for a running service fixture.
    ///
    /// The fixture must serve the model `descriptor` describes. Host and
    /// ports come from the fixture; timeouts and REST format from `config`.
    pub async fn connect(
        fixture: &dyn ServiceFixture,
        descriptor: &ModelDescriptor,
        transport: Transport,
        config: &HarnessConfig,
    ) -> ConformanceResult<Self> {
        fixture.ensure_serves(descriptor)?;

        let ports = fixture.ports();
        let mut config = config.clone();
        config.service.host = fixture.host().to_string();
        config.service.grpc_port = ports.grpc_port;
        config.service.rest_port = ports.rest_port;
        Self::with_transport(transport, &config).await
    }

    /// Create a REST client directly.
    pub fn rest(config: ServingApiConfig) -> ConformanceResult<Self> {
        let client = RestServingTransport::new(config)?;
        Ok(UnifiedServingClient::Rest(Box::new(client)))
    }

    /// Create a gRPC client directly.
    pub async fn grpc(endpoint: impl Into<String>) -> ConformanceResult<Self> {
        let client = GrpcServingTransport::connect(endpoint).await?;
        Ok(UnifiedServingClient::Grpc(Box::new(client)))
    }

    /// Get a reference to the trait object for polymorphic use.
    pub fn as_transport(&self) -> &dyn ServingTransport {
        match self {
            UnifiedServingClient::Rest(c) => c.as_ref(),
            UnifiedServingClient::Grpc(c) => c.as_ref(),
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, UnifiedServingClient::Rest(_))
    }

    pub fn is_grpc(&self) -> bool {
        matches!(self, UnifiedServingClient::Grpc(_))
    }
}

#[async_trait]
impl ServingTransport for UnifiedServingClient {
    fn transport_name(&self) -> &'static str {
        self.as_transport().transport_name()
    }

    fn endpoint(&self) -> &str {
        self.as_transport().endpoint()
    }

    async fn predict(&self, request: &InferenceRequest) -> ConformanceResult<PredictResponse> {
        self.as_transport().predict(request).await
    }

    async fn get_model_metadata(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelMetadataResponse> {
        self.as_transport()
            .get_model_metadata(model_name, model_version)
            .await
    }

    async fn get_model_status(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelStatusResponse> {
        self.as_transport()
            .get_model_status(model_name, model_version)
            .await
    }
}
