//! # Serving gRPC Client
//!
//! gRPC client for the TensorFlow-Serving `PredictionService` and
//! `ModelService`. Returns raw proto responses; normalization happens in
//! [`crate::normalize`] so both transports share it.

use std::time::Duration;

use tonic::transport::Channel;
use tracing::{debug, info};

use super::common::GrpcClientConfig;
use crate::error::ConformanceResult;
use crate::proto::{
    client::{ModelServiceClient, PredictionServiceClient},
    GetModelMetadataRequest, GetModelMetadataResponse, GetModelStatusRequest,
    GetModelStatusResponse, PredictRequest, PredictResponse,
};

/// gRPC client for a model-serving endpoint.
///
/// # Examples
///
/// ```rust,ignore
/// use serving_conformance::grpc_clients::ServingGrpcClient;
/// use serving_conformance::request;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ServingGrpcClient::connect("http://localhost:8500").await?;
///     let status = client
///         .get_model_status(request::status_request("resnet", None))
///         .await?;
///     println!("versions: {}", status.model_version_status.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ServingGrpcClient {
    prediction_client: PredictionServiceClient<Channel>,
    model_client: ModelServiceClient<Channel>,
    endpoint: String,
    timeout: Duration,
}

impl ServingGrpcClient {
    /// Connect to a gRPC endpoint with default configuration.
    pub async fn connect(endpoint: impl Into<String>) -> ConformanceResult<Self> {
        Self::with_config(GrpcClientConfig::new(endpoint)).await
    }

    /// Connect with full configuration.
    pub async fn with_config(config: GrpcClientConfig) -> ConformanceResult<Self> {
        let endpoint = config.endpoint.clone();
        let channel = config.connect().await?;

        info!(endpoint = %endpoint, "Connected to serving gRPC endpoint");

        Ok(Self {
            prediction_client: PredictionServiceClient::new(channel.clone()),
            model_client: ModelServiceClient::new(channel),
            endpoint,
            timeout: config.timeout,
        })
    }

    /// Get the configured endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Wrap a message with the per-call deadline.
    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);
        request
    }

    // ===================================================================================
    // PREDICTION SERVICE
    // ===================================================================================

    pub async fn predict(&self, request: PredictRequest) -> ConformanceResult<PredictResponse> {
        debug!(
            model = ?request.model_spec.as_ref().map(|s| &s.name),
            outputs = ?request.output_filter,
            "Sending Predict via gRPC"
        );
        let response = self
            .prediction_client
            .clone()
            .predict(self.request(request))
            .await?
            .into_inner();
        Ok(response)
    }

    pub async fn get_model_metadata(
        &self,
        request: GetModelMetadataRequest,
    ) -> ConformanceResult<GetModelMetadataResponse> {
        debug!(
            model = ?request.model_spec.as_ref().map(|s| &s.name),
            "Sending GetModelMetadata via gRPC"
        );
        let response = self
            .prediction_client
            .clone()
            .get_model_metadata(self.request(request))
            .await?
            .into_inner();
        Ok(response)
    }

    // ===================================================================================
    // MODEL SERVICE
    // ===================================================================================

    pub async fn get_model_status(
        &self,
        request: GetModelStatusRequest,
    ) -> ConformanceResult<GetModelStatusResponse> {
        debug!(
            model = ?request.model_spec.as_ref().map(|s| &s.name),
            "Sending GetModelStatus via gRPC"
        );
        let response = self
            .model_client
            .clone()
            .get_model_status(self.request(request))
            .await?
            .into_inner();
        Ok(response)
    }
}
