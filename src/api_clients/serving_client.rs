//! # Serving REST Client
//!
//! HTTP client for the serving REST API (`/v1/models/...`). Response bodies
//! are decoded into the same proto messages the gRPC client returns.

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use super::json_codec::{self, RestRequestFormat};
use crate::error::{ConformanceError, ConformanceResult};
use crate::proto::{GetModelMetadataResponse, GetModelStatusResponse, PredictResponse};
use crate::request::InferenceRequest;

/// Configuration for the serving REST client
#[derive(Debug, Clone)]
pub struct ServingApiConfig {
    /// Base URL for the REST API (e.g., "<http://localhost:8501>")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Body layout used for `predict`
    pub request_format: RestRequestFormat,
}

impl Default for ServingApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8501".to_string(),
            timeout_ms: 10000,
            connect_timeout_ms: 10000,
            request_format: RestRequestFormat::default(),
        }
    }
}

/// HTTP client for serving REST operations
#[derive(Debug, Clone)]
pub struct ServingApiClient {
    client: Client,
    base_url: Url,
    config: ServingApiConfig,
}

impl ServingApiClient {
    /// Create a new REST client with the given configuration
    pub fn new(config: ServingApiConfig) -> ConformanceResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ConformanceError::config_error(format!(
                "Invalid base URL '{}': {}",
                config.base_url, e
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(format!("serving-conformance/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConformanceError::config_error(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(
            "Created ServingApiClient for base_url: {}, timeout: {}ms, format: {}",
            base_url, config.timeout_ms, config.request_format
        );

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn request_format(&self) -> RestRequestFormat {
        self.config.request_format
    }

    /// Run inference using the configured body layout.
    pub async fn predict(&self, request: &InferenceRequest) -> ConformanceResult<PredictResponse> {
        self.predict_with_format(request, self.config.request_format)
            .await
    }

    /// Run inference using an explicit body layout.
    pub async fn predict_with_format(
        &self,
        request: &InferenceRequest,
        format: RestRequestFormat,
    ) -> ConformanceResult<PredictResponse> {
        let url = self.model_url(&request.model_name, request.model_version, ":predict")?;
        debug!("Sending predict ({}) to: {}", format, url);

        let body = json_codec::predict_body(request, format);
        let response = self.client.post(url).json(&body).send().await?;

        let body = self.read_body(response, "predict").await?;
        json_codec::predict_response(body, format, &request.output_names)
    }

    /// Fetch the model's signature metadata.
    pub async fn get_model_metadata(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelMetadataResponse> {
        let url = self.model_url(model_name, model_version, "/metadata")?;
        debug!("Getting model metadata from: {}", url);

        let response = self.client.get(url).send().await?;

        let body = self.read_body(response, "metadata").await?;
        json_codec::metadata_response(body)
    }

    /// Fetch the model's version status.
    pub async fn get_model_status(
        &self,
        model_name: &str,
        model_version: Option<i64>,
    ) -> ConformanceResult<GetModelStatusResponse> {
        let url = self.model_url(model_name, model_version, "")?;
        debug!("Getting model status from: {}", url);

        let response = self.client.get(url).send().await?;

        let body = self.read_body(response, "status").await?;
        json_codec::status_response(body)
    }

    /// `/v1/models/{name}[/versions/{v}]{suffix}`
    fn model_url(
        &self,
        model_name: &str,
        model_version: Option<i64>,
        suffix: &str,
    ) -> ConformanceResult<Url> {
        let path = match model_version {
            Some(version) => format!("/v1/models/{model_name}/versions/{version}{suffix}"),
            None => format!("/v1/models/{model_name}{suffix}"),
        };
        self.base_url
            .join(&path)
            .map_err(|e| ConformanceError::Request(format!("Invalid URL '{path}': {e}")))
    }

    async fn read_body(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> ConformanceResult<Value> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                ConformanceError::normalization(
                    format!("{operation} response"),
                    format!("invalid JSON: {e}"),
                )
            });
        }

        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(text);

        error!("REST {} request failed: {} - {}", operation, status, message);
        match status {
            StatusCode::BAD_REQUEST => Err(ConformanceError::Request(message)),
            other => Err(ConformanceError::service(other.as_u16().to_string(), message)),
        }
    }
}
