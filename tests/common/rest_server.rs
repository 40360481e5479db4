//! In-process stand-in for the serving REST API.
//!
//! Answers with the same JSON shapes as the real server: proto-JSON for
//! metadata and status, `predictions` / `outputs` for inference.

use std::time::Duration;

use anyhow::Result;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use serving_conformance::{RestRequestFormat, RestServingTransport, ServingApiConfig, RESNET};

/// Running in-process REST server
pub struct RestTestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

impl RestTestServer {
    /// Start on an ephemeral loopback port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server failed to start");
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            handle,
            shutdown_tx,
        })
    }

    pub fn transport(&self, request_format: RestRequestFormat) -> Result<RestServingTransport> {
        Ok(RestServingTransport::new(ServingApiConfig {
            base_url: self.base_url.clone(),
            timeout_ms: 5000,
            connect_timeout_ms: 1000,
            request_format,
        })?)
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(5), self.handle).await??;
        Ok(())
    }
}

// ============================================================================
// Canned REST API
// ============================================================================

fn router() -> Router {
    Router::new()
        .route("/v1/models/resnet:predict", post(predict))
        .route("/v1/models/resnet/metadata", get(metadata))
        .route("/v1/models/resnet", get(latest_status))
        .route(
            "/v1/models/resnet/versions/{version}",
            get(version_status).post(versioned_predict),
        )
        .route(
            "/v1/models/resnet/versions/{version}/metadata",
            get(metadata),
        )
        .route("/v1/models/ragged:predict", post(ragged_predict))
}

fn json_shape(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }
    shape
}

/// Unwrap `{input_name: value}` or fail the way the server does
fn input_value(value: &Value) -> Result<&Value, String> {
    match value {
        Value::Object(named) => named
            .get(RESNET.input_name.as_str())
            .ok_or_else(|| format!("Missing input: {:?}", named.keys().collect::<Vec<_>>())),
        unnamed => Ok(unnamed),
    }
}

fn bad_request(message: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

async fn predict(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let probabilities = vec![0.001_f32; 1000];

    if let Some(instances) = body.get("instances").and_then(Value::as_array) {
        let mut shape = vec![instances.len()];
        for instance in instances {
            match input_value(instance) {
                Ok(value) => {
                    shape.truncate(1);
                    shape.extend(json_shape(value));
                }
                Err(message) => return bad_request(message),
            }
        }
        if shape != RESNET.input_shape {
            return bad_request(format!("Input to reshape has shape {shape:?}"));
        }
        return (
            StatusCode::OK,
            Json(json!({ "predictions": [probabilities] })),
        );
    }

    if let Some(inputs) = body.get("inputs") {
        return match input_value(inputs) {
            Ok(value) if json_shape(value) == RESNET.input_shape => (
                StatusCode::OK,
                Json(json!({ "outputs": [probabilities] })),
            ),
            Ok(value) => bad_request(format!(
                "Input to reshape has shape {:?}",
                json_shape(value)
            )),
            Err(message) => bad_request(message),
        };
    }

    bad_request("Missing 'inputs' or 'instances' key".to_string())
}

/// `POST /v1/models/resnet/versions/{v}:predict`; the verb shares the version segment
async fn versioned_predict(
    Path(segment): Path<String>,
    body: Json<Value>,
) -> (StatusCode, Json<Value>) {
    match segment.as_str() {
        "1:predict" => predict(body).await,
        other => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown route segment {other}") })),
        ),
    }
}

async fn ragged_predict() -> Json<Value> {
    Json(json!({ "predictions": [[0.5, 0.5], [1.0]] }))
}

fn tensor_info_json(name: &str, shape: &[usize]) -> Value {
    json!({
        "dtype": "DT_FLOAT",
        "tensor_shape": {
            "dim": shape
                .iter()
                .map(|d| json!({ "size": d.to_string(), "name": "" }))
                .collect::<Vec<_>>(),
            "unknown_rank": false
        },
        "name": format!("{name}:0")
    })
}

async fn metadata() -> Json<Value> {
    Json(json!({
        "model_spec": { "name": "resnet", "signature_name": "", "version": "1" },
        "metadata": {
            "signature_def": {
                "signature_def": {
                    "serving_default": {
                        "inputs": {
                            RESNET.input_name.as_str(): tensor_info_json(&RESNET.input_name, &RESNET.input_shape)
                        },
                        "outputs": {
                            RESNET.output_name.as_str(): tensor_info_json(&RESNET.output_name, &RESNET.output_shape)
                        },
                        "method_name": "tensorflow/serving/predict"
                    }
                }
            }
        }
    }))
}

async fn latest_status() -> Json<Value> {
    Json(json!({
        "model_version_status": [{
            "version": "1",
            "state": "AVAILABLE",
            "status": { "error_code": "OK", "error_message": "Version available" }
        }]
    }))
}

async fn version_status(Path(version): Path<i64>) -> (StatusCode, Json<Value>) {
    if version != 1 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Could not find version {version} of model resnet") })),
        );
    }
    (StatusCode::OK, latest_status().await)
}
