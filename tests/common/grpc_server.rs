//! In-process stand-in for the serving gRPC API.
//!
//! Serves the generated `PredictionService` and `ModelService` with canned
//! responses for `RESNET`, validating requests the way the real server
//! does. A model named `slow` answers status calls after a long delay.

use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use serving_conformance::proto::model_version_status::State;
use serving_conformance::proto::server::{
    ModelService, ModelServiceServer, PredictionService, PredictionServiceServer,
};
use serving_conformance::proto::{
    Code, DataType, GetModelMetadataRequest, GetModelMetadataResponse, GetModelStatusRequest,
    GetModelStatusResponse, ModelSpec, PredictRequest, PredictResponse,
};
use serving_conformance::{GrpcClientConfig, GrpcServingTransport, RESNET};

use super::mock_transport::{metadata_response, predict_response, status_response};

/// Model whose status call stalls
pub const SLOW_MODEL: &str = "slow";

const SLOW_DELAY: Duration = Duration::from_secs(2);

/// Running in-process gRPC server
pub struct GrpcTestServer {
    pub endpoint: String,
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

impl GrpcTestServer {
    /// Start on an ephemeral loopback port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            Server::builder()
                .add_service(PredictionServiceServer::new(CannedServing))
                .add_service(ModelServiceServer::new(CannedServing))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("gRPC server failed to start");
        });

        Ok(Self {
            endpoint: format!("http://{addr}"),
            handle,
            shutdown_tx,
        })
    }

    pub async fn transport(&self) -> Result<GrpcServingTransport> {
        self.transport_with_timeout(Duration::from_secs(5)).await
    }

    pub async fn transport_with_timeout(&self, timeout: Duration) -> Result<GrpcServingTransport> {
        let config = GrpcClientConfig::new(&self.endpoint)
            .with_timeout(timeout)
            .with_connect_timeout(Duration::from_secs(1));
        Ok(GrpcServingTransport::with_config(config).await?)
    }

    /// Stop the server; drop every client first so no connection lingers
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(5), self.handle).await??;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct CannedServing;

fn served_spec(spec: Option<&ModelSpec>) -> Result<&ModelSpec, Status> {
    let spec = spec.ok_or_else(|| Status::invalid_argument("Missing ModelSpec"))?;
    if spec.name != RESNET.name {
        return Err(Status::not_found(format!(
            "Servable not found for request: Latest({})",
            spec.name
        )));
    }
    match spec.version {
        Some(version) if version != 1 => Err(Status::not_found(format!(
            "Servable not found for request: Specific({}, {version})",
            spec.name
        ))),
        _ => Ok(spec),
    }
}

#[tonic::async_trait]
impl PredictionService for CannedServing {
    async fn predict(
        &self,
        request: Request<PredictRequest>,
    ) -> Result<Response<PredictResponse>, Status> {
        let request = request.into_inner();
        served_spec(request.model_spec.as_ref())?;

        let input = request.inputs.get(&RESNET.input_name).ok_or_else(|| {
            Status::invalid_argument(format!(
                "input tensor alias not found in signature: {:?}",
                request.inputs.keys().collect::<Vec<_>>()
            ))
        })?;

        let expected: Vec<i64> = RESNET.input_shape.iter().map(|&d| d as i64).collect();
        let declared = input
            .tensor_shape
            .as_ref()
            .map(|shape| shape.sizes())
            .unwrap_or_default();
        if declared != expected {
            return Err(Status::invalid_argument(format!(
                "Input to reshape has shape {declared:?}"
            )));
        }
        if input.dtype != DataType::DtFloat as i32
            || input.tensor_content.len() != RESNET.input_len() * 4
        {
            return Err(Status::invalid_argument("Expected float input"));
        }
        if let Some(unknown) = request
            .output_filter
            .iter()
            .find(|name| **name != RESNET.output_name)
        {
            return Err(Status::invalid_argument(format!(
                "output tensor alias not found in signature: {unknown}"
            )));
        }

        Ok(Response::new(predict_response(
            &RESNET.output_name,
            &RESNET.output_shape,
        )))
    }

    async fn get_model_metadata(
        &self,
        request: Request<GetModelMetadataRequest>,
    ) -> Result<Response<GetModelMetadataResponse>, Status> {
        let request = request.into_inner();
        served_spec(request.model_spec.as_ref())?;
        if request.metadata_field != ["signature_def"] {
            return Err(Status::invalid_argument(format!(
                "Metadata field {:?} is not supported",
                request.metadata_field
            )));
        }
        Ok(Response::new(metadata_response(&RESNET)))
    }
}

#[tonic::async_trait]
impl ModelService for CannedServing {
    async fn get_model_status(
        &self,
        request: Request<GetModelStatusRequest>,
    ) -> Result<Response<GetModelStatusResponse>, Status> {
        let request = request.into_inner();
        if request.model_spec.as_ref().map(|s| s.name.as_str()) == Some(SLOW_MODEL) {
            tokio::time::sleep(SLOW_DELAY).await;
        }
        served_spec(request.model_spec.as_ref())?;
        Ok(Response::new(status_response(
            1,
            State::Available,
            Code::Ok,
            "Version available",
        )))
    }
}
