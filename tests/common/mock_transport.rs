//! Mock serving transport returning canned proto responses.
//!
//! Lets the conformance rules be exercised without a running server. Each
//! operation either returns its canned response or fails with the error
//! the test configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use prost::Message;

use serving_conformance::proto::{
    model_version_status::State, Code, DataType, GetModelMetadataResponse,
    GetModelStatusResponse, ModelSpec, ModelVersionStatus, PredictResponse, SignatureDef,
    SignatureDefMap, StatusProto, TensorInfo, TensorProto, TensorShapeProto,
    SIGNATURE_DEF_FIELD, SIGNATURE_DEF_MAP_TYPE_URL,
};
use serving_conformance::{
    ConformanceError, ConformanceResult, InferenceRequest, ModelDescriptor, ServingTransport,
};

/// How a mocked operation fails
#[derive(Debug, Clone)]
pub enum MockFailure {
    Unreachable,
    Service { code: String, message: String },
}

impl MockFailure {
    fn into_error(self) -> ConformanceError {
        match self {
            MockFailure::Unreachable => {
                ConformanceError::connection("mock://serving", "connection refused")
            }
            MockFailure::Service { code, message } => ConformanceError::service(code, message),
        }
    }
}

/// Canned-response transport
#[derive(Debug, Default)]
pub struct MockTransport {
    predict_response: Option<Result<PredictResponse, MockFailure>>,
    metadata_response: Option<Result<GetModelMetadataResponse, MockFailure>>,
    /// Returned in order; the last entry repeats once exhausted
    status_responses: Vec<GetModelStatusResponse>,
    status_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    /// Every inference request received
    pub received: Mutex<Vec<InferenceRequest>>,
    pub name: Option<&'static str>,
}

impl MockTransport {
    /// A transport that answers exactly like a conformant server for `descriptor`
    pub fn conformant(descriptor: &ModelDescriptor) -> Self {
        Self::default()
            .with_predict(predict_response(
                &descriptor.output_name,
                &descriptor.output_shape,
            ))
            .with_metadata(metadata_response(descriptor))
            .with_status(status_response(
                descriptor.expected_version(),
                State::Available,
                Code::Ok,
                "Version available",
            ))
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_predict(mut self, response: PredictResponse) -> Self {
        self.predict_response = Some(Ok(response));
        self
    }

    pub fn with_predict_failure(mut self, failure: MockFailure) -> Self {
        self.predict_response = Some(Err(failure));
        self
    }

    pub fn with_metadata(mut self, response: GetModelMetadataResponse) -> Self {
        self.metadata_response = Some(Ok(response));
        self
    }

    pub fn with_metadata_failure(mut self, failure: MockFailure) -> Self {
        self.metadata_response = Some(Err(failure));
        self
    }

    pub fn with_status(mut self, response: GetModelStatusResponse) -> Self {
        self.status_responses = vec![response];
        self
    }

    pub fn with_status_sequence(mut self, responses: Vec<GetModelStatusResponse>) -> Self {
        self.status_responses = responses;
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

fn not_configured(operation: &str) -> ConformanceError {
    ConformanceError::service("Unimplemented", format!("mock has no {operation} response"))
}

#[async_trait]
impl ServingTransport for MockTransport {
    fn transport_name(&self) -> &'static str {
        self.name.unwrap_or("mock")
    }

    fn endpoint(&self) -> &str {
        "mock://serving"
    }

    async fn predict(&self, request: &InferenceRequest) -> ConformanceResult<PredictResponse> {
        self.received.lock().unwrap().push(request.clone());
        match self.predict_response.clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Err(not_configured("predict")),
        }
    }

    async fn get_model_metadata(
        &self,
        _model_name: &str,
        _model_version: Option<i64>,
    ) -> ConformanceResult<GetModelMetadataResponse> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        match self.metadata_response.clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Err(not_configured("metadata")),
        }
    }

    async fn get_model_status(
        &self,
        _model_name: &str,
        _model_version: Option<i64>,
    ) -> ConformanceResult<GetModelStatusResponse> {
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.status_responses.len().saturating_sub(1));
        self.status_responses
            .get(index)
            .cloned()
            .ok_or_else(|| not_configured("status"))
    }
}

// ============================================================================
// Canned responses
// ============================================================================

/// Float output of the given shape, filled with a uniform distribution
pub fn predict_response(output_name: &str, shape: &[usize]) -> PredictResponse {
    let len: usize = shape.iter().product();
    let tensor = TensorProto {
        dtype: DataType::DtFloat as i32,
        tensor_shape: Some(TensorShapeProto::from_dims(shape.iter().map(|&d| d as i64))),
        float_val: vec![1.0 / len.max(1) as f32; len],
        ..Default::default()
    };

    PredictResponse {
        model_spec: Some(ModelSpec::new("resnet", Some(1))),
        outputs: HashMap::from([(output_name.to_string(), tensor)]),
    }
}

pub fn tensor_info(name: &str, dtype: DataType, shape: &[usize]) -> TensorInfo {
    TensorInfo {
        name: format!("{name}:0"),
        dtype: dtype as i32,
        tensor_shape: Some(TensorShapeProto::from_dims(shape.iter().map(|&d| d as i64))),
    }
}

/// Metadata response packing `signature` under `serving_default`
pub fn metadata_response_with(model_name: &str, signature: SignatureDef) -> GetModelMetadataResponse {
    let map = SignatureDefMap {
        signature_def: HashMap::from([("serving_default".to_string(), signature)]),
    };

    GetModelMetadataResponse {
        model_spec: Some(ModelSpec::new(model_name, Some(1))),
        metadata: HashMap::from([(
            SIGNATURE_DEF_FIELD.to_string(),
            prost_types::Any {
                type_url: SIGNATURE_DEF_MAP_TYPE_URL.to_string(),
                value: map.encode_to_vec(),
            },
        )]),
    }
}

/// Metadata response a conformant server reports for `descriptor`
pub fn metadata_response(descriptor: &ModelDescriptor) -> GetModelMetadataResponse {
    metadata_response_with(
        &descriptor.name,
        SignatureDef {
            inputs: HashMap::from([(
                descriptor.input_name.clone(),
                tensor_info(&descriptor.input_name, descriptor.dtype, &descriptor.input_shape),
            )]),
            outputs: HashMap::from([(
                descriptor.output_name.clone(),
                tensor_info(
                    &descriptor.output_name,
                    descriptor.dtype,
                    &descriptor.output_shape,
                ),
            )]),
            method_name: "tensorflow/serving/predict".to_string(),
        },
    )
}

pub fn version_status(version: i64, state: State, code: Code, message: &str) -> ModelVersionStatus {
    ModelVersionStatus {
        version,
        state: state as i32,
        status: Some(StatusProto {
            error_code: code as i32,
            error_message: message.to_string(),
        }),
    }
}

pub fn status_response(version: i64, state: State, code: Code, message: &str) -> GetModelStatusResponse {
    GetModelStatusResponse {
        model_version_status: vec![version_status(version, state, code, message)],
    }
}
