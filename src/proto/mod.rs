//! # Serving API Wire Types
//!
//! Protocol Buffer messages and gRPC stubs of the TensorFlow-Serving API,
//! generated by `build.rs` from the subset under `proto/`. Only the fields
//! the harness reads or writes are declared; prost skips the rest on decode.

/// Generated code, nested to mirror the proto packages.
pub mod tensorflow {
    tonic::include_proto!("tensorflow");

    pub mod error {
        tonic::include_proto!("tensorflow.error");
    }

    pub mod serving {
        tonic::include_proto!("tensorflow.serving");
    }
}

pub use tensorflow::error::Code;
pub use tensorflow::serving::{
    model_version_status, GetModelMetadataRequest, GetModelMetadataResponse,
    GetModelStatusRequest, GetModelStatusResponse, ModelSpec, ModelVersionStatus,
    PredictRequest, PredictResponse, SignatureDefMap, StatusProto,
};
pub use tensorflow::{
    tensor_shape_proto, DataType, SignatureDef, TensorInfo, TensorProto, TensorShapeProto,
};

/// Generated gRPC clients.
pub mod client {
    pub use super::tensorflow::serving::model_service_client::ModelServiceClient;
    pub use super::tensorflow::serving::prediction_service_client::PredictionServiceClient;
}

/// Generated gRPC service traits and servers.
pub mod server {
    pub use super::tensorflow::serving::model_service_server::{ModelService, ModelServiceServer};
    pub use super::tensorflow::serving::prediction_service_server::{
        PredictionService, PredictionServiceServer,
    };
}

/// Metadata field requested from `GetModelMetadata`.
pub const SIGNATURE_DEF_FIELD: &str = "signature_def";

/// Type URL of the `Any` payload stored under [`SIGNATURE_DEF_FIELD`].
pub const SIGNATURE_DEF_MAP_TYPE_URL: &str =
    "type.googleapis.com/tensorflow.serving.SignatureDefMap";

impl ModelSpec {
    pub fn new(name: impl Into<String>, version: Option<i64>) -> Self {
        Self {
            name: name.into(),
            version,
            signature_name: String::new(),
        }
    }
}

impl TensorShapeProto {
    /// Build a fully known shape from dimension sizes.
    pub fn from_dims<I>(dims: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        Self {
            dim: dims
                .into_iter()
                .map(|size| tensor_shape_proto::Dim {
                    size,
                    name: String::new(),
                })
                .collect(),
            unknown_rank: false,
        }
    }

    /// Dimension sizes in order, as declared.
    pub fn sizes(&self) -> Vec<i64> {
        self.dim.iter().map(|d| d.size).collect()
    }
}
