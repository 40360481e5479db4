//! # Serving Requests
//!
//! Transport-neutral request values and their proto encodings. A request is
//! built per check, handed to one transport and dropped.

use std::collections::HashMap;

use ndarray::{ArrayD, IxDyn};

use crate::descriptor::ModelDescriptor;
use crate::normalize::TensorArray;
use crate::proto::{
    DataType, GetModelMetadataRequest, GetModelStatusRequest, ModelSpec, PredictRequest,
    TensorProto, TensorShapeProto, SIGNATURE_DEF_FIELD,
};

/// One inference call: a single named input and the outputs to return.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub model_name: String,
    pub model_version: Option<i64>,
    pub input_name: String,
    pub input: TensorArray,
    pub output_names: Vec<String>,
}

impl InferenceRequest {
    /// All-ones input of the descriptor's exact shape and dtype.
    ///
    /// Returns `None` for dtypes the harness cannot materialize.
    pub fn ones(descriptor: &ModelDescriptor) -> Option<Self> {
        let shape = IxDyn(&descriptor.input_shape);
        let input = match descriptor.dtype {
            DataType::DtFloat => TensorArray::Float(ArrayD::ones(shape)),
            DataType::DtDouble => TensorArray::Double(ArrayD::ones(shape)),
            DataType::DtInt32 => TensorArray::Int32(ArrayD::ones(shape)),
            DataType::DtInt64 => TensorArray::Int64(ArrayD::ones(shape)),
            _ => return None,
        };

        Some(Self {
            model_name: descriptor.name.clone(),
            model_version: descriptor.version,
            input_name: descriptor.input_name.clone(),
            input,
            output_names: vec![descriptor.output_name.clone()],
        })
    }

    pub fn to_predict_request(&self) -> PredictRequest {
        PredictRequest {
            model_spec: Some(ModelSpec::new(&self.model_name, self.model_version)),
            inputs: HashMap::from([(self.input_name.clone(), tensor_proto(&self.input))]),
            output_filter: self.output_names.clone(),
        }
    }
}

/// Encode an array as `tensor_content`, little-endian, row-major.
pub fn tensor_proto(array: &TensorArray) -> TensorProto {
    let tensor_content: Vec<u8> = match array {
        TensorArray::Float(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        TensorArray::Double(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        TensorArray::Int32(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        TensorArray::Int64(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
    };

    TensorProto {
        dtype: array.dtype() as i32,
        tensor_shape: Some(TensorShapeProto::from_dims(
            array.shape().iter().map(|&d| d as i64),
        )),
        tensor_content,
        ..Default::default()
    }
}

pub fn metadata_request(model_name: &str, model_version: Option<i64>) -> GetModelMetadataRequest {
    GetModelMetadataRequest {
        model_spec: Some(ModelSpec::new(model_name, model_version)),
        metadata_field: vec![SIGNATURE_DEF_FIELD.to_string()],
    }
}

pub fn status_request(model_name: &str, model_version: Option<i64>) -> GetModelStatusRequest {
    GetModelStatusRequest {
        model_spec: Some(ModelSpec::new(model_name, model_version)),
    }
}
