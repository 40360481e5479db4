//! # Model Descriptors
//!
//! Static expected metadata for the models a serving endpoint is checked
//! against. Descriptors are built once and only read afterwards.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::normalize::{MetadataResult, TensorMetadata};
use crate::proto::DataType;

/// Expected name, version, tensor names, shapes and dtype of one served model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    /// Version to address explicitly; `None` lets the server pick.
    pub version: Option<i64>,
    pub input_name: String,
    pub output_name: String,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub dtype: DataType,
}

/// Reference ResNet classifier served as `resnet`.
pub static RESNET: LazyLock<ModelDescriptor> = LazyLock::new(ModelDescriptor::resnet);

impl ModelDescriptor {
    pub fn resnet() -> Self {
        Self {
            name: "resnet".to_string(),
            version: None,
            input_name: "map/TensorArrayStack/TensorArrayGatherV3".to_string(),
            output_name: "softmax_tensor".to_string(),
            input_shape: vec![1, 224, 224, 3],
            output_shape: vec![1, 1000],
            dtype: DataType::DtFloat,
        }
    }

    /// Number of elements in one input tensor.
    pub fn input_len(&self) -> usize {
        self.input_shape.iter().product()
    }

    /// Version the status check expects to find.
    pub fn expected_version(&self) -> i64 {
        self.version.unwrap_or(1)
    }

    /// Input and output metadata exactly as a conformant server reports it.
    pub fn expected_metadata(&self) -> MetadataResult {
        let dtype = self.dtype as i32;
        let describe = |name: &str, shape: &[usize]| {
            BTreeMap::from([(
                name.to_string(),
                TensorMetadata {
                    dtype,
                    shape: shape.iter().map(|&d| d as i64).collect(),
                },
            )])
        };

        MetadataResult {
            inputs: describe(&self.input_name, &self.input_shape),
            outputs: describe(&self.output_name, &self.output_shape),
        }
    }
}
