//! # Response Normalization
//!
//! Converts serving responses into canonical, directly comparable shapes:
//!
//! - inference: `{tensor_name: TensorArray}`
//! - metadata: `{tensor_name: {dtype, shape}}` for inputs and outputs
//! - status: one record per reported version
//!
//! Both transports decode into the same proto messages first, so the rules
//! here apply identically to gRPC and REST. Normalization is total: a
//! response that cannot be represented yields
//! [`ConformanceError::Normalization`], never a defaulted value.

use std::collections::BTreeMap;

use ndarray::{ArrayD, IxDyn};
use prost::Message;
use serde::Serialize;

use crate::error::{ConformanceError, ConformanceResult};
use crate::proto::{
    model_version_status::State, Code, DataType, GetModelMetadataResponse,
    GetModelStatusResponse, ModelSpec, PredictResponse, SignatureDefMap, TensorInfo, TensorProto,
    TensorShapeProto, SIGNATURE_DEF_FIELD, SIGNATURE_DEF_MAP_TYPE_URL,
};

/// Signature consulted for model metadata.
pub const DEFAULT_SIGNATURE: &str = "serving_default";

/// Largest tensor a single typed value is broadcast to.
pub const MAX_BROADCAST_ELEMENTS: usize = 1 << 24;

// ============================================================================
// Canonical Types
// ============================================================================

/// Dense N-dimensional output tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorArray {
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
}

impl TensorArray {
    pub fn shape(&self) -> &[usize] {
        match self {
            TensorArray::Float(a) => a.shape(),
            TensorArray::Double(a) => a.shape(),
            TensorArray::Int32(a) => a.shape(),
            TensorArray::Int64(a) => a.shape(),
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            TensorArray::Float(_) => DataType::DtFloat,
            TensorArray::Double(_) => DataType::DtDouble,
            TensorArray::Int32(_) => DataType::DtInt32,
            TensorArray::Int64(_) => DataType::DtInt64,
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalized inference outputs keyed by tensor name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferenceResult {
    pub outputs: BTreeMap<String, TensorArray>,
}

impl InferenceResult {
    pub fn get(&self, name: &str) -> Option<&TensorArray> {
        self.outputs.get(name)
    }

    /// Output shapes keyed by tensor name.
    pub fn shapes(&self) -> BTreeMap<String, Vec<usize>> {
        self.outputs
            .iter()
            .map(|(name, array)| (name.clone(), array.shape().to_vec()))
            .collect()
    }
}

/// Dtype code and declared shape of one signature tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TensorMetadata {
    /// `DataType` enumeration code, kept numeric for exact comparison.
    pub dtype: i32,
    /// Declared dimensions; `-1` for dimensions the server leaves open.
    pub shape: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetadataResult {
    pub inputs: BTreeMap<String, TensorMetadata>,
    pub outputs: BTreeMap<String, TensorMetadata>,
}

/// Flattened status of a single model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionStatus {
    pub version: i64,
    pub state: i32,
    pub error_code: i32,
    pub error_message: String,
}

impl VersionStatus {
    /// Typed lifecycle state, `None` for values outside the enum.
    pub fn lifecycle_state(&self) -> Option<State> {
        State::try_from(self.state).ok()
    }

    /// Typed error code, `None` for values outside the enum.
    pub fn code(&self) -> Option<Code> {
        Code::try_from(self.error_code).ok()
    }
}

/// Per-version statuses in the order the server reported them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatusResult {
    pub versions: Vec<VersionStatus>,
}

impl StatusResult {
    pub fn first(&self) -> Option<&VersionStatus> {
        self.versions.first()
    }

    pub fn find(&self, version: i64) -> Option<&VersionStatus> {
        self.versions.iter().find(|v| v.version == version)
    }
}

// ============================================================================
// Inference
// ============================================================================

/// Extract and decode every requested output tensor.
pub fn inference(
    response: &PredictResponse,
    requested_outputs: &[String],
) -> ConformanceResult<InferenceResult> {
    let mut outputs = BTreeMap::new();
    for name in requested_outputs {
        let tensor = response.outputs.get(name).ok_or_else(|| {
            ConformanceError::normalization(
                format!("outputs.{name}"),
                format!(
                    "requested output missing, response carries {:?}",
                    response.outputs.keys().collect::<Vec<_>>()
                ),
            )
        })?;
        outputs.insert(name.clone(), tensor_to_array(name, tensor)?);
    }
    Ok(InferenceResult { outputs })
}

/// Decode a tensor using only the shape and dtype it declares itself.
pub fn tensor_to_array(name: &str, tensor: &TensorProto) -> ConformanceResult<TensorArray> {
    let field = format!("outputs.{name}");
    let dims = tensor_dims(&field, tensor.tensor_shape.as_ref())?;
    let count = element_count(&field, &dims)?;

    let array = match DataType::try_from(tensor.dtype) {
        Ok(DataType::DtFloat) => TensorArray::Float(shaped(
            &field,
            &dims,
            values::<f32, 4>(
                &field,
                &tensor.tensor_content,
                &tensor.float_val,
                count,
                f32::from_le_bytes,
            )?,
        )?),
        Ok(DataType::DtDouble) => TensorArray::Double(shaped(
            &field,
            &dims,
            values::<f64, 8>(
                &field,
                &tensor.tensor_content,
                &tensor.double_val,
                count,
                f64::from_le_bytes,
            )?,
        )?),
        Ok(DataType::DtInt32) => TensorArray::Int32(shaped(
            &field,
            &dims,
            values::<i32, 4>(
                &field,
                &tensor.tensor_content,
                &tensor.int_val,
                count,
                i32::from_le_bytes,
            )?,
        )?),
        Ok(DataType::DtInt64) => TensorArray::Int64(shaped(
            &field,
            &dims,
            values::<i64, 8>(
                &field,
                &tensor.tensor_content,
                &tensor.int64_val,
                count,
                i64::from_le_bytes,
            )?,
        )?),
        Ok(other) => {
            return Err(ConformanceError::normalization(
                format!("{field}.dtype"),
                format!("unsupported dtype {}", other.as_str_name()),
            ))
        }
        Err(_) => {
            return Err(ConformanceError::normalization(
                format!("{field}.dtype"),
                format!("unknown dtype code {}", tensor.dtype),
            ))
        }
    };
    Ok(array)
}

fn tensor_dims(field: &str, shape: Option<&TensorShapeProto>) -> ConformanceResult<Vec<usize>> {
    let shape = shape.ok_or_else(|| {
        ConformanceError::normalization(format!("{field}.tensor_shape"), "missing")
    })?;
    if shape.unknown_rank {
        return Err(ConformanceError::normalization(
            format!("{field}.tensor_shape"),
            "unknown rank on a concrete tensor",
        ));
    }
    shape
        .dim
        .iter()
        .map(|d| {
            usize::try_from(d.size).map_err(|_| {
                ConformanceError::normalization(
                    format!("{field}.tensor_shape"),
                    format!("dimension {} is not concrete in {:?}", d.size, shape.sizes()),
                )
            })
        })
        .collect()
}

fn element_count(field: &str, dims: &[usize]) -> ConformanceResult<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            ConformanceError::normalization(
                format!("{field}.tensor_shape"),
                format!("element count of {dims:?} overflows"),
            )
        })
}

/// Pick the element payload: raw content first, then the typed field.
fn values<T: Copy, const W: usize>(
    field: &str,
    content: &[u8],
    typed: &[T],
    count: usize,
    from_le: fn([u8; W]) -> T,
) -> ConformanceResult<Vec<T>> {
    if !content.is_empty() {
        if count.checked_mul(W) != Some(content.len()) {
            return Err(ConformanceError::normalization(
                format!("{field}.tensor_content"),
                format!(
                    "{} bytes cannot hold {count} elements of width {W}",
                    content.len()
                ),
            ));
        }
        return Ok(content
            .chunks_exact(W)
            .map(|chunk| {
                let mut buf = [0u8; W];
                buf.copy_from_slice(chunk);
                from_le(buf)
            })
            .collect());
    }

    match typed.len() {
        n if n == count => Ok(typed.to_vec()),
        // A single value fills the whole tensor
        1 if count <= MAX_BROADCAST_ELEMENTS => Ok(vec![typed[0]; count]),
        1 => Err(ConformanceError::normalization(
            format!("{field}.tensor_shape"),
            format!("refusing to broadcast one value to {count} elements"),
        )),
        0 if count > 0 => Err(ConformanceError::normalization(
            field,
            format!("no payload for a tensor of {count} elements"),
        )),
        n => Err(ConformanceError::normalization(
            field,
            format!("payload has {n} values, declared shape needs {count}"),
        )),
    }
}

fn shaped<T>(field: &str, dims: &[usize], data: Vec<T>) -> ConformanceResult<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(dims), data)
        .map_err(|e| ConformanceError::normalization(field, e.to_string()))
}

// ============================================================================
// Metadata
// ============================================================================

/// Flatten the default signature into input/output `{dtype, shape}` maps.
pub fn metadata(response: &GetModelMetadataResponse) -> ConformanceResult<MetadataResult> {
    let any = response.metadata.get(SIGNATURE_DEF_FIELD).ok_or_else(|| {
        ConformanceError::normalization(format!("metadata.{SIGNATURE_DEF_FIELD}"), "missing")
    })?;
    if !any.type_url.is_empty() && any.type_url != SIGNATURE_DEF_MAP_TYPE_URL {
        return Err(ConformanceError::normalization(
            format!("metadata.{SIGNATURE_DEF_FIELD}.type_url"),
            format!("expected {SIGNATURE_DEF_MAP_TYPE_URL}, got {}", any.type_url),
        ));
    }
    let map = SignatureDefMap::decode(any.value.as_slice()).map_err(|e| {
        ConformanceError::normalization(format!("metadata.{SIGNATURE_DEF_FIELD}"), e.to_string())
    })?;
    signature_map_to_metadata(&map)
}

pub fn signature_map_to_metadata(map: &SignatureDefMap) -> ConformanceResult<MetadataResult> {
    let signature = map.signature_def.get(DEFAULT_SIGNATURE).ok_or_else(|| {
        ConformanceError::normalization(
            format!("signature_def.{DEFAULT_SIGNATURE}"),
            format!(
                "missing, signatures present: {:?}",
                map.signature_def.keys().collect::<Vec<_>>()
            ),
        )
    })?;

    let flatten = |side: &str, tensors: &std::collections::HashMap<String, TensorInfo>| {
        tensors
            .iter()
            .map(|(name, info)| {
                let shape = info.tensor_shape.as_ref().ok_or_else(|| {
                    ConformanceError::normalization(
                        format!("{side}.{name}.tensor_shape"),
                        "missing",
                    )
                })?;
                Ok((
                    name.clone(),
                    TensorMetadata {
                        dtype: info.dtype,
                        shape: shape.sizes(),
                    },
                ))
            })
            .collect::<ConformanceResult<BTreeMap<_, _>>>()
    };

    Ok(MetadataResult {
        inputs: flatten("inputs", &signature.inputs)?,
        outputs: flatten("outputs", &signature.outputs)?,
    })
}

/// Model name echoed in a response's `model_spec`.
pub fn model_spec_name<'a>(spec: Option<&'a ModelSpec>) -> ConformanceResult<&'a str> {
    spec.map(|s| s.name.as_str())
        .ok_or_else(|| ConformanceError::normalization("model_spec", "missing"))
}

// ============================================================================
// Status
// ============================================================================

pub fn status(response: &GetModelStatusResponse) -> ConformanceResult<StatusResult> {
    let versions = response
        .model_version_status
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let status = entry.status.as_ref().ok_or_else(|| {
                ConformanceError::normalization(
                    format!("model_version_status[{index}].status"),
                    "missing",
                )
            })?;
            Ok(VersionStatus {
                version: entry.version,
                state: entry.state,
                error_code: status.error_code,
                error_message: status.error_message.clone(),
            })
        })
        .collect::<ConformanceResult<Vec<_>>>()?;

    Ok(StatusResult { versions })
}
