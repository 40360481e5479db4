//! JSON bodies of the serving REST API.
//!
//! Requests are encoded in one of the four `predict` layouts. Responses are
//! decoded into the proto messages the gRPC client returns, so the shared
//! normalizer sees one representation regardless of transport. Metadata and
//! status bodies are proto-JSON: int64 values may arrive as strings or
//! numbers and enums as names or numbers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ndarray::ArrayViewD;
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ConformanceError, ConformanceResult};
use crate::normalize::TensorArray;
use crate::proto::{
    model_version_status::State, Code, DataType, GetModelMetadataResponse,
    GetModelStatusResponse, ModelSpec, ModelVersionStatus, PredictResponse, SignatureDef,
    SignatureDefMap, StatusProto, TensorInfo, TensorProto, TensorShapeProto, SIGNATURE_DEF_FIELD,
    SIGNATURE_DEF_MAP_TYPE_URL,
};
use crate::request::InferenceRequest;

// ============================================================================
// Request Formats
// ============================================================================

/// Layout of a REST `predict` body.
///
/// Row formats send `instances` (one entry per batch element), column
/// formats send `inputs` (the whole tensor). Named variants key the data by
/// input tensor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestRequestFormat {
    #[default]
    RowName,
    RowNoname,
    ColumnName,
    ColumnNoname,
}

impl RestRequestFormat {
    pub const ALL: [RestRequestFormat; 4] = [
        RestRequestFormat::RowName,
        RestRequestFormat::RowNoname,
        RestRequestFormat::ColumnName,
        RestRequestFormat::ColumnNoname,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RestRequestFormat::RowName => "row_name",
            RestRequestFormat::RowNoname => "row_noname",
            RestRequestFormat::ColumnName => "column_name",
            RestRequestFormat::ColumnNoname => "column_noname",
        }
    }

    pub fn is_row(&self) -> bool {
        matches!(
            self,
            RestRequestFormat::RowName | RestRequestFormat::RowNoname
        )
    }
}

impl fmt::Display for RestRequestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestRequestFormat {
    type Err = ConformanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                ConformanceError::config_error(format!("Unknown REST request format: {s}"))
            })
    }
}

// ============================================================================
// Predict
// ============================================================================

/// Encode the request body for the given layout.
pub fn predict_body(request: &InferenceRequest, format: RestRequestFormat) -> Value {
    let name = &request.input_name;
    match format {
        RestRequestFormat::RowName => json!({
            "instances": instances(&request.input)
                .into_iter()
                .map(|instance| json!({ name.as_str(): instance }))
                .collect::<Vec<_>>()
        }),
        RestRequestFormat::RowNoname => json!({ "instances": instances(&request.input) }),
        RestRequestFormat::ColumnName => json!({
            "inputs": { name.as_str(): array_to_json(&request.input) }
        }),
        RestRequestFormat::ColumnNoname => json!({ "inputs": array_to_json(&request.input) }),
    }
}

fn instances(array: &TensorArray) -> Vec<Value> {
    match array_to_json(array) {
        Value::Array(rows) => rows,
        scalar => vec![scalar],
    }
}

fn array_to_json(array: &TensorArray) -> Value {
    match array {
        TensorArray::Float(a) => nested(a.view()),
        TensorArray::Double(a) => nested(a.view()),
        TensorArray::Int32(a) => nested(a.view()),
        TensorArray::Int64(a) => nested(a.view()),
    }
}

fn nested<T>(view: ArrayViewD<'_, T>) -> Value
where
    T: Copy + Into<Value>,
{
    if view.ndim() == 0 {
        return view.iter().next().map_or(Value::Null, |&v| v.into());
    }
    Value::Array(view.outer_iter().map(nested).collect())
}

/// Decode a `predict` response into the outputs the request asked for.
///
/// Row responses carry `predictions`: per-instance values for a single
/// output, or per-instance objects keyed by output name. Column responses
/// carry `outputs`: the value itself, or an object keyed by output name.
pub fn predict_response(
    body: Value,
    format: RestRequestFormat,
    output_names: &[String],
) -> ConformanceResult<PredictResponse> {
    reject_error_body(&body)?;

    let mut outputs = HashMap::new();
    if format.is_row() {
        let predictions = body
            .get("predictions")
            .and_then(Value::as_array)
            .ok_or_else(|| ConformanceError::normalization("predictions", "missing or not a list"))?;

        if predictions.first().is_some_and(Value::is_object) {
            for name in output_names {
                let column = predictions
                    .iter()
                    .map(|instance| {
                        instance.get(name).cloned().ok_or_else(|| {
                            ConformanceError::normalization(
                                format!("predictions[].{name}"),
                                "missing from instance",
                            )
                        })
                    })
                    .collect::<ConformanceResult<Vec<_>>>()?;
                outputs.insert(name.clone(), json_to_tensor(name, &Value::Array(column))?);
            }
        } else if let Some(name) = output_names.first() {
            outputs.insert(
                name.clone(),
                json_to_tensor(name, &Value::Array(predictions.clone()))?,
            );
        }
    } else {
        let value = body
            .get("outputs")
            .ok_or_else(|| ConformanceError::normalization("outputs", "missing"))?;

        match value {
            Value::Object(named) => {
                for name in output_names {
                    if let Some(tensor) = named.get(name) {
                        outputs.insert(name.clone(), json_to_tensor(name, tensor)?);
                    }
                }
            }
            unnamed => {
                if let Some(name) = output_names.first() {
                    outputs.insert(name.clone(), json_to_tensor(name, unnamed)?);
                }
            }
        }
    }

    Ok(PredictResponse {
        model_spec: None,
        outputs,
    })
}

/// Build a float tensor from a nested JSON array, deriving the shape from
/// its nesting. Ragged arrays and non-numeric leaves are rejected.
pub fn json_to_tensor(name: &str, value: &Value) -> ConformanceResult<TensorProto> {
    let mut dims = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        dims.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }

    let mut float_val = Vec::new();
    flatten_into(name, value, &dims, &mut float_val)?;

    Ok(TensorProto {
        dtype: DataType::DtFloat as i32,
        tensor_shape: Some(TensorShapeProto::from_dims(dims.iter().map(|&d| d as i64))),
        float_val,
        ..Default::default()
    })
}

fn flatten_into(
    name: &str,
    value: &Value,
    dims: &[usize],
    out: &mut Vec<f32>,
) -> ConformanceResult<()> {
    match (dims.split_first(), value) {
        (None, Value::Number(n)) => {
            let v = n.as_f64().ok_or_else(|| {
                ConformanceError::normalization(name, format!("{n} is not representable"))
            })?;
            out.push(v as f32);
            Ok(())
        }
        (Some((&len, rest)), Value::Array(items)) if items.len() == len => items
            .iter()
            .try_for_each(|item| flatten_into(name, item, rest, out)),
        (Some((&len, _)), Value::Array(items)) => Err(ConformanceError::normalization(
            name,
            format!("ragged array: expected {len} elements, found {}", items.len()),
        )),
        (_, other) => Err(ConformanceError::normalization(
            name,
            format!("unexpected value {other} at depth {}", dims.len()),
        )),
    }
}

// ============================================================================
// Metadata / Status (proto-JSON)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Int64Json {
    Number(i64),
    Text(String),
}

impl Default for Int64Json {
    fn default() -> Self {
        Int64Json::Number(0)
    }
}

impl Int64Json {
    fn resolve(&self, field: &str) -> ConformanceResult<i64> {
        match self {
            Int64Json::Number(n) => Ok(*n),
            Int64Json::Text(s) => s.parse().map_err(|_| {
                ConformanceError::normalization(field, format!("'{s}' is not an int64"))
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EnumJson {
    Number(i32),
    Name(String),
}

impl Default for EnumJson {
    fn default() -> Self {
        EnumJson::Number(0)
    }
}

impl EnumJson {
    fn resolve(&self, field: &str, by_name: impl Fn(&str) -> Option<i32>) -> ConformanceResult<i32> {
        match self {
            EnumJson::Number(n) => Ok(*n),
            EnumJson::Name(s) => by_name(s).ok_or_else(|| {
                ConformanceError::normalization(field, format!("unknown enum value '{s}'"))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelSpecJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: Option<Int64Json>,
    #[serde(default)]
    signature_name: String,
}

impl ModelSpecJson {
    fn into_proto(self) -> ConformanceResult<ModelSpec> {
        Ok(ModelSpec {
            name: self.name,
            version: self
                .version
                .map(|v| v.resolve("model_spec.version"))
                .transpose()?,
            signature_name: self.signature_name,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct DimJson {
    #[serde(default)]
    size: Int64Json,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct TensorShapeJson {
    #[serde(default)]
    dim: Vec<DimJson>,
    #[serde(default)]
    unknown_rank: bool,
}

#[derive(Debug, Deserialize)]
struct TensorInfoJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dtype: EnumJson,
    #[serde(default)]
    tensor_shape: Option<TensorShapeJson>,
}

#[derive(Debug, Deserialize)]
struct SignatureDefJson {
    #[serde(default)]
    inputs: HashMap<String, TensorInfoJson>,
    #[serde(default)]
    outputs: HashMap<String, TensorInfoJson>,
    #[serde(default)]
    method_name: String,
}

#[derive(Debug, Deserialize)]
struct SignatureDefMapJson {
    signature_def: HashMap<String, SignatureDefJson>,
}

#[derive(Debug, Deserialize)]
struct MetadataResponseJson {
    model_spec: Option<ModelSpecJson>,
    metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct StatusProtoJson {
    #[serde(default)]
    error_code: EnumJson,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct VersionStatusJson {
    #[serde(default)]
    version: Int64Json,
    #[serde(default)]
    state: EnumJson,
    #[serde(default)]
    status: Option<StatusProtoJson>,
}

#[derive(Debug, Deserialize)]
struct StatusResponseJson {
    model_version_status: Vec<VersionStatusJson>,
}

fn parse<T: serde::de::DeserializeOwned>(field: &str, value: Value) -> ConformanceResult<T> {
    serde_json::from_value(value).map_err(|e| ConformanceError::normalization(field, e.to_string()))
}

fn tensor_info_to_proto(path: &str, info: TensorInfoJson) -> ConformanceResult<TensorInfo> {
    let tensor_shape = info
        .tensor_shape
        .map(|shape| {
            let sizes = shape
                .dim
                .iter()
                .map(|d| d.size.resolve(&format!("{path}.tensor_shape.dim.size")))
                .collect::<ConformanceResult<Vec<_>>>()?;
            let mut proto = TensorShapeProto::from_dims(sizes);
            for (dim, json) in proto.dim.iter_mut().zip(shape.dim) {
                dim.name = json.name;
            }
            proto.unknown_rank = shape.unknown_rank;
            Ok::<_, ConformanceError>(proto)
        })
        .transpose()?;

    Ok(TensorInfo {
        name: info.name,
        dtype: info.dtype.resolve(&format!("{path}.dtype"), |s| {
            DataType::from_str_name(s).map(|d| d as i32)
        })?,
        tensor_shape,
    })
}

fn tensor_infos_to_proto(
    path: &str,
    infos: HashMap<String, TensorInfoJson>,
) -> ConformanceResult<HashMap<String, TensorInfo>> {
    infos
        .into_iter()
        .map(|(name, info)| {
            let proto = tensor_info_to_proto(&format!("{path}.{name}"), info)?;
            Ok((name, proto))
        })
        .collect()
}

/// Decode a metadata body into the gRPC response shape, packing the
/// signature map into an `Any` exactly as the gRPC server does.
pub fn metadata_response(body: Value) -> ConformanceResult<GetModelMetadataResponse> {
    reject_error_body(&body)?;
    let parsed: MetadataResponseJson = parse("metadata response", body)?;

    let mut metadata = HashMap::new();
    if let Some(raw) = parsed.metadata.get(SIGNATURE_DEF_FIELD) {
        let map: SignatureDefMapJson = parse(SIGNATURE_DEF_FIELD, raw.clone())?;
        let signature_def = map
            .signature_def
            .into_iter()
            .map(|(key, def)| {
                let path = format!("signature_def.{key}");
                let proto = SignatureDef {
                    inputs: tensor_infos_to_proto(&format!("{path}.inputs"), def.inputs)?,
                    outputs: tensor_infos_to_proto(&format!("{path}.outputs"), def.outputs)?,
                    method_name: def.method_name,
                };
                Ok((key, proto))
            })
            .collect::<ConformanceResult<HashMap<_, _>>>()?;

        metadata.insert(
            SIGNATURE_DEF_FIELD.to_string(),
            prost_types::Any {
                type_url: SIGNATURE_DEF_MAP_TYPE_URL.to_string(),
                value: SignatureDefMap { signature_def }.encode_to_vec(),
            },
        );
    }

    Ok(GetModelMetadataResponse {
        model_spec: parsed.model_spec.map(ModelSpecJson::into_proto).transpose()?,
        metadata,
    })
}

/// Decode a status body into the gRPC response shape.
pub fn status_response(body: Value) -> ConformanceResult<GetModelStatusResponse> {
    reject_error_body(&body)?;
    let parsed: StatusResponseJson = parse("status response", body)?;

    let model_version_status = parsed
        .model_version_status
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let path = format!("model_version_status[{index}]");
            let status = entry
                .status
                .map(|s| {
                    Ok::<_, ConformanceError>(StatusProto {
                        error_code: s.error_code.resolve(&format!("{path}.status.error_code"), |n| {
                            Code::from_str_name(n).map(|c| c as i32)
                        })?,
                        error_message: s.error_message,
                    })
                })
                .transpose()?;

            Ok(ModelVersionStatus {
                version: entry.version.resolve(&format!("{path}.version"))?,
                state: entry.state.resolve(&format!("{path}.state"), |n| {
                    State::from_str_name(n).map(|s| s as i32)
                })?,
                status,
            })
        })
        .collect::<ConformanceResult<Vec<_>>>()?;

    Ok(GetModelStatusResponse {
        model_version_status,
    })
}

/// Surface `{"error": "..."}` bodies as server-reported failures.
pub fn reject_error_body(body: &Value) -> ConformanceResult<()> {
    match body.get("error") {
        Some(error) => Err(ConformanceError::service(
            "REST",
            error.as_str().map_or_else(|| error.to_string(), str::to_string),
        )),
        None => Ok(()),
    }
}
