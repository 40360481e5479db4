//! Build script for serving-conformance
//!
//! Compiles the TensorFlow-Serving Protocol Buffer subset under `proto/` into
//! prost messages plus tonic clients and servers. Generated code is written to
//! `$OUT_DIR` and included via `tonic::include_proto!` in `src/proto/mod.rs`.
//!
//! # Protocol Buffer Compiler
//!
//! `protoc` is taken from the `PROTOC` environment variable when set, and from
//! the `protoc-bin-vendored` crate otherwise.

use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let proto_root = manifest_dir.join("proto");

    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    let well_known_types = protoc_bin_vendored::include_path()?;

    let proto_files = [
        "tensorflow/core/framework/types.proto",
        "tensorflow/core/framework/tensor_shape.proto",
        "tensorflow/core/framework/tensor.proto",
        "tensorflow/core/protobuf/meta_graph.proto",
        "tensorflow/core/protobuf/error_codes.proto",
        "tensorflow_serving/apis/model.proto",
        "tensorflow_serving/apis/predict.proto",
        "tensorflow_serving/apis/get_model_metadata.proto",
        "tensorflow_serving/apis/get_model_status.proto",
        "tensorflow_serving/util/status.proto",
        "tensorflow_serving/apis/prediction_service.proto",
        "tensorflow_serving/apis/model_service.proto",
    ];

    let mut proto_paths = Vec::with_capacity(proto_files.len());
    for file in &proto_files {
        let path = proto_root.join(file);
        if !path.exists() {
            return Err(format!("Proto file not found: {}", path.display()).into());
        }
        proto_paths.push(path);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .build_transport(true)
        .emit_rerun_if_changed(true)
        .compile_protos(&proto_paths, &[proto_root.clone(), well_known_types])?;

    println!("cargo:rerun-if-changed={}", proto_root.display());

    Ok(())
}
