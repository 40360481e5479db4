//! # gRPC Client Library
//!
//! gRPC client for the serving endpoint. Mirrors the REST client in
//! [`crate::api_clients`]: both hand back the same proto response types.

mod common;
mod serving_grpc_client;

pub use common::GrpcClientConfig;
pub use serving_grpc_client::ServingGrpcClient;
