//! API Client Modules
//!
//! HTTP client for the serving REST API and the JSON codec that maps its
//! bodies onto the proto messages shared with [`crate::grpc_clients`].

pub mod json_codec;
pub mod serving_client;

pub use json_codec::RestRequestFormat;
pub use serving_client::{ServingApiClient, ServingApiConfig};
