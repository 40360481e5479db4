//! # Serving Conformance
//!
//! Conformance harness for a model-serving endpoint exposed over gRPC and
//! REST. The same checks run over either binding: requests are built once,
//! responses from both transports are normalized into one representation
//! and compared with a static model descriptor.
//!
//! ## Module Organization
//!
//! - [`descriptor`] - Expected names, shapes and dtypes of served models
//! - [`proto`] - Wire messages and gRPC stubs generated from `proto/`
//! - [`grpc_clients`] / [`api_clients`] - The two transport clients
//! - [`transport`] - Transport-agnostic interface over both clients
//! - [`normalize`] - Canonical inference, metadata and status results
//! - [`status_messages`] - Canonical status message per (state, error code)
//! - [`conformance`] - The checks themselves
//! - [`fixture`] - Description of the running service under test
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use serving_conformance::{
//!     ConformanceChecker, ConfiguredService, HarnessConfig, Transport, UnifiedServingClient,
//!     RESNET,
//! };
//!
//! let config = HarnessConfig::load()?;
//! let service = ConfiguredService::from_config(&config);
//! let client = UnifiedServingClient::connect(&service, &RESNET, Transport::Grpc, &config).await?;
//!
//! let report = ConformanceChecker::new(&client, &RESNET).run_all().await;
//! println!("{report}");
//! ```

#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

pub mod api_clients;
pub mod config;
pub mod conformance;
pub mod descriptor;
pub mod error;
pub mod fixture;
pub mod grpc_clients;
pub mod logging;
pub mod normalize;
pub mod proto;
pub mod request;
pub mod status_messages;
pub mod transport;

// Re-export commonly used types for convenience
pub use api_clients::{RestRequestFormat, ServingApiClient, ServingApiConfig};
pub use config::{HarnessConfig, Transport};
pub use conformance::{
    check_parity, CheckKind, CheckOutcome, ConformanceChecker, ConformanceReport,
    INVALID_OUTPUT_SHAPE,
};
pub use descriptor::{ModelDescriptor, RESNET};
pub use error::{ConformanceError, ConformanceResult};
pub use fixture::{ConfiguredService, ServiceFixture, ServicePorts};
pub use grpc_clients::{GrpcClientConfig, ServingGrpcClient};
pub use normalize::{InferenceResult, MetadataResult, StatusResult, TensorArray, VersionStatus};
pub use request::InferenceRequest;
pub use transport::{
    GrpcServingTransport, RestServingTransport, ServingTransport, UnifiedServingClient,
};
