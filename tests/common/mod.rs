#![allow(dead_code)]

pub mod grpc_server;
pub mod mock_transport;
pub mod rest_server;

pub use grpc_server::*;
pub use mock_transport::*;
pub use rest_server::*;
