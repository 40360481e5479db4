//! Conformance tests against a running serving endpoint.
//!
//! The service must already be up with the `resnet` model loaded. Its
//! location comes from `HarnessConfig::load()`, typically
//! `CONFORMANCE_HOST`, `CONFORMANCE_GRPC_PORT` and `CONFORMANCE_REST_PORT`.
//!
//! Enable with: --features test-services

#![cfg(feature = "test-services")]

use anyhow::Result;
use serving_conformance::{
    check_parity, logging, ConfiguredService, ConformanceChecker, HarnessConfig,
    RestRequestFormat, Transport, UnifiedServingClient, RESNET,
};

async fn client(transport: Transport) -> Result<UnifiedServingClient> {
    logging::init_tracing();
    let config = HarnessConfig::load()?;
    let service = ConfiguredService::from_config(&config);
    Ok(UnifiedServingClient::connect(&service, &RESNET, transport, &config).await?)
}

#[tokio::test]
async fn test_grpc_inference() -> Result<()> {
    let client = client(Transport::Grpc).await?;
    let result = ConformanceChecker::new(&client, &RESNET)
        .check_inference()
        .await?;
    assert_eq!(result.get(&RESNET.output_name).unwrap().shape(), &[1, 1000]);
    Ok(())
}

#[tokio::test]
async fn test_grpc_metadata() -> Result<()> {
    let client = client(Transport::Grpc).await?;
    let metadata = ConformanceChecker::new(&client, &RESNET)
        .check_metadata()
        .await?;
    assert_eq!(metadata, RESNET.expected_metadata());
    Ok(())
}

#[tokio::test]
async fn test_grpc_status() -> Result<()> {
    let client = client(Transport::Grpc).await?;
    let entry = ConformanceChecker::new(&client, &RESNET)
        .check_status()
        .await?;
    assert_eq!(entry.version, 1);
    Ok(())
}

#[tokio::test]
async fn test_grpc_idempotence() -> Result<()> {
    let client = client(Transport::Grpc).await?;
    ConformanceChecker::new(&client, &RESNET)
        .check_idempotence()
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_rest_checks_for_every_request_format() -> Result<()> {
    logging::init_tracing();
    let mut config = HarnessConfig::load()?;
    let service = ConfiguredService::from_config(&config);

    for format in RestRequestFormat::ALL {
        config.rest.request_format = format;
        let client = UnifiedServingClient::connect(&service, &RESNET, Transport::Rest, &config).await?;
        let report = ConformanceChecker::new(&client, &RESNET).run_all().await;
        assert!(report.all_passed(), "format {format}: {report}");
    }
    Ok(())
}

#[tokio::test]
async fn test_cross_transport_parity() -> Result<()> {
    let grpc = client(Transport::Grpc).await?;
    let rest = client(Transport::Rest).await?;
    check_parity(&RESNET, &grpc, &rest).await?;
    Ok(())
}
