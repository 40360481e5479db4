//! # Conformance Checker
//!
//! Drives a serving endpoint through one [`ServingTransport`], normalizes
//! what comes back and compares it with what a [`ModelDescriptor`] says a
//! conformant server must report. Every check is independent and issues its
//! own requests; the checker holds no state between them.
//!
//! ```rust,ignore
//! use serving_conformance::{ConformanceChecker, UnifiedServingClient, RESNET};
//!
//! let client = UnifiedServingClient::grpc("http://localhost:8500").await?;
//! let checker = ConformanceChecker::new(&client, &RESNET);
//! checker.check_status().await?;
//! ```

use std::fmt;

use tracing::{debug, info, warn};

use crate::descriptor::ModelDescriptor;
use crate::error::{ConformanceError, ConformanceResult};
use crate::normalize::{self, InferenceResult, MetadataResult, StatusResult, VersionStatus};
use crate::proto::{model_version_status::State, Code};
use crate::request::InferenceRequest;
use crate::status_messages;
use crate::transport::ServingTransport;

/// Leading text of every output shape failure.
pub const INVALID_OUTPUT_SHAPE: &str = "response has invalid output shape";

/// The individual checks a run consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Inference,
    Metadata,
    Status,
    Idempotence,
}

impl CheckKind {
    pub const ALL: [CheckKind; 4] = [
        CheckKind::Inference,
        CheckKind::Metadata,
        CheckKind::Status,
        CheckKind::Idempotence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Inference => "inference",
            CheckKind::Metadata => "metadata",
            CheckKind::Status => "status",
            CheckKind::Idempotence => "idempotence",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of one check within a run.
#[derive(Debug)]
pub struct CheckOutcome {
    pub check: CheckKind,
    pub result: ConformanceResult<()>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of [`ConformanceChecker::run_all`], in execution order.
#[derive(Debug)]
pub struct ConformanceReport {
    pub transport: &'static str,
    pub endpoint: String,
    pub model_name: String,
    pub outcomes: Vec<CheckOutcome>,
}

impl ConformanceReport {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(CheckOutcome::passed)
    }

    pub fn outcome(&self, check: CheckKind) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.check == check)
    }

    pub fn failures(&self) -> impl Iterator<Item = (CheckKind, &ConformanceError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.check, e)))
    }

    /// First failure, if any, as an error.
    pub fn into_result(self) -> ConformanceResult<()> {
        self.outcomes
            .into_iter()
            .find_map(|o| o.result.err())
            .map_or(Ok(()), Err)
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} via {} ({})",
            self.model_name, self.transport, self.endpoint
        )?;
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(()) => writeln!(f, "  {:<12} ok", outcome.check)?,
                Err(e) => writeln!(
                    f,
                    "  {:<12} FAILED [{}] {}",
                    outcome.check,
                    e.category(),
                    e
                )?,
            }
        }
        Ok(())
    }
}

/// Conformance checks for one model over one transport.
pub struct ConformanceChecker<'a, T: ServingTransport + ?Sized> {
    transport: &'a T,
    descriptor: &'a ModelDescriptor,
}

impl<T: ServingTransport + ?Sized> fmt::Debug for ConformanceChecker<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConformanceChecker")
            .field("transport", &self.transport.transport_name())
            .field("endpoint", &self.transport.endpoint())
            .field("model", &self.descriptor.name)
            .finish()
    }
}

impl<'a, T: ServingTransport + ?Sized> ConformanceChecker<'a, T> {
    pub fn new(transport: &'a T, descriptor: &'a ModelDescriptor) -> Self {
        Self {
            transport,
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        self.descriptor
    }

    // ===================================================================================
    // FETCH + NORMALIZE
    // ===================================================================================

    /// Send an all-ones input of the descriptor's shape and normalize the outputs.
    pub async fn fetch_inference(&self) -> ConformanceResult<InferenceResult> {
        let request = InferenceRequest::ones(self.descriptor).ok_or_else(|| {
            ConformanceError::Request(format!(
                "cannot build an input tensor of dtype {}",
                self.descriptor.dtype.as_str_name()
            ))
        })?;

        let response = self.transport.predict(&request).await?;
        normalize::inference(&response, &request.output_names)
    }

    /// Fetch metadata, returning the echoed model name with the normalized signature.
    pub async fn fetch_metadata(&self) -> ConformanceResult<(String, MetadataResult)> {
        let response = self
            .transport
            .get_model_metadata(&self.descriptor.name, self.descriptor.version)
            .await?;

        let name = normalize::model_spec_name(response.model_spec.as_ref())?.to_string();
        Ok((name, normalize::metadata(&response)?))
    }

    pub async fn fetch_status(&self) -> ConformanceResult<StatusResult> {
        let response = self
            .transport
            .get_model_status(&self.descriptor.name, self.descriptor.version)
            .await?;
        normalize::status(&response)
    }

    // ===================================================================================
    // CHECKS
    // ===================================================================================

    /// Every requested output is present with exactly the declared output shape.
    pub async fn check_inference(&self) -> ConformanceResult<InferenceResult> {
        let result = self.fetch_inference().await?;

        for (name, shape) in result.shapes() {
            if shape != self.descriptor.output_shape {
                warn!(
                    transport = self.transport.transport_name(),
                    output = %name,
                    expected = ?self.descriptor.output_shape,
                    actual = ?shape,
                    "Output shape mismatch"
                );
                return Err(ConformanceError::mismatch(
                    format!("{INVALID_OUTPUT_SHAPE} for '{name}'"),
                    &self.descriptor.output_shape,
                    shape,
                ));
            }
        }

        info!(
            transport = self.transport.transport_name(),
            model = %self.descriptor.name,
            "Inference conformance passed"
        );
        Ok(result)
    }

    /// Echoed model name matches and the signature deep-equals the descriptor.
    pub async fn check_metadata(&self) -> ConformanceResult<MetadataResult> {
        let (name, metadata) = self.fetch_metadata().await?;

        if name != self.descriptor.name {
            warn!(expected = %self.descriptor.name, actual = %name, "Model name mismatch");
            return Err(ConformanceError::mismatch(
                "metadata model_spec.name",
                &self.descriptor.name,
                name,
            ));
        }

        let expected = self.descriptor.expected_metadata();
        if metadata != expected {
            warn!(
                transport = self.transport.transport_name(),
                expected = ?expected,
                actual = ?metadata,
                "Metadata mismatch"
            );
            return Err(ConformanceError::mismatch("metadata", expected, metadata));
        }

        info!(
            transport = self.transport.transport_name(),
            model = %self.descriptor.name,
            "Metadata conformance passed"
        );
        Ok(metadata)
    }

    /// The selected version is AVAILABLE/OK and reports the canonical message.
    ///
    /// A (state, error_code) pair without a canonical message fails with
    /// [`ConformanceError::UnregisteredStatus`] before any field comparison.
    pub async fn check_status(&self) -> ConformanceResult<VersionStatus> {
        let status = self.fetch_status().await?;
        let entry = self.select_entry(&status)?.clone();
        debug!(?entry, "Selected version status");

        let expected_version = self.descriptor.expected_version();
        if entry.version != expected_version {
            return Err(ConformanceError::mismatch(
                "status version",
                expected_version,
                entry.version,
            ));
        }

        let canonical = status_messages::canonical_message_raw(entry.state, entry.error_code)
            .ok_or(ConformanceError::UnregisteredStatus {
                state: entry.state,
                error_code: entry.error_code,
            })?;

        if entry.state != State::Available as i32 {
            return Err(ConformanceError::mismatch(
                "status state",
                State::Available.as_str_name(),
                state_name(&entry),
            ));
        }

        if entry.error_code != Code::Ok as i32 {
            return Err(ConformanceError::mismatch(
                "status error_code",
                Code::Ok.as_str_name(),
                code_name(&entry),
            ));
        }

        if entry.error_message != canonical {
            warn!(
                expected = canonical,
                actual = %entry.error_message,
                "Status message differs from canonical message"
            );
            return Err(ConformanceError::mismatch(
                "status error_message",
                canonical,
                &entry.error_message,
            ));
        }

        info!(
            transport = self.transport.transport_name(),
            model = %self.descriptor.name,
            version = entry.version,
            "Status conformance passed"
        );
        Ok(entry)
    }

    /// Read-only calls repeated back to back normalize identically.
    pub async fn check_idempotence(&self) -> ConformanceResult<()> {
        let first = self.fetch_metadata().await?;
        let second = self.fetch_metadata().await?;
        if first != second {
            return Err(ConformanceError::mismatch(
                "repeated metadata",
                first,
                second,
            ));
        }

        let first = self.fetch_status().await?;
        let second = self.fetch_status().await?;
        if first != second {
            return Err(ConformanceError::mismatch("repeated status", first, second));
        }

        info!(
            transport = self.transport.transport_name(),
            model = %self.descriptor.name,
            "Idempotence check passed"
        );
        Ok(())
    }

    /// Run every check, collecting outcomes instead of stopping at the first failure.
    pub async fn run_all(&self) -> ConformanceReport {
        let mut outcomes = Vec::with_capacity(CheckKind::ALL.len());
        for check in CheckKind::ALL {
            let result = match check {
                CheckKind::Inference => self.check_inference().await.map(drop),
                CheckKind::Metadata => self.check_metadata().await.map(drop),
                CheckKind::Status => self.check_status().await.map(drop),
                CheckKind::Idempotence => self.check_idempotence().await,
            };
            if let Err(e) = &result {
                warn!(
                    check = %check,
                    category = e.category(),
                    error = %e,
                    "Conformance check failed"
                );
            }
            outcomes.push(CheckOutcome { check, result });
        }

        ConformanceReport {
            transport: self.transport.transport_name(),
            endpoint: self.transport.endpoint().to_string(),
            model_name: self.descriptor.name.clone(),
            outcomes,
        }
    }

    /// Descriptor version if pinned, otherwise the first reported entry.
    fn select_entry<'s>(&self, status: &'s StatusResult) -> ConformanceResult<&'s VersionStatus> {
        let entry = match self.descriptor.version {
            Some(version) => status.find(version),
            None => status.first(),
        };
        entry.ok_or_else(|| {
            ConformanceError::normalization(
                "model_version_status",
                match self.descriptor.version {
                    Some(version) => format!("no entry for version {version}"),
                    None => "empty".to_string(),
                },
            )
        })
    }
}

fn state_name(entry: &VersionStatus) -> String {
    entry
        .lifecycle_state()
        .map_or_else(|| entry.state.to_string(), |s| s.as_str_name().to_string())
}

fn code_name(entry: &VersionStatus) -> String {
    entry
        .code()
        .map_or_else(|| entry.error_code.to_string(), |c| c.as_str_name().to_string())
}

/// Both transports report the same normalized metadata, status and output shapes.
pub async fn check_parity<A, B>(
    descriptor: &ModelDescriptor,
    a: &A,
    b: &B,
) -> ConformanceResult<()>
where
    A: ServingTransport + ?Sized,
    B: ServingTransport + ?Sized,
{
    let left = ConformanceChecker::new(a, descriptor);
    let right = ConformanceChecker::new(b, descriptor);
    let label = |what: &str| {
        format!(
            "{what} parity ({} vs {})",
            a.transport_name(),
            b.transport_name()
        )
    };

    let left_metadata = left.fetch_metadata().await?;
    let right_metadata = right.fetch_metadata().await?;
    if left_metadata != right_metadata {
        return Err(ConformanceError::mismatch(
            label("metadata"),
            left_metadata,
            right_metadata,
        ));
    }

    let left_status = left.fetch_status().await?;
    let right_status = right.fetch_status().await?;
    if left_status != right_status {
        return Err(ConformanceError::mismatch(
            label("status"),
            left_status,
            right_status,
        ));
    }

    let left_shapes = left.fetch_inference().await?.shapes();
    let right_shapes = right.fetch_inference().await?.shapes();
    if left_shapes != right_shapes {
        return Err(ConformanceError::mismatch(
            label("output shape"),
            left_shapes,
            right_shapes,
        ));
    }

    info!(
        left = a.transport_name(),
        right = b.transport_name(),
        model = %descriptor.name,
        "Cross-transport parity passed"
    );
    Ok(())
}
