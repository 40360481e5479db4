//! # Tracing Module
//!
//! Console logging for conformance runs using the tracing ecosystem.
//!
//! - Level from `RUST_LOG` (default `info`)
//! - ANSI colors only when stdout is a TTY
//! - JSON lines when `CONFORMANCE_LOG_FORMAT=json`

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging once per process
///
/// Safe to call from every test; later calls and an already-installed
/// global subscriber are both no-ops.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let log_level = get_log_level();
        let json_output = use_json_format();
        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());

        let console_layer: Box<dyn Layer<Registry> + Send + Sync> = if json_output {
            fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                log_level = %log_level,
                json = json_output,
                ansi_colors = use_ansi,
                "Console logging initialized"
            );
        }
    });
}

fn get_log_level() -> String {
    std::env::var("RUST_LOG")
        .map(|level| level.to_lowercase())
        .unwrap_or_else(|_| "info".to_string())
}

fn use_json_format() -> bool {
    std::env::var("CONFORMANCE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
