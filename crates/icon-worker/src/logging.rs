//! Process-wide tracing setup.
//!
//! All crate code instruments with `tracing`; the worker loop and dependencies
//! that emit through the `log` facade are bridged with `tracing-log`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingSettings};
use crate::error::IconWorkerError;

/// Installs the global subscriber and the `log` bridge.
///
/// Fails if a global subscriber or logger is already installed, so call it
/// once from the binary, never from library code or tests.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), IconWorkerError> {
    let filter = EnvFilter::try_new(&settings.filter).map_err(|e| {
        IconWorkerError::Logging(format!("invalid filter '{}': {}", settings.filter, e))
    })?;

    let fmt_layer = match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
    };

    let subscriber = Registry::default().with(fmt_layer).with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| IconWorkerError::Logging(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| IconWorkerError::Logging(e.to_string()))?;

    Ok(())
}
