use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::export::{
        METRIC_ARCHIVE_BYTES, METRIC_EXPORT_MS, METRIC_VIEWS_FAILED_TOTAL,
        METRIC_VIEWS_RENDERED_TOTAL,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_VIEWS_RENDERED_TOTAL,
            Unit::Count,
            "Total number of views rendered and archived."
        );
        describe_counter!(
            METRIC_VIEWS_FAILED_TOTAL,
            Unit::Count,
            "Total number of views dropped because rendering failed."
        );
        describe_histogram!(
            METRIC_EXPORT_MS,
            Unit::Milliseconds,
            "End-to-end export latency in milliseconds."
        );
        describe_histogram!(
            METRIC_ARCHIVE_BYTES,
            Unit::Bytes,
            "Size of produced archives in bytes."
        );
    });
}
