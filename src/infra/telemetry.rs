use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::{
    METRIC_CACHE_LOOKUP, METRIC_FETCH, METRIC_FETCH_FAILURE, METRIC_FLIGHT_JOINED,
    METRIC_HYDRATE_MS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_LOOKUP,
            Unit::Count,
            "Collection cache lookups, labelled by result (hit|miss)."
        );
        describe_counter!(
            METRIC_FETCH,
            Unit::Count,
            "Collection requests issued to the item API."
        );
        describe_counter!(
            METRIC_FETCH_FAILURE,
            Unit::Count,
            "Collection requests that failed."
        );
        describe_counter!(
            METRIC_FLIGHT_JOINED,
            Unit::Count,
            "Callers that attached to an already running collection load."
        );
        describe_histogram!(
            METRIC_HYDRATE_MS,
            Unit::Milliseconds,
            "End-to-end latency of a collection load in milliseconds."
        );
    });
}
