//! Telemetry initialization: structured logging and metric descriptions

use crate::config::TelemetryConfig;
use metrics::{describe_counter, describe_histogram};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise logging and register metric descriptions.
///
/// Metrics are recorded through the `metrics` facade; they are dropped unless
/// the host process installs a recorder.
pub fn init(config: &TelemetryConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_mailer=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_format == "json" {
        // Flatten event fields so `message` is top-level
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    }

    describe_metrics();
}

/// Register metric descriptions so exporters emit HELP/TYPE lines from startup
pub fn describe_metrics() {
    describe_counter!(
        "mailer_notifications_composed_total",
        "Notifications composed, by event kind"
    );
    describe_counter!(
        "mailer_deliveries_total",
        "Delivery attempts, by transport and outcome"
    );
    describe_histogram!(
        "mailer_delivery_duration_seconds",
        "Time spent in a single delivery attempt"
    );
}
