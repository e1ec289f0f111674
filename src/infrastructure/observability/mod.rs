use crate::config::Config;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

const DEFAULT_FILTER: &str = "relaydesk=debug,tower_http=debug,sqlx=warn";

pub struct ObservabilityGuard;

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        shutdown();
    }
}

pub fn init(config: &Config) -> Result<ObservabilityGuard, Box<dyn std::error::Error>> {
    init_tracing(config)?;
    init_metrics(config)?;
    Ok(ObservabilityGuard)
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_target(true);

    // `try_init` also bridges the `log` records sqlx emits.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    // Optional OTLP layer for distributed tracing
    if let Some(endpoint) = &config.otel_exporter_endpoint {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);

        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", config.service_name.clone()),
            ])))
            .install_batch(runtime::Tokio)?;

        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()?;
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

fn init_metrics(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = config.metrics_port else {
        tracing::debug!("METRICS_PORT not set, Prometheus exporter disabled");
        return Ok(());
    };

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    describe_metrics();
    tracing::info!("Metrics exporter (Prometheus) started on port {}", port);
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "relaydesk_inbound_events_total",
        "Inbound messenger updates promoted to events"
    );
    metrics::describe_counter!(
        "relaydesk_inbound_discarded_total",
        "Inbound updates without content"
    );
    metrics::describe_counter!("relaydesk_tickets_created_total", "Tickets opened");
    metrics::describe_counter!(
        "relaydesk_outbound_sent_total",
        "Agent replies delivered to the messenger"
    );
    metrics::describe_counter!(
        "relaydesk_outbound_failed_total",
        "Agent replies the messenger did not accept"
    );
    metrics::describe_counter!(
        "relaydesk_fanout_sessions_dropped_total",
        "Sessions dropped for falling behind on fan-out"
    );
    metrics::describe_gauge!("relaydesk_sessions_active", "Live agent sessions");
}

pub fn shutdown() {
    global::shutdown_tracer_provider();
}
