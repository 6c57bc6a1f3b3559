use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn json_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .json()
        .flatten_event(true)
}

/// Installs the global subscriber: env filter, JSON logs and, when `otlp_endpoint`
/// is non-empty, an OTLP span exporter. A failed exporter degrades to logs only.
pub fn init_tracing(service_name: &str, log_level: &str, otlp_endpoint: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if otlp_endpoint.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer())
            .init();
        return;
    }

    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(otlp_endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio);

    match tracer {
        Ok(tracer) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .with(json_layer())
                .init();
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer())
                .init();
            tracing::warn!(
                service = %service_name,
                endpoint = %otlp_endpoint,
                error = %e,
                "OTLP exporter unavailable, continuing with local logs only"
            );
        }
    }
}
