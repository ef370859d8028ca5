//! Observability bootstrap for the `oracle` binary.
//!
//! Stdout logging plus optional OpenTelemetry OTLP trace export.

use anyhow::{Context, Result};
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    resource::Resource,
    trace::{Sampler, SdkTracerProvider, SpanExporter, Tracer},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::ObservabilityConfig;

/// Guard that shuts down the OTLP tracer provider on drop, if one was
/// started. Keep this alive for the program's lifetime.
pub struct ObservabilityGuard {
    otel_tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.otel_tracer_provider.take() {
            let _ = provider.shutdown();
        }
    }
}

/// Initializes the global `tracing` subscriber: an `EnvFilter` plus a pretty
/// `fmt` layer, with an optional OTLP trace exporter layered in when
/// `config.use_otel` is set.
///
/// # Errors
/// Returns an error if a global subscriber has already been installed.
pub fn init_observability(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let create_fmt_layer = || fmt::layer().with_target(true).with_line_number(true);

    let otel_tracer_provider = if config.use_otel {
        match setup_otlp_tracer(config) {
            Ok((tracer, provider)) => {
                let subscriber = Registry::default()
                    .with(EnvFilter::new(config.level().as_str().to_lowercase()))
                    .with(create_fmt_layer())
                    .with(tracing_opentelemetry::layer().with_tracer(tracer));
                subscriber.try_init().context("failed to install global tracing subscriber")?;
                Some(provider)
            }
            Err(err) => {
                eprintln!("OpenTelemetry export disabled: {err}");
                let subscriber = Registry::default()
                    .with(EnvFilter::new(config.level().as_str().to_lowercase()))
                    .with(create_fmt_layer());
                subscriber.try_init().context("failed to install global tracing subscriber")?;
                None
            }
        }
    } else {
        let subscriber = Registry::default()
            .with(EnvFilter::new(config.level().as_str().to_lowercase()))
            .with(create_fmt_layer());
        subscriber.try_init().context("failed to install global tracing subscriber")?;
        None
    };

    Ok(ObservabilityGuard { otel_tracer_provider })
}

fn setup_otlp_tracer(config: &ObservabilityConfig) -> Result<(Tracer, SdkTracerProvider)> {
    let resource = Resource::builder()
        .with_attributes(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let exporter = build_otlp_grpc_exporter(config)?;

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .with_batch_exporter(exporter)
        .build();
    let tracer = provider.tracer(config.service_name.clone());
    Ok((tracer, provider))
}

fn build_otlp_grpc_exporter(config: &ObservabilityConfig) -> Result<impl SpanExporter> {
    let mut exporter_builder = opentelemetry_otlp::SpanExporter::builder().with_tonic();
    if let Some(endpoint) = &config.otel_endpoint {
        exporter_builder = exporter_builder.with_endpoint(endpoint);
    }
    Ok(exporter_builder.build()?)
}
