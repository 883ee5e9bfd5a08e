//! `OpenTelemetry` metrics for the relay pipeline.
//!
//! Only compiled with the `metrics` Cargo feature. [`init_metrics`] installs
//! a periodic OTLP exporter as the global meter provider; [`RelayInstruments`]
//! holds the counters the bridge records into.

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;

/// Meter name under which all bridge instruments are registered.
pub const METER_NAME: &str = "pushbridge";

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to build OTLP exporter: {0}")]
    ExporterBuild(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("OpenTelemetry SDK error: {0}")]
    Sdk(#[from] opentelemetry_sdk::error::OTelSdkError),
}

/// Keeps the meter provider alive. Dropping it does not flush; call
/// [`MetricsGuard::shutdown`] before exit.
pub struct MetricsGuard {
    meter_provider: SdkMeterProvider,
}

impl MetricsGuard {
    /// Flush buffered measurements and stop the exporter.
    pub fn shutdown(self) -> Result<(), MetricsError> {
        self.meter_provider.shutdown()?;
        Ok(())
    }
}

/// Install an OTLP/gRPC metrics exporter pointed at `endpoint`
/// (e.g. `"http://localhost:4317"`).
pub fn init_metrics(endpoint: &str) -> Result<MetricsGuard, MetricsError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .build();

    global::set_meter_provider(meter_provider.clone());

    Ok(MetricsGuard { meter_provider })
}

/// Counters for events flowing through the relay.
#[derive(Clone)]
pub struct RelayInstruments {
    events: Counter<u64>,
    capability_calls: Counter<u64>,
}

impl RelayInstruments {
    /// Create the instruments from the current global meter provider.
    pub fn from_global() -> Self {
        Self::new(&global::meter(METER_NAME))
    }

    pub fn new(meter: &Meter) -> Self {
        Self {
            events: meter
                .u64_counter("pushbridge.relay.events")
                .with_description("Notification events by pipeline outcome")
                .build(),
            capability_calls: meter
                .u64_counter("pushbridge.gateway.calls")
                .with_description("Capability invocations by outcome")
                .build(),
        }
    }

    /// Count one event with the given `outcome` attribute.
    pub fn record_event(&self, outcome: &'static str) {
        self.events.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    /// Count one capability invocation.
    pub fn record_capability(&self, capability: &str, outcome: &'static str) {
        self.capability_calls.add(
            1,
            &[
                KeyValue::new("capability", capability.to_string()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }
}
