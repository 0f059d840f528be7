//! Observability helpers
//!
//! With the `metrics` feature, [`METRICS`] exposes OpenTelemetry instruments backed by a
//! Prometheus exporter. With the `tracing` feature, [`tracing_helpers`] builds the spans
//! used around reconciliation, statement execution and cleaning.

#[cfg(feature = "metrics")]
pub use otel::{DriftguardMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram, MeterProvider},
    };
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<DriftguardMetrics> = Lazy::new(DriftguardMetrics::init);

    pub struct DriftguardMetrics {
        pub registry: Registry,
        _provider: Option<SdkMeterProvider>,
        pub migrations_applied: Counter<u64>,
        pub reconcile_failures: Counter<u64>,
        pub apply_duration: Histogram<f64>,
    }

    impl DriftguardMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let (provider, meter) = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => {
                    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
                    let meter = provider.meter("driftguard");
                    (Some(provider), meter)
                }
                Err(e) => {
                    log::warn!("Prometheus exporter unavailable: {}", e);
                    (None, global::meter("driftguard"))
                }
            };

            let migrations_applied = meter
                .u64_counter("driftguard_migrations_applied_total")
                .with_description("Migrations applied to the target database")
                .build();

            let reconcile_failures = meter
                .u64_counter("driftguard_reconcile_failures_total")
                .with_description("Reconciliation runs that returned an error")
                .build();

            let apply_duration = meter
                .f64_histogram("driftguard_apply_duration_seconds")
                .with_description("Duration of a single migration apply")
                .build();

            Self {
                registry,
                _provider: provider,
                migrations_applied,
                reconcile_failures,
                apply_duration,
            }
        }

        pub fn record_apply(&self, elapsed: Duration) {
            self.migrations_applied.add(1, &[]);
            self.apply_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_failure(&self) {
            self.reconcile_failures.add(1, &[]);
        }

        /// Current values in the Prometheus text exposition format
        pub fn render(&self) -> String {
            let mut buffer = Vec::new();
            if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
                log::warn!("Failed to encode metrics: {}", e);
            }
            String::from_utf8_lossy(&buffer).into_owned()
        }
    }

}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn reconcile_span(target: &str) -> Span {
        info_span!("driftguard.reconcile", target = %target)
    }

    pub fn apply_span(version: u64, description: &str) -> Span {
        info_span!("driftguard.apply", version, description = %description)
    }

    pub fn clean_span(target: &str) -> Span {
        info_span!("driftguard.clean", target = %target)
    }

    pub fn execute_query_span(query: &str) -> Span {
        let head: String = query.trim().chars().take(64).collect();
        info_span!("driftguard.execute", query = %head)
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("driftguard.transaction")
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("driftguard.connect")
    }
}
