//! Telemetry module
//!
//! Structured logging and Prometheus metrics

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use self::metrics::{
    record_calculation, record_conflict, record_phase_rejected, record_transition, record_verification,
};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Guard that cleans up telemetry on drop
pub struct TelemetryGuard {
    metrics_port: Option<u16>,
}

impl TelemetryGuard {
    /// Port of the scrape endpoint, if one was started
    pub fn metrics_port(&self) -> Option<u16> {
        self.metrics_port
    }
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, LogFormat::from_json_flag(config.json_logs))?;

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        tracing::info!(port, "Prometheus exporter listening");
    }

    Ok(TelemetryGuard {
        metrics_port: config.metrics_port,
    })
}
