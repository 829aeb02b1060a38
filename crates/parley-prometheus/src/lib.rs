// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Parley bridge.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The exporter
//! serves the text format on its own HTTP listener.

pub mod recording;

use std::net::SocketAddr;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use parley_core::ParleyError;
use parley_core::traits::PluginAdapter;
use parley_core::types::{AdapterType, HealthStatus};

pub use recording::{
    record_backend_failure, record_inbound_message, record_monitor_terminated,
    record_relayed_message, record_transcript_failure, set_active_monitors,
};

/// Prometheus metrics adapter.
///
/// Installs the global recorder and an HTTP scrape endpoint.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
    listen: SocketAddr,
}

impl PrometheusAdapter {
    /// Installs the recorder and starts the scrape listener on `listen`.
    ///
    /// Must run inside a tokio runtime. Only one recorder can be installed per
    /// process; a second call fails.
    pub fn install(listen: SocketAddr) -> Result<Self, ParleyError> {
        let builder = PrometheusBuilder::new().with_http_listener(listen);
        let (recorder, exporter) = builder.build().map_err(|e| {
            ParleyError::Internal(format!("failed to build Prometheus exporter: {e}"))
        })?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| {
            ParleyError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;
        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::warn!("prometheus exporter stopped");
            }
        });

        recording::register_metrics();
        tracing::info!(%listen, "prometheus metrics exporter listening");

        Ok(Self { handle, listen })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}
