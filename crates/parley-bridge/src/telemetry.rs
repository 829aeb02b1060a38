// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric hooks. Forward to `parley-prometheus` when the `prometheus`
//! feature is on, no-ops otherwise.

#[cfg(feature = "prometheus")]
pub(crate) use parley_prometheus::{
    record_backend_failure, record_inbound_message, record_monitor_terminated,
    record_relayed_message, record_transcript_failure, set_active_monitors,
};

#[cfg(not(feature = "prometheus"))]
mod noop {
    pub(crate) fn record_inbound_message() {}
    pub(crate) fn record_relayed_message() {}
    pub(crate) fn record_backend_failure(_operation: &'static str) {}
    pub(crate) fn record_transcript_failure() {}
    pub(crate) fn record_monitor_terminated(_reason: &str) {}
    pub(crate) fn set_active_monitors(_count: usize) {}
}

#[cfg(not(feature = "prometheus"))]
pub(crate) use noop::*;
