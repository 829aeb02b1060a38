// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge};

/// Register all Parley metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "parley_inbound_messages_total",
        "Chat messages received from contacts"
    );
    describe_counter!(
        "parley_relayed_messages_total",
        "Ticket replies relayed to contacts"
    );
    describe_counter!(
        "parley_backend_failures_total",
        "Failed calls to the ticket backend"
    );
    describe_counter!(
        "parley_transcript_failures_total",
        "Conversation log appends that could not be written"
    );
    describe_counter!(
        "parley_monitors_terminated_total",
        "Ticket monitors that stopped, by reason"
    );
    describe_gauge!("parley_active_monitors", "Ticket monitors currently polling");
}

pub fn record_inbound_message() {
    metrics::counter!("parley_inbound_messages_total").increment(1);
}

pub fn record_relayed_message() {
    metrics::counter!("parley_relayed_messages_total").increment(1);
}

/// `operation` names the backend call (`submit`, `poll`).
pub fn record_backend_failure(operation: &'static str) {
    metrics::counter!("parley_backend_failures_total", "operation" => operation).increment(1);
}

pub fn record_transcript_failure() {
    metrics::counter!("parley_transcript_failures_total").increment(1);
}

pub fn record_monitor_terminated(reason: &str) {
    metrics::counter!("parley_monitors_terminated_total", "reason" => reason.to_string())
        .increment(1);
}

pub fn set_active_monitors(count: usize) {
    metrics::gauge!("parley_active_monitors").set(count as f64);
}
