// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for Parley.
//!
//! - [`MockTransport`]: a [`ChatTransport`](parley_core::ChatTransport) with
//!   injectable inbound events and captured outbound messages.
//! - [`MockBackend`]: a [`TicketBackend`](parley_core::TicketBackend) with
//!   scripted submissions and per-ticket poll results.
//! - [`wait_until`]: polls a condition with a deadline.

pub mod mock_backend;
pub mod mock_transport;

use std::future::Future;
use std::time::Duration;

pub use mock_backend::{MockBackend, PollReply, agent_message, customer_message};
pub use mock_transport::{MockTransport, SentMessage, inbound};

/// Re-checks `condition` every few milliseconds until it holds or `timeout`
/// passes. Returns whether it held.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
