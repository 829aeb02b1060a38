// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge between chat contacts and support tickets.
//!
//! Inbound chat messages are logged, queued for the front-end and submitted
//! to the ticket backend. Each ticket a contact opens gets a
//! [`TicketMonitor`] that polls the backend and relays agent replies back
//! over chat until the ticket resolves.
//!
//! [`BridgeService`] is the surface a front-end (the `parley` binary's
//! console, or an embedding UI) drives.

pub mod bridge;
pub mod contacts;
pub mod events;
pub mod markdown;
pub mod monitor;
pub mod registry;
pub mod service;
pub mod shutdown;
mod telemetry;

pub use bridge::{BridgeBuilder, ForwardOutcome, MessageBridge};
pub use contacts::merge_contacts;
pub use events::EventQueue;
pub use markdown::flatten_links;
pub use monitor::{
    MonitorSettings, MonitorState, PollEffects, PollOutcome, ReplySink, Termination,
    TicketMonitor, on_poll, page_is_full, precheck,
};
pub use registry::{ContactRegistry, MonitorLease};
pub use service::BridgeService;
pub use shutdown::{DEFAULT_DRAIN_TIMEOUT, install_signal_handler};
