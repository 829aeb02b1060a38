// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley contact-ticket bridge.
//!
//! This crate provides the error type, the shared data model, and the two
//! adapter traits the bridge is built around: [`ChatTransport`] for the chat
//! protocol and [`TicketBackend`] for the support-ticket API.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ParleyError;
pub use types::{
    ActiveTicket, AdapterType, ChatEvent, Contact, ContactId, ContactSource, HealthStatus,
    InboundChat, IncomingAck, IncomingSubmission, MessageId, MessageKind, PresenceKind,
    PresenceUpdate, RosterEntry, SenderMetadata, TicketMessage, TicketPage, TicketQuery,
    TicketStatus, TicketSummary, TransportEvent, resource_of, to_bare_address,
};

pub use traits::{ChatTransport, PluginAdapter, TicketBackend};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Transport,
            AdapterType::TicketBackend,
            AdapterType::Observability,
        ] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), HealthStatus::Healthy);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_transport<T: ChatTransport>() {}
        fn _assert_backend<T: TicketBackend>() {}
    }
}
