// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-ticket polling monitor.
//!
//! The decision logic is a pure state machine ([`precheck`] and [`on_poll`])
//! so it can be tested without timers or I/O. [`TicketMonitor::run`] drives
//! it: read the contact's ticket from the registry, fetch the ticket's
//! messages, apply the transition, relay new agent replies, sleep.
//!
//! Agent replies are recognised by count: the backend returns the ticket's
//! messages oldest first, and everything past `last_seen_message_count` is
//! new. The count never moves backwards.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parley_config::MonitorConfig;
use parley_core::{ActiveTicket, ContactId, ParleyError, TicketBackend, TicketMessage, TicketStatus};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{ContactRegistry, MonitorLease};
use crate::telemetry;

/// Why a monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    /// The ticket reached a resolved or closed status.
    Resolved,
    /// The backend no longer knows the ticket.
    TicketMissing,
    /// Too many consecutive fetch failures.
    ErrorExhausted,
    /// The contact's ticket was cleared or replaced by someone else.
    Cleared,
    /// The bridge is shutting down.
    Shutdown,
}

impl Termination {
    /// Whether the monitor removes the ticket from the registry on exit.
    pub fn releases_ticket(self) -> bool {
        matches!(
            self,
            Termination::Resolved | Termination::TicketMissing | Termination::ErrorExhausted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Polling { consecutive_errors: u32 },
    Terminated(Termination),
}

impl MonitorState {
    pub const INITIAL: MonitorState = MonitorState::Polling {
        consecutive_errors: 0,
    };
}

/// Result of one message fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Fetched(Vec<TicketMessage>),
    NotFound,
    Failed(String),
}

/// Effects of one poll, applied by the runner in order: registry first,
/// then relays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollEffects {
    /// Agent replies to send to the contact, oldest first.
    pub relay: Vec<String>,
    /// New value for `last_seen_message_count`.
    pub last_seen: Option<usize>,
    /// New ticket status taken from the new messages.
    pub status: Option<TicketStatus>,
    /// The next sleep is doubled.
    pub back_off: bool,
}

/// Checks made before fetching. `ticket` is the contact's current ticket,
/// `None` when it no longer is the monitored one.
pub fn precheck(ticket: Option<&ActiveTicket>) -> Option<Termination> {
    match ticket {
        None => Some(Termination::Cleared),
        Some(t) if t.status.is_terminal() => Some(Termination::Resolved),
        Some(_) => None,
    }
}

/// Applies one fetch result to a polling monitor.
pub fn on_poll(
    consecutive_errors: u32,
    ticket: &ActiveTicket,
    outcome: PollOutcome,
    max_consecutive_errors: u32,
) -> (MonitorState, PollEffects) {
    match outcome {
        PollOutcome::Fetched(messages) => {
            let mut effects = PollEffects::default();
            let seen = ticket.last_seen_message_count;
            if messages.len() > seen {
                let fresh = &messages[seen..];
                effects.relay = fresh
                    .iter()
                    .filter_map(TicketMessage::relayable_content)
                    .map(str::to_string)
                    .collect();
                effects.status = fresh
                    .iter()
                    .rev()
                    .find_map(|m| m.ticket_status)
                    .filter(|status| *status != ticket.status);
                effects.last_seen = Some(messages.len());
            }
            (MonitorState::INITIAL, effects)
        }
        PollOutcome::NotFound => (
            MonitorState::Terminated(Termination::TicketMissing),
            PollEffects::default(),
        ),
        PollOutcome::Failed(_) => {
            let consecutive_errors = consecutive_errors.saturating_add(1);
            let next = if consecutive_errors >= max_consecutive_errors {
                MonitorState::Terminated(Termination::ErrorExhausted)
            } else {
                MonitorState::Polling { consecutive_errors }
            };
            let effects = PollEffects {
                back_off: true,
                ..PollEffects::default()
            };
            (next, effects)
        }
    }
}

/// Whether a fetched page hit the requested limit. Past that point the
/// count comparison in [`on_poll`] can no longer see new messages.
pub fn page_is_full(fetched: usize, page_size: u32) -> bool {
    page_size > 0 && fetched >= page_size as usize
}

/// Where relayed replies go. Implemented by the message bridge.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn relay_reply(&self, to_full: &str, body: &str) -> Result<(), ParleyError>;
}

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub max_consecutive_errors: u32,
    pub page_size: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_consecutive_errors: config.max_consecutive_errors,
            page_size: config.message_page_size,
        }
    }
}

/// A running monitor for one contact's ticket.
pub struct TicketMonitor {
    lease: MonitorLease,
    registry: Arc<ContactRegistry>,
    backend: Arc<dyn TicketBackend>,
    sink: Arc<dyn ReplySink>,
    settings: MonitorSettings,
    shutdown: CancellationToken,
}

impl TicketMonitor {
    pub fn new(
        lease: MonitorLease,
        registry: Arc<ContactRegistry>,
        backend: Arc<dyn TicketBackend>,
        sink: Arc<dyn ReplySink>,
        settings: MonitorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            lease,
            registry,
            backend,
            sink,
            settings,
            shutdown,
        }
    }

    fn contact(&self) -> &ContactId {
        self.lease.contact()
    }

    fn ticket_id(&self) -> &str {
        self.lease.ticket_id()
    }

    /// The contact's ticket, if it is still the one this monitor owns.
    fn current_ticket(&self) -> Option<ActiveTicket> {
        self.registry
            .get_active_ticket(self.contact())
            .filter(|t| t.ticket_id == self.ticket_id())
    }

    /// Polls until the ticket resolves, disappears, errors out, is cleared,
    /// or shutdown is requested.
    pub async fn run(self) -> Termination {
        info!(contact = %self.contact(), ticket_id = self.ticket_id(), "ticket monitor started");
        let mut consecutive_errors = 0;
        let mut page_full_warned = false;

        let termination = loop {
            if self.shutdown.is_cancelled() {
                break Termination::Shutdown;
            }
            let ticket = self.current_ticket();
            if let Some(termination) = precheck(ticket.as_ref()) {
                break termination;
            }
            let Some(ticket) = ticket else {
                break Termination::Cleared;
            };

            // An in-flight fetch is never dropped; the backend's own request
            // timeout bounds it and shutdown is observed at the sleep.
            let fetched = self
                .backend
                .ticket_messages(self.ticket_id(), self.settings.page_size)
                .await;
            let outcome = self.classify(fetched);
            if let PollOutcome::Fetched(messages) = &outcome {
                if !page_full_warned && page_is_full(messages.len(), self.settings.page_size) {
                    warn!(
                        contact = %self.contact(),
                        ticket_id = self.ticket_id(),
                        page_size = self.settings.page_size,
                        "message page is full, later replies on this ticket will not be relayed"
                    );
                    page_full_warned = true;
                }
            }

            let (next, effects) = on_poll(
                consecutive_errors,
                &ticket,
                outcome,
                self.settings.max_consecutive_errors,
            );
            self.apply(&ticket, &effects).await;

            match next {
                MonitorState::Terminated(termination) => break termination,
                MonitorState::Polling {
                    consecutive_errors: errors,
                } => consecutive_errors = errors,
            }

            let delay = if effects.back_off {
                self.settings.poll_interval * 2
            } else {
                self.settings.poll_interval
            };
            tokio::select! {
                _ = self.shutdown.cancelled() => break Termination::Shutdown,
                _ = tokio::time::sleep(delay) => {}
            }
        };

        if termination.releases_ticket() {
            self.registry
                .release_active_ticket(self.contact(), self.ticket_id());
        }
        telemetry::record_monitor_terminated(&termination.to_string());
        info!(
            contact = %self.contact(),
            ticket_id = self.ticket_id(),
            reason = %termination,
            "ticket monitor stopped"
        );
        termination
    }

    fn classify(&self, fetched: Result<Vec<TicketMessage>, ParleyError>) -> PollOutcome {
        match fetched {
            Ok(messages) => PollOutcome::Fetched(messages),
            Err(ParleyError::TicketNotFound { .. }) => PollOutcome::NotFound,
            Err(e) => {
                telemetry::record_backend_failure("ticket_messages");
                warn!(
                    contact = %self.contact(),
                    ticket_id = self.ticket_id(),
                    error = %e,
                    "failed to fetch ticket messages"
                );
                PollOutcome::Failed(e.to_string())
            }
        }
    }

    async fn apply(&self, ticket: &ActiveTicket, effects: &PollEffects) {
        if effects.last_seen.is_some() || effects.status.is_some() {
            self.registry
                .update_active_ticket(self.contact(), self.ticket_id(), |t| {
                    if let Some(seen) = effects.last_seen {
                        t.last_seen_message_count = t.last_seen_message_count.max(seen);
                    }
                    if let Some(status) = effects.status {
                        t.status = status;
                    }
                });
        }
        if let Some(status) = effects.status {
            debug!(ticket_id = self.ticket_id(), %status, "ticket status changed");
        }

        for body in &effects.relay {
            if let Err(e) = self.sink.relay_reply(&ticket.full_address, body).await {
                warn!(
                    contact = %self.contact(),
                    ticket_id = self.ticket_id(),
                    error = %e,
                    "failed to relay agent reply"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(seen: usize) -> ActiveTicket {
        ActiveTicket {
            last_seen_message_count: seen,
            ..ActiveTicket::opened("T-1", "alice@example.com/phone")
        }
    }

    fn agent(text: &str) -> TicketMessage {
        TicketMessage {
            content: Some(text.into()),
            is_customer: false,
            ..TicketMessage::default()
        }
    }

    fn customer(text: &str) -> TicketMessage {
        TicketMessage {
            content: Some(text.into()),
            is_customer: true,
            ..TicketMessage::default()
        }
    }

    #[test]
    fn precheck_stops_on_cleared_or_terminal() {
        assert_eq!(precheck(None), Some(Termination::Cleared));
        let mut resolved = ticket(0);
        resolved.status = TicketStatus::Closed;
        assert_eq!(precheck(Some(&resolved)), Some(Termination::Resolved));
        assert_eq!(precheck(Some(&ticket(0))), None);
    }

    #[test]
    fn only_the_unseen_suffix_is_relayed() {
        let messages = vec![customer("hi"), agent("old"), customer("?"), agent("new")];
        let (next, effects) = on_poll(0, &ticket(3), PollOutcome::Fetched(messages), 5);
        assert_eq!(next, MonitorState::INITIAL);
        assert_eq!(effects.relay, vec!["new".to_string()]);
        assert_eq!(effects.last_seen, Some(4));
    }

    #[test]
    fn customer_and_empty_messages_advance_the_count_silently() {
        let messages = vec![customer("hi"), agent("   "), TicketMessage::default()];
        let (_, effects) = on_poll(0, &ticket(0), PollOutcome::Fetched(messages), 5);
        assert!(effects.relay.is_empty());
        assert_eq!(effects.last_seen, Some(3));
    }

    #[test]
    fn shorter_list_never_lowers_the_count() {
        let (_, effects) = on_poll(
            0,
            &ticket(5),
            PollOutcome::Fetched(vec![agent("a"), agent("b")]),
            5,
        );
        assert_eq!(effects, PollEffects::default());
    }

    #[test]
    fn latest_embedded_status_wins() {
        let mut first = agent("working on it");
        first.ticket_status = Some(TicketStatus::InProgress);
        let mut last = agent("done");
        last.ticket_status = Some(TicketStatus::Resolved);
        let (next, effects) = on_poll(0, &ticket(0), PollOutcome::Fetched(vec![first, last]), 5);
        assert_eq!(next, MonitorState::INITIAL);
        assert_eq!(effects.status, Some(TicketStatus::Resolved));
        assert_eq!(effects.relay.len(), 2);
    }

    #[test]
    fn success_resets_the_error_count() {
        let (next, _) = on_poll(4, &ticket(0), PollOutcome::Fetched(vec![]), 5);
        assert_eq!(next, MonitorState::INITIAL);
    }

    #[test]
    fn failures_back_off_then_exhaust() {
        let (next, effects) = on_poll(3, &ticket(0), PollOutcome::Failed("503".into()), 5);
        assert_eq!(
            next,
            MonitorState::Polling {
                consecutive_errors: 4
            }
        );
        assert!(effects.back_off);

        let (next, _) = on_poll(4, &ticket(0), PollOutcome::Failed("503".into()), 5);
        assert_eq!(next, MonitorState::Terminated(Termination::ErrorExhausted));
    }

    #[test]
    fn not_found_terminates_immediately() {
        let (next, effects) = on_poll(0, &ticket(2), PollOutcome::NotFound, 5);
        assert_eq!(next, MonitorState::Terminated(Termination::TicketMissing));
        assert_eq!(effects, PollEffects::default());
    }

    #[test]
    fn only_backend_driven_endings_release_the_ticket() {
        assert!(Termination::Resolved.releases_ticket());
        assert!(Termination::TicketMissing.releases_ticket());
        assert!(Termination::ErrorExhausted.releases_ticket());
        assert!(!Termination::Cleared.releases_ticket());
        assert!(!Termination::Shutdown.releases_ticket());
        assert_eq!(Termination::ErrorExhausted.to_string(), "error_exhausted");
    }

    #[derive(Default)]
    struct Collected(std::sync::Mutex<Vec<String>>);

    #[async_trait]
    impl ReplySink for Collected {
        async fn relay_reply(&self, _to_full: &str, body: &str) -> Result<(), ParleyError> {
            self.0.lock().unwrap().push(body.to_string());
            Ok(())
        }
    }

    #[test]
    fn page_fullness() {
        assert!(!page_is_full(49, 50));
        assert!(page_is_full(50, 50));
        assert!(page_is_full(51, 50));
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn full_page_is_reported() {
        let registry = Arc::new(ContactRegistry::new());
        let backend = Arc::new(parley_test_utils::MockBackend::new());
        backend
            .push_poll(
                "T-1",
                parley_test_utils::PollReply::Messages(vec![agent("a"), agent("b")]),
            )
            .await;
        backend
            .push_poll("T-1", parley_test_utils::PollReply::NotFound)
            .await;
        let bare = ContactId::from_full("alice@example.com/phone");
        let lease = registry.set_active_ticket(&bare, ticket(0)).unwrap();
        let sink = Arc::new(Collected::default());
        let settings = MonitorSettings {
            poll_interval: Duration::from_millis(1),
            max_consecutive_errors: 5,
            page_size: 2,
        };

        let monitor = TicketMonitor::new(
            lease,
            Arc::clone(&registry),
            backend,
            sink.clone(),
            settings,
            CancellationToken::new(),
        );
        assert_eq!(monitor.run().await, Termination::TicketMissing);
        assert_eq!(sink.0.lock().unwrap().len(), 2);
        assert!(logs_contain("message page is full"));
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn exhausted_monitor_releases_its_ticket() {
        let registry = Arc::new(ContactRegistry::new());
        let backend = Arc::new(parley_test_utils::MockBackend::new());
        backend
            .push_poll("T-1", parley_test_utils::PollReply::Messages(vec![agent("on it")]))
            .await;
        for _ in 0..2 {
            backend
                .push_poll("T-1", parley_test_utils::PollReply::Error(502))
                .await;
        }
        let bare = ContactId::from_full("alice@example.com/phone");
        let lease = registry.set_active_ticket(&bare, ticket(0)).unwrap();
        let sink = Arc::new(Collected::default());
        let settings = MonitorSettings {
            poll_interval: Duration::from_millis(1),
            max_consecutive_errors: 2,
            page_size: 10,
        };

        let monitor = TicketMonitor::new(
            lease,
            Arc::clone(&registry),
            backend.clone(),
            sink.clone(),
            settings,
            CancellationToken::new(),
        );
        assert_eq!(monitor.run().await, Termination::ErrorExhausted);

        assert_eq!(*sink.0.lock().unwrap(), vec!["on it".to_string()]);
        assert_eq!(backend.poll_count("T-1").await, 3);
        assert!(registry.get_active_ticket(&bare).is_none());
        assert!(!registry.is_monitor_alive(&bare));
        assert!(logs_contain("failed to fetch ticket messages"));
        assert!(logs_contain("reason=error_exhausted"));
    }
}
