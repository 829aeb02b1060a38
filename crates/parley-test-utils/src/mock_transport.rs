// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat transport for deterministic testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Local;
use parley_core::{
    AdapterType, ChatTransport, HealthStatus, InboundChat, MessageId, MessageKind, ParleyError,
    PluginAdapter, PresenceKind, PresenceUpdate, RosterEntry, TransportEvent,
};
use tokio::sync::{Mutex, Notify};

/// A message passed to [`ChatTransport::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub body: String,
    pub kind: MessageKind,
}

/// Builds an inbound chat message addressed to `bot@example.com/parley`.
pub fn inbound(from: &str, body: &str) -> InboundChat {
    InboundChat {
        from: from.to_string(),
        to: "bot@example.com/parley".to_string(),
        body: body.to_string(),
        kind: MessageKind::Chat,
        received_at: Local::now(),
        sender_name: None,
    }
}

/// A mock chat session.
///
/// Events injected with [`inject`](Self::inject) are returned by `receive()`
/// in order; `send_message()` calls are captured for assertions.
pub struct MockTransport {
    inbound: Arc<Mutex<VecDeque<TransportEvent>>>,
    notify: Arc<Notify>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    roster: Mutex<Vec<RosterEntry>>,
    presence: Mutex<Vec<(PresenceKind, Option<String>)>>,
    bound: String,
    connected: AtomicBool,
    connects: AtomicUsize,
    reject_auth: Mutex<Option<String>>,
    fail_sends: AtomicBool,
    fail_roster: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::bound_to("bot@example.com/parley")
    }

    pub fn bound_to(address: &str) -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            roster: Mutex::new(Vec::new()),
            presence: Mutex::new(Vec::new()),
            bound: address.to_string(),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            reject_auth: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
            fail_roster: AtomicBool::new(false),
        }
    }

    /// Queues an event for the next `receive()`.
    pub async fn inject(&self, event: TransportEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    pub async fn inject_message(&self, message: InboundChat) {
        self.inject(TransportEvent::Message(message)).await;
    }

    pub async fn inject_presence(&self, from: &str, kind: PresenceKind, status: Option<&str>) {
        self.inject(TransportEvent::Presence(PresenceUpdate {
            from: from.to_string(),
            kind,
            status: status.map(str::to_string),
        }))
        .await;
    }

    pub async fn set_roster(&self, roster: Vec<RosterEntry>) {
        *self.roster.lock().await = roster;
    }

    /// Makes the next `connect()` calls fail with an authentication error.
    pub async fn reject_auth(&self, reason: &str) {
        *self.reject_auth.lock().await = Some(reason.to_string());
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_roster(&self, fail: bool) {
        self.fail_roster.store(fail, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Presence broadcasts made through `set_presence()`, oldest first.
    pub async fn presence_history(&self) -> Vec<(PresenceKind, Option<String>)> {
        self.presence.lock().await.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        if self.is_connected() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded("not connected".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn connect(&self) -> Result<(), ParleyError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.reject_auth.lock().await.clone() {
            return Err(ParleyError::Auth(reason));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(
        &self,
        to: &str,
        body: &str,
        kind: MessageKind,
    ) -> Result<MessageId, ParleyError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ParleyError::Transport {
                message: format!("mock send to {to} refused"),
                source: None,
            });
        }
        self.sent.lock().await.push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
            kind,
        });
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }

    async fn receive(&self) -> Result<TransportEvent, ParleyError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn set_presence(
        &self,
        kind: PresenceKind,
        status: Option<&str>,
    ) -> Result<(), ParleyError> {
        self.presence
            .lock()
            .await
            .push((kind, status.map(str::to_string)));
        Ok(())
    }

    async fn roster(&self) -> Result<Vec<RosterEntry>, ParleyError> {
        if self.fail_roster.load(Ordering::SeqCst) {
            return Err(ParleyError::Transport {
                message: "mock roster unavailable".into(),
                source: None,
            });
        }
        Ok(self.roster.lock().await.clone())
    }

    async fn disconnect(&self) -> Result<(), ParleyError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn bound_address(&self) -> String {
        self.bound.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_returns_injected_events_in_order() {
        let transport = MockTransport::new();
        transport
            .inject_message(inbound("alice@example.com/a", "first"))
            .await;
        transport
            .inject_presence("alice@example.com/a", PresenceKind::Away, None)
            .await;

        match transport.receive().await.unwrap() {
            TransportEvent::Message(m) => assert_eq!(m.body, "first"),
            other => panic!("expected message, got {other:?}"),
        }
        assert!(matches!(
            transport.receive().await.unwrap(),
            TransportEvent::Presence(_)
        ));
    }

    #[tokio::test]
    async fn send_is_captured_unless_failing() {
        let transport = MockTransport::new();
        let id = transport
            .send_message("alice@example.com", "hi", MessageKind::Chat)
            .await
            .unwrap();
        assert!(id.0.starts_with("mock-msg-"));
        transport.fail_sends(true);
        assert!(
            transport
                .send_message("alice@example.com", "again", MessageKind::Chat)
                .await
                .is_err()
        );
        assert_eq!(transport.sent_count().await, 1);
    }

    #[tokio::test]
    async fn auth_rejection_is_reported() {
        let transport = MockTransport::new();
        transport.reject_auth("not-authorized").await;
        assert!(matches!(
            transport.connect().await,
            Err(ParleyError::Auth(_))
        ));
        assert!(!transport.is_connected());
        assert_eq!(transport.connect_count(), 1);
    }
}
