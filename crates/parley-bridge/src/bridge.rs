// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message bridge.
//!
//! Inbound chat is logged and queued on the caller's task; forwarding to the
//! ticket backend and starting the ticket monitor happen on a task spawned on
//! the bridge's [`TaskTracker`], so a slow backend never stalls the receive
//! loop. Outbound messages, whether typed by the operator or relayed from a
//! monitor, go through [`MessageBridge::send_to_contact`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, Utc};
use parley_core::{
    ActiveTicket, ChatEvent, ChatTransport, ContactId, InboundChat, IncomingSubmission, MessageId,
    MessageKind, ParleyError, SenderMetadata, TicketBackend, resource_of,
};
use parley_transcript::{ConversationLogStore, SpeakerLabel};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::events::EventQueue;
use crate::markdown::flatten_links;
use crate::monitor::{MonitorSettings, ReplySink, TicketMonitor};
use crate::registry::ContactRegistry;
use crate::telemetry;

/// What became of an inbound message on the backend side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// No backend is configured.
    NoBackend,
    /// The submission failed; already logged and counted.
    Failed,
    /// A monitor was started for the ticket.
    MonitorStarted { ticket_id: String },
    /// A live monitor already owns the contact's ticket.
    AlreadyMonitored { ticket_id: String },
}

/// Builder for [`MessageBridge`].
pub struct BridgeBuilder {
    owner: String,
    transport: Arc<dyn ChatTransport>,
    transcript: Arc<ConversationLogStore>,
    backend: Option<Arc<dyn TicketBackend>>,
    registry: Option<Arc<ContactRegistry>>,
    events: Option<Arc<EventQueue>>,
    monitor: MonitorSettings,
    shutdown: Option<CancellationToken>,
}

impl BridgeBuilder {
    pub fn backend(mut self, backend: Arc<dyn TicketBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn registry(mut self, registry: Arc<ContactRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn events(mut self, events: Arc<EventQueue>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn monitor_settings(mut self, settings: MonitorSettings) -> Self {
        self.monitor = settings;
        self
    }

    /// Token whose cancellation stops every task the bridge spawns.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> Arc<MessageBridge> {
        Arc::new(MessageBridge {
            owner: self.owner,
            transport: self.transport,
            transcript: self.transcript,
            backend: self.backend,
            registry: self.registry.unwrap_or_default(),
            events: self.events.unwrap_or_default(),
            monitor: self.monitor,
            shutdown: self.shutdown.unwrap_or_default(),
            tasks: TaskTracker::new(),
        })
    }
}

/// Routes chat traffic between the transport, the conversation logs and the
/// ticket backend.
pub struct MessageBridge {
    owner: String,
    transport: Arc<dyn ChatTransport>,
    transcript: Arc<ConversationLogStore>,
    backend: Option<Arc<dyn TicketBackend>>,
    registry: Arc<ContactRegistry>,
    events: Arc<EventQueue>,
    monitor: MonitorSettings,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl MessageBridge {
    /// Starts a bridge for the account whose logs live under `owner`.
    pub fn builder(
        owner: impl Into<String>,
        transport: Arc<dyn ChatTransport>,
        transcript: Arc<ConversationLogStore>,
    ) -> BridgeBuilder {
        BridgeBuilder {
            owner: owner.into(),
            transport,
            transcript,
            backend: None,
            registry: None,
            events: None,
            monitor: MonitorSettings::default(),
            shutdown: None,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    pub fn transcript(&self) -> &Arc<ConversationLogStore> {
        &self.transcript
    }

    pub fn backend(&self) -> Option<&Arc<dyn TicketBackend>> {
        self.backend.as_ref()
    }

    pub fn registry(&self) -> &Arc<ContactRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Number of bridge tasks (monitors, forwards, loops) still running.
    pub fn tasks_in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Handles one inbound chat message.
    ///
    /// Blank bodies are ignored. Otherwise the sender is recorded as
    /// discovered, the message is queued for the front-end and logged, and
    /// forwarding to the backend is spawned.
    pub async fn on_inbound_message(self: &Arc<Self>, message: InboundChat) {
        if message.body.trim().is_empty() {
            debug!(from = %message.from, "ignoring blank message");
            return;
        }
        let bare = ContactId::from_full(&message.from);
        self.registry.record_discovered(&bare);
        telemetry::record_inbound_message();

        self.events.push(ChatEvent::Message {
            from: message.from.clone(),
            body: message.body.clone(),
            at: message.received_at,
        });
        self.transcript
            .append(
                &self.owner,
                bare.as_str(),
                &SpeakerLabel::Peer(bare.to_string()),
                &message.body,
                message.received_at,
            )
            .await;

        if self.backend.is_none() || self.shutdown.is_cancelled() {
            return;
        }
        let bridge = Arc::clone(self);
        self.tasks.spawn(async move {
            bridge.forward_to_backend(message).await;
        });
    }

    /// Submits a message to the backend and makes sure its ticket is
    /// monitored.
    pub async fn forward_to_backend(self: &Arc<Self>, message: InboundChat) -> ForwardOutcome {
        let Some(backend) = self.backend.as_ref() else {
            return ForwardOutcome::NoBackend;
        };
        let submission = IncomingSubmission {
            from: message.from.clone(),
            to: message.to.clone(),
            body: message.body.clone(),
            message_type: message.kind,
            timestamp: message.received_at.with_timezone(&Utc),
            sender: Some(SenderMetadata {
                name: message.sender_name.clone(),
                resource: resource_of(&message.from).map(str::to_string),
            }),
        };

        let ack = match backend.submit_incoming(&submission).await {
            Ok(ack) => ack,
            Err(e) => {
                telemetry::record_backend_failure("submit_incoming");
                warn!(from = %message.from, error = %e, "failed to submit message to backend");
                return ForwardOutcome::Failed;
            }
        };
        debug!(from = %message.from, ticket_id = %ack.ticket_id, "message attached to ticket");

        let bare = ContactId::from_full(&message.from);
        self.ensure_monitor(&bare, ack.ticket_id, &message.from)
    }

    /// Claims the contact's ticket slot and spawns a monitor, unless a live
    /// monitor already owns it.
    pub fn ensure_monitor(
        self: &Arc<Self>,
        bare: &ContactId,
        ticket_id: String,
        full_address: &str,
    ) -> ForwardOutcome {
        let Some(backend) = self.backend.clone() else {
            return ForwardOutcome::NoBackend;
        };
        let ticket = ActiveTicket::opened(ticket_id.clone(), full_address);
        match self.registry.set_active_ticket(bare, ticket) {
            Ok(lease) => {
                let sink: Arc<dyn ReplySink> = Arc::clone(self) as Arc<dyn ReplySink>;
                let monitor = TicketMonitor::new(
                    lease,
                    Arc::clone(&self.registry),
                    backend,
                    sink,
                    self.monitor,
                    self.shutdown.child_token(),
                );
                let registry = Arc::clone(&self.registry);
                self.tasks.spawn(async move {
                    monitor.run().await;
                    telemetry::set_active_monitors(registry.active_ticket_count());
                });
                telemetry::set_active_monitors(self.registry.active_ticket_count());
                ForwardOutcome::MonitorStarted { ticket_id }
            }
            Err(ParleyError::Conflict {
                ticket_id: existing,
                ..
            }) => {
                debug!(contact = %bare, ticket_id = %existing, "ticket already monitored");
                ForwardOutcome::AlreadyMonitored {
                    ticket_id: existing,
                }
            }
            Err(e) => {
                warn!(contact = %bare, error = %e, "could not record active ticket");
                ForwardOutcome::Failed
            }
        }
    }

    /// Sends `body` to a contact and logs it.
    ///
    /// Markdown links are flattened first. The log label is "AI Bot" for
    /// relayed agent replies and "Me" for operator messages. Nothing is logged
    /// when the transport refuses the message.
    pub async fn send_to_contact(
        &self,
        to_full: &str,
        body: &str,
        as_ai: bool,
    ) -> Result<MessageId, ParleyError> {
        let text = flatten_links(body);
        let id = self
            .transport
            .send_message(to_full, &text, MessageKind::Chat)
            .await?;

        let bare = ContactId::from_full(to_full);
        let label = if as_ai {
            SpeakerLabel::AiBot
        } else {
            SpeakerLabel::Me
        };
        let now = Local::now();
        self.transcript
            .append(&self.owner, bare.as_str(), &label, &text, now)
            .await;
        self.events.push(ChatEvent::Sent {
            to: to_full.to_string(),
            body: text.into_owned(),
            as_ai,
            at: now,
        });
        Ok(id)
    }

    /// Forwards conversation-log failures to the metrics and the event queue
    /// until shutdown.
    pub fn watch_transcript_failures(&self) {
        let mut failures = self.transcript.subscribe_failures();
        let events = Arc::clone(&self.events);
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = failures.recv() => received,
                };
                match received {
                    Ok(failure) => {
                        telemetry::record_transcript_failure();
                        events.push(ChatEvent::Error(format!(
                            "could not write conversation log for {}: {}",
                            failure.partner, failure.error
                        )));
                    }
                    Err(RecvError::Lagged(missed)) => {
                        for _ in 0..missed {
                            telemetry::record_transcript_failure();
                        }
                        warn!(missed, "transcript failure watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Stops every bridge task and waits up to `drain` for them to finish.
    /// Returns `false` when tasks were still running at the deadline.
    pub async fn shutdown(&self, drain: Duration) -> bool {
        self.shutdown.cancel();
        self.tasks.close();
        match tokio::time::timeout(drain, self.tasks.wait()).await {
            Ok(()) => {
                info!("bridge tasks drained");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.tasks.len(),
                    timeout_secs = drain.as_secs_f64(),
                    "bridge tasks still running at drain timeout"
                );
                false
            }
        }
    }
}

#[async_trait]
impl ReplySink for MessageBridge {
    async fn relay_reply(&self, to_full: &str, body: &str) -> Result<(), ParleyError> {
        self.send_to_contact(to_full, body, true).await?;
        telemetry::record_relayed_message();
        Ok(())
    }
}
