// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The operation surface a front-end drives: session control, sending,
//! presence, contacts, queued events and conversation history.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parley_core::{
    ChatEvent, ChatTransport, Contact, ContactId, MessageId, ParleyError, PresenceKind,
    RosterEntry, TransportEvent,
};
use parley_transcript::SegmentInfo;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::MessageBridge;
use crate::contacts::merge_contacts;

struct Session {
    cancel: CancellationToken,
    receiver: JoinHandle<()>,
}

/// Front-end facade over a [`MessageBridge`].
pub struct BridgeService {
    bridge: Arc<MessageBridge>,
    session: Mutex<Option<Session>>,
    roster: std::sync::Mutex<Vec<RosterEntry>>,
    watching_failures: AtomicBool,
}

impl BridgeService {
    pub fn new(bridge: Arc<MessageBridge>) -> Self {
        Self {
            bridge,
            session: Mutex::new(None),
            roster: std::sync::Mutex::new(Vec::new()),
            watching_failures: AtomicBool::new(false),
        }
    }

    pub fn bridge(&self) -> &Arc<MessageBridge> {
        &self.bridge
    }

    fn transport(&self) -> &Arc<dyn ChatTransport> {
        self.bridge.transport()
    }

    /// Whether a receive loop is running.
    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.receiver.is_finished())
    }

    /// Opens the chat session, announces availability, fetches the roster and
    /// starts the receive loop. Connecting twice is a no-op.
    pub async fn connect(&self) -> Result<(), ParleyError> {
        let mut session = self.session.lock().await;
        if session.as_ref().is_some_and(|s| !s.receiver.is_finished()) {
            debug!("already connected");
            return Ok(());
        }
        if self.bridge.shutdown_token().is_cancelled() {
            return Err(ParleyError::Internal("bridge is shut down".into()));
        }

        let events = self.bridge.events();
        if let Err(e) = self.transport().connect().await {
            warn!(error = %e, "chat connection failed");
            events.push(ChatEvent::Error(format!("connection failed: {e}")));
            return Err(e);
        }
        if let Err(e) = self
            .transport()
            .set_presence(PresenceKind::Available, None)
            .await
        {
            warn!(error = %e, "failed to announce presence");
        }
        self.refresh_roster().await;

        if !self.watching_failures.swap(true, Ordering::AcqRel) {
            self.bridge.watch_transcript_failures();
        }

        let address = self.transport().bound_address();
        info!(address = %address, "connected");
        events.push(ChatEvent::System(format!("connected as {address}")));

        let cancel = self.bridge.shutdown_token().child_token();
        let receiver = self
            .bridge
            .tasks()
            .spawn(receive_loop(Arc::clone(&self.bridge), cancel.clone()));
        *session = Some(Session { cancel, receiver });
        Ok(())
    }

    /// Stops the receive loop and closes the chat session. Ticket monitors
    /// keep running.
    pub async fn disconnect(&self) -> Result<(), ParleyError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        session.cancel.cancel();
        if let Err(e) = session.receiver.await {
            warn!(error = %e, "receive loop ended abnormally");
        }
        self.transport().disconnect().await?;
        info!("disconnected");
        self.bridge
            .events()
            .push(ChatEvent::System("disconnected".into()));
        Ok(())
    }

    /// Sends an operator message.
    pub async fn send_message(&self, to: &str, body: &str) -> Result<MessageId, ParleyError> {
        self.bridge.send_to_contact(to, body, false).await
    }

    pub async fn set_presence_status(
        &self,
        kind: PresenceKind,
        message: Option<&str>,
    ) -> Result<(), ParleyError> {
        self.transport().set_presence(kind, message).await?;
        let notice = match message {
            Some(message) => format!("presence set to {kind} ({message})"),
            None => format!("presence set to {kind}"),
        };
        self.bridge.events().push(ChatEvent::System(notice));
        Ok(())
    }

    /// Roster, then discovered contacts, then contacts found in the logs.
    ///
    /// When the roster cannot be fetched the last fetched roster is used.
    pub async fn get_contacts(&self) -> Vec<Contact> {
        let roster = self.refresh_roster().await;
        let discovered = self.bridge.registry().discovered();
        let logged = match self
            .bridge
            .transcript()
            .list_partners(self.bridge.owner())
            .await
        {
            Ok(partners) => partners,
            Err(e) => {
                warn!(error = %e, "failed to list logged contacts");
                Vec::new()
            }
        };
        merge_contacts(&roster, &discovered, &logged)
    }

    async fn refresh_roster(&self) -> Vec<RosterEntry> {
        match self.transport().roster().await {
            Ok(fresh) => {
                debug!(count = fresh.len(), "roster fetched");
                let mut cached = self.roster.lock().unwrap_or_else(|e| e.into_inner());
                cached.clone_from(&fresh);
                fresh
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch roster, using last known");
                self.roster
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone()
            }
        }
    }

    /// Everything queued since the last call, oldest first.
    pub fn get_queued_events(&self) -> Vec<ChatEvent> {
        self.bridge.events().drain()
    }

    /// Conversation segments with `contact`, newest first.
    pub async fn list_conversation_segments(
        &self,
        contact: &str,
    ) -> Result<Vec<SegmentInfo>, ParleyError> {
        let bare = ContactId::from_full(contact);
        self.bridge
            .transcript()
            .list_segments(self.bridge.owner(), bare.as_str())
            .await
    }

    pub async fn read_segment(&self, segment: &SegmentInfo) -> Result<String, ParleyError> {
        self.bridge.transcript().read(segment).await
    }

    /// Disconnects, then stops every bridge task, waiting up to `drain`.
    pub async fn shutdown(&self, drain: Duration) -> bool {
        if let Err(e) = self.disconnect().await {
            warn!(error = %e, "disconnect during shutdown failed");
        }
        self.bridge.shutdown(drain).await
    }
}

/// Pulls transport events until cancelled or the session ends.
async fn receive_loop(bridge: Arc<MessageBridge>, cancel: CancellationToken) {
    debug!("receive loop started");
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = bridge.transport().receive() => event,
        };
        match event {
            Ok(TransportEvent::Message(message)) => bridge.on_inbound_message(message).await,
            Ok(TransportEvent::Presence(update)) => {
                bridge.events().push(ChatEvent::Presence {
                    from: update.from.clone(),
                    kind: update.kind,
                    status: update.status.clone(),
                });
                bridge.registry().record_presence(update);
            }
            Ok(TransportEvent::Disconnected { reason }) => {
                info!(reason = %reason, "chat session ended");
                bridge
                    .events()
                    .push(ChatEvent::System(format!("disconnected: {reason}")));
                break;
            }
            Err(e) => {
                warn!(error = %e, "receive failed, stopping receive loop");
                bridge.events().push(ChatEvent::Error(e.to_string()));
                break;
            }
        }
    }
    debug!("receive loop stopped");
}
