// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock ticket backend with scripted responses.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::{
    AdapterType, HealthStatus, IncomingAck, IncomingSubmission, ParleyError, PluginAdapter,
    TicketBackend, TicketMessage, TicketPage, TicketQuery, TicketStatus, TicketSummary,
};
use tokio::sync::Mutex;

/// One scripted answer to a messages poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollReply {
    Messages(Vec<TicketMessage>),
    NotFound,
    /// Non-2xx answer with this status.
    Error(u16),
}

impl PollReply {
    fn into_result(self, ticket_id: &str) -> Result<Vec<TicketMessage>, ParleyError> {
        match self {
            PollReply::Messages(messages) => Ok(messages),
            PollReply::NotFound => Err(ParleyError::TicketNotFound {
                ticket_id: ticket_id.to_string(),
            }),
            PollReply::Error(status) => Err(ParleyError::Backend {
                status: Some(status),
                body: "mock backend error".into(),
                source: None,
            }),
        }
    }
}

#[derive(Default)]
struct TicketScript {
    /// Consumed first, one per poll.
    queued: VecDeque<PollReply>,
    /// Answered once the queue is empty.
    steady: Vec<TicketMessage>,
    polls: usize,
    /// Polls that ran to completion and produced an answer.
    answered: usize,
}

#[derive(Default)]
struct State {
    submit_replies: VecDeque<Result<String, u16>>,
    default_ticket: Option<String>,
    submissions: Vec<IncomingSubmission>,
    tickets: HashMap<String, TicketScript>,
    poll_delay: Duration,
}

/// A ticket backend whose answers are set up by the test.
///
/// Submissions answer with the next scripted reply, then with the default
/// ticket, then with HTTP 500. Polls for a ticket answer with its queued
/// replies, then with its steady message list.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<State>,
}

/// Agent (non-customer) message with `content`.
pub fn agent_message(content: &str) -> TicketMessage {
    TicketMessage {
        content: Some(content.to_string()),
        message_type: Some("agent".into()),
        ..TicketMessage::default()
    }
}

/// Customer message with `content`.
pub fn customer_message(content: &str) -> TicketMessage {
    TicketMessage {
        content: Some(content.to_string()),
        message_type: Some("customer".into()),
        is_customer: true,
        ..TicketMessage::default()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every submission without a scripted reply attaches to `ticket_id`.
    pub async fn with_default_ticket(self, ticket_id: &str) -> Self {
        self.state.lock().await.default_ticket = Some(ticket_id.to_string());
        self
    }

    pub async fn push_submit_ok(&self, ticket_id: &str) {
        self.state
            .lock()
            .await
            .submit_replies
            .push_back(Ok(ticket_id.to_string()));
    }

    pub async fn push_submit_error(&self, status: u16) {
        self.state.lock().await.submit_replies.push_back(Err(status));
    }

    /// Replaces the ticket's steady message list.
    pub async fn set_messages(&self, ticket_id: &str, messages: Vec<TicketMessage>) {
        self.state
            .lock()
            .await
            .tickets
            .entry(ticket_id.to_string())
            .or_default()
            .steady = messages;
    }

    /// Appends to the ticket's steady message list.
    pub async fn add_message(&self, ticket_id: &str, message: TicketMessage) {
        self.state
            .lock()
            .await
            .tickets
            .entry(ticket_id.to_string())
            .or_default()
            .steady
            .push(message);
    }

    pub async fn push_poll(&self, ticket_id: &str, reply: PollReply) {
        self.state
            .lock()
            .await
            .tickets
            .entry(ticket_id.to_string())
            .or_default()
            .queued
            .push_back(reply);
    }

    /// Every poll waits `delay` before answering, outside the state lock.
    pub async fn set_poll_delay(&self, delay: Duration) {
        self.state.lock().await.poll_delay = delay;
    }

    pub async fn submissions(&self) -> Vec<IncomingSubmission> {
        self.state.lock().await.submissions.clone()
    }

    pub async fn poll_count(&self, ticket_id: &str) -> usize {
        self.state
            .lock()
            .await
            .tickets
            .get(ticket_id)
            .map_or(0, |t| t.polls)
    }

    /// Polls of `ticket_id` that were not dropped before answering.
    pub async fn answered_polls(&self, ticket_id: &str) -> usize {
        self.state
            .lock()
            .await
            .tickets
            .get(ticket_id)
            .map_or(0, |t| t.answered)
    }
}

#[async_trait]
impl PluginAdapter for MockBackend {
    fn name(&self) -> &str {
        "mock-backend"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::TicketBackend
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl TicketBackend for MockBackend {
    async fn submit_incoming(
        &self,
        submission: &IncomingSubmission,
    ) -> Result<IncomingAck, ParleyError> {
        let mut state = self.state.lock().await;
        state.submissions.push(submission.clone());
        let reply = state
            .submit_replies
            .pop_front()
            .or_else(|| state.default_ticket.clone().map(Ok))
            .unwrap_or(Err(500));
        match reply {
            Ok(ticket_id) => Ok(IncomingAck {
                ticket_id,
                extra: Default::default(),
            }),
            Err(status) => Err(ParleyError::Backend {
                status: Some(status),
                body: "mock submit failure".into(),
                source: None,
            }),
        }
    }

    async fn ticket_messages(
        &self,
        ticket_id: &str,
        limit: u32,
    ) -> Result<Vec<TicketMessage>, ParleyError> {
        let delay = {
            let mut state = self.state.lock().await;
            state.tickets.entry(ticket_id.to_string()).or_default().polls += 1;
            state.poll_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        let script = state.tickets.entry(ticket_id.to_string()).or_default();
        script.answered += 1;
        if let Some(reply) = script.queued.pop_front() {
            return reply.into_result(ticket_id);
        }
        let skip = script.steady.len().saturating_sub(limit as usize);
        Ok(script.steady[skip..].to_vec())
    }

    async fn active_ticket(&self, jid: &str) -> Result<Option<TicketSummary>, ParleyError> {
        let state = self.state.lock().await;
        let from_jid = state
            .submissions
            .iter()
            .rev()
            .find(|s| parley_core::to_bare_address(&s.from) == jid);
        Ok(from_jid.and(state.default_ticket.clone()).map(|id| TicketSummary {
            id,
            subject: None,
            status: TicketStatus::Open,
            priority: None,
            channel_source: Some("xmpp".into()),
            created_at: None,
            updated_at: None,
        }))
    }

    async fn list_tickets(&self, query: &TicketQuery) -> Result<TicketPage, ParleyError> {
        let state = self.state.lock().await;
        let mut ids: Vec<&String> = state.tickets.keys().collect();
        ids.sort();
        let data: Vec<TicketSummary> = ids
            .into_iter()
            .map(|id| TicketSummary {
                id: id.clone(),
                subject: None,
                status: TicketStatus::Open,
                priority: None,
                channel_source: query.channel_source.clone(),
                created_at: None,
                updated_at: None,
            })
            .collect();
        let count = data.len() as u64;
        let data = data
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .collect();
        Ok(TicketPage { data, count })
    }
}
