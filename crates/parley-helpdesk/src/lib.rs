// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket backend adapter for the Parley bridge.
//!
//! This crate implements [`TicketBackend`] over the backend's HTTP/JSON chat
//! webhooks, authenticated with a bearer token.

pub mod client;

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::BackendConfig;
use parley_core::traits::{PluginAdapter, TicketBackend};
use parley_core::types::{AdapterType, HealthStatus};
use parley_core::{
    IncomingAck, IncomingSubmission, ParleyError, TicketMessage, TicketPage, TicketQuery,
    TicketSummary,
};
use tracing::{info, warn};

pub use crate::client::HelpdeskClient;

/// HTTP ticket backend implementing [`TicketBackend`].
pub struct HelpdeskBackend {
    client: HelpdeskClient,
    channel_source: String,
}

impl HelpdeskBackend {
    /// Creates the backend from the `[backend]` config section.
    ///
    /// Fails with [`ParleyError::Config`] when no base URL is configured.
    pub fn new(config: &BackendConfig) -> Result<Self, ParleyError> {
        let base_url = config.base_url.as_deref().ok_or_else(|| {
            ParleyError::Config("backend.base_url is required to reach the ticket backend".into())
        })?;
        if config.token.is_none() {
            warn!("backend.token is not set, requests will be unauthenticated");
        }
        let client = HelpdeskClient::new(
            base_url,
            config.token.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(base_url, timeout_secs = config.timeout_secs, "ticket backend initialized");
        Ok(Self::with_client(client, config.channel_source.clone()))
    }

    /// Creates a backend around an existing client.
    pub fn with_client(client: HelpdeskClient, channel_source: String) -> Self {
        Self {
            client,
            channel_source,
        }
    }

    /// `channel_source` this bridge's tickets are filed under.
    pub fn channel_source(&self) -> &str {
        &self.channel_source
    }
}

#[async_trait]
impl PluginAdapter for HelpdeskBackend {
    fn name(&self) -> &str {
        "helpdesk"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::TicketBackend
    }

    /// Lists a single ticket; any answer from the backend counts as healthy.
    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let probe = TicketQuery {
            channel_source: Some(self.channel_source.clone()),
            limit: 1,
            ..Default::default()
        };
        Ok(match self.client.list_tickets(&probe).await {
            Ok(_) => HealthStatus::Healthy,
            Err(ParleyError::Backend {
                status: Some(status),
                body,
                ..
            }) if status < 500 => HealthStatus::Degraded(format!("HTTP {status}: {body}")),
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl TicketBackend for HelpdeskBackend {
    async fn submit_incoming(
        &self,
        submission: &IncomingSubmission,
    ) -> Result<IncomingAck, ParleyError> {
        self.client.submit_incoming(submission).await
    }

    async fn ticket_messages(
        &self,
        ticket_id: &str,
        limit: u32,
    ) -> Result<Vec<TicketMessage>, ParleyError> {
        self.client.ticket_messages(ticket_id, limit).await
    }

    async fn active_ticket(&self, jid: &str) -> Result<Option<TicketSummary>, ParleyError> {
        self.client.active_ticket(jid).await
    }

    async fn list_tickets(&self, query: &TicketQuery) -> Result<TicketPage, ParleyError> {
        self.client.list_tickets(query).await
    }
}
