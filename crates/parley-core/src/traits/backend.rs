// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket backend trait for the support-ticket API.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    IncomingAck, IncomingSubmission, TicketMessage, TicketPage, TicketQuery, TicketSummary,
};

/// Client side of the ticketing backend.
#[async_trait]
pub trait TicketBackend: PluginAdapter {
    /// Records an inbound chat message; the backend answers with the ticket it
    /// was attached to (creating one when needed).
    async fn submit_incoming(
        &self,
        submission: &IncomingSubmission,
    ) -> Result<IncomingAck, ParleyError>;

    /// Returns the most recent `limit` messages of a ticket, oldest first.
    ///
    /// Fails with [`ParleyError::TicketNotFound`] when the backend answers 404.
    async fn ticket_messages(
        &self,
        ticket_id: &str,
        limit: u32,
    ) -> Result<Vec<TicketMessage>, ParleyError>;

    /// Returns the open ticket for a contact, or `None` when there is none.
    async fn active_ticket(&self, jid: &str) -> Result<Option<TicketSummary>, ParleyError>;

    /// Lists tickets matching the query.
    async fn list_tickets(&self, query: &TicketQuery) -> Result<TicketPage, ParleyError>;
}
