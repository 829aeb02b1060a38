// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport trait: the seam to the presence-based chat protocol library.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, MessageKind, PresenceKind, RosterEntry, TransportEvent};

/// A connected chat account.
///
/// Implementations own the wire protocol (stream negotiation, authentication,
/// stanza encoding). All methods take `&self` so a single transport can be
/// shared between the receive loop and the monitors that relay replies.
#[async_trait]
pub trait ChatTransport: PluginAdapter {
    /// Opens the session.
    ///
    /// Fails with [`ParleyError::Auth`] when credentials are rejected and
    /// [`ParleyError::Connect`] when the server cannot be reached.
    async fn connect(&self) -> Result<(), ParleyError>;

    /// Sends a message to a full or bare address.
    async fn send_message(
        &self,
        to: &str,
        body: &str,
        kind: MessageKind,
    ) -> Result<MessageId, ParleyError>;

    /// Waits for the next inbound event.
    async fn receive(&self) -> Result<TransportEvent, ParleyError>;

    /// Broadcasts this account's presence.
    async fn set_presence(
        &self,
        kind: PresenceKind,
        status: Option<&str>,
    ) -> Result<(), ParleyError>;

    /// Fetches the account roster.
    async fn roster(&self) -> Result<Vec<RosterEntry>, ParleyError>;

    /// Closes the session.
    async fn disconnect(&self) -> Result<(), ParleyError>;

    /// Full address bound to this session (`user@domain/resource`).
    fn bound_address(&self) -> String;
}
