// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the chat transport, the ticket backend and the bridge.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Separator between the bare address and the connection resource in a full address.
pub const RESOURCE_SEPARATOR: char = '/';

/// A contact identity in bare form (`user@domain`, no resource).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl ContactId {
    /// Derives the bare identity from a full chat address.
    pub fn from_full(full: &str) -> Self {
        ContactId(to_bare_address(full).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips everything from the first resource separator onward.
///
/// `alice@example.com/phone` becomes `alice@example.com`. Addresses without a
/// resource are returned unchanged, so the function is idempotent.
pub fn to_bare_address(full: &str) -> &str {
    match full.find(RESOURCE_SEPARATOR) {
        Some(idx) => &full[..idx],
        None => full,
    }
}

/// Returns the resource part of a full address, if any.
pub fn resource_of(full: &str) -> Option<&str> {
    full.split_once(RESOURCE_SEPARATOR)
        .map(|(_, resource)| resource)
        .filter(|r| !r.is_empty())
}

/// Unique identifier for a message sent through the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    TicketBackend,
    Observability,
}

// --- Tickets ---

/// Lifecycle status of a backend ticket.
///
/// Parsing accepts any letter case (`open`, `In_Progress`); serialization uses
/// the backend's `SCREAMING_SNAKE_CASE` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl<'de> Deserialize<'de> for TicketStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown ticket status: {raw}")))
    }
}

impl TicketStatus {
    /// Resolved and closed tickets end their monitor.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

/// The locally tracked ticket for one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTicket {
    pub ticket_id: String,
    pub status: TicketStatus,
    /// Number of backend messages already examined for relaying.
    pub last_seen_message_count: usize,
    /// Full address (with resource) replies are sent to.
    pub full_address: String,
}

impl ActiveTicket {
    /// A freshly acknowledged ticket: open, nothing seen yet.
    pub fn opened(ticket_id: impl Into<String>, full_address: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            status: TicketStatus::Open,
            last_seen_message_count: 0,
            full_address: full_address.into(),
        }
    }
}

/// One message on a backend ticket, as returned by the messages endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub sender: Option<serde_json::Value>,
    #[serde(default)]
    pub is_customer: bool,
    /// Status embedded by the backend; unrecognised values are ignored.
    #[serde(default, deserialize_with = "lenient_status")]
    pub ticket_status: Option<TicketStatus>,
}

fn lenient_status<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TicketStatus>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

impl TicketMessage {
    /// Agent or AI messages with non-empty content are relayed to the contact.
    pub fn relayable_content(&self) -> Option<&str> {
        if self.is_customer {
            return None;
        }
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Optional sender details attached to an inbound submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Body of `POST /webhooks/chat/incoming`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingSubmission {
    pub from: String,
    pub to: String,
    pub body: String,
    pub message_type: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<SenderMetadata>,
}

/// Backend acknowledgement of an inbound submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingAck {
    pub ticket_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A ticket as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSummary {
    #[serde(alias = "ticket_id")]
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub channel_source: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of a ticket listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPage {
    pub data: Vec<TicketSummary>,
    pub count: u64,
}

/// Filters for listing tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    pub status: Option<TicketStatus>,
    pub channel_source: Option<String>,
    pub skip: u32,
    pub limit: u32,
}

// --- Chat ---

/// Chat stanza type.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Chat,
    Normal,
    Groupchat,
    Headline,
    Error,
}

/// A chat message delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundChat {
    /// Full sender address, including resource.
    pub from: String,
    /// Full recipient address (this account).
    pub to: String,
    pub body: String,
    pub kind: MessageKind,
    pub received_at: DateTime<Local>,
    /// Roster name of the sender, when known.
    pub sender_name: Option<String>,
}

/// Presence availability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKind {
    Available,
    Away,
    /// Extended away.
    Xa,
    /// Do not disturb.
    Dnd,
    Invisible,
    Unavailable,
}

/// A presence change reported for a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    /// Full address of the contact.
    pub from: String,
    pub kind: PresenceKind,
    pub status: Option<String>,
}

/// Events produced by the chat transport's receive side.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(InboundChat),
    Presence(PresenceUpdate),
    /// The session ended; the receive loop stops.
    Disconnected { reason: String },
}

/// One entry of the account roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub jid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
}

/// Where a merged contact entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ContactSource {
    Roster,
    Discovered,
    Transcript,
}

/// A merged contact-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub address: String,
    pub name: Option<String>,
    pub source: ContactSource,
}

/// Events queued for the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message {
        from: String,
        body: String,
        at: DateTime<Local>,
    },
    Presence {
        from: String,
        kind: PresenceKind,
        status: Option<String>,
    },
    Sent {
        to: String,
        body: String,
        as_ai: bool,
        at: DateTime<Local>,
    },
    System(String),
    Error(String),
}
