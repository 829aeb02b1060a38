// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley contact-ticket bridge.

use thiserror::Error;

/// The primary error type used across all Parley adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// The chat session could not be established (DNS, TCP, TLS, stream negotiation).
    #[error("connect error: {message}")]
    Connect {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The chat server rejected the account credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The ticket backend answered with a non-success status or could not be reached.
    #[error("backend error{}: {body}", http_suffix(.status))]
    Backend {
        status: Option<u16>,
        body: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The ticket backend no longer knows the ticket (HTTP 404).
    #[error("ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: String },

    /// A ticket is already active for the contact and its monitor is still alive.
    #[error("contact {contact} already has active ticket {ticket_id}")]
    Conflict { contact: String, ticket_id: String },

    /// Chat transport errors after the session is up (send failure, closed stream).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Conversation log I/O errors.
    #[error("transcript error: {source}")]
    Transcript {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for a [`ParleyError::Backend`] without an HTTP status.
    pub fn backend_unreachable(
        body: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ParleyError::Backend {
            status: None,
            body: body.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Errors that end a chat session and must be surfaced to the operator.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ParleyError::Connect { .. } | ParleyError::Auth(_))
    }
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl From<std::io::Error> for ParleyError {
    fn from(e: std::io::Error) -> Self {
        ParleyError::Transcript {
            source: Box::new(e),
        }
    }
}
