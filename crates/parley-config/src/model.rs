// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Chat account credentials and server.
    #[serde(default)]
    pub account: AccountConfig,

    /// Ticket backend endpoint.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Ticket monitor polling.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Conversation log location.
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Prometheus exporter.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Chat account configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Bare account address (`user@domain`).
    #[serde(default)]
    pub jid: Option<String>,

    /// Account password.
    #[serde(default)]
    pub password: Option<String>,

    /// Resource bound for this session.
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Explicit server host; derived from the account domain when unset.
    #[serde(default)]
    pub server: Option<String>,

    /// Client-to-server port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl AccountConfig {
    /// Local part of the account address; names the owner directory of the
    /// conversation logs.
    pub fn username(&self) -> Option<&str> {
        let jid = self.jid.as_deref()?;
        let local = jid.split('@').next().unwrap_or(jid);
        (!local.is_empty()).then_some(local)
    }

    /// Server host to connect to.
    pub fn server_host(&self) -> Option<&str> {
        self.server
            .as_deref()
            .or_else(|| self.jid.as_deref().and_then(|j| j.split_once('@')).map(|(_, d)| d))
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            jid: None,
            password: None,
            resource: default_resource(),
            server: None,
            port: default_port(),
        }
    }
}

fn default_resource() -> String {
    "parley".to_string()
}

fn default_port() -> u16 {
    5222
}

/// Ticket backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the ticketing API (e.g. `https://helpdesk.example.com`).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `channel_source` used when listing this bridge's tickets.
    #[serde(default = "default_channel_source")]
    pub channel_source: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
            channel_source: default_channel_source(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_channel_source() -> String {
    "xmpp".to_string()
}

/// Ticket monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Seconds between polls; doubled after a failed poll.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Consecutive failed polls after which a monitor gives up.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Number of most-recent ticket messages requested per poll.
    ///
    /// New replies are found by comparing the page length with the number
    /// already seen, so a ticket with more messages than this stops
    /// producing relays once its page is full. Size it above the longest
    /// expected conversation.
    #[serde(default = "default_message_page_size")]
    pub message_page_size: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_consecutive_errors: default_max_consecutive_errors(),
            message_page_size: default_message_page_size(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_max_consecutive_errors() -> u32 {
    5
}

fn default_message_page_size() -> u32 {
    50
}

/// Conversation log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptConfig {
    /// Root directory of the per-owner log trees.
    #[serde(default = "default_transcript_dir")]
    pub dir: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            dir: default_transcript_dir(),
        }
    }
}

fn default_transcript_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("parley").join("logs").display().to_string())
        .unwrap_or_else(|| "./logs".to_string())
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Whether the exporter is installed.
    #[serde(default)]
    pub enabled: bool,

    /// Listen address of the scrape endpoint.
    #[serde(default = "default_prometheus_listen")]
    pub listen: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_prometheus_listen(),
        }
    }
}

fn default_prometheus_listen() -> String {
    "127.0.0.1:9464".to_string()
}
