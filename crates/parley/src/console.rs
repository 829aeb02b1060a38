// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console loopback transport.
//!
//! Stands in for a chat server: each input line is either a message from a
//! contact (`<full address> <text>`) or a slash command. Contact-side lines
//! are delivered through [`ChatTransport::receive`]; operator commands are
//! handed to the serve loop over a channel. Outbound messages surface as
//! queued `Sent` events, which the serve loop prints.
//!
//! ```text
//! alice@example.com/phone My order never arrived
//! /presence alice@example.com/phone away Lunch
//! /send alice@example.com/phone Looking into it
//! /status dnd In a meeting
//! /contacts
//! /quit
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Local;
use colored::Colorize;
use parley_core::{
    AdapterType, ChatEvent, ChatTransport, HealthStatus, InboundChat, MessageId, MessageKind,
    ParleyError, PluginAdapter, PresenceKind, PresenceUpdate, RosterEntry, TransportEvent,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// An operator action typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send { to: String, body: String },
    Status { kind: PresenceKind, message: Option<String> },
    Contacts,
    Quit,
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Inbound { from: String, body: String },
    Presence(PresenceUpdate),
    Command(ConsoleCommand),
    Blank,
    Invalid(String),
}

/// Splits off the first whitespace-delimited word.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

pub fn parse_line(line: &str) -> ConsoleLine {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleLine::Blank;
    }
    let Some(command) = line.strip_prefix('/') else {
        let (from, body) = split_word(line);
        if !from.contains('@') {
            return ConsoleLine::Invalid(format!(
                "expected `<address> <message>` or a /command, got `{line}`"
            ));
        }
        return ConsoleLine::Inbound {
            from: from.to_string(),
            body: body.to_string(),
        };
    };

    let (name, rest) = split_word(command);
    match name {
        "send" => {
            let (to, body) = split_word(rest);
            if to.is_empty() || body.is_empty() {
                return ConsoleLine::Invalid("usage: /send <address> <message>".into());
            }
            ConsoleLine::Command(ConsoleCommand::Send {
                to: to.to_string(),
                body: body.to_string(),
            })
        }
        "status" => {
            let (kind, message) = split_word(rest);
            match kind.parse() {
                Ok(kind) => ConsoleLine::Command(ConsoleCommand::Status {
                    kind,
                    message: non_empty(message),
                }),
                Err(_) => ConsoleLine::Invalid(format!("unknown presence `{kind}`")),
            }
        }
        "presence" => {
            let (from, rest) = split_word(rest);
            let (kind, status) = split_word(rest);
            match kind.parse() {
                Ok(kind) if from.contains('@') => ConsoleLine::Presence(PresenceUpdate {
                    from: from.to_string(),
                    kind,
                    status: non_empty(status),
                }),
                _ => ConsoleLine::Invalid("usage: /presence <address> <kind> [status]".into()),
            }
        }
        "contacts" => ConsoleLine::Command(ConsoleCommand::Contacts),
        "quit" | "exit" => ConsoleLine::Command(ConsoleCommand::Quit),
        other => ConsoleLine::Invalid(format!("unknown command `/{other}`")),
    }
}

/// One-line rendering of a queued event.
pub fn render_event(event: &ChatEvent) -> String {
    match event {
        ChatEvent::Message { from, body, at } => {
            format!("{} {} {body}", at.format("%H:%M:%S").to_string().dimmed(), format!("{from}:").cyan())
        }
        ChatEvent::Presence { from, kind, status } => match status {
            Some(status) => format!("{} {from} is {kind} ({status})", "*".dimmed()),
            None => format!("{} {from} is {kind}", "*".dimmed()),
        },
        ChatEvent::Sent {
            to,
            body,
            as_ai,
            at,
        } => {
            let who = if *as_ai { "AI Bot" } else { "Me" };
            format!(
                "{} {} {body}",
                at.format("%H:%M:%S").to_string().dimmed(),
                format!("{who} -> {to}:").green()
            )
        }
        ChatEvent::System(text) => format!("{} {text}", "--".dimmed()),
        ChatEvent::Error(text) => format!("{}: {text}", "error".red()),
    }
}

type LineSource = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

/// Chat transport over a line-oriented input.
pub struct LoopbackTransport {
    lines: Mutex<LineSource>,
    commands: mpsc::UnboundedSender<ConsoleCommand>,
    bound: String,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(
        input: Box<dyn AsyncBufRead + Send + Unpin>,
        bound: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ConsoleCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let transport = Self {
            lines: Mutex::new(input.lines()),
            commands,
            bound: bound.into(),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        (transport, receiver)
    }

    /// Reads from standard input.
    pub fn stdin(bound: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ConsoleCommand>) {
        Self::new(Box::new(BufReader::new(tokio::io::stdin())), bound)
    }

    fn closed_event(&self) -> TransportEvent {
        self.closed.store(true, Ordering::SeqCst);
        TransportEvent::Disconnected {
            reason: "console input closed".into(),
        }
    }
}

#[async_trait]
impl PluginAdapter for LoopbackTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(semver::Version::new(0, 1, 0))
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        if self.closed.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("console input closed".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for LoopbackTransport {
    async fn connect(&self) -> Result<(), ParleyError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(
        &self,
        to: &str,
        body: &str,
        _kind: MessageKind,
    ) -> Result<MessageId, ParleyError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ParleyError::Transport {
                message: "console session is not connected".into(),
                source: None,
            });
        }
        let id = format!("console-{}", Local::now().timestamp_nanos_opt().unwrap_or_default());
        debug!(to, id = %id, "console message delivered");
        Ok(MessageId(id))
    }

    async fn receive(&self) -> Result<TransportEvent, ParleyError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(self.closed_event());
        }
        let mut lines = self.lines.lock().await;
        loop {
            let line = lines.next_line().await.map_err(|e| ParleyError::Transport {
                message: format!("failed to read console input: {e}"),
                source: Some(Box::new(e)),
            })?;
            let Some(line) = line else {
                return Ok(self.closed_event());
            };
            match parse_line(&line) {
                ConsoleLine::Inbound { from, body } => {
                    return Ok(TransportEvent::Message(InboundChat {
                        from,
                        to: self.bound.clone(),
                        body,
                        kind: MessageKind::Chat,
                        received_at: Local::now(),
                        sender_name: None,
                    }));
                }
                ConsoleLine::Presence(update) => return Ok(TransportEvent::Presence(update)),
                ConsoleLine::Command(command) => {
                    // The serve loop may already be gone during shutdown.
                    let _ = self.commands.send(command);
                }
                ConsoleLine::Blank => {}
                ConsoleLine::Invalid(hint) => eprintln!("{}: {hint}", "console".yellow()),
            }
        }
    }

    async fn set_presence(
        &self,
        kind: PresenceKind,
        status: Option<&str>,
    ) -> Result<(), ParleyError> {
        debug!(%kind, status, "console presence set");
        Ok(())
    }

    async fn roster(&self) -> Result<Vec<RosterEntry>, ParleyError> {
        Ok(Vec::new())
    }

    async fn disconnect(&self) -> Result<(), ParleyError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn bound_address(&self) -> String {
        self.bound.clone()
    }
}
