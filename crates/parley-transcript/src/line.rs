// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One log line: `(YYYY-MM-DD HH:MM:SS) <label>: <body>`.

use std::fmt;

use chrono::NaiveDateTime;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Phrase in an outbound line that ends the current segment.
pub const ROTATION_PHRASE: &str = "closing ticket";

/// Who wrote a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerLabel {
    /// The contact, labelled with its bare address.
    Peer(String),
    /// The operator.
    Me,
    /// A relayed agent or AI reply.
    AiBot,
}

impl SpeakerLabel {
    pub fn is_outbound(&self) -> bool {
        !matches!(self, SpeakerLabel::Peer(_))
    }

    /// Whether appending `body` under this label closes the segment.
    pub fn triggers_rotation(&self, body: &str) -> bool {
        self.is_outbound() && body.to_lowercase().contains(ROTATION_PHRASE)
    }
}

impl fmt::Display for SpeakerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerLabel::Peer(address) => f.write_str(address),
            SpeakerLabel::Me => f.write_str("Me"),
            SpeakerLabel::AiBot => f.write_str("AI Bot"),
        }
    }
}

/// A parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: NaiveDateTime,
    pub speaker: String,
    pub body: String,
}

impl LogLine {
    /// Renders a line, including the trailing newline.
    ///
    /// Line breaks inside `body` become spaces so one message is one line.
    pub fn render(timestamp: NaiveDateTime, label: &SpeakerLabel, body: &str) -> String {
        let flat: String = body
            .replace("\r\n", " ")
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        format!("({}) {label}: {flat}\n", timestamp.format(TIMESTAMP_FORMAT))
    }

    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('(')?;
        let (stamp, rest) = rest.split_once(") ")?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        let (speaker, body) = rest.split_once(": ").or_else(|| {
            // An empty body leaves only the colon.
            rest.strip_suffix(':').map(|speaker| (speaker, ""))
        })?;
        Some(Self {
            timestamp,
            speaker: speaker.to_string(),
            body: body.trim_end_matches(['\r', '\n']).to_string(),
        })
    }
}
