// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable conversation logs for the Parley bridge.
//!
//! Every message exchanged with a contact is appended to a per-contact,
//! per-day, sequentially numbered text file. An outbound line announcing that
//! a ticket is being closed ends the current segment; the next message starts
//! `_002`, `_003` and so on. Write failures never propagate to the chat path:
//! they are logged and published on a broadcast channel instead.

pub mod line;
pub mod segment;
pub mod store;

pub use line::{LogLine, ROTATION_PHRASE, SpeakerLabel};
pub use segment::{SegmentInfo, contact_dir_name, contact_from_dir_name};
pub use store::{AppendOutcome, ConversationLogStore, TranscriptFailure};
