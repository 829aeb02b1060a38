// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation log store.
//!
//! Layout: `<root>/<owner>/<contact dir>/<YYYY-MM-DD>_<NNN>.txt`. Each
//! (owner, partner) pair has a cursor remembering the segment currently being
//! written. Appends for one pair run under that cursor's lock, so the
//! sequence read-modify-write and the file append are never interleaved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use dashmap::DashMap;
use parley_core::ParleyError;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use crate::line::{LogLine, SpeakerLabel};
use crate::segment::{
    SegmentInfo, contact_dir_name, contact_from_dir_name, parse_segment_file_name,
    segment_file_name,
};

/// Capacity of the failure broadcast channel.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey {
    owner: String,
    partner: String,
}

/// In-memory position of a pair: which day and which segment of that day.
#[derive(Debug, Default)]
struct SegmentCursor {
    date: Option<NaiveDate>,
    sequence: u32,
}

/// Result of an append. Appends never fail the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Written {
        path: PathBuf,
        /// The next append for this pair opens a new segment.
        rotated: bool,
    },
    Failed {
        error: String,
    },
}

impl AppendOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, AppendOutcome::Written { .. })
    }
}

/// A failed append, published to [`ConversationLogStore::subscribe_failures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFailure {
    pub owner: String,
    pub partner: String,
    pub path: Option<PathBuf>,
    pub error: String,
    pub at: DateTime<Local>,
}

/// Append-only, rotation-aware store of conversation logs.
pub struct ConversationLogStore {
    root: PathBuf,
    cursors: DashMap<PairKey, Arc<Mutex<SegmentCursor>>>,
    failures: broadcast::Sender<TranscriptFailure>,
}

impl ConversationLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            root: root.into(),
            cursors: DashMap::new(),
            failures,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receives every failed append from now on.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<TranscriptFailure> {
        self.failures.subscribe()
    }

    fn pair_dir(&self, owner: &str, partner: &str) -> Result<PathBuf, ParleyError> {
        check_component(owner)?;
        let dir = contact_dir_name(partner);
        check_component(&dir)?;
        Ok(self.root.join(owner).join(dir))
    }

    /// Appends one line for `(owner, partner)` stamped with `timestamp`.
    ///
    /// The segment is chosen from the pair's cursor; on the first write of a
    /// day the cursor adopts the highest sequence already on disk for that
    /// date (1 when there is none). An outbound body containing the rotation
    /// phrase advances the sequence so the next append opens a new segment.
    pub async fn append(
        &self,
        owner: &str,
        partner: &str,
        label: &SpeakerLabel,
        body: &str,
        timestamp: DateTime<Local>,
    ) -> AppendOutcome {
        let dir = match self.pair_dir(owner, partner) {
            Ok(dir) => dir,
            Err(e) => return self.fail(owner, partner, None, e.to_string()),
        };

        let cursor = self
            .cursors
            .entry(PairKey {
                owner: owner.to_string(),
                partner: partner.to_string(),
            })
            .or_default()
            .clone();
        let mut cursor = cursor.lock().await;

        let date = timestamp.date_naive();
        if cursor.date != Some(date) {
            let highest = match highest_sequence(&dir, date).await {
                Ok(highest) => highest,
                Err(e) => {
                    // The cursor stays unresolved so the next append scans again.
                    drop(cursor);
                    let error = format!("could not scan {}: {e}", dir.display());
                    return self.fail(owner, partner, None, error);
                }
            };
            cursor.sequence = highest.max(1);
            cursor.date = Some(date);
            debug!(
                owner,
                partner,
                %date,
                sequence = cursor.sequence,
                "resolved active segment"
            );
        }

        let path = dir.join(segment_file_name(date, cursor.sequence));
        let line = LogLine::render(timestamp.naive_local(), label, body);
        let written = write_line(&dir, &path, &line).await;

        let rotated = label.triggers_rotation(body);
        if rotated {
            cursor.sequence += 1;
            debug!(
                owner,
                partner,
                next_sequence = cursor.sequence,
                "closing phrase seen, next append opens a new segment"
            );
        }
        drop(cursor);

        match written {
            Ok(()) => AppendOutcome::Written { path, rotated },
            Err(e) => self.fail(owner, partner, Some(path), e.to_string()),
        }
    }

    fn fail(
        &self,
        owner: &str,
        partner: &str,
        path: Option<PathBuf>,
        error: String,
    ) -> AppendOutcome {
        warn!(owner, partner, path = ?path, error = %error, "conversation log write failed");
        // No subscribers is fine.
        let _ = self.failures.send(TranscriptFailure {
            owner: owner.to_string(),
            partner: partner.to_string(),
            path,
            error: error.clone(),
            at: Local::now(),
        });
        AppendOutcome::Failed { error }
    }

    /// Segments of a pair, newest first. A pair without logs has no segments.
    pub async fn list_segments(
        &self,
        owner: &str,
        partner: &str,
    ) -> Result<Vec<SegmentInfo>, ParleyError> {
        let dir = self.pair_dir(owner, partner)?;
        let mut segments = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(segments),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some((date, sequence)) = name.to_str().and_then(parse_segment_file_name) else {
                continue;
            };
            segments.push(SegmentInfo {
                owner: owner.to_string(),
                partner: partner.to_string(),
                date,
                sequence,
                path: entry.path(),
            });
        }
        segments.sort_by(|a, b| b.date.cmp(&a.date).then(b.sequence.cmp(&a.sequence)));
        Ok(segments)
    }

    /// Looks up one segment of a pair by file name.
    pub async fn segment(
        &self,
        owner: &str,
        partner: &str,
        file_name: &str,
    ) -> Result<SegmentInfo, ParleyError> {
        self.list_segments(owner, partner)
            .await?
            .into_iter()
            .find(|s| s.file_name() == file_name)
            .ok_or_else(|| ParleyError::Transcript {
                source: format!("no segment {file_name} for {partner}").into(),
            })
    }

    /// Full text of a segment.
    pub async fn read(&self, segment: &SegmentInfo) -> Result<String, ParleyError> {
        Ok(tokio::fs::read_to_string(&segment.path).await?)
    }

    /// Parsed lines of a segment; lines that do not parse are skipped.
    pub async fn read_lines(&self, segment: &SegmentInfo) -> Result<Vec<LogLine>, ParleyError> {
        let text = self.read(segment).await?;
        Ok(text.lines().filter_map(LogLine::parse).collect())
    }

    /// Bare addresses that have a log directory under `owner`, sorted.
    pub async fn list_partners(&self, owner: &str) -> Result<Vec<String>, ParleyError> {
        check_component(owner)?;
        let mut partners = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.root.join(owner)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(partners),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                partners.push(contact_from_dir_name(name));
            }
        }
        partners.sort();
        Ok(partners)
    }
}

/// Rejects path components that would escape the log root.
fn check_component(component: &str) -> Result<(), ParleyError> {
    let bad = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\', '\0']);
    if bad {
        return Err(ParleyError::Transcript {
            source: format!("invalid log path component {component:?}").into(),
        });
    }
    Ok(())
}

/// Highest sequence among `dir`'s segments for `date`, 0 when there are none
/// or the directory does not exist yet.
async fn highest_sequence(dir: &Path, date: NaiveDate) -> std::io::Result<u32> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut highest = 0;
    while let Some(entry) = entries.next_entry().await? {
        if let Some((d, sequence)) = entry.file_name().to_str().and_then(parse_segment_file_name) {
            if d == date {
                highest = highest.max(sequence);
            }
        }
    }
    Ok(highest)
}

async fn write_line(dir: &Path, path: &Path, line: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 10, day, h, m, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[tokio::test]
    async fn first_write_starts_at_sequence_one() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConversationLogStore::new(tmp.path());
        let outcome = store
            .append(
                "bot",
                "alice@example.com",
                &SpeakerLabel::Peer("alice@example.com".into()),
                "hi",
                at(7, 9, 0),
            )
            .await;
        let expected = tmp
            .path()
            .join("bot/alice_at_example.com/2025-10-07_001.txt");
        assert_eq!(
            outcome,
            AppendOutcome::Written {
                path: expected.clone(),
                rotated: false
            }
        );
        let text = std::fs::read_to_string(expected).unwrap();
        assert_eq!(text, "(2025-10-07 09:00:00) alice@example.com: hi\n");
    }

    #[tokio::test]
    async fn new_day_opens_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConversationLogStore::new(tmp.path());
        store
            .append("bot", "a@b", &SpeakerLabel::Me, "late", at(7, 23, 59))
            .await;
        let outcome = store
            .append("bot", "a@b", &SpeakerLabel::Me, "early", at(8, 0, 1))
            .await;
        assert_eq!(
            outcome,
            AppendOutcome::Written {
                path: tmp.path().join("bot/a_at_b/2025-10-08_001.txt"),
                rotated: false
            }
        );
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn traversal_components_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConversationLogStore::new(tmp.path().join("logs"));
        let mut failures = store.subscribe_failures();
        let outcome = store
            .append("bot", "..", &SpeakerLabel::Me, "x", at(7, 1, 0))
            .await;
        assert!(!outcome.is_written());
        let failure = failures.try_recv().expect("failure published");
        assert_eq!(failure.partner, "..");
        assert!(failure.path.is_none());
        assert!(logs_contain("conversation log write failed"));
    }

    #[tokio::test]
    async fn unreadable_pair_dir_fails_instead_of_restarting_at_one() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConversationLogStore::new(tmp.path());
        std::fs::create_dir_all(tmp.path().join("bot")).unwrap();
        // A file where the contact's directory should be cannot be scanned.
        std::fs::write(tmp.path().join("bot/a_at_b"), "").unwrap();
        let mut failures = store.subscribe_failures();

        let outcome = store
            .append("bot", "a@b", &SpeakerLabel::Me, "x", at(7, 1, 0))
            .await;
        let AppendOutcome::Failed { error } = outcome else {
            panic!("append should fail, got {outcome:?}");
        };
        assert!(error.starts_with("could not scan"), "{error}");
        let failure = failures.try_recv().expect("failure published");
        assert_eq!(failure.partner, "a@b");

        // Once the directory is usable the scan is retried and finds the
        // existing segments.
        std::fs::remove_file(tmp.path().join("bot/a_at_b")).unwrap();
        std::fs::create_dir_all(tmp.path().join("bot/a_at_b")).unwrap();
        std::fs::write(tmp.path().join("bot/a_at_b/2025-10-07_003.txt"), "").unwrap();
        let outcome = store
            .append("bot", "a@b", &SpeakerLabel::Me, "y", at(7, 1, 1))
            .await;
        assert_eq!(
            outcome,
            AppendOutcome::Written {
                path: tmp.path().join("bot/a_at_b/2025-10-07_003.txt"),
                rotated: false
            }
        );
    }

    #[tokio::test]
    async fn missing_pair_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConversationLogStore::new(tmp.path());
        assert!(store.list_segments("bot", "x@y").await.unwrap().is_empty());
        assert!(store.list_partners("bot").await.unwrap().is_empty());
    }
}
