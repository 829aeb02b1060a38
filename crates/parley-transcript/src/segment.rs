// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Segment naming: `<YYYY-MM-DD>_<NNN>.txt` inside `<owner>/<contact dir>/`.

use std::path::PathBuf;

use chrono::{Duration, NaiveDate};

/// Replaces `@` in a contact directory name.
pub const AT_TOKEN: &str = "_at_";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Directory name for a contact's logs.
pub fn contact_dir_name(bare: &str) -> String {
    bare.replace('@', AT_TOKEN)
}

/// Inverse of [`contact_dir_name`]. The last token is taken as the `@`.
pub fn contact_from_dir_name(dir: &str) -> String {
    match dir.rfind(AT_TOKEN) {
        Some(idx) => format!("{}@{}", &dir[..idx], &dir[idx + AT_TOKEN.len()..]),
        None => dir.to_string(),
    }
}

pub fn segment_file_name(date: NaiveDate, sequence: u32) -> String {
    format!("{}_{sequence:03}.txt", date.format(DATE_FORMAT))
}

/// Parses `2025-10-07_002.txt` into its date and sequence.
///
/// Un-numbered `2025-10-07.txt` files from older installs parse with sequence 0.
pub fn parse_segment_file_name(name: &str) -> Option<(NaiveDate, u32)> {
    let stem = name.strip_suffix(".txt")?;
    let (date_part, sequence) = match stem.split_once('_') {
        Some((date_part, counter)) => {
            if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (date_part, counter.parse().ok()?)
        }
        None => (stem, 0),
    };
    let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()?;
    Some((date, sequence))
}

/// One log file of one (owner, partner) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub owner: String,
    /// Bare address of the contact.
    pub partner: String,
    pub date: NaiveDate,
    pub sequence: u32,
    pub path: PathBuf,
}

impl SegmentInfo {
    pub fn file_name(&self) -> String {
        if self.sequence == 0 {
            format!("{}.txt", self.date.format(DATE_FORMAT))
        } else {
            segment_file_name(self.date, self.sequence)
        }
    }

    /// Human-readable title relative to `today`, e.g. "Yesterday - Conversation #2".
    pub fn title(&self, today: NaiveDate) -> String {
        let day = if self.date == today {
            "Today".to_string()
        } else if Some(self.date) == today.checked_sub_signed(Duration::days(1)) {
            "Yesterday".to_string()
        } else {
            self.date.format("%B %d, %Y").to_string()
        };
        format!("{day} - Conversation #{}", self.sequence.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn contact_dir_round_trip() {
        assert_eq!(contact_dir_name("alice@example.com"), "alice_at_example.com");
        assert_eq!(contact_from_dir_name("alice_at_example.com"), "alice@example.com");
        assert_eq!(contact_from_dir_name("a_at_b_at_c.org"), "a_at_b@c.org");
        assert_eq!(contact_from_dir_name("plain"), "plain");
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(segment_file_name(date(2025, 10, 7), 1), "2025-10-07_001.txt");
        assert_eq!(segment_file_name(date(2025, 10, 7), 1234), "2025-10-07_1234.txt");
        assert_eq!(
            parse_segment_file_name("2025-10-07_012.txt"),
            Some((date(2025, 10, 7), 12))
        );
        assert_eq!(
            parse_segment_file_name("2025-10-07.txt"),
            Some((date(2025, 10, 7), 0))
        );
        assert_eq!(parse_segment_file_name("2025-10-07_x.txt"), None);
        assert_eq!(parse_segment_file_name("notes.txt"), None);
        assert_eq!(parse_segment_file_name("2025-10-07_001.log"), None);
    }

    #[test]
    fn titles_are_relative_to_today() {
        let today = date(2025, 10, 7);
        let mut seg = SegmentInfo {
            owner: "bot".into(),
            partner: "a@b".into(),
            date: today,
            sequence: 2,
            path: PathBuf::new(),
        };
        assert_eq!(seg.title(today), "Today - Conversation #2");
        seg.date = date(2025, 10, 6);
        assert_eq!(seg.title(today), "Yesterday - Conversation #2");
        seg.date = date(2025, 9, 3);
        assert_eq!(seg.title(today), "September 03, 2025 - Conversation #2");
    }
}
