// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of Markdown links for chat clients.
//!
//! Most chat clients show `[text](url)` literally, so links are flattened to
//! `text: url` before sending. A link whose text is empty or repeats the URL
//! becomes just the URL.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").unwrap());

/// Rewrites every inline Markdown link in `text`. Other text is untouched.
pub fn flatten_links(text: &str) -> Cow<'_, str> {
    LINK_PATTERN.replace_all(text, |caps: &Captures<'_>| {
        let label = caps[1].trim();
        let url = &caps[2];
        if label.is_empty() || label == url {
            url.to_string()
        } else {
            format!("{label}: {url}")
        }
    })
}
