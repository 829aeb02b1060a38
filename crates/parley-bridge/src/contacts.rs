// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact-list merging.

use std::collections::HashSet;

use parley_core::{Contact, ContactId, ContactSource, RosterEntry, to_bare_address};

/// Merges the three contact tiers into one list.
///
/// Tiers are taken in order roster, discovered, transcript. Addresses are
/// compared bare and lower-cased; the first tier listing an address keeps
/// its position and display name.
pub fn merge_contacts(
    roster: &[RosterEntry],
    discovered: &[ContactId],
    logged: &[String],
) -> Vec<Contact> {
    let mut seen = HashSet::new();
    let mut contacts = Vec::new();
    let mut add = |address: &str, name: Option<&str>, source: ContactSource| {
        let bare = to_bare_address(address.trim());
        if bare.is_empty() || !seen.insert(bare.to_lowercase()) {
            return;
        }
        contacts.push(Contact {
            address: bare.to_string(),
            name: name.filter(|n| !n.trim().is_empty()).map(str::to_string),
            source,
        });
    };

    for entry in roster {
        add(&entry.jid, entry.name.as_deref(), ContactSource::Roster);
    }
    for contact in discovered {
        add(contact.as_str(), None, ContactSource::Discovered);
    }
    for address in logged {
        add(address, None, ContactSource::Transcript);
    }
    contacts
}
