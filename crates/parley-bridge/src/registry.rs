// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact registry: discovered contacts, last-known presence, and the one
//! active ticket each contact may have.
//!
//! Ticket slots live in a [`DashMap`] keyed by bare address, so every slot
//! operation holds only that contact's shard lock. Creating a slot is a
//! single compare-and-set through the entry API. Slot liveness is tracked by
//! a [`MonitorLease`]: the monitor owns the lease, and dropping it (normal
//! exit, cancellation or panic) marks the slot's monitor as dead.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_core::{ActiveTicket, ContactId, ParleyError, PresenceKind, PresenceUpdate};
use tracing::debug;

struct TicketSlot {
    ticket: ActiveTicket,
    alive: Arc<AtomicBool>,
}

/// Proof that the holder is the monitor for one contact's ticket.
#[derive(Debug)]
pub struct MonitorLease {
    contact: ContactId,
    ticket_id: String,
    alive: Arc<AtomicBool>,
}

impl MonitorLease {
    pub fn contact(&self) -> &ContactId {
        &self.contact
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }
}

impl Drop for MonitorLease {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// In-memory contact state shared by the bridge and its monitors.
#[derive(Default)]
pub struct ContactRegistry {
    tickets: DashMap<ContactId, TicketSlot>,
    discovered: DashMap<ContactId, u64>,
    discovery_order: AtomicU64,
    presence: DashMap<ContactId, PresenceUpdate>,
}

impl ContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bare identity of a full address.
    pub fn to_bare_address(full: &str) -> ContactId {
        ContactId::from_full(full)
    }

    /// Adds a contact to the discovered set. Returns `true` the first time.
    pub fn record_discovered(&self, bare: &ContactId) -> bool {
        match self.discovered.entry(bare.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(self.discovery_order.fetch_add(1, Ordering::Relaxed));
                debug!(contact = %bare, "discovered new contact");
                true
            }
        }
    }

    /// Discovered contacts in discovery order.
    pub fn discovered(&self) -> Vec<ContactId> {
        let mut contacts: Vec<(u64, ContactId)> = self
            .discovered
            .iter()
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();
        contacts.sort_by_key(|(order, _)| *order);
        contacts.into_iter().map(|(_, contact)| contact).collect()
    }

    pub fn record_presence(&self, update: PresenceUpdate) {
        let bare = ContactId::from_full(&update.from);
        self.presence.insert(bare, update);
    }

    pub fn presence(&self, bare: &ContactId) -> Option<(PresenceKind, Option<String>)> {
        self.presence
            .get(bare)
            .map(|p| (p.kind, p.status.clone()))
    }

    pub fn get_active_ticket(&self, bare: &ContactId) -> Option<ActiveTicket> {
        self.tickets.get(bare).map(|slot| slot.ticket.clone())
    }

    /// Stores `ticket` for `bare` unless a live monitor already owns a ticket
    /// for that contact.
    ///
    /// A slot whose monitor has ended is replaced. On success the returned
    /// lease must be handed to the monitor that will own the ticket.
    pub fn set_active_ticket(
        &self,
        bare: &ContactId,
        ticket: ActiveTicket,
    ) -> Result<MonitorLease, ParleyError> {
        let alive = Arc::new(AtomicBool::new(true));
        let slot = TicketSlot {
            ticket,
            alive: Arc::clone(&alive),
        };
        let ticket_id = slot.ticket.ticket_id.clone();

        match self.tickets.entry(bare.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().alive.load(Ordering::Acquire) {
                    return Err(ParleyError::Conflict {
                        contact: bare.to_string(),
                        ticket_id: existing.get().ticket.ticket_id.clone(),
                    });
                }
                debug!(
                    contact = %bare,
                    stale_ticket = %existing.get().ticket.ticket_id,
                    "replacing ticket whose monitor has ended"
                );
                existing.insert(slot);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }

        Ok(MonitorLease {
            contact: bare.clone(),
            ticket_id,
            alive,
        })
    }

    /// Applies `update` to the contact's ticket if it is still `ticket_id`.
    pub fn update_active_ticket(
        &self,
        bare: &ContactId,
        ticket_id: &str,
        update: impl FnOnce(&mut ActiveTicket),
    ) -> bool {
        match self.tickets.get_mut(bare) {
            Some(mut slot) if slot.ticket.ticket_id == ticket_id => {
                update(&mut slot.ticket);
                true
            }
            _ => false,
        }
    }

    /// Removes whatever ticket the contact has.
    pub fn clear_active_ticket(&self, bare: &ContactId) -> Option<ActiveTicket> {
        self.tickets.remove(bare).map(|(_, slot)| slot.ticket)
    }

    /// Removes the contact's ticket only if it is still `ticket_id`.
    pub fn release_active_ticket(&self, bare: &ContactId, ticket_id: &str) -> bool {
        self.tickets
            .remove_if(bare, |_, slot| slot.ticket.ticket_id == ticket_id)
            .is_some()
    }

    /// Whether the contact's ticket has a running monitor.
    pub fn is_monitor_alive(&self, bare: &ContactId) -> bool {
        self.tickets
            .get(bare)
            .is_some_and(|slot| slot.alive.load(Ordering::Acquire))
    }

    pub fn active_ticket_count(&self) -> usize {
        self.tickets.len()
    }
}
