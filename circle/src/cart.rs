//! Cart and wishlist collections.
//!
//! Both keep insertion order and hold at most one entry per event id.
//! Mutations that grow the cart consult the inventory gate and leave the
//! cart untouched when they are refused.

use crate::error::CartRejection;
use crate::inventory;
use crate::types::{CartLine, Event, EventId, Money, TicketsSoldLedger};
use serde::{Deserialize, Deserializer, Serialize};

/// Ordered cart lines, persisted as the `cart` record.
///
/// Deserializing goes through [`Cart::from_lines`], so a stored record
/// never yields duplicate or empty lines.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl<'de> Deserialize<'de> for Cart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<CartLine>::deserialize(deserializer).map(Self::from_lines)
    }
}

impl Cart {
    /// Build a cart from `lines`, merging lines for the same event into the
    /// first one and dropping lines with no tickets.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match merged.iter_mut().find(|l| l.event.id == line.event.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                },
                None => merged.push(line),
            }
        }
        Self { lines: merged }
    }

    /// Lines in the order they were first added
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// True when there is nothing to pay for
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct events
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of all line quantities
    #[must_use]
    pub fn ticket_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Line for `event_id`, if any
    #[must_use]
    pub fn line(&self, event_id: &EventId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.event.id == event_id)
    }

    /// Quantity held for `event_id` (0 when absent)
    #[must_use]
    pub fn quantity_of(&self, event_id: &EventId) -> u32 {
        self.line(event_id).map_or(0, |l| l.quantity)
    }

    fn line_mut(&mut self, event_id: &EventId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| &l.event.id == event_id)
    }

    /// Add one ticket for `event`, merging into an existing line.
    ///
    /// Returns the new quantity.
    ///
    /// # Errors
    ///
    /// [`CartRejection::SoldOut`] when the inventory gate is closed.
    pub fn add(&mut self, event: &Event, ledger: &TicketsSoldLedger) -> Result<u32, CartRejection> {
        if !inventory::can_add_ticket(event, ledger, self) {
            return Err(CartRejection::SoldOut {
                event_id: event.id.clone(),
                capacity: event.tickets_available,
            });
        }
        if let Some(line) = self.line_mut(&event.id) {
            line.quantity += 1;
            return Ok(line.quantity);
        }
        self.lines.push(CartLine::single(event.clone()));
        Ok(1)
    }

    /// Add one ticket to an existing line, gated like [`Cart::add`].
    ///
    /// # Errors
    ///
    /// [`CartRejection::NotInCart`] for an unknown id,
    /// [`CartRejection::SoldOut`] when the gate is closed.
    pub fn increase(&mut self, event_id: &EventId, ledger: &TicketsSoldLedger) -> Result<u32, CartRejection> {
        let event = self
            .line(event_id)
            .map(|l| l.event.clone())
            .ok_or_else(|| CartRejection::NotInCart(event_id.clone()))?;
        self.add(&event, ledger)
    }

    /// Remove one ticket, never going below 1.
    ///
    /// # Errors
    ///
    /// [`CartRejection::NotInCart`] for an unknown id.
    pub fn decrease(&mut self, event_id: &EventId) -> Result<u32, CartRejection> {
        let line = self
            .line_mut(event_id)
            .ok_or_else(|| CartRejection::NotInCart(event_id.clone()))?;
        line.quantity = line.quantity.saturating_sub(1).max(1);
        Ok(line.quantity)
    }

    /// Drop the whole line for `event_id`.
    ///
    /// # Errors
    ///
    /// [`CartRejection::NotInCart`] for an unknown id.
    pub fn remove(&mut self, event_id: &EventId) -> Result<CartLine, CartRejection> {
        let index = self
            .lines
            .iter()
            .position(|l| &l.event.id == event_id)
            .ok_or_else(|| CartRejection::NotInCart(event_id.clone()))?;
        Ok(self.lines.remove(index))
    }

    /// Empty the cart, returning what was in it.
    pub fn take(&mut self) -> Vec<CartLine> {
        std::mem::take(&mut self.lines)
    }

    /// `Σ price × quantity`, `None` on overflow
    #[must_use]
    pub fn subtotal(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    }
}

/// Saved events, persisted as the `wishlist` record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Wishlist {
    entries: Vec<Event>,
}

impl<'de> Deserialize<'de> for Wishlist {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Event>::deserialize(deserializer).map(Self::from_entries)
    }
}

impl Wishlist {
    /// Build a wishlist from `entries`, keeping the first entry per event.
    #[must_use]
    pub fn from_entries(entries: Vec<Event>) -> Self {
        let mut unique: Vec<Event> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !unique.iter().any(|e| e.id == entry.id) {
                unique.push(entry);
            }
        }
        Self { entries: unique }
    }

    /// Entries in the order they were saved
    #[must_use]
    pub fn entries(&self) -> &[Event] {
        &self.entries
    }

    /// True when nothing is saved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of saved events
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `event_id` is saved
    #[must_use]
    pub fn contains(&self, event_id: &EventId) -> bool {
        self.entries.iter().any(|e| &e.id == event_id)
    }

    /// Remove `event` if saved, otherwise append it.
    ///
    /// Returns `true` when the event is now on the wishlist.
    pub fn toggle(&mut self, event: &Event) -> bool {
        if self.remove(&event.id) {
            false
        } else {
            self.entries.push(event.clone());
            true
        }
    }

    /// Remove `event_id`; returns whether anything was removed.
    pub fn remove(&mut self, event_id: &EventId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.id != event_id);
        self.entries.len() != before
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Audience;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn event(id: &str, capacity: u32, price: u64) -> Event {
        Event {
            id: EventId::from(id),
            title: format!("Event {id}"),
            venue: "Carnivore Grounds".to_string(),
            county: "Nairobi".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 22)
                .and_then(|d| d.and_hms_opt(19, 0, 0))
                .unwrap(),
            audience: Audience::Adults,
            price: Money::from_shillings(price),
            tickets_available: capacity,
            description: None,
            organizer: None,
            category: None,
        }
    }

    #[test]
    fn repeated_adds_merge_into_one_line() {
        let e = event("1", 10, 1000);
        let ledger = TicketsSoldLedger::new();
        let mut cart = Cart::default();

        for expected in 1..=3 {
            assert_eq!(cart.add(&e, &ledger).unwrap(), expected);
        }
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(&e.id), 3);
        assert_eq!(cart.subtotal(), Some(Money::from_shillings(3000)));
    }

    #[test]
    fn third_add_on_capacity_two_is_sold_out() {
        let e = event("1", 2, 1000);
        let ledger = TicketsSoldLedger::new();
        let mut cart = Cart::default();
        cart.add(&e, &ledger).unwrap();
        cart.add(&e, &ledger).unwrap();

        let before = cart.clone();
        assert_eq!(
            cart.add(&e, &ledger),
            Err(CartRejection::SoldOut { event_id: e.id.clone(), capacity: 2 })
        );
        assert_eq!(cart, before);
    }

    #[test]
    fn increase_is_gated_and_requires_a_line() {
        let e = event("1", 1, 500);
        let ledger = TicketsSoldLedger::new();
        let mut cart = Cart::default();

        assert_eq!(cart.increase(&e.id, &ledger), Err(CartRejection::NotInCart(e.id.clone())));
        cart.add(&e, &ledger).unwrap();
        assert!(matches!(cart.increase(&e.id, &ledger), Err(CartRejection::SoldOut { .. })));
        assert_eq!(cart.quantity_of(&e.id), 1);
    }

    #[test]
    fn decrease_floors_at_one_and_remove_drops_line() {
        let e = event("1", 10, 500);
        let ledger = TicketsSoldLedger::new();
        let mut cart = Cart::default();
        cart.add(&e, &ledger).unwrap();
        cart.add(&e, &ledger).unwrap();

        assert_eq!(cart.decrease(&e.id).unwrap(), 1);
        assert_eq!(cart.decrease(&e.id).unwrap(), 1);
        assert_eq!(cart.remove(&e.id).unwrap().quantity, 1);
        assert!(cart.is_empty());
        assert!(cart.remove(&e.id).is_err());
    }

    #[test]
    fn subtotal_overflow_is_none() {
        let e = event("1", u32::MAX, u64::MAX);
        let cart = Cart::from_lines(vec![CartLine { event: e, quantity: 2 }]);
        assert_eq!(cart.subtotal(), None);
    }

    #[test]
    fn from_lines_merges_duplicates_and_drops_empty_lines() {
        let a = event("1", 3, 1000);
        let b = event("2", 5, 500);
        let cart = Cart::from_lines(vec![
            CartLine { event: a.clone(), quantity: 2 },
            CartLine { event: b.clone(), quantity: 0 },
            CartLine { event: a.clone(), quantity: 2 },
        ]);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(&a.id), 4);
        assert_eq!(cart.quantity_of(&b.id), 0);
        assert!(!inventory::can_add_ticket(&a, &TicketsSoldLedger::new(), &cart));
    }

    #[test]
    fn stored_records_are_normalized_on_read() {
        let line = serde_json::to_value(CartLine { event: event("1", 3, 1000), quantity: 2 }).unwrap();
        let mut empty = line.clone();
        empty["quantity"] = 0.into();
        empty["id"] = "2".into();
        let raw = serde_json::Value::Array(vec![line.clone(), empty, line]);

        let cart: Cart = serde_json::from_value(raw).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(&EventId::from("1")), 4);

        let e = serde_json::to_value(event("9", 3, 1000)).unwrap();
        let wishlist: Wishlist = serde_json::from_value(serde_json::Value::Array(vec![e.clone(), e])).unwrap();
        assert_eq!(wishlist.len(), 1);
    }

    #[test]
    fn wishlist_toggle_flips_membership() {
        let e = event("1", 10, 500);
        let mut wishlist = Wishlist::default();

        assert!(wishlist.toggle(&e));
        assert!(wishlist.contains(&e.id));
        assert!(!wishlist.toggle(&e));
        assert!(wishlist.is_empty());
        assert!(!wishlist.remove(&e.id));
    }

    proptest! {
        #[test]
        fn double_toggle_restores_wishlist(saved in proptest::collection::vec(0_u8..20, 0..10), target in 0_u8..20) {
            let mut wishlist = Wishlist::default();
            for id in saved {
                let e = event(&id.to_string(), 10, 100);
                if !wishlist.contains(&e.id) {
                    wishlist.toggle(&e);
                }
            }
            let original = wishlist.clone();
            let e = event(&target.to_string(), 10, 100);

            wishlist.toggle(&e);
            wishlist.toggle(&e);

            prop_assert_eq!(wishlist.entries().len(), original.entries().len());
            for entry in original.entries() {
                prop_assert!(wishlist.contains(&entry.id));
            }
        }

        #[test]
        fn quantities_stay_positive(steps in proptest::collection::vec(any::<bool>(), 1..40)) {
            let e = event("1", 15, 100);
            let ledger = TicketsSoldLedger::new();
            let mut cart = Cart::default();
            cart.add(&e, &ledger).unwrap();

            for grow in steps {
                if grow {
                    let _ = cart.increase(&e.id, &ledger);
                } else {
                    cart.decrease(&e.id).unwrap();
                }
                let quantity = cart.quantity_of(&e.id);
                prop_assert!((1..=15).contains(&quantity));
            }
        }
    }
}
