//! Inventory reconciliation.
//!
//! Tickets held in the cart count as **reserved**: they are subtracted from
//! availability as soon as they are added, and only move into the
//! [`TicketsSoldLedger`] at checkout. Removing a line releases its
//! reservation.
//!
//! ```text
//! available = capacity - sold - reserved      (saturating at 0)
//! can add   = sold + reserved < capacity
//! commit ok = sold + quantity <= capacity     (per event, lines summed)
//! ```
//!
//! Everything here is a pure function over borrowed state.

use crate::cart::Cart;
use crate::error::CapacityExceeded;
use crate::types::{CartLine, Event, EventId, TicketsSoldLedger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Committed tickets for `event_id`.
#[must_use]
pub fn sold_count(ledger: &TicketsSoldLedger, event_id: &EventId) -> u32 {
    ledger.sold(event_id)
}

/// Tickets for `event_id` currently held in the cart.
#[must_use]
pub fn reserved_count(cart: &Cart, event_id: &EventId) -> u32 {
    cart.quantity_of(event_id)
}

/// Tickets still open for purchase.
#[must_use]
pub fn available(event: &Event, ledger: &TicketsSoldLedger, cart: &Cart) -> u32 {
    event
        .tickets_available
        .saturating_sub(sold_count(ledger, &event.id))
        .saturating_sub(reserved_count(cart, &event.id))
}

/// Share of capacity sold, rounded to the nearest percent and capped at 100.
#[must_use]
pub fn percent_sold(event: &Event, ledger: &TicketsSoldLedger) -> u8 {
    let capacity = u64::from(event.tickets_available);
    if capacity == 0 {
        return 100;
    }
    let sold = u64::from(sold_count(ledger, &event.id));
    let rounded = (sold * 100 + capacity / 2) / capacity;
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

/// Whether one more ticket for `event` may enter the cart.
#[must_use]
pub fn can_add_ticket(event: &Event, ledger: &TicketsSoldLedger, cart: &Cart) -> bool {
    let held = u64::from(sold_count(ledger, &event.id)) + u64::from(reserved_count(cart, &event.id));
    held < u64::from(event.tickets_available)
}

/// Check that every event's requested tickets fit into what is left of
/// its capacity. Lines for the same event are summed.
///
/// # Errors
///
/// Returns the first event whose total does not fit.
pub fn validate_commit(lines: &[CartLine], ledger: &TicketsSoldLedger) -> Result<(), CapacityExceeded> {
    let mut requested: BTreeMap<&EventId, (u32, &Event)> = BTreeMap::new();
    for line in lines {
        let entry = requested.entry(&line.event.id).or_insert((0, &line.event));
        entry.0 = entry.0.saturating_add(line.quantity);
    }
    for (event_id, (quantity, event)) in requested {
        let remaining = event
            .tickets_available
            .saturating_sub(sold_count(ledger, event_id));
        if quantity > remaining {
            return Err(CapacityExceeded {
                event_id: event_id.clone(),
                requested: quantity,
                remaining,
            });
        }
    }
    Ok(())
}

/// Move every line's quantity into the ledger, or nothing at all.
///
/// # Errors
///
/// Returns [`CapacityExceeded`] without touching the ledger if any line
/// does not fit.
pub fn commit(lines: &[CartLine], ledger: &mut TicketsSoldLedger) -> Result<(), CapacityExceeded> {
    validate_commit(lines, ledger)?;
    for line in lines {
        ledger.record(&line.event.id, line.quantity);
    }
    tracing::debug!(lines = lines.len(), "Committed cart lines to ledger");
    Ok(())
}

/// Availability snapshot for one event, as shown on an event card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Capacity
    pub capacity: u32,
    /// Committed tickets
    pub sold: u32,
    /// Tickets held in the cart
    pub reserved: u32,
    /// Tickets still open
    pub available: u32,
    /// Rounded sold percentage
    pub percent_sold: u8,
}

impl Availability {
    /// Compute the snapshot for `event`.
    #[must_use]
    pub fn of(event: &Event, ledger: &TicketsSoldLedger, cart: &Cart) -> Self {
        Self {
            capacity: event.tickets_available,
            sold: sold_count(ledger, &event.id),
            reserved: reserved_count(cart, &event.id),
            available: available(event, ledger, cart),
            percent_sold: percent_sold(event, ledger),
        }
    }

    /// True when nothing more can be added
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.available == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Money;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn event(id: &str, capacity: u32) -> Event {
        Event {
            id: EventId::from(id),
            title: format!("Event {id}"),
            venue: "Uhuru Gardens".to_string(),
            county: "Nairobi".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 15)
                .and_then(|d| d.and_hms_opt(18, 0, 0))
                .unwrap(),
            audience: crate::types::Audience::All,
            price: Money::from_shillings(1000),
            tickets_available: capacity,
            description: None,
            organizer: None,
            category: None,
        }
    }

    fn line(event: Event, quantity: u32) -> CartLine {
        CartLine { event, quantity }
    }

    #[test]
    fn reserved_tickets_reduce_availability() {
        let e = event("1", 10);
        let ledger: TicketsSoldLedger = [(e.id.clone(), 4)].into_iter().collect();
        let cart = Cart::from_lines(vec![line(e.clone(), 3)]);

        assert_eq!(available(&e, &ledger, &cart), 3);
        assert!(can_add_ticket(&e, &ledger, &cart));
        assert_eq!(percent_sold(&e, &ledger), 40);
    }

    #[test]
    fn gate_closes_at_capacity() {
        let e = event("1", 2);
        let cart = Cart::from_lines(vec![line(e.clone(), 2)]);
        assert!(!can_add_ticket(&e, &TicketsSoldLedger::new(), &cart));
        assert_eq!(available(&e, &TicketsSoldLedger::new(), &cart), 0);
    }

    #[test]
    fn oversold_ledger_saturates() {
        let e = event("1", 5);
        let ledger: TicketsSoldLedger = [(e.id.clone(), 9)].into_iter().collect();
        assert_eq!(available(&e, &ledger, &Cart::default()), 0);
        assert_eq!(percent_sold(&e, &ledger), 100);
    }

    #[test]
    fn percent_sold_rounds_to_nearest() {
        let e = event("1", 3);
        let ledger: TicketsSoldLedger = [(e.id.clone(), 1)].into_iter().collect();
        assert_eq!(percent_sold(&e, &ledger), 33);
        let ledger: TicketsSoldLedger = [(e.id.clone(), 2)].into_iter().collect();
        assert_eq!(percent_sold(&e, &ledger), 67);
    }

    #[test]
    fn commit_is_all_or_nothing() {
        let a = event("a", 10);
        let b = event("b", 2);
        let mut ledger: TicketsSoldLedger = [(b.id.clone(), 1)].into_iter().collect();
        let lines = vec![line(a.clone(), 4), line(b.clone(), 2)];

        let err = commit(&lines, &mut ledger).unwrap_err();
        assert_eq!(err.event_id, b.id);
        assert_eq!(err.remaining, 1);
        assert_eq!(ledger.sold(&a.id), 0);
        assert_eq!(ledger.sold(&b.id), 1);

        commit(&lines[..1], &mut ledger).unwrap();
        assert_eq!(ledger.sold(&a.id), 4);
    }

    #[test]
    fn commit_sums_lines_for_the_same_event() {
        let e = event("1", 3);
        let mut ledger = TicketsSoldLedger::new();
        let lines = vec![line(e.clone(), 2), line(e.clone(), 2)];

        let err = validate_commit(&lines, &ledger).unwrap_err();
        assert_eq!(err.requested, 4);
        assert_eq!(err.remaining, 3);
        assert!(commit(&lines, &mut ledger).is_err());
        assert_eq!(ledger.sold(&e.id), 0);

        commit(&[line(e.clone(), 1), line(e.clone(), 2)], &mut ledger).unwrap();
        assert_eq!(ledger.sold(&e.id), 3);
    }

    proptest! {
        #[test]
        fn availability_never_exceeds_capacity(capacity in 1_u32..500, sold in 0_u32..600, reserved in 0_u32..600) {
            let e = event("p", capacity);
            let ledger: TicketsSoldLedger = [(e.id.clone(), sold)].into_iter().collect();
            let cart = if reserved == 0 {
                Cart::default()
            } else {
                Cart::from_lines(vec![line(e.clone(), reserved)])
            };

            let open = available(&e, &ledger, &cart);
            prop_assert!(open <= capacity);
            prop_assert_eq!(open > 0, can_add_ticket(&e, &ledger, &cart));
            prop_assert!(percent_sold(&e, &ledger) <= 100);
        }

        #[test]
        fn successful_commit_respects_capacity(capacity in 1_u32..100, sold in 0_u32..100, quantity in 1_u32..100) {
            let e = event("p", capacity);
            let mut ledger: TicketsSoldLedger = [(e.id.clone(), sold.min(capacity))].into_iter().collect();
            if commit(&[line(e.clone(), quantity)], &mut ledger).is_ok() {
                prop_assert!(ledger.sold(&e.id) <= capacity);
            }
        }
    }
}
