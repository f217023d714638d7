//! Domain types for the Vybz Circle shop.
//!
//! Value objects (ids, money, audience, payment method), the read-only
//! [`Event`] and the persisted records built from it: cart lines and the
//! tickets-sold ledger.

use chrono::NaiveDateTime;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier of an event.
///
/// Stored as a string; numeric ids coming from the hosted backend are
/// stringified on the way in so `"42"` and `42` name the same event.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EventId(String);

struct EventIdVisitor;

impl Visitor<'_> for EventIdVisitor {
    type Value = EventId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an event id string or integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<EventId, E> {
        Ok(EventId::new(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<EventId, E> {
        Ok(EventId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<EventId, E> {
        Ok(EventId::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<EventId, E> {
        Ok(EventId(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EventIdVisitor)
    }
}

impl EventId {
    /// Wrap an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for a newly drafted event
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a payment attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random `PaymentId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PaymentId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (whole shillings)
// ============================================================================

/// An amount in whole currency units (KES has no minor unit in ticket prices).
///
/// All arithmetic is checked; prices and totals never wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Display label for the amount in `currency` (e.g. `"USD 900"`).
    #[must_use]
    pub fn labelled(self, currency: &str) -> String {
        format!("{currency} {}", self.0)
    }

    /// Creates a `Money` value from whole shillings
    #[must_use]
    pub const fn from_shillings(amount: u64) -> Self {
        Self(amount)
    }

    /// Returns the amount in whole shillings
    #[must_use]
    pub const fn shillings(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies by a ticket quantity with overflow checking
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// `percent`% of this amount, rounded down
    #[must_use]
    pub const fn percent(self, percent: u64) -> Self {
        // u128 keeps the intermediate product from overflowing
        #[allow(clippy::cast_possible_truncation)] // result <= self.0
        let result = (self.0 as u128 * percent as u128 / 100) as u64;
        Self(result)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KES {}", self.0)
    }
}

// ============================================================================
// Event
// ============================================================================

/// Who an event is intended for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    /// Everyone
    #[default]
    #[serde(rename = "all")]
    All,
    /// Adults only
    #[serde(rename = "18+")]
    Adults,
    /// Family friendly
    #[serde(rename = "family")]
    Family,
}

impl Audience {
    /// Tag as stored and shown in filters
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Adults => "18+",
            Self::Family => "family",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Audience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "18+" | "adults" => Ok(Self::Adults),
            "family" => Ok(Self::Family),
            other => Err(format!("unknown audience '{other}'")),
        }
    }
}

/// A purchasable occasion. Read-only to the shop.
///
/// Cart and wishlist records embed a full copy of the event, so the field
/// names here are the persisted JSON layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Stable identifier
    pub id: EventId,
    /// Display title
    pub title: String,
    /// Venue name
    pub venue: String,
    /// Kenyan county the venue is in
    pub county: String,
    /// Local date and start time
    pub date: NaiveDateTime,
    /// Audience tag
    #[serde(default)]
    pub audience: Audience,
    /// Unit ticket price
    #[serde(alias = "ticketPrice")]
    pub price: Money,
    /// Ticket capacity
    pub tickets_available: u32,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Organizer name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    /// Category (music, comedy, art, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

// ============================================================================
// Persisted records
// ============================================================================

/// An event plus the number of tickets held for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The event, flattened into the line
    #[serde(flatten)]
    pub event: Event,
    /// Ticket quantity, at least 1
    pub quantity: u32,
}

impl CartLine {
    /// A fresh line holding one ticket
    #[must_use]
    pub const fn single(event: Event) -> Self {
        Self { event, quantity: 1 }
    }

    /// `price × quantity`, `None` on overflow
    #[must_use]
    pub const fn line_total(&self) -> Option<Money> {
        self.event.price.checked_mul(self.quantity)
    }
}

/// Committed ticket counts per event.
///
/// Only ever grows: counts are added at checkout and nothing removes them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketsSoldLedger(BTreeMap<EventId, u32>);

impl TicketsSoldLedger {
    /// Empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets sold for `event_id` (0 when never sold)
    #[must_use]
    pub fn sold(&self, event_id: &EventId) -> u32 {
        self.0.get(event_id).copied().unwrap_or(0)
    }

    /// Add `quantity` committed tickets.
    pub(crate) fn record(&mut self, event_id: &EventId, quantity: u32) {
        let entry = self.0.entry(event_id.clone()).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    /// Total tickets sold across all events
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|&n| u64::from(n)).sum()
    }

    /// Iterate `(event id, sold)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (&EventId, u32)> {
        self.0.iter().map(|(id, &n)| (id, n))
    }

    /// True if nothing was ever sold
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(EventId, u32)> for TicketsSoldLedger {
    fn from_iter<T: IntoIterator<Item = (EventId, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Checkout and UI values
// ============================================================================

/// How the buyer pays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Safaricom M-Pesa
    #[default]
    Mpesa,
    /// Airtel Money
    #[serde(rename = "airtelmoney")]
    AirtelMoney,
    /// Debit or credit card
    Card,
}

impl PaymentMethod {
    /// Human readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mpesa => "M-Pesa",
            Self::AirtelMoney => "Airtel Money",
            Self::Card => "Card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "").as_str() {
            "mpesa" => Ok(Self::Mpesa),
            "airtelmoney" | "airtel" => Ok(Self::AirtelMoney),
            "card" => Ok(Self::Card),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

/// Which tab of the cart page is showing. Not persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveView {
    /// Cart lines
    #[default]
    Cart,
    /// Saved events
    Wishlist,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "id": "7",
            "title": "Comedy Night",
            "venue": "Carnivore Grounds",
            "county": "Nairobi",
            "date": "2025-03-22T19:00:00",
            "audience": "18+",
            "ticketPrice": 1500,
            "ticketsAvailable": 200
        }"#
    }

    #[test]
    fn event_accepts_ticket_price_alias() {
        let event: Event = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(event.price, Money::from_shillings(1500));
        assert_eq!(event.audience, Audience::Adults);
        assert_eq!(event.id.as_str(), "7");
        assert!(event.description.is_none());
    }

    #[test]
    fn cart_line_flattens_event() {
        let event: Event = serde_json::from_str(sample_json()).unwrap();
        let line = CartLine { event, quantity: 3 };
        let value = serde_json::to_value(&line).unwrap();

        assert_eq!(value["quantity"], 3);
        assert_eq!(value["price"], 1500);
        assert_eq!(value["ticketsAvailable"], 200);
        assert!(value.get("event").is_none());
        assert!(value.get("organizer").is_none());

        let back: CartLine = serde_json::from_value(value).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn numeric_event_ids_are_stringified() {
        let raw = sample_json().replace(r#""id": "7""#, r#""id": 42"#);
        let event: Event = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.id, EventId::from("42"));
        assert_eq!(serde_json::to_value(&event).unwrap()["id"], "42");

        let line: CartLine = serde_json::from_str(
            &raw.replacen('{', r#"{"quantity": 2,"#, 1),
        )
        .unwrap();
        assert_eq!(line.event.id.as_str(), "42");
        assert_eq!(line.quantity, 2);

        assert!(serde_json::from_str::<EventId>("4.2").is_err());
    }

    #[test]
    fn ledger_keys_parse_as_event_ids() {
        let ledger: TicketsSoldLedger = serde_json::from_str(r#"{"1": 2, "abc": 1}"#).unwrap();
        assert_eq!(ledger.sold(&EventId::from(1_u64)), 2);
        assert_eq!(ledger.sold(&"abc".into()), 1);
    }

    #[test]
    fn money_labels_with_configured_currency() {
        let total = Money::from_shillings(900);
        assert_eq!(total.to_string(), "KES 900");
        assert_eq!(total.labelled("USD"), "USD 900");
    }

    #[test]
    fn ledger_serializes_as_plain_object() {
        let mut ledger = TicketsSoldLedger::new();
        ledger.record(&EventId::from(42_u64), 3);
        ledger.record(&EventId::from(42_u64), 2);

        assert_eq!(serde_json::to_string(&ledger).unwrap(), r#"{"42":5}"#);
        assert_eq!(ledger.sold(&"42".into()), 5);
        assert_eq!(ledger.sold(&"missing".into()), 0);
        assert_eq!(ledger.total(), 5);
    }

    #[test]
    fn money_arithmetic_is_checked() {
        let price = Money::from_shillings(1000);
        assert_eq!(price.checked_mul(3), Some(Money::from_shillings(3000)));
        assert_eq!(Money::from_shillings(u64::MAX).checked_mul(2), None);
        assert_eq!(price.checked_sub(Money::from_shillings(1001)), None);
        assert_eq!(price.percent(10), Money::from_shillings(100));
        assert_eq!(Money::from_shillings(999).percent(10), Money::from_shillings(99));
        assert_eq!(price.to_string(), "KES 1000");
    }

    #[test]
    fn payment_method_parsing() {
        assert_eq!("M-Pesa".parse::<PaymentMethod>(), Ok(PaymentMethod::Mpesa));
        assert_eq!("airtelmoney".parse::<PaymentMethod>(), Ok(PaymentMethod::AirtelMoney));
        assert_eq!(" CARD ".parse::<PaymentMethod>(), Ok(PaymentMethod::Card));
        assert!("cash".parse::<PaymentMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&PaymentMethod::AirtelMoney).unwrap(),
            r#""airtelmoney""#
        );
    }
}
