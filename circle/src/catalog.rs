//! Event catalog, calendar filtering and event authoring.
//!
//! Event timestamps are Nairobi local time (EAT, UTC+3); comparisons
//! against the clock convert "now" into that zone first.

use crate::error::{CircleError, DraftError};
use crate::types::{Audience, Event, EventId, Money};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Kenya's 47 counties, in county-code order.
pub const KENYAN_COUNTIES: [&str; 47] = [
    "Mombasa", "Kwale", "Kilifi", "Tana River", "Lamu", "Taita-Taveta",
    "Garissa", "Wajir", "Mandera", "Marsabit", "Isiolo", "Meru",
    "Tharaka-Nithi", "Embu", "Kitui", "Machakos", "Makueni", "Nyandarua",
    "Nyeri", "Kirinyaga", "Murang'a", "Kiambu", "Turkana", "West Pokot",
    "Samburu", "Trans-Nzoia", "Uasin Gishu", "Elgeyo Marakwet", "Nandi",
    "Baringo", "Laikipia", "Nakuru", "Narok", "Kajiado", "Kericho", "Bomet",
    "Kakamega", "Vihiga", "Bungoma", "Busia", "Siaya", "Kisumu", "Homa Bay",
    "Migori", "Kisii", "Nyamira", "Nairobi",
];

const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// Canonical spelling of `county`, matched case-insensitively.
#[must_use]
pub fn canonical_county(county: &str) -> Option<&'static str> {
    let county = county.trim();
    KENYAN_COUNTIES
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(county))
}

/// `now` as Nairobi wall-clock time.
#[must_use]
pub fn local_now(now: DateTime<Utc>) -> NaiveDateTime {
    FixedOffset::east_opt(EAT_OFFSET_SECS)
        .map_or_else(|| now.naive_utc(), |tz| now.with_timezone(&tz).naive_local())
}

/// The month after `(year, month)`.
#[must_use]
pub const fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 { (year + 1, 1) } else { (year, month + 1) }
}

/// The month before `(year, month)`.
#[must_use]
pub const fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 { (year - 1, 12) } else { (year, month - 1) }
}

/// Criteria for the calendar view. Unset criteria match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFilter {
    /// `(year, month)` the event falls in
    pub month: Option<(i32, u32)>,
    /// County, case-insensitive
    pub county: Option<String>,
    /// Audience tag
    pub audience: Option<Audience>,
    /// Substring of title or venue, case-insensitive
    pub text: Option<String>,
}

impl CalendarFilter {
    /// Matches every event
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only events in `(year, month)`
    #[must_use]
    pub const fn in_month(mut self, year: i32, month: u32) -> Self {
        self.month = Some((year, month));
        self
    }

    /// Only events in `county`
    #[must_use]
    pub fn in_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    /// Only events for `audience`
    #[must_use]
    pub const fn for_audience(mut self, audience: Audience) -> Self {
        self.audience = Some(audience);
        self
    }

    /// Only events whose title or venue mention `text`
    #[must_use]
    pub fn matching(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Whether `event` passes every set criterion
    #[must_use]
    pub fn accepts(&self, event: &Event) -> bool {
        let month_ok = self
            .month
            .is_none_or(|(y, m)| event.date.year() == y && event.date.month() == m);
        let county_ok = self
            .county
            .as_deref()
            .is_none_or(|c| event.county.eq_ignore_ascii_case(c.trim()));
        let audience_ok = self.audience.is_none_or(|a| event.audience == a);
        let text_ok = self.text.as_deref().map(str::trim).is_none_or(|t| {
            let needle = t.to_lowercase();
            event.title.to_lowercase().contains(&needle) || event.venue.to_lowercase().contains(&needle)
        });
        month_ok && county_ok && audience_ok && text_ok
    }
}

/// Events available to browse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    events: Vec<Event>,
}

impl Catalog {
    /// Catalog over `events`
    #[must_use]
    pub const fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// The three showcase events on the 15th, 22nd and 28th of March 2025.
    #[must_use]
    pub fn featured() -> Self {
        Self::featured_in(2025, 3).unwrap_or_default()
    }

    /// The showcase events placed in `(year, month)`; `None` for an invalid month.
    #[must_use]
    pub fn featured_in(year: i32, month: u32) -> Option<Self> {
        let at = |day, hour| {
            NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(hour, 0, 0))
        };
        Some(Self::new(vec![
            Event {
                id: EventId::from("1"),
                title: "Summer Music Festival".to_string(),
                venue: "Uhuru Gardens".to_string(),
                county: "Nairobi".to_string(),
                date: at(15, 14)?,
                audience: Audience::All,
                price: Money::from_shillings(1000),
                tickets_available: 500,
                description: Some("A full day of live Kenyan music".to_string()),
                organizer: None,
                category: Some("music".to_string()),
            },
            Event {
                id: EventId::from("2"),
                title: "Comedy Night".to_string(),
                venue: "Carnivore Grounds".to_string(),
                county: "Nairobi".to_string(),
                date: at(22, 19)?,
                audience: Audience::Adults,
                price: Money::from_shillings(1500),
                tickets_available: 200,
                description: None,
                organizer: None,
                category: Some("comedy".to_string()),
            },
            Event {
                id: EventId::from("3"),
                title: "Art Exhibition".to_string(),
                venue: "Kenya National Theatre".to_string(),
                county: "Nairobi".to_string(),
                date: at(28, 10)?,
                audience: Audience::Family,
                price: Money::from_shillings(500),
                tickets_available: 150,
                description: None,
                organizer: None,
                category: Some("art".to_string()),
            },
        ]))
    }

    /// Parse a JSON array of events.
    ///
    /// # Errors
    ///
    /// [`CircleError::CatalogFormat`] if the document is not an event array.
    pub fn from_json(raw: &str) -> Result<Self, CircleError> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    /// Read a JSON array of events from `path`.
    ///
    /// # Errors
    ///
    /// [`CircleError::CatalogIo`] if the file cannot be read,
    /// [`CircleError::CatalogFormat`] if it does not parse.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CircleError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CircleError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), events = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// All events in catalog order
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when there is nothing to browse
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event with `id`
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.events.iter().find(|e| &e.id == id)
    }

    /// Add or replace an event by id.
    pub fn upsert(&mut self, event: Event) {
        match self.events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event,
            None => self.events.push(event),
        }
    }

    /// Events passing `filter`, sorted by date
    #[must_use]
    pub fn filter(&self, filter: &CalendarFilter) -> Vec<&Event> {
        let mut matches: Vec<&Event> = self.events.iter().filter(|e| filter.accepts(e)).collect();
        matches.sort_by_key(|e| e.date);
        matches
    }

    /// Days of `(year, month)` with at least one event
    #[must_use]
    pub fn event_days(&self, year: i32, month: u32) -> BTreeSet<u32> {
        self.events
            .iter()
            .filter(|e| e.date.year() == year && e.date.month() == month)
            .map(|e| e.date.day())
            .collect()
    }

    /// Events starting after `now`, soonest first
    #[must_use]
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<&Event> {
        let now = local_now(now);
        let mut events: Vec<&Event> = self.events.iter().filter(|e| e.date > now).collect();
        events.sort_by_key(|e| e.date);
        events
    }
}

/// The "upload event" form, as entered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    /// Event title
    pub title: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    /// Venue name
    pub venue: String,
    /// County name
    pub county: String,
    /// `all`, `18+` or `family`
    pub audience: String,
    /// Unit price in KES
    pub price: Option<u64>,
    /// Capacity
    pub tickets_available: Option<u32>,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Optional organizer
    #[serde(default)]
    pub organizer: Option<String>,
    /// Optional category
    #[serde(default)]
    pub category: Option<String>,
}

impl EventDraft {
    /// Check the draft and turn it into an [`Event`] with a fresh id.
    ///
    /// # Errors
    ///
    /// The first [`DraftError`] found, checking required fields, then
    /// price, capacity, date/time, county and audience.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<Event, DraftError> {
        let required = [
            ("title", self.title.as_str()),
            ("date", self.date.as_str()),
            ("time", self.time.as_str()),
            ("venue", self.venue.as_str()),
            ("county", self.county.as_str()),
            ("audience", self.audience.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(DraftError::MissingField(*field));
        }
        let price = self.price.ok_or(DraftError::MissingField("price"))?;
        let capacity = self.tickets_available.ok_or(DraftError::MissingField("ticketsAvailable"))?;

        if price == 0 {
            return Err(DraftError::NonPositivePrice);
        }
        if capacity == 0 {
            return Err(DraftError::NonPositiveCapacity);
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
            DraftError::InvalidDateTime { field: "date", value: self.date.clone() }
        })?;
        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M").map_err(|_| {
            DraftError::InvalidDateTime { field: "time", value: self.time.clone() }
        })?;
        let starts = date.and_time(time);
        if starts < local_now(now) {
            return Err(DraftError::InPast);
        }

        let county = canonical_county(&self.county)
            .ok_or_else(|| DraftError::UnknownCounty(self.county.trim().to_string()))?;
        let audience: Audience = self
            .audience
            .parse()
            .map_err(|_| DraftError::UnknownAudience(self.audience.trim().to_string()))?;

        let optional = |value: &Option<String>| {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        };

        Ok(Event {
            id: EventId::generate(),
            title: self.title.trim().to_string(),
            venue: self.venue.trim().to_string(),
            county: county.to_string(),
            date: starts,
            audience,
            price: Money::from_shillings(price),
            tickets_available: capacity,
            description: optional(&self.description),
            organizer: optional(&self.organizer),
            category: optional(&self.category),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap() // 2025-01-01T00:00Z
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Jazz on the Lake".to_string(),
            date: "2025-02-14".to_string(),
            time: "18:30".to_string(),
            venue: "Lake Naivasha Resort".to_string(),
            county: "nakuru".to_string(),
            audience: "18+".to_string(),
            price: Some(2500),
            tickets_available: Some(120),
            description: Some("  ".to_string()),
            organizer: Some("Vybz".to_string()),
            category: None,
        }
    }

    #[test]
    fn there_are_47_distinct_counties() {
        let distinct: BTreeSet<_> = KENYAN_COUNTIES.iter().collect();
        assert_eq!(distinct.len(), 47);
        assert_eq!(canonical_county(" uasin gishu "), Some("Uasin Gishu"));
        assert_eq!(canonical_county("Atlantis"), None);
    }

    #[test]
    fn month_navigation_wraps_years() {
        assert_eq!(next_month(2024, 12), (2025, 1));
        assert_eq!(previous_month(2025, 1), (2024, 12));
        assert_eq!(next_month(2025, 3), (2025, 4));
    }

    #[test]
    fn featured_events_light_up_calendar_days() {
        let catalog = Catalog::featured();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.event_days(2025, 3).into_iter().collect::<Vec<_>>(), vec![15, 22, 28]);
        assert!(catalog.event_days(2025, 4).is_empty());
        assert!(Catalog::featured_in(2025, 2).is_some_and(|c| c.event_days(2025, 2).contains(&28)));
        assert!(Catalog::featured_in(2025, 13).is_none());
    }

    #[test]
    fn filter_combines_criteria() {
        let catalog = Catalog::featured();

        let march = catalog.filter(&CalendarFilter::new().in_month(2025, 3));
        assert_eq!(march.len(), 3);

        let adults = catalog.filter(&CalendarFilter::new().for_audience(Audience::Adults));
        assert_eq!(adults.len(), 1);
        assert_eq!(adults[0].title, "Comedy Night");

        let theatre = catalog.filter(&CalendarFilter::new().matching("THEATRE").in_county("nairobi"));
        assert_eq!(theatre.len(), 1);
        assert_eq!(theatre[0].title, "Art Exhibition");

        assert!(catalog.filter(&CalendarFilter::new().in_county("Mombasa")).is_empty());
    }

    #[test]
    fn upcoming_is_sorted_and_excludes_past() {
        let catalog = Catalog::featured();
        let after_first = NaiveDate::from_ymd_opt(2025, 3, 16)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
            .and_utc();
        let upcoming: Vec<_> = catalog.upcoming(after_first).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(upcoming, vec!["2", "3"]);
    }

    #[test]
    fn catalog_json_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, serde_json::to_string(&Catalog::featured()).unwrap()).unwrap();

        let loaded = Catalog::load_json(&path).unwrap();
        assert_eq!(loaded, Catalog::featured());
        assert!(matches!(Catalog::from_json("{}"), Err(CircleError::CatalogFormat(_))));
        assert!(matches!(
            Catalog::load_json(dir.path().join("missing.json")),
            Err(CircleError::CatalogIo { .. })
        ));
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut catalog = Catalog::featured();
        let mut event = catalog.get(&EventId::from("2")).unwrap().clone();
        event.tickets_available = 10;
        catalog.upsert(event);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(&EventId::from("2")).unwrap().tickets_available, 10);
    }

    #[test]
    fn valid_draft_becomes_event() {
        let event = draft().validate(now()).unwrap();
        assert_eq!(event.county, "Nakuru");
        assert_eq!(event.audience, Audience::Adults);
        assert_eq!(event.price, Money::from_shillings(2500));
        assert_eq!(event.description, None);
        assert_eq!(event.organizer.as_deref(), Some("Vybz"));
        assert_eq!(event.date.to_string(), "2025-02-14 18:30:00");
        assert!(!event.id.as_str().is_empty());
    }

    #[test]
    fn draft_rules_are_checked_in_order() {
        let mut d = draft();
        d.title = " ".to_string();
        d.price = Some(0);
        assert_eq!(d.validate(now()), Err(DraftError::MissingField("title")));

        let mut d = draft();
        d.price = Some(0);
        assert_eq!(d.validate(now()), Err(DraftError::NonPositivePrice));

        let mut d = draft();
        d.tickets_available = Some(0);
        assert_eq!(d.validate(now()), Err(DraftError::NonPositiveCapacity));

        let mut d = draft();
        d.tickets_available = None;
        assert_eq!(d.validate(now()), Err(DraftError::MissingField("ticketsAvailable")));

        let mut d = draft();
        d.date = "2024-12-31".to_string();
        assert_eq!(d.validate(now()), Err(DraftError::InPast));

        let mut d = draft();
        d.time = "7pm".to_string();
        assert!(matches!(d.validate(now()), Err(DraftError::InvalidDateTime { field: "time", .. })));

        let mut d = draft();
        d.county = "Atlantis".to_string();
        assert_eq!(d.validate(now()), Err(DraftError::UnknownCounty("Atlantis".to_string())));

        let mut d = draft();
        d.audience = "kids".to_string();
        assert_eq!(d.validate(now()), Err(DraftError::UnknownAudience("kids".to_string())));
    }

    #[test]
    fn draft_uses_nairobi_time_for_the_past_check() {
        // 2025-01-01 00:00 UTC is 03:00 in Nairobi
        let mut d = draft();
        d.date = "2025-01-01".to_string();
        d.time = "02:00".to_string();
        assert_eq!(d.validate(now()), Err(DraftError::InPast));
        d.time = "04:00".to_string();
        assert!(d.validate(now()).is_ok());
    }
}
