//! Error types for the shop.
//!
//! Each layer has its own enum; [`CircleError`] is the application-level
//! umbrella returned by [`crate::app::CircleApp`] and the demo binary.

use crate::types::EventId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use vybz_core::store::StoreError;
use vybz_runtime::SessionError;

/// Why a cart mutation was refused. The cart is unchanged in every case.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartRejection {
    /// Sold plus reserved tickets already reach capacity
    #[error("Event {event_id} is sold out (capacity {capacity})")]
    SoldOut {
        /// Event that is full
        event_id: EventId,
        /// Its capacity
        capacity: u32,
    },

    /// No cart line for the event
    #[error("Event {0} is not in the cart")]
    NotInCart(EventId),

    /// A payment is being processed
    #[error("Checkout in progress, the cart is locked")]
    CheckoutInProgress,
}

impl CartRejection {
    /// Short label for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SoldOut { .. } => "sold_out",
            Self::NotInCart(_) => "not_in_cart",
            Self::CheckoutInProgress => "checkout_in_progress",
        }
    }
}

/// A cart line that would push an event past its capacity.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[error("Only {remaining} tickets left for event {event_id}, {requested} requested")]
pub struct CapacityExceeded {
    /// Event that is over capacity
    pub event_id: EventId,
    /// Quantity in the cart line
    pub requested: u32,
    /// Tickets still unsold
    pub remaining: u32,
}

/// Why a checkout did not complete. Cart and ledger are unchanged.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutError {
    /// Nothing to pay for
    #[error("No event selected for payment.")]
    MissingContext,

    /// Another payment is still processing
    #[error("A payment is already being processed")]
    AlreadyInProgress,

    /// The ledger cannot absorb a cart line
    #[error("Only {remaining} tickets left for event {event_id}, {requested} requested")]
    CapacityExceeded {
        /// Event that is over capacity
        event_id: EventId,
        /// Quantity in the cart line
        requested: u32,
        /// Tickets still unsold
        remaining: u32,
    },

    /// The provider refused the payment
    #[error("Payment declined: {reason}")]
    Declined {
        /// Provider's reason
        reason: String,
    },

    /// The provider failed to answer properly
    #[error("Payment provider error: {message}")]
    Gateway {
        /// Provider's message
        message: String,
    },

    /// Subtotal does not fit in the money type
    #[error("Cart total overflows")]
    AmountOverflow,

    /// The buyer cancelled while the payment was processing
    #[error("Payment cancelled")]
    Cancelled,

    /// No payment outcome within the configured timeout
    #[error("Payment timed out")]
    Timeout,

    /// The session stopped before the payment finished
    #[error("Checkout unavailable: {0}")]
    Unavailable(String),
}

impl CheckoutError {
    /// Short label for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingContext => "missing_context",
            Self::AlreadyInProgress => "already_in_progress",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Declined { .. } => "declined",
            Self::Gateway { .. } => "gateway",
            Self::AmountOverflow => "amount_overflow",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl From<CapacityExceeded> for CheckoutError {
    fn from(e: CapacityExceeded) -> Self {
        Self::CapacityExceeded {
            event_id: e.event_id,
            requested: e.requested,
            remaining: e.remaining,
        }
    }
}

/// Event authoring validation failures.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum DraftError {
    /// A required field is empty
    #[error("Please fill in all required fields ({0} is missing).")]
    MissingField(&'static str),

    /// Price is zero
    #[error("Price must be greater than zero.")]
    NonPositivePrice,

    /// Capacity is zero
    #[error("Number of tickets available must be greater than zero.")]
    NonPositiveCapacity,

    /// Date or time does not parse
    #[error("Invalid {field}: {value}")]
    InvalidDateTime {
        /// `date` or `time`
        field: &'static str,
        /// What was entered
        value: String,
    },

    /// The event would start before now
    #[error("Event date and time must be in the future.")]
    InPast,

    /// Not one of Kenya's 47 counties
    #[error("Unknown county: {0}")]
    UnknownCounty(String),

    /// Audience tag not recognised
    #[error("Unknown audience: {0}")]
    UnknownAudience(String),
}

/// Application-level errors.
#[derive(Error, Debug)]
pub enum CircleError {
    /// Cart mutation refused
    #[error(transparent)]
    Cart(#[from] CartRejection),

    /// Checkout failed
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Client store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Session runtime failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Event draft rejected
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// Catalog file could not be read
    #[error("Failed to read catalog {path}: {source}")]
    CatalogIo {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Catalog file is not a JSON array of events
    #[error("Invalid catalog JSON: {0}")]
    CatalogFormat(#[from] serde_json::Error),
}
