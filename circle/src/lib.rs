//! Vybz Circle shop - cart, wishlist, ticket inventory and checkout
//!
//! The client-side half of the Vybz Circle event platform: a buyer browses
//! the event calendar, saves events to a wishlist, puts tickets in a cart and
//! pays for the whole cart through a (simulated) payment provider.
//!
//! - **Reserve at add, commit at checkout**: tickets in the cart count against
//!   an event's capacity immediately, and move to the sold ledger only once
//!   payment is approved
//! - **All-or-nothing commit**: a checkout either sells every line or none
//! - **Saga with compensation**: an approved payment whose commit fails (or
//!   that arrives after cancellation) is refunded
//! - **Durable client records**: cart, wishlist and the tickets-sold ledger are
//!   JSON documents that survive restarts
//!
//! # Architecture
//!
//! ```text
//!  CircleApp ──send──▶ Session ──reduce──▶ ShopReducer
//!      ▲                  │                    │
//!      │                  │◀───── effects ─────┘
//!      │                  ├── Persist ──▶ ClientStore (cart / wishlist / ticketsSold)
//!      │                  ├── Notify  ──▶ notice broadcast (toasts)
//!      └── outcome ───────┴── Future  ──▶ PaymentGateway ──▶ PaymentApproved / Failed
//! ```
//!
//! # Checkout
//!
//! ```text
//! Checkout ─▶ Processing ─▶ PaymentApproved ─▶ commit ok ─▶ CheckoutCompleted
//!                 │                  └──────── commit fails ─▶ Refunding ─▶ PaymentRefunded ─▶ CheckoutFailed
//!                 └─▶ PaymentFailed (declined / cancelled) ─▶ CheckoutFailed
//! ```
//!
//! # Usage
//!
//! See [`app::CircleApp`] for the user-facing operations and the
//! [`aggregates`] module for the reducer and its tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod app;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod inventory;
pub mod metrics;
pub mod payment_gateway;
pub mod persistence;
pub mod types;

pub use aggregates::{ShopAction, ShopEnvironment, ShopReducer, ShopState};
pub use app::{CircleApp, ShopSession};
pub use cart::{Cart, Wishlist};
pub use catalog::{CalendarFilter, Catalog, EventDraft};
pub use checkout::{CheckoutPhase, CheckoutQuote, Receipt};
pub use config::Config;
pub use error::{CapacityExceeded, CartRejection, CheckoutError, CircleError, DraftError};
pub use inventory::Availability;
pub use payment_gateway::{
    PaymentGateway, PaymentGatewayError, PaymentTransaction, ScriptedPaymentGateway,
    SimulatedPaymentGateway,
};
pub use persistence::JsonFileStore;
pub use types::*;
