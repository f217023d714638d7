//! Aggregate reducers for the shop.
//!
//! A single aggregate owns the buyer's cart, wishlist, ledger and checkout,
//! because the inventory gate needs all of them at once.

pub mod shop;

pub use shop::{ShopAction, ShopEnvironment, ShopReducer, ShopState};
