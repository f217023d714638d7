//! Checkout pricing and progress.
//!
//! Pricing is a pure function of the cart lines and the coupon; the
//! asynchronous part (waiting on the payment provider) lives in the shop
//! reducer, which moves a [`CheckoutPhase`] through
//! `Idle → Processing → (Refunding →) Completed | Failed`.

use crate::error::CheckoutError;
use crate::types::{CartLine, Money, PaymentId, PaymentMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// The one coupon the shop honours (matched case-insensitively).
pub const COUPON_CODE: &str = "vybz10";

/// Percentage taken off the subtotal by [`COUPON_CODE`].
pub const COUPON_PERCENT: u64 = 10;

/// Whether `coupon` unlocks the discount. Surrounding whitespace is ignored.
#[must_use]
pub fn coupon_applies(coupon: Option<&str>) -> bool {
    coupon.is_some_and(|c| c.trim().eq_ignore_ascii_case(COUPON_CODE))
}

/// Priced cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutQuote {
    /// `Σ price × quantity`
    pub subtotal: Money,
    /// Coupon discount, rounded down
    pub discount: Money,
    /// Amount charged
    pub total: Money,
    /// Tickets across all lines
    pub tickets: u64,
}

impl CheckoutQuote {
    /// True when a coupon took something off
    #[must_use]
    pub const fn discounted(&self) -> bool {
        !self.discount.is_zero()
    }
}

/// Price `lines` with an optional coupon. No side effects.
///
/// # Errors
///
/// [`CheckoutError::AmountOverflow`] if the subtotal does not fit.
pub fn quote(lines: &[CartLine], coupon: Option<&str>) -> Result<CheckoutQuote, CheckoutError> {
    let subtotal = lines
        .iter()
        .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.line_total()?))
        .ok_or(CheckoutError::AmountOverflow)?;
    let discount = if coupon_applies(coupon) {
        subtotal.percent(COUPON_PERCENT)
    } else {
        Money::ZERO
    };
    let total = subtotal
        .checked_sub(discount)
        .ok_or(CheckoutError::AmountOverflow)?;

    Ok(CheckoutQuote {
        subtotal,
        discount,
        total,
        tickets: lines.iter().map(|l| u64::from(l.quantity)).sum(),
    })
}

/// Proof of a completed checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Payment attempt
    pub payment_id: PaymentId,
    /// Provider's transaction reference
    pub transaction_id: String,
    /// How the buyer paid
    pub method: PaymentMethod,
    /// What was bought
    pub lines: Vec<CartLine>,
    /// Amounts charged
    pub quote: CheckoutQuote,
    /// When the tickets were committed
    pub paid_at: DateTime<Utc>,
}

/// Where the current (or last) checkout stands.
#[derive(Clone, Debug, Default)]
pub enum CheckoutPhase {
    /// Nothing in flight
    #[default]
    Idle,

    /// Waiting on the payment provider; the cart is locked
    Processing {
        /// Payment attempt
        payment_id: PaymentId,
        /// Method chosen by the buyer
        method: PaymentMethod,
        /// Amounts being charged
        quote: CheckoutQuote,
        /// Fired by the buyer or by a caller timeout
        cancel: CancellationToken,
    },

    /// Approved payment is being reversed after a failed commit
    Refunding {
        /// Payment attempt
        payment_id: PaymentId,
        /// Why the checkout failed
        error: CheckoutError,
    },

    /// Tickets committed, cart cleared
    Completed(Box<Receipt>),

    /// Last attempt failed; cart and ledger unchanged
    Failed {
        /// Payment attempt
        payment_id: PaymentId,
        /// Why
        error: CheckoutError,
    },
}

impl CheckoutPhase {
    /// True while the cart must not change
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Processing { .. } | Self::Refunding { .. })
    }

    /// Payment attempt this phase belongs to
    #[must_use]
    pub const fn payment_id(&self) -> Option<PaymentId> {
        match self {
            Self::Idle => None,
            Self::Processing { payment_id, .. }
            | Self::Refunding { payment_id, .. }
            | Self::Failed { payment_id, .. } => Some(*payment_id),
            Self::Completed(receipt) => Some(receipt.payment_id),
        }
    }
}
