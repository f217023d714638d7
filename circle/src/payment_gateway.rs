//! Payment providers.
//!
//! The shop only needs two calls: charge an amount and, if tickets could not
//! be committed afterwards, refund it. [`SimulatedPaymentGateway`] stands in
//! for M-Pesa / Airtel Money / card processing by waiting a fixed delay and
//! approving. [`ScriptedPaymentGateway`] replays queued outcomes for tests
//! and demos.

use crate::error::CheckoutError;
use crate::types::{Money, PaymentId, PaymentMethod};
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Boxed gateway future
pub type GatewayFuture<T> = BoxFuture<'static, GatewayResult<T>>;

/// Payment gateway error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentGatewayError {
    /// Payment refused by the provider
    #[error("Payment declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
    },
    /// Wallet or card balance too low
    #[error("Insufficient funds")]
    InsufficientFunds,
    /// Provider did not answer
    #[error("Gateway timeout")]
    Timeout,
    /// Other error
    #[error("Payment error: {message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl From<PaymentGatewayError> for CheckoutError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::Declined { reason } => Self::Declined { reason },
            PaymentGatewayError::InsufficientFunds => Self::Declined {
                reason: "insufficient funds".to_string(),
            },
            PaymentGatewayError::Timeout => Self::Timeout,
            PaymentGatewayError::Other { message } => Self::Gateway { message },
        }
    }
}

/// Approved charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    /// Payment ID (internal)
    pub payment_id: PaymentId,
    /// Gateway transaction ID
    pub transaction_id: String,
    /// Amount charged
    pub amount: Money,
    /// Payment method used
    pub method: PaymentMethod,
}

/// Payment gateway trait
///
/// Returns boxed futures so the gateway can live behind `Arc<dyn _>` in the
/// shop environment.
pub trait PaymentGateway: Send + Sync {
    /// Charge `amount`.
    ///
    /// # Errors
    ///
    /// Returns error if payment fails
    fn process_payment(
        &self,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
    ) -> GatewayFuture<PaymentTransaction>;

    /// Reverse an approved charge, returning the refund reference.
    ///
    /// # Errors
    ///
    /// Returns error if refund fails
    fn refund_payment(&self, transaction_id: &str, amount: Money) -> GatewayFuture<String>;
}

/// Always-approving gateway with a fixed processing delay.
#[derive(Clone, Debug)]
pub struct SimulatedPaymentGateway {
    delay: Duration,
}

impl SimulatedPaymentGateway {
    /// Processing delay used when none is configured
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    /// Gateway that takes `delay` to approve each payment
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(delay: Duration) -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new(delay))
    }
}

impl Default for SimulatedPaymentGateway {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

impl PaymentGateway for SimulatedPaymentGateway {
    fn process_payment(
        &self,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
    ) -> GatewayFuture<PaymentTransaction> {
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;

            let transaction_id = format!("sim_txn_{}", uuid::Uuid::new_v4());

            tracing::info!(
                payment_id = %payment_id,
                amount = amount.shillings(),
                method = %method,
                transaction_id = %transaction_id,
                "Simulated payment approved"
            );

            Ok(PaymentTransaction {
                payment_id,
                transaction_id,
                amount,
                method,
            })
        }
        .boxed()
    }

    fn refund_payment(&self, transaction_id: &str, amount: Money) -> GatewayFuture<String> {
        let transaction_id = transaction_id.to_string();
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;

            let refund_id = format!("sim_refund_{}", uuid::Uuid::new_v4());

            tracing::info!(
                transaction_id = %transaction_id,
                amount = amount.shillings(),
                refund_id = %refund_id,
                "Simulated refund processed"
            );

            Ok(refund_id)
        }
        .boxed()
    }
}

/// Gateway that replays queued outcomes, approving once the queue is empty.
///
/// Clones share the queue and the refund log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPaymentGateway {
    delay: Duration,
    outcomes: Arc<Mutex<VecDeque<Result<(), PaymentGatewayError>>>>,
    charges: Arc<Mutex<Vec<PaymentId>>>,
    refunds: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPaymentGateway {
    /// Instant gateway with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a decline for the next charge
    #[must_use]
    pub fn then_decline(self, reason: &str) -> Self {
        self.push(Err(PaymentGatewayError::Declined {
            reason: reason.to_string(),
        }));
        self
    }

    /// Queue an arbitrary failure for the next charge
    #[must_use]
    pub fn then_fail(self, error: PaymentGatewayError) -> Self {
        self.push(Err(error));
        self
    }

    /// Queue an approval for the next charge
    #[must_use]
    pub fn then_approve(self) -> Self {
        self.push(Ok(()));
        self
    }

    fn push(&self, outcome: Result<(), PaymentGatewayError>) {
        if let Ok(mut queue) = self.outcomes.lock() {
            queue.push_back(outcome);
        }
    }

    /// Payment ids charged so far (approved or not)
    #[must_use]
    pub fn charges(&self) -> Vec<PaymentId> {
        self.charges.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Transaction ids refunded so far
    #[must_use]
    pub fn refunds(&self) -> Vec<String> {
        self.refunds.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Arc-wrapped handle sharing this script
    #[must_use]
    pub fn shared(&self) -> Arc<dyn PaymentGateway> {
        Arc::new(self.clone())
    }
}

impl PaymentGateway for ScriptedPaymentGateway {
    fn process_payment(
        &self,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
    ) -> GatewayFuture<PaymentTransaction> {
        let outcome = self
            .outcomes
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(Ok(()));
        if let Ok(mut charges) = self.charges.lock() {
            charges.push(payment_id);
        }
        let delay = self.delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            outcome.map(|()| PaymentTransaction {
                payment_id,
                transaction_id: format!("scripted_txn_{payment_id}"),
                amount,
                method,
            })
        }
        .boxed()
    }

    fn refund_payment(&self, transaction_id: &str, _amount: Money) -> GatewayFuture<String> {
        if let Ok(mut refunds) = self.refunds.lock() {
            refunds.push(transaction_id.to_string());
        }
        let refund_id = format!("scripted_refund_{transaction_id}");
        async move { Ok(refund_id) }.boxed()
    }
}
