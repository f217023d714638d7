//! Application facade.
//!
//! [`CircleApp`] owns the shop session and turns each user operation into
//! "send a command, wait for its outcome action". Cart and wishlist calls
//! return once the touched records are persisted; [`CircleApp::pay`]
//! returns once the payment has settled or the wait timed out.

use crate::aggregates::{ShopAction, ShopEnvironment, ShopReducer, ShopState};
use crate::cart::{Cart, Wishlist};
use crate::checkout::{self, CheckoutPhase, CheckoutQuote, Receipt};
use crate::config::Config;
use crate::error::{CheckoutError, CircleError};
use crate::inventory::Availability;
use crate::payment_gateway::SimulatedPaymentGateway;
use crate::persistence::JsonFileStore;
use crate::types::{ActiveView, Event, EventId, PaymentId, PaymentMethod, TicketsSoldLedger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use vybz_core::effect::Notice;
use vybz_core::environment::SystemClock;
use vybz_runtime::{Session, SessionError};

/// Session type running the shop aggregate
pub type ShopSession = Session<ShopState, ShopAction, ShopEnvironment, ShopReducer>;

/// The shop as a whole: cart, wishlist, inventory and checkout.
pub struct CircleApp {
    session: ShopSession,
    timeout: Duration,
}

impl CircleApp {
    /// Restore state from `env.store` and start a session.
    ///
    /// `timeout` bounds every wait for an outcome, including payment.
    #[must_use]
    pub fn new(env: ShopEnvironment, timeout: Duration) -> Self {
        let state = ShopState::load(env.store.as_ref());
        Self {
            session: Session::new(state, ShopReducer::new(), env),
            timeout,
        }
    }

    /// File store, simulated gateway and wall clock, as configured.
    ///
    /// # Errors
    ///
    /// [`CircleError::Store`] if the data directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, CircleError> {
        let store = JsonFileStore::open(&config.store.data_dir)?;
        let env = ShopEnvironment::new(
            Arc::new(store),
            SimulatedPaymentGateway::shared(config.checkout.payment_delay()),
            Arc::new(SystemClock),
        );
        tracing::info!(
            data_dir = %config.store.data_dir.display(),
            payment_delay_ms = config.checkout.payment_delay_ms,
            "Shop initialized"
        );
        Ok(Self::new(env, config.checkout.timeout()))
    }

    /// The underlying session
    #[must_use]
    pub const fn session(&self) -> &ShopSession {
        &self.session
    }

    /// User-facing notices (added to cart, sold out, payment successful, ...)
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.session.subscribe_notices()
    }

    async fn dispatch<T, P, O>(&self, action: ShopAction, settles: P, outcome: O) -> Result<T, SessionError>
    where
        P: Fn(&ShopAction) -> bool,
        O: FnOnce(ShopAction) -> Option<T>,
    {
        let settled = self
            .session
            .send_and_wait_for(action, settles, self.timeout)
            .await?;
        // `settles` only accepts actions `outcome` understands
        outcome(settled).ok_or(SessionError::ChannelClosed)
    }

    async fn cart_command(&self, event_id: EventId, action: ShopAction) -> Result<u32, CircleError> {
        let outcome = self
            .dispatch(action, |a| a.settles_cart(&event_id), ShopAction::into_cart_outcome)
            .await?;
        Ok(outcome?)
    }

    /// Add one ticket; returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// [`CircleError::Cart`] when sold out or while paying.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn add_to_cart(&self, event: &Event) -> Result<u32, CircleError> {
        self.cart_command(event.id.clone(), ShopAction::AddToCart { event: event.clone() })
            .await
    }

    /// One more ticket for a line already in the cart.
    ///
    /// # Errors
    ///
    /// [`CircleError::Cart`] when sold out, not in the cart, or while paying.
    pub async fn increase_quantity(&self, event_id: &EventId) -> Result<u32, CircleError> {
        self.cart_command(
            event_id.clone(),
            ShopAction::IncreaseQuantity { event_id: event_id.clone() },
        )
        .await
    }

    /// One fewer ticket, stopping at 1.
    ///
    /// # Errors
    ///
    /// [`CircleError::Cart`] when not in the cart or while paying.
    pub async fn decrease_quantity(&self, event_id: &EventId) -> Result<u32, CircleError> {
        self.cart_command(
            event_id.clone(),
            ShopAction::DecreaseQuantity { event_id: event_id.clone() },
        )
        .await
    }

    /// Drop a line whatever its quantity.
    ///
    /// # Errors
    ///
    /// [`CircleError::Cart`] when not in the cart or while paying.
    pub async fn remove_from_cart(&self, event_id: &EventId) -> Result<(), CircleError> {
        self.cart_command(
            event_id.clone(),
            ShopAction::RemoveFromCart { event_id: event_id.clone() },
        )
        .await
        .map(|_| ())
    }

    /// Save or unsave an event; returns whether it is saved now.
    ///
    /// # Errors
    ///
    /// [`CircleError::Session`] if the session is shutting down.
    pub async fn toggle_wishlist(&self, event: &Event) -> Result<bool, CircleError> {
        let id = event.id.clone();
        Ok(self
            .dispatch(
                ShopAction::ToggleWishlist { event: event.clone() },
                |a| a.settles_wishlist(&id),
                |a| a.wishlist_outcome(),
            )
            .await?)
    }

    /// Unsave an event (no-op if it was not saved).
    ///
    /// # Errors
    ///
    /// [`CircleError::Session`] if the session is shutting down.
    pub async fn remove_from_wishlist(&self, event_id: &EventId) -> Result<(), CircleError> {
        self.dispatch(
            ShopAction::RemoveFromWishlist { event_id: event_id.clone() },
            |a| a.settles_wishlist(event_id),
            |a| a.wishlist_outcome(),
        )
        .await?;
        Ok(())
    }

    /// Add one ticket and unsave the event; switches to the cart tab.
    ///
    /// # Errors
    ///
    /// [`CircleError::Cart`] when sold out or while paying; the wishlist is
    /// untouched in that case.
    pub async fn move_to_cart(&self, event: &Event) -> Result<u32, CircleError> {
        self.cart_command(event.id.clone(), ShopAction::MoveToCart { event: event.clone() })
            .await
    }

    /// Show the cart or the wishlist tab.
    ///
    /// # Errors
    ///
    /// [`CircleError::Session`] if the session is shutting down.
    pub async fn switch_view(&self, view: ActiveView) -> Result<(), CircleError> {
        self.dispatch(
            ShopAction::SwitchView { view },
            |a| matches!(a, ShopAction::ViewSwitched { view: v } if *v == view),
            |_| Some(()),
        )
        .await?;
        Ok(())
    }

    /// Price the cart with `coupon` without starting a payment.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::AmountOverflow`] if the subtotal does not fit.
    pub async fn quote(&self, coupon: Option<&str>) -> Result<CheckoutQuote, CheckoutError> {
        self.session
            .state(|s| checkout::quote(s.cart.lines(), coupon))
            .await
    }

    /// Pay for the whole cart.
    ///
    /// Firing `cancel` while the payment is processing aborts it. If no
    /// outcome arrives within the configured timeout, `cancel` is fired and
    /// [`CheckoutError::Timeout`] returned, so a late approval is refunded
    /// instead of committed.
    ///
    /// # Errors
    ///
    /// Any [`CheckoutError`]; cart and ledger are unchanged in every case.
    #[tracing::instrument(skip(self, coupon, method, cancel), fields(method = %method))]
    pub async fn pay(
        &self,
        coupon: Option<&str>,
        method: PaymentMethod,
        cancel: CancellationToken,
    ) -> Result<Receipt, CheckoutError> {
        let payment_id = PaymentId::new();
        let action = ShopAction::Checkout {
            payment_id,
            coupon: coupon.map(str::to_string),
            method,
            cancel: cancel.clone(),
        };

        match self
            .dispatch(action, |a| a.settles_checkout(payment_id), ShopAction::into_checkout_outcome)
            .await
        {
            Ok(outcome) => outcome,
            Err(SessionError::Timeout) => {
                tracing::warn!(payment_id = %payment_id, "No payment outcome in time, cancelling");
                cancel.cancel();
                Err(CheckoutError::Timeout)
            },
            Err(error) => Err(CheckoutError::Unavailable(error.to_string())),
        }
    }

    /// Sold / reserved / available counts for `event`
    pub async fn availability(&self, event: &Event) -> Availability {
        self.session.state(|s| s.availability(event)).await
    }

    /// Snapshot of the cart
    pub async fn cart(&self) -> Cart {
        self.session.state(|s| s.cart.clone()).await
    }

    /// Snapshot of the wishlist
    pub async fn wishlist(&self) -> Wishlist {
        self.session.state(|s| s.wishlist.clone()).await
    }

    /// Snapshot of the tickets-sold ledger
    pub async fn ledger(&self) -> TicketsSoldLedger {
        self.session.state(|s| s.ledger.clone()).await
    }

    /// Visible tab
    pub async fn view(&self) -> ActiveView {
        self.session.state(|s| s.view).await
    }

    /// Current or last checkout
    pub async fn checkout_phase(&self) -> CheckoutPhase {
        self.session.state(|s| s.checkout.clone()).await
    }

    /// Stop accepting commands and let running effects finish.
    ///
    /// # Errors
    ///
    /// [`CircleError::Session`] if effects are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), CircleError> {
        Ok(self.session.shutdown(timeout).await?)
    }
}
