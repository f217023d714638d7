//! Shop aggregate: cart, wishlist, ledger and checkout in one reducer.
//!
//! Every user command either mutates state and persists the touched records,
//! or is rejected with an explicit reason and leaves state alone. Each command
//! ends with exactly one outcome action (`CartUpdated`, `CartRejected`,
//! `WishlistUpdated`, `ViewSwitched`, `CheckoutCompleted`, `CheckoutFailed`)
//! that callers wait on through the session.
//!
//! **Checkout saga**:
//! `Checkout` → (gateway future) → `PaymentApproved` → commit → `CheckoutCompleted`,
//! or `PaymentFailed` → `CheckoutFailed`. If the commit fails after approval,
//! the payment is refunded (`PaymentRefunded`) before `CheckoutFailed`.

use crate::cart::{Cart, Wishlist};
use crate::checkout::{self, CheckoutPhase, Receipt};
use crate::error::{CartRejection, CheckoutError};
use crate::inventory::{self, Availability};
use crate::metrics as shop_metrics;
use crate::payment_gateway::{PaymentGateway, PaymentTransaction};
use crate::types::{ActiveView, Event, EventId, PaymentId, PaymentMethod, TicketsSoldLedger};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vybz_core::{
    effect::Effect,
    environment::Clock,
    notify, persist,
    reducer::Reducer,
    smallvec,
    store::{load_or_default, ClientStore, StoreKey},
    SmallVec,
};

type Effects = SmallVec<[Effect<ShopAction>; 4]>;

// ============================================================================
// State
// ============================================================================

/// Everything the shop knows about the current buyer.
#[derive(Clone, Debug, Default)]
pub struct ShopState {
    /// Lines pending checkout (persisted as `cart`)
    pub cart: Cart,
    /// Saved events (persisted as `wishlist`)
    pub wishlist: Wishlist,
    /// Committed ticket counts (persisted as `ticketsSold`)
    pub ledger: TicketsSoldLedger,
    /// Visible tab
    pub view: ActiveView,
    /// Current or last checkout
    pub checkout: CheckoutPhase,
}

impl ShopState {
    /// Restore the persisted records; missing or malformed ones start empty.
    #[must_use]
    pub fn load(store: &dyn ClientStore) -> Self {
        let state = Self {
            cart: load_or_default(store, StoreKey::Cart),
            wishlist: load_or_default(store, StoreKey::Wishlist),
            ledger: load_or_default(store, StoreKey::TicketsSold),
            view: ActiveView::default(),
            checkout: CheckoutPhase::Idle,
        };
        tracing::debug!(
            cart_lines = state.cart.len(),
            wishlist = state.wishlist.len(),
            tickets_sold = state.ledger.total(),
            "Shop state restored"
        );
        state
    }

    /// Availability of `event` given the ledger and the current cart
    #[must_use]
    pub fn availability(&self, event: &Event) -> Availability {
        Availability::of(event, &self.ledger, &self.cart)
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the shop aggregate
#[derive(Clone, Debug)]
pub enum ShopAction {
    // Commands
    /// Add one ticket for an event
    AddToCart {
        /// Event to add
        event: Event,
    },
    /// One more ticket for an existing line
    IncreaseQuantity {
        /// Line to grow
        event_id: EventId,
    },
    /// One fewer ticket, never below 1
    DecreaseQuantity {
        /// Line to shrink
        event_id: EventId,
    },
    /// Drop a whole line
    RemoveFromCart {
        /// Line to drop
        event_id: EventId,
    },
    /// Save or unsave an event
    ToggleWishlist {
        /// Event to toggle
        event: Event,
    },
    /// Unsave an event
    RemoveFromWishlist {
        /// Event to unsave
        event_id: EventId,
    },
    /// Add one ticket and unsave the event
    MoveToCart {
        /// Event to move
        event: Event,
    },
    /// Show the cart or the wishlist tab
    SwitchView {
        /// Tab to show
        view: ActiveView,
    },
    /// Pay for the whole cart
    Checkout {
        /// Caller-chosen id to correlate the outcome
        payment_id: PaymentId,
        /// Coupon code as typed
        coupon: Option<String>,
        /// How to pay
        method: PaymentMethod,
        /// Cancels the payment while it is processing
        cancel: CancellationToken,
    },

    // Events
    /// A cart command succeeded; `quantity` is 0 when the line was removed
    CartUpdated {
        /// Line touched
        event_id: EventId,
        /// Its quantity now
        quantity: u32,
    },
    /// A cart command was refused
    CartRejected {
        /// Line targeted
        event_id: EventId,
        /// Why
        reason: CartRejection,
    },
    /// A wishlist command completed
    WishlistUpdated {
        /// Event touched
        event_id: EventId,
        /// Whether it is saved now
        wishlisted: bool,
    },
    /// The visible tab changed
    ViewSwitched {
        /// Tab now showing
        view: ActiveView,
    },
    /// The provider approved the charge
    PaymentApproved {
        /// Payment attempt
        payment_id: PaymentId,
        /// Provider transaction
        transaction: PaymentTransaction,
    },
    /// The charge did not go through (declined, errored, cancelled)
    PaymentFailed {
        /// Payment attempt
        payment_id: PaymentId,
        /// Why
        error: CheckoutError,
    },
    /// An approved charge was reversed
    PaymentRefunded {
        /// Payment attempt
        payment_id: PaymentId,
        /// Provider refund reference, `None` if the refund itself failed
        refund_id: Option<String>,
    },
    /// Tickets committed and cart cleared
    CheckoutCompleted {
        /// Proof of purchase
        receipt: Box<Receipt>,
    },
    /// Checkout ended without committing anything
    CheckoutFailed {
        /// Payment attempt
        payment_id: PaymentId,
        /// Why
        error: CheckoutError,
    },
}

impl ShopAction {
    /// Whether this is the outcome of a cart command on `event_id`.
    #[must_use]
    pub fn settles_cart(&self, event_id: &EventId) -> bool {
        match self {
            Self::CartUpdated { event_id: id, .. } | Self::CartRejected { event_id: id, .. } => {
                id == event_id
            },
            _ => false,
        }
    }

    /// Whether this is the outcome of a wishlist command on `event_id`.
    #[must_use]
    pub fn settles_wishlist(&self, event_id: &EventId) -> bool {
        matches!(self, Self::WishlistUpdated { event_id: id, .. } if id == event_id)
    }

    /// Whether this ends the checkout started with `payment_id`.
    #[must_use]
    pub fn settles_checkout(&self, payment_id: PaymentId) -> bool {
        match self {
            Self::CheckoutCompleted { receipt } => receipt.payment_id == payment_id,
            Self::CheckoutFailed { payment_id: id, .. } => *id == payment_id,
            _ => false,
        }
    }

    /// New quantity or rejection, if this is a cart outcome.
    #[must_use]
    pub fn into_cart_outcome(self) -> Option<Result<u32, CartRejection>> {
        match self {
            Self::CartUpdated { quantity, .. } => Some(Ok(quantity)),
            Self::CartRejected { reason, .. } => Some(Err(reason)),
            _ => None,
        }
    }

    /// Whether the event is saved, if this is a wishlist outcome.
    #[must_use]
    pub const fn wishlist_outcome(&self) -> Option<bool> {
        match self {
            Self::WishlistUpdated { wishlisted, .. } => Some(*wishlisted),
            _ => None,
        }
    }

    /// Receipt or failure, if this is a checkout outcome.
    #[must_use]
    pub fn into_checkout_outcome(self) -> Option<Result<Receipt, CheckoutError>> {
        match self {
            Self::CheckoutCompleted { receipt } => Some(Ok(*receipt)),
            Self::CheckoutFailed { error, .. } => Some(Err(error)),
            _ => None,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies injected into the shop reducer.
#[derive(Clone)]
pub struct ShopEnvironment {
    /// Durable records
    pub store: Arc<dyn ClientStore>,
    /// Payment provider
    pub gateway: Arc<dyn PaymentGateway>,
    /// Time source for receipts
    pub clock: Arc<dyn Clock>,
}

impl ShopEnvironment {
    /// Bundle the shop's dependencies
    #[must_use]
    pub fn new(
        store: Arc<dyn ClientStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, gateway, clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the shop aggregate
#[derive(Clone, Copy, Debug, Default)]
pub struct ShopReducer;

impl ShopReducer {
    /// Creates a new `ShopReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn cart_updated(state: &ShopState, env: &ShopEnvironment, event_id: EventId, quantity: u32) -> Effects {
        smallvec![
            persist! { store: env.store, key: StoreKey::Cart, value: state.cart.lines() },
            Effect::emit(ShopAction::CartUpdated { event_id, quantity }),
        ]
    }

    fn cart_rejected(event_id: EventId, label: &str, reason: CartRejection) -> Effects {
        metrics::counter!(shop_metrics::CART_REJECTIONS, "reason" => reason.kind()).increment(1);
        tracing::debug!(event_id = %event_id, reason = %reason, "Cart mutation rejected");
        let notice = match &reason {
            CartRejection::SoldOut { .. } => notify!(warning: "{label} is sold out"),
            CartRejection::NotInCart(_) => notify!(warning: "{label} is not in your cart"),
            CartRejection::CheckoutInProgress => {
                notify!(warning: "Please wait for the current payment to finish")
            },
        };
        smallvec![notice, Effect::emit(ShopAction::CartRejected { event_id, reason })]
    }

    /// Title of the cart line for `event_id`, or the id itself.
    fn line_label(cart: &Cart, event_id: &EventId) -> String {
        cart.line(event_id)
            .map_or_else(|| event_id.to_string(), |line| line.event.title.clone())
    }

    /// Shared by `AddToCart` and `MoveToCart`.
    fn add_ticket(state: &mut ShopState, env: &ShopEnvironment, event: &Event, from_wishlist: bool) -> Effects {
        if state.checkout.is_busy() {
            return Self::cart_rejected(event.id.clone(), &event.title, CartRejection::CheckoutInProgress);
        }

        let quantity = match state.cart.add(event, &state.ledger) {
            Ok(quantity) => quantity,
            Err(reason) => return Self::cart_rejected(event.id.clone(), &event.title, reason),
        };
        tracing::debug!(event_id = %event.id, quantity, "Ticket added to cart");

        let mut effects = Self::cart_updated(state, env, event.id.clone(), quantity);
        if from_wishlist {
            if state.wishlist.remove(&event.id) {
                effects.insert(1, persist! { store: env.store, key: StoreKey::Wishlist, value: state.wishlist.entries() });
            }
            state.view = ActiveView::Cart;
            effects.push(notify!(info: "{} moved to cart", event.title));
        } else {
            effects.push(notify!(info: "{} added to cart", event.title));
        }
        effects
    }

    fn start_checkout(
        state: &mut ShopState,
        env: &ShopEnvironment,
        payment_id: PaymentId,
        coupon: Option<&str>,
        method: PaymentMethod,
        cancel: CancellationToken,
    ) -> Effects {
        if state.checkout.is_busy() {
            return Self::checkout_failed(payment_id, CheckoutError::AlreadyInProgress);
        }
        if state.cart.is_empty() {
            return Self::checkout_failed(payment_id, CheckoutError::MissingContext);
        }
        let quote = match checkout::quote(state.cart.lines(), coupon) {
            Ok(quote) => quote,
            Err(error) => return Self::checkout_failed(payment_id, error),
        };
        if let Err(exceeded) = inventory::validate_commit(state.cart.lines(), &state.ledger) {
            return Self::checkout_failed(payment_id, exceeded.into());
        }

        tracing::info!(
            payment_id = %payment_id,
            total = quote.total.shillings(),
            discount = quote.discount.shillings(),
            method = %method,
            "Checkout started"
        );
        state.checkout = CheckoutPhase::Processing {
            payment_id,
            method,
            quote,
            cancel: cancel.clone(),
        };

        let gateway = Arc::clone(&env.gateway);
        smallvec![Effect::Future(Box::pin(async move {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(CheckoutError::Cancelled),
                result = gateway.process_payment(payment_id, quote.total, method) => {
                    result.map_err(CheckoutError::from)
                },
            };
            Some(match outcome {
                Ok(transaction) => ShopAction::PaymentApproved { payment_id, transaction },
                Err(error) => ShopAction::PaymentFailed { payment_id, error },
            })
        }))]
    }

    fn payment_approved(
        state: &mut ShopState,
        env: &ShopEnvironment,
        payment_id: PaymentId,
        transaction: PaymentTransaction,
    ) -> Effects {
        let CheckoutPhase::Processing { payment_id: current, method, quote, cancel } = &state.checkout else {
            tracing::warn!(payment_id = %payment_id, "Approval for a checkout that is not processing, ignoring");
            return smallvec![Effect::None];
        };
        if *current != payment_id {
            tracing::warn!(payment_id = %payment_id, current = %current, "Approval for a stale payment, ignoring");
            return smallvec![Effect::None];
        }
        let (method, quote) = (*method, *quote);

        // A late approval after cancellation must not commit
        if cancel.is_cancelled() {
            return Self::refund(state, env, payment_id, transaction, CheckoutError::Cancelled);
        }
        if let Err(exceeded) = inventory::commit(state.cart.lines(), &mut state.ledger) {
            return Self::refund(state, env, payment_id, transaction, exceeded.into());
        }

        let receipt = Receipt {
            payment_id,
            transaction_id: transaction.transaction_id,
            method,
            lines: state.cart.take(),
            quote,
            paid_at: env.clock.now(),
        };
        state.checkout = CheckoutPhase::Completed(Box::new(receipt.clone()));

        metrics::counter!(shop_metrics::CHECKOUTS, "status" => "completed").increment(1);
        metrics::counter!(shop_metrics::TICKETS_SOLD).increment(quote.tickets);
        metrics::counter!(shop_metrics::REVENUE).increment(quote.total.shillings());
        tracing::info!(
            payment_id = %payment_id,
            tickets = quote.tickets,
            total = quote.total.shillings(),
            "Checkout completed"
        );

        smallvec![
            persist! { store: env.store, key: StoreKey::TicketsSold, value: &state.ledger },
            persist! { store: env.store, key: StoreKey::Cart, value: state.cart.lines() },
            notify!(info: "Payment Successful!"),
            notify!(info: "Ticket successfully sent to your email!"),
            Effect::emit(ShopAction::CheckoutCompleted { receipt: Box::new(receipt) }),
        ]
    }

    fn refund(
        state: &mut ShopState,
        env: &ShopEnvironment,
        payment_id: PaymentId,
        transaction: PaymentTransaction,
        error: CheckoutError,
    ) -> Effects {
        tracing::warn!(
            payment_id = %payment_id,
            transaction_id = %transaction.transaction_id,
            error = %error,
            "Approved payment cannot be committed, refunding"
        );
        metrics::counter!(shop_metrics::REFUNDS).increment(1);
        state.checkout = CheckoutPhase::Refunding { payment_id, error };

        let gateway = Arc::clone(&env.gateway);
        smallvec![Effect::Future(Box::pin(async move {
            let refund_id = match gateway
                .refund_payment(&transaction.transaction_id, transaction.amount)
                .await
            {
                Ok(refund_id) => Some(refund_id),
                Err(error) => {
                    tracing::error!(
                        transaction_id = %transaction.transaction_id,
                        error = %error,
                        "Refund failed"
                    );
                    None
                },
            };
            Some(ShopAction::PaymentRefunded { payment_id, refund_id })
        }))]
    }

    /// Move to `Failed` and report.
    fn payment_failed(state: &mut ShopState, payment_id: PaymentId, error: CheckoutError) -> Effects {
        state.checkout = CheckoutPhase::Failed {
            payment_id,
            error: error.clone(),
        };
        Self::checkout_failed(payment_id, error)
    }

    fn checkout_failed(payment_id: PaymentId, error: CheckoutError) -> Effects {
        metrics::counter!(shop_metrics::CHECKOUTS, "status" => error.kind()).increment(1);
        tracing::warn!(payment_id = %payment_id, error = %error, "Checkout failed");
        smallvec![
            notify!(error: "{error}"),
            Effect::emit(ShopAction::CheckoutFailed { payment_id, error }),
        ]
    }
}

impl Reducer for ShopReducer {
    type State = ShopState;
    type Action = ShopAction;
    type Environment = ShopEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ShopAction::AddToCart { event } => Self::add_ticket(state, env, &event, false),

            ShopAction::MoveToCart { event } => Self::add_ticket(state, env, &event, true),

            ShopAction::IncreaseQuantity { event_id } => {
                let label = Self::line_label(&state.cart, &event_id);
                if state.checkout.is_busy() {
                    return Self::cart_rejected(event_id, &label, CartRejection::CheckoutInProgress);
                }
                match state.cart.increase(&event_id, &state.ledger) {
                    Ok(quantity) => Self::cart_updated(state, env, event_id, quantity),
                    Err(reason) => Self::cart_rejected(event_id, &label, reason),
                }
            },

            ShopAction::DecreaseQuantity { event_id } => {
                let label = Self::line_label(&state.cart, &event_id);
                if state.checkout.is_busy() {
                    return Self::cart_rejected(event_id, &label, CartRejection::CheckoutInProgress);
                }
                let before = state.cart.quantity_of(&event_id);
                match state.cart.decrease(&event_id) {
                    // Already at the floor: nothing changed, nothing to save
                    Ok(quantity) if quantity == before => {
                        smallvec![Effect::emit(ShopAction::CartUpdated { event_id, quantity })]
                    },
                    Ok(quantity) => Self::cart_updated(state, env, event_id, quantity),
                    Err(reason) => Self::cart_rejected(event_id, &label, reason),
                }
            },

            ShopAction::RemoveFromCart { event_id } => {
                let label = Self::line_label(&state.cart, &event_id);
                if state.checkout.is_busy() {
                    return Self::cart_rejected(event_id, &label, CartRejection::CheckoutInProgress);
                }
                match state.cart.remove(&event_id) {
                    Ok(line) => {
                        let mut effects = Self::cart_updated(state, env, event_id, 0);
                        effects.push(notify!(info: "{} removed from cart", line.event.title));
                        effects
                    },
                    Err(reason) => Self::cart_rejected(event_id, &label, reason),
                }
            },

            ShopAction::ToggleWishlist { event } => {
                let wishlisted = state.wishlist.toggle(&event);
                let notice = if wishlisted {
                    notify!(info: "{} saved to your wishlist", event.title)
                } else {
                    notify!(info: "{} removed from your wishlist", event.title)
                };
                smallvec![
                    persist! { store: env.store, key: StoreKey::Wishlist, value: state.wishlist.entries() },
                    notice,
                    Effect::emit(ShopAction::WishlistUpdated { event_id: event.id, wishlisted }),
                ]
            },

            ShopAction::RemoveFromWishlist { event_id } => {
                let mut effects: Effects = SmallVec::new();
                if state.wishlist.remove(&event_id) {
                    effects.push(persist! { store: env.store, key: StoreKey::Wishlist, value: state.wishlist.entries() });
                }
                effects.push(Effect::emit(ShopAction::WishlistUpdated {
                    event_id,
                    wishlisted: false,
                }));
                effects
            },

            ShopAction::SwitchView { view } => {
                state.view = view;
                smallvec![Effect::emit(ShopAction::ViewSwitched { view })]
            },

            ShopAction::Checkout {
                payment_id,
                coupon,
                method,
                cancel,
            } => Self::start_checkout(state, env, payment_id, coupon.as_deref(), method, cancel),

            ShopAction::PaymentApproved {
                payment_id,
                transaction,
            } => Self::payment_approved(state, env, payment_id, transaction),

            ShopAction::PaymentFailed { payment_id, error } => match &state.checkout {
                CheckoutPhase::Processing { payment_id: current, .. } if *current == payment_id => {
                    Self::payment_failed(state, payment_id, error)
                },
                _ => {
                    tracing::warn!(payment_id = %payment_id, "Failure for a checkout that is not processing, ignoring");
                    smallvec![Effect::None]
                },
            },

            ShopAction::PaymentRefunded {
                payment_id,
                refund_id,
            } => match &state.checkout {
                CheckoutPhase::Refunding { payment_id: current, error } if *current == payment_id => {
                    let error = error.clone();
                    tracing::info!(payment_id = %payment_id, refund_id = ?refund_id, "Payment refunded");
                    Self::payment_failed(state, payment_id, error)
                },
                _ => {
                    tracing::warn!(payment_id = %payment_id, "Refund for a checkout that is not refunding, ignoring");
                    smallvec![Effect::None]
                },
            },

            // Outcome events are only observed by callers
            ShopAction::CartUpdated { .. }
            | ShopAction::CartRejected { .. }
            | ShopAction::WishlistUpdated { .. }
            | ShopAction::ViewSwitched { .. }
            | ShopAction::CheckoutCompleted { .. }
            | ShopAction::CheckoutFailed { .. } => smallvec![Effect::None],
        }
    }
}
