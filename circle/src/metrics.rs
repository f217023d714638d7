//! Business metrics for the shop.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `vybz_cart_rejections_total{reason}` - Refused cart mutations
//! - `vybz_checkouts_total{status}` - Checkout outcomes (`completed`, or the failure kind)
//! - `vybz_tickets_sold_total` - Tickets committed to the ledger
//! - `vybz_revenue_kes_total` - Amount charged for completed checkouts
//! - `vybz_refunds_total` - Approved payments refunded after a failed commit

use metrics::describe_counter;

/// Refused cart mutations, by `reason`
pub const CART_REJECTIONS: &str = "vybz_cart_rejections_total";
/// Checkout outcomes, by `status`
pub const CHECKOUTS: &str = "vybz_checkouts_total";
/// Tickets committed
pub const TICKETS_SOLD: &str = "vybz_tickets_sold_total";
/// Revenue in whole shillings
pub const REVENUE: &str = "vybz_revenue_kes_total";
/// Refunds issued
pub const REFUNDS: &str = "vybz_refunds_total";

/// Initialize and register all business metrics descriptions.
///
/// Call once at startup, after installing a recorder.
pub fn register_business_metrics() {
    describe_counter!(CART_REJECTIONS, "Total cart mutations refused, by reason");
    describe_counter!(CHECKOUTS, "Total checkouts by outcome");
    describe_counter!(TICKETS_SOLD, "Total tickets committed to the ledger");
    describe_counter!(REVENUE, "Total amount charged for completed checkouts, in KES");
    describe_counter!(REFUNDS, "Total approved payments refunded after a failed commit");
}
