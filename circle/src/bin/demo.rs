//! Vybz Circle shop demo
//!
//! Walks one buyer through the shop:
//! - Browsing the March calendar
//! - Adding tickets and adjusting quantities
//! - Saving an event and moving it to the cart
//! - Paying for the cart with the `VYBZ10` coupon
//!
//! Press Ctrl-C while the payment is processing to cancel it.
//!
//! # Usage
//!
//! ```bash
//! VYBZ_DATA_DIR=/tmp/vybz VYBZ_PAYMENT_DELAY_MS=500 cargo run --bin demo
//! ```

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vybz_circle::{
    catalog::local_now, CalendarFilter, Catalog, CircleApp, Config, PaymentMethod,
};
use vybz_core::Utc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vybz_circle=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    vybz_runtime::metrics::register_metrics();
    vybz_circle::metrics::register_business_metrics();

    println!("\n============================================");
    println!("   Vybz Circle - Shop Demo");
    println!("============================================\n");

    let config = Config::from_env();
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load_json(path)?,
        None => Catalog::featured(),
    };

    let app = CircleApp::from_config(&config)?;
    let currency = config.checkout.currency.as_str();

    let mut notices = app.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            println!("   [{:?}] {}", notice.level, notice.message);
        }
    });

    // ========== Calendar ==========

    println!("Events in March 2025 (local time {}):", local_now(Utc::now()).format("%Y-%m-%d %H:%M"));
    for event in catalog.filter(&CalendarFilter::new().in_month(2025, 3)) {
        let availability = app.availability(event).await;
        println!(
            "   {} | {} @ {} | {} | {} left ({}% sold)",
            event.date.format("%a %d %b %H:%M"),
            event.title,
            event.venue,
            event.price.labelled(currency),
            availability.available,
            availability.percent_sold
        );
    }
    println!();

    let mut events = catalog.events().iter();
    let (Some(festival), Some(comedy)) = (events.next(), events.next()) else {
        println!("Catalog needs at least two events for the demo");
        return Ok(());
    };

    // ========== Cart ==========

    println!("1. Adding tickets...");
    app.add_to_cart(festival).await?;
    let quantity = app.increase_quantity(&festival.id).await?;
    println!("   {} x {}", quantity, festival.title);

    // ========== Wishlist ==========

    println!("\n2. Saving an event for later...");
    app.toggle_wishlist(comedy).await?;
    println!("   Wishlist holds {} event(s)", app.wishlist().await.len());

    println!("\n3. Moving it to the cart...");
    match app.move_to_cart(comedy).await {
        Ok(quantity) => println!("   {} x {}", quantity, comedy.title),
        Err(error) => println!("   Could not move {}: {error}", comedy.title),
    }

    // ========== Checkout ==========

    let coupon = Some("VYBZ10");
    let quote = app.quote(coupon).await?;
    println!("\n4. Checkout summary");
    println!("   Tickets:  {}", quote.tickets);
    println!("   Subtotal: {}", quote.subtotal.labelled(currency));
    println!("   Discount: {}", quote.discount.labelled(currency));
    println!("   Total:    {}", quote.total.labelled(currency));

    println!("\n5. Paying with {} (Ctrl-C to cancel)...", PaymentMethod::Mpesa);
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match app.pay(coupon, PaymentMethod::Mpesa, cancel).await {
        Ok(receipt) => {
            println!(
                "   Paid {} (transaction {})",
                receipt.quote.total.labelled(currency),
                receipt.transaction_id
            );
            for (event_id, sold) in app.ledger().await.iter() {
                println!("   Event {event_id}: {sold} sold");
            }
        },
        Err(error) => println!("   Checkout failed: {error}"),
    }

    app.shutdown(config.checkout.timeout()).await?;
    println!("\nDone. Records are in {}", config.store.data_dir.display());
    Ok(())
}
