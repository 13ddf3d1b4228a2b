use chrono::Utc;
use dotenvy::dotenv;
use emart::{
    config::{database, marketplace, payment::PaymentConfig},
    core::{items, receipts, seed},
    errors::Result,
    payment::StripeProcessor,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Marketplace settings and seed data
    let config = marketplace::load_default_config()
        .inspect_err(|e| error!("Failed to load config.toml: {}", e))?;

    // 4. Database
    let database_url = database::get_database_url();
    if database_url == database::DEFAULT_DATABASE_URL {
        std::fs::create_dir_all("data")?;
    }
    let db = database::connect(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database tables ready"))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed users and listings
    seed::seed_from_config(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed database: {}", e))?;

    let listed = items::list_items(&db, &items::ItemFilter::default()).await?;
    let overdue = receipts::list_overdue_receipts(&db, Utc::now()).await?;
    info!("{} listings, {} overdue rentals", listed.len(), overdue.len());
    for receipt in &overdue {
        warn!(
            "Receipt {} for item {} was due {}",
            receipt.id, receipt.item_id, receipt.end_date
        );
    }

    // 6. Payment processor, only when credentials are present
    match PaymentConfig::from_env() {
        Ok(payment_config) => {
            StripeProcessor::new(&payment_config)
                .inspect_err(|e| error!("Invalid payment settings: {}", e))?;
            info!("Payment processor configured: {:?}", payment_config);
        }
        Err(e) => warn!("Payments disabled: {}", e),
    }

    database::close(db).await
}
