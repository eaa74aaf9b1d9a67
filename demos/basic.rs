//! Basic example showing how to use sea-orm-query-trace.
//!
//! Run with: cargo run --example basic

use sea_orm::{ConnectionTrait, Database};
use sea_orm_query_trace::prelude::*;
use sea_orm_query_trace::ConnectionOptions;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sea_orm_query_trace=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Connect to database
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());

    tracing::info!("Connecting to database...");

    let db = Database::connect(&database_url).await?;

    // Record the server address, user and database on every span
    let traced_db = db.with_tracing_config(
        TracingConfig::default().with_connection(ConnectionOptions::from_url(&database_url)?),
    );

    // Queries are only traced inside a recorded span, such as an HTTP request span
    let request = tracing::info_span!("request", path = "/health");
    traced_db
        .execute_unprepared("SELECT 1")
        .instrument(request)
        .await?;

    tracing::info!("Database connection established with tracing enabled");

    // You can also access the inner connection if needed
    let _inner = traced_db.inner();

    Ok(())
}
