//! Example: Using tracing for observability.
//!
//! This example demonstrates how to enable structured logging using
//! the `tracing` ecosystem. All major operations in ews-sync emit
//! tracing spans and events.
//!
//! # Usage
//!
//! ```bash
//! export EWS_EMAIL="your@company.com"
//! export EWS_PASSWORD="your-password"
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=ews_sync=debug
//!
//! cargo run --example with_tracing
//! ```

use ews_sync::request::{BaseShape, Shape, Traversal};
use ews_sync::{DistinguishedFolder, EwsClient, EwsConfig};
use std::env;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ews_sync::Result<()> {
    // Initialize tracing subscriber with environment filter
    // Use RUST_LOG environment variable to control log levels
    // Example: RUST_LOG=ews_sync=debug,info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ews_sync=info")),
        )
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let email = env::var("EWS_EMAIL").expect("EWS_EMAIL environment variable required");
    let password = env::var("EWS_PASSWORD").expect("EWS_PASSWORD environment variable required");

    tracing::info!(email = %email, "Starting ews-sync example");

    let config = EwsConfig::builder().email(&email).password(password).build()?;

    tracing::debug!("Configuration built successfully");

    // Connect - emits spans for autodiscovery when no endpoint is known
    let client = EwsClient::connect(config).await?;

    tracing::info!(endpoint = %client.endpoint(), "Client ready, listing folders");

    // Each request emits an operation span and a Request::send span
    match client
        .find_folders(
            Shape::new(BaseShape::Default),
            DistinguishedFolder::MsgFolderRoot.into(),
            Traversal::Shallow,
        )
        .await
    {
        Ok(folders) => {
            tracing::info!(count = folders.len(), "Listed top-level folders");
            for folder in &folders {
                println!("{}", folder.display_name().unwrap_or("(unnamed)"));
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, category = %e.category(), "FindFolder failed");
            println!("\nFindFolder failed: {}", e);
        }
    }

    tracing::info!("Example completed successfully");

    Ok(())
}
