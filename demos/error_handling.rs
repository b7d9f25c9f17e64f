//! Example: Proper error handling with retries.
//!
//! This example demonstrates how to handle errors properly, including
//! retry logic based on error retryability and the full-resync signal of
//! folder synchronization.
//!
//! # Usage
//!
//! ```bash
//! export EWS_EMAIL="your@company.com"
//! export EWS_PASSWORD="your-password"
//! cargo run --example error_handling
//! ```

use ews_sync::sync::{FolderSync, MemoryStore};
use ews_sync::{Error, ErrorCategory, EwsClient, EwsConfig, SyncOutcome};
use std::env;
use std::sync::Arc;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Connect with automatic retry for transient failures
async fn connect_with_retry(config: &EwsConfig) -> Result<EwsClient, Error> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        println!("Connection attempt {}/{}...", attempt, MAX_RETRIES);

        match EwsClient::connect(config.clone()).await {
            Ok(client) => {
                println!("Connected to {}", client.endpoint());
                return Ok(client);
            }
            Err(e) => {
                println!("  Error: {}", e);
                println!("  Category: {}", e.category());
                println!("  Retryable: {}", e.is_retryable());

                if e.is_retryable() && attempt < MAX_RETRIES {
                    println!("  Retrying in {:?}...", backoff);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                    attempt += 1;
                } else {
                    return Err(e);
                }
            }
        }
    }
}

/// Sync with error classification
async fn sync_with_error_handling(
    sync: &FolderSync,
    state: Option<String>,
) -> Result<Option<SyncOutcome>, Error> {
    match sync.run(state).await {
        Ok(outcome) => Ok(Some(outcome)),
        Err(e) => match e.category() {
            ErrorCategory::Transport => {
                // Connection problems might be transient
                println!("Transport error (retryable: {}): {}", e.is_retryable(), e);
                Err(e)
            }
            ErrorCategory::Application => {
                // A well-formed error response, e.g. throttling
                println!("Server rejected the request: {}", e);
                Ok(None)
            }
            ErrorCategory::Protocol => {
                // Faults and malformed responses
                println!("Protocol error: {}", e);
                Err(e)
            }
            ErrorCategory::Reconciliation => {
                // Even a full resync could not place every folder
                println!("Remote tree is inconsistent: {}", e);
                Ok(None)
            }
            ErrorCategory::Configuration | ErrorCategory::Discovery => {
                println!("Setup error: {}", e);
                Err(e)
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let email = env::var("EWS_EMAIL").expect("EWS_EMAIL environment variable required");
    let password = env::var("EWS_PASSWORD").expect("EWS_PASSWORD environment variable required");

    println!("EWS Sync - Error Handling Example\n");
    println!("=================================\n");

    // Build configuration
    let config = match EwsConfig::builder()
        .email(&email)
        .password(password)
        .connect_timeout(Duration::from_secs(10))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("This error is NOT retryable - fix your configuration");
            std::process::exit(1);
        }
    };

    // Connect with retry logic
    let client = match connect_with_retry(&config).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("\nFailed to connect after {} attempts", MAX_RETRIES);
            eprintln!("Final error: {}", e);
            std::process::exit(1);
        }
    };

    let sync = FolderSync::new(client, Arc::new(MemoryStore::new()));

    // A stale state makes the server reject the incremental round; the sync
    // recovers with a full resync on its own
    println!("\nSynchronizing with an outdated state...");
    match sync_with_error_handling(&sync, Some("outdated".into())).await {
        Ok(Some(outcome)) => println!(
            "Synchronized {} folders (full resync: {})",
            outcome.result.changed.len(),
            outcome.full
        ),
        Ok(None) => println!("Nothing synchronized"),
        Err(e) => eprintln!("Sync failed: {}", e),
    }

    println!("Done!");
}
