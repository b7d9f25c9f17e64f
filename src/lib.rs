//! # ews-sync
//!
//! Async Exchange Web Services client with folder hierarchy synchronization.
//!
//! This crate provides a high-level, async API for:
//! - Locating the EWS endpoint of a mailbox via POX autodiscovery
//! - Reading and managing folders (`GetFolder`, `FindFolder`, `CreateFolder`,
//!   `UpdateFolder`, `MoveFolder`, `DeleteFolder`) and items (`GetItem`)
//! - Mirroring a remote folder tree into a local store, incrementally through
//!   `SyncFolderHierarchy` with a full resync as fallback
//!
//! ## Features
//!
//! - **`observability`**: Enables OpenTelemetry integration for distributed tracing.
//!   Without this feature, tracing spans are still emitted but require no OTEL dependencies.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ews_sync::{EwsClient, EwsConfig, FolderSync};
//! use ews_sync::sync::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> ews_sync::Result<()> {
//! // Configure the client
//! let config = EwsConfig::builder()
//!     .email("user@example.com")
//!     .password("secret")
//!     .build()?;
//!
//! // Known hosts use a registered endpoint, others are autodiscovered
//! let client = EwsClient::connect(config).await?;
//!
//! // Mirror the folder tree
//! let sync = FolderSync::new(client, Arc::new(MemoryStore::new()));
//! let outcome = sync.run(None).await?;
//! println!("{} folders", outcome.result.changed.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Using a SOCKS5 Proxy
//!
//! ```no_run
//! use ews_sync::{EwsClient, EwsConfig, Socks5Proxy};
//!
//! # async fn example() -> ews_sync::Result<()> {
//! let config = EwsConfig::builder()
//!     .email("user@example.com")
//!     .password("secret")
//!     .ews_url("https://mail.example.com/EWS/Exchange.asmx")
//!     .proxy(Socks5Proxy::with_auth("proxy.example.com", 1080, "user", "pass"))
//!     .build()?;
//!
//! let client = EwsClient::connect(config).await?;
//! // ... use client ...
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. Use [`Error::is_retryable`]
//! to determine if an operation can be retried:
//!
//! ```
//! use ews_sync::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient error, can retry: {}", error);
//!     } else if error.requires_full_resync() {
//!         println!("Local mirror must be rebuilt: {}", error);
//!     } else {
//!         println!("Permanent error: {}", error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. All major operations emit spans with
//! structured fields suitable for distributed tracing.
//!
//! ### Span Naming Convention
//!
//! - `EwsClient::connect` - Client setup, including autodiscovery
//! - `EwsClient::get_folders`, `EwsClient::find_folders`, ... - One span per operation
//! - `Request::send` - One SOAP round trip
//! - `Autodiscover::resolve` - Endpoint discovery
//! - `FolderSync::run` - One synchronization
//! - `Reconciler::run` - One reconciliation round
//!
//! ### Standard Fields
//!
//! - `email` - Mailbox address
//! - `ews_url` - EWS endpoint
//! - `proxy_enabled` - Whether proxy is used
//! - `operation` - EWS operation name
//! - `root` - Synchronized root folder
//!
//! Enable the `observability` feature for OpenTelemetry integration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod autodiscover;
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod folder;
pub mod id;
pub mod item;
pub mod known_servers;
pub mod property;
pub mod proxy;
pub mod queue;
pub mod request;
pub mod sync;
pub mod transport;
pub mod xml;

// Internal modules
mod client;

// Re-exports for ergonomic API
pub use client::EwsClient;
pub use config::{
    AutodiscoverConfig, EwsConfig, EwsConfigBuilder, QueueConfig, SyncConfig, TimeoutConfig,
};
pub use email_address::EmailAddress;
pub use entity::Entity;
pub use error::{Error, ErrorCategory, Result};
pub use folder::Folder;
pub use id::{DistinguishedFolder, Identifier};
pub use item::Item;
pub use known_servers::ServerRegistry;
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use queue::JobQueue;
pub use sync::{FolderSync, SyncOutcome};
