//! Integration tests for ews-sync.
//!
//! These tests require a real Exchange server and are disabled by default.
//! To run them:
//!
//! ```bash
//! # Set environment variables
//! export EWS_SYNC_TEST_EMAIL="your@company.com"
//! export EWS_SYNC_TEST_PASSWORD="your-password"
//!
//! # Optional: skip autodiscovery, or log in with a different user name
//! export EWS_SYNC_TEST_URL="https://mail.company.com/EWS/Exchange.asmx"
//! export EWS_SYNC_TEST_USERNAME="DOMAIN\\user"
//!
//! # Optional: proxy configuration
//! export EWS_SYNC_TEST_PROXY_HOST="proxy.example.com"
//! export EWS_SYNC_TEST_PROXY_PORT="1080"
//!
//! # Run with the integration-tests feature
//! cargo test --features integration-tests -- --ignored
//! ```

use ews_sync::folder::{FolderField, FolderKind};
use ews_sync::request::{BaseShape, DeleteType, FolderChange, Shape, Traversal};
use ews_sync::sync::{FolderSync, MemoryStore};
use ews_sync::{DistinguishedFolder, EwsClient, EwsConfig, Folder, Socks5Proxy};
use std::env;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Test Configuration Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn get_test_credentials() -> Option<(String, String)> {
    dotenvy::dotenv().ok();
    let email = env::var("EWS_SYNC_TEST_EMAIL").ok()?;
    let password = env::var("EWS_SYNC_TEST_PASSWORD").ok()?;
    Some((email, password))
}

fn get_test_proxy() -> Option<Socks5Proxy> {
    let host = env::var("EWS_SYNC_TEST_PROXY_HOST").ok()?;
    let port: u16 = env::var("EWS_SYNC_TEST_PROXY_PORT").ok()?.parse().ok()?;

    let proxy = match (
        env::var("EWS_SYNC_TEST_PROXY_USER").ok(),
        env::var("EWS_SYNC_TEST_PROXY_PASS").ok(),
    ) {
        (Some(user), Some(pass)) => Socks5Proxy::with_auth(&host, port, user, pass),
        _ => Socks5Proxy::new(host, port),
    };

    Some(proxy)
}

fn get_test_config() -> Option<EwsConfig> {
    let (email, password) = get_test_credentials()?;

    let mut builder = EwsConfig::builder().email(email).password(password);

    if let Ok(url) = env::var("EWS_SYNC_TEST_URL") {
        builder = builder.ews_url(url);
    }
    if let Ok(username) = env::var("EWS_SYNC_TEST_USERNAME") {
        builder = builder.username(username);
    }
    if let Some(proxy) = get_test_proxy() {
        builder = builder.proxy(proxy);
    }

    builder.build().ok()
}

async fn connect() -> EwsClient {
    let config = get_test_config().expect("Test config from environment variables");
    EwsClient::connect(config).await.expect("Failed to connect")
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real Exchange server"]
async fn test_connect_resolves_endpoint() {
    let client = connect().await;

    assert!(!client.email().is_empty());
    assert!(client.endpoint().scheme().starts_with("http"));

    let debug_str = format!("{:?}", client);
    assert!(debug_str.contains("EwsClient"));
    assert!(!debug_str.contains("secret"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Folder Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real Exchange server"]
async fn test_get_distinguished_folders() {
    let client = connect().await;

    let folders = client
        .get_folders(
            Shape::new(BaseShape::Default),
            vec![
                DistinguishedFolder::Inbox.into(),
                DistinguishedFolder::Calendar.into(),
            ],
        )
        .await
        .expect("GetFolder failed");

    assert_eq!(folders.len(), 2);
    assert!(folders.iter().all(|f| f.id().and_then(|id| id.id()).is_some()));
    assert_eq!(folders[1].kind(), FolderKind::Calendar);
}

#[tokio::test]
#[ignore = "requires real Exchange server"]
async fn test_find_folders_deep() {
    let client = connect().await;

    let folders = client
        .find_folders(
            Shape::new(BaseShape::IdOnly).with_all(
                [FolderField::ParentId, FolderField::DisplayName]
                    .into_iter()
                    .filter_map(FolderField::property),
            ),
            DistinguishedFolder::MsgFolderRoot.into(),
            Traversal::Deep,
        )
        .await
        .expect("FindFolder failed");

    assert!(!folders.is_empty());
    assert!(folders.iter().all(|f| f.parent_id().is_some()));
}

#[tokio::test]
#[ignore = "requires real Exchange server"]
async fn test_folder_lifecycle() {
    let client = connect().await;

    let mut folder = Folder::new(FolderKind::Generic);
    folder.set_display_name("ews-sync test folder");
    folder.set_folder_class("IPF.Note");

    let created = client
        .create_folders(DistinguishedFolder::Inbox.into(), vec![folder])
        .await
        .expect("CreateFolder failed");
    let id = created[0].id().cloned().expect("created folder has an id");

    let mut renamed = created[0].clone();
    renamed.set_display_name("ews-sync test folder (renamed)");
    let updated = client
        .update_folders(vec![FolderChange::new(renamed).set(FolderField::DisplayName)])
        .await
        .expect("UpdateFolder failed");
    assert_eq!(updated.len(), 1);

    let moved = client
        .move_folders(DistinguishedFolder::DeletedItems.into(), vec![id.without_change_key()])
        .await
        .expect("MoveFolder failed");
    let moved_id = moved[0].id().cloned().expect("moved folder has an id");

    client
        .delete_folders(vec![moved_id], DeleteType::HardDelete)
        .await
        .expect("DeleteFolder failed");
}

// ─────────────────────────────────────────────────────────────────────────────
// Sync Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real Exchange server"]
async fn test_full_then_incremental_sync() {
    let client = connect().await;
    let store = Arc::new(MemoryStore::new());
    let sync = FolderSync::new(client, store.clone());

    let first = sync.run(None).await.expect("Full sync failed");
    assert!(first.full);
    assert!(first.sync_state.is_some());
    assert!(!store.is_empty().await);

    let second = sync.run(first.sync_state).await.expect("Incremental sync failed");
    assert!(!second.full);
    // Nothing changed in between, so nothing moves
    assert!(second.result.moves.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires intentionally wrong credentials"]
async fn test_invalid_credentials() {
    let config = EwsConfig::builder()
        .email("test@outlook.com")
        .password("wrong-password")
        .build()
        .expect("valid config structure");

    let client = EwsClient::connect(config).await.expect("known server needs no discovery");
    let result = client
        .get_folder(Shape::new(BaseShape::IdOnly), DistinguishedFolder::Inbox.into())
        .await;

    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.is_unauthorized());

    println!("Request error: {}", err);
    println!("Category: {}", err.category());
}

#[tokio::test]
async fn test_invalid_email_format() {
    let result = EwsConfig::builder()
        .email("not-an-email")
        .password("password")
        .build();

    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_required_fields() {
    // Missing email
    let result = EwsConfig::builder().password("password").build();
    assert!(result.is_err());

    // Missing password
    let result = EwsConfig::builder().email("test@example.com").build();
    assert!(result.is_err());
}
