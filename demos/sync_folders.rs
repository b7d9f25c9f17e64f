//! Example: Mirror a mailbox folder tree.
//!
//! Runs a full sync, prints the tree, then polls for changes with the
//! returned sync state.
//!
//! # Usage
//!
//! ```bash
//! export EWS_EMAIL="your@company.com"
//! export EWS_PASSWORD="your-password"
//! # Optional: skip autodiscovery
//! export EWS_URL="https://mail.company.com/EWS/Exchange.asmx"
//!
//! cargo run --example sync_folders
//! ```

use ews_sync::sync::{Collection, MemoryStore};
use ews_sync::{DistinguishedFolder, EwsClient, EwsConfig, FolderSync};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

const POLLS: u32 = 3;
const POLL_INTERVAL: Duration = Duration::from_secs(30);

fn print_tree(children: &HashMap<Option<String>, Vec<Collection>>, parent: Option<String>, depth: usize) {
    let Some(collections) = children.get(&parent) else {
        return;
    };
    for collection in collections {
        println!(
            "{}{} [{}]",
            "  ".repeat(depth),
            collection.name.as_deref().unwrap_or("(unnamed)"),
            collection.folder_class.as_deref().unwrap_or("-")
        );
        print_tree(children, Some(collection.remote_id.clone()), depth + 1);
    }
}

#[tokio::main]
async fn main() -> ews_sync::Result<()> {
    let email = env::var("EWS_EMAIL").expect("EWS_EMAIL environment variable required");
    let password = env::var("EWS_PASSWORD").expect("EWS_PASSWORD environment variable required");

    let mut builder = EwsConfig::builder()
        .email(&email)
        .password(password)
        .sync_root(DistinguishedFolder::MsgFolderRoot);
    if let Ok(url) = env::var("EWS_URL") {
        builder = builder.ews_url(url);
    }

    let client = EwsClient::connect(builder.build()?).await?;
    println!("Connected to {}", client.endpoint());

    let store = Arc::new(MemoryStore::new());
    let sync = FolderSync::new(client, store.clone());

    let outcome = sync.run(None).await?;
    println!("\nInitial sync: {} folders\n", outcome.result.changed.len());

    let mut children: HashMap<Option<String>, Vec<Collection>> = HashMap::new();
    for change in &outcome.result.changed {
        children
            .entry(change.after.parent_remote_id.clone())
            .or_default()
            .push(change.after.clone());
    }
    print_tree(&children, None, 0);

    let mut state = outcome.sync_state;
    for _ in 0..POLLS {
        tokio::time::sleep(POLL_INTERVAL).await;
        let outcome = sync.run(state.take()).await?;
        println!(
            "\n{} changed, {} deleted, {} moved{}",
            outcome.result.changed.iter().filter(|c| !c.is_noop()).count(),
            outcome.result.deleted.len(),
            outcome.result.moves.len(),
            if outcome.full { " (full resync)" } else { "" }
        );
        state = outcome.sync_state;
    }

    println!("\n{} folders mirrored", store.len().await);
    Ok(())
}
