//! Example: Locate the EWS endpoint of a mailbox.
//!
//! Runs POX autodiscovery for an address and prints every protocol block
//! the server returned.
//!
//! # Usage
//!
//! ```bash
//! export EWS_EMAIL="your@company.com"
//! export EWS_PASSWORD="your-password"
//! # Optional: for networks that need a SOCKS5 proxy
//! export PROXY_HOST="proxy.example.com"
//! export PROXY_PORT="1080"
//!
//! cargo run --example autodiscover
//! ```

use ews_sync::autodiscover::Autodiscover;
use ews_sync::transport::{Credentials, ReqwestTransport};
use ews_sync::{Socks5Proxy, TimeoutConfig};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ews_sync::Result<()> {
    let email = env::var("EWS_EMAIL").expect("EWS_EMAIL environment variable required");
    let password = env::var("EWS_PASSWORD").expect("EWS_PASSWORD environment variable required");

    let proxy = match (env::var("PROXY_HOST").ok(), env::var("PROXY_PORT").ok()) {
        (Some(host), Some(port)) => {
            let port: u16 = port.parse().expect("PROXY_PORT must be a valid port number");
            println!("Using SOCKS5 proxy at {}:{}", host, port);
            Some(Socks5Proxy::new(host, port))
        }
        _ => None,
    };

    let transport = ReqwestTransport::new(&TimeoutConfig::default(), proxy.as_ref())?;
    let resolver = Autodiscover::new(
        Arc::new(transport),
        Some(Credentials::new(email.clone(), password)),
    );

    println!("Autodiscovering {}...", email);
    for url in Autodiscover::candidate_urls(&email)? {
        println!("  candidate: {}", url);
    }

    let settings = resolver.resolve(&email).await?;

    println!("\nEWS endpoint: {}", settings.ews_url);
    if let Some(oab) = &settings.oab_url {
        println!("Offline address book: {}", oab);
    }
    for protocol in &settings.protocols {
        println!(
            "  {:<5} {}",
            protocol.kind,
            protocol
                .ews_url
                .as_ref()
                .map_or("(no EWS URL)", |url| url.as_str())
        );
    }

    Ok(())
}
