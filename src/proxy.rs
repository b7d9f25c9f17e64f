//! SOCKS5 proxy configuration for EWS and autodiscovery traffic.
//!
//! # Example
//!
//! ```
//! use ews_sync::Socks5Proxy;
//!
//! let proxy = Socks5Proxy::new("proxy.example.com", 1080);
//! assert_eq!(proxy.url(), "socks5h://proxy.example.com:1080");
//!
//! let proxy = Socks5Proxy::with_auth("proxy.example.com", 1080, "username", "password");
//! assert!(proxy.requires_auth());
//! ```

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};

/// SOCKS5 proxy configuration.
///
/// Host names are resolved by the proxy (`socks5h`), so mailbox hosts never
/// leak through local DNS.
#[derive(Debug, Clone)]
pub struct Socks5Proxy {
    /// Proxy server hostname or IP address.
    pub host: String,
    /// Proxy server port.
    pub port: u16,
    /// Optional authentication credentials.
    pub auth: Option<ProxyAuth>,
}

/// Authentication credentials for SOCKS5 proxy.
#[derive(Clone)]
pub struct ProxyAuth {
    /// Proxy user name.
    pub username: String,
    password: SecretString,
}

impl ProxyAuth {
    /// Creates proxy credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Exposes the proxy password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for ProxyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Socks5Proxy {
    /// Creates a proxy without authentication.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            auth: None,
        }
    }

    /// Creates a proxy with username/password authentication.
    #[must_use]
    pub fn with_auth(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            auth: Some(ProxyAuth::new(username, password)),
        }
    }

    /// Returns the proxy address as "host:port".
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `true` when credentials are configured.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.auth.is_some()
    }

    /// Proxy URL without credentials.
    #[must_use]
    pub fn url(&self) -> String {
        format!("socks5h://{}", self.address())
    }

    /// Converts to a `reqwest` proxy applied to every scheme.
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        let url = self.url();
        let proxy = reqwest::Proxy::all(&url).map_err(|source| Error::Request {
            url: url.clone(),
            source,
        })?;
        Ok(match &self.auth {
            Some(auth) => proxy.basic_auth(&auth.username, auth.password()),
            None => proxy,
        })
    }
}

impl std::fmt::Display for Socks5Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.auth {
            Some(auth) => write!(
                f,
                "socks5h://{}:***@{}:{}",
                auth.username, self.host, self.port
            ),
            None => write!(f, "socks5h://{}:{}", self.host, self.port),
        }
    }
}
