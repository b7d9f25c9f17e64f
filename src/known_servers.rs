//! EWS endpoints of hosted Exchange providers.
//!
//! Hosted mailboxes often do not answer autodiscovery on their own domain, so
//! a small registry maps well-known domains straight to an EWS URL. Unknown
//! domains have no entry; the client then falls back to autodiscovery.
//!
//! # Example
//!
//! ```
//! use ews_sync::known_servers::{ServerRegistry, known_ews_url};
//!
//! assert_eq!(
//!     known_ews_url("user@outlook.com"),
//!     Some("https://outlook.office365.com/EWS/Exchange.asmx")
//! );
//! assert_eq!(known_ews_url("user@example.com"), None);
//!
//! let mut registry = ServerRegistry::with_defaults();
//! registry.register("mycompany.com", "https://mail.mycompany.com/EWS/Exchange.asmx");
//! assert!(registry.lookup("user@mycompany.com").is_some());
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

const OFFICE365_EWS: &str = "https://outlook.office365.com/EWS/Exchange.asmx";

/// Map of email domains to their EWS endpoint.
static KNOWN_SERVERS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Microsoft consumer and hosted
    m.insert("outlook.com", OFFICE365_EWS);
    m.insert("hotmail.com", OFFICE365_EWS);
    m.insert("live.com", OFFICE365_EWS);
    m.insert("msn.com", OFFICE365_EWS);
    m.insert("office365.com", OFFICE365_EWS);
    m.insert("onmicrosoft.com", OFFICE365_EWS);

    m
});

fn domain_of(email: &str) -> String {
    email.rsplit_once('@').map_or(email, |(_, d)| d).to_lowercase()
}

/// A customizable registry of domain → EWS URL mappings.
#[derive(Debug, Clone)]
pub struct ServerRegistry {
    custom: HashMap<String, String>,
    use_defaults: bool,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ServerRegistry {
    /// Creates an empty registry without built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            custom: HashMap::new(),
            use_defaults: false,
        }
    }

    /// Creates a registry that includes the built-in hosted providers.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            custom: HashMap::new(),
            use_defaults: true,
        }
    }

    /// Registers a custom mapping, overriding any built-in one.
    pub fn register(&mut self, domain: impl Into<String>, ews_url: impl Into<String>) {
        self.custom
            .insert(domain.into().to_lowercase(), ews_url.into());
    }

    /// Registers multiple mappings at once.
    pub fn register_many<I, D, U>(&mut self, mappings: I)
    where
        I: IntoIterator<Item = (D, U)>,
        D: Into<String>,
        U: Into<String>,
    {
        for (domain, url) in mappings {
            self.register(domain, url);
        }
    }

    /// Removes a custom mapping. Built-in defaults are unaffected.
    pub fn unregister(&mut self, domain: &str) -> Option<String> {
        self.custom.remove(&domain.to_lowercase())
    }

    /// Looks up the EWS URL for an email address.
    ///
    /// Custom mappings win over built-in ones. Subdomains of `onmicrosoft.com`
    /// tenants resolve to the hosted endpoint.
    #[must_use]
    pub fn lookup(&self, email: &str) -> Option<Cow<'_, str>> {
        let domain = domain_of(email);

        if let Some(url) = self.custom.get(&domain) {
            return Some(Cow::Borrowed(url));
        }

        if self.use_defaults {
            if let Some(&url) = KNOWN_SERVERS.get(domain.as_str()) {
                return Some(Cow::Borrowed(url));
            }
            if domain.ends_with(".onmicrosoft.com") {
                return Some(Cow::Borrowed(OFFICE365_EWS));
            }
        }

        None
    }

    /// Returns `true` if the domain has a mapping.
    #[must_use]
    pub fn is_known(&self, domain: &str) -> bool {
        self.lookup(domain).is_some()
    }

    /// Number of mappings (custom plus non-overridden defaults).
    #[must_use]
    pub fn len(&self) -> usize {
        let defaults = if self.use_defaults {
            KNOWN_SERVERS
                .keys()
                .filter(|k| !self.custom.contains_key(**k))
                .count()
        } else {
            0
        };
        self.custom.len() + defaults
    }

    /// `true` when no domains are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Built-in lookup of the EWS URL for an email address.
#[must_use]
pub fn known_ews_url(email: &str) -> Option<&'static str> {
    KNOWN_SERVERS.get(domain_of(email).as_str()).copied()
}
