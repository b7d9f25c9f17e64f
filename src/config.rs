//! Configuration for the EWS client.
//!
//! Use [`EwsConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use ews_sync::EwsConfig;
//!
//! let config = EwsConfig::builder()
//!     .email("user@example.com")
//!     .password("app-password")
//!     .ews_url("https://mail.example.com/EWS/Exchange.asmx")
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{Error, Result};
use crate::id::DistinguishedFolder;
use crate::known_servers::ServerRegistry;
use crate::proxy::Socks5Proxy;
use crate::request::ServerVersion;
use crate::transport::Credentials;
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

/// Configuration for talking to an Exchange server.
///
/// Create using [`EwsConfig::builder()`]. The password is held in a
/// [`SecretString`] and never appears in `Debug` output.
#[derive(Clone)]
pub struct EwsConfig {
    email: EmailAddress,
    username: Option<String>,
    password: SecretString,
    /// Explicit or registry-resolved EWS endpoint. `None` means autodiscovery.
    pub ews_url: Option<Url>,
    /// Schema version sent in `RequestServerVersion`.
    pub server_version: ServerVersion,
    /// Optional SOCKS5 proxy for all HTTP traffic.
    pub proxy: Option<Socks5Proxy>,
    /// Transport timeouts.
    pub timeouts: TimeoutConfig,
    /// Admission queue settings.
    pub queue: QueueConfig,
    /// Folder synchronization settings.
    pub sync: SyncConfig,
    /// Autodiscovery settings.
    pub autodiscover: AutodiscoverConfig,
}

impl std::fmt::Debug for EwsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EwsConfig")
            .field("email", &self.email.as_str())
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("ews_url", &self.ews_url.as_ref().map(Url::as_str))
            .field("server_version", &self.server_version)
            .field("proxy", &self.proxy)
            .field("timeouts", &self.timeouts)
            .field("queue", &self.queue)
            .field("sync", &self.sync)
            .field("autodiscover", &self.autodiscover)
            .finish()
    }
}

impl EwsConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> EwsConfigBuilder {
        EwsConfigBuilder::default()
    }

    /// Mailbox address.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Login name, defaulting to the email address.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_else(|| self.email.as_str())
    }

    /// Returns the password. Kept behind a method so it is not logged by accident.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Basic-auth credentials for EWS and autodiscovery.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username(), self.password.clone())
    }

    /// Returns the configured EWS URL, if any. `None` means the endpoint must
    /// be autodiscovered.
    #[must_use]
    pub fn effective_ews_url(&self) -> Option<&Url> {
        self.ews_url.as_ref()
    }
}

/// Timeouts applied by the HTTP transport.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing the TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for a complete request/response exchange.
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Duration::from_secs(120),
        }
    }
}

/// Admission queue limits.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of EWS requests in flight at once.
    pub max_in_flight: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_in_flight: 1 }
    }
}

/// Folder synchronization settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of the synchronized hierarchy.
    pub root: DistinguishedFolder,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: DistinguishedFolder::MsgFolderRoot,
        }
    }
}

/// Autodiscovery settings.
#[derive(Debug, Clone)]
pub struct AutodiscoverConfig {
    /// Maximum number of address or URL redirects followed.
    pub max_redirects: u32,
}

impl Default for AutodiscoverConfig {
    fn default() -> Self {
        Self { max_redirects: 10 }
    }
}

fn validate_email(email: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(email, email_address::Options::default()).map_err(|_| {
        Error::InvalidEmailFormat {
            email: email.to_string(),
        }
    })
}

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Builder for [`EwsConfig`].
#[derive(Debug, Default)]
pub struct EwsConfigBuilder {
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
    ews_url: Option<String>,
    server_registry: Option<ServerRegistry>,
    server_version: Option<ServerVersion>,
    proxy: Option<Socks5Proxy>,
    timeouts: Option<TimeoutConfig>,
    queue: Option<QueueConfig>,
    sync: Option<SyncConfig>,
    autodiscover: Option<AutodiscoverConfig>,
}

impl EwsConfigBuilder {
    /// Sets the mailbox address (required).
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets a login name different from the email address (e.g. `DOMAIN\user`).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password (required).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the EWS endpoint explicitly, skipping registry lookup and autodiscovery.
    #[must_use]
    pub fn ews_url(mut self, url: impl Into<String>) -> Self {
        self.ews_url = Some(url.into());
        self
    }

    /// Sets the registry consulted when no explicit URL is given.
    ///
    /// ```
    /// use ews_sync::{EwsConfig, ServerRegistry};
    ///
    /// let mut registry = ServerRegistry::new();
    /// registry.register("mycompany.com", "https://mail.mycompany.com/EWS/Exchange.asmx");
    ///
    /// let config = EwsConfig::builder()
    ///     .email("user@mycompany.com")
    ///     .password("secret")
    ///     .server_registry(registry)
    ///     .build()
    ///     .expect("valid config");
    ///
    /// assert_eq!(
    ///     config.effective_ews_url().map(|u| u.as_str()),
    ///     Some("https://mail.mycompany.com/EWS/Exchange.asmx")
    /// );
    /// ```
    #[must_use]
    pub fn server_registry(mut self, registry: ServerRegistry) -> Self {
        self.server_registry = Some(registry);
        self
    }

    /// Sets the schema version sent in every request.
    #[must_use]
    pub fn server_version(mut self, version: ServerVersion) -> Self {
        self.server_version = Some(version);
        self
    }

    /// Routes all traffic through a SOCKS5 proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Replaces all timeouts.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .request = timeout;
        self
    }

    /// Sets how many requests may be in flight at once (default 1).
    #[must_use]
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.queue.get_or_insert_with(QueueConfig::default).max_in_flight = max;
        self
    }

    /// Sets the root folder of the synchronized hierarchy.
    #[must_use]
    pub fn sync_root(mut self, root: DistinguishedFolder) -> Self {
        self.sync.get_or_insert_with(SyncConfig::default).root = root;
        self
    }

    /// Sets the autodiscovery redirect bound.
    #[must_use]
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.autodiscover
            .get_or_insert_with(AutodiscoverConfig::default)
            .max_redirects = max;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing, the email is invalid,
    /// the EWS URL does not parse or the queue limit is zero.
    pub fn build(self) -> Result<EwsConfig> {
        let email_raw = self.email.ok_or_else(|| Error::InvalidConfig {
            message: "email is required".into(),
        })?;
        let email = validate_email(&email_raw)?;

        let password_raw = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;

        // Explicit URL > registry > autodiscovery at connect time
        let ews_url = match self.ews_url {
            Some(url) => Some(parse_url(&url)?),
            None => self
                .server_registry
                .unwrap_or_default()
                .lookup(email.as_str())
                .map(|url| parse_url(&url))
                .transpose()?,
        };

        let queue = self.queue.unwrap_or_default();
        if queue.max_in_flight == 0 {
            return Err(Error::InvalidConfig {
                message: "max_in_flight must be at least 1".into(),
            });
        }

        Ok(EwsConfig {
            email,
            username: self.username,
            password: SecretString::from(password_raw),
            ews_url,
            server_version: self.server_version.unwrap_or_default(),
            proxy: self.proxy,
            timeouts: self.timeouts.unwrap_or_default(),
            queue,
            sync: self.sync.unwrap_or_default(),
            autodiscover: self.autodiscover.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EwsConfigBuilder {
        EwsConfig::builder().email("user@example.com").password("secret")
    }

    #[test]
    fn test_builder_minimal() {
        let config = base().build().unwrap();

        assert_eq!(config.email(), "user@example.com");
        assert_eq!(config.username(), "user@example.com");
        assert_eq!(config.password(), "secret");
        assert!(config.effective_ews_url().is_none());
        assert_eq!(config.queue.max_in_flight, 1);
        assert_eq!(config.sync.root, DistinguishedFolder::MsgFolderRoot);
        assert_eq!(config.autodiscover.max_redirects, 10);
        assert_eq!(config.server_version, ServerVersion::default());
    }

    #[test]
    fn test_builder_full() {
        let config = base()
            .username("EXAMPLE\\user")
            .ews_url("https://mail.example.com/EWS/Exchange.asmx")
            .proxy(Socks5Proxy::new("proxy.local", 1080))
            .connect_timeout(Duration::from_secs(5))
            .request_timeout(Duration::from_secs(60))
            .max_in_flight(4)
            .sync_root(DistinguishedFolder::Inbox)
            .max_redirects(3)
            .server_version(ServerVersion::Exchange2013)
            .build()
            .unwrap();

        assert_eq!(config.username(), "EXAMPLE\\user");
        assert_eq!(
            config.effective_ews_url().unwrap().host_str(),
            Some("mail.example.com")
        );
        assert!(config.proxy.is_some());
        assert_eq!(config.timeouts.connect, Duration::from_secs(5));
        assert_eq!(config.timeouts.request, Duration::from_secs(60));
        assert_eq!(config.queue.max_in_flight, 4);
        assert_eq!(config.sync.root, DistinguishedFolder::Inbox);
        assert_eq!(config.autodiscover.max_redirects, 3);
        assert_eq!(config.credentials().username(), "EXAMPLE\\user");
    }

    #[test]
    fn test_builder_missing_fields() {
        assert!(EwsConfig::builder().password("secret").build().is_err());
        assert!(EwsConfig::builder().email("user@example.com").build().is_err());
    }

    #[test]
    fn test_builder_invalid_email() {
        let err = EwsConfig::builder()
            .email("invalid-email")
            .password("secret")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEmailFormat { .. }));
    }

    #[test]
    fn test_builder_invalid_url() {
        let err = base().ews_url("not a url").build().unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_builder_zero_queue_rejected() {
        assert!(base().max_in_flight(0).build().is_err());
    }

    #[test]
    fn test_password_not_in_debug() {
        let config = base().password("super-secret-password").build().unwrap();
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super-secret-password"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_default_registry_resolves_hosted_domains() {
        let config = EwsConfig::builder()
            .email("user@outlook.com")
            .password("secret")
            .build()
            .unwrap();
        assert_eq!(
            config.effective_ews_url().map(Url::as_str),
            Some("https://outlook.office365.com/EWS/Exchange.asmx")
        );
    }

    #[test]
    fn test_explicit_url_overrides_registry() {
        let mut registry = ServerRegistry::new();
        registry.register("example.com", "https://registry.example.com/EWS/Exchange.asmx");

        let config = base()
            .server_registry(registry)
            .ews_url("https://explicit.example.com/EWS/Exchange.asmx")
            .build()
            .unwrap();
        assert_eq!(
            config.effective_ews_url().and_then(Url::host_str),
            Some("explicit.example.com")
        );
    }
}
