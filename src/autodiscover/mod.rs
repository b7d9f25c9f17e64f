//! POX autodiscovery of the EWS endpoint.
//!
//! Given an email address, [`Autodiscover::resolve`] probes a queue of
//! candidate URLs derived from the domain, in priority order:
//!
//! 1. `https://<domain>/autodiscover/autodiscover.xml`
//! 2. `https://autodiscover.<domain>/autodiscover/autodiscover.xml`
//! 3. `http://<domain>/autodiscover/autodiscover.xml`
//! 4. `http://autodiscover.<domain>/autodiscover/autodiscover.xml`
//!
//! Each candidate is first probed without credentials. A 401 answered over a
//! non-`http` URL is retried once, with credentials, at the final URL the
//! transport reports. Failures advance the queue; the first settings response
//! wins.
//!
//! Probes are admitted through a [`JobQueue`]. Clients pass the queue they
//! share with their EWS requests; a resolver built on its own uses a private
//! single-slot queue.
//!
//! # Example
//!
//! ```no_run
//! use ews_sync::autodiscover::Autodiscover;
//! use ews_sync::transport::{Credentials, ReqwestTransport};
//! use ews_sync::TimeoutConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> ews_sync::Result<()> {
//! let transport = Arc::new(ReqwestTransport::new(&TimeoutConfig::default(), None)?);
//! let resolver = Autodiscover::new(transport, Some(Credentials::new("user@example.com", "secret".to_string())));
//! let settings = resolver.resolve("user@example.com").await?;
//! println!("EWS endpoint: {}", settings.ews_url);
//! # Ok(())
//! # }
//! ```

pub mod pox;

use crate::config::parse_url;
use crate::error::{Error, Result};
use crate::queue::JobQueue;
use crate::transport::{Credentials, HttpRequest, Transport};
use pox::PoxResponse;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Default bound on address and URL redirects.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

const AUTODISCOVER_PATH: &str = "autodiscover/autodiscover.xml";

/// One `Protocol` block of a settings response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolSettings {
    /// `EXCH`, `EXPR`, `WEB`, ...
    pub kind: String,
    /// EWS endpoint of this protocol, if advertised.
    pub ews_url: Option<Url>,
    /// Offline address book URL.
    pub oab_url: Option<Url>,
}

/// Result of a successful autodiscovery.
#[derive(Debug, Clone, PartialEq)]
pub struct AutodiscoverSettings {
    /// Preferred EWS endpoint: `EXCH`, then `EXPR`, then any protocol.
    pub ews_url: Url,
    /// Offline address book URL of the chosen protocol.
    pub oab_url: Option<Url>,
    /// Every protocol block, in response order.
    pub protocols: Vec<ProtocolSettings>,
}

#[derive(Debug)]
struct Probe {
    url: Url,
    authenticated: bool,
}

impl Probe {
    fn anonymous(url: Url) -> Self {
        Self {
            url,
            authenticated: false,
        }
    }
}

/// Autodiscovery resolver.
pub struct Autodiscover {
    transport: Arc<dyn Transport>,
    credentials: Option<Credentials>,
    queue: Arc<JobQueue>,
    max_redirects: u32,
}

impl std::fmt::Debug for Autodiscover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autodiscover")
            .field("credentials", &self.credentials)
            .field("queue", &self.queue)
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

impl Autodiscover {
    /// Creates a resolver probing through `transport`. `credentials` are only
    /// sent after a 401.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, credentials: Option<Credentials>) -> Self {
        Self {
            transport,
            credentials,
            queue: Arc::new(JobQueue::default()),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Admits probes through `queue` instead of a private one.
    #[must_use]
    pub fn queue(mut self, queue: Arc<JobQueue>) -> Self {
        self.queue = queue;
        self
    }

    /// Caps the number of `redirectAddr`/`redirectUrl` hops.
    #[must_use]
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    /// The four candidate URLs for `email`, in probing order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEmailFormat`] if the address has no domain.
    pub fn candidate_urls(email: &str) -> Result<Vec<Url>> {
        let domain = email
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim())
            .filter(|domain| !domain.is_empty())
            .ok_or_else(|| Error::InvalidEmailFormat {
                email: email.to_string(),
            })?;

        [
            format!("https://{domain}/{AUTODISCOVER_PATH}"),
            format!("https://autodiscover.{domain}/{AUTODISCOVER_PATH}"),
            format!("http://{domain}/{AUTODISCOVER_PATH}"),
            format!("http://autodiscover.{domain}/{AUTODISCOVER_PATH}"),
        ]
        .iter()
        .map(|url| parse_url(url))
        .collect()
    }

    fn candidates(email: &str) -> Result<VecDeque<Probe>> {
        Ok(Self::candidate_urls(email)?
            .into_iter()
            .map(Probe::anonymous)
            .collect())
    }

    /// Resolves the EWS settings for `email`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEmailFormat`] for an address without a domain
    /// - [`Error::AutodiscoverRedirectLimit`] when redirects exceed the bound
    /// - [`Error::AutodiscoverExhausted`] when no candidate produced settings,
    ///   carrying the last failure observed
    #[instrument(name = "Autodiscover::resolve", skip_all, fields(email = %email))]
    pub async fn resolve(&self, email: &str) -> Result<AutodiscoverSettings> {
        let mut address = email.to_string();
        let mut queue = Self::candidates(&address)?;
        let mut redirects = 0u32;
        let mut last: Option<Error> = None;

        while let Some(probe) = queue.pop_front() {
            debug!(url = %probe.url, authenticated = probe.authenticated, "Probing candidate");

            let credentials = if probe.authenticated {
                self.credentials.clone()
            } else {
                None
            };
            let request = HttpRequest::xml(probe.url.clone(), pox::request_body(&address)?)
                .with_credentials(credentials);

            let transport = Arc::clone(&self.transport);
            let response = match self
                .queue
                .run("Autodiscover", async move { transport.send(request).await })
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    debug!(url = %probe.url, error = %e, "Candidate unreachable");
                    last = Some(e);
                    continue;
                }
            };

            if response.status == 401 {
                if !probe.authenticated
                    && self.credentials.is_some()
                    && response.url.scheme() != "http"
                {
                    debug!(url = %response.url, "Retrying with credentials");
                    queue.push_front(Probe {
                        url: response.url,
                        authenticated: true,
                    });
                    continue;
                }
                last = Some(Error::Http {
                    status: response.status,
                    url: response.url.to_string(),
                });
                continue;
            }

            if !response.is_success() {
                last = Some(Error::Http {
                    status: response.status,
                    url: response.url.to_string(),
                });
                continue;
            }

            match pox::parse_response(&response.body) {
                Ok(PoxResponse::Settings(settings)) => {
                    debug!(ews_url = %settings.ews_url, "Autodiscovery succeeded");
                    return Ok(settings);
                }
                Ok(PoxResponse::RedirectAddr(next)) => {
                    redirects += 1;
                    self.check_redirects(redirects, &address)?;
                    debug!(from = %address, to = %next, "Redirected to another address");
                    queue = Self::candidates(&next)?;
                    address = next;
                }
                Ok(PoxResponse::RedirectUrl(url)) => {
                    redirects += 1;
                    self.check_redirects(redirects, &address)?;
                    debug!(url = %url, "Redirected to another URL");
                    queue.clear();
                    queue.push_back(Probe::anonymous(url));
                }
                Err(e) => {
                    warn!(url = %response.url, error = %e, "Unusable autodiscover response");
                    last = Some(e);
                }
            }
        }

        Err(Error::AutodiscoverExhausted {
            email: address,
            last: last.map(Box::new),
        })
    }

    fn check_redirects(&self, redirects: u32, address: &str) -> Result<()> {
        if redirects > self.max_redirects {
            return Err(Error::AutodiscoverRedirectLimit {
                email: address.to_string(),
                limit: self.max_redirects,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order() {
        let urls: Vec<String> = Autodiscover::candidate_urls("user@example.com")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            urls,
            [
                "https://example.com/autodiscover/autodiscover.xml",
                "https://autodiscover.example.com/autodiscover/autodiscover.xml",
                "http://example.com/autodiscover/autodiscover.xml",
                "http://autodiscover.example.com/autodiscover/autodiscover.xml",
            ]
        );
    }

    #[test]
    fn test_missing_domain() {
        for email in ["user", "user@", "user@  "] {
            assert!(matches!(
                Autodiscover::candidate_urls(email),
                Err(Error::InvalidEmailFormat { .. })
            ));
        }
    }
}
