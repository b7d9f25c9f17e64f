//! HTTP transport abstraction.
//!
//! EWS and autodiscovery only ever POST a UTF-8 XML body and read back the
//! status, headers, final URL and body. [`Transport`] captures exactly that so
//! tests can script responses; [`ReqwestTransport`] is the production
//! implementation.

use crate::config::TimeoutConfig;
use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};
use url::Url;

/// Content type of SOAP 1.1 and POX requests.
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Basic-auth credentials.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Creates credentials for Basic authentication.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// User name sent to the server.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Exposes the password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// An outgoing POST.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Target URL.
    pub url: Url,
    /// Request body.
    pub body: String,
    /// `Content-Type` header value.
    pub content_type: &'static str,
    /// Credentials for Basic authentication, if any.
    pub credentials: Option<Credentials>,
}

impl HttpRequest {
    /// An XML POST without credentials.
    #[must_use]
    pub fn xml(url: Url, body: String) -> Self {
        Self {
            url,
            body,
            content_type: XML_CONTENT_TYPE,
            credentials: None,
        }
    }

    /// Attaches (or clears) credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// A received response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// URL after following redirects.
    pub url: Url,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// `true` for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP request and returns the complete response.
///
/// Non-success statuses are returned as responses, not errors; only failures
/// to complete the exchange are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request. HTTP error statuses are responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] over a shared `reqwest` client (rustls, optional SOCKS5).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with the configured timeouts and proxy.
    pub fn new(timeouts: &TimeoutConfig, proxy: Option<&Socks5Proxy>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request);

        if let Some(proxy) = proxy {
            debug!(proxy = %proxy, "Routing HTTP through SOCKS5 proxy");
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        let client = builder.build().map_err(|source| Error::Request {
            url: String::new(),
            source,
        })?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(
        name = "ReqwestTransport::send",
        skip_all,
        fields(url = %request.url, authenticated = request.credentials.is_some())
    )]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url_text = request.url.to_string();
        let to_error = |source| Error::Request {
            url: url_text.clone(),
            source,
        };

        let mut builder = self
            .client
            .post(request.url)
            .header(CONTENT_TYPE, request.content_type)
            .body(request.body);
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(credentials.username(), Some(credentials.password()));
        }

        let response = builder.send().await.map_err(to_error)?;
        let status = response.status().as_u16();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(to_error)?;

        debug!(status, final_url = %url, bytes = body.len(), "HTTP exchange complete");
        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_redacted() {
        let credentials = Credentials::new("user", SecretString::from("hunter2".to_string()));
        assert_eq!(credentials.password(), "hunter2");
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[test]
    fn test_xml_request_defaults() {
        let url = Url::parse("https://mail.example.com/EWS/Exchange.asmx").unwrap();
        let request = HttpRequest::xml(url, "<x/>".into());
        assert_eq!(request.content_type, XML_CONTENT_TYPE);
        assert!(request.credentials.is_none());
    }

    #[test]
    fn test_reqwest_transport_builds() {
        let proxy = Socks5Proxy::new("127.0.0.1", 1080);
        assert!(ReqwestTransport::new(&TimeoutConfig::default(), Some(&proxy)).is_ok());
        assert!(ReqwestTransport::new(&TimeoutConfig::default(), None).is_ok());
    }
}
