//! Autodiscovery against scripted HTTP responses.

use async_trait::async_trait;
use ews_sync::autodiscover::Autodiscover;
use ews_sync::transport::{Credentials, HttpRequest, HttpResponse, Transport};
use ews_sync::{Error, EwsClient, EwsConfig, JobQueue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const EXAMPLE_HTTPS: &str = "https://example.com/autodiscover/autodiscover.xml";
const EXAMPLE_HTTPS_AD: &str = "https://autodiscover.example.com/autodiscover/autodiscover.xml";
const EXAMPLE_HTTP: &str = "http://example.com/autodiscover/autodiscover.xml";
const EXAMPLE_HTTP_AD: &str = "http://autodiscover.example.com/autodiscover/autodiscover.xml";

#[derive(Clone)]
struct Reply {
    status: u16,
    final_url: Option<String>,
    body: String,
}

impl Reply {
    fn status(status: u16) -> Self {
        Self {
            status,
            final_url: None,
            body: String::new(),
        }
    }

    fn ok(body: String) -> Self {
        Self {
            status: 200,
            final_url: None,
            body,
        }
    }

    fn via(mut self, final_url: &str) -> Self {
        self.final_url = Some(final_url.to_string());
        self
    }
}

/// Answers by `(url, authenticated)`; anything unscripted is a 404.
#[derive(Default)]
struct ScriptedHttp {
    replies: Mutex<HashMap<(String, bool), Reply>>,
    probes: Mutex<Vec<(String, bool)>>,
    bodies: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn on(&self, url: &str, authenticated: bool, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert((url.to_string(), authenticated), reply);
    }

    fn probes(&self) -> Vec<(String, bool)> {
        self.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> ews_sync::Result<HttpResponse> {
        let key = (request.url.to_string(), request.credentials.is_some());
        self.probes.lock().unwrap().push(key.clone());
        self.bodies.lock().unwrap().push(request.body.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Reply::status(404));
        let url = match &reply.final_url {
            Some(url) => Url::parse(url).unwrap(),
            None => request.url,
        };
        Ok(HttpResponse {
            status: reply.status,
            url,
            headers: reqwest::header::HeaderMap::new(),
            body: reply.body,
        })
    }
}

fn settings(ews_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Autodiscover xmlns="http://schemas.microsoft.com/exchange/autodiscover/responseschema/2006">
  <Response xmlns="http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a">
    <Account>
      <AccountType>email</AccountType>
      <Action>settings</Action>
      <Protocol><Type>EXCH</Type><EwsUrl>{ews_url}</EwsUrl></Protocol>
    </Account>
  </Response>
</Autodiscover>"#
    )
}

fn redirect_addr(address: &str) -> String {
    format!(
        "<Autodiscover><Response><Account><Action>redirectAddr</Action><RedirectAddr>{address}</RedirectAddr></Account></Response></Autodiscover>"
    )
}

fn redirect_url(url: &str) -> String {
    format!(
        "<Autodiscover><Response><Account><Action>redirectUrl</Action><RedirectUrl>{url}</RedirectUrl></Account></Response></Autodiscover>"
    )
}

fn resolver(http: &Arc<ScriptedHttp>) -> Autodiscover {
    Autodiscover::new(
        http.clone(),
        Some(Credentials::new("user@example.com", "secret".to_string())),
    )
}

fn probe(url: &str, authenticated: bool) -> (String, bool) {
    (url.to_string(), authenticated)
}

#[tokio::test]
async fn test_unauthorized_https_retried_with_credentials() {
    let http = ScriptedHttp::new();
    http.on(EXAMPLE_HTTPS, false, Reply::status(401));
    http.on(
        EXAMPLE_HTTPS,
        true,
        Reply::ok(settings("https://mail.example.com/EWS/Exchange.asmx")),
    );

    let found = resolver(&http).resolve("user@example.com").await.unwrap();
    assert_eq!(found.ews_url.as_str(), "https://mail.example.com/EWS/Exchange.asmx");
    assert_eq!(
        http.probes(),
        [probe(EXAMPLE_HTTPS, false), probe(EXAMPLE_HTTPS, true)]
    );
}

#[tokio::test]
async fn test_retry_targets_final_url() {
    let http = ScriptedHttp::new();
    let moved = "https://mail.example.com/autodiscover/autodiscover.xml";
    http.on(EXAMPLE_HTTPS, false, Reply::status(401).via(moved));
    http.on(
        moved,
        true,
        Reply::ok(settings("https://mail.example.com/EWS/Exchange.asmx")),
    );

    resolver(&http).resolve("user@example.com").await.unwrap();
    assert_eq!(http.probes(), [probe(EXAMPLE_HTTPS, false), probe(moved, true)]);
}

#[tokio::test]
async fn test_unauthorized_over_http_not_retried() {
    let http = ScriptedHttp::new();
    http.on(EXAMPLE_HTTP, false, Reply::status(401));

    let err = resolver(&http).resolve("user@example.com").await.unwrap_err();
    assert!(matches!(err, Error::AutodiscoverExhausted { .. }));
    assert!(http.probes().iter().all(|(_, authenticated)| !authenticated));
}

#[tokio::test]
async fn test_no_credentials_no_retry() {
    let http = ScriptedHttp::new();
    http.on(EXAMPLE_HTTPS, false, Reply::status(401));

    let err = Autodiscover::new(http.clone(), None)
        .resolve("user@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AutodiscoverExhausted { .. }));
    assert_eq!(http.probes().len(), 4);
}

#[tokio::test]
async fn test_failures_advance_queue_in_order() {
    let http = ScriptedHttp::new();
    http.on(EXAMPLE_HTTPS, false, Reply::status(500));
    http.on(EXAMPLE_HTTPS_AD, false, Reply::ok("<html>parked domain</html>".into()));
    http.on(
        EXAMPLE_HTTP,
        false,
        Reply::ok(settings("https://mail.example.com/EWS/Exchange.asmx")),
    );

    let found = resolver(&http).resolve("user@example.com").await.unwrap();
    assert_eq!(found.ews_url.host_str(), Some("mail.example.com"));
    assert_eq!(
        http.probes(),
        [
            probe(EXAMPLE_HTTPS, false),
            probe(EXAMPLE_HTTPS_AD, false),
            probe(EXAMPLE_HTTP, false),
        ]
    );
}

#[tokio::test]
async fn test_exhausted_carries_last_failure() {
    let http = ScriptedHttp::new();

    let err = resolver(&http).resolve("user@example.com").await.unwrap_err();
    match err {
        Error::AutodiscoverExhausted { email, last } => {
            assert_eq!(email, "user@example.com");
            let last = last.expect("last failure recorded");
            assert!(matches!(*last, Error::Http { status: 404, ref url } if url == EXAMPLE_HTTP_AD));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(http.probes().len(), 4);
}

#[tokio::test]
async fn test_redirect_addr_restarts_with_new_domain() {
    let http = ScriptedHttp::new();
    http.on(EXAMPLE_HTTPS, false, Reply::ok(redirect_addr("user@corp.example")));
    http.on(
        "https://corp.example/autodiscover/autodiscover.xml",
        false,
        Reply::ok(settings("https://ews.corp.example/EWS/Exchange.asmx")),
    );

    let found = resolver(&http).resolve("user@example.com").await.unwrap();
    assert_eq!(found.ews_url.host_str(), Some("ews.corp.example"));

    let bodies = http.bodies.lock().unwrap().clone();
    assert!(bodies[0].contains("<EMailAddress>user@example.com</EMailAddress>"));
    assert!(bodies[1].contains("<EMailAddress>user@corp.example</EMailAddress>"));
}

#[tokio::test]
async fn test_redirect_url_replaces_queue() {
    let http = ScriptedHttp::new();
    let target = "https://ad.corp.example/autodiscover/autodiscover.xml";
    http.on(EXAMPLE_HTTPS, false, Reply::ok(redirect_url(target)));
    http.on(target, false, Reply::status(503));

    let err = resolver(&http).resolve("user@example.com").await.unwrap_err();
    assert!(matches!(err, Error::AutodiscoverExhausted { .. }));
    assert_eq!(http.probes(), [probe(EXAMPLE_HTTPS, false), probe(target, false)]);
}

#[tokio::test]
async fn test_redirect_limit() {
    let http = ScriptedHttp::new();
    http.on(EXAMPLE_HTTPS, false, Reply::ok(redirect_addr("user@example.com")));

    let err = resolver(&http)
        .max_redirects(2)
        .resolve("user@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AutodiscoverRedirectLimit { limit: 2, .. }));
    assert_eq!(http.probes().len(), 3);
}

#[tokio::test]
async fn test_client_connect_autodiscovers_endpoint() {
    let http = ScriptedHttp::new();
    http.on(
        EXAMPLE_HTTPS,
        false,
        Reply::ok(settings("https://mail.example.com/EWS/Exchange.asmx")),
    );

    let config = EwsConfig::builder()
        .email("user@example.com")
        .password("secret")
        .build()
        .unwrap();
    let client = EwsClient::connect_with(config, http.clone(), Arc::new(JobQueue::new(1)))
        .await
        .unwrap();
    assert_eq!(
        client.endpoint().as_str(),
        "https://mail.example.com/EWS/Exchange.asmx"
    );
}

/// Occupies every slot of `queue` until the returned sender fires.
async fn hold_queue(queue: &Arc<JobQueue>) -> tokio::sync::oneshot::Sender<()> {
    let (release, held) = tokio::sync::oneshot::channel::<()>();
    let queue_for_holder = Arc::clone(queue);
    tokio::spawn(async move {
        queue_for_holder
            .run("Hold", async move {
                held.await.ok();
                Ok(())
            })
            .await
    });
    while queue.available() > 0 {
        tokio::task::yield_now().await;
    }
    release
}

#[tokio::test]
async fn test_probes_wait_for_shared_queue() {
    let http = ScriptedHttp::new();
    http.on(
        EXAMPLE_HTTPS,
        false,
        Reply::ok(settings("https://mail.example.com/EWS/Exchange.asmx")),
    );
    let queue = Arc::new(JobQueue::new(1));
    let release = hold_queue(&queue).await;

    let resolver = resolver(&http).queue(Arc::clone(&queue));
    let resolve = resolver.resolve("user@example.com");
    tokio::pin!(resolve);

    let waited = tokio::time::timeout(Duration::from_millis(50), &mut resolve).await;
    assert!(waited.is_err());
    assert!(http.probes().is_empty());

    release.send(()).unwrap();
    let found = resolve.await.unwrap();
    assert_eq!(found.ews_url.as_str(), "https://mail.example.com/EWS/Exchange.asmx");
    assert_eq!(http.probes(), [probe(EXAMPLE_HTTPS, false)]);
}

#[tokio::test]
async fn test_client_connect_autodiscovers_through_shared_queue() {
    let http = ScriptedHttp::new();
    http.on(
        EXAMPLE_HTTPS,
        false,
        Reply::ok(settings("https://mail.example.com/EWS/Exchange.asmx")),
    );
    let queue = Arc::new(JobQueue::new(1));
    let release = hold_queue(&queue).await;

    let config = EwsConfig::builder()
        .email("user@example.com")
        .password("secret")
        .build()
        .unwrap();
    let connect = EwsClient::connect_with(config, http.clone(), Arc::clone(&queue));
    tokio::pin!(connect);

    let waited = tokio::time::timeout(Duration::from_millis(50), &mut connect).await;
    assert!(waited.is_err());
    assert!(http.probes().is_empty());

    release.send(()).unwrap();
    let client = connect.await.unwrap();
    assert!(Arc::ptr_eq(client.queue(), &queue));
}
