//! Tests for Client API.

use fetchnet::http::transport::Fetching;
use fetchnet::http::{HttpRequest, HttpResponse, Transport};
use fetchnet::{Client, Interceptor, NetError, RetryError};
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A step of scripted transport behavior: a status with `Set-Cookie` lines,
/// or a transport failure.
enum Step {
    Respond(u16, Vec<&'static str>),
    Fail(NetError),
    Hang,
}

/// Replays steps in order and records every request it receives.
#[derive(Clone, Default)]
struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<Step>>>,
    seen: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            seen: Arc::default(),
        }
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn fetch(&self, request: HttpRequest) -> Fetching {
        self.seen.lock().unwrap().push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Respond(200, Vec::new()));

        Box::pin(async move {
            match step {
                Step::Respond(status, cookies) => {
                    let mut headers = HeaderMap::new();
                    for line in cookies {
                        headers.append(SET_COOKIE, HeaderValue::from_static(line));
                    }
                    Ok(HttpResponse::new(
                        StatusCode::from_u16(status).unwrap(),
                        request.url().clone(),
                        headers,
                        "body",
                    ))
                }
                Step::Fail(err) => Err(err),
                Step::Hang => std::future::pending().await,
            }
        })
    }
}

fn cookie_headers(request: &HttpRequest) -> Vec<String> {
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

// === Client Tests ===

#[test]
fn test_client_creation() {
    let client = Client::new();
    assert!(client.cookie_jar().is_some());
    assert_eq!(client.config().max_tries, None);
}

#[test]
fn test_client_without_cookies() {
    let client = Client::builder().no_cookies().build();
    assert!(client.cookie_jar().is_none());
}

#[test]
fn test_request_builder_resolves_url() {
    let client = Client::builder()
        .base_url(Url::parse("https://api.example.com/v1/").unwrap())
        .default_header("x-client", "fetchnet")
        .build();

    let request = client
        .get("users")
        .query("page", "2")
        .query("q", "a b")
        .header("x-custom", "value")
        .build()
        .unwrap();

    assert_eq!(*request.method(), Method::GET);
    assert_eq!(
        request.url().as_str(),
        "https://api.example.com/v1/users?page=2&q=a+b"
    );
    assert_eq!(request.headers()["x-client"], "fetchnet");
    assert_eq!(request.headers()["x-custom"], "value");
}

#[test]
fn test_request_header_overrides_default() {
    let client = Client::builder()
        .default_header("x-client", "fetchnet")
        .build();

    let request = client
        .get("http://example.com/")
        .header("x-client", "custom")
        .build()
        .unwrap();

    let values: Vec<_> = request.headers().get_all("x-client").iter().collect();
    assert_eq!(values, vec!["custom"]);
}

#[test]
fn test_invalid_url() {
    let client = Client::new();
    assert_eq!(
        client.get("not a url").build().unwrap_err(),
        NetError::InvalidUrl
    );
}

#[test]
fn test_json_body() {
    let client = Client::new();
    let request = client
        .post("http://example.com/items")
        .json(&serde_json::json!({"name": "widget"}))
        .build()
        .unwrap();

    assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
    assert_eq!(&request.body()[..], br#"{"name":"widget"}"#);
}

#[test]
fn test_form_body() {
    let client = Client::new();
    let request = client
        .post("http://example.com/login")
        .form(&[("user", "ann"), ("pass", "x&y")])
        .build()
        .unwrap();

    assert_eq!(
        request.headers()[CONTENT_TYPE],
        "application/x-www-form-urlencoded"
    );
    assert_eq!(&request.body()[..], b"user=ann&pass=x%26y");
}

// === Pipeline Tests ===

#[tokio::test(start_paused = true)]
async fn test_cookies_flow_between_requests() {
    let transport = ScriptedTransport::new(vec![
        Step::Respond(200, vec!["session=abc; Path=/", "theme=dark; Path=/app"]),
        Step::Respond(200, Vec::new()),
    ]);
    let client = Client::builder().transport(transport.clone()).build();

    client.get("http://example.com/login").send().await.unwrap();
    client.get("http://example.com/app/home").send().await.unwrap();

    let requests = transport.requests();
    assert!(cookie_headers(&requests[0]).is_empty());
    assert_eq!(cookie_headers(&requests[1]), vec!["theme=dark", "session=abc"]);
}

#[tokio::test(start_paused = true)]
async fn test_no_cookies_client_ignores_set_cookie() {
    let transport = ScriptedTransport::new(vec![
        Step::Respond(200, vec!["session=abc; Path=/"]),
        Step::Respond(200, Vec::new()),
    ]);
    let client = Client::builder()
        .transport(transport.clone())
        .no_cookies()
        .build();

    client.get("http://example.com/").send().await.unwrap();
    client.get("http://example.com/").send().await.unwrap();

    assert!(cookie_headers(&transport.requests()[1]).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_on_retryable_status() {
    let transport = ScriptedTransport::new(vec![
        Step::Respond(503, Vec::new()),
        Step::Respond(200, Vec::new()),
    ]);
    let client = Client::builder().transport(transport.clone()).build();

    let response = client.get("http://example.com/").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_post_is_tried_once() {
    let transport = ScriptedTransport::new(vec![
        Step::Respond(503, Vec::new()),
        Step::Respond(200, Vec::new()),
    ]);
    let client = Client::builder().transport(transport.clone()).build();

    let response = client.post("http://example.com/").send().await.unwrap();

    // Out of attempts: the refused response is handed back.
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_status_is_returned() {
    let transport = ScriptedTransport::new(vec![Step::Respond(404, Vec::new())]);
    let client = Client::builder().transport(transport.clone()).build();

    let response = client.get("http://example.com/missing").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cookies_stored_from_refused_attempt() {
    let transport = ScriptedTransport::new(vec![
        Step::Respond(503, vec!["lb=node-2; Path=/"]),
        Step::Respond(200, Vec::new()),
    ]);
    let client = Client::builder().transport(transport.clone()).build();

    client.get("http://example.com/").send().await.unwrap();

    assert_eq!(cookie_headers(&transport.requests()[1]), vec!["lb=node-2"]);
}

#[derive(Clone, Default)]
struct CountingInterceptor {
    requests: Arc<AtomicUsize>,
    responses: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
}

impl Interceptor for CountingInterceptor {
    fn on_request(&self, request: &mut HttpRequest) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        request
            .headers_mut()
            .insert("x-trace", HeaderValue::from_static("1"));
    }

    fn on_response(&self, _request: &HttpRequest, response: &mut HttpResponse) {
        self.responses.fetch_add(1, Ordering::SeqCst);
        response
            .headers_mut()
            .insert("x-seen", HeaderValue::from_static("yes"));
    }

    fn on_fetch_error(&self, _request: &HttpRequest, _error: &NetError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_exhaust_attempts() {
    let transport = ScriptedTransport::new(vec![
        Step::Fail(NetError::ConnectionRefused),
        Step::Fail(NetError::ConnectionReset),
        Step::Fail(NetError::ConnectionReset),
    ]);
    let counter = CountingInterceptor::default();
    let client = Client::builder()
        .transport(transport.clone())
        .max_tries(3)
        .interceptor(counter.clone())
        .build();

    let err = client.get("http://example.com/").send().await.unwrap_err();

    assert_eq!(err, NetError::Retry(RetryError::MaxRetriesReached));
    assert_eq!(transport.requests().len(), 3);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 3);
    assert_eq!(counter.responses.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_interceptors_wrap_request() {
    let transport = ScriptedTransport::new(vec![Step::Respond(200, Vec::new())]);
    let counter = CountingInterceptor::default();
    let client = Client::builder()
        .transport(transport.clone())
        .interceptor(counter.clone())
        .build();

    let response = client.get("http://example.com/").send().await.unwrap();

    assert_eq!(counter.requests.load(Ordering::SeqCst), 1);
    assert_eq!(counter.responses.load(Ordering::SeqCst), 1);
    assert_eq!(response.headers()["x-seen"], "yes");
    assert_eq!(transport.requests()[0].headers()["x-trace"], "1");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_success() {
    let transport = ScriptedTransport::new(vec![Step::Hang, Step::Respond(200, Vec::new())]);
    let client = Client::builder()
        .transport(transport.clone())
        .timeout(Duration::from_secs(1))
        .build();

    let response = client.get("http://example.com/").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_signal_aborts_request() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let client = Client::builder().transport(transport).build();
    let signal = CancellationToken::new();
    let trigger = signal.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = client
        .get("http://example.com/")
        .signal(signal)
        .send()
        .await
        .unwrap_err();

    assert_eq!(err, NetError::Retry(RetryError::Aborted));
}

#[tokio::test(start_paused = true)]
async fn test_shared_jar_between_clients() {
    let first = ScriptedTransport::new(vec![Step::Respond(200, vec!["id=1; Path=/"])]);
    let second = ScriptedTransport::new(vec![Step::Respond(200, Vec::new())]);

    let writer = Client::builder().transport(first).build();
    let jar = writer.cookie_jar().unwrap().clone();
    let reader = Client::builder()
        .transport(second.clone())
        .cookie_jar(jar)
        .build();

    writer.get("http://example.com/").send().await.unwrap();
    reader.get("http://example.com/").send().await.unwrap();

    assert_eq!(cookie_headers(&second.requests()[0]), vec!["id=1"]);
}
