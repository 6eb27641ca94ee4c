//! HTTP Client with builder pattern.
//!
//! Ties the pieces together: requests are resolved against an optional base
//! URL, decorated by interceptors, given the jar's cookies, sent through the
//! [`Transport`] under the retry engine, and their `Set-Cookie` headers are
//! ingested back into the jar.
//!
//! # Example
//!
//! ```rust,ignore
//! use fetchnet::Client;
//! use std::time::Duration;
//!
//! let client = Client::builder()
//!     .base_url("http://localhost:8080/api/".parse()?)
//!     .max_tries(3)
//!     .retry_delay(Duration::from_millis(200))
//!     .build();
//!
//! let resp = client.get("users")
//!     .query("page", "2")
//!     .send()
//!     .await?;
//! ```

use crate::base::neterror::NetError;
use crate::cookies::cookiejar::CookieJar;
use crate::http::retry::{retry, RetryError, RetryOptions, DEFAULT_TIMEOUT};
use crate::http::transport::{HyperTransport, Transport};
use crate::http::{HttpRequest, HttpResponse};
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Status codes that trigger another attempt by default.
pub const RETRY_STATUS_CODES: [u16; 8] = [408, 409, 425, 429, 500, 502, 503, 504];

/// Hooks around each request. All methods default to no-ops.
pub trait Interceptor: Send + Sync {
    /// Before cookies are attached and the first attempt is made.
    fn on_request(&self, _request: &mut HttpRequest) {}

    /// After the final response is received.
    fn on_response(&self, _request: &HttpRequest, _response: &mut HttpResponse) {}

    /// Each time the transport fails an attempt.
    fn on_fetch_error(&self, _request: &HttpRequest, _error: &NetError) {}
}

/// Configuration options for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relative request URLs are joined onto this.
    pub base_url: Option<Url>,

    /// Headers added to every request unless the request sets them.
    pub default_headers: HeaderMap,

    /// Attempts per request. `None` means 1 for POST/PUT/PATCH/DELETE
    /// and 2 for every other method.
    pub max_tries: Option<u32>,

    /// Delay between attempts.
    pub retry_delay: Duration,

    /// Per-attempt timeout.
    pub timeout: Duration,

    /// Responses with these statuses fail the attempt.
    pub retry_status_codes: Vec<StatusCode>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            max_tries: None,
            retry_delay: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            retry_status_codes: RETRY_STATUS_CODES
                .iter()
                .filter_map(|code| StatusCode::from_u16(*code).ok())
                .collect(),
        }
    }
}

impl ClientConfig {
    fn max_tries_for(&self, method: &Method) -> u32 {
        self.max_tries
            .unwrap_or(if is_payload_method(method) { 1 } else { 2 })
    }
}

fn is_payload_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// HTTP Client for making requests.
///
/// Use [`Client::builder()`] to configure and create a client. Clones share
/// the transport and the cookie jar.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    cookie_jar: Option<Arc<CookieJar>>,
    config: Arc<ClientConfig>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The jar shared by this client, if cookies are enabled.
    pub fn cookie_jar(&self) -> Option<&Arc<CookieJar>> {
        self.cookie_jar.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start building a POST request.
    pub fn post<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start building a PUT request.
    pub fn put<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start building a DELETE request.
    pub fn delete<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Start building a HEAD request.
    pub fn head<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Start building a PATCH request.
    pub fn patch<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Start building a request with custom method.
    pub fn request<U: AsRef<str>>(&self, method: Method, url: U) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            method,
            url: url.as_ref().to_string(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            error: None,
            options: SendOptions::default(),
        }
    }

    /// Send an already built request with the client's settings.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NetError> {
        self.execute_with(request, SendOptions::default()).await
    }

    async fn execute_with(
        &self,
        mut request: HttpRequest,
        options: SendOptions,
    ) -> Result<HttpResponse, NetError> {
        for interceptor in self.interceptors.iter() {
            interceptor.on_request(&mut request);
        }
        if let Some(jar) = &self.cookie_jar {
            jar.attach(&mut request);
        }

        let max_tries = options
            .max_tries
            .unwrap_or_else(|| self.config.max_tries_for(request.method()));
        let retry_status_codes = self.config.retry_status_codes.clone();

        // Holds the response refused by the status check, if the latest attempt was refused.
        let last_refused: Arc<Mutex<Option<HttpResponse>>> = Arc::default();
        let refused = Arc::clone(&last_refused);

        let mut retry_options = RetryOptions::<HttpResponse, NetError>::default()
            .with_max_tries(max_tries)
            .with_delay(self.config.retry_delay)
            .with_timeout(options.timeout.unwrap_or(self.config.timeout))
            .with_predicate_fn(move |resp: &HttpResponse| {
                if !retry_status_codes.contains(&resp.status()) {
                    return true;
                }
                if let Ok(mut slot) = refused.lock() {
                    *slot = Some(resp.clone());
                }
                false
            });
        if let Some(signal) = options.signal {
            retry_options = retry_options.with_signal(signal);
        }

        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            max_tries,
            "sending request"
        );

        let outcome = retry(|| self.attempt(&request, &last_refused), retry_options).await;

        let mut response = match outcome {
            Ok(response) => response,
            Err(RetryError::MaxRetriesReached) => {
                // Out of attempts on a retryable status: hand that response back.
                match last_refused.lock().ok().and_then(|mut slot| slot.take()) {
                    Some(response) => response,
                    None => {
                        tracing::warn!(
                            url = %request.url(),
                            max_tries,
                            "request failed on every attempt"
                        );
                        return Err(NetError::Retry(RetryError::MaxRetriesReached));
                    }
                }
            }
            Err(err) => return Err(err.into()),
        };

        for interceptor in self.interceptors.iter() {
            interceptor.on_response(&request, &mut response);
        }

        Ok(response)
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
        last_refused: &Mutex<Option<HttpResponse>>,
    ) -> Result<HttpResponse, NetError> {
        if let Ok(mut slot) = last_refused.lock() {
            *slot = None;
        }

        match self.transport.fetch(request.clone()).await {
            Ok(response) => {
                if let Some(jar) = &self.cookie_jar {
                    jar.ingest(&response);
                }
                Ok(response)
            }
            Err(err) => {
                tracing::debug!(url = %request.url(), error = %err, "fetch failed");
                for interceptor in self.interceptors.iter() {
                    interceptor.on_fetch_error(request, &err);
                }
                Err(err)
            }
        }
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    cookie_jar: Option<Arc<CookieJar>>,
    disable_cookies: bool,
    config: ClientConfig,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ClientBuilder {
    /// Set the transport (default: [`HyperTransport`]).
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Share an existing cookie jar.
    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Neither attach nor store cookies.
    pub fn no_cookies(mut self) -> Self {
        self.disable_cookies = true;
        self
    }

    pub fn base_url(mut self, url: Url) -> Self {
        self.config.base_url = Some(url);
        self
    }

    /// Add a header sent with every request.
    pub fn default_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: http::header::IntoHeaderName,
        V: TryInto<HeaderValue>,
    {
        if let Ok(val) = value.try_into() {
            self.config.default_headers.insert(key, val);
        }
        self
    }

    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.config.max_tries = Some(max_tries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Set per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn retry_status_codes(mut self, codes: impl IntoIterator<Item = StatusCode>) -> Self {
        self.config.retry_status_codes = codes.into_iter().collect();
        self
    }

    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new()));
        let cookie_jar = if self.disable_cookies {
            None
        } else {
            Some(self.cookie_jar.unwrap_or_default())
        };

        Client {
            transport,
            cookie_jar,
            config: Arc::new(self.config),
            interceptors: self.interceptors.into(),
        }
    }
}

/// Per-request overrides of the client configuration.
#[derive(Debug, Clone, Default)]
struct SendOptions {
    max_tries: Option<u32>,
    timeout: Option<Duration>,
    signal: Option<CancellationToken>,
}

/// Builder for a single request.
pub struct RequestBuilder {
    client: Client,
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
    error: Option<NetError>,
    options: SendOptions,
}

impl RequestBuilder {
    /// Add a header.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: http::header::IntoHeaderName,
        V: TryInto<HeaderValue>,
    {
        if let Ok(val) = value.try_into() {
            self.headers.insert(key, val);
        }
        self
    }

    /// Append a query parameter to the URL.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set request body.
    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set JSON body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        match serde_json::to_vec(json) {
            Ok(bytes) => {
                self.body = Some(bytes.into());
                self.default_header(CONTENT_TYPE, "application/json");
                self.default_header(ACCEPT, "application/json");
            }
            Err(e) => {
                tracing::debug!(error = %e, "failed to encode JSON body");
                self.error = Some(NetError::RequestBodyEncodingFailed);
            }
        }
        self
    }

    /// Set an `application/x-www-form-urlencoded` body.
    pub fn form<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .finish();
        self.body = Some(encoded.into());
        self.default_header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        self
    }

    /// Override the number of attempts for this request.
    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.options.max_tries = Some(max_tries);
        self
    }

    /// Override the per-attempt timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Abort the request, including pending retries, when `signal` fires.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.options.signal = Some(signal);
        self
    }

    fn default_header(&mut self, key: http::header::HeaderName, value: &'static str) {
        if !self.headers.contains_key(&key) {
            self.headers.insert(key, HeaderValue::from_static(value));
        }
    }

    /// Resolve the request without sending it.
    pub fn build(&self) -> Result<HttpRequest, NetError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut url = match &self.client.config.base_url {
            Some(base) => base.join(&self.url),
            None => Url::parse(&self.url),
        }
        .map_err(|_| NetError::InvalidUrl)?;

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        let mut request = HttpRequest::new(self.method.clone(), url);
        let headers = request.headers_mut();
        for (key, value) in self.client.config.default_headers.iter() {
            if !self.headers.contains_key(key) {
                headers.append(key.clone(), value.clone());
            }
        }
        for (key, value) in self.headers.iter() {
            headers.append(key.clone(), value.clone());
        }
        if let Some(body) = &self.body {
            request.set_body(body.clone());
        }

        Ok(request)
    }

    /// Send the request.
    pub async fn send(self) -> Result<HttpResponse, NetError> {
        let request = self.build()?;
        self.client.execute_with(request, self.options).await
    }
}
