use crate::cookies::canonicalcookie::CanonicalCookie;
use crate::cookies::cookieheader::extract_set_cookie_headers;
use crate::http::{HttpRequest, HttpResponse};
use dashmap::DashMap;
use http::header::COOKIE;
use http::{HeaderMap, HeaderValue};
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use url::Url;

/// Anything that carries a resolvable URL and `Set-Cookie` headers.
pub trait CookieSource {
    fn source_url(&self) -> Option<&Url>;
    fn source_headers(&self) -> &HeaderMap;
}

impl CookieSource for HttpResponse {
    fn source_url(&self) -> Option<&Url> {
        Some(self.url())
    }

    fn source_headers(&self) -> &HeaderMap {
        self.headers()
    }
}

impl CookieSource for (Url, HeaderMap) {
    fn source_url(&self) -> Option<&Url> {
        Some(&self.0)
    }

    fn source_headers(&self) -> &HeaderMap {
        &self.1
    }
}

/// Anything that names the URL a request will be sent to.
pub trait CookieTarget {
    fn target_url(&self) -> Option<Url>;
}

impl CookieTarget for Url {
    fn target_url(&self) -> Option<Url> {
        Some(self.clone())
    }
}

impl CookieTarget for str {
    fn target_url(&self) -> Option<Url> {
        Url::parse(self).ok()
    }
}

impl CookieTarget for String {
    fn target_url(&self) -> Option<Url> {
        self.as_str().target_url()
    }
}

impl CookieTarget for HttpRequest {
    fn target_url(&self) -> Option<Url> {
        Some(self.url().clone())
    }
}

/// Selects cookies for [`CookieJar::remove`].
///
/// Without a domain the matcher selects every cookie. A path selects
/// cookies whose own path lies within it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieMatcher {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub name: Option<String>,
}

impl CookieMatcher {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Client-side cookie store.
///
/// Cookies are indexed by lowercase domain. Entries are never deduplicated:
/// a second cookie with the same name, domain and path is stored next to the
/// first until removal or expiry. Expired cookies are swept lazily on reads.
#[derive(Debug, Default)]
pub struct CookieJar {
    store: DashMap<String, Vec<CanonicalCookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Rebuild a jar from a previous [`snapshot`](Self::snapshot).
    /// Restored cookies are trusted and skip domain and security filtering.
    /// Cookies without a domain can never match a request and are skipped.
    pub fn restore(cookies: impl IntoIterator<Item = CanonicalCookie>) -> Self {
        let jar = Self::new();
        for cookie in cookies {
            let Some(key) = cookie.domain.as_deref().and_then(domain_key) else {
                tracing::warn!(name = %cookie.name, "skipping restored cookie without a domain");
                continue;
            };
            jar.insert(key, cookie);
        }
        jar
    }

    fn insert(&self, key: String, cookie: CanonicalCookie) {
        self.store.entry(key).or_default().push(cookie);
    }

    /// Store the cookies set by a response. Returns how many were stored.
    ///
    /// Missing `Domain` defaults to the response host and missing `Path` to
    /// the directory of the response path. Cookies are rejected when they
    /// are `Secure` but arrived over plain HTTP (localhost excepted), or when
    /// their domain is neither the response host nor one of its parents.
    /// Already-expired cookies delete matching stored entries instead.
    pub fn ingest<S: CookieSource + ?Sized>(&self, source: &S) -> usize {
        let Some(url) = source.source_url() else {
            return 0;
        };
        let Some(host) = url.host_str() else {
            tracing::debug!(url = %url, "response URL has no host, ignoring Set-Cookie");
            return 0;
        };
        let host = host.to_ascii_lowercase();
        let secure_channel = is_secure_channel(url);
        let now = OffsetDateTime::now_utc();
        let mut stored = 0;

        for line in extract_set_cookie_headers(source.source_headers()) {
            let Some(mut cookie) = CanonicalCookie::parse(&line) else {
                continue;
            };

            let domain = cookie
                .domain
                .as_deref()
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| host.clone());
            let path = cookie
                .path
                .clone()
                .unwrap_or_else(|| default_path(url.path()).to_string());
            cookie.domain = Some(domain.clone());
            cookie.path = Some(path.clone());

            // Max-Age wins over Expires.
            if let Some(max_age) = cookie.max_age {
                let expires = now
                    .checked_add(Duration::seconds(max_age))
                    .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());
                cookie.expires = Some(expires);
            }

            if cookie.secure && !secure_channel {
                tracing::debug!(
                    name = %cookie.name,
                    url = %url,
                    "rejecting Secure cookie from insecure origin"
                );
                continue;
            }
            if !domain_matches(&host, &domain) {
                tracing::debug!(
                    name = %cookie.name,
                    domain = %domain,
                    host = %host,
                    "rejecting cookie for foreign domain"
                );
                continue;
            }
            if cookie.is_expired(now) {
                tracing::debug!(
                    name = %cookie.name,
                    domain = %domain,
                    "expired cookie received, removing stored cookie"
                );
                self.remove_exact(&domain, &path, &cookie.name);
                continue;
            }

            self.insert(domain, cookie);
            stored += 1;
        }

        stored
    }

    /// `name=value` pairs applicable to the target, longest path first.
    ///
    /// Secure cookies are only returned for HTTPS targets (or localhost).
    pub fn cookies_for<T: CookieTarget + ?Sized>(&self, target: &T) -> Vec<String> {
        self.sweep_expired(OffsetDateTime::now_utc());

        let Some(url) = target.target_url() else {
            return Vec::new();
        };
        let Some(host) = url.host_str() else {
            return Vec::new();
        };
        let host = host.to_ascii_lowercase();
        let secure_channel = is_secure_channel(&url);
        let request_path = url.path();

        let mut matched: Vec<(usize, String)> = Vec::new();
        for domain in candidate_domains(&host) {
            let Some(entry) = self.store.get(domain) else {
                continue;
            };
            for cookie in entry.iter() {
                let cookie_path = cookie.path.as_deref().unwrap_or("/");
                if !path_matches(cookie_path, request_path) {
                    continue;
                }
                if cookie.secure && !secure_channel {
                    continue;
                }
                matched.push((cookie_path.len(), format!("{}={}", cookie.name, cookie.value)));
            }
        }

        // RFC 6265 §5.4: longer paths first; the sort is stable for equal lengths.
        matched.sort_by(|a, b| b.0.cmp(&a.0));
        matched.into_iter().map(|(_, pair)| pair).collect()
    }

    /// Same as [`cookies_for`](Self::cookies_for), as header values.
    pub fn cookie_header_values<T: CookieTarget + ?Sized>(&self, target: &T) -> Vec<HeaderValue> {
        self.cookies_for(target)
            .into_iter()
            .filter_map(|pair| match HeaderValue::from_str(&pair) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::debug!(cookie = %pair, "skipping cookie that is not a header value");
                    None
                }
            })
            .collect()
    }

    /// Append one `Cookie` header per applicable cookie.
    pub fn attach(&self, request: &mut HttpRequest) {
        for value in self.cookie_header_values(&*request) {
            request.headers_mut().append(COOKIE, value);
        }
    }

    /// Drop stored cookies with exactly this name, domain and path.
    fn remove_exact(&self, domain: &str, path: &str, name: &str) {
        let now_empty = match self.store.get_mut(domain) {
            Some(mut entry) => {
                entry.retain(|cookie| {
                    cookie.name != name || cookie.path.as_deref().unwrap_or("/") != path
                });
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.store.remove_if(domain, |_, cookies| cookies.is_empty());
        }
    }

    pub fn remove(&self, matcher: &CookieMatcher) {
        let Some(domain) = matcher.domain.as_deref() else {
            self.store.clear();
            return;
        };
        let Some(key) = domain_key(domain) else {
            return;
        };

        let now_empty = match self.store.get_mut(&key) {
            Some(mut entry) => {
                entry.retain(|cookie| !matcher_selects(matcher, cookie));
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.store.remove_if(&key, |_, cookies| cookies.is_empty());
        }
    }

    /// All live cookies, for external persistence.
    pub fn snapshot(&self) -> Vec<CanonicalCookie> {
        self.sweep_expired(OffsetDateTime::now_utc());
        self.store
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of stored cookies, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.store.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    fn sweep_expired(&self, now: OffsetDateTime) {
        self.store.retain(|_, cookies| {
            cookies.retain(|cookie| !cookie.is_expired(now));
            !cookies.is_empty()
        });
    }
}

fn matcher_selects(matcher: &CookieMatcher, cookie: &CanonicalCookie) -> bool {
    if let Some(name) = matcher.name.as_deref() {
        if cookie.name != name {
            return false;
        }
    }
    match matcher.path.as_deref() {
        Some(path) => path_matches(path, cookie.path.as_deref().unwrap_or("/")),
        None => true,
    }
}

/// Store key for a domain: lowercase, without a leading dot.
fn domain_key(domain: &str) -> Option<String> {
    let domain = domain.strip_prefix('.').unwrap_or(domain);
    if domain.is_empty() {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

fn is_secure_channel(url: &Url) -> bool {
    url.scheme() == "https" || url.host_str() == Some("localhost")
}

/// The host itself followed by each parent domain.
fn candidate_domains(host: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(host), |&domain: &&str| {
        domain.split_once('.').map(|(_, parent)| parent)
    })
    .filter(|domain| !domain.is_empty())
}

/// Check if a cookie domain matches a request host.
/// RFC 6265 domain matching, without public suffix pruning.
pub(crate) fn domain_matches(host: &str, cookie_domain: &str) -> bool {
    if cookie_domain.is_empty() {
        return false;
    }
    if host == cookie_domain {
        return true;
    }
    host.len() > cookie_domain.len()
        && host.ends_with(cookie_domain)
        && host.as_bytes()[host.len() - cookie_domain.len() - 1] == b'.'
}

/// Check if request path matches cookie path.
/// Implements RFC 6265 path matching.
pub(crate) fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }

    if request_path.starts_with(cookie_path) {
        if cookie_path.ends_with('/') {
            return true;
        }
        return request_path.as_bytes().get(cookie_path.len()) == Some(&b'/');
    }

    false
}

/// RFC 6265 §5.1.4 default-path: the request path up to, not including,
/// its last '/'.
pub(crate) fn default_path(request_path: &str) -> &str {
    if !request_path.starts_with('/') {
        return "/";
    }
    match request_path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &request_path[..idx],
    }
}
