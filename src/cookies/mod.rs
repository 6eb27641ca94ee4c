//! Client-side cookie management.
//!
//! This module provides:
//!
//! - **Model**: [`CanonicalCookie`](canonicalcookie::CanonicalCookie) with
//!   `Set-Cookie` serialization and parsing, including the `__Secure-` and
//!   `__Host-` name prefix rules
//! - **Headers**: `Cookie` header parsing and multi-valued `Set-Cookie` extraction
//! - **Storage**: an in-memory jar ([`CookieJar`](cookiejar::CookieJar)) that
//!   ingests responses and selects cookies for outgoing requests
//!
//! # Example
//!
//! ```rust
//! use fetchnet::cookies::cookiejar::CookieJar;
//! use http::{header::SET_COOKIE, HeaderMap, HeaderValue};
//! use url::Url;
//!
//! let jar = CookieJar::new();
//! let mut headers = HeaderMap::new();
//! headers.append(SET_COOKIE, HeaderValue::from_static("id=42; Path=/; Secure"));
//! jar.ingest(&(Url::parse("https://example.com/a/b").unwrap(), headers));
//!
//! assert_eq!(jar.cookies_for("https://example.com/a/b/c"), vec!["id=42"]);
//! assert!(jar.cookies_for("http://example.com/a").is_empty());
//! ```
//!
//! # Differences from Chromium's `CookieMonster`
//!
//! | Concern | Chromium | fetchnet |
//! |---------|----------|----------|
//! | Public suffix list | Enforced | Not consulted |
//! | Same name/domain/path | Replaces | Both kept until removed or expired |
//! | Eviction | LRU, per-domain and global limits | None |
//! | Expiry | Eager | Swept lazily on read |

pub mod canonicalcookie;
pub mod cookieheader;
pub mod cookiejar;

pub use canonicalcookie::{CanonicalCookie, SameSite};
pub use cookieheader::{extract_set_cookie_headers, parse_cookie_header};
pub use cookiejar::{CookieJar, CookieMatcher, CookieSource, CookieTarget};
