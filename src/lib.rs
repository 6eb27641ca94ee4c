//! # fetchnet
//!
//! A client-side HTTP request helper for Rust.
//!
//! `fetchnet` layers two independent pieces over a pluggable fetch
//! transport: a retry engine for arbitrary async operations and a
//! client-side cookie jar.
//!
//! ## Features
//!
//! - **Retry Engine**: bounded attempts, per-attempt timeouts, predicate
//!   validation, delay schedules and external cancellation
//! - **Cookie Jar**: `Set-Cookie` ingestion, domain/path matching, prefix
//!   rules, lazy expiry, snapshot and restore
//! - **Client**: base URL, query and body helpers, interceptors, and a
//!   [`Transport`](crate::http::Transport) seam with a hyper-based default
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fetchnet::Client;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new();
//!     let response = client
//!         .get("http://example.com")
//!         .send()
//!         .await
//!         .unwrap();
//!     println!("Status: {}", response.status());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`cookies`] - Cookie model, header helpers and the cookie jar
//! - [`http`] - Request/response types, transport trait and retry engine
//! - [`client`] - High-level request API

pub mod base;
pub mod client;
pub mod cookies;
pub mod http;

pub use base::neterror::NetError;
pub use client::{Client, ClientBuilder, ClientConfig, Interceptor, RequestBuilder};
pub use cookies::{CanonicalCookie, CookieJar};
pub use crate::http::retry::{retry, RetryError, RetryOptions};
