//! HTTP Response with body access.

use crate::base::neterror::NetError;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use url::Url;

/// HTTP Response with a fully buffered body.
/// This is the user-facing response type returned by a transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, url: Url, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            url,
            headers,
            body: body.into(),
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The URL this response was received from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|_| NetError::HttpBodyError)
    }

    /// Body as JSON.
    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        serde_json::from_slice(&self.body).map_err(|_| NetError::InvalidResponse)
    }
}
