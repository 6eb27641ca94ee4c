//! The pluggable fetch seam.
//!
//! A [`Transport`] sends one [`HttpRequest`] and yields one buffered
//! [`HttpResponse`]. It knows nothing about cookies or retries; the
//! [`Client`](crate::client::Client) layers those on top.

use crate::base::neterror::NetError;
use crate::http::{HttpRequest, HttpResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::{Client as HyperClient, Error as ClientError};
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

/// Alias for the `Future` type returned by a transport.
pub type Fetching = Pin<Box<dyn Future<Output = Result<HttpResponse, NetError>> + Send>>;

/// Sends a request and returns its response.
///
/// Implementations must be thread-safe; a failure is any `NetError`.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: HttpRequest) -> Fetching;
}

/// Blanket implementation for Arc-wrapped transports.
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch(&self, request: HttpRequest) -> Fetching {
        (**self).fetch(request)
    }
}

/// Plain-HTTP transport over hyper's pooled legacy client.
///
/// `https` URLs are refused with [`NetError::DisallowedUrlScheme`]; supply
/// a TLS-capable [`Transport`] for those.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpConnector, Full<Bytes>>,
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    pub fn new() -> Self {
        let client = HyperClient::builder(TokioExecutor::new()).build_http();
        Self { client }
    }
}

impl Transport for HyperTransport {
    fn fetch(&self, request: HttpRequest) -> Fetching {
        let client = self.client.clone();

        Box::pin(async move {
            if request.url().scheme() != "http" {
                return Err(NetError::DisallowedUrlScheme);
            }

            let (method, url, headers, body) = request.into_parts();
            let mut target = url.clone();
            target.set_fragment(None);
            let uri: http::Uri = target.as_str().parse().map_err(|_| NetError::InvalidUrl)?;

            let mut builder = http::Request::builder().method(method).uri(uri);
            if let Some(map) = builder.headers_mut() {
                *map = headers;
            }
            let req = builder
                .body(Full::new(body))
                .map_err(|_| NetError::InvalidUrl)?;

            tracing::debug!(url = %url, "dispatching request");

            let resp = client.request(req).await.map_err(|e| {
                tracing::debug!(url = %url, error = %e, "transport request failed");
                map_client_error(&e)
            })?;

            let (parts, incoming): (_, Incoming) = resp.into_parts();
            let body = incoming
                .collect()
                .await
                .map_err(|_| NetError::HttpBodyError)?
                .to_bytes();

            Ok(HttpResponse::new(parts.status, url, parts.headers, body))
        })
    }
}

/// Walk the error chain for the first cause that names a specific failure.
fn map_client_error(err: &ClientError) -> NetError {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return NetError::EmptyResponse;
            }
            if hyper_err.is_timeout() {
                return NetError::ConnectionTimedOut;
            }
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return NetError::ConnectionRefused,
                io::ErrorKind::ConnectionReset => return NetError::ConnectionReset,
                io::ErrorKind::ConnectionAborted => return NetError::ConnectionAborted,
                io::ErrorKind::TimedOut => return NetError::ConnectionTimedOut,
                _ => {}
            }
        }
        source = cause.source();
    }

    if err.is_connect() {
        NetError::ConnectionFailed
    } else {
        NetError::ConnectionClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    #[tokio::test]
    async fn test_rejects_https() {
        let transport = HyperTransport::new();
        let request = HttpRequest::get(Url::parse("https://example.com/").unwrap());
        assert_eq!(
            transport.fetch(request).await.unwrap_err(),
            NetError::DisallowedUrlScheme
        );
    }

    #[tokio::test]
    async fn test_fetch_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\
                      Set-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\nhello",
                )
                .await
                .unwrap();
        });

        let url = Url::parse(&format!("http://{}/path", addr)).unwrap();
        let transport = HyperTransport::new();
        let resp = transport
            .fetch(HttpRequest::new(Method::GET, url.clone()))
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.url(), &url);
        assert_eq!(resp.text().unwrap(), "hello");
        assert_eq!(resp.headers().get_all(http::header::SET_COOKIE).iter().count(), 2);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let err = HyperTransport::new()
            .fetch(HttpRequest::get(url))
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_closed_before_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            drop(socket);
        });

        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let err = HyperTransport::new()
            .fetch(HttpRequest::get(url))
            .await
            .unwrap_err();
        assert_eq!(err, NetError::EmptyResponse);
    }
}
