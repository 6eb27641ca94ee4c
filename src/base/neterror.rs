use crate::http::retry::RetryError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection timed out")]
    ConnectionTimedOut,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("HTTP body error")]
    HttpBodyError,
    #[error("Request body encoding failed")]
    RequestBodyEncodingFailed,

    // Cookie Errors
    #[error("Cookie name contains invalid characters")]
    CookieInvalidName,
    #[error("Cookie value contains invalid characters")]
    CookieInvalidValue,
    #[error("Cookie Max-Age must be a non-negative integer")]
    CookieInvalidMaxAge,
    #[error("Cookie domain is invalid")]
    CookieInvalidDomain,
    #[error("Cookie path is invalid")]
    CookieInvalidPath,
    #[error("Cookie header segment has no name")]
    CookieInvalidHeader,
    #[error("Cookie prefix validation failed")]
    CookieInvalidPrefix,
    #[error("Cookie expiry cannot be represented as an HTTP-date")]
    CookieInvalidExpires,

    // Retry
    #[error("{0}")]
    Retry(RetryError),

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::ConnectionTimedOut => -118,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,
            NetError::HttpBodyError => -380,
            NetError::RequestBodyEncodingFailed => -381,

            // Custom codes, kept clear of the blob range (-900..=-906)
            NetError::CookieInvalidName => -1000,
            NetError::CookieInvalidValue => -1001,
            NetError::CookieInvalidMaxAge => -1002,
            NetError::CookieInvalidDomain => -1003,
            NetError::CookieInvalidPath => -1004,
            NetError::CookieInvalidHeader => -1005,
            NetError::CookieInvalidPrefix => -1006,
            NetError::CookieInvalidExpires => -1007,

            NetError::Retry(RetryError::MaxRetriesReached) => -1100,
            NetError::Retry(RetryError::Aborted) => -1101,
            NetError::Retry(RetryError::PredicateFailed) => -1102,
            NetError::Retry(RetryError::TimeoutReached) => -1103,

            NetError::Unknown(code) => *code,
        }
    }
}

impl From<RetryError> for NetError {
    fn from(err: RetryError) -> Self {
        NetError::Retry(err)
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -118 => NetError::ConnectionTimedOut,

            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -320 => NetError::InvalidResponse,
            -324 => NetError::EmptyResponse,
            -380 => NetError::HttpBodyError,
            -381 => NetError::RequestBodyEncodingFailed,

            -1000 => NetError::CookieInvalidName,
            -1001 => NetError::CookieInvalidValue,
            -1002 => NetError::CookieInvalidMaxAge,
            -1003 => NetError::CookieInvalidDomain,
            -1004 => NetError::CookieInvalidPath,
            -1005 => NetError::CookieInvalidHeader,
            -1006 => NetError::CookieInvalidPrefix,
            -1007 => NetError::CookieInvalidExpires,

            -1100 => NetError::Retry(RetryError::MaxRetriesReached),
            -1101 => NetError::Retry(RetryError::Aborted),
            -1102 => NetError::Retry(RetryError::PredicateFailed),
            -1103 => NetError::Retry(RetryError::TimeoutReached),
            _ => NetError::Unknown(code),
        }
    }
}
