pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

// Re-exports for convenience
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use retry::{retry, RetryError, RetryOptions};
pub use transport::{HyperTransport, Transport};
