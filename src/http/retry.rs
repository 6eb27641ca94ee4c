//! Bounded retry of an arbitrary async operation.
//!
//! [`retry`] drives attempts strictly one after another. Each attempt races
//! the operation against its own timeout; a rejected value, an elapsed
//! timeout or a failed predicate all count as an attempt failure and lead
//! to the next attempt after the configured delay. Only two outcomes ever
//! reach the caller as errors: [`RetryError::MaxRetriesReached`] and
//! [`RetryError::Aborted`].
//!
//! ```rust
//! use fetchnet::http::retry::{retry, RetryOptions};
//! use std::time::Duration;
//!
//! # tokio_test_block_on(async {
//! let options = RetryOptions::<u32, &str>::default()
//!     .with_max_tries(3)
//!     .with_delay(Duration::from_millis(10));
//!
//! let value = retry(|| async { Ok::<_, &str>(7) }, options).await;
//! assert_eq!(value, Ok(7));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default number of attempts.
pub const DEFAULT_MAX_TRIES: u32 = 5;

/// Default per-attempt wall-clock budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Retry outcome kinds.
///
/// `PredicateFailed` and `TimeoutReached` describe a single failed attempt
/// and are only ever reported to [`RetryOptions::on_attempt_failed`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryError {
    #[error("MAX_RETRIES_REACHED")]
    MaxRetriesReached,
    #[error("RETRY_IS_ABORTED")]
    Aborted,
    #[error("ATTEMPT_PREDICATE_FAILED")]
    PredicateFailed,
    #[error("ATTEMPT_TIMEOUT_REACHED")]
    TimeoutReached,
}

impl RetryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MaxRetriesReached => "MAX_RETRIES_REACHED",
            Self::Aborted => "RETRY_IS_ABORTED",
            Self::PredicateFailed => "ATTEMPT_PREDICATE_FAILED",
            Self::TimeoutReached => "ATTEMPT_TIMEOUT_REACHED",
        }
    }

    /// Whether this kind ends the whole call.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MaxRetriesReached | Self::Aborted)
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure<E> {
    /// The operation itself returned an error.
    Rejected(E),
    /// The attempt timed out or its value was refused by the predicate.
    Retry(RetryError),
}

impl<E: fmt::Display> fmt::Display for AttemptFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "attempt rejected: {}", err),
            Self::Retry(kind) => write!(f, "{}", kind),
        }
    }
}

/// A duration that is either fixed or computed from the 1-based attempt index.
#[derive(Clone)]
pub enum Schedule {
    Fixed(Duration),
    Computed(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Schedule {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self::from_fn(move |attempt| calculate_backoff(attempt, base, max))
    }

    /// Duration for the given 1-based attempt.
    pub fn at(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(duration) => *duration,
            Self::Computed(f) => f(attempt),
        }
    }
}

impl From<Duration> for Schedule {
    fn from(duration: Duration) -> Self {
        Self::Fixed(duration)
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Calculate backoff delay for a given attempt.
///
/// Uses exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32 << (attempt - 1).min(10);
    base.saturating_mul(factor).min(max)
}

/// Async validator over a produced value. `false` fails the attempt.
pub type Predicate<T> = Arc<dyn Fn(&T) -> BoxFuture<'static, bool> + Send + Sync>;

/// Diagnostic hook called with each attempt failure and its 1-based index.
pub type AttemptHook<E> = Arc<dyn Fn(AttemptFailure<E>, u32) + Send + Sync>;

/// Configuration for one [`retry`] call.
pub struct RetryOptions<T, E> {
    /// Maximum number of attempts (default: 5).
    pub max_tries: u32,
    /// Wait after failed attempt `n` before attempt `n + 1` (default: none).
    pub delay: Schedule,
    /// Budget for attempt `n` (default: 60 s).
    pub timeout: Schedule,
    pub predicate: Option<Predicate<T>>,
    /// Runs on a spawned task so it never delays the next attempt.
    pub on_attempt_failed: Option<AttemptHook<E>>,
    pub signal: Option<CancellationToken>,
}

impl<T, E> Default for RetryOptions<T, E> {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            delay: Schedule::Fixed(Duration::ZERO),
            timeout: Schedule::Fixed(DEFAULT_TIMEOUT),
            predicate: None,
            on_attempt_failed: None,
            signal: None,
        }
    }
}

impl<T, E> Clone for RetryOptions<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_tries: self.max_tries,
            delay: self.delay.clone(),
            timeout: self.timeout.clone(),
            predicate: self.predicate.clone(),
            on_attempt_failed: self.on_attempt_failed.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<T, E> fmt::Debug for RetryOptions<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_tries", &self.max_tries)
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .field("predicate", &self.predicate.is_some())
            .field("on_attempt_failed", &self.on_attempt_failed.is_some())
            .field("signal", &self.signal.is_some())
            .finish()
    }
}

impl<T, E> RetryOptions<T, E> {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_tries: 1,
            ..Default::default()
        }
    }

    /// More attempts with exponential backoff from 50 ms up to 10 s.
    pub fn aggressive() -> Self {
        Self {
            max_tries: 8,
            delay: Schedule::exponential(Duration::from_millis(50), Duration::from_secs(10)),
            ..Default::default()
        }
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn with_delay(mut self, delay: impl Into<Schedule>) -> Self {
        self.delay = delay.into();
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<Schedule>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate<T>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

impl<T: 'static, E: 'static> RetryOptions<T, E> {
    /// Synchronous predicate convenience.
    pub fn with_predicate_fn<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(move |value: &T| -> BoxFuture<'static, bool> {
            let accepted = predicate(value);
            Box::pin(async move { accepted })
        }));
        self
    }

    pub fn on_attempt_failed<H>(mut self, hook: H) -> Self
    where
        H: Fn(AttemptFailure<E>, u32) + Send + Sync + 'static,
    {
        self.on_attempt_failed = Some(Arc::new(hook));
        self
    }
}

/// Run `operation` until it succeeds, attempts run out, or `signal` fires.
///
/// An attempt that loses its timeout race, or that is in flight when the
/// signal fires, is dropped; its eventual result can never be observed.
pub async fn retry<T, E, F, Fut>(
    mut operation: F,
    options: RetryOptions<T, E>,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + Send + 'static,
{
    let attempts = run_attempts(&mut operation, &options);

    match options.signal.clone() {
        Some(signal) => {
            tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    tracing::warn!("retry aborted by signal");
                    Err(RetryError::Aborted)
                }
                outcome = attempts => outcome,
            }
        }
        None => attempts.await,
    }
}

async fn run_attempts<T, E, F, Fut>(
    operation: &mut F,
    options: &RetryOptions<T, E>,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + Send + 'static,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if attempt > options.max_tries {
            tracing::warn!(max_tries = options.max_tries, "retry attempts exhausted");
            return Err(RetryError::MaxRetriesReached);
        }

        let failure = match tokio::time::timeout(options.timeout.at(attempt), operation()).await {
            Err(_) => AttemptFailure::Retry(RetryError::TimeoutReached),
            Ok(Err(err)) => AttemptFailure::Rejected(err),
            Ok(Ok(value)) => {
                let accepted = match &options.predicate {
                    Some(predicate) => predicate(&value).await,
                    None => true,
                };
                if accepted {
                    return Ok(value);
                }
                AttemptFailure::Retry(RetryError::PredicateFailed)
            }
        };

        tracing::debug!(
            attempt,
            max_tries = options.max_tries,
            failure = ?failure,
            "retry attempt failed"
        );

        if let Some(hook) = &options.on_attempt_failed {
            let hook = Arc::clone(hook);
            tokio::spawn(async move { hook(failure, attempt) });
        }

        let delay = options.delay.at(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        // Let other pending tasks run before the next attempt.
        tokio::task::yield_now().await;
    }
}
