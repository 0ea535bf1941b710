//! Generic async retry with backoff and jitter.
//!
//! The executor is generic over the operation's error type; a [`RetryPolicy`]
//! decides per error whether another attempt is worthwhile. When attempts run
//! out the last error is handed back so callers can surface the real cause.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors produced by the retry executor.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the final error.
    #[error("all {attempts} retry attempts exhausted: {last:?}")]
    AttemptsExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error returned by the final attempt.
        last: E,
    },

    /// The policy declined to retry this error.
    #[error("operation failed with non-retryable error: {error:?}")]
    NonRetryable {
        /// The error the policy rejected.
        error: E,
    },

    /// The retry configuration is invalid.
    #[error("invalid retry configuration: {message}")]
    InvalidConfiguration {
        /// Description of the problem.
        message: String,
    },
}

impl<E> RetryError<E> {
    /// The underlying operation error, if there was one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { last, .. } => Some(last),
            Self::NonRetryable { error } => Some(error),
            Self::InvalidConfiguration { .. } => None,
        }
    }
}

/// Result type for retry operations.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Decides whether an error should be retried.
pub trait RetryPolicy<E> {
    /// `attempt` is zero-based.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

impl<E, F> RetryPolicy<E> for F
where
    F: Fn(&E, u32) -> RetryDecision,
{
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
        self(error, attempt)
    }
}

/// Outcome of a [`RetryPolicy`] check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff.
    Retry,
    /// Give up.
    Stop,
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Same delay every time.
    Fixed(Duration),
    /// `initial_delay * base^attempt`, capped at `max_delay`.
    Exponential {
        /// Delay before the second attempt.
        initial_delay: Duration,
        /// Growth factor.
        base: f64,
        /// Upper bound on any single delay.
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Delay to wait after the zero-based `attempt` failed.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let delay = initial_delay.as_millis() as f64 * base.powi(exponent);
                let delay_ms = delay.min(max_delay.as_millis() as f64) as u64;
                Duration::from_millis(delay_ms)
            }
        }
    }
}

/// Randomisation applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Use the delay as is.
    None,
    /// Uniform in `0..=delay`.
    Full,
    /// Uniform in `delay/2..=delay`.
    Equal,
}

impl Jitter {
    /// Apply jitter to `delay`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        if millis == 0 {
            return delay;
        }
        let mut rng = rand::thread_rng();
        match self {
            Self::None => delay,
            Self::Full => Duration::from_millis(rng.gen_range(0..=millis)),
            Self::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rng.gen_range(0..=millis - half))
            }
        }
    }
}

/// Retry behaviour.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay schedule.
    pub backoff: BackoffStrategy,
    /// Delay randomisation.
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_millis(100),
                base: 2.0,
                max_delay: Duration::from_secs(5),
            },
            jitter: Jitter::Equal,
        }
    }
}

impl RetryConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate<E>(&self) -> Result<(), RetryError<E>> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfiguration {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        if let BackoffStrategy::Exponential { base, .. } = &self.backoff {
            if *base <= 0.0 {
                return Err(RetryError::InvalidConfiguration {
                    message: "exponential base must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`RetryConfig`].
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    /// Total attempts including the first.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Fixed delay between attempts.
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    /// Exponential delay between attempts.
    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    /// Disable jitter.
    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    /// Full jitter.
    pub fn full_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Full;
        self
    }

    /// Validate and build.
    pub fn build<E>(self) -> Result<RetryConfig, RetryError<E>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs an async operation until it succeeds, the policy stops, or attempts
/// run out.
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Executor with the given configuration and policy.
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute `operation` with retries.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.config.validate()?;

        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt + 1 >= self.config.max_attempts {
                        warn!(attempts = attempt + 1, ?error, "retry attempts exhausted");
                        return Err(RetryError::AttemptsExhausted {
                            attempts: attempt + 1,
                            last: error,
                        });
                    }

                    let delay = match self.policy.should_retry(&error, attempt) {
                        RetryDecision::Stop => {
                            debug!(?error, "retry policy declined");
                            return Err(RetryError::NonRetryable { error });
                        }
                        RetryDecision::Retry => {
                            self.config.jitter.apply(self.config.backoff.calculate_delay(attempt))
                        }
                    };

                    warn!(attempt = attempt + 1, ?delay, ?error, "operation failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
