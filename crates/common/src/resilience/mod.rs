//! Resilience primitives for talking to unreliable upstreams.
//!
//! - **Clock**: monotonic + wall-clock time behind a trait so cool-downs and
//!   deadlines can be tested deterministically with [`MockClock`].
//! - **Retry**: async retry executor with exponential backoff and jitter,
//!   driven by a caller-supplied [`RetryPolicy`].

pub mod clock;
#[cfg(feature = "runtime")]
pub mod retry;

pub use clock::{Clock, MockClock, SystemClock};
#[cfg(feature = "runtime")]
pub use retry::{
    BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, RetryResult,
};
