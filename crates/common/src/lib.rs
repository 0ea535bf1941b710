//! Common utilities shared across ShelfSync crates.
//!
//! # Feature Tiers
//!
//! - `runtime` (default): async retry executor backed by tokio timers.
//!
//! The clock abstraction is always available so that pure crates (`core`)
//! can evaluate time-based state without pulling in a runtime.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

pub use resilience::{Clock, MockClock, SystemClock};
