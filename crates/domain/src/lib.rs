//! # ShelfSync Domain
//!
//! Business domain types for the Takealot marketplace sync engine.
//!
//! This crate contains:
//! - Catalogue, integration, proxy and sync-run types
//! - The `TakealotApiResponse` envelope returned by every marketplace-facing
//!   operation
//! - Domain error type and Result alias
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other ShelfSync crates
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
