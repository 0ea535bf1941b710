//! Per-integration credential store.

pub mod ports;
mod service;

pub use service::{CredentialStore, ResolvedCredential};
