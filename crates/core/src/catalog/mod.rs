//! Local catalogue document store.

pub mod ports;
