//! Takealot Seller API adapter

mod client;
mod dto;

pub use client::TakealotClient;
