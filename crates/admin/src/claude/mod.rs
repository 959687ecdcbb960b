//! Anthropic Messages API integration.
//!
//! Used by the product generator. The base URL is configurable so tests can
//! point the client at a mock server.

mod client;
mod error;
pub mod types;

pub use client::ClaudeClient;
pub use error::ClaudeError;
pub use types::{ChatResponse, ContentBlock, Message};
