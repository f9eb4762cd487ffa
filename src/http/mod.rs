//! HTTP client layer: `WireClient`, one attempt per request.

pub mod client;

pub use client::{WireClient, WireResponse};
