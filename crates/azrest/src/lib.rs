//! # azrest
//!
//! Blocking REST plumbing for Azure management (ARM) and data-plane APIs.
//!
//! - [`Transport`]: sends requests ([`UreqTransport`] in production,
//!   [`MemoryTransport`] in tests)
//! - [`TokenProvider`]: opaque source of bearer tokens
//! - [`ApiClient`]: the apply engine, with upsert and replace semantics
//! - [`SettleConfig`]: how long to wait for a delete before recreating
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use azrest::{ApiClient, SettleConfig, StaticToken, UreqTransport, scopes};
//! use serde_json::json;
//!
//! let client = ApiClient::new(
//!     Arc::new(UreqTransport::new()),
//!     Arc::new(StaticToken::new("token")),
//!     "https://my-search.search.windows.net",
//!     "2024-07-01",
//!     scopes::SEARCH,
//! );
//!
//! let body = json!({"name": "docs", "fields": []});
//! client.replace("indexes", "docs", &body, &SettleConfig::default())?;
//! # Ok::<(), azrest::Error>(())
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod memory;
pub mod settle;
pub mod transport;

pub use auth::{CachedTokens, StaticToken, TokenProvider, scopes};
pub use client::{ApiClient, Replaced, StatusOutcome};
pub use error::{Error, ErrorCategory, Result};
pub use memory::MemoryTransport;
pub use settle::{SettleConfig, SettleMode};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, UreqTransport};
