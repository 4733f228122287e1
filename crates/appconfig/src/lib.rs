//! # appconfig
//!
//! Reads and writes settings in a key/label configuration store and expands
//! `{KEY}` / `{OUTER.KEY}` placeholders against it.
//!
//! ```
//! use std::sync::Arc;
//! use appconfig::{ConfigStore, MemoryStore, Resolver};
//!
//! let store = Arc::new(MemoryStore::with_entries(
//!     Some("infra"),
//!     [("AZURE_SUBSCRIPTION_ID", "sub-1"), ("FOO", r#"{"bar": "baz"}"#)],
//! ));
//! let resolver = Resolver::new(store as Arc<dyn ConfigStore>, Some("infra"));
//!
//! assert_eq!(resolver.resolve("/subscriptions/{AZURE_SUBSCRIPTION_ID}/rg")?, "/subscriptions/sub-1/rg");
//! assert_eq!(resolver.resolve("{FOO.bar}")?, "baz");
//! # Ok::<(), appconfig::Error>(())
//! ```

pub mod client;
pub mod error;
pub mod store;
pub mod template;

pub use client::{AppConfigClient, Cloud, endpoint_for};
pub use error::{Error, Result};
pub use store::{ConfigEntry, ConfigStore, MemoryStore};
pub use template::{Resolver, Template, Token};
