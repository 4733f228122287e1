//! Error types for configuration lookups and template resolution

use thiserror::Error;

/// Errors that can occur while reading configuration or resolving templates
#[derive(Error, Debug)]
pub enum Error {
    /// Key absent from the store
    #[error("configuration key '{key}' not found{}", label_suffix(.label))]
    MissingKey { key: String, label: Option<String> },

    /// Key present but empty where a value is required
    #[error("configuration key '{key}' is empty{}", label_suffix(.label))]
    EmptyValue { key: String, label: Option<String> },

    /// A JSON blob setting does not parse
    #[error("configuration key '{key}' is not valid JSON: {source}")]
    InvalidJson {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A dotted lookup named an attribute the blob does not have
    #[error("JSON key '{key}' has no attribute '{attribute}'")]
    MissingAttribute { key: String, attribute: String },

    /// `{OUTER.INNER}` used inside a longer template
    #[error("attribute placeholder '{{{placeholder}}}' must be the whole template, found in '{template}'")]
    EmbeddedAttribute {
        placeholder: String,
        template: String,
    },

    /// The remote store failed
    #[error("configuration store error: {0}")]
    Store(#[from] azrest::Error),
}

fn label_suffix(label: &Option<String>) -> String {
    label
        .as_deref()
        .map(|l| format!(" (label '{l}')"))
        .unwrap_or_default()
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, Error>;
