//! Errors raised while turning declarative definitions into resource specs.

use thiserror::Error;

/// Error type for building and registering resources
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A category-specific required field is missing
    #[error("{name}: {message}")]
    Validation { name: String, message: String },

    /// No gateway subscription matched the requested display name
    #[error(
        "gateway subscription '{wanted}' not found on '{service}'; available: [{}]",
        .available.join(", ")
    )]
    GatewaySubscriptionNotFound {
        service: String,
        wanted: String,
        available: Vec<String>,
    },

    /// Malformed declarative file
    #[error("invalid definition file {path}: {message}")]
    Definition { path: String, message: String },

    #[error(transparent)]
    Config(#[from] appconfig::Error),

    #[error(transparent)]
    Remote(#[from] azrest::Error),
}

impl ProvisionError {
    pub fn validation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether the whole run must stop, as opposed to skipping one resource.
    ///
    /// Configuration and definition problems mean the input cannot be
    /// trusted. Validation and gateway lookups only affect their resource.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Definition { .. } => true,
            Self::Validation { .. } | Self::GatewaySubscriptionNotFound { .. } | Self::Remote(_) => {
                false
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
