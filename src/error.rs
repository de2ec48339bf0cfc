//! Error types for a3s-alertlog

use thiserror::Error;

/// Errors that can occur while recording or reading alert log entries
#[derive(Debug, Error)]
pub enum AlertLogError {
    /// Malformed identifier or unsupported enum value
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Caller lacks a required role
    #[error("Permission denied: {0}")]
    Permission(String),

    /// No matching entry
    #[error("Log entry not found: {0}")]
    NotFound(String),

    /// A destination-registry or id→type lookup failed during subject resolution
    #[error("Lookup failed ({context}): {source}")]
    Lookup {
        context: String,
        #[source]
        source: Box<AlertLogError>,
    },

    /// Transport, transaction, or constraint failure from the provider
    #[error("Storage error during {operation}: {reason}")]
    Storage { operation: String, reason: String },

    /// A provider call exceeded the configured statement deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Metadata could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AlertLogError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Wrap any error as the cause of a failed lookup
    pub fn lookup(context: impl Into<String>, source: AlertLogError) -> Self {
        Self::Lookup {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission(_))
    }
}

/// Result type alias for alert log operations
pub type Result<T> = std::result::Result<T, AlertLogError>;

/// Strictly parse an externally supplied identifier
pub fn parse_uuid(field: &str, value: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value)
        .map_err(|e| AlertLogError::validation(field, format!("'{}' is not a valid UUID: {}", value, e)))
}
