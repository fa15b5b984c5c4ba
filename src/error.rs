//! Structured error types for remote store calls and collection operations.

use serde::Serialize;
use std::fmt;

/// Failure reported by a [`RemoteStore`](crate::store::RemoteStore) call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The request never produced a response (connection refused, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with an error descriptor (constraint, missing column, bad value).
    #[error("{message}")]
    Rejected {
        message: String,
        code: Option<String>,
        details: Option<String>,
    },

    /// No row matched the given identifier.
    #[error("{table} row not found: {id}")]
    NotFound { table: String, id: String },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn rejected(message: impl Into<String>) -> Self {
        StoreError::Rejected {
            message: message.into(),
            code: None,
            details: None,
        }
    }

    /// Whether the store complained about a column that is not in its schema.
    pub fn is_missing_column(&self) -> bool {
        match self {
            StoreError::Rejected { message, .. } => {
                message.contains("column") && message.contains("does not exist")
            }
            _ => false,
        }
    }
}

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    EntityNotFound,

    // Remote errors
    SchemaMismatch,
    RemoteRejected,
    Transport,

    // Boundary errors
    InvalidRow,
    Internal,
}

/// Structured error surfaced by collections and the dashboard API.
///
/// Cloneable so the last fetch failure can be kept in collection state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl SyncError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn not_found(table: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} row not found: {}", table, id),
        )
    }

    pub fn invalid_row(table: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRow,
            format!("Malformed {} row: {}", table, reason),
        )
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Internal, err.to_string())
    }

    /// Map a store failure, substituting `fallback` when the store gave no message.
    pub fn from_store(err: &StoreError, fallback: &str) -> Self {
        match err {
            StoreError::Transport(msg) => {
                Self::new(ErrorCode::Transport, non_empty_or(msg, fallback))
            }
            StoreError::Rejected {
                message, details, ..
            } => {
                let mut e = Self::new(ErrorCode::RemoteRejected, non_empty_or(message, fallback));
                e.details = details.clone();
                e
            }
            StoreError::NotFound { table, id } => Self::not_found(table, id),
            StoreError::Decode(msg) => Self::new(ErrorCode::Internal, non_empty_or(msg, fallback)),
        }
    }

    /// The store rejected a write because a column is missing from its schema.
    pub fn schema_mismatch(table: &str, err: &StoreError) -> Self {
        Self::new(
            ErrorCode::SchemaMismatch,
            format!(
                "Database columns missing on '{}'. Apply the pending schema migration to the remote store.",
                table
            ),
        )
        .with_details(err.to_string())
    }
}

fn non_empty_or(msg: &str, fallback: &str) -> String {
    if msg.trim().is_empty() {
        fallback.to_string()
    } else {
        msg.to_string()
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyncError {}

/// Result type for collection operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
