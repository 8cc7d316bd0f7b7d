//! Error types for ID parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing, validating, or generating IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The ID string is empty.
    #[error("identifier may not be empty")]
    Empty,

    /// The identifier has characters outside `[a-zA-Z0-9.-]` or a bad length.
    #[error("identifier '{0}' must be 4 to 24 characters of [a-zA-Z0-9.-]")]
    InvalidIdentifier(String),

    /// The prefix leaves no room for the random part of an identifier.
    #[error("identifier prefix '{prefix}' is too long (at most {max} characters)")]
    PrefixTooLong { prefix: String, max: usize },

    /// The prefix itself contains characters an identifier may not hold.
    #[error("identifier prefix '{0}' may only contain [a-zA-Z0-9.-]")]
    InvalidPrefix(String),

    /// The typed ID has an unexpected prefix.
    #[error("invalid ID prefix: expected '{expected}', got '{actual}'")]
    WrongTypePrefix {
        expected: &'static str,
        actual: String,
    },

    /// The typed ID is missing the underscore separator.
    #[error("ID missing underscore separator")]
    MissingSeparator,

    /// The ULID portion of a typed ID is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if this error comes from a prefix problem.
    pub fn is_prefix_error(&self) -> bool {
        matches!(
            self,
            IdError::PrefixTooLong { .. } | IdError::InvalidPrefix(_) | IdError::WrongTypePrefix { .. }
        )
    }
}
