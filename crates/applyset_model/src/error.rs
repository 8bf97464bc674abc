//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while reading or converting resources.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The value is not a JSON object.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// A field has an unexpected shape.
    #[error("invalid field {field}: {message}")]
    InvalidField {
        /// Dotted path of the field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A required field is absent.
    #[error("missing field {0}")]
    MissingField(String),

    /// Conversion between typed and wire representations failed.
    #[error("conversion error: {0}")]
    Conversion(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}
