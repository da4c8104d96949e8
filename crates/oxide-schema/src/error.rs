//! Error types for schema synthesis, diffing and rendering.

/// Errors raised while building, comparing or rendering schemas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A logical or native type name is not known to the registry.
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// Entity metadata is malformed.
    #[error("Invalid entity '{entity}': {message}")]
    InvalidEntityClass {
        /// Entity (or table) name.
        entity: String,
        /// What is wrong with it.
        message: String,
    },

    /// A value failed validation for its logical type.
    #[error("Invalid value {value:?} for type '{type_name}': {message}")]
    InvalidValue {
        /// Logical type name.
        type_name: String,
        /// The offending input, rendered as text.
        value: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The target platform cannot express the requested change.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SchemaError {
    pub(crate) fn invalid_value(
        type_name: &str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            type_name: type_name.to_string(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_entity(entity: &str, message: impl Into<String>) -> Self {
        Self::InvalidEntityClass {
            entity: entity.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
