//! Error types for schema loading and compilation.

use thiserror::Error;

/// Errors that can occur while loading or compiling a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema document could not be deserialized.
    #[error("Schema parse error: {0}")]
    Parse(String),

    /// Two types share a name (names are compared case-insensitively).
    #[error("Duplicate type name: {0}")]
    DuplicateType(String),

    /// A type expression, supertype or select member names a type that does not exist.
    #[error("Unknown type '{name}' referenced by {context}")]
    UnknownType {
        /// The name that failed to resolve.
        name: String,
        /// The type or attribute that referenced it.
        context: String,
    },

    /// The supertype chain of an entity loops back on itself.
    #[error("Supertype cycle through entity {0}")]
    SupertypeCycle(String),

    /// A defined type is (transitively) defined in terms of itself.
    #[error("Defined type cycle through {0}")]
    DefinedTypeCycle(String),

    /// An attribute name used by a `derived` or inverse declaration does not exist.
    #[error("Entity {entity} has no attribute {attribute}")]
    UnknownAttribute {
        /// Entity type that was searched.
        entity: String,
        /// Attribute name that was not found.
        attribute: String,
    },

    /// An inverse declaration is not backed by an entity-valued attribute.
    #[error("Invalid inverse {entity}.{inverse}: {message}")]
    InvalidInverse {
        /// Entity type declaring the inverse.
        entity: String,
        /// Inverse attribute name.
        inverse: String,
        /// What is wrong with it.
        message: String,
    },

    /// A type expression could not be parsed.
    #[error("Invalid type expression '{text}': {message}")]
    InvalidTypeExpr {
        /// The offending expression.
        text: String,
        /// Error message.
        message: String,
    },
}

impl SchemaError {
    /// Create an unknown-type error.
    pub fn unknown_type(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownType {
            name: name.into(),
            context: context.into(),
        }
    }

    /// Create an unknown-attribute error.
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an invalid-inverse error.
    pub fn invalid_inverse(
        entity: impl Into<String>,
        inverse: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidInverse {
            entity: entity.into(),
            inverse: inverse.into(),
            message: message.into(),
        }
    }

    /// Create an invalid type expression error.
    pub fn type_expr(text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTypeExpr {
            text: text.into(),
            message: message.into(),
        }
    }
}
