//! Error and diagnostic types for STEP model operations.

use ifcstep_schema::SchemaError;
use thiserror::Error;

use crate::value::EntityId;

/// Errors that can occur while reading, editing or writing a STEP model.
#[derive(Error, Debug)]
pub enum StepError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be lexed (unbalanced parentheses, open quote, bad token).
    #[error("Malformed record{}: {message}", id.map(|id| format!(" #{}", id)).unwrap_or_default())]
    MalformedRecord {
        /// Entity id of the record, if it could be read.
        id: Option<EntityId>,
        /// Error message.
        message: String,
    },

    /// A record's argument count differs from the schema's slot count.
    #[error("Wrong parameter count for entity {type_name}, expecting {expected}, having {actual}. Object id: {id}")]
    ArgumentCountMismatch {
        /// Entity id.
        id: EntityId,
        /// Entity type keyword.
        type_name: String,
        /// Number of slots declared by the schema.
        expected: usize,
        /// Number of arguments found.
        actual: usize,
    },

    /// A reference names an id that does not exist in the model.
    #[error("Unresolved reference #{target} in entity #{id}")]
    UnresolvedReference {
        /// Entity holding the reference.
        id: EntityId,
        /// Referenced id.
        target: EntityId,
    },

    /// A value or referenced entity does not match the declared attribute type.
    #[error("Type mismatch at #{id}.{attribute}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Entity holding the attribute.
        id: EntityId,
        /// Attribute name.
        attribute: String,
        /// Declared type.
        expected: String,
        /// What was found.
        actual: String,
    },

    /// A second record used an id that is already registered.
    #[error("Duplicate entity id #{0}")]
    DuplicateIdentifier(EntityId),

    /// A record names an entity type the schema does not know.
    #[error("Unknown entity type {type_name} for #{id}")]
    UnknownEntityType {
        /// Entity id.
        id: EntityId,
        /// Keyword found in the record.
        type_name: String,
    },

    /// An abstract entity type cannot be instantiated.
    #[error("Entity type {type_name} is abstract (#{id})")]
    AbstractEntityType {
        /// Entity id.
        id: EntityId,
        /// Abstract type name.
        type_name: String,
    },

    /// A value is well-formed but not acceptable for its attribute.
    #[error("Invalid value for #{id}.{attribute}: {message}")]
    InvalidValue {
        /// Entity holding the attribute.
        id: EntityId,
        /// Attribute name.
        attribute: String,
        /// Error message.
        message: String,
    },

    /// The file declares a schema other than the loaded one.
    #[error("File schema {found} does not match {expected}")]
    SchemaMismatch {
        /// Name of the loaded schema.
        expected: String,
        /// Schema identifiers found in the header.
        found: String,
    },

    /// Record boundaries cannot be found; the whole load fails.
    #[error("Corrupt STEP stream at line {line}: {message}")]
    Stream {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },

    /// The entity id is not in the model.
    #[error("Missing entity #{0}")]
    MissingEntity(EntityId),

    /// The entity handle refers to a removed entity.
    #[error("Entity handle is no longer valid")]
    StaleHandle,

    /// The entity failed to decode and only holds its raw arguments.
    #[error("Entity #{0} is incomplete")]
    IncompleteEntity(EntityId),

    /// Invalid reader, writer or copy options.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Schema error.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl StepError {
    /// Create a malformed-record error.
    pub fn malformed(id: Option<EntityId>, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id,
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(
        id: EntityId,
        attribute: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            id,
            attribute: attribute.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(
        id: EntityId,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            id,
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Create a stream corruption error.
    pub fn stream(line: usize, message: impl Into<String>) -> Self {
        Self::Stream {
            line,
            message: message.into(),
        }
    }

    /// Severity this error carries when reported as a diagnostic.
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnresolvedReference { .. } | Self::SchemaMismatch { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Error produced while decoding or checking a single attribute value.
///
/// Carries no entity context; [`ValueError::at`] attaches it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The argument text is not a well-formed value.
    #[error("{0}")]
    Malformed(String),

    /// The value's variant does not match the declared type.
    #[error("expected {expected}, got {actual}")]
    Mismatch {
        /// Declared type.
        expected: String,
        /// What was found.
        actual: String,
    },

    /// The value has the right shape but is not acceptable.
    #[error("{0}")]
    Invalid(String),
}

impl ValueError {
    /// Attach entity and attribute context.
    pub fn at(self, id: EntityId, attribute: &str) -> StepError {
        match self {
            Self::Malformed(message) => {
                StepError::malformed(Some(id), format!("{}: {}", attribute, message))
            }
            Self::Mismatch { expected, actual } => {
                StepError::type_mismatch(id, attribute, expected, actual)
            }
            Self::Invalid(message) => StepError::invalid_value(id, attribute, message),
        }
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The model is complete; something looked off.
    Warning,
    /// Part of the input was dropped or left incomplete.
    Error,
}

/// A per-record problem collected during a load or a model pass.
#[derive(Debug)]
pub struct Diagnostic {
    /// Entity the problem is attached to, if known.
    pub entity: Option<EntityId>,
    /// Source line of the record, if known.
    pub line: Option<usize>,
    /// Severity.
    pub severity: Severity,
    /// The underlying error.
    pub error: StepError,
}

impl Diagnostic {
    /// Wrap an error, deriving its severity.
    pub fn new(entity: Option<EntityId>, line: Option<usize>, error: StepError) -> Self {
        Self {
            entity,
            line,
            severity: error.severity(),
            error,
        }
    }

    /// Whether this diagnostic is error-severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", level, line, self.error),
            None => write!(f, "{}: {}", level, self.error),
        }
    }
}

/// Result type for STEP model operations.
pub type Result<T> = std::result::Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_count_message() {
        let err = StepError::ArgumentCountMismatch {
            id: 12,
            type_name: "IFCMONETARYUNIT".into(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Wrong parameter count for entity IFCMONETARYUNIT, expecting 1, having 2. Object id: 12"
        );
    }

    #[test]
    fn test_severity() {
        let warning = StepError::UnresolvedReference { id: 1, target: 2 };
        assert_eq!(warning.severity(), Severity::Warning);
        assert_eq!(StepError::DuplicateIdentifier(3).severity(), Severity::Error);

        let diag = Diagnostic::new(Some(1), Some(7), warning);
        assert!(!diag.is_error());
        assert_eq!(
            diag.to_string(),
            "warning (line 7): Unresolved reference #2 in entity #1"
        );
    }

    #[test]
    fn test_value_error_context() {
        let err = ValueError::Mismatch {
            expected: "REAL".into(),
            actual: "string".into(),
        }
        .at(5, "Scale");
        assert!(matches!(err, StepError::TypeMismatch { id: 5, .. }));
        assert_eq!(
            ValueError::Malformed("open quote".into()).at(5, "Name").to_string(),
            "Malformed record #5: Name: open quote"
        );
    }
}
