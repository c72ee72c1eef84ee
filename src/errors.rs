/*!
 * Error types for the polyglot crate.
 *
 * This module contains custom error types for the different layers of the
 * crate, using the thiserror crate for ergonomic error definitions:
 * - `TranslationError`: everything the resolution and save paths report
 * - `StorageError`: failures reported by a `TranslationStore`
 * - `CacheError`: failures reported by a cache backend (never escapes the engine)
 * - `SchemaError`: invalid schema registrations
 * - `AppError`: configuration and CLI level failures
 */

use thiserror::Error;

/// Errors reported by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// The `(master_id, language_code)` uniqueness constraint of a level table was violated
    #[error("Uniqueness constraint violated on {table}: {message}")]
    UniqueViolation {
        /// Table on which the constraint fired
        table: String,
        /// Backend message
        message: String,
    },

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StorageError {
    fn from(error: anyhow::Error) -> Self {
        Self::Backend(format!("{:#}", error))
    }
}

/// Errors reported by a cache backend
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend could not be reached or refused the operation
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// A stored payload could not be decoded
    #[error("Invalid cache payload: {0}")]
    Payload(String),
}

/// Errors raised while building a translation schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A schema needs at least one level
    #[error("Record type '{0}' has no translation levels")]
    NoLevels(String),

    /// A field name is claimed by two levels
    #[error("Field '{field}' is declared by both '{first}' and '{second}'")]
    DuplicateField {
        /// The duplicated field
        field: String,
        /// Level that declared it first
        first: String,
        /// Level that declared it again
        second: String,
    },

    /// Two levels share a table
    #[error("Table '{0}' is used by more than one level")]
    DuplicateTable(String),

    /// A field uses a column name reserved for bookkeeping
    #[error("Field name '{0}' is reserved")]
    ReservedField(String),

    /// A table or field name is not a plain SQL identifier
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// A level id that the schema does not have
    #[error("Record type '{record_type}' has no level {index}")]
    UnknownLevel {
        /// Record type name
        record_type: String,
        /// Requested level position
        index: usize,
    },
}

/// Errors that can occur while resolving or saving translations
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The requested language is not translated, and the fallback (if any) is not either
    #[error(
        "{record_type} #{} does not have a translation for language '{language}'{}",
        master_id.map(|id| id.to_string()).unwrap_or_else(|| "(unsaved)".to_string()),
        fallback.as_ref().map(|f| format!(" (tried fallback '{}')", f)).unwrap_or_default()
    )]
    NoTranslation {
        /// Record type name
        record_type: String,
        /// Master identity, if persisted
        master_id: Option<i64>,
        /// Requested language
        language: String,
        /// Fallback language that was attempted, if any
        fallback: Option<String>,
    },

    /// `create_translation` was called for a language that is already present
    #[error("Translation for language '{language}' already exists in level '{level}'")]
    AlreadyExists {
        /// Language code
        language: String,
        /// Related name of the level
        level: String,
    },

    /// A translation was saved before its master had an identity
    #[error("Cannot save translations of an unsaved {record_type}")]
    MasterNotPersisted {
        /// Record type name
        record_type: String,
    },

    /// No level owns the field
    #[error("Unknown translated field: '{field}'")]
    UnknownField {
        /// Field name
        field: String,
    },

    /// A concurrent writer created the same translation first
    #[error("Translation for master #{master_id}, language '{language}' already exists in {table}")]
    UniquenessConflict {
        /// Level table
        table: String,
        /// Master identity
        master_id: i64,
        /// Language code
        language: String,
    },

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Schema failure
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl TranslationError {
    /// Whether this is the recoverable "no translation" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoTranslation { .. })
    }

    /// Whether a retry with a fresh read may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UniquenessConflict { .. })
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from translation handling
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<SchemaError> for AppError {
    fn from(error: SchemaError) -> Self {
        Self::Config(error.to_string())
    }
}
