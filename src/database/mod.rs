/*!
 * Database module for persistent storage of shared records and translations.
 *
 * `TranslationStore` is the storage contract the translation engine relies
 * on: keyed lookups, inserts, partial updates and
 * deletes, plus a uniqueness constraint on `(master_id, language_code)` per
 * level table whose violation is reported as `StorageError::UniqueViolation`.
 *
 * `Repository` implements the contract on SQLite.
 */

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::translation::record::FieldValues;
use crate::translation::schema::{SchemaLevel, TranslationSchema};

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{MasterRow, NewTranslationRow, TranslationRow};
pub use repository::Repository;

/// Storage collaborator of the translation engine
#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// The translation of a master in one language, if stored
    async fn find_one(
        &self,
        level: &SchemaLevel,
        master_id: i64,
        language: &str,
    ) -> Result<Option<TranslationRow>, StorageError>;

    /// Every translation of a master at one level, ordered by identity
    async fn find_many(&self, level: &SchemaLevel, master_id: i64) -> Result<Vec<TranslationRow>, StorageError>;

    /// Insert a translation and return it with its identity
    async fn insert(&self, level: &SchemaLevel, row: NewTranslationRow) -> Result<TranslationRow, StorageError>;

    /// Write the given fields of an existing translation
    async fn update(&self, level: &SchemaLevel, id: i64, changed: &FieldValues) -> Result<(), StorageError>;

    /// Delete a translation; `false` when no row had this identity
    async fn delete(&self, level: &SchemaLevel, id: i64) -> Result<bool, StorageError>;

    /// Distinct language codes stored for a master at one level
    async fn languages(&self, level: &SchemaLevel, master_id: i64) -> Result<Vec<String>, StorageError>;

    /// Insert a shared record
    async fn insert_master(&self, schema: &TranslationSchema, data: &FieldValues) -> Result<MasterRow, StorageError>;

    /// Load a shared record
    async fn find_master(&self, schema: &TranslationSchema, id: i64) -> Result<Option<MasterRow>, StorageError>;

    /// Replace the shared fields of a record
    async fn update_master(&self, schema: &TranslationSchema, id: i64, data: &FieldValues) -> Result<(), StorageError>;

    /// Delete a shared record; its translations go with it
    async fn delete_master(&self, schema: &TranslationSchema, id: i64) -> Result<bool, StorageError>;
}
