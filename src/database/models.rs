/*!
 * Database entity models.
 *
 * These structures map directly to the shared table and the per-level
 * translation tables. Field values are kept as JSON values so one row type
 * serves every record type.
 */

use serde::{Deserialize, Serialize};

use crate::translation::record::FieldValues;

/// A row of a record type's shared table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRow {
    /// Primary key
    pub id: i64,
    /// Shared (untranslated) field values
    pub data: FieldValues,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// A persisted row of a level table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRow {
    /// Primary key
    pub id: i64,
    /// Owning shared record
    pub master_id: i64,
    /// Normalized language code
    pub language_code: String,
    /// Values of the level's translated fields
    pub fields: FieldValues,
}

/// A level row that has not been inserted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranslationRow {
    /// Owning shared record
    pub master_id: i64,
    /// Normalized language code
    pub language_code: String,
    /// Values of the level's translated fields
    pub fields: FieldValues,
}

impl NewTranslationRow {
    /// Attach the identity assigned by the store
    pub fn into_row(self, id: i64) -> TranslationRow {
        TranslationRow {
            id,
            master_id: self.master_id,
            language_code: self.language_code,
            fields: self.fields,
        }
    }
}
