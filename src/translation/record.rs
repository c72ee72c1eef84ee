/*!
 * Translation records: one language-specific row of fields.
 *
 * A record keeps a snapshot of its values as they were when it was loaded or
 * last saved. Comparing against that snapshot is what decides whether the
 * record needs to be written at all.
 */

use std::collections::BTreeMap;

use crate::database::models::{NewTranslationRow, TranslationRow};
use crate::errors::TranslationError;
use crate::translation::schema::{LevelId, SchemaLevel};

/// Field name to value, ordered by name
pub type FieldValues = BTreeMap<String, serde_json::Value>;

/// One translation of a shared record at one schema level
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRecord {
    id: Option<i64>,
    master_id: Option<i64>,
    language_code: String,
    level: LevelId,
    values: FieldValues,
    original: FieldValues,
}

impl TranslationRecord {
    /// A new, unsaved translation with every field set to null
    pub fn new_unsaved(level: &SchemaLevel, master_id: Option<i64>, language_code: &str) -> Self {
        let values: FieldValues = level
            .fields()
            .iter()
            .map(|f| (f.clone(), serde_json::Value::Null))
            .collect();
        Self {
            id: None,
            master_id,
            language_code: language_code.to_string(),
            level: level.id(),
            original: values.clone(),
            values,
        }
    }

    /// A translation loaded from storage
    pub fn from_row(level: &SchemaLevel, row: TranslationRow) -> Self {
        Self::loaded(level, row.id, row.master_id, row.language_code, row.fields)
    }

    /// A translation materialized from an external cache entry
    pub fn from_cached(
        level: &SchemaLevel,
        id: i64,
        master_id: i64,
        language_code: &str,
        fields: FieldValues,
    ) -> Self {
        Self::loaded(level, id, master_id, language_code.to_string(), fields)
    }

    fn loaded(
        level: &SchemaLevel,
        id: i64,
        master_id: i64,
        language_code: String,
        mut fields: FieldValues,
    ) -> Self {
        // Only the level's own fields; missing columns read as null
        fields.retain(|name, _| level.has_field(name));
        for name in level.fields() {
            fields.entry(name.clone()).or_insert(serde_json::Value::Null);
        }
        Self {
            id: Some(id),
            master_id: Some(master_id),
            language_code,
            level: level.id(),
            original: fields.clone(),
            values: fields,
        }
    }

    /// Storage identity, once persisted
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Owning shared record identity
    pub fn master_id(&self) -> Option<i64> {
        self.master_id
    }

    /// Language code of this translation
    pub fn language_code(&self) -> &str {
        &self.language_code
    }

    /// Level this translation belongs to
    pub fn level(&self) -> LevelId {
        self.level
    }

    /// Current field values
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Current value of a field
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.values.get(field)
    }

    /// Assign a field owned by this translation's level
    pub fn set(&mut self, field: &str, value: serde_json::Value) -> Result<(), TranslationError> {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(TranslationError::UnknownField {
                field: field.to_string(),
            }),
        }
    }

    /// Whether the translation has a storage identity
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Whether any value differs from the snapshot
    pub fn is_modified(&self) -> bool {
        self.values != self.original
    }

    /// Fields whose value differs from the snapshot
    pub fn changed_fields(&self) -> FieldValues {
        self.values
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub(crate) fn set_master_id(&mut self, master_id: i64) {
        self.master_id = Some(master_id);
    }

    /// Record a successful persist: take the identity and refresh the snapshot
    pub(crate) fn mark_saved(&mut self, id: i64) {
        self.id = Some(id);
        self.original = self.values.clone();
    }

    /// Row for an insert; `None` while the master has no identity
    pub(crate) fn to_new_row(&self) -> Option<NewTranslationRow> {
        Some(NewTranslationRow {
            master_id: self.master_id?,
            language_code: self.language_code.clone(),
            fields: self.values.clone(),
        })
    }
}
