/*!
 * Translation schema: which fields are translated, and where they live.
 *
 * A record type owns one or more levels. Each level is one translation table
 * holding a disjoint set of translated fields; the first level is the root,
 * every following level extends the one before it. Levels are always
 * processed in declaration order, so an extending level is handled after its
 * base.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::errors::{SchemaError, TranslationError};
use crate::translation::record::FieldValues;

/// Column names every level table uses for bookkeeping
const RESERVED_FIELDS: &[&str] = &["id", "master_id", "language_code"];

/// Plain SQL identifiers only; table and field names are interpolated into DDL
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Position of a level within its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LevelId(pub usize);

impl LevelId {
    /// The root level of every schema
    pub const ROOT: LevelId = LevelId(0);

    /// Index into per-level storage
    pub fn index(self) -> usize {
        self.0
    }
}

/// One translation table of a record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLevel {
    id: LevelId,
    related_name: String,
    table: String,
    fields: Vec<String>,
    base: Option<LevelId>,
    identity: String,
}

impl SchemaLevel {
    /// Position in the schema
    pub fn id(&self) -> LevelId {
        self.id
    }

    /// Relation name from the shared record to this level's rows
    pub fn related_name(&self) -> &str {
        &self.related_name
    }

    /// Table holding this level's rows
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Translated fields owned by this level, in declaration order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether the field belongs to this level
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// A level without fields only tracks which languages exist
    pub fn is_marker_only(&self) -> bool {
        self.fields.is_empty()
    }

    /// The level this one extends
    pub fn base(&self) -> Option<LevelId> {
        self.base
    }

    /// Stable identity used in cache keys: `<record_type>.<table>`
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Immutable description of a record type's translated fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationSchema {
    record_type: String,
    shared_table: String,
    levels: Vec<SchemaLevel>,
    field_index: HashMap<String, LevelId>,
}

impl TranslationSchema {
    /// Start building a schema for a record type stored in `shared_table`
    pub fn builder(record_type: &str, shared_table: &str) -> SchemaBuilder {
        SchemaBuilder {
            record_type: record_type.to_string(),
            shared_table: shared_table.to_string(),
            levels: Vec::new(),
        }
    }

    /// Record type name
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Table holding the shared part of the record
    pub fn shared_table(&self) -> &str {
        &self.shared_table
    }

    /// All levels, root first
    pub fn levels(&self) -> &[SchemaLevel] {
        &self.levels
    }

    /// A level by id
    ///
    /// # Panics
    /// When `id` does not come from this schema.
    pub fn level(&self, id: LevelId) -> &SchemaLevel {
        &self.levels[id.index()]
    }

    /// A level by id, failing for ids this schema does not have
    pub fn try_level(&self, id: LevelId) -> Result<&SchemaLevel, SchemaError> {
        self.levels.get(id.index()).ok_or_else(|| SchemaError::UnknownLevel {
            record_type: self.record_type.clone(),
            index: id.index(),
        })
    }

    /// The root level
    pub fn root(&self) -> &SchemaLevel {
        &self.levels[0]
    }

    /// Find a level by its relation name
    pub fn level_by_related_name(&self, related_name: &str) -> Option<&SchemaLevel> {
        self.levels.iter().find(|l| l.related_name == related_name)
    }

    /// The level owning a translated field
    pub fn level_for_field(&self, name: &str) -> Result<&SchemaLevel, TranslationError> {
        self.field_index
            .get(name)
            .map(|id| self.level(*id))
            .ok_or_else(|| TranslationError::UnknownField {
                field: name.to_string(),
            })
    }

    /// Whether any level owns the field
    pub fn is_translated_field(&self, name: &str) -> bool {
        self.field_index.contains_key(name)
    }

    /// All translated field names, level by level
    pub fn all_fields(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().flat_map(|l| l.fields.iter().map(String::as_str))
    }

    /// Partition a field map across levels, in level order
    ///
    /// Names that no level owns are dropped silently; levels that receive no
    /// field are left out.
    pub fn split(&self, fields: &FieldValues) -> Vec<(LevelId, FieldValues)> {
        let mut parts: Vec<FieldValues> = vec![FieldValues::new(); self.levels.len()];
        for (name, value) in fields {
            if let Some(id) = self.field_index.get(name) {
                parts[id.index()].insert(name.clone(), value.clone());
            }
        }
        parts
            .into_iter()
            .enumerate()
            .filter(|(_, part)| !part.is_empty())
            .map(|(index, part)| (LevelId(index), part))
            .collect()
    }
}

/// Builder for `TranslationSchema`, validated on `build`
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    record_type: String,
    shared_table: String,
    levels: Vec<(String, String, Vec<String>)>,
}

impl SchemaBuilder {
    /// Add a level stored in `<shared_table>_<related_name>`
    pub fn level(self, related_name: &str, fields: &[&str]) -> Self {
        let table = format!("{}_{}", self.shared_table, related_name);
        self.level_with_table(related_name, &table, fields)
    }

    /// Add a level stored in an explicit table
    pub fn level_with_table(mut self, related_name: &str, table: &str, fields: &[&str]) -> Self {
        self.levels.push((
            related_name.to_string(),
            table.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        ));
        self
    }

    /// Validate and build the schema
    pub fn build(self) -> Result<TranslationSchema, SchemaError> {
        if self.levels.is_empty() {
            return Err(SchemaError::NoLevels(self.record_type));
        }
        for name in [&self.record_type, &self.shared_table] {
            check_identifier(name)?;
        }

        let mut tables = HashSet::from([self.shared_table.clone()]);
        let mut owners: HashMap<String, (LevelId, String)> = HashMap::new();
        let mut levels = Vec::with_capacity(self.levels.len());

        for (index, (related_name, table, fields)) in self.levels.into_iter().enumerate() {
            let id = LevelId(index);
            check_identifier(&related_name)?;
            check_identifier(&table)?;
            if !tables.insert(table.clone()) {
                return Err(SchemaError::DuplicateTable(table));
            }

            for field in &fields {
                check_identifier(field)?;
                if RESERVED_FIELDS.contains(&field.as_str()) {
                    return Err(SchemaError::ReservedField(field.clone()));
                }
                if let Some((_, first)) = owners.get(field) {
                    return Err(SchemaError::DuplicateField {
                        field: field.clone(),
                        first: first.clone(),
                        second: related_name.clone(),
                    });
                }
                owners.insert(field.clone(), (id, related_name.clone()));
            }

            levels.push(SchemaLevel {
                id,
                identity: format!("{}.{}", self.record_type, table),
                related_name,
                table,
                fields,
                base: index.checked_sub(1).map(LevelId),
            });
        }

        let field_index = owners.into_iter().map(|(field, (id, _))| (field, id)).collect();

        Ok(TranslationSchema {
            record_type: self.record_type,
            shared_table: self.shared_table,
            levels,
            field_index,
        })
    }
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}
