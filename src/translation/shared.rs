/*!
 * Shared records: the language-independent side of a translated object.
 *
 * A `SharedRecord` holds the shared (untranslated) fields, the current
 * language and, per schema level, a local cache of the translations it has
 * looked at: either the translation itself (loaded or created in-process) or
 * a `Missing` marker for languages known to be untranslated. All reads and
 * writes of translated fields go through the resolution engine, which fills
 * that cache; `save` flushes it.
 *
 * A record is mutated through `&mut self`; share it between tasks only
 * behind your own lock.
 */

use log::{debug, info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::database::models::TranslationRow;
use crate::errors::TranslationError;
use crate::language_utils::normalize_language_code;
use crate::translation::context::TranslationContext;
use crate::translation::record::{FieldValues, TranslationRecord};
use crate::translation::save::{SaveReport, SaveState};
use crate::translation::schema::{LevelId, TranslationSchema};

/// Local cache entry for one language at one level
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    /// A loaded or in-process translation
    Present(TranslationRecord),
    /// Known to have no persisted translation
    Missing,
}

/// A record with translated fields
#[derive(Debug)]
pub struct SharedRecord {
    pub(super) schema: Arc<TranslationSchema>,
    pub(super) ctx: TranslationContext,
    pub(super) id: Option<i64>,
    pub(super) data: FieldValues,
    pub(super) data_original: FieldValues,
    pub(super) current_language: String,
    /// Per level, ordered by language code
    pub(super) local: Vec<BTreeMap<String, Slot>>,
    /// Per level, rows of an attached bulk pre-fetch
    pub(super) prefetch: Vec<Option<Vec<TranslationRow>>>,
    pub(super) state: SaveState,
}

impl SharedRecord {
    /// A new, unsaved record
    ///
    /// `language` becomes the current language; the registry default is used
    /// when it is `None`.
    pub fn new(schema: Arc<TranslationSchema>, ctx: TranslationContext, language: Option<&str>) -> Self {
        let current_language = language
            .map(normalize_language_code)
            .unwrap_or_else(|| ctx.languages.default_language().to_string());
        let levels = schema.levels().len();
        Self {
            schema,
            ctx,
            id: None,
            data: FieldValues::new(),
            data_original: FieldValues::new(),
            current_language,
            local: vec![BTreeMap::new(); levels],
            prefetch: vec![None; levels],
            state: SaveState::Unsaved,
        }
    }

    /// Load an existing record; `None` when no record has this id
    pub async fn load(
        schema: Arc<TranslationSchema>,
        ctx: TranslationContext,
        id: i64,
        language: Option<&str>,
    ) -> Result<Option<Self>, TranslationError> {
        let Some(row) = ctx.store.find_master(&schema, id).await? else {
            debug!("{} #{} not found", schema.record_type(), id);
            return Ok(None);
        };

        let mut record = Self::new(schema, ctx, language);
        record.id = Some(row.id);
        record.data_original = row.data.clone();
        record.data = row.data;
        record.state = SaveState::Saved;
        Ok(Some(record))
    }

    /// Storage identity, once saved
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// The schema of this record type
    pub fn schema(&self) -> &TranslationSchema {
        &self.schema
    }

    /// The collaborators this record resolves against
    pub fn context(&self) -> &TranslationContext {
        &self.ctx
    }

    /// Where the record is in its save cycle
    pub fn save_state(&self) -> SaveState {
        self.state
    }

    // =========================================================================
    // Shared fields
    // =========================================================================

    /// A shared (untranslated) field
    pub fn shared(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// All shared fields
    pub fn shared_fields(&self) -> &FieldValues {
        &self.data
    }

    /// Assign a shared field; written on the next `save`
    pub fn set_shared(&mut self, name: &str, value: Value) {
        self.data.insert(name.to_string(), value);
        self.state = SaveState::Unsaved;
    }

    // =========================================================================
    // Current language
    // =========================================================================

    /// The language translated fields are read and written in by default
    pub fn get_current_language(&self) -> &str {
        &self.current_language
    }

    /// Switch the current language
    ///
    /// With `initialize`, a translation placeholder is created on every level
    /// when the language is not translated yet, so a subsequent save creates
    /// marker-only levels even without field writes.
    pub async fn set_current_language(&mut self, language: &str, initialize: bool) -> Result<(), TranslationError> {
        self.current_language = normalize_language_code(language);
        if initialize {
            let language = self.current_language.clone();
            for index in 0..self.schema.levels().len() {
                self.resolve(&language, LevelId(index), true, false).await?;
            }
        }
        Ok(())
    }

    /// Language of an explicit argument, or the current language
    pub(super) fn language_or_current(&self, language: Option<&str>) -> String {
        language
            .map(normalize_language_code)
            .unwrap_or_else(|| self.current_language.clone())
    }

    // =========================================================================
    // Translated fields
    // =========================================================================

    /// A translation held locally
    pub fn translation(&self, language: &str, level: LevelId) -> Option<&TranslationRecord> {
        match self.local.get(level.index())?.get(&normalize_language_code(language)) {
            Some(Slot::Present(record)) => Some(record),
            _ => None,
        }
    }

    pub(super) fn translation_mut(&mut self, language: &str, level: LevelId) -> Option<&mut TranslationRecord> {
        match self.local.get_mut(level.index())?.get_mut(language) {
            Some(Slot::Present(record)) => Some(record),
            _ => None,
        }
    }

    /// Read a translated field, following the configured fallback
    pub async fn get_field(&mut self, field: &str, language: Option<&str>) -> Result<Value, TranslationError> {
        self.read_field(field, language, true).await
    }

    /// Read a translated field in exactly one language
    pub async fn get_field_strict(&mut self, field: &str, language: Option<&str>) -> Result<Value, TranslationError> {
        self.read_field(field, language, false).await
    }

    async fn read_field(&mut self, field: &str, language: Option<&str>, use_fallback: bool) -> Result<Value, TranslationError> {
        let level = self.schema.level_for_field(field)?.id();
        let language = self.language_or_current(language);
        let resolved = self.resolve(&language, level, false, use_fallback).await?;
        Ok(self
            .translation(&resolved, level)
            .and_then(|t| t.get(field))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Assign a translated field, creating the translation when needed
    pub async fn set_field(&mut self, field: &str, value: Value, language: Option<&str>) -> Result<(), TranslationError> {
        let level = self.schema.level_for_field(field)?.id();
        let language = self.language_or_current(language);
        let resolved = self.resolve(&language, level, true, false).await?;
        if let Some(record) = self.translation_mut(&resolved, level) {
            record.set(field, value)?;
        }
        self.state = SaveState::Unsaved;
        Ok(())
    }

    /// Assign several translated fields; names no level owns are ignored
    pub async fn set_fields(&mut self, fields: &FieldValues, language: Option<&str>) -> Result<Vec<LevelId>, TranslationError> {
        let language = self.language_or_current(language);
        let schema = self.schema.clone();
        let mut touched = Vec::new();

        for (level, values) in schema.split(fields) {
            let resolved = self.resolve(&language, level, true, false).await?;
            if let Some(record) = self.translation_mut(&resolved, level) {
                for (name, value) in values {
                    record.set(&name, value)?;
                }
            }
            touched.push(level);
        }

        if !touched.is_empty() {
            self.state = SaveState::Unsaved;
        }
        Ok(touched)
    }

    /// Languages with a translation at the root level
    ///
    /// Persisted translations come from the pre-fetch when attached, otherwise
    /// from storage, together with those this instance has saved itself;
    /// `include_unsaved` adds placeholders created in-process.
    pub async fn available_languages(&mut self, include_unsaved: bool) -> Result<Vec<String>, TranslationError> {
        self.available_languages_in(LevelId::ROOT, include_unsaved).await
    }

    /// Languages with a translation at one level
    pub async fn available_languages_in(&mut self, level: LevelId, include_unsaved: bool) -> Result<Vec<String>, TranslationError> {
        let schema = self.schema.clone();
        let meta = schema.try_level(level)?;
        let mut languages = BTreeSet::new();

        if let Some(master_id) = self.id {
            match &self.prefetch[level.index()] {
                Some(rows) => languages.extend(rows.iter().map(|r| r.language_code.clone())),
                None => {
                    let stored = self.ctx.store.languages(meta, master_id).await?;
                    languages.extend(stored);
                }
            }
        }

        // Held translations saved by this instance may postdate the pre-fetch
        languages.extend(self.local[level.index()].iter().filter_map(|(language, slot)| match slot {
            Slot::Present(record) if record.is_persisted() || include_unsaved => Some(language.clone()),
            _ => None,
        }));

        Ok(languages.into_iter().collect())
    }

    // =========================================================================
    // Bulk pre-fetch
    // =========================================================================

    /// Fetch all translations of every level in one query per level
    pub async fn prefetch_translations(&mut self) -> Result<(), TranslationError> {
        let Some(master_id) = self.id else {
            return Ok(());
        };
        let schema = self.schema.clone();
        for level in schema.levels() {
            let rows = self.ctx.store.find_many(level, master_id).await?;
            debug!("Prefetched {} rows of {} for #{}", rows.len(), level.table(), master_id);
            self.prefetch[level.id().index()] = Some(rows);
        }
        Ok(())
    }

    /// Attach rows fetched by a caller's own batch query
    ///
    /// The rows are taken as complete for this level: a language that is not
    /// among them is treated as untranslated without asking storage.
    pub fn attach_prefetch(&mut self, level: LevelId, rows: Vec<TranslationRow>) -> Result<(), TranslationError> {
        self.schema.try_level(level)?;
        let master_id = self.id;
        let rows = rows.into_iter().filter(|r| Some(r.master_id) == master_id).collect();
        self.prefetch[level.index()] = Some(rows);
        Ok(())
    }

    /// Detach all pre-fetched rows
    pub fn clear_prefetch(&mut self) {
        self.prefetch.iter_mut().for_each(|p| *p = None);
    }

    /// Whether a pre-fetch is attached for a level
    pub fn has_prefetch(&self, level: LevelId) -> bool {
        self.prefetch.get(level.index()).is_some_and(Option::is_some)
    }

    // =========================================================================
    // Creating and deleting translations
    // =========================================================================

    /// Create and save a translation in one language
    ///
    /// Fails with `AlreadyExists` without writing anything when the language
    /// is already translated at the root level or at any level the fields
    /// belong to.
    pub async fn create_translation(&mut self, language: &str, fields: &FieldValues) -> Result<SaveReport, TranslationError> {
        if self.id.is_none() {
            return Err(TranslationError::MasterNotPersisted {
                record_type: self.schema.record_type().to_string(),
            });
        }
        let language = normalize_language_code(language);
        let schema = self.schema.clone();

        let mut targets: BTreeSet<LevelId> = schema.split(fields).into_iter().map(|(level, _)| level).collect();
        targets.insert(LevelId::ROOT);

        // Local state first, no I/O
        for level in &targets {
            if self.translation(&language, *level).is_some() {
                return Err(already_exists(&schema, &language, *level));
            }
        }
        for level in &targets {
            if self.has_translation_in(&language, *level).await? {
                return Err(already_exists(&schema, &language, *level));
            }
        }

        for level in &targets {
            self.resolve(&language, *level, true, false).await?;
        }
        self.set_fields(fields, Some(&language)).await?;

        let mut report = SaveReport::default();
        for level in &targets {
            self.persist_translation(schema.level(*level), &language, &mut report).await?;
        }
        info!(
            "Created '{}' translation of {} #{}",
            language,
            schema.record_type(),
            self.id.unwrap_or_default()
        );
        Ok(report)
    }

    /// Delete the translation of a language at one level, or at all levels
    ///
    /// Returns the number of stored rows deleted. Unsaved placeholders are
    /// dropped without I/O and are not counted. The master itself is never
    /// deleted, even when its last translation goes.
    pub async fn delete_translation(&mut self, language: &str, level: Option<LevelId>) -> Result<usize, TranslationError> {
        let Some(master_id) = self.id else {
            return Err(TranslationError::MasterNotPersisted {
                record_type: self.schema.record_type().to_string(),
            });
        };
        let language = normalize_language_code(language);
        let schema = self.schema.clone();
        let levels: Vec<LevelId> = match level {
            Some(level) => vec![level],
            None => schema.levels().iter().map(|l| l.id()).collect(),
        };

        let mut deleted = 0;
        for level_id in levels {
            let level = schema.try_level(level_id)?;
            let held = self.local[level_id.index()].remove(&language);

            let stored_id = match held {
                Some(Slot::Present(record)) if record.is_persisted() => record.id(),
                Some(Slot::Present(_)) => {
                    debug!("Dropped unsaved '{}' translation of {}", language, level.table());
                    None
                }
                _ => self
                    .ctx
                    .store
                    .find_one(level, master_id, &language)
                    .await?
                    .map(|row| row.id),
            };

            if let Some(id) = stored_id {
                if self.ctx.store.delete(level, id).await? {
                    deleted += 1;
                }
            }

            self.ctx.cache.delete(level, master_id, &language).await;
            if let Some(rows) = self.prefetch[level_id.index()].as_mut() {
                rows.retain(|r| r.language_code != language);
            }
        }

        if deleted == 0 {
            return Err(TranslationError::NoTranslation {
                record_type: schema.record_type().to_string(),
                master_id: Some(master_id),
                language,
                fallback: None,
            });
        }

        info!(
            "Deleted {} '{}' translation(s) of {} #{}",
            deleted,
            language,
            schema.record_type(),
            master_id
        );
        Ok(deleted)
    }

    /// Delete the record; translations cascade at the storage layer
    ///
    /// Every cache entry that could exist for the record is evicted first.
    /// Returns whether a stored record was deleted.
    pub async fn delete(&mut self) -> Result<bool, TranslationError> {
        let Some(master_id) = self.id else {
            self.reset_local();
            return Ok(false);
        };
        let schema = self.schema.clone();

        let mut languages: BTreeSet<String> = self.local.iter().flat_map(|slots| slots.keys().cloned()).collect();
        for level in schema.levels() {
            match self.ctx.store.languages(level, master_id).await {
                Ok(stored) => languages.extend(stored),
                Err(e) => warn!("Could not list languages of {} #{}: {}", level.table(), master_id, e),
            }
        }
        self.ctx.cache.invalidate_all(&schema, master_id, &languages).await;

        let deleted = self.ctx.store.delete_master(&schema, master_id).await?;
        info!("Deleted {} #{}", schema.record_type(), master_id);

        self.id = None;
        self.data_original = FieldValues::new();
        self.reset_local();
        self.state = SaveState::Unsaved;
        Ok(deleted)
    }

    fn reset_local(&mut self) {
        self.local.iter_mut().for_each(BTreeMap::clear);
        self.clear_prefetch();
    }
}

fn already_exists(schema: &TranslationSchema, language: &str, level: LevelId) -> TranslationError {
    TranslationError::AlreadyExists {
        language: language.to_string(),
        level: schema.level(level).related_name().to_string(),
    }
}
