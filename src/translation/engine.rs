/*!
 * Resolution of translations.
 *
 * Given a language and a level, the engine finds the translation to use by
 * consulting, in order: the record's local cache, an attached pre-fetch, the
 * external cache and finally storage. What is found is kept in the local
 * cache; what is confirmed absent is remembered as `Missing` locally and as a
 * fallback marker in the external cache. Only when nothing is found does the
 * engine create a placeholder (writes) or try the configured fallback,
 * exactly one hop (reads).
 */

use log::{debug, warn};
use serde_json::Value;

use crate::errors::TranslationError;
use crate::language_utils::normalize_language_code;
use crate::translation::cache::CacheLookup;
use crate::translation::record::TranslationRecord;
use crate::translation::schema::LevelId;
use crate::translation::shared::{SharedRecord, Slot};

/// Outcome of a lookup that neither creates nor follows fallbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Found,
    /// `known` is set when the absence is already recorded in the external
    /// cache, or cannot be recorded there because the master is unsaved
    Absent { known: bool },
}

impl SharedRecord {
    /// Find the translation to use for `language` at `level`
    ///
    /// Returns the language of the translation now held in the local cache:
    /// `language` itself, or its fallback when `use_fallback` is set and only
    /// the fallback is translated. With `auto_create`, a missing translation
    /// is created as an unsaved placeholder instead, and the fallback is
    /// never consulted.
    pub async fn resolve(
        &mut self,
        language: &str,
        level: LevelId,
        auto_create: bool,
        use_fallback: bool,
    ) -> Result<String, TranslationError> {
        self.schema.try_level(level)?;
        let language = normalize_language_code(language);

        match self.probe(&language, level).await? {
            Probe::Found => return Ok(language),
            Probe::Absent { known } => {
                if auto_create {
                    self.create_placeholder(&language, level);
                    return Ok(language);
                }
                self.record_missing(&language, level, known).await;
            }
        }

        let fallback = if use_fallback {
            self.ctx.fallback_of(&language)
        } else {
            None
        };

        if let Some(fallback) = &fallback {
            debug!("No '{}' translation, trying fallback '{}'", language, fallback);
            // One hop only: the fallback's own fallback is never followed
            match self.probe(fallback, level).await? {
                Probe::Found => return Ok(fallback.clone()),
                Probe::Absent { known } => self.record_missing(fallback, level, known).await,
            }
        }

        Err(TranslationError::NoTranslation {
            record_type: self.schema.record_type().to_string(),
            master_id: self.id,
            language,
            fallback,
        })
    }

    /// Steps up to and including storage, without creating or falling back
    async fn probe(&mut self, language: &str, level: LevelId) -> Result<Probe, TranslationError> {
        let schema = self.schema.clone();
        let meta = schema.level(level);

        match self.local[level.index()].get(language) {
            Some(Slot::Present(_)) => {
                debug!("Local hit for '{}' in {}", language, meta.table());
                return Ok(Probe::Found);
            }
            Some(Slot::Missing) => {
                debug!("Local miss marker for '{}' in {}", language, meta.table());
                return Ok(Probe::Absent { known: true });
            }
            None => {}
        }

        // Nothing is stored for an unsaved master, and there is no key to cache under
        let Some(master_id) = self.id else {
            return Ok(Probe::Absent { known: true });
        };

        if let Some(rows) = &self.prefetch[level.index()] {
            let row = rows.iter().find(|r| r.language_code == language).cloned();
            return match row {
                Some(row) => {
                    debug!("Prefetch hit for '{}' in {}", language, meta.table());
                    let record = TranslationRecord::from_row(meta, row);
                    self.ctx.cache.put_translation(meta, &record).await;
                    self.hold(language, level, record);
                    Ok(Probe::Found)
                }
                None => {
                    debug!("Prefetch has no '{}' in {}", language, meta.table());
                    Ok(Probe::Absent { known: false })
                }
            };
        }

        match self.ctx.cache.get(meta, master_id, language).await {
            CacheLookup::Values(cached) => {
                debug!("Cache hit for '{}' in {}", language, meta.table());
                let record = TranslationRecord::from_cached(meta, cached.id, master_id, language, cached.fields);
                self.hold(language, level, record);
                return Ok(Probe::Found);
            }
            CacheLookup::FallbackMarker => {
                debug!("Cache fallback marker for '{}' in {}", language, meta.table());
                return Ok(Probe::Absent { known: true });
            }
            CacheLookup::Absent => {}
        }

        debug!("Querying {} for #{} '{}'", meta.table(), master_id, language);
        match self.ctx.store.find_one(meta, master_id, language).await? {
            Some(row) => {
                let record = TranslationRecord::from_row(meta, row);
                self.ctx.cache.put_translation(meta, &record).await;
                self.hold(language, level, record);
                Ok(Probe::Found)
            }
            None => Ok(Probe::Absent { known: false }),
        }
    }

    fn hold(&mut self, language: &str, level: LevelId, record: TranslationRecord) {
        self.local[level.index()].insert(language.to_string(), Slot::Present(record));
    }

    fn create_placeholder(&mut self, language: &str, level: LevelId) {
        debug!(
            "Creating '{}' translation placeholder in {}",
            language,
            self.schema.level(level).table()
        );
        let record = TranslationRecord::new_unsaved(self.schema.level(level), self.id, language);
        self.hold(language, level, record);
    }

    /// Remember locally, and in the external cache unless already known there
    async fn record_missing(&mut self, language: &str, level: LevelId, known: bool) {
        self.local[level.index()].insert(language.to_string(), Slot::Missing);
        if let (false, Some(master_id)) = (known, self.id) {
            let schema = self.schema.clone();
            self.ctx
                .cache
                .put_fallback_marker(schema.level(level), master_id, language)
                .await;
        }
    }

    /// Whether the record is translated in `language` at the root level
    pub async fn has_translation(&mut self, language: &str) -> Result<bool, TranslationError> {
        self.has_translation_in(language, LevelId::ROOT).await
    }

    /// Whether the record is translated in `language` at `level`
    ///
    /// A fallback translation does not count. Unsaved placeholders held by
    /// this instance do.
    pub async fn has_translation_in(&mut self, language: &str, level: LevelId) -> Result<bool, TranslationError> {
        let language = normalize_language_code(language);
        match self.resolve(&language, level, false, false).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Any translation of the record at `level`, preferring the current language
    ///
    /// Order: the current language, its fallback, anything held locally, then
    /// the first pre-fetched or stored translation. Returns the language of
    /// the translation now held locally, or `None` when there is none at all.
    pub async fn any_translation(&mut self, level: LevelId) -> Result<Option<String>, TranslationError> {
        self.schema.try_level(level)?;
        let current = self.current_language.clone();
        if self.translation(&current, level).is_some() {
            return Ok(Some(current));
        }
        if let Some(fallback) = self.ctx.fallback_of(&current) {
            if self.translation(&fallback, level).is_some() {
                return Ok(Some(fallback));
            }
        }
        if let Some(language) = self.local[level.index()].iter().find_map(|(language, slot)| match slot {
            Slot::Present(_) => Some(language.clone()),
            Slot::Missing => None,
        }) {
            return Ok(Some(language));
        }

        let Some(master_id) = self.id else {
            return Ok(None);
        };
        let schema = self.schema.clone();
        let meta = schema.level(level);

        let first = match &self.prefetch[level.index()] {
            Some(rows) => rows.first().cloned(),
            None => self.ctx.store.find_many(meta, master_id).await?.into_iter().next(),
        };

        Ok(match first {
            Some(row) => {
                let language = row.language_code.clone();
                debug!("Using '{}' as any translation of {} #{}", language, meta.table(), master_id);
                let record = TranslationRecord::from_row(meta, row);
                self.ctx.cache.put_translation(meta, &record).await;
                self.hold(&language, level, record);
                Some(language)
            }
            None => None,
        })
    }

    /// Read a translated field without ever failing
    ///
    /// Follows the configured fallback. When neither language is translated,
    /// `allow_any` falls back to any existing translation; otherwise, and on
    /// any other error, `default` is returned.
    pub async fn safe_get(&mut self, field: &str, language: Option<&str>, allow_any: bool, default: Value) -> Value {
        let level = match self.schema.level_for_field(field) {
            Ok(level) => level.id(),
            Err(e) => {
                warn!("safe_get on {}: {}", self.schema.record_type(), e);
                return default;
            }
        };
        let language = self.language_or_current(language);

        let resolved = match self.resolve(&language, level, false, true).await {
            Ok(resolved) => Some(resolved),
            Err(e) if e.is_not_found() && allow_any => match self.any_translation(level).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("safe_get could not find any translation: {}", e);
                    None
                }
            },
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!("safe_get failed for '{}' ({}): {}", field, language, e);
                None
            }
        };

        resolved
            .and_then(|resolved| self.translation(&resolved, level))
            .and_then(|t| t.get(field))
            .cloned()
            .unwrap_or(default)
    }
}
