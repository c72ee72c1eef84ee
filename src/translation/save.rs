/*!
 * Saving shared records and their translations.
 *
 * Levels are written in schema order, root first. Within a level only
 * translations that changed since they were loaded or last saved are written,
 * plus new translations of marker-only levels (levels without fields exist
 * only to record which languages a record has). After each write the
 * translation's snapshot is refreshed, so an immediate second save writes
 * nothing. An insert stores the full row and is cached as such; an update
 * writes only the changed columns and evicts the cache entry instead.
 */

use log::{debug, info};

use crate::errors::{StorageError, TranslationError};
use crate::translation::schema::SchemaLevel;
use crate::translation::shared::{SharedRecord, Slot};

/// Where a record is in its save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    /// Has changes that are not stored (or was never stored)
    #[default]
    Unsaved,
    /// A save is in progress
    Saving,
    /// Stored; no changes since
    Saved,
}

/// Writes performed by a save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveReport {
    /// Whether the shared record was inserted or updated
    pub master_written: bool,
    /// Translations inserted
    pub inserted: usize,
    /// Translations updated
    pub updated: usize,
}

impl SaveReport {
    /// Translation writes, inserts and updates together
    pub fn translation_writes(&self) -> usize {
        self.inserted + self.updated
    }

    /// All writes, including the shared record
    pub fn total_writes(&self) -> usize {
        self.translation_writes() + usize::from(self.master_written)
    }
}

impl SharedRecord {
    /// Save the shared record, then its translations
    ///
    /// The record is inserted when it has no identity yet, and updated only
    /// when its shared fields changed.
    pub async fn save(&mut self) -> Result<SaveReport, TranslationError> {
        self.state = SaveState::Saving;
        let result = self.write_master_and_translations().await;
        self.finish_save(&result);
        result
    }

    /// Save only the translations; the shared record must already be stored
    pub async fn save_translations(&mut self) -> Result<SaveReport, TranslationError> {
        self.state = SaveState::Saving;
        let mut report = SaveReport::default();
        let result = self.write_translations(&mut report).await.map(|()| report);
        self.finish_save(&result);
        result
    }

    fn finish_save(&mut self, result: &Result<SaveReport, TranslationError>) {
        self.state = match result {
            Ok(_) => SaveState::Saved,
            Err(_) => SaveState::Unsaved,
        };
    }

    async fn write_master_and_translations(&mut self) -> Result<SaveReport, TranslationError> {
        let mut report = SaveReport::default();
        let schema = self.schema.clone();

        match self.id {
            None => {
                let row = self.ctx.store.insert_master(&schema, &self.data).await?;
                info!("Inserted {} #{}", schema.record_type(), row.id);
                self.id = Some(row.id);
                self.data_original = self.data.clone();
                for slots in &mut self.local {
                    for slot in slots.values_mut() {
                        if let Slot::Present(record) = slot {
                            record.set_master_id(row.id);
                        }
                    }
                }
                report.master_written = true;
            }
            Some(id) if self.data != self.data_original => {
                self.ctx.store.update_master(&schema, id, &self.data).await?;
                debug!("Updated shared fields of {} #{}", schema.record_type(), id);
                self.data_original = self.data.clone();
                report.master_written = true;
            }
            Some(_) => {}
        }

        self.write_translations(&mut report).await?;
        Ok(report)
    }

    async fn write_translations(&mut self, report: &mut SaveReport) -> Result<(), TranslationError> {
        if self.id.is_none() {
            return Err(TranslationError::MasterNotPersisted {
                record_type: self.schema.record_type().to_string(),
            });
        }
        let schema = self.schema.clone();

        for level in schema.levels() {
            let pending: Vec<String> = self.local[level.id().index()]
                .iter()
                .filter_map(|(language, slot)| match slot {
                    Slot::Present(record)
                        if record.is_modified() || (!record.is_persisted() && level.is_marker_only()) =>
                    {
                        Some(language.clone())
                    }
                    _ => None,
                })
                .collect();

            for language in pending {
                self.persist_translation(level, &language, report).await?;
            }
        }

        if report.translation_writes() > 0 {
            debug!(
                "Saved translations of {} #{}: {} inserted, {} updated",
                schema.record_type(),
                self.id.unwrap_or_default(),
                report.inserted,
                report.updated
            );
        }
        Ok(())
    }

    /// Write one held translation: insert when new, update changed fields otherwise
    pub(super) async fn persist_translation(
        &mut self,
        level: &SchemaLevel,
        language: &str,
        report: &mut SaveReport,
    ) -> Result<(), TranslationError> {
        let Some(master_id) = self.id else {
            return Err(TranslationError::MasterNotPersisted {
                record_type: self.schema.record_type().to_string(),
            });
        };
        let Some(Slot::Present(record)) = self.local[level.id().index()].get_mut(language) else {
            return Ok(());
        };
        if record.master_id().is_none() {
            record.set_master_id(master_id);
        }

        match record.id() {
            Some(id) => {
                let changed = record.changed_fields();
                if changed.is_empty() {
                    return Ok(());
                }
                self.ctx
                    .store
                    .update(level, id, &changed)
                    .await
                    .map_err(|e| conflict(e, master_id, language))?;
                record.mark_saved(id);
                report.updated += 1;
                // Only the changed columns were written; other columns may
                // have moved on in storage, so the held copy is not cacheable
                self.ctx.cache.delete(level, master_id, language).await;
            }
            None => {
                let row = record.to_new_row().ok_or_else(|| TranslationError::MasterNotPersisted {
                    record_type: self.schema.record_type().to_string(),
                })?;
                let stored = self
                    .ctx
                    .store
                    .insert(level, row)
                    .await
                    .map_err(|e| conflict(e, master_id, language))?;
                record.mark_saved(stored.id);
                report.inserted += 1;
                self.ctx.cache.put_translation(level, record).await;
            }
        }
        Ok(())
    }
}

/// A uniqueness violation means another writer created this translation first
fn conflict(error: StorageError, master_id: i64, language: &str) -> TranslationError {
    match error {
        StorageError::UniqueViolation { table, .. } => TranslationError::UniquenessConflict {
            table,
            master_id,
            language: language.to_string(),
        },
        other => other.into(),
    }
}
