/*!
 * Translated fields of shared records.
 *
 * This module contains the translation resolution engine. It is split into
 * several submodules:
 *
 * - `schema`: which fields are translated, level by level
 * - `record`: one language-specific row of fields with dirty tracking
 * - `cache`: the external translation cache and its backends
 * - `context`: the store, cache and language settings a record works with
 * - `shared`: shared records and their caller-facing API
 * - `engine`: resolution of translations (local cache, pre-fetch, cache, storage, fallback)
 * - `save`: saving records and their translations
 */

// Re-export main types for easier usage
pub use self::cache::{CacheBackend, CacheLookup, CachedTranslation, MemoryCache, TranslationCache};
pub use self::context::TranslationContext;
pub use self::record::{FieldValues, TranslationRecord};
pub use self::save::{SaveReport, SaveState};
pub use self::schema::{LevelId, SchemaBuilder, SchemaLevel, TranslationSchema};
pub use self::shared::SharedRecord;

// Submodules
pub mod cache;
pub mod context;
pub mod engine;
pub mod record;
pub mod save;
pub mod schema;
pub mod shared;
