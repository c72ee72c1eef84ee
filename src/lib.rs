/*!
 * # polyglot - translated fields for shared records
 *
 * A Rust library that lets one logical record carry an independent copy of
 * some of its fields per language, while the rest of the record is shared.
 *
 * ## Features
 *
 * - Data-driven schemas: translated fields split over one or more levels,
 *   each stored in its own table
 * - Resolution through a local cache, an optional bulk pre-fetch, an external
 *   cache with negative (fallback) markers, and storage
 * - Per-site language settings with one-hop fallbacks
 * - Dirty tracking: a save writes only what changed
 * - SQLite storage with a uniqueness constraint per `(record, language)`
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `language_utils`: Language code normalization and ISO 639 validation
 * - `language_registry`: Language settings and fallbacks per site
 * - `translation`: The resolution engine:
 *   - `translation::schema`: Translation levels and field ownership
 *   - `translation::cache`: External translation cache
 *   - `translation::shared`: Shared records and their API
 *   - `translation::engine`: Resolution of translations
 *   - `translation::save`: Saving records and translations
 * - `database`: Storage contract and its SQLite implementation
 * - `errors`: Custom error types for the crate
 *
 * ## Example
 *
 * ```no_run
 * use std::sync::Arc;
 * use polyglot::{LanguageRegistry, MemoryCache, Repository, SharedRecord, TranslationCache,
 *                TranslationContext, TranslationSchema};
 * use polyglot::app_config::CacheConfig;
 *
 * # async fn demo() -> anyhow::Result<()> {
 * let schema = Arc::new(TranslationSchema::builder("article", "articles")
 *     .level("translations", &["title"])
 *     .build()?);
 * let repo = Repository::new_in_memory()?;
 * repo.register_schema(&schema).await?;
 *
 * let languages = LanguageRegistry::new("en").with_site(1, &[("en", None), ("fr", Some("en"))])?;
 * let cache = TranslationCache::new(Arc::new(MemoryCache::new()), &CacheConfig::default());
 * let ctx = TranslationContext::new(Arc::new(repo), cache, Arc::new(languages)).with_site(Some(1));
 *
 * let mut article = SharedRecord::new(schema, ctx, Some("en"));
 * article.set_field("title", serde_json::json!("Hello"), None).await?;
 * article.save().await?;
 *
 * let title = article.safe_get("title", Some("fr"), false, serde_json::Value::Null).await;
 * assert_eq!(title, "Hello");
 * # Ok(())
 * # }
 * ```
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod language_registry;
pub mod language_utils;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use database::{DatabaseConnection, Repository, TranslationStore};
pub use errors::{AppError, CacheError, SchemaError, StorageError, TranslationError};
pub use language_registry::{LanguageRegistry, LanguageSettings, SiteId};
pub use language_utils::{get_language_name, normalize_language_code, validate_language_code};
pub use translation::{
    CacheBackend, FieldValues, LevelId, MemoryCache, SaveReport, SaveState, SharedRecord,
    TranslationCache, TranslationContext, TranslationRecord, TranslationSchema,
};
