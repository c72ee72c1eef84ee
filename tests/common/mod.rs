/*!
 * Common test utilities for the polyglot test suite
 */

use std::sync::Arc;

use polyglot::app_config::CacheConfig;
use polyglot::{
    CacheBackend, LanguageRegistry, LevelId, MemoryCache, Repository, SharedRecord, TranslationCache,
    TranslationContext, TranslationSchema,
};

// Re-export the mock collaborators
pub mod mock_store;

pub use mock_store::{CountingStore, FailingCache};

/// Site id used by the fixtures
pub const SITE: u32 = 1;

/// Install a test logger once; later calls are no-ops
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two levels: `base` owns `title`, `ext` extends it and owns `subtitle`
pub fn article_schema() -> Arc<TranslationSchema> {
    Arc::new(
        TranslationSchema::builder("article", "articles")
            .level("base", &["title"])
            .level("ext", &["subtitle"])
            .build()
            .expect("valid schema"),
    )
}

/// Level ids of `article_schema`
pub const BASE: LevelId = LevelId(0);
pub const EXT: LevelId = LevelId(1);

/// `en` without fallback and `fr` falling back to `en`
pub fn registry() -> LanguageRegistry {
    LanguageRegistry::new("en")
        .with_site(SITE, &[("en", None), ("fr", Some("en"))])
        .expect("valid registry")
}

/// A repository, a counting store over it and a shared cache backend
pub struct Fixture {
    pub schema: Arc<TranslationSchema>,
    pub repo: Repository,
    pub store: Arc<CountingStore>,
    pub backend: MemoryCache,
    pub cache_enabled: bool,
    pub registry: Arc<LanguageRegistry>,
}

impl Fixture {
    /// Fixture with the two-level article schema
    pub async fn new(cache_enabled: bool) -> Self {
        Self::with_schema(article_schema(), registry(), cache_enabled).await
    }

    /// Fixture with any schema and registry
    pub async fn with_schema(schema: Arc<TranslationSchema>, registry: LanguageRegistry, cache_enabled: bool) -> Self {
        init_logging();
        let repo = Repository::new_in_memory().expect("in-memory database");
        repo.register_schema(&schema).await.expect("tables created");
        Self {
            store: Arc::new(CountingStore::new(repo.clone())),
            schema,
            repo,
            backend: MemoryCache::new(),
            cache_enabled,
            registry: Arc::new(registry),
        }
    }

    /// Cache settings matching `cache_enabled`
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.cache_enabled,
            prefix: "test".to_string(),
            timeout_secs: Some(300),
        }
    }

    /// Context over the counting store and the shared memory cache
    pub fn context(&self) -> TranslationContext {
        self.context_with_backend(Arc::new(self.backend.clone()))
    }

    /// Context over the counting store and another cache backend
    pub fn context_with_backend(&self, backend: Arc<dyn CacheBackend>) -> TranslationContext {
        let cache = TranslationCache::new(backend, &self.cache_config());
        TranslationContext::new(self.store.clone(), cache, self.registry.clone()).with_site(Some(SITE))
    }

    /// A new, unsaved record
    pub fn record(&self, language: &str) -> SharedRecord {
        SharedRecord::new(self.schema.clone(), self.context(), Some(language))
    }

    /// A fresh instance of a stored record
    pub async fn load(&self, id: i64, language: &str) -> SharedRecord {
        SharedRecord::load(self.schema.clone(), self.context(), id, Some(language))
            .await
            .expect("load succeeds")
            .expect("record exists")
    }
}
