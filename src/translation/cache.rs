/*!
 * Translation caching functionality.
 *
 * This module provides the external (shared) translation cache: a thin layer
 * over a key/value backend that stores either the field values of a persisted
 * translation, or a fallback marker meaning "confirmed absent, apply your own
 * fallback policy". The cache is best-effort only: backend failures are
 * logged and reported as a miss, never as an error.
 */

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::CacheConfig;
use crate::errors::CacheError;
use crate::translation::record::{FieldValues, TranslationRecord};
use crate::translation::schema::{SchemaLevel, TranslationSchema};

/// Keys longer than this are replaced by a digest
const MAX_KEY_LENGTH: usize = 200;

/// Key/value store used as the external cache
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with an optional expiry
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove a value; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// A stored value and its expiry
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache backend
///
/// Clones share the same storage, so one `MemoryCache` can back several
/// contexts, the way a shared cache server would.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    /// Internal cache storage
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,

    /// Cache hit counter
    hits: Arc<RwLock<usize>>,

    /// Cache miss counter
    misses: Arc<RwLock<usize>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get cache statistics: hits, misses and hit rate
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Remove every entry and reset the statistics
    pub fn clear(&self) {
        self.entries.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;
        debug!("Memory cache cleared");
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether there are no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists for the key
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries.read().get(key).is_some_and(|e| !e.is_expired(now))
    }
    /// Drop the entry for `key` if it is still expired at `now`
    ///
    /// Re-checked under the write lock: a `set` may have replaced the entry
    /// since the read that missed.
    fn purge_expired(&self, key: &str, now: Instant) {
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let found = {
            let entries = self.entries.read();
            entries
                .get(key)
                .filter(|e| !e.is_expired(now))
                .map(|e| e.value.clone())
        };

        match found {
            Some(value) => {
                *self.hits.write() += 1;
                Ok(Some(value))
            }
            None => {
                *self.misses.write() += 1;
                self.purge_expired(key, now);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Values of a persisted translation as stored in the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTranslation {
    /// Row identity
    pub id: i64,
    /// Field values
    pub fields: FieldValues,
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A persisted translation
    Values(CachedTranslation),
    /// Confirmed absent; the caller applies its own fallback policy
    FallbackMarker,
    /// Nothing known (including disabled cache and backend failures)
    Absent,
}

/// Wire format of a cache value
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CachePayload {
    Translation { id: i64, fields: FieldValues },
    Fallback,
}

/// External translation cache keyed by `(level, master id, language)`
#[derive(Clone)]
pub struct TranslationCache {
    backend: Arc<dyn CacheBackend>,
    enabled: bool,
    prefix: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("enabled", &self.enabled)
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TranslationCache {
    /// Create a cache over a backend using the configured settings
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            enabled: config.enabled,
            prefix: config.prefix.clone(),
            timeout: config.timeout(),
        }
    }

    /// A cache that never stores anything; every lookup is `Absent`
    pub fn disabled() -> Self {
        Self {
            backend: Arc::new(MemoryCache::new()),
            enabled: false,
            prefix: String::new(),
            timeout: None,
        }
    }

    /// Whether the cache is consulted at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cache key of one translation
    pub fn key(&self, level: &SchemaLevel, master_id: i64, language: &str) -> String {
        let key = if self.prefix.is_empty() {
            format!("polyglot.{}.{}.{}", level.identity(), master_id, language)
        } else {
            format!("{}.polyglot.{}.{}.{}", self.prefix, level.identity(), master_id, language)
        };

        if key.len() > MAX_KEY_LENGTH {
            format!("polyglot.sha256.{:x}", Sha256::digest(key.as_bytes()))
        } else {
            key
        }
    }

    /// Look up a translation
    pub async fn get(&self, level: &SchemaLevel, master_id: i64, language: &str) -> CacheLookup {
        if !self.enabled {
            return CacheLookup::Absent;
        }

        let key = self.key(level, master_id, language);
        let raw = match self.backend.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheLookup::Absent,
            Err(e) => {
                warn!("Cache lookup for '{}' failed, treating as a miss: {}", key, e);
                return CacheLookup::Absent;
            }
        };

        match serde_json::from_str::<CachePayload>(&raw) {
            Ok(CachePayload::Translation { id, fields }) => {
                CacheLookup::Values(CachedTranslation { id, fields })
            }
            Ok(CachePayload::Fallback) => CacheLookup::FallbackMarker,
            Err(e) => {
                warn!("{}", CacheError::Payload(format!("{}: {}", key, e)));
                CacheLookup::Absent
            }
        }
    }

    /// Store the values of a persisted translation
    pub async fn put(
        &self,
        level: &SchemaLevel,
        master_id: i64,
        language: &str,
        id: i64,
        fields: &FieldValues,
    ) {
        let payload = CachePayload::Translation {
            id,
            fields: fields.clone(),
        };
        self.store(level, master_id, language, &payload).await;
    }

    /// Store a translation record; unsaved records are never cached
    pub async fn put_translation(&self, level: &SchemaLevel, record: &TranslationRecord) {
        if let (Some(id), Some(master_id)) = (record.id(), record.master_id()) {
            self.put(level, master_id, record.language_code(), id, record.values())
                .await;
        }
    }

    /// Record that no translation exists for this language
    pub async fn put_fallback_marker(&self, level: &SchemaLevel, master_id: i64, language: &str) {
        self.store(level, master_id, language, &CachePayload::Fallback)
            .await;
    }

    async fn store(&self, level: &SchemaLevel, master_id: i64, language: &str, payload: &CachePayload) {
        if !self.enabled {
            return;
        }

        let key = self.key(level, master_id, language);
        let value = match serde_json::to_string(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialize cache entry '{}': {}", key, e);
                return;
            }
        };

        match self.backend.set(&key, value, self.timeout).await {
            Ok(()) => debug!("Cached '{}'", key),
            Err(e) => warn!("Cache write for '{}' failed: {}", key, e),
        }
    }

    /// Evict one translation
    pub async fn delete(&self, level: &SchemaLevel, master_id: i64, language: &str) {
        if !self.enabled {
            return;
        }

        let key = self.key(level, master_id, language);
        if let Err(e) = self.backend.delete(&key).await {
            warn!("Cache delete for '{}' failed: {}", key, e);
        }
    }

    /// Evict every level/language combination of a master
    ///
    /// The cache has no index by master, so the caller supplies the languages
    /// that could have entries.
    pub async fn invalidate_all(
        &self,
        schema: &TranslationSchema,
        master_id: i64,
        languages: &BTreeSet<String>,
    ) {
        if !self.enabled {
            return;
        }

        for level in schema.levels() {
            for language in languages {
                self.delete(level, master_id, language).await;
            }
        }
        debug!(
            "Invalidated cache for {} #{} ({} languages)",
            schema.record_type(),
            master_id,
            languages.len()
        );
    }
}
