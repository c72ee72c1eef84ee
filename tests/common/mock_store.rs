/*!
 * Mock collaborators for testing
 *
 * `CountingStore` wraps a real repository and counts every call, so tests can
 * assert how many queries and writes an operation issued. `FailingCache` is a
 * cache backend that is always unavailable.
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use polyglot::database::{MasterRow, NewTranslationRow, TranslationRow};
use polyglot::translation::SchemaLevel;
use polyglot::{CacheBackend, CacheError, FieldValues, Repository, StorageError, TranslationSchema, TranslationStore};

/// Call counters of a `CountingStore`
#[derive(Debug, Default)]
pub struct StoreCounts {
    pub find_one: AtomicUsize,
    pub find_many: AtomicUsize,
    pub languages: AtomicUsize,
    pub insert: AtomicUsize,
    pub update: AtomicUsize,
    pub delete: AtomicUsize,
    pub master_reads: AtomicUsize,
    pub master_writes: AtomicUsize,
}

/// Store wrapper that counts calls per operation
#[derive(Debug)]
pub struct CountingStore {
    inner: Repository,
    pub counts: StoreCounts,
}

impl CountingStore {
    pub fn new(inner: Repository) -> Self {
        Self {
            inner,
            counts: StoreCounts::default(),
        }
    }

    /// Translation queries: `find_one`, `find_many` and `languages`
    pub fn queries(&self) -> usize {
        self.counts.find_one.load(Ordering::SeqCst)
            + self.counts.find_many.load(Ordering::SeqCst)
            + self.counts.languages.load(Ordering::SeqCst)
    }

    /// Translation writes: inserts, updates and deletes
    pub fn translation_writes(&self) -> usize {
        self.counts.insert.load(Ordering::SeqCst)
            + self.counts.update.load(Ordering::SeqCst)
            + self.counts.delete.load(Ordering::SeqCst)
    }

    /// Every write, shared records included
    pub fn writes(&self) -> usize {
        self.translation_writes() + self.counts.master_writes.load(Ordering::SeqCst)
    }

    /// Number of `find_one` calls
    pub fn find_one_calls(&self) -> usize {
        self.counts.find_one.load(Ordering::SeqCst)
    }

    /// Reset every counter
    pub fn reset(&self) {
        for counter in [
            &self.counts.find_one,
            &self.counts.find_many,
            &self.counts.languages,
            &self.counts.insert,
            &self.counts.update,
            &self.counts.delete,
            &self.counts.master_reads,
            &self.counts.master_writes,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[async_trait]
impl TranslationStore for CountingStore {
    async fn find_one(&self, level: &SchemaLevel, master_id: i64, language: &str) -> Result<Option<TranslationRow>, StorageError> {
        bump(&self.counts.find_one);
        self.inner.find_one(level, master_id, language).await
    }

    async fn find_many(&self, level: &SchemaLevel, master_id: i64) -> Result<Vec<TranslationRow>, StorageError> {
        bump(&self.counts.find_many);
        self.inner.find_many(level, master_id).await
    }

    async fn insert(&self, level: &SchemaLevel, row: NewTranslationRow) -> Result<TranslationRow, StorageError> {
        bump(&self.counts.insert);
        self.inner.insert(level, row).await
    }

    async fn update(&self, level: &SchemaLevel, id: i64, changed: &FieldValues) -> Result<(), StorageError> {
        bump(&self.counts.update);
        self.inner.update(level, id, changed).await
    }

    async fn delete(&self, level: &SchemaLevel, id: i64) -> Result<bool, StorageError> {
        bump(&self.counts.delete);
        self.inner.delete(level, id).await
    }

    async fn languages(&self, level: &SchemaLevel, master_id: i64) -> Result<Vec<String>, StorageError> {
        bump(&self.counts.languages);
        self.inner.languages(level, master_id).await
    }

    async fn insert_master(&self, schema: &TranslationSchema, data: &FieldValues) -> Result<MasterRow, StorageError> {
        bump(&self.counts.master_writes);
        self.inner.insert_master(schema, data).await
    }

    async fn find_master(&self, schema: &TranslationSchema, id: i64) -> Result<Option<MasterRow>, StorageError> {
        bump(&self.counts.master_reads);
        self.inner.find_master(schema, id).await
    }

    async fn update_master(&self, schema: &TranslationSchema, id: i64, data: &FieldValues) -> Result<(), StorageError> {
        bump(&self.counts.master_writes);
        self.inner.update_master(schema, id, data).await
    }

    async fn delete_master(&self, schema: &TranslationSchema, id: i64) -> Result<bool, StorageError> {
        bump(&self.counts.master_writes);
        self.inner.delete_master(schema, id).await
    }
}

/// Cache backend that fails every call
#[derive(Debug, Default)]
pub struct FailingCache {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        bump(&self.calls);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        bump(&self.calls);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        bump(&self.calls);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}
