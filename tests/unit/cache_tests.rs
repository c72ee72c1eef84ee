/*!
 * Tests for translation cache functionality
 */

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use polyglot::app_config::CacheConfig;
use polyglot::translation::CacheLookup;
use polyglot::{CacheBackend, FieldValues, MemoryCache, TranslationCache};
use serde_json::json;

use crate::common::{FailingCache, article_schema};

fn config(prefix: &str) -> CacheConfig {
    CacheConfig {
        enabled: true,
        prefix: prefix.to_string(),
        timeout_secs: Some(60),
    }
}

fn fields(title: &str) -> FieldValues {
    FieldValues::from([("title".to_string(), json!(title))])
}

#[tokio::test]
async fn test_memoryCache_setAndGet_shouldReturnValue() {
    let cache = MemoryCache::new();
    cache.set("k", "v".to_string(), None).await.unwrap();

    assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    assert_eq!(cache.get("missing").await.unwrap(), None);

    let (hits, misses, rate) = cache.stats();
    assert_eq!((hits, misses), (1, 1));
    assert!((rate - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_memoryCache_expiredEntry_shouldBeAbsent() {
    let cache = MemoryCache::new();
    cache.set("k", "v".to_string(), Some(Duration::from_millis(1))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(!cache.contains_key("k"));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_memoryCache_clones_shouldShareEntries() {
    let cache = MemoryCache::new();
    let other = cache.clone();
    other.set("shared", "1".to_string(), None).await.unwrap();
    assert!(cache.contains_key("shared"));

    cache.delete("shared").await.unwrap();
    assert!(!other.contains_key("shared"));
    // Deleting twice is not an error
    assert!(cache.delete("shared").await.is_ok());
}

#[tokio::test]
async fn test_translationCache_putAndGet_shouldReturnValues() {
    let schema = article_schema();
    let backend = MemoryCache::new();
    let cache = TranslationCache::new(Arc::new(backend.clone()), &config(""));
    let level = schema.root();

    cache.put(level, 7, "en", 70, &fields("Hello")).await;

    match cache.get(level, 7, "en").await {
        CacheLookup::Values(cached) => {
            assert_eq!(cached.id, 70);
            assert_eq!(cached.fields["title"], json!("Hello"));
        }
        other => panic!("expected values, got {:?}", other),
    }
    assert_eq!(cache.get(level, 7, "fr").await, CacheLookup::Absent);
    assert!(backend.contains_key("polyglot.article.articles_base.7.en"));
}

#[tokio::test]
async fn test_translationCache_fallbackMarker_shouldBeDistinguishable() {
    let schema = article_schema();
    let cache = TranslationCache::new(Arc::new(MemoryCache::new()), &config(""));
    let level = schema.root();

    cache.put_fallback_marker(level, 7, "fr").await;
    assert_eq!(cache.get(level, 7, "fr").await, CacheLookup::FallbackMarker);

    cache.delete(level, 7, "fr").await;
    assert_eq!(cache.get(level, 7, "fr").await, CacheLookup::Absent);
}

#[tokio::test]
async fn test_translationCache_prefix_shouldSeparateDeployments() {
    let schema = article_schema();
    let backend = MemoryCache::new();
    let staging = TranslationCache::new(Arc::new(backend.clone()), &config("staging"));
    let production = TranslationCache::new(Arc::new(backend.clone()), &config("production"));
    let level = schema.root();

    staging.put(level, 1, "en", 1, &fields("Staging")).await;
    assert_eq!(production.get(level, 1, "en").await, CacheLookup::Absent);
    assert!(staging.key(level, 1, "en").starts_with("staging.polyglot."));
}

#[tokio::test]
async fn test_translationCache_longKey_shouldBeDigested() {
    let schema = article_schema();
    let cache = TranslationCache::new(Arc::new(MemoryCache::new()), &config(&"p".repeat(250)));
    let key = cache.key(schema.root(), 1, "en");

    assert!(key.starts_with("polyglot.sha256."));
    assert!(key.len() <= 200);
    assert_eq!(key, cache.key(schema.root(), 1, "en"));
    assert_ne!(key, cache.key(schema.root(), 1, "fr"));
}

#[tokio::test]
async fn test_translationCache_disabled_shouldNotTouchBackend() {
    let schema = article_schema();
    let backend = MemoryCache::new();
    let mut settings = config("");
    settings.enabled = false;
    let cache = TranslationCache::new(Arc::new(backend.clone()), &settings);

    cache.put(schema.root(), 1, "en", 1, &fields("Hello")).await;
    cache.put_fallback_marker(schema.root(), 1, "fr").await;

    assert!(!cache.is_enabled());
    assert!(backend.is_empty());
    assert_eq!(cache.get(schema.root(), 1, "en").await, CacheLookup::Absent);
}

#[tokio::test]
async fn test_translationCache_failingBackend_shouldActAsMiss() {
    let schema = article_schema();
    let backend = Arc::new(FailingCache::default());
    let cache = TranslationCache::new(backend.clone(), &config(""));

    cache.put(schema.root(), 1, "en", 1, &fields("Hello")).await;
    assert_eq!(cache.get(schema.root(), 1, "en").await, CacheLookup::Absent);
    cache.delete(schema.root(), 1, "en").await;

    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_translationCache_invalidPayload_shouldActAsMiss() {
    let schema = article_schema();
    let backend = MemoryCache::new();
    let cache = TranslationCache::new(Arc::new(backend.clone()), &config(""));
    let key = cache.key(schema.root(), 1, "en");
    backend.set(&key, "not json".to_string(), None).await.unwrap();

    assert_eq!(cache.get(schema.root(), 1, "en").await, CacheLookup::Absent);
}

#[tokio::test]
async fn test_translationCache_invalidateAll_shouldEvictEveryLevel() {
    let schema = article_schema();
    let backend = MemoryCache::new();
    let cache = TranslationCache::new(Arc::new(backend.clone()), &config(""));

    for level in schema.levels() {
        cache.put(level, 3, "en", 1, &FieldValues::new()).await;
        cache.put_fallback_marker(level, 3, "fr").await;
    }
    cache.put(schema.root(), 4, "en", 2, &fields("Other")).await;
    assert_eq!(backend.len(), 5);

    let languages = BTreeSet::from(["en".to_string(), "fr".to_string()]);
    cache.invalidate_all(&schema, 3, &languages).await;

    assert_eq!(backend.len(), 1);
    assert!(matches!(cache.get(schema.root(), 4, "en").await, CacheLookup::Values(_)));
}

#[test]
fn test_memoryCache_clear_shouldResetEntriesAndStats() {
    let cache = MemoryCache::new();
    tokio_test::block_on(async {
        cache.set("a", "1".to_string(), None).await.unwrap();
        cache.get("a").await.unwrap();
        cache.get("b").await.unwrap();
    });
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats(), (0, 0, 0.0));
}
