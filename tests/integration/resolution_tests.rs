/*!
 * Integration tests for translation resolution: fallbacks, caching and pre-fetch
 */

use std::sync::Arc;

use polyglot::{FieldValues, LanguageRegistry, SharedRecord, TranslationError, TranslationStore};
use serde_json::{Value, json};

use crate::common::{BASE, EXT, FailingCache, Fixture, SITE, article_schema};

/// Store an article with an English title and return its id
async fn english_article(fixture: &Fixture) -> i64 {
    let mut article = fixture.record("en");
    article.set_field("title", json!("Hello"), None).await.unwrap();
    article.save().await.unwrap();
    article.id().unwrap()
}

#[tokio::test]
async fn test_baseAndExtension_fallbackThenTranslate_shouldWriteOnce() {
    let fixture = Fixture::new(true).await;
    let mut article = fixture.record("en");
    article.set_field("title", json!("Hello"), None).await.unwrap();
    let report = article.save().await.unwrap();
    assert!(report.master_written);
    assert_eq!(report.inserted, 1);

    // French falls back to English
    assert_eq!(article.safe_get("title", Some("fr"), false, Value::Null).await, json!("Hello"));
    assert_eq!(article.get_field("title", Some("fr")).await.unwrap(), json!("Hello"));

    // The extension level has no translation at all
    assert!(matches!(
        article.get_field("subtitle", Some("en")).await,
        Err(TranslationError::NoTranslation { ref language, fallback: None, .. }) if language == "en"
    ));

    fixture.store.reset();
    article.set_field("title", json!("Bonjour"), Some("fr")).await.unwrap();
    let report = article.save().await.unwrap();
    assert!(!report.master_written);
    assert_eq!(report.translation_writes(), 1);
    assert_eq!(fixture.store.writes(), 1);

    assert_eq!(article.get_field_strict("title", Some("fr")).await.unwrap(), json!("Bonjour"));
    assert_eq!(article.get_field("title", Some("en")).await.unwrap(), json!("Hello"));
}

#[tokio::test]
async fn test_getFieldStrict_onlyFallbackTranslated_shouldFail() {
    let fixture = Fixture::new(false).await;
    let id = english_article(&fixture).await;
    let mut article = fixture.load(id, "fr").await;

    let result = article.get_field_strict("title", None).await;
    assert!(matches!(
        result,
        Err(TranslationError::NoTranslation { ref language, fallback: None, .. }) if language == "fr"
    ));
    assert_eq!(article.get_field("title", None).await.unwrap(), json!("Hello"));
}

#[tokio::test]
async fn test_resolve_fallbackOfFallback_shouldNotBeFollowed() {
    let registry = LanguageRegistry::new("en")
        .with_site(SITE, &[("en", None), ("de", Some("en")), ("nl", Some("de"))])
        .unwrap();
    let fixture = Fixture::with_schema(article_schema(), registry, true).await;
    let id = english_article(&fixture).await;
    let mut article = fixture.load(id, "nl").await;

    let result = article.get_field("title", None).await;
    match result {
        Err(TranslationError::NoTranslation { language, fallback, .. }) => {
            assert_eq!(language, "nl");
            assert_eq!(fallback.as_deref(), Some("de"));
        }
        other => panic!("expected NoTranslation, got {:?}", other),
    }
    assert_eq!(article.safe_get("title", None, false, json!("none")).await, json!("none"));

    // German itself does reach English
    assert_eq!(article.get_field("title", Some("de")).await.unwrap(), json!("Hello"));
}

#[tokio::test]
async fn test_safeGet_allowAny_shouldUseAnyExistingTranslation() {
    let fixture = Fixture::new(true).await;
    let mut article = fixture.record("fr");
    article.set_field("title", json!("Bonjour"), None).await.unwrap();
    article.save().await.unwrap();
    let id = article.id().unwrap();

    let mut article = fixture.load(id, "en").await;
    assert_eq!(article.safe_get("title", Some("de"), false, json!("-")).await, json!("-"));
    assert_eq!(article.safe_get("title", Some("de"), true, json!("-")).await, json!("Bonjour"));
    assert_eq!(article.any_translation(EXT).await.unwrap(), None);
}

#[tokio::test]
async fn test_cacheFallbackMarker_shouldPreventStorageQuery() {
    let fixture = Fixture::new(true).await;
    let id = english_article(&fixture).await;

    // First reader finds nothing for French in storage and leaves a marker
    fixture.store.reset();
    let mut first = fixture.load(id, "fr").await;
    assert_eq!(first.get_field("title", None).await.unwrap(), json!("Hello"));
    assert_eq!(fixture.store.find_one_calls(), 1);

    // Second reader trusts the marker and the cached English values
    fixture.store.reset();
    let mut second = fixture.load(id, "fr").await;
    assert_eq!(second.get_field("title", None).await.unwrap(), json!("Hello"));
    assert!(!second.has_translation("fr").await.unwrap());
    assert_eq!(fixture.store.queries(), 0);
}

#[tokio::test]
async fn test_localCache_repeatedReads_shouldQueryOnce() {
    let fixture = Fixture::new(false).await;
    let id = english_article(&fixture).await;
    fixture.store.reset();

    let mut article = fixture.load(id, "fr").await;
    for _ in 0..3 {
        assert_eq!(article.get_field("title", None).await.unwrap(), json!("Hello"));
    }
    // One query for "fr" (absent), one for "en"
    assert_eq!(fixture.store.find_one_calls(), 2);
}

#[tokio::test]
async fn test_prefetch_attached_shouldResolveWithoutQueries() {
    let fixture = Fixture::new(true).await;
    let mut article = fixture.record("en");
    article.set_field("title", json!("Hello"), None).await.unwrap();
    article.set_field("subtitle", json!("World"), None).await.unwrap();
    article.set_field("title", json!("Bonjour"), Some("fr")).await.unwrap();
    article.save().await.unwrap();
    let id = article.id().unwrap();
    fixture.backend.clear();

    let mut article = fixture.load(id, "fr").await;
    article.prefetch_translations().await.unwrap();
    assert!(article.has_prefetch(BASE) && article.has_prefetch(EXT));

    fixture.store.reset();
    assert_eq!(article.get_field("title", None).await.unwrap(), json!("Bonjour"));
    assert_eq!(article.get_field("subtitle", None).await.unwrap(), json!("World"));
    assert_eq!(article.safe_get("title", Some("de"), false, Value::Null).await, json!("Hello"));
    assert_eq!(article.available_languages(false).await.unwrap(), vec!["en", "fr"]);
    assert_eq!(fixture.store.queries(), 0);
}

#[tokio::test]
async fn test_availableLanguages_afterPrefetchAndSave_shouldListNewLanguage() {
    let fixture = Fixture::new(true).await;
    let id = english_article(&fixture).await;

    let mut article = fixture.load(id, "en").await;
    article.prefetch_translations().await.unwrap();
    article.set_field("title", json!("Bonjour"), Some("fr")).await.unwrap();
    assert_eq!(article.available_languages(false).await.unwrap(), vec!["en"]);
    assert_eq!(article.available_languages(true).await.unwrap(), vec!["en", "fr"]);

    article.save().await.unwrap();
    assert!(article.has_prefetch(BASE));
    assert_eq!(article.available_languages(false).await.unwrap(), vec!["en", "fr"]);
    assert_eq!(article.available_languages(true).await.unwrap(), vec!["en", "fr"]);

    let mut fresh = fixture.load(id, "en").await;
    assert_eq!(fresh.available_languages(false).await.unwrap(), vec!["en", "fr"]);
}

#[tokio::test]
async fn test_attachPrefetch_foreignRows_shouldBeIgnored() {
    let fixture = Fixture::new(false).await;
    let first = english_article(&fixture).await;
    let second = english_article(&fixture).await;

    let level = fixture.schema.root();
    let mut rows = fixture.repo.find_many(level, first).await.unwrap();
    rows.extend(fixture.repo.find_many(level, second).await.unwrap());
    assert_eq!(rows.len(), 2);

    let mut article = fixture.load(first, "en").await;
    article.attach_prefetch(BASE, rows).unwrap();
    fixture.store.reset();
    assert_eq!(article.available_languages(false).await.unwrap(), vec!["en"]);
    assert_eq!(article.get_field("title", None).await.unwrap(), json!("Hello"));
    assert_eq!(fixture.store.queries(), 0);

    article.clear_prefetch();
    assert!(!article.has_prefetch(BASE));
}

/// Run the same reads and writes and collect what the caller observes
async fn observe(fixture: &Fixture) -> Vec<Value> {
    let id = english_article(fixture).await;
    let mut observed = Vec::new();

    let mut article = fixture.load(id, "fr").await;
    observed.push(article.safe_get("title", None, false, Value::Null).await);
    observed.push(json!(article.has_translation("fr").await.unwrap()));
    article.set_field("title", json!("Bonjour"), None).await.unwrap();
    article.save().await.unwrap();

    let mut article = fixture.load(id, "fr").await;
    observed.push(article.get_field("title", None).await.unwrap());
    observed.push(json!(article.available_languages(false).await.unwrap()));
    article.delete_translation("fr", None).await.unwrap();

    let mut article = fixture.load(id, "fr").await;
    observed.push(article.get_field("title", None).await.unwrap());
    observed.push(json!(article.has_translation("fr").await.unwrap()));
    observed
}

#[tokio::test]
async fn test_resolution_withAndWithoutCache_shouldAgree() {
    let cached = observe(&Fixture::new(true).await).await;
    let uncached = observe(&Fixture::new(false).await).await;

    assert_eq!(cached, uncached);
    assert_eq!(cached[0], json!("Hello"));
    assert_eq!(cached[2], json!("Bonjour"));
    assert_eq!(cached[4], json!("Hello"));
    assert_eq!(cached[5], json!(false));
}

#[tokio::test]
async fn test_failingCacheBackend_shouldFallBackToStorage() {
    let fixture = Fixture::new(true).await;
    let ctx = fixture.context_with_backend(Arc::new(FailingCache::default()));

    let mut article = SharedRecord::new(fixture.schema.clone(), ctx.clone(), Some("en"));
    article.set_field("title", json!("Hello"), None).await.unwrap();
    article.save().await.unwrap();
    let id = article.id().unwrap();

    let mut article = SharedRecord::load(fixture.schema.clone(), ctx, id, Some("fr"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(article.get_field("title", None).await.unwrap(), json!("Hello"));
}

#[tokio::test]
async fn test_setField_unknownField_shouldFail() {
    let fixture = Fixture::new(false).await;
    let mut article = fixture.record("en");

    let result = article.set_field("body", json!("x"), None).await;
    assert!(matches!(result, Err(TranslationError::UnknownField { ref field }) if field == "body"));

    // Unknown names in a bulk assignment are ignored
    let fields = FieldValues::from([
        ("title".to_string(), json!("Hello")),
        ("body".to_string(), json!("ignored")),
    ]);
    assert_eq!(article.set_fields(&fields, None).await.unwrap(), vec![BASE]);
}

#[tokio::test]
async fn test_availableLanguages_includeUnsaved_shouldAddPlaceholders() {
    let fixture = Fixture::new(false).await;
    let id = english_article(&fixture).await;
    let mut article = fixture.load(id, "en").await;
    article.set_field("title", json!("Hallo"), Some("de")).await.unwrap();

    assert_eq!(article.available_languages(false).await.unwrap(), vec!["en"]);
    assert_eq!(article.available_languages(true).await.unwrap(), vec!["de", "en"]);
    assert!(article.has_translation("de").await.unwrap());
    assert!(article.available_languages_in(EXT, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_setCurrentLanguage_shouldNormalizeAndApplyToReads() {
    let fixture = Fixture::new(false).await;
    let id = english_article(&fixture).await;
    let mut article = fixture.load(id, "en").await;

    article.set_current_language("FR_ca", false).await.unwrap();
    assert_eq!(article.get_current_language(), "fr-ca");
    // "fr-ca" uses the settings of "fr", which falls back to "en"
    assert_eq!(article.get_field("title", None).await.unwrap(), json!("Hello"));
}
