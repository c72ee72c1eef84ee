/*!
 * Tests for error types and conversions
 */

use polyglot::errors::{AppError, SchemaError, StorageError, TranslationError};

#[test]
fn test_translationError_alreadyExists_shouldNameLanguageAndLevel() {
    let error = TranslationError::AlreadyExists {
        language: "fr".to_string(),
        level: "translations".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("'fr'"));
    assert!(display.contains("'translations'"));
    assert!(!error.is_not_found());
}

#[test]
fn test_translationError_uniquenessConflict_shouldBeConflict() {
    let error = TranslationError::UniquenessConflict {
        table: "articles_translations".to_string(),
        master_id: 3,
        language: "en".to_string(),
    };
    assert!(error.is_conflict());
    let display = format!("{}", error);
    assert!(display.contains("#3"));
    assert!(display.contains("articles_translations"));
}

#[test]
fn test_translationError_fromStorageError_shouldWrap() {
    let storage = StorageError::Backend("database is locked".to_string());
    let error: TranslationError = storage.into();
    assert!(matches!(error, TranslationError::Storage(StorageError::Backend(_))));
    assert!(format!("{}", error).contains("database is locked"));
}

#[test]
fn test_translationError_fromSchemaError_shouldWrap() {
    let error: TranslationError = SchemaError::DuplicateTable("articles".to_string()).into();
    assert!(matches!(error, TranslationError::Schema(SchemaError::DuplicateTable(_))));
}

#[test]
fn test_appError_conversions_shouldPickVariant() {
    let from_schema: AppError = SchemaError::NoLevels("article".to_string()).into();
    assert!(matches!(from_schema, AppError::Config(ref m) if m.contains("article")));

    let from_io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert!(matches!(from_io, AppError::File(_)));

    let from_translation: AppError = TranslationError::UnknownField {
        field: "body".to_string(),
    }
    .into();
    assert!(format!("{}", from_translation).contains("'body'"));
}

#[test]
fn test_schemaError_duplicateField_shouldNameBothLevels() {
    let error = SchemaError::DuplicateField {
        field: "title".to_string(),
        first: "base".to_string(),
        second: "ext".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("'base'"));
    assert!(display.contains("'ext'"));
}
