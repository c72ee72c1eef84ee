use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::language_utils::{normalize_language_code, validate_language_code};
use crate::translation::schema::TranslationSchema;

/// Application configuration module
/// This module handles loading, validating and saving the JSON configuration:
/// language settings per site, cache settings, the database location and the
/// record types whose translated fields are managed.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Site whose language list applies; `None` uses the global defaults only
    #[serde(default)]
    pub site_id: Option<u32>,

    /// Language settings
    #[serde(default)]
    pub languages: LanguagesConfig,

    /// External translation cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Record types with translated fields
    #[serde(default)]
    pub record_types: Vec<RecordTypeConfig>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Language settings for all sites
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LanguagesConfig {
    /// Settings used for languages (and sites) that are not configured explicitly
    #[serde(default)]
    pub default: LanguageDefaultsConfig,

    /// Ordered language choices per site id
    #[serde(default)]
    pub sites: BTreeMap<u32, Vec<LanguageChoiceConfig>>,
}

/// Global language defaults
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LanguageDefaultsConfig {
    /// Default language code
    #[serde(default = "default_language_code")]
    pub code: String,

    /// Fallback for unconfigured languages; defaults to `code`
    #[serde(default)]
    pub fallback: Option<String>,

    /// Whether untranslated objects are hidden instead of shown in the fallback language
    #[serde(default)]
    pub hide_untranslated: bool,
}

impl Default for LanguageDefaultsConfig {
    fn default() -> Self {
        Self {
            code: default_language_code(),
            fallback: None,
            hide_untranslated: false,
        }
    }
}

/// One configured language of a site
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LanguageChoiceConfig {
    /// Language code
    pub code: String,

    /// Fallback language; `None` inherits the global default fallback
    #[serde(default)]
    pub fallback: Option<String>,

    /// Overrides the global `hide_untranslated` flag
    #[serde(default)]
    pub hide_untranslated: Option<bool>,
}

impl LanguageChoiceConfig {
    /// Language with an explicit fallback
    pub fn new(code: &str, fallback: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            fallback: fallback.map(str::to_string),
            hide_untranslated: None,
        }
    }
}

/// External cache settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Whether the external cache is consulted at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Key prefix, for deployments that share one cache
    #[serde(default)]
    pub prefix: String,

    /// Entry expiry in seconds; `null` keeps entries until evicted
    #[serde(default = "default_cache_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

impl CacheConfig {
    /// Entry expiry as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: String::new(),
            timeout_secs: default_cache_timeout_secs(),
        }
    }
}

/// Database settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// SQLite database file; the user data directory is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// A record type with translated fields
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordTypeConfig {
    /// Record type name, e.g. "article"
    pub name: String,

    /// Table holding the shared (untranslated) part of the record
    pub shared_table: String,

    /// Translation levels, root level first
    pub levels: Vec<LevelConfig>,
}

impl RecordTypeConfig {
    /// Build the translation schema for this record type
    pub fn to_schema(&self) -> Result<TranslationSchema> {
        let mut builder = TranslationSchema::builder(&self.name, &self.shared_table);
        for level in &self.levels {
            let fields: Vec<&str> = level.fields.iter().map(String::as_str).collect();
            builder = match &level.table {
                Some(table) => builder.level_with_table(&level.related_name, table, &fields),
                None => builder.level(&level.related_name, &fields),
            };
        }
        builder
            .build()
            .with_context(|| format!("Invalid schema for record type '{}'", self.name))
    }
}

/// One translation level of a record type
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LevelConfig {
    /// Name of the relation from the shared record to this level's rows
    pub related_name: String,

    /// Table name; defaults to `<shared_table>_<related_name>`
    #[serde(default)]
    pub table: Option<String>,

    /// Translated field names owned by this level
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_language_code() -> String {
    "en".to_string()
}

fn default_cache_timeout_secs() -> Option<u64> {
    Some(300)
}

impl Config {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        validate_language_code(&self.languages.default.code)
            .context("Invalid default language")?;
        if let Some(fallback) = &self.languages.default.fallback {
            validate_language_code(fallback).context("Invalid default fallback language")?;
        }

        for (site_id, choices) in &self.languages.sites {
            let mut seen = HashSet::new();
            for choice in choices {
                validate_language_code(&choice.code)
                    .with_context(|| format!("Invalid language in site {}", site_id))?;
                if let Some(fallback) = &choice.fallback {
                    validate_language_code(fallback).with_context(|| {
                        format!("Invalid fallback for '{}' in site {}", choice.code, site_id)
                    })?;
                }
                if !seen.insert(normalize_language_code(&choice.code)) {
                    return Err(anyhow!(
                        "Language '{}' is listed twice for site {}",
                        choice.code,
                        site_id
                    ));
                }
            }
        }

        // Fallback chains must terminate; the registry checks this on construction.
        crate::language_registry::LanguageRegistry::from_config(&self.languages)?;

        let mut names = HashSet::new();
        for record_type in &self.record_types {
            if !names.insert(record_type.name.as_str()) {
                return Err(anyhow!("Record type '{}' is declared twice", record_type.name));
            }
            record_type.to_schema()?;
        }

        Ok(())
    }

    /// Find a record type by name
    pub fn record_type(&self, name: &str) -> Option<&RecordTypeConfig> {
        self.record_types.iter().find(|r| r.name == name)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            site_id: Some(1),
            languages: LanguagesConfig {
                default: LanguageDefaultsConfig::default(),
                sites: BTreeMap::from([(
                    1,
                    vec![
                        LanguageChoiceConfig::new("en", None),
                        LanguageChoiceConfig::new("fr", Some("en")),
                    ],
                )]),
            },
            cache: CacheConfig::default(),
            database: DatabaseConfig::default(),
            record_types: vec![RecordTypeConfig {
                name: "article".to_string(),
                shared_table: "articles".to_string(),
                levels: vec![LevelConfig {
                    related_name: "translations".to_string(),
                    table: None,
                    fields: vec!["title".to_string(), "body".to_string()],
                }],
            }],
            log_level: LogLevel::default(),
        }
    }
}
