// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polyglot::app_config::{self, Config};
use polyglot::{
    FieldValues, LanguageRegistry, LevelId, MemoryCache, Repository, SharedRecord, TranslationCache,
    TranslationContext, TranslationSchema, get_language_name,
};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the tables of every configured record type
    Init,

    /// Create a record, optionally with translated fields
    Create {
        /// Record type
        #[arg(short = 't', long = "type")]
        record_type: String,

        /// Language of the translated fields
        #[arg(short, long)]
        language: Option<String>,

        /// Translated field, as name=value (value parsed as JSON when possible)
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Shared field, as name=value
        #[arg(long = "shared", value_name = "NAME=VALUE")]
        shared: Vec<String>,
    },

    /// Set translated fields of an existing record
    Set {
        /// Record type
        #[arg(short = 't', long = "type")]
        record_type: String,

        /// Record id
        #[arg(long)]
        id: i64,

        /// Language of the translated fields
        #[arg(short, long)]
        language: Option<String>,

        /// Translated field, as name=value
        #[arg(short, long = "set", value_name = "NAME=VALUE", required = true)]
        set: Vec<String>,
    },

    /// Read a translated field, following the configured fallback
    Get {
        /// Record type
        #[arg(short = 't', long = "type")]
        record_type: String,

        /// Record id
        #[arg(long)]
        id: i64,

        /// Field name
        #[arg(short, long)]
        field: String,

        /// Language to read
        #[arg(short, long)]
        language: Option<String>,

        /// Use any existing translation when neither the language nor its fallback exists
        #[arg(long)]
        any_language: bool,
    },

    /// List the languages a record is translated in
    Languages {
        /// Record type
        #[arg(short = 't', long = "type")]
        record_type: String,

        /// Record id
        #[arg(long)]
        id: i64,
    },

    /// Delete the translation of a record in one language
    DeleteTranslation {
        /// Record type
        #[arg(short = 't', long = "type")]
        record_type: String,

        /// Record id
        #[arg(long)]
        id: i64,

        /// Language to delete
        #[arg(short, long)]
        language: String,

        /// Only delete at this level (relation name); all levels by default
        #[arg(long)]
        level: Option<String>,
    },

    /// Generate shell completions for polyglot
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// polyglot - translated fields for shared records
///
/// Stores records whose translated fields have one copy per language, and
/// resolves reads through a cache and a per-site fallback chain.
#[derive(Parser, Debug)]
#[command(name = "polyglot")]
#[command(version)]
#[command(about = "Translated fields for shared records")]
#[command(long_about = "polyglot stores records with per-language fields in SQLite.

EXAMPLES:
    polyglot init                                            # Create tables for all record types
    polyglot create -t article -l en -s title=Hello          # Create an article with an English title
    polyglot set -t article --id 1 -l fr -s title=Bonjour    # Add a French title
    polyglot get -t article --id 1 -f title -l fr            # Read the French title
    polyglot get -t article --id 1 -f title -l de --any-language
    polyglot languages -t article --id 1                     # List translated languages
    polyglot delete-translation -t article --id 1 -l fr      # Delete the French translation
    polyglot completions bash > polyglot.bash                # Generate bash completions

CONFIGURATION:
    Configuration is stored in polyglot.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "polyglot.json", global = true)]
    config: PathBuf,

    /// Set logging level
    #[arg(long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // ANSI color per level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Everything a command needs
struct Runtime {
    config: Config,
    repo: Repository,
    ctx: TranslationContext,
}

impl Runtime {
    fn schema(&self, record_type: &str) -> Result<Arc<TranslationSchema>> {
        let record_type = self
            .config
            .record_type(record_type)
            .ok_or_else(|| anyhow!("Unknown record type: {}", record_type))?;
        Ok(Arc::new(record_type.to_schema()?))
    }

    async fn load(&self, record_type: &str, id: i64, language: Option<&str>) -> Result<SharedRecord> {
        let schema = self.schema(record_type)?;
        SharedRecord::load(schema, self.ctx.clone(), id, language)
            .await?
            .ok_or_else(|| anyhow!("{} #{} does not exist", record_type, id))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "polyglot", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config, cli.log_level.clone())?;
    if cli.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }
    let runtime = open_runtime(config).await?;

    run_command(&runtime, cli.command).await
}

/// Load the configuration, writing a default one when the file is missing
fn load_config(path: &Path, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if path.exists() {
        Config::from_file(path)?
    } else {
        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        config
    };

    if let Some(level) = log_level {
        config.log_level = level.into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn open_runtime(config: Config) -> Result<Runtime> {
    let repo = match &config.database.path {
        Some(path) => Repository::new(polyglot::DatabaseConnection::new(path)?),
        None => Repository::new_default()?,
    };

    for record_type in &config.record_types {
        repo.register_schema(&record_type.to_schema()?).await?;
    }

    let languages = LanguageRegistry::from_config(&config.languages)?;
    let cache = TranslationCache::new(Arc::new(MemoryCache::new()), &config.cache);
    let ctx = TranslationContext::new(Arc::new(repo.clone()), cache, Arc::new(languages))
        .with_site(config.site_id);

    Ok(Runtime { config, repo, ctx })
}

async fn run_command(runtime: &Runtime, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            info!(
                "Database ready at {:?} with {} record type(s)",
                runtime.repo.connection().path(),
                runtime.config.record_types.len()
            );
        }
        Commands::Create {
            record_type,
            language,
            set,
            shared,
        } => {
            let schema = runtime.schema(&record_type)?;
            let mut record = SharedRecord::new(schema, runtime.ctx.clone(), language.as_deref());
            for (name, value) in parse_assignments(&shared)? {
                record.set_shared(&name, value);
            }
            record.set_fields(&parse_assignments(&set)?, None).await?;
            let report = record.save().await?;
            info!("Created {} #{} ({} writes)", record_type, record.id().unwrap_or_default(), report.total_writes());
            println!("{}", record.id().unwrap_or_default());
        }
        Commands::Set {
            record_type,
            id,
            language,
            set,
        } => {
            let mut record = runtime.load(&record_type, id, language.as_deref()).await?;
            let fields = parse_assignments(&set)?;
            for name in fields.keys() {
                record.schema().level_for_field(name)?;
            }
            record.set_fields(&fields, None).await?;
            let report = record.save_translations().await?;
            info!(
                "Saved {} #{} in '{}': {} inserted, {} updated",
                record_type,
                id,
                record.get_current_language(),
                report.inserted,
                report.updated
            );
        }
        Commands::Get {
            record_type,
            id,
            field,
            language,
            any_language,
        } => {
            let mut record = runtime.load(&record_type, id, language.as_deref()).await?;
            let value = if any_language {
                record.safe_get(&field, None, true, Value::Null).await
            } else {
                record.get_field(&field, None).await?
            };
            match value {
                Value::String(text) => println!("{}", text),
                other => println!("{}", other),
            }
        }
        Commands::Languages { record_type, id } => {
            let mut record = runtime.load(&record_type, id, None).await?;
            for code in record.available_languages(false).await? {
                let name = get_language_name(&code).unwrap_or_else(|_| "unknown".to_string());
                println!("{}\t{}", code, name);
            }
        }
        Commands::DeleteTranslation {
            record_type,
            id,
            language,
            level,
        } => {
            let mut record = runtime.load(&record_type, id, None).await?;
            let level = match level {
                Some(name) => Some(level_by_name(record.schema(), &name)?),
                None => None,
            };
            let deleted = record.delete_translation(&language, level).await?;
            info!("Deleted {} row(s)", deleted);
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

fn level_by_name(schema: &TranslationSchema, name: &str) -> Result<LevelId> {
    schema
        .level_by_related_name(name)
        .map(|level| level.id())
        .ok_or_else(|| anyhow!("Record type '{}' has no level '{}'", schema.record_type(), name))
}

/// Parse `name=value` pairs; values that are not valid JSON are taken as strings
fn parse_assignments(assignments: &[String]) -> Result<FieldValues> {
    assignments
        .iter()
        .map(|assignment| {
            let (name, raw) = assignment
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", assignment))?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((name.trim().to_string(), value))
        })
        .collect()
}
