/*!
 * Database schema definitions and migrations.
 *
 * The fixed part of the schema is only the version table. A database stamped
 * with a newer version than this build knows is refused. Every registered
 * record type adds its shared table plus one table per translation level;
 * those are created on demand from the `TranslationSchema`, and field columns
 * added to a level later are appended to the existing table.
 */

use anyhow::{Context, Result};
use rusqlite::Connection;
use log::{debug, info};
use std::collections::HashSet;

use crate::translation::schema::{SchemaLevel, TranslationSchema};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Check current schema version
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        // Fresh database - create all tables
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        anyhow::bail!(
            "Database schema v{} is newer than supported v{}",
            current_version,
            SCHEMA_VERSION
        );
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    // Check if the schema_version table exists
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create the fixed tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Quote an identifier; schema names are already restricted to `[a-z0-9_]`
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

/// Create the shared table and level tables of a record type
///
/// Idempotent: existing tables are kept, missing field columns are added.
pub fn create_record_tables(conn: &Connection, schema: &TranslationSchema) -> Result<()> {
    let shared = quote(schema.shared_table());
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {shared} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL DEFAULT '{{}}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#
    ))
    .with_context(|| format!("Failed to create table {}", schema.shared_table()))?;

    for level in schema.levels() {
        create_level_table(conn, schema, level)?;
    }

    info!(
        "Tables ready for record type '{}' ({} levels)",
        schema.record_type(),
        schema.levels().len()
    );
    Ok(())
}

fn create_level_table(conn: &Connection, schema: &TranslationSchema, level: &SchemaLevel) -> Result<()> {
    let table = quote(level.table());
    let columns: String = level
        .fields()
        .iter()
        .map(|f| format!("            {} TEXT,\n", quote(f)))
        .collect();

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            master_id INTEGER NOT NULL REFERENCES {shared}(id) ON DELETE CASCADE,
            language_code TEXT NOT NULL,
{columns}            UNIQUE (master_id, language_code)
        );

        CREATE INDEX IF NOT EXISTS {index} ON {table}(master_id);
        "#,
        shared = quote(schema.shared_table()),
        index = quote(&format!("idx_{}_master", level.table())),
    ))
    .with_context(|| format!("Failed to create table {}", level.table()))?;

    let existing = table_columns(conn, level.table())?;
    for field in level.fields().iter().filter(|f| !existing.contains(*f)) {
        info!("Adding column {}.{}", level.table(), field);
        conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} TEXT;", table, quote(field)))
            .with_context(|| format!("Failed to add column {}.{}", level.table(), field))?;
    }

    Ok(())
}

/// Column names of a table
fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(columns)
}
