/*!
 * Repository layer for database operations.
 *
 * This module implements `TranslationStore` on SQLite. Translated field
 * values are stored as JSON text, one column per field, `NULL` for a JSON
 * null. Every method is a single statement run on the blocking pool.
 */

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::connection::DatabaseConnection;
use super::models::{MasterRow, NewTranslationRow, TranslationRow};
use super::schema::{create_record_tables, quote};
use super::TranslationStore;
use crate::errors::StorageError;
use crate::translation::record::FieldValues;
use crate::translation::schema::{SchemaLevel, TranslationSchema};

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

/// Table and column names a statement needs, owned so it can move to the blocking pool
#[derive(Clone)]
struct LevelTable {
    table: String,
    fields: Vec<String>,
}

impl LevelTable {
    fn of(level: &SchemaLevel) -> Self {
        Self {
            table: level.table().to_string(),
            fields: level.fields().to_vec(),
        }
    }

    fn select_list(&self) -> String {
        std::iter::once("id, master_id, language_code".to_string())
            .chain(self.fields.iter().map(|f| quote(f)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn read_row(&self, row: &Row<'_>) -> rusqlite::Result<TranslationRow> {
        let mut fields = FieldValues::new();
        for (offset, name) in self.fields.iter().enumerate() {
            let index = offset + 3;
            let raw: Option<String> = row.get(index)?;
            let value = match raw {
                Some(text) => serde_json::from_str(&text)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))?,
                None => serde_json::Value::Null,
            };
            fields.insert(name.clone(), value);
        }

        Ok(TranslationRow {
            id: row.get(0)?,
            master_id: row.get(1)?,
            language_code: row.get(2)?,
            fields,
        })
    }
}

/// JSON null is stored as SQL NULL, everything else as JSON text
fn to_sql_value(value: &serde_json::Value) -> Result<Value> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        other => Value::Text(serde_json::to_string(other)?),
    })
}

/// Map a failed statement; uniqueness violations stay distinguishable
fn storage_error(table: &str, error: anyhow::Error) -> StorageError {
    if let Some(rusqlite::Error::SqliteFailure(failure, message)) = error.downcast_ref::<rusqlite::Error>() {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return StorageError::UniqueViolation {
                table: table.to_string(),
                message: message.clone().unwrap_or_else(|| failure.to_string()),
            };
        }
    }
    error.into()
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// The underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create (or extend) the tables of a record type
    pub async fn register_schema(&self, schema: &TranslationSchema) -> Result<()> {
        let schema = schema.clone();
        self.db
            .transaction_async(move |tx| create_record_tables(tx, &schema))
            .await
    }

    /// Number of rows in a level table, across all masters
    pub async fn count_translations(&self, level: &SchemaLevel) -> Result<i64> {
        let table = quote(level.table());
        self.db
            .execute_async(move |conn| {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?)
            })
            .await
    }

    fn find_master_sync(conn: &Connection, table: &str, id: i64) -> Result<Option<MasterRow>> {
        let row = conn
            .query_row(
                &format!("SELECT id, data, created_at, updated_at FROM {} WHERE id = ?1", quote(table)),
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, data, created_at, updated_at)| {
            Ok::<_, anyhow::Error>(MasterRow {
                id,
                data: serde_json::from_str(&data)?,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl TranslationStore for Repository {
    async fn find_one(
        &self,
        level: &SchemaLevel,
        master_id: i64,
        language: &str,
    ) -> Result<Option<TranslationRow>, StorageError> {
        let spec = LevelTable::of(level);
        let language = language.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM {} WHERE master_id = ?1 AND language_code = ?2",
                    spec.select_list(),
                    quote(&spec.table)
                );
                Ok(conn
                    .query_row(&sql, params![master_id, language], |row| spec.read_row(row))
                    .optional()?)
            })
            .await
            .map_err(StorageError::from)
    }

    async fn find_many(&self, level: &SchemaLevel, master_id: i64) -> Result<Vec<TranslationRow>, StorageError> {
        let spec = LevelTable::of(level);

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM {} WHERE master_id = ?1 ORDER BY id",
                    spec.select_list(),
                    quote(&spec.table)
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([master_id], |row| spec.read_row(row))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
            .map_err(StorageError::from)
    }

    async fn insert(&self, level: &SchemaLevel, row: NewTranslationRow) -> Result<TranslationRow, StorageError> {
        let spec = LevelTable::of(level);
        let table = spec.table.clone();

        self.db
            .execute_async(move |conn| {
                let mut columns = vec!["master_id".to_string(), "language_code".to_string()];
                let mut values = vec![Value::Integer(row.master_id), Value::Text(row.language_code.clone())];
                for field in &spec.fields {
                    columns.push(quote(field));
                    values.push(to_sql_value(row.fields.get(field).unwrap_or(&serde_json::Value::Null))?);
                }
                let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();

                conn.execute(
                    &format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        quote(&spec.table),
                        columns.join(", "),
                        placeholders.join(", ")
                    ),
                    params_from_iter(values),
                )?;
                let id = conn.last_insert_rowid();
                debug!("Inserted {} #{} ({})", spec.table, id, row.language_code);
                Ok(row.into_row(id))
            })
            .await
            .map_err(|e| storage_error(&table, e))
    }

    async fn update(&self, level: &SchemaLevel, id: i64, changed: &FieldValues) -> Result<(), StorageError> {
        if changed.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = changed.keys().find(|name| !level.has_field(name)) {
            return Err(StorageError::Backend(format!(
                "Table {} has no translated field '{}'",
                level.table(),
                unknown
            )));
        }

        let table = level.table().to_string();
        let changed = changed.clone();

        self.db
            .execute_async(move |conn| {
                let mut assignments = Vec::with_capacity(changed.len());
                let mut values = Vec::with_capacity(changed.len() + 1);
                for (index, (name, value)) in changed.iter().enumerate() {
                    assignments.push(format!("{} = ?{}", quote(name), index + 1));
                    values.push(to_sql_value(value)?);
                }
                values.push(Value::Integer(id));

                let sql = format!(
                    "UPDATE {} SET {} WHERE id = ?{}",
                    quote(&table),
                    assignments.join(", "),
                    values.len()
                );
                let updated = conn.execute(&sql, params_from_iter(values))?;
                if updated == 0 {
                    return Err(anyhow::anyhow!("No row {} #{} to update", table, id));
                }
                Ok(())
            })
            .await
            .map_err(|e| storage_error(level.table(), e))
    }

    async fn delete(&self, level: &SchemaLevel, id: i64) -> Result<bool, StorageError> {
        let table = quote(level.table());

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(StorageError::from)
    }

    async fn languages(&self, level: &SchemaLevel, master_id: i64) -> Result<Vec<String>, StorageError> {
        let table = quote(level.table());

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT DISTINCT language_code FROM {} WHERE master_id = ?1 ORDER BY language_code",
                    table
                ))?;
                let languages = stmt
                    .query_map([master_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(languages)
            })
            .await
            .map_err(StorageError::from)
    }

    async fn insert_master(&self, schema: &TranslationSchema, data: &FieldValues) -> Result<MasterRow, StorageError> {
        let table = schema.shared_table().to_string();
        let data = data.clone();

        self.db
            .execute_async(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                conn.execute(
                    &format!(
                        "INSERT INTO {} (data, created_at, updated_at) VALUES (?1, ?2, ?2)",
                        quote(&table)
                    ),
                    params![serde_json::to_string(&data)?, now],
                )?;
                let id = conn.last_insert_rowid();
                debug!("Inserted {} #{}", table, id);
                Ok(MasterRow {
                    id,
                    data,
                    created_at: now.clone(),
                    updated_at: now,
                })
            })
            .await
            .map_err(StorageError::from)
    }

    async fn find_master(&self, schema: &TranslationSchema, id: i64) -> Result<Option<MasterRow>, StorageError> {
        let table = schema.shared_table().to_string();

        self.db
            .execute_async(move |conn| Self::find_master_sync(conn, &table, id))
            .await
            .map_err(StorageError::from)
    }

    async fn update_master(&self, schema: &TranslationSchema, id: i64, data: &FieldValues) -> Result<(), StorageError> {
        let table = schema.shared_table().to_string();
        let data = data.clone();

        self.db
            .execute_async(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let updated = conn.execute(
                    &format!("UPDATE {} SET data = ?1, updated_at = ?2 WHERE id = ?3", quote(&table)),
                    params![serde_json::to_string(&data)?, now, id],
                )?;
                if updated == 0 {
                    return Err(anyhow::anyhow!("No row {} #{} to update", table, id));
                }
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }

    async fn delete_master(&self, schema: &TranslationSchema, id: i64) -> Result<bool, StorageError> {
        let table = quote(schema.shared_table());

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(StorageError::from)
    }
}
