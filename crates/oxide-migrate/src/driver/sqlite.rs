//! SQLite driver over sqlx.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Row as _, TypeInfo, ValueRef};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use oxide_schema::platform::{Platform, SqlitePlatform};
use oxide_schema::types::Value;

use super::runtime;
use crate::connection::{Connection, Row};
use crate::error::{MigrateError, Result};

/// A single blocking SQLite connection.
#[derive(Debug)]
pub struct SqliteDriver {
    // Declared before the runtime so it is dropped first.
    conn: SqliteConnection,
    runtime: Runtime,
    platform: SqlitePlatform,
}

impl SqliteDriver {
    /// Opens `url` (e.g. `sqlite:db.sqlite3`), creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ConnectionFailed`] if the URL is invalid or
    /// the database cannot be opened.
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = runtime()?;
        let options = SqliteConnectOptions::from_str(url)
            .map_err(MigrateError::connection_failed)?
            .create_if_missing(true);
        let conn = runtime
            .block_on(options.connect())
            .map_err(MigrateError::connection_failed)?;
        info!(url = %url, "Connected to SQLite");
        Ok(Self {
            conn,
            runtime,
            platform: SqlitePlatform,
        })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ConnectionFailed`] if SQLite cannot start.
    pub fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:")
    }
}

impl Connection for SqliteDriver {
    fn platform(&self) -> &dyn Platform {
        &self.platform
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = self
            .runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.conn))
            .map_err(|e| MigrateError::query_failed(sql, e))?;
        Ok(result.rows_affected())
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        debug!(sql = %sql, "Querying");
        let rows = self
            .runtime
            .block_on(sqlx::raw_sql(sql).fetch_all(&mut self.conn))
            .map_err(|e| MigrateError::query_failed(sql, e))?;
        rows.iter()
            .map(|row| decode_row(row).map_err(|e| MigrateError::query_failed(sql, e)))
            .collect()
    }
}

/// Decodes by storage class: SQLite values carry their own type.
fn decode_row(row: &SqliteRow) -> std::result::Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}
