//! Blocking database drivers.
//!
//! Each driver owns a current-thread tokio runtime and blocks on every sqlx
//! call, so the pipeline stays synchronous end to end.

mod mysql;
mod sqlite;

pub use mysql::MySqlDriver;
pub use sqlite::SqliteDriver;

use tokio::runtime::{Builder, Runtime};

use oxide_schema::platform::{MySqlPlatform, Platform, SqlitePlatform};

use crate::connection::{Connection, Row};
use crate::error::{MigrateError, Result};

static SQLITE: SqlitePlatform = SqlitePlatform;
static MYSQL: MySqlPlatform = MySqlPlatform;

/// Backend named by a database URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `sqlite:`
    Sqlite,
    /// `mysql:` or `mariadb:`
    MySql,
}

impl Backend {
    /// Picks the backend from a URL scheme.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ConnectionFailed`] for unknown schemes.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::MySql),
            _ => Err(MigrateError::ConnectionFailed(format!(
                "unsupported database URL scheme '{scheme}'"
            ))),
        }
    }

    /// The platform this backend speaks, usable without connecting.
    #[must_use]
    pub fn platform(self) -> &'static dyn Platform {
        match self {
            Self::Sqlite => &SQLITE,
            Self::MySql => &MYSQL,
        }
    }
}

/// A connection to any supported backend.
#[derive(Debug)]
pub enum AnyConnection {
    /// SQLite connection.
    Sqlite(SqliteDriver),
    /// MySQL / MariaDB connection.
    MySql(MySqlDriver),
}

/// Connects to the database named by `url`.
///
/// # Errors
///
/// Returns [`MigrateError::ConnectionFailed`] for unknown schemes or
/// unreachable databases.
pub fn connect(url: &str) -> Result<AnyConnection> {
    match Backend::from_url(url)? {
        Backend::Sqlite => SqliteDriver::connect(url).map(AnyConnection::Sqlite),
        Backend::MySql => {
            // sqlx only understands the mysql scheme.
            let url = url
                .strip_prefix("mariadb:")
                .map_or_else(|| url.to_string(), |rest| format!("mysql:{rest}"));
            MySqlDriver::connect(&url).map(AnyConnection::MySql)
        }
    }
}

impl Connection for AnyConnection {
    fn platform(&self) -> &dyn Platform {
        match self {
            Self::Sqlite(conn) => conn.platform(),
            Self::MySql(conn) => conn.platform(),
        }
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        match self {
            Self::Sqlite(conn) => conn.execute(sql),
            Self::MySql(conn) => conn.execute(sql),
        }
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        match self {
            Self::Sqlite(conn) => conn.query(sql),
            Self::MySql(conn) => conn.query(sql),
        }
    }
}

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}
