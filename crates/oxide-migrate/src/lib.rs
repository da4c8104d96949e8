//! Live-database side of oxide-schema.
//!
//! `oxide-migrate` connects the pure schema pipeline to real databases:
//!
//! - **Connection** - A blocking statement/query seam with transaction and
//!   savepoint primitives
//! - **Drivers** - sqlx-backed SQLite and MySQL/MariaDB connections
//! - **Introspector** - Reads the current schema back from the catalog
//! - **Executor** - Applies operations with per-operation savepoints
//!
//! # Example
//!
//! ```rust
//! use oxide_migrate::prelude::*;
//! use oxide_schema::builder::SchemaBuilder;
//! use oxide_schema::diff::SchemaDiffer;
//! use oxide_schema::metadata::{EntityMetadata, FieldDescriptor};
//! use oxide_schema::types::TypeRegistry;
//!
//! let registry = TypeRegistry::with_builtin_types();
//! let desired = SchemaBuilder::new(&registry)
//!     .build(&[EntityMetadata::new("User", "users")
//!         .field(FieldDescriptor::id("id", "integer"))
//!         .field(FieldDescriptor::new("email", "string").length(255))])
//!     .unwrap();
//!
//! let mut conn = SqliteDriver::in_memory().unwrap();
//! let current = Introspector::new(&registry).introspect(&mut conn).unwrap();
//! let ops = SchemaDiffer::new(&registry)
//!     .for_platform(conn.platform())
//!     .diff(&current, &desired)
//!     .unwrap();
//! let report = MigrationExecutor::new(&registry).apply(&mut conn, &ops).unwrap();
//! assert_eq!(report.operations_applied, 1);
//!
//! let after = Introspector::new(&registry).introspect(&mut conn).unwrap();
//! assert!(after.contains("users"));
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # SQL for the whole model, from scratch
//! oxide-migrate --entities entities.json schema
//!
//! # Pending changes against the live database
//! oxide-migrate diff --format sql
//!
//! # Write a migration with up/down operations
//! oxide-migrate generate --name 0002_add_email
//!
//! # Apply pending changes
//! oxide-migrate migrate --dry-run
//! ```

pub mod connection;
pub mod driver;
pub mod error;
pub mod executor;
pub mod introspect;

use std::path::Path;

use oxide_schema::metadata::EntityMetadata;

pub use error::{MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::connection::{Connection, Row};
    pub use crate::driver::{connect, AnyConnection, Backend, MySqlDriver, SqliteDriver};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{ApplyOptions, ApplyReport, MigrationExecutor, TransactionMode};
    pub use crate::introspect::Introspector;
}

/// Reads entity metadata from a JSON file holding an array of entities.
///
/// # Errors
///
/// Returns [`MigrateError::Io`] if the file cannot be read and
/// [`MigrateError::Serialization`] if it is not valid metadata.
pub fn load_entities(path: &Path) -> Result<Vec<EntityMetadata>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
