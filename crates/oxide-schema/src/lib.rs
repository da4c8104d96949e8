//! # oxide-schema
//!
//! Synchronizes an object model with a relational schema.
//!
//! This crate provides:
//! - A logical type registry mapping domain values to storage values and
//!   per-platform column declarations
//! - A schema builder turning entity metadata into a desired [`SchemaSpec`]
//! - A differ producing ordered, platform-gated [`Operation`]s
//! - Renderers emitting SQL or Rust builder code for those operations
//!
//! Everything here is pure: introspection and execution against a live
//! database live in `oxide-migrate`.
//!
//! ## From entities to DDL
//!
//! ```rust
//! use oxide_schema::builder::SchemaBuilder;
//! use oxide_schema::metadata::{EntityMetadata, FieldDescriptor, RelationDescriptor};
//! use oxide_schema::platform::SqlitePlatform;
//! use oxide_schema::render::render_schema_sql;
//! use oxide_schema::types::TypeRegistry;
//!
//! let registry = TypeRegistry::with_builtin_types();
//! let entities = vec![
//!     EntityMetadata::new("User", "users")
//!         .field(FieldDescriptor::id("id", "uuid"))
//!         .field(FieldDescriptor::new("email", "string").length(255).unique()),
//!     EntityMetadata::new("Todo", "todos")
//!         .field(FieldDescriptor::id("id", "uuid"))
//!         .field(FieldDescriptor::new("title", "string"))
//!         .relation(RelationDescriptor::many_to_one("user", "User")),
//! ];
//!
//! let schema = SchemaBuilder::new(&registry).build(&entities).unwrap();
//! let sql = render_schema_sql(&schema, &SqlitePlatform, &registry).unwrap();
//! assert!(sql[0].starts_with("CREATE TABLE \"users\""));
//! assert!(sql[1].contains("REFERENCES \"users\" (\"id\")"));
//! ```
//!
//! ## Hand-written migrations
//!
//! ```rust
//! use oxide_schema::prelude::*;
//!
//! pub struct Migration0002AddNickname;
//!
//! impl Migration for Migration0002AddNickname {
//!     const ID: &'static str = "0002_add_nickname";
//!
//!     fn up() -> Vec<Operation> {
//!         vec![Operation::add_column("users", string("nickname", 40).build())]
//!     }
//! }
//!
//! assert!(matches!(
//!     &Migration0002AddNickname::down()[0],
//!     Operation::DropColumn { column, .. } if column.name == "nickname"
//! ));
//! ```

pub mod builder;
pub mod column_builder;
pub mod diff;
pub mod error;
pub mod metadata;
pub mod migration;
pub mod operation;
pub mod platform;
pub mod render;
pub mod schema;
pub mod table_builder;
pub mod types;

pub use error::{Result, SchemaError};
pub use operation::Operation;
pub use schema::SchemaSpec;

/// Everything generated migration code needs.
pub mod prelude {
    pub use crate::column_builder::{
        boolean, column, decimal, float, integer, json, string, text, uuid, ColumnBuilder,
    };
    pub use crate::migration::Migration;
    pub use crate::operation::Operation;
    pub use crate::schema::{
        ColumnSpec, DefaultValue, ForeignKeySpec, IndexSpec, ReferentialAction, TableSpec,
    };
    pub use crate::table_builder::TableBuilder;
}
