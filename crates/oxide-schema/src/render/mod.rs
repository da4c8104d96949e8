//! Renderers for operation sequences.
//!
//! - [`render_sql`] / [`render_schema_sql`]: DDL for a [`Platform`].
//! - [`render_builder_code`] / [`render_migration`]: Rust source against
//!   the fluent builder API, for checked-in migrations.
//!
//! Renderers are pure and never touch a connection.
//!
//! [`Platform`]: crate::platform::Platform

mod code;
mod sql;

pub use code::{render_builder_code, render_migration};
pub use sql::{render_schema_sql, render_sql, RECREATE_PREFIX};
