//! SQLite platform.
//!
//! SQLite has limited `ALTER TABLE` support: columns cannot be altered,
//! constraints cannot be added to or dropped from an existing table, and
//! a column that is unique or part of the primary key cannot be added or
//! dropped in place. Those changes use the table recreation strategy:
//! create a new table, copy data, drop the old table, rename the new one.
//!
//! Foreign keys are declared inline at creation time. Enforcement is
//! switched off around a migration so rebuilds do not trip it.

use super::{unsupported, Platform, PlatformFamily};
use crate::error::Result;
use crate::operation::Operation;
use crate::schema::{ColumnSpec, DefaultValue};
use crate::types::TypeRegistry;

/// SQLite platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlitePlatform;

impl SqlitePlatform {
    /// Creates the platform.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn in_place_add(column: &ColumnSpec) -> bool {
        let needs_value = !column.nullable && column.default.is_none();
        let expression_default = matches!(column.default, Some(DefaultValue::Expression(_)));
        !(column.unique || column.primary_key || needs_value || expression_default)
    }
}

impl Platform for SqlitePlatform {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Sqlite
    }

    fn supports_add_foreign_key(&self) -> bool {
        false
    }

    fn supports_drop_foreign_key(&self) -> bool {
        false
    }

    fn requires_recreate(&self, op: &Operation) -> bool {
        match op {
            Operation::ModifyColumn { .. } => true,
            Operation::AddColumn { column, .. } => !Self::in_place_add(column),
            Operation::DropColumn { column, .. } => column.unique || column.primary_key,
            _ => false,
        }
    }

    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    fn release_savepoint_sql(&self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {name}")
    }

    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    fn disable_constraints_sql(&self) -> Option<&'static str> {
        Some("PRAGMA foreign_keys = OFF")
    }

    fn enable_constraints_sql(&self) -> Option<&'static str> {
        Some("PRAGMA foreign_keys = ON")
    }

    fn list_tables_sql(&self) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            .to_string()
    }

    fn list_columns_sql(&self, table: &str) -> String {
        format!(
            "SELECT name, type AS data_type, \"notnull\" AS not_null, dflt_value AS default_value, pk \
             FROM pragma_table_info({}) ORDER BY cid",
            self.quote_literal(table)
        )
    }

    fn list_indexes_sql(&self, table: &str) -> String {
        format!(
            "SELECT il.name AS index_name, ii.name AS column_name, il.\"unique\" AS is_unique, il.origin AS origin \
             FROM pragma_index_list({}) AS il JOIN pragma_index_info(il.name) AS ii \
             ORDER BY il.name, ii.seqno",
            self.quote_literal(table)
        )
    }

    // The catalog does not keep constraint names, so rows carry an empty
    // name and the reader derives one.
    fn list_foreign_keys_sql(&self, table: &str) -> String {
        format!(
            "SELECT id AS constraint_id, '' AS constraint_name, \"from\" AS column_name, \
             \"table\" AS referenced_table, COALESCE(\"to\", '') AS referenced_column, \
             on_update, on_delete \
             FROM pragma_foreign_key_list({}) ORDER BY id, seq",
            self.quote_literal(table)
        )
    }

    fn table_exists_sql(&self, table: &str) -> String {
        self.limit_offset_sql(
            &format!(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
                self.quote_literal(table)
            ),
            Some(1),
            None,
        )
    }

    fn index_exists_sql(&self, table: &str, index: &str) -> String {
        self.limit_offset_sql(
            &format!(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = {} AND name = {}",
                self.quote_literal(table),
                self.quote_literal(index)
            ),
            Some(1),
            None,
        )
    }

    fn modify_column_sql(
        &self,
        _table: &str,
        _old: &ColumnSpec,
        _new: &ColumnSpec,
        _registry: &TypeRegistry,
    ) -> Result<Vec<String>> {
        Err(unsupported(self.name(), "altering columns; recreate the table"))
    }
}
