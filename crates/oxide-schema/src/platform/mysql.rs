//! MySQL and MariaDB platform.
//!
//! DDL statements commit implicitly, so a migration is applied one
//! statement at a time and a failure aborts the run without rollback.
//! Foreign keys can be added and dropped in place; foreign key checks
//! are switched off around a migration.
//!
//! Every foreign key is declared together with a support index of the
//! same name, so dropping the key can drop that index too instead of
//! leaving InnoDB's implicit one behind.

use super::{strip_parens, unquote, Platform, PlatformFamily};
use crate::error::Result;
use crate::schema::{ColumnSpec, DefaultValue, ForeignKeySpec};
use crate::types::TypeRegistry;

/// MySQL / MariaDB platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlPlatform;

impl MySqlPlatform {
    /// Creates the platform.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn support_key(&self, fk: &ForeignKeySpec) -> String {
        format!(
            "KEY {} ({})",
            self.quote_identifier(&fk.name),
            self.quote_list(&fk.columns)
        )
    }

    fn constraint(&self, fk: &ForeignKeySpec) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(&fk.name),
            self.quote_list(&fk.columns),
            self.quote_identifier(&fk.referenced_table),
            self.quote_list(&fk.referenced_columns),
            fk.on_delete.as_sql(),
            fk.on_update.as_sql(),
        )
    }
}

impl Platform for MySqlPlatform {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::MySql
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn supports_transactional_ddl(&self) -> bool {
        false
    }

    fn begin_sql(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn disable_constraints_sql(&self) -> Option<&'static str> {
        Some("SET FOREIGN_KEY_CHECKS = 0")
    }

    fn enable_constraints_sql(&self) -> Option<&'static str> {
        Some("SET FOREIGN_KEY_CHECKS = 1")
    }

    fn list_tables_sql(&self) -> String {
        "SELECT TABLE_NAME AS name FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME"
            .to_string()
    }

    // Expression defaults are flagged DEFAULT_GENERATED on MySQL 8 and
    // come back wrapped in parentheses so they parse as expressions.
    fn list_columns_sql(&self, table: &str) -> String {
        format!(
            "SELECT c.COLUMN_NAME AS name, c.COLUMN_TYPE AS data_type, \
             CASE WHEN c.IS_NULLABLE = 'NO' THEN 1 ELSE 0 END AS not_null, \
             CASE WHEN c.EXTRA LIKE '%DEFAULT_GENERATED%' THEN CONCAT('(', c.COLUMN_DEFAULT, ')') \
             ELSE c.COLUMN_DEFAULT END AS default_value, \
             COALESCE(k.ORDINAL_POSITION, 0) AS pk \
             FROM information_schema.COLUMNS c \
             LEFT JOIN information_schema.KEY_COLUMN_USAGE k \
             ON k.TABLE_SCHEMA = c.TABLE_SCHEMA AND k.TABLE_NAME = c.TABLE_NAME \
             AND k.COLUMN_NAME = c.COLUMN_NAME AND k.CONSTRAINT_NAME = 'PRIMARY' \
             WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = {} \
             ORDER BY c.ORDINAL_POSITION",
            self.quote_literal(table)
        )
    }

    fn list_indexes_sql(&self, table: &str) -> String {
        format!(
            "SELECT s.INDEX_NAME AS index_name, s.COLUMN_NAME AS column_name, \
             CASE WHEN s.NON_UNIQUE = 0 THEN 1 ELSE 0 END AS is_unique, \
             CASE WHEN s.INDEX_NAME = 'PRIMARY' THEN 'pk' \
             WHEN EXISTS (SELECT 1 FROM information_schema.TABLE_CONSTRAINTS tc \
             WHERE tc.TABLE_SCHEMA = s.TABLE_SCHEMA AND tc.TABLE_NAME = s.TABLE_NAME \
             AND tc.CONSTRAINT_NAME = s.INDEX_NAME AND tc.CONSTRAINT_TYPE = 'FOREIGN KEY') THEN 'fk' \
             WHEN s.NON_UNIQUE = 0 AND s.INDEX_NAME = s.COLUMN_NAME THEN 'u' \
             ELSE 'c' END AS origin \
             FROM information_schema.STATISTICS s \
             WHERE s.TABLE_SCHEMA = DATABASE() AND s.TABLE_NAME = {} \
             ORDER BY s.INDEX_NAME, s.SEQ_IN_INDEX",
            self.quote_literal(table)
        )
    }

    fn list_foreign_keys_sql(&self, table: &str) -> String {
        format!(
            "SELECT rc.CONSTRAINT_NAME AS constraint_id, rc.CONSTRAINT_NAME AS constraint_name, \
             k.COLUMN_NAME AS column_name, k.REFERENCED_TABLE_NAME AS referenced_table, \
             k.REFERENCED_COLUMN_NAME AS referenced_column, \
             rc.UPDATE_RULE AS on_update, rc.DELETE_RULE AS on_delete \
             FROM information_schema.REFERENTIAL_CONSTRAINTS rc \
             JOIN information_schema.KEY_COLUMN_USAGE k \
             ON k.CONSTRAINT_SCHEMA = rc.CONSTRAINT_SCHEMA AND k.CONSTRAINT_NAME = rc.CONSTRAINT_NAME \
             AND k.TABLE_NAME = rc.TABLE_NAME \
             WHERE rc.CONSTRAINT_SCHEMA = DATABASE() AND rc.TABLE_NAME = {} \
             ORDER BY rc.CONSTRAINT_NAME, k.ORDINAL_POSITION",
            self.quote_literal(table)
        )
    }

    fn table_exists_sql(&self, table: &str) -> String {
        self.limit_offset_sql(
            &format!(
                "SELECT TABLE_NAME AS name FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
                self.quote_literal(table)
            ),
            Some(1),
            None,
        )
    }

    fn index_exists_sql(&self, table: &str, index: &str) -> String {
        self.limit_offset_sql(
            &format!(
                "SELECT INDEX_NAME AS name FROM information_schema.STATISTICS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {} AND INDEX_NAME = {}",
                self.quote_literal(table),
                self.quote_literal(index)
            ),
            Some(1),
            None,
        )
    }

    // MySQL prints literal defaults bare and MariaDB quotes them; both
    // report a missing default as NULL.
    fn parse_default(&self, raw: Option<&str>) -> Option<DefaultValue> {
        let raw = raw?;
        if raw.is_empty() {
            return Some(DefaultValue::Literal(String::new()));
        }
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("NULL") {
            return None;
        }
        if let Some(text) = unquote(raw, true) {
            return Some(DefaultValue::Literal(text));
        }
        if raw.starts_with('(') {
            return Some(DefaultValue::Expression(strip_parens(raw).to_string()));
        }
        let upper = raw.to_ascii_uppercase();
        if upper.starts_with("CURRENT_TIMESTAMP") || upper == "NOW()" {
            return Some(DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()));
        }
        Some(DefaultValue::Literal(raw.to_string()))
    }

    // A column-level UNIQUE creates an index named after the column.
    fn modify_column_sql(
        &self,
        table: &str,
        old: &ColumnSpec,
        new: &ColumnSpec,
        registry: &TypeRegistry,
    ) -> Result<Vec<String>> {
        let mut definition = new.clone();
        definition.unique = new.unique && !old.unique;
        let mut statements = vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(&definition, registry)?
        )];
        if old.unique && !new.unique && !new.primary_key {
            statements.push(format!(
                "ALTER TABLE {} DROP INDEX {}",
                self.quote_identifier(table),
                self.quote_identifier(&old.name)
            ));
        }
        Ok(statements)
    }

    fn drop_index_sql(&self, table: &str, index: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(index),
            self.quote_identifier(table)
        )
    }

    fn foreign_key_clause(&self, fk: &ForeignKeySpec) -> String {
        format!("{}, {}", self.support_key(fk), self.constraint(fk))
    }

    fn add_foreign_key_sql(&self, table: &str, fk: &ForeignKeySpec) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD {}, ADD {}",
            self.quote_identifier(table),
            self.support_key(fk),
            self.constraint(fk)
        ))
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> Result<String> {
        let name = self.quote_identifier(name);
        Ok(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {name}, DROP INDEX {name}",
            self.quote_identifier(table)
        ))
    }
}
