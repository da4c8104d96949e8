//! ANSI-style platform with configurable capabilities.
//!
//! Useful for rendering portable DDL and for exercising the differ's
//! capability gating without a live database.

use super::{Platform, PlatformFamily};
use crate::error::Result;
use crate::schema::ColumnSpec;
use crate::types::TypeRegistry;

/// Generic platform.
///
/// # Example
///
/// ```rust
/// use oxide_schema::platform::{GenericPlatform, Platform};
///
/// let platform = GenericPlatform::new().with_inline_foreign_keys(false);
/// assert!(!platform.supports_inline_foreign_keys());
/// assert!(platform.supports_add_foreign_key());
/// ```
#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
pub struct GenericPlatform {
    foreign_keys: bool,
    inline_foreign_keys: bool,
    add_foreign_key: bool,
    drop_foreign_key: bool,
    savepoints: bool,
}

impl Default for GenericPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericPlatform {
    /// A platform supporting every feature.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            foreign_keys: true,
            inline_foreign_keys: true,
            add_foreign_key: true,
            drop_foreign_key: true,
            savepoints: true,
        }
    }

    /// Toggles foreign key support altogether.
    #[must_use]
    pub const fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Toggles inline foreign keys in `CREATE TABLE`.
    #[must_use]
    pub const fn with_inline_foreign_keys(mut self, enabled: bool) -> Self {
        self.inline_foreign_keys = enabled;
        self
    }

    /// Toggles adding and dropping foreign keys on existing tables.
    #[must_use]
    pub const fn with_alter_foreign_keys(mut self, enabled: bool) -> Self {
        self.add_foreign_key = enabled;
        self.drop_foreign_key = enabled;
        self
    }

    /// Toggles savepoint support.
    #[must_use]
    pub const fn with_savepoints(mut self, enabled: bool) -> Self {
        self.savepoints = enabled;
        self
    }
}

impl Platform for GenericPlatform {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Generic
    }

    fn supports_foreign_keys(&self) -> bool {
        self.foreign_keys
    }

    fn supports_inline_foreign_keys(&self) -> bool {
        self.foreign_keys && self.inline_foreign_keys
    }

    fn supports_add_foreign_key(&self) -> bool {
        self.foreign_keys && self.add_foreign_key
    }

    fn supports_drop_foreign_key(&self) -> bool {
        self.foreign_keys && self.drop_foreign_key
    }

    fn supports_savepoints(&self) -> bool {
        self.savepoints
    }

    fn list_tables_sql(&self) -> String {
        "SELECT table_name AS name FROM information_schema.tables \
         WHERE table_schema = CURRENT_SCHEMA AND table_type = 'BASE TABLE' ORDER BY table_name"
            .to_string()
    }

    fn list_columns_sql(&self, table: &str) -> String {
        format!(
            "SELECT c.column_name AS name, c.data_type AS data_type, \
             CASE WHEN c.is_nullable = 'NO' THEN 1 ELSE 0 END AS not_null, \
             c.column_default AS default_value, COALESCE(k.ordinal_position, 0) AS pk \
             FROM information_schema.columns c \
             LEFT JOIN information_schema.table_constraints tc \
             ON tc.table_schema = c.table_schema AND tc.table_name = c.table_name \
             AND tc.constraint_type = 'PRIMARY KEY' \
             LEFT JOIN information_schema.key_column_usage k \
             ON k.constraint_name = tc.constraint_name AND k.table_schema = c.table_schema \
             AND k.table_name = c.table_name AND k.column_name = c.column_name \
             WHERE c.table_schema = CURRENT_SCHEMA AND c.table_name = {} \
             ORDER BY c.ordinal_position",
            self.quote_literal(table)
        )
    }

    fn list_indexes_sql(&self, table: &str) -> String {
        format!(
            "SELECT tc.constraint_name AS index_name, k.column_name AS column_name, 1 AS is_unique, \
             CASE WHEN tc.constraint_type = 'PRIMARY KEY' THEN 'pk' ELSE 'u' END AS origin \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage k \
             ON k.constraint_name = tc.constraint_name AND k.table_schema = tc.table_schema \
             WHERE tc.table_schema = CURRENT_SCHEMA AND tc.table_name = {} \
             AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
             ORDER BY tc.constraint_name, k.ordinal_position",
            self.quote_literal(table)
        )
    }

    fn list_foreign_keys_sql(&self, table: &str) -> String {
        format!(
            "SELECT rc.constraint_name AS constraint_id, rc.constraint_name AS constraint_name, \
             k.column_name AS column_name, ccu.table_name AS referenced_table, \
             ccu.column_name AS referenced_column, rc.update_rule AS on_update, rc.delete_rule AS on_delete \
             FROM information_schema.referential_constraints rc \
             JOIN information_schema.key_column_usage k \
             ON k.constraint_name = rc.constraint_name AND k.constraint_schema = rc.constraint_schema \
             JOIN information_schema.constraint_column_usage ccu \
             ON ccu.constraint_name = rc.unique_constraint_name \
             WHERE k.table_schema = CURRENT_SCHEMA AND k.table_name = {} \
             ORDER BY rc.constraint_name, k.ordinal_position",
            self.quote_literal(table)
        )
    }

    fn table_exists_sql(&self, table: &str) -> String {
        self.limit_offset_sql(
            &format!(
                "SELECT table_name AS name FROM information_schema.tables \
                 WHERE table_schema = CURRENT_SCHEMA AND table_name = {}",
                self.quote_literal(table)
            ),
            Some(1),
            None,
        )
    }

    fn index_exists_sql(&self, table: &str, index: &str) -> String {
        self.limit_offset_sql(
            &format!(
                "SELECT constraint_name AS name FROM information_schema.table_constraints \
                 WHERE table_schema = CURRENT_SCHEMA AND table_name = {} AND constraint_name = {}",
                self.quote_literal(table),
                self.quote_literal(index)
            ),
            Some(1),
            None,
        )
    }

    fn modify_column_sql(
        &self,
        table: &str,
        old: &ColumnSpec,
        new: &ColumnSpec,
        registry: &TypeRegistry,
    ) -> Result<Vec<String>> {
        let alter = format!("ALTER TABLE {}", self.quote_identifier(table));
        let column = self.quote_identifier(&new.name);
        let mut statements = Vec::new();

        let old_type = registry.declare(&old.type_name, self.family(), &old.type_options())?;
        let new_type = registry.declare(&new.type_name, self.family(), &new.type_options())?;
        if old_type != new_type {
            statements.push(format!("{alter} ALTER COLUMN {column} TYPE {new_type}"));
        }
        if old.nullable != new.nullable {
            let action = if new.nullable { "DROP" } else { "SET" };
            statements.push(format!("{alter} ALTER COLUMN {column} {action} NOT NULL"));
        }
        if old.default != new.default {
            match self.default_sql(new, registry)? {
                Some(default) => {
                    statements.push(format!("{alter} ALTER COLUMN {column} SET DEFAULT {default}"));
                }
                None => statements.push(format!("{alter} ALTER COLUMN {column} DROP DEFAULT")),
            }
        }
        if old.unique != new.unique {
            let constraint = self.quote_identifier(&crate::schema::IndexSpec::derive_name(
                table,
                &[new.name.as_str()],
                true,
            ));
            if new.unique {
                statements.push(format!("{alter} ADD CONSTRAINT {constraint} UNIQUE ({column})"));
            } else {
                statements.push(format!("{alter} DROP CONSTRAINT {constraint}"));
            }
        }
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DefaultValue;

    #[test]
    fn capability_toggles() {
        let p = GenericPlatform::new().with_foreign_keys(false);
        assert!(!p.supports_foreign_keys());
        assert!(!p.supports_inline_foreign_keys());
        assert!(!p.supports_add_foreign_key());

        let p = GenericPlatform::new().with_alter_foreign_keys(false);
        assert!(p.supports_inline_foreign_keys());
        assert!(!p.supports_drop_foreign_key());
    }

    #[test]
    fn modify_column_emits_one_statement_per_change() {
        let registry = TypeRegistry::with_builtin_types();
        let old = ColumnSpec::new("email", "string");
        let mut new = old.clone();
        new.length = Some(500);
        new.nullable = false;
        new.default = Some(DefaultValue::Literal("x".into()));
        let sql = GenericPlatform::new()
            .modify_column_sql("users", &old, &new, &registry)
            .unwrap();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" TYPE VARCHAR(500)".to_string(),
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" SET NOT NULL".to_string(),
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" SET DEFAULT 'x'".to_string(),
            ]
        );
    }

    #[test]
    fn limit_offset_template() {
        assert_eq!(
            GenericPlatform::new().limit_offset_sql("SELECT 1", Some(10), Some(20)),
            "SELECT 1 LIMIT 10 OFFSET 20"
        );
    }
}
