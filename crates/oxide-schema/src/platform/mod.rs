//! Platform capability providers.
//!
//! A [`Platform`] exposes everything the core needs to know about a
//! database engine: identifier and literal quoting, type declaration
//! dispatch, catalog queries for introspection, transaction and
//! savepoint primitives, foreign key capability flags, and DDL phrasing.
//!
//! The default method bodies produce ANSI-style SQL; each engine
//! overrides what it phrases differently.

mod generic;
mod mysql;
mod sqlite;

pub use generic::GenericPlatform;
pub use mysql::MySqlPlatform;
pub use sqlite::SqlitePlatform;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::operation::Operation;
use crate::schema::{ColumnSpec, DefaultValue, ForeignKeySpec, IndexSpec, TableSpec};
use crate::types::TypeRegistry;

/// Declaration family used to pick a logical type's override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    /// ANSI-style declarations.
    Generic,
    /// SQLite.
    Sqlite,
    /// MySQL and MariaDB.
    MySql,
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generic => "generic",
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        })
    }
}

/// Capabilities and SQL phrasing of a database engine.
pub trait Platform: fmt::Debug + Send + Sync {
    /// Platform name.
    fn name(&self) -> &'static str;

    /// Declaration family for logical types.
    fn family(&self) -> PlatformFamily;

    // ================================================================
    // Quoting
    // ================================================================

    /// Identifier quote character.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(name.len() + 2);
        out.push(q);
        for ch in name.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
        out
    }

    /// Quotes a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Appends a row limit and offset to a query.
    fn limit_offset_sql(&self, query: &str, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = query.to_string();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    // ================================================================
    // Capabilities
    // ================================================================

    /// Whether foreign keys exist at all.
    fn supports_foreign_keys(&self) -> bool {
        true
    }

    /// Whether foreign keys can be declared inside `CREATE TABLE`.
    fn supports_inline_foreign_keys(&self) -> bool {
        true
    }

    /// Whether foreign keys can be added to an existing table.
    fn supports_add_foreign_key(&self) -> bool {
        true
    }

    /// Whether foreign keys can be dropped from an existing table.
    fn supports_drop_foreign_key(&self) -> bool {
        true
    }

    /// Whether savepoints are available.
    fn supports_savepoints(&self) -> bool {
        true
    }

    /// Whether DDL statements take part in transactions.
    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    /// Whether `op` has to be expressed as a table rebuild.
    fn requires_recreate(&self, _op: &Operation) -> bool {
        false
    }

    // ================================================================
    // Transactions
    // ================================================================

    /// Savepoint name for the operation at `index`.
    fn savepoint_name(&self, index: usize) -> String {
        format!("oxide_sp_{index}")
    }

    /// Starts a transaction.
    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    /// Commits the transaction.
    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    /// Rolls back the transaction.
    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Creates a savepoint.
    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVEPOINT {}", self.quote_identifier(name))
    }

    /// Releases a savepoint.
    fn release_savepoint_sql(&self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {}", self.quote_identifier(name))
    }

    /// Rolls back to a savepoint.
    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", self.quote_identifier(name))
    }

    /// Statement run before a migration, outside its transaction.
    fn disable_constraints_sql(&self) -> Option<&'static str> {
        None
    }

    /// Statement run after a migration, outside its transaction.
    fn enable_constraints_sql(&self) -> Option<&'static str> {
        None
    }

    // ================================================================
    // Catalog
    // ================================================================

    /// Lists user tables; one `name` column.
    fn list_tables_sql(&self) -> String;

    /// Lists columns as `name, data_type, not_null, default_value, pk`.
    fn list_columns_sql(&self, table: &str) -> String;

    /// Lists index columns as `index_name, column_name, is_unique,
    /// origin`, where origin is `pk`, `u` (inline unique), `fk` (implicit
    /// foreign key support) or `c` (created).
    fn list_indexes_sql(&self, table: &str) -> String;

    /// Lists foreign key columns as `constraint_id, constraint_name,
    /// column_name, referenced_table, referenced_column, on_update,
    /// on_delete`.
    fn list_foreign_keys_sql(&self, table: &str) -> String;

    /// Returns a row when `table` exists.
    fn table_exists_sql(&self, table: &str) -> String;

    /// Returns a row when index `index` exists on `table`.
    fn index_exists_sql(&self, table: &str, index: &str) -> String;

    /// Interprets a catalog default. `None` means no default.
    fn parse_default(&self, raw: Option<&str>) -> Option<DefaultValue> {
        parse_default_sql(raw?)
    }

    // ================================================================
    // DDL
    // ================================================================

    /// Renders a column default clause body. Literals are normalized
    /// through the column's type first.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] for unregistered types and
    /// [`SchemaError::InvalidValue`] for literals the type rejects.
    fn default_sql(&self, column: &ColumnSpec, registry: &TypeRegistry) -> Result<Option<String>> {
        Ok(match &column.default {
            None => None,
            Some(DefaultValue::Literal(value)) => {
                let ty = registry.resolve(&column.type_name)?;
                let value = ty.normalize_default(value, &ty.resolve_options(&column.type_options()))?;
                if ty.numeric_literal() {
                    Some(value)
                } else {
                    Some(self.quote_literal(&value))
                }
            }
            Some(DefaultValue::Expression(expr)) => Some(expression_sql(expr)),
        })
    }

    /// Renders a column definition.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] for unregistered types.
    fn column_definition(&self, column: &ColumnSpec, registry: &TypeRegistry) -> Result<String> {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            registry.declare(&column.type_name, self.family(), &column.type_options())?,
        ];
        if !column.nullable || column.primary_key {
            parts.push("NOT NULL".to_string());
        }
        if column.unique && !column.primary_key {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default) = self.default_sql(column, registry)? {
            parts.push(format!("DEFAULT {default}"));
        }
        Ok(parts.join(" "))
    }

    /// Renders the `CONSTRAINT ... FOREIGN KEY` clause.
    fn foreign_key_clause(&self, fk: &ForeignKeySpec) -> String {
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

    /// Quotes and joins identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE`; foreign keys are declared inline when
    /// `inline_foreign_keys` is set. Indexes are not included.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] for unregistered types.
    fn create_table_sql(
        &self,
        table: &TableSpec,
        registry: &TypeRegistry,
        inline_foreign_keys: bool,
    ) -> Result<String> {
        let mut lines = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, registry))
            .collect::<Result<Vec<_>>>()?;
        let pk: Vec<String> = table.primary_key().iter().map(|c| (*c).to_string()).collect();
        if !pk.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.quote_list(&pk)));
        }
        if inline_foreign_keys {
            lines.extend(table.foreign_keys.iter().map(|fk| self.foreign_key_clause(fk)));
        }
        Ok(format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            lines.join(",\n  ")
        ))
    }

    /// `DROP TABLE`.
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Renames a table.
    fn rename_table_sql(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// `ALTER TABLE ... ADD COLUMN`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] for unregistered types.
    fn add_column_sql(&self, table: &str, column: &ColumnSpec, registry: &TypeRegistry) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, registry)?
        ))
    }

    /// `ALTER TABLE ... DROP COLUMN`.
    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// In-place column change.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ConfigurationError`] when the platform cannot
    /// alter columns, or [`SchemaError::UnknownType`].
    fn modify_column_sql(
        &self,
        table: &str,
        old: &ColumnSpec,
        new: &ColumnSpec,
        registry: &TypeRegistry,
    ) -> Result<Vec<String>>;

    /// `CREATE [UNIQUE] INDEX`.
    fn create_index_sql(&self, table: &str, index: &IndexSpec) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.quote_list(&index.columns)
        )
    }

    /// Drops an index.
    fn drop_index_sql(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(index))
    }

    /// Adds a foreign key to an existing table.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ConfigurationError`] when unsupported.
    fn add_foreign_key_sql(&self, table: &str, fk: &ForeignKeySpec) -> Result<String> {
        if !self.supports_add_foreign_key() {
            return Err(unsupported(self.name(), "adding foreign keys to existing tables"));
        }
        Ok(format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(fk)
        ))
    }

    /// Drops a foreign key from an existing table.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ConfigurationError`] when unsupported.
    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> Result<String> {
        if !self.supports_drop_foreign_key() {
            return Err(unsupported(self.name(), "dropping foreign keys from existing tables"));
        }
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        ))
    }
}

pub(crate) fn unsupported(platform: &str, what: &str) -> SchemaError {
    SchemaError::ConfigurationError(format!("{platform} does not support {what}"))
}

/// Renders an expression default, parenthesized unless it is a bare
/// keyword such as `CURRENT_TIMESTAMP`.
pub(crate) fn expression_sql(expr: &str) -> String {
    let expr = expr.trim();
    if is_keyword(expr) || is_parenthesized(expr) {
        expr.to_string()
    } else {
        format!("({expr})")
    }
}

fn is_keyword(expr: &str) -> bool {
    !expr.is_empty() && expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether the opening paren at the start closes at the very end.
fn is_parenthesized(expr: &str) -> bool {
    if !expr.starts_with('(') || !expr.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, ch) in expr.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != expr.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

pub(crate) fn strip_parens(mut expr: &str) -> &str {
    expr = expr.trim();
    while is_parenthesized(expr) {
        expr = expr[1..expr.len() - 1].trim();
    }
    expr
}

/// Parses a default the way SQL catalogs print it: `NULL` is no default,
/// quoted text and numbers are literals, everything else an expression.
pub(crate) fn parse_default_sql(raw: &str) -> Option<DefaultValue> {
    let raw = strip_parens(raw);
    if raw.is_empty() || raw.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if let Some(text) = unquote(raw, false) {
        return Some(DefaultValue::Literal(text));
    }
    if raw.parse::<f64>().is_ok() || raw.eq_ignore_ascii_case("TRUE") || raw.eq_ignore_ascii_case("FALSE") {
        return Some(DefaultValue::Literal(raw.to_ascii_lowercase()));
    }
    Some(DefaultValue::Expression(raw.to_string()))
}

/// Unescapes a single-quoted SQL string, ignoring a trailing `::cast`.
/// Backslash escapes are honored only when `backslash` is set.
pub(crate) fn unquote(raw: &str, backslash: bool) -> Option<String> {
    let body = raw.strip_prefix('\'')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
                continue;
            }
            let rest: String = chars.collect();
            return (rest.is_empty() || rest.starts_with("::")).then_some(out);
        }
        if backslash && ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
            continue;
        }
        out.push(ch);
    }
    None
}
