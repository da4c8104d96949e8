//! Relational schema model shared by the desired and introspected sides.
//!
//! Both [`crate::builder::SchemaBuilder`] and the live introspector
//! produce a [`SchemaSpec`]; the differ compares two of them after
//! [`SchemaSpec::resolve`] has filled type defaults and canonicalized
//! literal defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{TypeOptions, TypeRegistry};

// ================================================================
// Defaults and referential actions
// ================================================================

/// Default value of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// A literal in its type's canonical text form (unquoted).
    Literal(String),
    /// A raw SQL expression such as `CURRENT_TIMESTAMP`.
    Expression(String),
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    /// No action.
    #[default]
    NoAction,
    /// Reject the change.
    Restrict,
    /// Propagate the change.
    Cascade,
    /// Set referencing columns to NULL.
    SetNull,
    /// Set referencing columns to their default.
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses a catalog rule such as `SET NULL` (case-insensitive).
    #[must_use]
    pub fn from_sql(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

// ================================================================
// Columns
// ================================================================

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Logical type name, resolved through the [`TypeRegistry`].
    #[serde(rename = "type")]
    pub type_name: String,
    /// Character length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Total digits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Fractional digits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Single-column uniqueness.
    #[serde(default)]
    pub unique: bool,
    /// Member of the table's primary key.
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnSpec {
    /// Creates a nullable column with no options.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            default: None,
            unique: false,
            primary_key: false,
        }
    }

    /// Declaration options carried by this column.
    #[must_use]
    pub const fn type_options(&self) -> TypeOptions {
        TypeOptions {
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            nullable: self.nullable,
        }
    }

    /// Returns the canonical form of this column: options the type does
    /// not use are cleared, unset ones take the type's defaults, literal
    /// defaults are normalized, and primary key columns are NOT NULL and
    /// not separately unique.
    ///
    /// # Errors
    ///
    /// Fails with `UnknownType` for an unregistered type, or
    /// `InvalidValue` for a literal default the type rejects.
    pub fn resolve(&self, registry: &TypeRegistry) -> Result<Self> {
        let ty = registry.resolve(&self.type_name)?;
        let options = ty.resolve_options(&self.type_options());
        let default = match &self.default {
            Some(DefaultValue::Literal(raw)) => {
                Some(DefaultValue::Literal(ty.normalize_default(raw, &options)?))
            }
            other => other.clone(),
        };
        Ok(Self {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            length: options.length,
            precision: options.precision,
            scale: options.scale,
            nullable: self.nullable && !self.primary_key,
            default,
            unique: self.unique && !self.primary_key,
            primary_key: self.primary_key,
        })
    }

    /// Two columns are equivalent when their resolved forms match.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors from either side.
    pub fn equivalent(&self, other: &Self, registry: &TypeRegistry) -> Result<bool> {
        Ok(self.resolve(registry)? == other.resolve(registry)?)
    }
}

// ================================================================
// Indexes and foreign keys
// ================================================================

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Creates an index with a name derived from the table and columns:
    /// `idx_<table>_<cols>` or `uniq_<table>_<cols>`.
    #[must_use]
    pub fn new(table: &str, columns: &[&str], unique: bool) -> Self {
        Self {
            name: Self::derive_name(table, columns, unique),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique,
        }
    }

    /// Creates an explicitly named index.
    #[must_use]
    pub fn named(name: impl Into<String>, columns: &[&str], unique: bool) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique,
        }
    }

    /// The deterministic name used for unnamed indexes.
    #[must_use]
    pub fn derive_name<S: AsRef<str>>(table: &str, columns: &[S], unique: bool) -> String {
        let prefix = if unique { "uniq" } else { "idx" };
        format!("{prefix}_{table}_{}", join_names(columns))
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// Constraint name.
    pub name: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// Action on update.
    #[serde(default)]
    pub on_update: ReferentialAction,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ReferentialAction,
}

impl ForeignKeySpec {
    /// Creates a foreign key named `fk_<table>_<cols>`.
    #[must_use]
    pub fn new(
        table: &str,
        columns: &[&str],
        referenced_table: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        Self::named(
            Self::derive_name(table, columns),
            columns,
            referenced_table,
            referenced_columns,
        )
    }

    /// Creates an explicitly named foreign key.
    #[must_use]
    pub fn named(
        name: impl Into<String>,
        columns: &[&str],
        referenced_table: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            referenced_table: referenced_table.into(),
            referenced_columns: referenced_columns.iter().map(|c| (*c).to_string()).collect(),
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::NoAction,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }

    /// The deterministic name used for unnamed foreign keys.
    #[must_use]
    pub fn derive_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
        format!("fk_{table}_{}", join_names(columns))
    }

    /// Same columns, target and actions, ignoring the name.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.referenced_table == other.referenced_table
            && self.referenced_columns == other.referenced_columns
            && self.on_update == other.on_update
            && self.on_delete == other.on_delete
    }

    /// Same columns and target, ignoring name and actions.
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.referenced_table == other.referenced_table
            && self.referenced_columns == other.referenced_columns
    }
}

fn join_names<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<&str>>()
        .join("_")
}

// ================================================================
// Tables and schemas
// ================================================================

/// A table: ordered columns plus indexes and foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,
    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl TableSpec {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Looks up a foreign key by name.
    #[must_use]
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKeySpec> {
        self.foreign_keys.iter().find(|f| f.name == name)
    }

    /// Primary key column names, in column order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Tables referenced by this table's foreign keys, excluding itself.
    #[must_use]
    pub fn referenced_tables(&self) -> BTreeSet<&str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.referenced_table.as_str())
            .filter(|t| *t != self.name)
            .collect()
    }

    /// Returns a copy without foreign keys.
    #[must_use]
    pub fn without_foreign_keys(&self) -> Self {
        Self {
            foreign_keys: Vec::new(),
            ..self.clone()
        }
    }

    /// Returns the canonical form of every column.
    ///
    /// # Errors
    ///
    /// Propagates [`ColumnSpec::resolve`] errors.
    pub fn resolve(&self, registry: &TypeRegistry) -> Result<Self> {
        Ok(Self {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| c.resolve(registry))
                .collect::<Result<_>>()?,
            indexes: self.indexes.clone(),
            foreign_keys: self.foreign_keys.clone(),
        })
    }
}

impl fmt::Display for TableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.type_name))
            .collect();
        write!(f, "{}({})", self.name, cols.join(", "))
    }
}

/// A set of tables keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Tables by name.
    pub tables: BTreeMap<String, TableSpec>,
}

impl SchemaSpec {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table.
    pub fn add_table(&mut self, table: TableSpec) -> &mut Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Builder-style [`SchemaSpec::add_table`].
    #[must_use]
    pub fn with_table(mut self, table: TableSpec) -> Self {
        self.add_table(table);
        self
    }

    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.get(name)
    }

    /// Whether a table exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Whether the schema has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Returns the canonical form of every table.
    ///
    /// # Errors
    ///
    /// Propagates [`ColumnSpec::resolve`] errors.
    pub fn resolve(&self, registry: &TypeRegistry) -> Result<Self> {
        let tables = self
            .tables
            .iter()
            .map(|(name, table)| Ok((name.clone(), table.resolve(registry)?)))
            .collect::<Result<_>>()?;
        Ok(Self { tables })
    }
}

impl FromIterator<TableSpec> for SchemaSpec {
    fn from_iter<I: IntoIterator<Item = TableSpec>>(iter: I) -> Self {
        Self {
            tables: iter.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtin_types()
    }

    #[test]
    fn resolve_fills_type_defaults() {
        let col = ColumnSpec::new("email", "string").resolve(&registry()).unwrap();
        assert_eq!(col.length, Some(255));

        let mut explicit = ColumnSpec::new("email", "string");
        explicit.length = Some(255);
        assert!(explicit
            .equivalent(&ColumnSpec::new("email", "string"), &registry())
            .unwrap());
    }

    #[test]
    fn resolve_clears_unused_options() {
        let mut col = ColumnSpec::new("n", "integer");
        col.length = Some(11);
        assert_eq!(col.resolve(&registry()).unwrap().length, None);
    }

    #[test]
    fn decimal_defaults_compare_at_column_scale() {
        let mut a = ColumnSpec::new("price", "decimal");
        a.precision = Some(10);
        a.scale = Some(2);
        a.default = Some(DefaultValue::Literal("10".into()));
        let mut b = a.clone();
        b.default = Some(DefaultValue::Literal(" 10.00 ".into()));
        assert!(a.equivalent(&b, &registry()).unwrap());

        b.default = Some(DefaultValue::Literal("10.01".into()));
        assert!(!a.equivalent(&b, &registry()).unwrap());
    }

    #[test]
    fn primary_key_implies_not_null() {
        let mut col = ColumnSpec::new("id", "uuid");
        col.primary_key = true;
        col.unique = true;
        let resolved = col.resolve(&registry()).unwrap();
        assert!(!resolved.nullable);
        assert!(!resolved.unique);
    }

    #[test]
    fn derived_names() {
        assert_eq!(
            IndexSpec::new("users", &["last", "first"], false).name,
            "idx_users_last_first"
        );
        assert_eq!(IndexSpec::new("users", &["email"], true).name, "uniq_users_email");
        assert_eq!(
            ForeignKeySpec::new("todos", &["user_id"], "users", &["id"]).name,
            "fk_todos_user_id"
        );
    }

    #[test]
    fn referential_action_parsing() {
        assert_eq!(
            ReferentialAction::from_sql("set null"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(
            ReferentialAction::from_sql("NO_ACTION"),
            Some(ReferentialAction::NoAction)
        );
        assert_eq!(ReferentialAction::from_sql("bogus"), None);
    }

    #[test]
    fn referenced_tables_skip_self() {
        let mut table = TableSpec::new("nodes");
        table
            .foreign_keys
            .push(ForeignKeySpec::new("nodes", &["parent_id"], "nodes", &["id"]));
        table
            .foreign_keys
            .push(ForeignKeySpec::new("nodes", &["owner_id"], "users", &["id"]));
        assert_eq!(table.referenced_tables().into_iter().collect::<Vec<_>>(), vec!["users"]);
    }
}
