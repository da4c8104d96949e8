//! Reads the current schema back from a live database.
//!
//! Every catalog query comes from the connection's platform and returns a
//! normalized row shape, so this module is backend agnostic. Implicit
//! indexes (primary keys, inline `UNIQUE`, MySQL's foreign key support
//! indexes) are folded back into the column model instead of surfacing as
//! secondary indexes.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use oxide_schema::platform::Platform;
use oxide_schema::render::RECREATE_PREFIX;
use oxide_schema::schema::{
    ColumnSpec, DefaultValue, ForeignKeySpec, IndexSpec, ReferentialAction, SchemaSpec, TableSpec,
};
use oxide_schema::types::{LogicalType, TypeOptions, TypeRegistry};
use oxide_schema::SchemaError;

use crate::connection::{Connection, Row};
use crate::error::{MigrateError, Result};

/// Builds a [`SchemaSpec`] from a database catalog.
#[derive(Debug, Clone, Copy)]
pub struct Introspector<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Introspector<'r> {
    /// Creates an introspector resolving native types through `registry`.
    #[must_use]
    pub const fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Reads every table of the connected database.
    ///
    /// Leftover scratch tables from an interrupted table recreation are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::QueryFailed`] if a catalog query fails and
    /// [`SchemaError::UnknownType`] for native types no logical type claims.
    pub fn introspect<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<SchemaSpec> {
        let sql = conn.platform().list_tables_sql();
        let names = conn
            .query(&sql)?
            .iter()
            .map(|row| required(row, "name", &sql))
            .collect::<Result<Vec<_>>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            if name.starts_with(RECREATE_PREFIX) {
                warn!(table = %name, "Skipping leftover scratch table");
                continue;
            }
            tables.push(self.read_table(conn, &name)?);
        }
        fill_referenced_columns(&mut tables);

        info!(
            tables = tables.len(),
            platform = conn.platform().name(),
            "Introspected schema"
        );
        Ok(tables.into_iter().collect())
    }

    /// Whether `table` exists.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::QueryFailed`] if the catalog query fails.
    pub fn table_exists<C: Connection + ?Sized>(&self, conn: &mut C, table: &str) -> Result<bool> {
        let sql = conn.platform().table_exists_sql(table);
        Ok(!conn.query(&sql)?.is_empty())
    }

    /// Whether index `index` exists on `table`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::QueryFailed`] if the catalog query fails.
    pub fn index_exists<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
        index: &str,
    ) -> Result<bool> {
        let sql = conn.platform().index_exists_sql(table, index);
        Ok(!conn.query(&sql)?.is_empty())
    }

    fn read_table<C: Connection + ?Sized>(&self, conn: &mut C, name: &str) -> Result<TableSpec> {
        let mut table = TableSpec::new(name);

        // ---- columns ----
        let sql = conn.platform().list_columns_sql(name);
        let rows = conn.query(&sql)?;
        for row in &rows {
            let column = self.read_column(conn.platform(), name, row, &sql)?;
            table.columns.push(column);
        }

        // ---- indexes ----
        let sql = conn.platform().list_indexes_sql(name);
        let rows = conn.query(&sql)?;
        for (index_name, group) in group_by(&rows, "index_name", &sql)? {
            let columns = group
                .iter()
                .map(|row| required(row, "column_name", &sql))
                .collect::<Result<Vec<_>>>()?;
            let unique = group.first().is_some_and(|row| row.flag("is_unique"));
            let origin = group.first().and_then(|row| row.text("origin")).unwrap_or_default();
            match origin.as_str() {
                "pk" | "fk" => {
                    debug!(table = %name, index = %index_name, origin = %origin, "Folding implicit index");
                }
                "u" if columns.len() == 1 => {
                    if let Some(column) = table.columns.iter_mut().find(|c| c.name == columns[0]) {
                        column.unique = true;
                    }
                }
                _ => table.indexes.push(IndexSpec {
                    name: index_name,
                    columns,
                    unique,
                }),
            }
        }

        // ---- foreign keys ----
        let sql = conn.platform().list_foreign_keys_sql(name);
        let rows = conn.query(&sql)?;
        for (_, group) in group_by(&rows, "constraint_id", &sql)? {
            table.foreign_keys.push(read_foreign_key(name, &group, &sql)?);
        }

        debug!(
            table = %name,
            columns = table.columns.len(),
            indexes = table.indexes.len(),
            foreign_keys = table.foreign_keys.len(),
            "Read table"
        );
        Ok(table)
    }

    fn read_column(
        &self,
        platform: &dyn Platform,
        table: &str,
        row: &Row,
        sql: &str,
    ) -> Result<ColumnSpec> {
        let name = required(row, "name", sql)?;
        let native = row.text("data_type").unwrap_or_default();
        let (ty, options) = self
            .registry
            .resolve_native(platform.family(), &native)
            .ok_or_else(|| SchemaError::UnknownType(format!("{native} ({table}.{name})")))?;
        let primary_key = row.integer("pk").unwrap_or(0) > 0;
        let default = platform
            .parse_default(row.text("default_value").as_deref())
            .map(|default| normalize_default(ty, &options, default, table, &name));

        Ok(ColumnSpec {
            type_name: ty.name().to_string(),
            length: options.length,
            precision: options.precision,
            scale: options.scale,
            nullable: !row.flag("not_null") && !primary_key,
            default,
            unique: false,
            primary_key,
            name,
        })
    }
}

fn read_foreign_key(table: &str, group: &[&Row], sql: &str) -> Result<ForeignKeySpec> {
    let first = group
        .first()
        .ok_or_else(|| MigrateError::query_failed(sql, "empty foreign key group"))?;
    let columns = group
        .iter()
        .map(|row| required(row, "column_name", sql))
        .collect::<Result<Vec<_>>>()?;
    let referenced: Vec<String> = group
        .iter()
        .filter_map(|row| row.text("referenced_column"))
        .filter(|c| !c.is_empty())
        .collect();
    let name = first
        .text("constraint_name")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| ForeignKeySpec::derive_name(table, &columns));
    let action = |field: &str| {
        first
            .text(field)
            .as_deref()
            .and_then(ReferentialAction::from_sql)
            .unwrap_or_default()
    };

    Ok(ForeignKeySpec {
        name,
        // Filled from the referenced primary key once every table is read.
        referenced_columns: if referenced.len() == columns.len() {
            referenced
        } else {
            Vec::new()
        },
        columns,
        referenced_table: required(first, "referenced_table", sql)?,
        on_update: action("on_update"),
        on_delete: action("on_delete"),
    })
}

/// SQLite allows `REFERENCES users` without columns, meaning the primary key.
fn fill_referenced_columns(tables: &mut [TableSpec]) {
    let primary_keys: HashMap<String, Vec<String>> = tables
        .iter()
        .map(|t| {
            let pk = t.primary_key().iter().map(|c| (*c).to_string()).collect();
            (t.name.clone(), pk)
        })
        .collect();
    for table in tables.iter_mut() {
        for fk in &mut table.foreign_keys {
            if fk.referenced_columns.is_empty() {
                if let Some(pk) = primary_keys.get(&fk.referenced_table) {
                    fk.referenced_columns.clone_from(pk);
                } else {
                    warn!(table = %table.name, foreign_key = %fk.name, "Referenced table not found");
                }
            }
        }
    }
}

fn normalize_default(
    ty: &dyn LogicalType,
    options: &TypeOptions,
    default: DefaultValue,
    table: &str,
    column: &str,
) -> DefaultValue {
    match default {
        DefaultValue::Literal(raw) => match ty.normalize_default(&raw, &ty.resolve_options(options)) {
            Ok(canonical) => DefaultValue::Literal(canonical),
            Err(e) => {
                warn!(table = %table, column = %column, error = %e, "Keeping default as reported");
                DefaultValue::Literal(raw)
            }
        },
        expression @ DefaultValue::Expression(_) => expression,
    }
}

/// Groups consecutive-or-not rows by a key column, keeping first-seen order.
fn group_by<'a>(rows: &'a [Row], key: &str, sql: &str) -> Result<Vec<(String, Vec<&'a Row>)>> {
    let mut groups: Vec<(String, Vec<&Row>)> = Vec::new();
    for row in rows {
        let value = required(row, key, sql)?;
        match groups.iter_mut().find(|(k, _)| *k == value) {
            Some((_, group)) => group.push(row),
            None => groups.push((value, vec![row])),
        }
    }
    Ok(groups)
}

fn required(row: &Row, field: &str, sql: &str) -> Result<String> {
    row.text(field)
        .ok_or_else(|| MigrateError::query_failed(sql, format!("catalog row is missing '{field}'")))
}
