//! DDL rendering.

use tracing::debug;

use crate::diff::SchemaDiffer;
use crate::error::{Result, SchemaError};
use crate::operation::Operation;
use crate::platform::Platform;
use crate::schema::{SchemaSpec, TableSpec};
use crate::types::TypeRegistry;

/// Prefix of the scratch table used by [`Operation::RecreateTable`].
pub const RECREATE_PREFIX: &str = "__oxide_tmp_";

/// Renders operations as SQL statements for `platform`.
///
/// Operations should come from a differ gated for the same platform;
/// anything the platform cannot express fails instead of being skipped.
///
/// # Errors
///
/// - [`SchemaError::UnknownType`] for unregistered column types.
/// - [`SchemaError::ConfigurationError`] for operations the platform
///   cannot express, e.g. `ModifyColumn` on SQLite.
///
/// # Example
///
/// ```rust
/// use oxide_schema::column_builder::{integer, string};
/// use oxide_schema::operation::Operation;
/// use oxide_schema::platform::SqlitePlatform;
/// use oxide_schema::render::render_sql;
/// use oxide_schema::types::TypeRegistry;
///
/// let registry = TypeRegistry::with_builtin_types();
/// let ops = vec![Operation::add_column("users", string("nickname", 40).build())];
/// let sql = render_sql(&ops, &SqlitePlatform, &registry).unwrap();
/// assert_eq!(sql, vec!["ALTER TABLE \"users\" ADD COLUMN \"nickname\" VARCHAR(40)"]);
/// ```
pub fn render_sql(
    ops: &[Operation],
    platform: &dyn Platform,
    registry: &TypeRegistry,
) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    for op in ops {
        render_operation(op, platform, registry, &mut statements)?;
    }
    debug!(
        operations = ops.len(),
        statements = statements.len(),
        platform = platform.name(),
        "Rendered SQL"
    );
    Ok(statements)
}

/// Renders the DDL creating `schema` from nothing, ordered as
/// `diff(empty, schema)`.
///
/// # Errors
///
/// Propagates differ and rendering errors.
pub fn render_schema_sql(
    schema: &SchemaSpec,
    platform: &dyn Platform,
    registry: &TypeRegistry,
) -> Result<Vec<String>> {
    let ops = SchemaDiffer::new(registry)
        .for_platform(platform)
        .diff(&SchemaSpec::new(), schema)?;
    render_sql(&ops, platform, registry)
}

fn render_operation(
    op: &Operation,
    platform: &dyn Platform,
    registry: &TypeRegistry,
    out: &mut Vec<String>,
) -> Result<()> {
    match op {
        Operation::CreateTable(table) => {
            check_inline_foreign_keys(table, platform)?;
            out.push(platform.create_table_sql(
                table,
                registry,
                platform.supports_inline_foreign_keys(),
            )?);
            out.extend(
                table
                    .indexes
                    .iter()
                    .map(|index| platform.create_index_sql(&table.name, index)),
            );
        }
        Operation::DropTable(table) => out.push(platform.drop_table_sql(&table.name)),
        Operation::AddColumn { table, column } => {
            out.push(platform.add_column_sql(table, column, registry)?);
        }
        Operation::DropColumn { table, column } => {
            out.push(platform.drop_column_sql(table, &column.name));
        }
        Operation::ModifyColumn { table, old, new } => {
            out.extend(platform.modify_column_sql(table, old, new, registry)?);
        }
        Operation::AddIndex { table, index } => out.push(platform.create_index_sql(table, index)),
        Operation::DropIndex { table, index } => {
            out.push(platform.drop_index_sql(table, &index.name));
        }
        Operation::AddForeignKey { table, foreign_key } => {
            out.push(platform.add_foreign_key_sql(table, foreign_key)?);
        }
        Operation::DropForeignKey { table, foreign_key } => {
            out.push(platform.drop_foreign_key_sql(table, &foreign_key.name)?);
        }
        Operation::RecreateTable { old, new } => render_recreate(old, new, platform, registry, out)?,
    }
    Ok(())
}

fn check_inline_foreign_keys(table: &TableSpec, platform: &dyn Platform) -> Result<()> {
    if !table.foreign_keys.is_empty()
        && platform.supports_foreign_keys()
        && !platform.supports_inline_foreign_keys()
    {
        return Err(SchemaError::ConfigurationError(format!(
            "{} cannot declare foreign keys of {} inline",
            platform.name(),
            table.name
        )));
    }
    Ok(())
}

/// Copy-and-swap rebuild:
///
/// 1. create the scratch table with the desired columns;
/// 2. copy the columns both versions share;
/// 3. drop the old table and rename the scratch table;
/// 4. add foreign keys (when the platform can) and the desired indexes.
///
/// Foreign keys are declared inline on the scratch table only when the
/// platform cannot add them afterwards.
fn render_recreate(
    old: &TableSpec,
    new: &TableSpec,
    platform: &dyn Platform,
    registry: &TypeRegistry,
    out: &mut Vec<String>,
) -> Result<()> {
    let scratch_name = format!("{RECREATE_PREFIX}{}", new.name);
    let foreign_keys = platform.supports_foreign_keys() && !new.foreign_keys.is_empty();
    let inline = foreign_keys && !platform.supports_add_foreign_key();
    if inline && !platform.supports_inline_foreign_keys() {
        return Err(SchemaError::ConfigurationError(format!(
            "{} cannot recreate {} with its foreign keys",
            platform.name(),
            new.name
        )));
    }

    let scratch = TableSpec {
        name: scratch_name.clone(),
        columns: new.columns.clone(),
        indexes: Vec::new(),
        foreign_keys: if inline {
            new.foreign_keys.clone()
        } else {
            Vec::new()
        },
    };
    out.push(platform.create_table_sql(&scratch, registry, inline)?);

    let shared: Vec<String> = new
        .columns
        .iter()
        .filter(|c| old.column(&c.name).is_some())
        .map(|c| c.name.clone())
        .collect();
    if !shared.is_empty() {
        let columns = platform.quote_list(&shared);
        out.push(format!(
            "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
            platform.quote_identifier(&scratch_name),
            platform.quote_identifier(&old.name)
        ));
    }

    out.push(platform.drop_table_sql(&old.name));
    out.push(platform.rename_table_sql(&scratch_name, &new.name));

    if foreign_keys && !inline {
        for fk in &new.foreign_keys {
            out.push(platform.add_foreign_key_sql(&new.name, fk)?);
        }
    }
    out.extend(
        new.indexes
            .iter()
            .map(|index| platform.create_index_sql(&new.name, index)),
    );
    Ok(())
}
