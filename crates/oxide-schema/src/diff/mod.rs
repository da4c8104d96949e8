//! Schema comparison.
//!
//! [`SchemaDiffer`] compares a current and a desired [`SchemaSpec`] and
//! returns the ordered operations that turn one into the other:
//!
//! 1. `DropForeignKey`
//! 2. `DropIndex`
//! 3. `DropColumn`, then `DropTable` (referencing tables first)
//! 4. `CreateTable` (referenced tables first), then `AddColumn`
//! 5. `ModifyColumn`, then `RecreateTable`
//! 6. `AddIndex`
//! 7. `AddForeignKey`
//!
//! Both schemas are resolved through the type registry before comparison,
//! so columns are equal when their canonical forms are.

mod gate;
mod order;

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Result;
use crate::operation::Operation;
use crate::platform::Platform;
use crate::schema::{ForeignKeySpec, SchemaSpec, TableSpec};
use crate::types::TypeRegistry;

/// `(table, column)` pairs whose definition changes.
type ModifiedColumns<'a> = BTreeSet<(&'a str, &'a str)>;

/// Computes migration operations between two schemas.
///
/// # Example
///
/// ```rust
/// use oxide_schema::column_builder::{string, uuid};
/// use oxide_schema::diff::SchemaDiffer;
/// use oxide_schema::operation::Operation;
/// use oxide_schema::platform::SqlitePlatform;
/// use oxide_schema::schema::SchemaSpec;
/// use oxide_schema::table_builder::TableBuilder;
/// use oxide_schema::types::TypeRegistry;
///
/// let users = |len| {
///     TableBuilder::new()
///         .name("users")
///         .column(uuid("id").primary_key().build())
///         .column(string("email", len).not_null().build())
///         .build()
/// };
/// let current = SchemaSpec::new().with_table(users(255));
/// let desired = SchemaSpec::new().with_table(users(500));
///
/// let registry = TypeRegistry::with_builtin_types();
/// let ops = SchemaDiffer::new(&registry).diff(&current, &desired).unwrap();
/// assert!(matches!(&ops[..], [Operation::ModifyColumn { .. }]));
///
/// // SQLite cannot alter columns in place.
/// let ops = SchemaDiffer::new(&registry)
///     .for_platform(&SqlitePlatform)
///     .diff(&current, &desired)
///     .unwrap();
/// assert!(matches!(&ops[..], [Operation::RecreateTable { .. }]));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SchemaDiffer<'a> {
    registry: &'a TypeRegistry,
    platform: Option<&'a dyn Platform>,
}

impl<'a> SchemaDiffer<'a> {
    /// Creates a platform-neutral differ.
    #[must_use]
    pub const fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            platform: None,
        }
    }

    /// Gates the produced operations for `platform`.
    #[must_use]
    pub const fn for_platform(self, platform: &'a dyn Platform) -> Self {
        Self {
            registry: self.registry,
            platform: Some(platform),
        }
    }

    /// Computes the operations turning `current` into `desired`.
    ///
    /// # Errors
    ///
    /// - `UnknownType` / `InvalidValue` when either schema does not
    ///   resolve against the registry.
    /// - `ConfigurationError` when the platform cannot express a
    ///   required foreign key at all.
    pub fn diff(&self, current: &SchemaSpec, desired: &SchemaSpec) -> Result<Vec<Operation>> {
        let current = current.resolve(self.registry)?;
        let desired = desired.resolve(self.registry)?;
        let modified = modified_columns(&current, &desired);

        let mut ops = Vec::new();

        // ---- Dropped tables -----------------------------------------
        let dropped: Vec<TableSpec> = current
            .tables
            .values()
            .filter(|t| !desired.contains(&t.name))
            .cloned()
            .collect();
        let (dropped, split) = order::order_drops(dropped);
        ops.extend(
            split
                .into_iter()
                .map(|(table, fk)| Operation::drop_foreign_key(table, fk)),
        );
        ops.extend(dropped.into_iter().map(Operation::DropTable));

        // ---- Created tables -----------------------------------------
        let created: Vec<TableSpec> = desired
            .tables
            .values()
            .filter(|t| !current.contains(&t.name))
            .cloned()
            .collect();
        let (created, split) = order::order_creates(created);
        ops.extend(created.into_iter().map(Operation::CreateTable));
        ops.extend(
            split
                .into_iter()
                .map(|(table, fk)| Operation::add_foreign_key(table, fk)),
        );

        // ---- Changed tables -----------------------------------------
        for (name, new) in &desired.tables {
            if let Some(old) = current.table(name) {
                diff_columns(old, new, &mut ops);
                diff_indexes(old, new, &mut ops);
                diff_foreign_keys(old, new, &modified, &mut ops);
            }
        }

        let ops = gate::gate(ops, self.platform, &current, &desired)?;
        debug!(
            operations = ops.len(),
            platform = self.platform.map_or("none", |p| p.name()),
            "Computed schema diff"
        );
        Ok(ops)
    }
}

fn modified_columns<'a>(current: &'a SchemaSpec, desired: &'a SchemaSpec) -> ModifiedColumns<'a> {
    let mut modified = BTreeSet::new();
    for (name, new) in &desired.tables {
        let Some(old) = current.table(name) else {
            continue;
        };
        for column in &new.columns {
            if old.column(&column.name).is_some_and(|c| c != column) {
                modified.insert((new.name.as_str(), column.name.as_str()));
            }
        }
    }
    modified
}

fn diff_columns(old: &TableSpec, new: &TableSpec, ops: &mut Vec<Operation>) {
    for column in &new.columns {
        match old.column(&column.name) {
            None => ops.push(Operation::add_column(&new.name, column.clone())),
            Some(existing) if existing != column => ops.push(Operation::modify_column(
                &new.name,
                existing.clone(),
                column.clone(),
            )),
            Some(_) => {}
        }
    }
    for column in &old.columns {
        if new.column(&column.name).is_none() {
            ops.push(Operation::drop_column(&new.name, column.clone()));
        }
    }
}

fn diff_indexes(old: &TableSpec, new: &TableSpec, ops: &mut Vec<Operation>) {
    for index in &old.indexes {
        match new.index(&index.name) {
            Some(same) if same == index => {}
            Some(changed) => {
                ops.push(Operation::drop_index(&new.name, index.clone()));
                ops.push(Operation::add_index(&new.name, changed.clone()));
            }
            None => ops.push(Operation::drop_index(&new.name, index.clone())),
        }
    }
    for index in &new.indexes {
        if old.index(&index.name).is_none() {
            ops.push(Operation::add_index(&new.name, index.clone()));
        }
    }
}

/// Foreign keys match by name, then by columns and target. A match is
/// kept when its shape is unchanged and none of its columns, local or
/// referenced, is modified; otherwise it is dropped and re-added.
fn diff_foreign_keys(
    old: &TableSpec,
    new: &TableSpec,
    modified: &ModifiedColumns<'_>,
    ops: &mut Vec<Operation>,
) {
    let mut unmatched: Vec<&ForeignKeySpec> = new.foreign_keys.iter().collect();
    for fk in &old.foreign_keys {
        let position = unmatched
            .iter()
            .position(|c| c.name == fk.name)
            .or_else(|| unmatched.iter().position(|c| c.same_target(fk)));
        let Some(position) = position else {
            ops.push(Operation::drop_foreign_key(&new.name, fk.clone()));
            continue;
        };
        let candidate = unmatched.remove(position);
        if candidate.same_shape(fk) && !touches_modified(&new.name, candidate, modified) {
            continue;
        }
        ops.push(Operation::drop_foreign_key(&new.name, fk.clone()));
        ops.push(Operation::add_foreign_key(&new.name, candidate.clone()));
    }
    for fk in unmatched {
        ops.push(Operation::add_foreign_key(&new.name, fk.clone()));
    }
}

fn touches_modified(table: &str, fk: &ForeignKeySpec, modified: &ModifiedColumns<'_>) -> bool {
    fk.columns
        .iter()
        .any(|c| modified.contains(&(table, c.as_str())))
        || fk
            .referenced_columns
            .iter()
            .any(|c| modified.contains(&(fk.referenced_table.as_str(), c.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_builder::{decimal, integer, string, uuid};
    use crate::error::SchemaError;
    use crate::operation::OperationKind;
    use crate::platform::{GenericPlatform, SqlitePlatform};
    use crate::schema::{IndexSpec, ReferentialAction};
    use crate::table_builder::TableBuilder;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtin_types()
    }

    fn users(email_length: u32) -> TableSpec {
        TableBuilder::new()
            .name("users")
            .column(uuid("id").primary_key().build())
            .column(string("email", email_length).not_null().unique().build())
            .build()
    }

    fn todos() -> TableSpec {
        TableBuilder::new()
            .name("todos")
            .column(uuid("id").primary_key().build())
            .column(string("title", 255).not_null().build())
            .column(uuid("user_id").not_null().build())
            .foreign_key(
                ForeignKeySpec::new("todos", &["user_id"], "users", &["id"])
                    .on_delete(ReferentialAction::Cascade),
            )
            .build()
    }

    fn app() -> SchemaSpec {
        SchemaSpec::new().with_table(users(255)).with_table(todos())
    }

    fn kinds(ops: &[Operation]) -> Vec<OperationKind> {
        ops.iter().map(Operation::kind).collect()
    }

    #[test]
    fn identical_schemas_produce_nothing() {
        let mut schema = app();
        schema.add_table(
            TableBuilder::new()
                .name("products")
                .column(integer("id").primary_key().build())
                .column(decimal("price", 10, 2).not_null().default_literal("10").build())
                .index(&["price"], false)
                .build(),
        );
        let ops = SchemaDiffer::new(&registry()).diff(&schema, &schema).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn creates_referenced_tables_first() {
        let ops = SchemaDiffer::new(&registry())
            .diff(&SchemaSpec::new(), &app())
            .unwrap();
        let names: Vec<&str> = ops.iter().map(Operation::table).collect();
        assert_eq!(names, vec!["users", "todos"]);
        assert!(matches!(&ops[1], Operation::CreateTable(t) if t.foreign_keys.len() == 1));
    }

    #[test]
    fn drops_referencing_tables_first() {
        let ops = SchemaDiffer::new(&registry())
            .diff(&app(), &SchemaSpec::new())
            .unwrap();
        let names: Vec<&str> = ops.iter().map(Operation::table).collect();
        assert_eq!(names, vec!["todos", "users"]);
    }

    #[test]
    fn widening_a_column_is_one_modification() {
        let desired = SchemaSpec::new().with_table(users(500)).with_table(todos());
        let ops = SchemaDiffer::new(&registry()).diff(&app(), &desired).unwrap();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Operation::ModifyColumn { table, old, new } => {
                assert_eq!(table, "users");
                assert_eq!(old.length, Some(255));
                assert_eq!(new.length, Some(500));
            }
            other => panic!("unexpected operation {other}"),
        }
    }

    #[test]
    fn unset_options_match_type_defaults() {
        let mut current = users(255);
        current.columns[1].length = None;
        let ops = SchemaDiffer::new(&registry())
            .diff(
                &SchemaSpec::new().with_table(current),
                &SchemaSpec::new().with_table(users(255)),
            )
            .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn buckets_are_ordered() {
        let current = app();
        let mut todos = todos();
        todos.columns.retain(|c| c.name != "title");
        todos.columns.push(string("body", 100).build());
        todos.indexes.push(IndexSpec::new("todos", &["body"], false));
        let desired = SchemaSpec::new()
            .with_table(users(255))
            .with_table(todos)
            .with_table(
                TableBuilder::new()
                    .name("tags")
                    .column(integer("id").primary_key().build())
                    .build(),
            );

        let ops = SchemaDiffer::new(&registry()).diff(&current, &desired).unwrap();
        assert_eq!(
            kinds(&ops),
            vec![
                OperationKind::DropColumn,
                OperationKind::CreateTable,
                OperationKind::AddColumn,
                OperationKind::AddIndex,
            ]
        );
    }

    #[test]
    fn changed_index_is_dropped_and_added() {
        let mut old = todos();
        old.indexes.push(IndexSpec::named("idx_title", &["title"], false));
        let mut new = todos();
        new.indexes.push(IndexSpec::named("idx_title", &["title"], true));

        let ops = SchemaDiffer::new(&registry())
            .diff(
                &SchemaSpec::new().with_table(users(255)).with_table(old),
                &SchemaSpec::new().with_table(users(255)).with_table(new),
            )
            .unwrap();
        assert_eq!(kinds(&ops), vec![OperationKind::DropIndex, OperationKind::AddIndex]);
    }

    #[test]
    fn foreign_key_on_modified_column_is_recreated() {
        let widen = |table: TableSpec, column: &str| {
            let mut table = table;
            for c in &mut table.columns {
                if c.name == column {
                    c.type_name = "string".into();
                    c.length = Some(64);
                }
            }
            table
        };
        let current = SchemaSpec::new()
            .with_table(widen(users(255), "id"))
            .with_table(widen(todos(), "user_id"));
        let mut desired = current.clone();
        for table in desired.tables.values_mut() {
            for c in &mut table.columns {
                if c.name == "id" || c.name == "user_id" {
                    c.length = Some(128);
                }
            }
        }

        let ops = SchemaDiffer::new(&registry()).diff(&current, &desired).unwrap();
        assert_eq!(
            kinds(&ops),
            vec![
                OperationKind::DropForeignKey,
                OperationKind::ModifyColumn,
                OperationKind::ModifyColumn,
                OperationKind::AddForeignKey,
            ]
        );
    }

    #[test]
    fn renamed_foreign_key_with_same_shape_is_kept() {
        let mut old = todos();
        old.foreign_keys[0].name = "todos_ibfk_1".into();
        let ops = SchemaDiffer::new(&registry())
            .diff(
                &SchemaSpec::new().with_table(users(255)).with_table(old),
                &app(),
            )
            .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn changed_referential_action_is_recreated() {
        let mut old = todos();
        old.foreign_keys[0].on_delete = ReferentialAction::NoAction;
        let ops = SchemaDiffer::new(&registry())
            .diff(
                &SchemaSpec::new().with_table(users(255)).with_table(old),
                &app(),
            )
            .unwrap();
        assert_eq!(
            kinds(&ops),
            vec![OperationKind::DropForeignKey, OperationKind::AddForeignKey]
        );
    }

    #[test]
    fn reference_cycles_add_foreign_keys_last() {
        let table = |name: &str, other: &str| {
            let col = format!("{other}_id");
            TableBuilder::new()
                .name(name)
                .column(integer("id").primary_key().build())
                .column(integer(col.as_str()).build())
                .references(&[col.as_str()], other, &["id"])
                .build()
        };
        let desired = SchemaSpec::new()
            .with_table(table("a", "b"))
            .with_table(table("b", "a"));

        let ops = SchemaDiffer::new(&registry())
            .diff(&SchemaSpec::new(), &desired)
            .unwrap();
        assert_eq!(
            kinds(&ops),
            vec![
                OperationKind::CreateTable,
                OperationKind::CreateTable,
                OperationKind::AddForeignKey,
                OperationKind::AddForeignKey,
            ]
        );
        assert!(matches!(&ops[0], Operation::CreateTable(t) if t.foreign_keys.is_empty()));

        let down = SchemaDiffer::new(&registry())
            .diff(&desired, &SchemaSpec::new())
            .unwrap();
        assert_eq!(
            kinds(&down),
            vec![
                OperationKind::DropForeignKey,
                OperationKind::DropForeignKey,
                OperationKind::DropTable,
                OperationKind::DropTable,
            ]
        );
    }

    #[test]
    fn no_inline_foreign_keys_become_trailing_adds() {
        let platform = GenericPlatform::new().with_inline_foreign_keys(false);
        let ops = SchemaDiffer::new(&registry())
            .for_platform(&platform)
            .diff(&SchemaSpec::new(), &app())
            .unwrap();
        assert_eq!(
            kinds(&ops),
            vec![
                OperationKind::CreateTable,
                OperationKind::CreateTable,
                OperationKind::AddForeignKey,
            ]
        );
        assert!(matches!(&ops[1], Operation::CreateTable(t) if t.foreign_keys.is_empty()));
    }

    #[test]
    fn no_foreign_keys_strips_them() {
        let platform = GenericPlatform::new().with_foreign_keys(false);
        let ops = SchemaDiffer::new(&registry())
            .for_platform(&platform)
            .diff(&SchemaSpec::new(), &app())
            .unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops
            .iter()
            .all(|op| matches!(op, Operation::CreateTable(t) if t.foreign_keys.is_empty())));
    }

    #[test]
    fn foreign_keys_without_any_support_path_fail() {
        let platform = GenericPlatform::new()
            .with_inline_foreign_keys(false)
            .with_alter_foreign_keys(false);
        let err = SchemaDiffer::new(&registry())
            .for_platform(&platform)
            .diff(&SchemaSpec::new(), &app())
            .unwrap_err();
        assert!(matches!(err, SchemaError::ConfigurationError(_)));
    }

    #[test]
    fn sqlite_recreates_table_for_new_foreign_key() {
        let mut old = todos();
        old.foreign_keys.clear();
        let current = SchemaSpec::new().with_table(users(255)).with_table(old.clone());

        let ops = SchemaDiffer::new(&registry())
            .for_platform(&SqlitePlatform)
            .diff(&current, &app())
            .unwrap();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Operation::RecreateTable { old: from, new } => {
                assert_eq!(from.name, "todos");
                assert!(from.foreign_keys.is_empty());
                assert_eq!(new.foreign_keys.len(), 1);
            }
            other => panic!("unexpected operation {other}"),
        }
    }

    #[test]
    fn sqlite_adds_nullable_column_in_place() {
        let mut new = users(255);
        new.columns.push(string("nickname", 40).build());
        let ops = SchemaDiffer::new(&registry())
            .for_platform(&SqlitePlatform)
            .diff(
                &SchemaSpec::new().with_table(users(255)),
                &SchemaSpec::new().with_table(new),
            )
            .unwrap();
        assert_eq!(kinds(&ops), vec![OperationKind::AddColumn]);
    }

    #[test]
    fn sqlite_drop_of_required_column_recreates() {
        let mut new = users(255);
        new.columns.retain(|c| c.name != "email");
        let ops = SchemaDiffer::new(&registry())
            .for_platform(&SqlitePlatform)
            .diff(
                &SchemaSpec::new().with_table(users(255)),
                &SchemaSpec::new().with_table(new),
            )
            .unwrap();
        assert_eq!(kinds(&ops), vec![OperationKind::RecreateTable]);
    }

    #[test]
    fn primary_key_change_recreates_everywhere() {
        let table = |pk: &str| {
            let mut t = TableBuilder::new()
                .name("codes")
                .column(integer("id").not_null().build())
                .column(string("code", 8).not_null().build())
                .build();
            for c in &mut t.columns {
                c.primary_key = c.name == pk;
            }
            t
        };
        let ops = SchemaDiffer::new(&registry())
            .diff(
                &SchemaSpec::new().with_table(table("id")),
                &SchemaSpec::new().with_table(table("code")),
            )
            .unwrap();
        assert_eq!(kinds(&ops), vec![OperationKind::RecreateTable]);
    }

    #[test]
    fn recreate_keeps_other_tables_in_place() {
        let mut new_users = users(500);
        new_users.indexes.push(IndexSpec::new("users", &["email"], false));
        let mut new_todos = todos();
        new_todos.columns.push(string("note", 20).build());

        let ops = SchemaDiffer::new(&registry())
            .for_platform(&SqlitePlatform)
            .diff(&app(), &SchemaSpec::new().with_table(new_users).with_table(new_todos))
            .unwrap();
        assert_eq!(
            kinds(&ops),
            vec![OperationKind::AddColumn, OperationKind::RecreateTable]
        );
        assert_eq!(ops[1].table(), "users");
    }
}
