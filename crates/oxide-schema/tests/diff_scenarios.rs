//! End-to-end scenarios: entity metadata to ordered, rendered operations.

use oxide_schema::builder::SchemaBuilder;
use oxide_schema::diff::SchemaDiffer;
use oxide_schema::metadata::{EntityMetadata, FieldDescriptor, IndexDescriptor, RelationDescriptor};
use oxide_schema::operation::{Operation, OperationKind};
use oxide_schema::platform::{GenericPlatform, MySqlPlatform, Platform, SqlitePlatform};
use oxide_schema::render::{render_migration, render_sql};
use oxide_schema::schema::{ReferentialAction, SchemaSpec};
use oxide_schema::types::TypeRegistry;

fn entities(email_length: u32, with_tags: bool) -> Vec<EntityMetadata> {
    let mut todo = EntityMetadata::new("Todo", "todos")
        .field(FieldDescriptor::id("id", "uuid"))
        .field(FieldDescriptor::new("title", "string"))
        .field(FieldDescriptor::new("done", "boolean").default_value(false))
        .relation(
            RelationDescriptor::many_to_one("user", "User")
                .required()
                .on_delete(ReferentialAction::Cascade),
        )
        .index(IndexDescriptor::new(&["title"], false));
    let mut all = vec![
        EntityMetadata::new("User", "users")
            .field(FieldDescriptor::id("id", "uuid"))
            .field(FieldDescriptor::new("email", "string").length(email_length).unique()),
    ];
    if with_tags {
        todo = todo.relation(RelationDescriptor::many_to_many("tags", "Tag"));
        all.push(
            EntityMetadata::new("Tag", "tags")
                .field(FieldDescriptor::id("id", "integer"))
                .field(FieldDescriptor::new("label", "string").length(50).unique())
                .relation(RelationDescriptor::many_to_many("todos", "Todo").inverse()),
        );
    }
    all.push(todo);
    all
}

fn schema(registry: &TypeRegistry, email_length: u32, with_tags: bool) -> SchemaSpec {
    SchemaBuilder::new(registry)
        .build(&entities(email_length, with_tags))
        .unwrap()
}

fn position(ops: &[Operation], table: &str) -> usize {
    ops.iter().position(|op| op.table() == table).unwrap()
}

#[test]
fn fresh_database_creates_tables_in_dependency_order() {
    let registry = TypeRegistry::with_builtin_types();
    let desired = schema(&registry, 255, true);
    let ops = SchemaDiffer::new(&registry)
        .for_platform(&SqlitePlatform)
        .diff(&SchemaSpec::new(), &desired)
        .unwrap();

    assert_eq!(ops.len(), 4);
    assert!(ops.iter().all(|op| op.kind() == OperationKind::CreateTable));
    assert!(position(&ops, "users") < position(&ops, "todos"));
    assert!(position(&ops, "todos") < position(&ops, "todos_tags"));
    assert!(position(&ops, "tags") < position(&ops, "todos_tags"));

    let sql = render_sql(&ops, &SqlitePlatform, &registry).unwrap();
    assert!(sql
        .iter()
        .any(|s| s == "CREATE INDEX \"idx_todos_title\" ON \"todos\" (\"title\")"));
}

#[test]
fn unchanged_model_produces_no_operations() {
    let registry = TypeRegistry::with_builtin_types();
    let current = schema(&registry, 255, true);
    let platforms: [&dyn Platform; 3] = [&SqlitePlatform, &MySqlPlatform, &GenericPlatform::new()];
    for platform in platforms {
        let ops = SchemaDiffer::new(&registry)
            .for_platform(platform)
            .diff(&current, &current)
            .unwrap();
        assert!(ops.is_empty(), "{}: {ops:?}", platform.name());
    }
}

#[test]
fn widening_email_is_a_single_modification() {
    let registry = TypeRegistry::with_builtin_types();
    let current = schema(&registry, 255, false);
    let desired = schema(&registry, 500, false);

    let ops = SchemaDiffer::new(&registry)
        .for_platform(&MySqlPlatform)
        .diff(&current, &desired)
        .unwrap();
    assert_eq!(ops.len(), 1);
    assert!(matches!(
        &ops[0],
        Operation::ModifyColumn { table, new, .. } if table == "users" && new.length == Some(500)
    ));

    let sql = render_sql(&ops, &MySqlPlatform, &registry).unwrap();
    assert_eq!(
        sql,
        vec!["ALTER TABLE `users` MODIFY COLUMN `email` VARCHAR(500) NOT NULL".to_string()]
    );
}

#[test]
fn removing_an_entity_drops_join_table_first() {
    let registry = TypeRegistry::with_builtin_types();
    let current = schema(&registry, 255, true);
    let desired = schema(&registry, 255, false);

    let ops = SchemaDiffer::new(&registry)
        .for_platform(&SqlitePlatform)
        .diff(&current, &desired)
        .unwrap();
    let dropped: Vec<&str> = ops.iter().map(Operation::table).collect();
    assert_eq!(dropped, vec!["todos_tags", "tags"]);
    assert!(ops.iter().all(|op| op.kind() == OperationKind::DropTable));
}

#[test]
fn platform_without_inline_foreign_keys_adds_them_last() {
    let registry = TypeRegistry::with_builtin_types();
    let desired = schema(&registry, 255, true);
    let platform = GenericPlatform::new().with_inline_foreign_keys(false);

    let ops = SchemaDiffer::new(&registry)
        .for_platform(&platform)
        .diff(&SchemaSpec::new(), &desired)
        .unwrap();
    let first_fk = ops
        .iter()
        .position(|op| op.kind() == OperationKind::AddForeignKey)
        .unwrap();
    assert_eq!(ops.len() - first_fk, 3);
    assert!(ops[..first_fk]
        .iter()
        .all(|op| matches!(op, Operation::CreateTable(t) if t.foreign_keys.is_empty())));
}

#[test]
fn generated_migration_inverts_the_diff() {
    let registry = TypeRegistry::with_builtin_types();
    let ops = SchemaDiffer::new(&registry)
        .diff(&schema(&registry, 255, false), &schema(&registry, 255, true))
        .unwrap();
    let code = render_migration("0002_add_tags", &ops);

    assert!(code.contains("impl Migration for Migration0002AddTags"));
    let down = code.find("fn down()").unwrap();
    assert!(code[down..].contains("Operation::drop_table(TableBuilder::new()"));
    assert!(code[..down].contains(".name(\"todos_tags\")"));
}
