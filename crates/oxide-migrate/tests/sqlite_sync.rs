//! Live synchronization scenarios against SQLite.

use oxide_migrate::prelude::*;
use oxide_schema::builder::SchemaBuilder;
use oxide_schema::diff::SchemaDiffer;
use oxide_schema::metadata::{EntityMetadata, FieldDescriptor, IndexDescriptor, RelationDescriptor};
use oxide_schema::operation::{inverse, OperationKind};
use oxide_schema::platform::Platform;
use oxide_schema::prelude::*;
use oxide_schema::schema::SchemaSpec;
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
    let mut all = vec![EntityMetadata::new("User", "users")
        .field(FieldDescriptor::id("id", "uuid"))
        .field(FieldDescriptor::new("email", "string").length(email_length).unique())];
    if with_tags {
        todo = todo.relation(RelationDescriptor::many_to_many("tags", "Tag"));
        all.push(
            EntityMetadata::new("Tag", "tags")
                .field(FieldDescriptor::id("id", "integer"))
                .field(FieldDescriptor::new("label", "string").length(50).unique()),
        );
    }
    all.push(todo);
    all
}

fn desired(registry: &TypeRegistry, email_length: u32, with_tags: bool) -> SchemaSpec {
    SchemaBuilder::new(registry)
        .build(&entities(email_length, with_tags))
        .unwrap()
}

/// Introspects, diffs against `target` and applies the result.
fn sync(registry: &TypeRegistry, conn: &mut SqliteDriver, target: &SchemaSpec) -> Vec<Operation> {
    let current = Introspector::new(registry).introspect(conn).unwrap();
    let ops = SchemaDiffer::new(registry)
        .for_platform(conn.platform())
        .diff(&current, target)
        .unwrap();
    MigrationExecutor::new(registry).apply(conn, &ops).unwrap();
    ops
}

fn pending(registry: &TypeRegistry, conn: &mut SqliteDriver, target: &SchemaSpec) -> Vec<Operation> {
    let current = Introspector::new(registry).introspect(conn).unwrap();
    SchemaDiffer::new(registry)
        .for_platform(conn.platform())
        .diff(&current, target)
        .unwrap()
}

#[test]
fn applied_schema_introspects_back_unchanged() {
    let registry = TypeRegistry::with_builtin_types();
    let target = desired(&registry, 255, true);
    let mut conn = SqliteDriver::in_memory().unwrap();

    let ops = sync(&registry, &mut conn, &target);
    assert_eq!(ops.len(), 4);
    assert!(ops.iter().all(|op| op.kind() == OperationKind::CreateTable));

    let left = pending(&registry, &mut conn, &target);
    assert!(left.is_empty(), "{left:?}");
}

#[test]
fn schema_survives_reconnecting_to_a_file() {
    let registry = TypeRegistry::with_builtin_types();
    let target = desired(&registry, 255, false);
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("app.db").display());

    let mut conn = SqliteDriver::connect(&url).unwrap();
    sync(&registry, &mut conn, &target);
    drop(conn);

    let mut conn = SqliteDriver::connect(&url).unwrap();
    assert!(Introspector::new(&registry)
        .table_exists(&mut conn, "todos")
        .unwrap());
    assert!(pending(&registry, &mut conn, &target).is_empty());
}

#[test]
fn applying_the_inverse_restores_the_previous_schema() {
    let registry = TypeRegistry::with_builtin_types();
    let before = desired(&registry, 255, false);
    let mut conn = SqliteDriver::in_memory().unwrap();
    sync(&registry, &mut conn, &before);

    let ops = sync(&registry, &mut conn, &desired(&registry, 255, true));
    assert!(!ops.is_empty());
    assert!(Introspector::new(&registry)
        .table_exists(&mut conn, "todos_tags")
        .unwrap());

    MigrationExecutor::new(&registry)
        .apply(&mut conn, &inverse(&ops))
        .unwrap();
    assert!(!Introspector::new(&registry)
        .table_exists(&mut conn, "todos_tags")
        .unwrap());
    assert!(pending(&registry, &mut conn, &before).is_empty());
}

#[test]
fn widening_a_column_rebuilds_the_table_and_keeps_rows() {
    let registry = TypeRegistry::with_builtin_types();
    let mut conn = SqliteDriver::in_memory().unwrap();
    sync(&registry, &mut conn, &desired(&registry, 255, false));
    conn.execute(
        "INSERT INTO users (id, email) VALUES ('8f14e45f-ceea-467f-a8f6-2d4c3b6f0a11', 'ada@example.com')",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO todos (id, title, done, user_id) VALUES \
         ('1c383cd3-0b7c-4b1f-9f8a-4f2d6c1e7a22', 'write tests', 0, '8f14e45f-ceea-467f-a8f6-2d4c3b6f0a11')",
    )
    .unwrap();

    let target = desired(&registry, 500, false);
    let ops = sync(&registry, &mut conn, &target);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind(), OperationKind::RecreateTable);

    let schema = Introspector::new(&registry).introspect(&mut conn).unwrap();
    let email = schema.table("users").unwrap().column("email").unwrap();
    assert_eq!(email.length, Some(500));
    assert!(email.unique);
    assert!(pending(&registry, &mut conn, &target).is_empty());

    // Constraints were off during the rebuild, so the todo was not cascaded away.
    let rows = conn.query("SELECT email FROM users").unwrap();
    assert_eq!(rows[0].text("email").as_deref(), Some("ada@example.com"));
    assert_eq!(conn.query("SELECT id FROM todos").unwrap().len(), 1);
}

fn named(name: &str) -> Operation {
    TableBuilder::new()
        .name(name)
        .column(integer("id").primary_key().build())
        .build()
        .into()
}

#[test]
fn failing_operation_keeps_earlier_ones_applied() {
    let registry = TypeRegistry::with_builtin_types();
    let mut conn = SqliteDriver::in_memory().unwrap();
    let ops = vec![named("a"), named("a"), named("b")];

    let err = MigrationExecutor::new(&registry)
        .apply(&mut conn, &ops)
        .unwrap_err();
    match err {
        MigrateError::TransactionFailed {
            index,
            applied,
            sql,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(applied, 1);
            assert!(sql.starts_with("CREATE TABLE \"a\""));
        }
        other => panic!("unexpected error: {other}"),
    }

    let introspector = Introspector::new(&registry);
    assert!(introspector.table_exists(&mut conn, "a").unwrap());
    assert!(!introspector.table_exists(&mut conn, "b").unwrap());
}

#[test]
fn atomic_mode_rolls_back_the_whole_batch() {
    let registry = TypeRegistry::with_builtin_types();
    let mut conn = SqliteDriver::in_memory().unwrap();
    let ops = vec![named("a"), named("b"), named("a")];

    let err = MigrationExecutor::new(&registry)
        .mode(TransactionMode::Atomic)
        .apply(&mut conn, &ops)
        .unwrap_err();
    assert!(matches!(
        err,
        MigrateError::TransactionFailed { index: 2, applied: 0, .. }
    ));

    let introspector = Introspector::new(&registry);
    assert!(!introspector.table_exists(&mut conn, "a").unwrap());
    assert!(!introspector.table_exists(&mut conn, "b").unwrap());
}

/// Delegates to a SQLite connection but refuses the listed statements.
struct Refusing {
    inner: SqliteDriver,
    refused: Vec<&'static str>,
    log: Vec<String>,
}

impl Refusing {
    fn new(refused: &[&'static str]) -> Self {
        Self {
            inner: SqliteDriver::in_memory().unwrap(),
            refused: refused.to_vec(),
            log: Vec::new(),
        }
    }
}

impl Connection for Refusing {
    fn platform(&self) -> &dyn Platform {
        self.inner.platform()
    }

    fn execute(&mut self, sql: &str) -> oxide_migrate::Result<u64> {
        self.log.push(sql.to_string());
        if self.refused.iter().any(|r| sql.starts_with(r)) {
            return Err(MigrateError::QueryFailed {
                sql: sql.to_string(),
                message: "refused".to_string(),
            });
        }
        self.inner.execute(sql)
    }

    fn query(&mut self, sql: &str) -> oxide_migrate::Result<Vec<Row>> {
        self.inner.query(sql)
    }
}

/// The transaction is closed and constraints are back on.
fn assert_clean_exit(conn: &mut Refusing) {
    assert!(conn.log.iter().any(|s| s == "ROLLBACK"), "{:?}", conn.log);
    assert_eq!(
        conn.log.last().map(String::as_str),
        Some("PRAGMA foreign_keys = ON")
    );
    let rows = conn.inner.query("PRAGMA foreign_keys").unwrap();
    assert_eq!(rows[0].integer("foreign_keys"), Some(1));
    conn.inner.execute("BEGIN").unwrap();
    conn.inner.execute("COMMIT").unwrap();
}

#[test]
fn refused_savepoint_rolls_back_and_closes_the_transaction() {
    let registry = TypeRegistry::with_builtin_types();
    let mut conn = Refusing::new(&["SAVEPOINT oxide_sp_1"]);

    let err = MigrationExecutor::new(&registry)
        .apply(&mut conn, &[named("a"), named("b"), named("c")])
        .unwrap_err();
    match err {
        MigrateError::TransactionFailed {
            operation,
            index,
            applied,
            sql,
            ..
        } => {
            assert_eq!(operation, "Create table b");
            assert_eq!(index, 1);
            assert_eq!(applied, 0);
            assert_eq!(sql, "SAVEPOINT oxide_sp_1");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_clean_exit(&mut conn);
    let introspector = Introspector::new(&registry);
    assert!(!introspector.table_exists(&mut conn.inner, "a").unwrap());
}

#[test]
fn unrestorable_savepoint_rolls_back_the_whole_batch() {
    let registry = TypeRegistry::with_builtin_types();
    let mut conn = Refusing::new(&["CREATE TABLE \"b\"", "ROLLBACK TO SAVEPOINT"]);

    let err = MigrationExecutor::new(&registry)
        .apply(&mut conn, &[named("a"), named("b")])
        .unwrap_err();
    assert!(matches!(
        err,
        MigrateError::TransactionFailed { index: 1, applied: 0, .. }
    ));

    assert_clean_exit(&mut conn);
    assert!(!Introspector::new(&registry)
        .table_exists(&mut conn.inner, "a")
        .unwrap());
}

struct Migration0001CreateNotes;

impl Migration for Migration0001CreateNotes {
    const ID: &'static str = "0001_create_notes";

    fn up() -> Vec<Operation> {
        vec![
            TableBuilder::new()
                .name("notes")
                .column(integer("id").primary_key().build())
                .column(string("title", 80).not_null().build())
                .column(boolean("pinned").not_null().default_literal("0").build())
                .index(&["title"], false)
                .build()
                .into(),
            Operation::add_column("notes", text("body").build()),
        ]
    }
}

#[test]
fn migrations_apply_and_revert() {
    let registry = TypeRegistry::with_builtin_types();
    let mut conn = SqliteDriver::in_memory().unwrap();
    let executor = MigrationExecutor::new(&registry);

    let report = executor
        .apply_migration::<Migration0001CreateNotes, _>(&mut conn)
        .unwrap();
    assert_eq!(report.operations_applied, 2);

    let schema = Introspector::new(&registry).introspect(&mut conn).unwrap();
    let notes = schema.table("notes").unwrap();
    assert!(notes.column("body").is_some());
    assert_eq!(notes.indexes[0].name, "idx_notes_title");
    assert_eq!(
        notes.column("pinned").unwrap().default,
        Some(DefaultValue::Literal("0".to_string()))
    );

    executor
        .revert_migration::<Migration0001CreateNotes, _>(&mut conn)
        .unwrap();
    assert!(Introspector::new(&registry)
        .introspect(&mut conn)
        .unwrap()
        .is_empty());
}

#[test]
fn dry_run_leaves_the_database_alone() {
    let registry = TypeRegistry::with_builtin_types();
    let mut conn = SqliteDriver::in_memory().unwrap();

    let report = MigrationExecutor::new(&registry)
        .dry_run(true)
        .apply(&mut conn, &[named("a")])
        .unwrap();
    assert!(report.dry_run);
    assert_eq!(report.statements.len(), 1);
    assert!(!Introspector::new(&registry)
        .table_exists(&mut conn, "a")
        .unwrap());
}
