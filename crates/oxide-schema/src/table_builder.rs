//! Type-safe table builder using the typestate pattern.
//!
//! [`TableBuilder::build`] is only available once a name and at least one
//! column have been set.

use std::marker::PhantomData;

use crate::schema::{ColumnSpec, ForeignKeySpec, IndexSpec, TableSpec};

// =============================================================================
// Typestate Markers
// =============================================================================

/// Marker: table has no name set.
#[derive(Debug, Clone, Copy)]
pub struct NoName;

/// Marker: table has a name set.
#[derive(Debug, Clone, Copy)]
pub struct HasName;

/// Marker: table has no columns.
#[derive(Debug, Clone, Copy)]
pub struct NoColumns;

/// Marker: table has at least one column.
#[derive(Debug, Clone, Copy)]
pub struct HasColumns;

// =============================================================================
// TableBuilder
// =============================================================================

/// Builds a [`TableSpec`].
///
/// # Example
///
/// ```rust
/// use oxide_schema::column_builder::{string, uuid};
/// use oxide_schema::schema::{ForeignKeySpec, ReferentialAction};
/// use oxide_schema::table_builder::TableBuilder;
///
/// let todos = TableBuilder::new()
///     .name("todos")
///     .column(uuid("id").primary_key().build())
///     .column(string("title", 255).not_null().build())
///     .column(uuid("user_id").build())
///     .index(&["title"], false)
///     .foreign_key(
///         ForeignKeySpec::new("todos", &["user_id"], "users", &["id"])
///             .on_delete(ReferentialAction::Cascade),
///     )
///     .build();
///
/// assert_eq!(todos.columns.len(), 3);
/// assert_eq!(todos.indexes[0].name, "idx_todos_title");
/// ```
#[derive(Debug, Clone)]
pub struct TableBuilder<Name, Cols> {
    name: Option<String>,
    columns: Vec<ColumnSpec>,
    indexes: Vec<IndexSpec>,
    foreign_keys: Vec<ForeignKeySpec>,
    _state: PhantomData<(Name, Cols)>,
}

impl Default for TableBuilder<NoName, NoColumns> {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder<NoName, NoColumns> {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            name: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            _state: PhantomData,
        }
    }
}

impl<Cols> TableBuilder<NoName, Cols> {
    /// Sets the table name.
    #[must_use]
    pub fn name(self, name: impl Into<String>) -> TableBuilder<HasName, Cols> {
        TableBuilder {
            name: Some(name.into()),
            columns: self.columns,
            indexes: self.indexes,
            foreign_keys: self.foreign_keys,
            _state: PhantomData,
        }
    }
}

impl<Name> TableBuilder<Name, NoColumns> {
    /// Adds the first column.
    #[must_use]
    pub fn column(self, column: ColumnSpec) -> TableBuilder<Name, HasColumns> {
        TableBuilder {
            name: self.name,
            columns: vec![column],
            indexes: self.indexes,
            foreign_keys: self.foreign_keys,
            _state: PhantomData,
        }
    }
}

impl<Name> TableBuilder<Name, HasColumns> {
    /// Adds another column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }
}

impl<Cols> TableBuilder<HasName, Cols> {
    fn table_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Adds an index with a derived name.
    #[must_use]
    pub fn index(mut self, columns: &[&str], unique: bool) -> Self {
        let index = IndexSpec::new(self.table_name(), columns, unique);
        self.indexes.push(index);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index_spec(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKeySpec) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Adds a foreign key with a derived name and no referential actions.
    #[must_use]
    pub fn references(mut self, columns: &[&str], table: &str, referenced: &[&str]) -> Self {
        let fk = ForeignKeySpec::new(self.table_name(), columns, table, referenced);
        self.foreign_keys.push(fk);
        self
    }
}

impl TableBuilder<HasName, HasColumns> {
    /// Builds the table spec.
    #[must_use]
    pub fn build(self) -> TableSpec {
        TableSpec {
            name: self.name.unwrap_or_default(),
            columns: self.columns,
            indexes: self.indexes,
            foreign_keys: self.foreign_keys,
        }
    }
}
