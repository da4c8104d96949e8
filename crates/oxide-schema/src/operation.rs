//! Schema operations.
//!
//! An [`Operation`] is one atomic step of a migration. Each variant
//! carries the full specs it needs so that it can be rendered on any
//! platform and inverted without access to the schema it was computed
//! from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSpec, ForeignKeySpec, IndexSpec, TableSpec};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create a table, including its inline foreign keys and indexes.
    CreateTable(TableSpec),
    /// Drop a table. The full definition is kept so the drop can be inverted.
    DropTable(TableSpec),
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// The new column.
        column: ColumnSpec,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// The dropped column as it was.
        column: ColumnSpec,
    },
    /// Change a column's type, nullability, default or uniqueness.
    ModifyColumn {
        /// Table name.
        table: String,
        /// Current definition.
        old: ColumnSpec,
        /// Desired definition.
        new: ColumnSpec,
    },
    /// Create an index.
    AddIndex {
        /// Table name.
        table: String,
        /// The index.
        index: IndexSpec,
    },
    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// The index as it was.
        index: IndexSpec,
    },
    /// Add a foreign key constraint.
    AddForeignKey {
        /// Referencing table.
        table: String,
        /// The constraint.
        foreign_key: ForeignKeySpec,
    },
    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Referencing table.
        table: String,
        /// The constraint as it was.
        foreign_key: ForeignKeySpec,
    },
    /// Rebuild a table through a copy, for changes the platform cannot
    /// express with `ALTER TABLE`.
    RecreateTable {
        /// Current table.
        old: TableSpec,
        /// Desired table.
        new: TableSpec,
    },
}

/// Operation kind, used for bucketing and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    /// [`Operation::DropForeignKey`]
    DropForeignKey,
    /// [`Operation::DropIndex`]
    DropIndex,
    /// [`Operation::DropColumn`]
    DropColumn,
    /// [`Operation::DropTable`]
    DropTable,
    /// [`Operation::CreateTable`]
    CreateTable,
    /// [`Operation::AddColumn`]
    AddColumn,
    /// [`Operation::ModifyColumn`]
    ModifyColumn,
    /// [`Operation::RecreateTable`]
    RecreateTable,
    /// [`Operation::AddIndex`]
    AddIndex,
    /// [`Operation::AddForeignKey`]
    AddForeignKey,
}

impl Operation {
    /// Create-table operation.
    #[must_use]
    pub const fn create_table(table: TableSpec) -> Self {
        Self::CreateTable(table)
    }

    /// Drop-table operation.
    #[must_use]
    pub const fn drop_table(table: TableSpec) -> Self {
        Self::DropTable(table)
    }

    /// Add-column operation.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: ColumnSpec) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Drop-column operation.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column: ColumnSpec) -> Self {
        Self::DropColumn {
            table: table.into(),
            column,
        }
    }

    /// Modify-column operation.
    #[must_use]
    pub fn modify_column(table: impl Into<String>, old: ColumnSpec, new: ColumnSpec) -> Self {
        Self::ModifyColumn {
            table: table.into(),
            old,
            new,
        }
    }

    /// Add-index operation.
    #[must_use]
    pub fn add_index(table: impl Into<String>, index: IndexSpec) -> Self {
        Self::AddIndex {
            table: table.into(),
            index,
        }
    }

    /// Drop-index operation.
    #[must_use]
    pub fn drop_index(table: impl Into<String>, index: IndexSpec) -> Self {
        Self::DropIndex {
            table: table.into(),
            index,
        }
    }

    /// Add-foreign-key operation.
    #[must_use]
    pub fn add_foreign_key(table: impl Into<String>, foreign_key: ForeignKeySpec) -> Self {
        Self::AddForeignKey {
            table: table.into(),
            foreign_key,
        }
    }

    /// Drop-foreign-key operation.
    #[must_use]
    pub fn drop_foreign_key(table: impl Into<String>, foreign_key: ForeignKeySpec) -> Self {
        Self::DropForeignKey {
            table: table.into(),
            foreign_key,
        }
    }

    /// Name of the table this operation touches.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(t) | Self::DropTable(t) => &t.name,
            Self::RecreateTable { new, .. } => &new.name,
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::AddIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. } => table,
        }
    }

    /// The operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::CreateTable(_) => OperationKind::CreateTable,
            Self::DropTable(_) => OperationKind::DropTable,
            Self::AddColumn { .. } => OperationKind::AddColumn,
            Self::DropColumn { .. } => OperationKind::DropColumn,
            Self::ModifyColumn { .. } => OperationKind::ModifyColumn,
            Self::AddIndex { .. } => OperationKind::AddIndex,
            Self::DropIndex { .. } => OperationKind::DropIndex,
            Self::AddForeignKey { .. } => OperationKind::AddForeignKey,
            Self::DropForeignKey { .. } => OperationKind::DropForeignKey,
            Self::RecreateTable { .. } => OperationKind::RecreateTable,
        }
    }

    /// Returns a short human-readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable(t) => format!("Create table {}", t.name),
            Self::DropTable(t) => format!("Drop table {}", t.name),
            Self::AddColumn { table, column } => {
                format!("Add column {} to {table}", column.name)
            }
            Self::DropColumn { table, column } => {
                format!("Drop column {} from {table}", column.name)
            }
            Self::ModifyColumn { table, new, .. } => {
                format!("Modify column {} on {table}", new.name)
            }
            Self::AddIndex { table, index } => {
                format!("Create index {} on {table}", index.name)
            }
            Self::DropIndex { table, index } => {
                format!("Drop index {} from {table}", index.name)
            }
            Self::AddForeignKey { table, foreign_key } => {
                format!("Add foreign key {} on {table}", foreign_key.name)
            }
            Self::DropForeignKey { table, foreign_key } => {
                format!("Drop foreign key {} from {table}", foreign_key.name)
            }
            Self::RecreateTable { new, .. } => format!("Recreate table {}", new.name),
        }
    }

    /// Returns the operation that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::CreateTable(t) => Self::DropTable(t.clone()),
            Self::DropTable(t) => Self::CreateTable(t.clone()),
            Self::AddColumn { table, column } => Self::drop_column(table, column.clone()),
            Self::DropColumn { table, column } => Self::add_column(table, column.clone()),
            Self::ModifyColumn { table, old, new } => {
                Self::modify_column(table, new.clone(), old.clone())
            }
            Self::AddIndex { table, index } => Self::drop_index(table, index.clone()),
            Self::DropIndex { table, index } => Self::add_index(table, index.clone()),
            Self::AddForeignKey { table, foreign_key } => {
                Self::drop_foreign_key(table, foreign_key.clone())
            }
            Self::DropForeignKey { table, foreign_key } => {
                Self::add_foreign_key(table, foreign_key.clone())
            }
            Self::RecreateTable { old, new } => Self::RecreateTable {
                old: new.clone(),
                new: old.clone(),
            },
        }
    }
}

impl From<TableSpec> for Operation {
    fn from(table: TableSpec) -> Self {
        Self::CreateTable(table)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Inverts a sequence: each operation inverted, in reverse order.
#[must_use]
pub fn inverse(operations: &[Operation]) -> Vec<Operation> {
    operations.iter().rev().map(Operation::inverse).collect()
}
