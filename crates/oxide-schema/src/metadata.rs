//! Entity metadata descriptors.
//!
//! These are the explicit, serializable form of an entity's mapping:
//! table name, scalar fields with their logical types and options, and
//! relationships. They are typically loaded from JSON:
//!
//! ```json
//! {
//!   "name": "Todo",
//!   "table": "todos",
//!   "fields": [
//!     { "name": "id", "type": "uuid", "id": true },
//!     { "name": "title", "type": "string", "length": 255 }
//!   ],
//!   "relations": [
//!     { "kind": "many_to_one", "field": "user", "target": "User" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::schema::ReferentialAction;

const fn default_true() -> bool {
    true
}

/// Mapping of one entity onto one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name, referenced by relation targets.
    pub name: String,
    /// Table name.
    pub table: String,
    /// Scalar fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Relationships to other entities.
    #[serde(default)]
    pub relations: Vec<RelationDescriptor>,
    /// Secondary indexes over mapped columns.
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
}

impl EntityMetadata {
    /// Creates an entity with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            relations: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Appends an index.
    #[must_use]
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Fields flagged as identifiers.
    pub fn id_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.id)
    }
}

/// A scalar field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Column name; defaults to the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Logical type name.
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
    #[serde(default)]
    pub nullable: bool,
    /// Single-column uniqueness.
    #[serde(default)]
    pub unique: bool,
    /// Identifier (primary key) field.
    #[serde(default)]
    pub id: bool,
    /// Literal default. Decimal defaults should be given as strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// SQL expression default, e.g. `CURRENT_TIMESTAMP`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_expression: Option<String>,
}

impl FieldDescriptor {
    /// A NOT NULL field of the given logical type.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            type_name: type_name.into(),
            length: None,
            precision: None,
            scale: None,
            nullable: false,
            unique: false,
            id: false,
            default: None,
            default_expression: None,
        }
    }

    /// An identifier field.
    #[must_use]
    pub fn id(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: true,
            ..Self::new(name, type_name)
        }
    }

    /// Sets the column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Sets the length.
    #[must_use]
    pub const fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub const fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Marks the field nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the field unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a literal default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets an expression default.
    #[must_use]
    pub fn default_expression(mut self, expr: impl Into<String>) -> Self {
        self.default_expression = Some(expr.into());
        self
    }

    /// The column this field maps to.
    #[must_use]
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// A secondary index. Unnamed indexes get a derived name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Column names, in order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDescriptor {
    /// An unnamed index over `columns`.
    #[must_use]
    pub fn new(columns: &[&str], unique: bool) -> Self {
        Self {
            name: None,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique,
        }
    }

    /// Sets the index name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Relationship cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Many rows of this entity point at one target row.
    ManyToOne,
    /// One row on each side.
    OneToOne,
    /// Inverse of a many-to-one; maps to nothing on this table.
    OneToMany,
    /// Association through a join table.
    ManyToMany,
}

/// A relationship to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Relationship kind.
    pub kind: RelationKind,
    /// Field name on this entity.
    pub field: String,
    /// Target entity name.
    pub target: String,
    /// Whether this side owns the mapping.
    #[serde(default = "default_true")]
    pub owning: bool,
    /// Foreign key column name; defaults to `<field>_id`, or for join
    /// tables `<entity>_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_column: Option<String>,
    /// Join table column referencing the target; defaults to
    /// `<target>_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_join_column: Option<String>,
    /// Join table name; defaults to `<table>_<target table>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<String>,
    /// Whether the foreign key column accepts NULL.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// ON DELETE action for the foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    /// ON UPDATE action for the foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
}

impl RelationDescriptor {
    /// Creates an owning relation.
    #[must_use]
    pub fn new(kind: RelationKind, field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            target: target.into(),
            owning: true,
            join_column: None,
            inverse_join_column: None,
            join_table: None,
            nullable: true,
            on_delete: None,
            on_update: None,
        }
    }

    /// Owning many-to-one.
    #[must_use]
    pub fn many_to_one(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationKind::ManyToOne, field, target)
    }

    /// Owning one-to-one.
    #[must_use]
    pub fn one_to_one(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationKind::OneToOne, field, target)
    }

    /// Inverse one-to-many.
    #[must_use]
    pub fn one_to_many(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            owning: false,
            ..Self::new(RelationKind::OneToMany, field, target)
        }
    }

    /// Owning many-to-many.
    #[must_use]
    pub fn many_to_many(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationKind::ManyToMany, field, target)
    }

    /// Marks this side as the inverse.
    #[must_use]
    pub const fn inverse(mut self) -> Self {
        self.owning = false;
        self
    }

    /// Sets the foreign key column name.
    #[must_use]
    pub fn join_column(mut self, column: impl Into<String>) -> Self {
        self.join_column = Some(column.into());
        self
    }

    /// Sets the join table column referencing the target.
    #[must_use]
    pub fn inverse_join_column(mut self, column: impl Into<String>) -> Self {
        self.inverse_join_column = Some(column.into());
        self
    }

    /// Sets the join table name.
    #[must_use]
    pub fn join_table(mut self, table: impl Into<String>) -> Self {
        self.join_table = Some(table.into());
        self
    }

    /// Marks the foreign key column NOT NULL.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_entity() {
        let json = r#"{
            "name": "Todo",
            "table": "todos",
            "fields": [
                { "name": "id", "type": "uuid", "id": true },
                { "name": "title", "type": "string", "length": 255 },
                { "name": "price", "type": "decimal", "precision": 10, "scale": 2, "default": "0" }
            ],
            "relations": [
                { "kind": "many_to_one", "field": "user", "target": "User", "on_delete": "cascade" }
            ],
            "indexes": [
                { "columns": ["title"] }
            ]
        }"#;
        let entity: EntityMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(entity.table, "todos");
        assert_eq!(entity.id_fields().count(), 1);
        assert_eq!(entity.fields[1].length, Some(255));
        assert!(!entity.fields[1].nullable);
        assert_eq!(entity.fields[2].default, Some(serde_json::json!("0")));

        let rel = &entity.relations[0];
        assert_eq!(rel.kind, RelationKind::ManyToOne);
        assert!(rel.owning);
        assert!(rel.nullable);
        assert_eq!(rel.on_delete, Some(ReferentialAction::Cascade));

        assert_eq!(entity.indexes, vec![IndexDescriptor::new(&["title"], false)]);
    }

    #[test]
    fn column_name_defaults_to_field() {
        assert_eq!(FieldDescriptor::new("title", "string").column_name(), "title");
        assert_eq!(
            FieldDescriptor::new("title", "string")
                .column("todo_title")
                .column_name(),
            "todo_title"
        );
    }
}
