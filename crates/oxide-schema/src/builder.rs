//! Desired schema synthesis from entity metadata.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::metadata::{EntityMetadata, FieldDescriptor, RelationDescriptor, RelationKind};
use crate::schema::{
    ColumnSpec, DefaultValue, ForeignKeySpec, IndexSpec, ReferentialAction, SchemaSpec, TableSpec,
};
use crate::types::TypeRegistry;

/// Builds the desired [`SchemaSpec`] from entity metadata.
///
/// # Example
///
/// ```rust
/// use oxide_schema::builder::SchemaBuilder;
/// use oxide_schema::metadata::{EntityMetadata, FieldDescriptor, RelationDescriptor};
/// use oxide_schema::types::TypeRegistry;
///
/// let registry = TypeRegistry::with_builtin_types();
/// let entities = vec![
///     EntityMetadata::new("User", "users")
///         .field(FieldDescriptor::id("id", "uuid"))
///         .field(FieldDescriptor::new("email", "string").length(255).unique()),
///     EntityMetadata::new("Todo", "todos")
///         .field(FieldDescriptor::id("id", "uuid"))
///         .relation(RelationDescriptor::many_to_one("user", "User")),
/// ];
///
/// let schema = SchemaBuilder::new(&registry).build(&entities).unwrap();
/// let todos = schema.table("todos").unwrap();
/// assert!(todos.column("user_id").is_some());
/// assert_eq!(todos.foreign_keys[0].referenced_table, "users");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SchemaBuilder<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> SchemaBuilder<'r> {
    /// Creates a builder resolving types through `registry`.
    #[must_use]
    pub const fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Builds one table per entity plus join tables for owning
    /// many-to-many relations.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::InvalidEntityClass`] when an entity does not have
    ///   exactly one identifier field, names collide, or a relation
    ///   targets an unknown entity.
    /// - [`SchemaError::UnknownType`] for unregistered field types.
    /// - [`SchemaError::InvalidValue`] for defaults the type rejects.
    pub fn build(&self, entities: &[EntityMetadata]) -> Result<SchemaSpec> {
        let mut by_name: BTreeMap<&str, &EntityMetadata> = BTreeMap::new();
        let mut tables_seen: BTreeSet<&str> = BTreeSet::new();
        for entity in entities {
            if by_name.insert(entity.name.as_str(), entity).is_some() {
                return Err(SchemaError::invalid_entity(
                    &entity.name,
                    "entity declared more than once",
                ));
            }
            if !tables_seen.insert(entity.table.as_str()) {
                return Err(SchemaError::invalid_entity(
                    &entity.name,
                    format!("table '{}' is mapped by another entity", entity.table),
                ));
            }
        }

        // ---- Pass 1: scalar columns -------------------------------
        let mut schema = SchemaSpec::new();
        for entity in entities {
            schema.add_table(self.entity_table(entity)?);
        }

        // ---- Pass 2: relations ------------------------------------
        for entity in entities {
            for relation in &entity.relations {
                let target = by_name.get(relation.target.as_str()).ok_or_else(|| {
                    SchemaError::invalid_entity(
                        &entity.name,
                        format!(
                            "relation '{}' targets unknown entity '{}'",
                            relation.field, relation.target
                        ),
                    )
                })?;
                Self::apply_relation(&mut schema, entity, target, relation)?;
            }
        }

        // ---- Pass 3: indexes --------------------------------------
        for entity in entities {
            Self::add_indexes(&mut schema, entity)?;
        }

        debug!(tables = schema.tables.len(), "Built desired schema");
        Ok(schema)
    }

    fn entity_table(&self, entity: &EntityMetadata) -> Result<TableSpec> {
        let ids = entity.id_fields().count();
        if ids != 1 {
            return Err(SchemaError::invalid_entity(
                &entity.name,
                format!("expected exactly one identifier field, found {ids}"),
            ));
        }

        let mut table = TableSpec::new(&entity.table);
        for field in &entity.fields {
            let column = self.field_column(field)?;
            if table.column(&column.name).is_some() {
                return Err(SchemaError::invalid_entity(
                    &entity.name,
                    format!("column '{}' is mapped twice", column.name),
                ));
            }
            table.columns.push(column);
        }
        Ok(table)
    }

    /// Indexes are attached after relations so they can cover join
    /// columns.
    fn add_indexes(schema: &mut SchemaSpec, entity: &EntityMetadata) -> Result<()> {
        let Some(table) = schema.tables.get_mut(&entity.table) else {
            return Ok(());
        };
        for index in &entity.indexes {
            if index.columns.is_empty() {
                return Err(SchemaError::invalid_entity(&entity.name, "index without columns"));
            }
            if let Some(missing) = index.columns.iter().find(|c| table.column(c).is_none()) {
                return Err(SchemaError::invalid_entity(
                    &entity.name,
                    format!("index column '{missing}' is not mapped"),
                ));
            }
            let name = index.name.clone().unwrap_or_else(|| {
                IndexSpec::derive_name(&entity.table, &index.columns, index.unique)
            });
            if table.index(&name).is_some() {
                return Err(SchemaError::invalid_entity(
                    &entity.name,
                    format!("index '{name}' is declared twice"),
                ));
            }
            table.indexes.push(IndexSpec {
                name,
                columns: index.columns.clone(),
                unique: index.unique,
            });
        }
        Ok(())
    }

    fn field_column(&self, field: &FieldDescriptor) -> Result<ColumnSpec> {
        let ty = self.registry.resolve(&field.type_name)?;
        let mut column = ColumnSpec::new(field.column_name(), ty.name());
        column.length = field.length;
        column.precision = field.precision;
        column.scale = field.scale;
        column.nullable = field.nullable && !field.id;
        column.unique = field.unique && !field.id;
        column.primary_key = field.id;

        column.default = match (&field.default, &field.default_expression) {
            (_, Some(expr)) => Some(DefaultValue::Expression(expr.clone())),
            (Some(serde_json::Value::Null) | None, None) => None,
            (Some(value), None) => {
                let raw = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let options = ty.resolve_options(&column.type_options());
                Some(DefaultValue::Literal(ty.normalize_default(&raw, &options)?))
            }
        };
        Ok(column)
    }

    fn apply_relation(
        schema: &mut SchemaSpec,
        entity: &EntityMetadata,
        target: &EntityMetadata,
        relation: &RelationDescriptor,
    ) -> Result<()> {
        match relation.kind {
            RelationKind::ManyToOne | RelationKind::OneToOne if relation.owning => {
                Self::add_join_column(schema, entity, target, relation)
            }
            RelationKind::ManyToMany if relation.owning => {
                Self::add_join_table(schema, entity, target, relation)
            }
            // Inverse sides are mapped by the owning entity.
            _ => Ok(()),
        }
    }

    fn target_id(schema: &SchemaSpec, target: &EntityMetadata) -> Result<ColumnSpec> {
        schema
            .table(&target.table)
            .and_then(|t| t.columns.iter().find(|c| c.primary_key))
            .cloned()
            .ok_or_else(|| SchemaError::invalid_entity(&target.name, "no identifier column"))
    }

    fn add_join_column(
        schema: &mut SchemaSpec,
        entity: &EntityMetadata,
        target: &EntityMetadata,
        relation: &RelationDescriptor,
    ) -> Result<()> {
        let target_id = Self::target_id(schema, target)?;
        let referenced_column = target_id.name.clone();
        let column_name = relation
            .join_column
            .clone()
            .unwrap_or_else(|| format!("{}_id", relation.field));

        let table = schema
            .tables
            .get_mut(&entity.table)
            .ok_or_else(|| SchemaError::invalid_entity(&entity.name, "table not built"))?;

        match table.columns.iter_mut().find(|c| c.name == column_name) {
            // A scalar field already maps the join column.
            Some(existing) => {
                if relation.kind == RelationKind::OneToOne {
                    existing.unique = true;
                }
            }
            None => {
                let mut column = target_id;
                column.name.clone_from(&column_name);
                column.primary_key = false;
                column.default = None;
                column.nullable = relation.nullable;
                column.unique = relation.kind == RelationKind::OneToOne;
                table.columns.push(column);
            }
        }

        let foreign_key = ForeignKeySpec::new(
            &entity.table,
            &[column_name.as_str()],
            &target.table,
            &[referenced_column.as_str()],
        )
        .on_delete(relation.on_delete.unwrap_or_default())
        .on_update(relation.on_update.unwrap_or_default());

        if let Some(table) = schema.tables.get_mut(&entity.table) {
            if table.foreign_key(&foreign_key.name).is_none() {
                table.foreign_keys.push(foreign_key);
            }
        }
        Ok(())
    }

    fn add_join_table(
        schema: &mut SchemaSpec,
        entity: &EntityMetadata,
        target: &EntityMetadata,
        relation: &RelationDescriptor,
    ) -> Result<()> {
        let join_name = relation
            .join_table
            .clone()
            .unwrap_or_else(|| format!("{}_{}", entity.table, target.table));
        if schema.contains(&join_name) {
            debug!(table = %join_name, "Reusing existing join table");
            return Ok(());
        }

        let source_id = Self::target_id(schema, entity)?;
        let target_id = Self::target_id(schema, target)?;
        let source_col = relation
            .join_column
            .clone()
            .unwrap_or_else(|| format!("{}_id", snake_case(&entity.name)));
        let target_col = relation
            .inverse_join_column
            .clone()
            .unwrap_or_else(|| format!("{}_id", snake_case(&target.name)));
        if source_col == target_col {
            return Err(SchemaError::invalid_entity(
                &entity.name,
                format!(
                    "join table '{join_name}' needs distinct column names; set join_column or inverse_join_column"
                ),
            ));
        }

        let mut table = TableSpec::new(&join_name);
        for (name, id) in [(&source_col, &source_id), (&target_col, &target_id)] {
            let mut column = id.clone();
            column.name.clone_from(name);
            column.primary_key = true;
            column.nullable = false;
            column.unique = false;
            column.default = None;
            table.columns.push(column);
        }
        for (column, referenced, id) in [
            (&source_col, &entity.table, &source_id),
            (&target_col, &target.table, &target_id),
        ] {
            table.foreign_keys.push(
                ForeignKeySpec::new(&join_name, &[column.as_str()], referenced, &[id.name.as_str()])
                    .on_delete(ReferentialAction::Cascade),
            );
        }
        schema.add_table(table);
        Ok(())
    }
}

/// `BlogPost` -> `blog_post`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
