//! Fluent column builders.
//!
//! Shorthand functions create a [`ColumnBuilder`] for each built-in
//! logical type; [`column`] covers registered custom types.
//!
//! ```rust
//! use oxide_schema::column_builder::{decimal, string, uuid};
//!
//! let id = uuid("id").primary_key().build();
//! let email = string("email", 255).not_null().unique().build();
//! let price = decimal("price", 10, 2).not_null().default_literal("0").build();
//!
//! assert!(id.primary_key && !id.nullable);
//! assert!(email.unique);
//! assert_eq!(price.scale, Some(2));
//! ```

use crate::schema::{ColumnSpec, DefaultValue};

/// Builder for a [`ColumnSpec`]. Columns start nullable.
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    spec: ColumnSpec,
}

impl ColumnBuilder {
    /// Creates a builder for a column of the given logical type.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            spec: ColumnSpec::new(name, type_name),
        }
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.spec.nullable = false;
        self
    }

    /// Marks the column as nullable (default).
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.spec.nullable = true;
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.spec.primary_key = true;
        self.spec.nullable = false;
        self
    }

    /// Marks the column as UNIQUE.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.spec.unique = true;
        self
    }

    /// Sets the character length.
    #[must_use]
    pub const fn length(mut self, length: u32) -> Self {
        self.spec.length = Some(length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub const fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.spec.precision = Some(precision);
        self.spec.scale = Some(scale);
        self
    }

    /// Sets a literal default, in the type's text form.
    #[must_use]
    pub fn default_literal(mut self, value: impl Into<String>) -> Self {
        self.spec.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Sets an expression default (e.g. `CURRENT_TIMESTAMP`).
    #[must_use]
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.spec.default = Some(DefaultValue::Expression(expr.into()));
        self
    }

    /// Builds the column spec.
    #[must_use]
    pub fn build(self) -> ColumnSpec {
        self.spec
    }
}

// =============================================================================
// Shorthand Functions for Built-in Types
// =============================================================================

/// Creates a column of any registered logical type.
#[must_use]
pub fn column(name: impl Into<String>, type_name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, type_name)
}

/// Creates an `integer` column builder.
#[must_use]
pub fn integer(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, "integer")
}

/// Creates a `float` column builder.
#[must_use]
pub fn float(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, "float")
}

/// Creates a `boolean` column builder.
#[must_use]
pub fn boolean(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, "boolean")
}

/// Creates a `string` column builder of the given length.
#[must_use]
pub fn string(name: impl Into<String>, length: u32) -> ColumnBuilder {
    ColumnBuilder::new(name, "string").length(length)
}

/// Creates a `text` column builder.
#[must_use]
pub fn text(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, "text")
}

/// Creates a `json` column builder.
#[must_use]
pub fn json(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, "json")
}

/// Creates a `uuid` column builder.
#[must_use]
pub fn uuid(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, "uuid")
}

/// Creates a `decimal` column builder.
#[must_use]
pub fn decimal(name: impl Into<String>, precision: u32, scale: u32) -> ColumnBuilder {
    ColumnBuilder::new(name, "decimal").precision(precision, scale)
}
