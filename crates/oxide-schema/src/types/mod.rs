//! Pluggable scalar type system.
//!
//! A [`LogicalType`] is a platform-independent scalar type (`decimal`,
//! `uuid`, ...) that knows how to convert host values to and from their
//! storage form, how to declare itself on each platform family, and how
//! to canonicalize literal defaults so the differ can compare them.
//!
//! Handlers live in a [`TypeRegistry`] built once at start-up and passed
//! by reference to every component that resolves types.

mod builtin;
mod decimal;
mod registry;
mod value;

pub use builtin::{
    BooleanType, DecimalType, FloatType, IntegerType, JsonType, StringType, TextType, UuidType,
    DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, DEFAULT_STRING_LENGTH,
};
pub use decimal::normalize_decimal;
pub use registry::TypeRegistry;
pub use value::Value;

use std::fmt;

use crate::error::Result;
use crate::platform::PlatformFamily;

/// Declaration parameters for a logical type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeOptions {
    /// Character length (`string`).
    pub length: Option<u32>,
    /// Total digits (`decimal`).
    pub precision: Option<u32>,
    /// Fractional digits (`decimal`).
    pub scale: Option<u32>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
}

impl TypeOptions {
    /// Options with only a length set.
    #[must_use]
    pub const fn with_length(length: u32) -> Self {
        Self {
            length: Some(length),
            precision: None,
            scale: None,
            nullable: false,
        }
    }

    /// Options with precision and scale set.
    #[must_use]
    pub const fn with_precision(precision: u32, scale: u32) -> Self {
        Self {
            length: None,
            precision: Some(precision),
            scale: Some(scale),
            nullable: false,
        }
    }
}

/// A native column type as reported by a catalog, e.g. `varchar(255)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeType {
    /// Upper-cased base name without arguments, e.g. `VARCHAR`.
    pub base: String,
    /// Numeric arguments in declaration order.
    pub args: Vec<u32>,
}

impl NativeType {
    /// Parses a catalog type string.
    ///
    /// Trailing modifiers such as `UNSIGNED` are ignored; non-numeric
    /// arguments are skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (head, args) = match (raw.find('('), raw.rfind(')')) {
            (Some(open), Some(close)) if close > open => {
                let args = raw[open + 1..close]
                    .split(',')
                    .filter_map(|a| a.trim().parse::<u32>().ok())
                    .collect();
                (&raw[..open], args)
            }
            _ => (raw, Vec::new()),
        };
        let base = head
            .split_whitespace()
            .filter(|word| {
                !matches!(
                    word.to_ascii_uppercase().as_str(),
                    "UNSIGNED" | "SIGNED" | "ZEROFILL"
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        Self { base, args }
    }

    /// Returns the argument at `index`.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<u32> {
        self.args.get(index).copied()
    }

    /// Returns `true` if the base name is one of `names`.
    #[must_use]
    pub fn is(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.base == *n)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

/// Capability set every logical type implements.
pub trait LogicalType: fmt::Debug + Send + Sync {
    /// Registered name, e.g. `"decimal"`.
    fn name(&self) -> &'static str;

    /// Keeps the options this type uses, filling unset ones with the
    /// type's defaults, and clears the rest.
    fn resolve_options(&self, options: &TypeOptions) -> TypeOptions {
        TypeOptions {
            nullable: options.nullable,
            ..TypeOptions::default()
        }
    }

    /// Converts a host value into its storage form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SchemaError::InvalidValue`] if the value is not
    /// acceptable for this type.
    fn to_storage(&self, value: &Value, options: &TypeOptions) -> Result<Value>;

    /// Converts a stored value back into a host value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SchemaError::InvalidValue`] if the stored value
    /// cannot be interpreted as this type.
    fn to_value(&self, stored: &Value, options: &TypeOptions) -> Result<Value>;

    /// Whether a host value of this kind belongs to this type.
    fn is_compatible(&self, value: &Value) -> bool;

    /// Platform-neutral SQL declaration.
    fn declare_generic(&self, options: &TypeOptions) -> String;

    /// SQLite-family override.
    fn declare_sqlite(&self, _options: &TypeOptions) -> Option<String> {
        None
    }

    /// MySQL/MariaDB-family override.
    fn declare_mysql(&self, _options: &TypeOptions) -> Option<String> {
        None
    }

    /// Recognizes a catalog type on `family`, returning the options it
    /// encodes when this type owns the declaration.
    fn claims(&self, family: PlatformFamily, native: &NativeType) -> Option<TypeOptions>;

    /// Canonical text of a literal default, used for comparison and
    /// rendering.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SchemaError::InvalidValue`] if the literal is not
    /// a valid value of this type.
    fn normalize_default(&self, raw: &str, _options: &TypeOptions) -> Result<String> {
        Ok(raw.to_string())
    }

    /// Whether canonical defaults are emitted unquoted.
    fn numeric_literal(&self) -> bool {
        false
    }
}

/// Dispatches a declaration to the family override, falling back to the
/// generic form.
pub(crate) fn declare_for(
    ty: &dyn LogicalType,
    family: PlatformFamily,
    options: &TypeOptions,
) -> String {
    let specific = match family {
        PlatformFamily::Sqlite => ty.declare_sqlite(options),
        PlatformFamily::MySql => ty.declare_mysql(options),
        PlatformFamily::Generic => None,
    };
    specific.unwrap_or_else(|| ty.declare_generic(options))
}
