//! Registry of logical types.

use std::collections::HashMap;
use std::fmt;

use super::builtin::{
    BooleanType, DecimalType, FloatType, IntegerType, JsonType, StringType, TextType, UuidType,
};
use super::{declare_for, LogicalType, NativeType, TypeOptions, Value};
use crate::error::{Result, SchemaError};
use crate::platform::PlatformFamily;

/// Maps logical type names to their handlers.
///
/// Registration order matters: [`TypeRegistry::resolve_for_value`] and
/// [`TypeRegistry::resolve_native`] return the first registered type that
/// matches, so later registrations act as fallbacks.
///
/// # Example
///
/// ```rust
/// use oxide_schema::platform::PlatformFamily;
/// use oxide_schema::types::{TypeOptions, TypeRegistry};
///
/// let registry = TypeRegistry::with_builtin_types();
/// let sql = registry
///     .declare("decimal", PlatformFamily::MySql, &TypeOptions::with_precision(8, 2))
///     .unwrap();
/// assert_eq!(sql, "DECIMAL(8, 2)");
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    types: Vec<Box<dyn LogicalType>>,
    by_name: HashMap<&'static str, usize>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in types, in this order:
    /// `integer`, `float`, `boolean`, `string`, `text`, `json`, `uuid`,
    /// `decimal`.
    #[must_use]
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry
            .register(IntegerType)
            .register(FloatType)
            .register(BooleanType)
            .register(StringType)
            .register(TextType)
            .register(JsonType)
            .register(UuidType)
            .register(DecimalType);
        registry
    }

    /// Registers a type. A type with the same name is replaced in place,
    /// keeping its original position.
    pub fn register(&mut self, ty: impl LogicalType + 'static) -> &mut Self {
        let name = ty.name();
        if let Some(&index) = self.by_name.get(name) {
            self.types[index] = Box::new(ty);
        } else {
            self.by_name.insert(name, self.types.len());
            self.types.push(Box::new(ty));
        }
        self
    }

    /// Looks up a type by name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] if no type has that name.
    pub fn resolve(&self, name: &str) -> Result<&dyn LogicalType> {
        self.by_name
            .get(name)
            .map(|&i| &*self.types[i])
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Returns the first registered type compatible with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] naming the value kind when no
    /// registered type accepts it.
    pub fn resolve_for_value(&self, value: &Value) -> Result<&dyn LogicalType> {
        self.types
            .iter()
            .map(|ty| &**ty)
            .find(|ty| ty.is_compatible(value))
            .ok_or_else(|| SchemaError::UnknownType(format!("<{} value>", value.kind())))
    }

    /// Declares `type_name` for `family`, filling unset options with the
    /// type's defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] for unregistered names.
    pub fn declare(
        &self,
        type_name: &str,
        family: PlatformFamily,
        options: &TypeOptions,
    ) -> Result<String> {
        let ty = self.resolve(type_name)?;
        Ok(declare_for(ty, family, &ty.resolve_options(options)))
    }

    /// Maps a catalog type declaration back to a logical type.
    #[must_use]
    pub fn resolve_native(
        &self,
        family: PlatformFamily,
        native: &str,
    ) -> Option<(&dyn LogicalType, TypeOptions)> {
        let parsed = NativeType::parse(native);
        self.types
            .iter()
            .map(|ty| &**ty)
            .find_map(|ty| ty.claims(family, &parsed).map(|opts| (ty, opts)))
    }

    /// Registered type names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.iter().map(|ty| ty.name())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MoneyType;

    impl LogicalType for MoneyType {
        fn name(&self) -> &'static str {
            "money"
        }

        fn to_storage(&self, value: &Value, _options: &TypeOptions) -> Result<Value> {
            Ok(value.clone())
        }

        fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
            Ok(stored.clone())
        }

        fn is_compatible(&self, value: &Value) -> bool {
            matches!(value, Value::Integer(_))
        }

        fn declare_generic(&self, _options: &TypeOptions) -> String {
            "BIGINT".to_string()
        }

        fn claims(&self, _family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
            native.is(&["BIGINT"]).then(TypeOptions::default)
        }
    }

    #[test]
    fn builtin_types_in_order() {
        let registry = TypeRegistry::with_builtin_types();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(
            names,
            vec!["integer", "float", "boolean", "string", "text", "json", "uuid", "decimal"]
        );
    }

    #[test]
    fn resolve_unknown_type_fails() {
        let registry = TypeRegistry::with_builtin_types();
        assert_eq!(
            registry.resolve("geometry").unwrap_err(),
            SchemaError::UnknownType("geometry".into())
        );
    }

    #[test]
    fn first_compatible_type_wins() {
        let mut registry = TypeRegistry::with_builtin_types();
        registry.register(MoneyType);
        // `integer` was registered first.
        assert_eq!(
            registry.resolve_for_value(&Value::Integer(5)).unwrap().name(),
            "integer"
        );
        // `string` shadows `text` for text values.
        assert_eq!(
            registry.resolve_for_value(&"x".into()).unwrap().name(),
            "string"
        );
        assert!(registry.resolve_for_value(&Value::Null).is_err());
    }

    #[test]
    fn custom_type_acts_as_fallback() {
        let mut registry = TypeRegistry::new();
        registry.register(MoneyType);
        assert_eq!(
            registry.resolve_for_value(&Value::Integer(5)).unwrap().name(),
            "money"
        );
    }

    #[test]
    fn register_replaces_in_place() {
        let mut registry = TypeRegistry::with_builtin_types();
        let before = registry.len();
        registry.register(IntegerType);
        assert_eq!(registry.len(), before);
        assert_eq!(registry.names().next(), Some("integer"));
    }

    #[test]
    fn declare_dispatches_per_family() {
        let registry = TypeRegistry::with_builtin_types();
        let opts = TypeOptions::default();
        assert_eq!(
            registry.declare("uuid", PlatformFamily::Generic, &opts).unwrap(),
            "UUID"
        );
        assert_eq!(
            registry.declare("uuid", PlatformFamily::Sqlite, &opts).unwrap(),
            "CHAR(36)"
        );
        assert_eq!(
            registry.declare("boolean", PlatformFamily::MySql, &opts).unwrap(),
            "TINYINT(1)"
        );
        assert_eq!(
            registry.declare("string", PlatformFamily::Sqlite, &opts).unwrap(),
            "VARCHAR(255)"
        );
        assert_eq!(
            registry.declare("decimal", PlatformFamily::Sqlite, &opts).unwrap(),
            "DECIMAL(10, 0)"
        );
    }

    #[test]
    fn resolve_native_round_trips_declarations() {
        let registry = TypeRegistry::with_builtin_types();
        for family in [PlatformFamily::Sqlite, PlatformFamily::MySql, PlatformFamily::Generic] {
            for name in registry.names().collect::<Vec<_>>() {
                let declared = registry.declare(name, family, &TypeOptions::default()).unwrap();
                let (ty, _) = registry
                    .resolve_native(family, &declared)
                    .unwrap_or_else(|| panic!("{declared} not claimed on {family:?}"));
                assert_eq!(ty.name(), name, "{declared} on {family:?}");
            }
        }
    }
}
