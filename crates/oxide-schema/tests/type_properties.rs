//! Property tests for the built-in logical types.

use oxide_schema::types::{normalize_decimal, TypeOptions, TypeRegistry, Value};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn registry() -> TypeRegistry {
    TypeRegistry::with_builtin_types()
}

fn options_for(name: &str) -> TypeOptions {
    if name == "decimal" {
        TypeOptions::with_precision(28, 6)
    } else {
        TypeOptions::default()
    }
}

/// Values as an engine may hand them back, paired with the column type.
fn stored_values() -> impl Strategy<Value = (&'static str, Value)> {
    prop_oneof![
        any::<i64>().prop_map(|n| ("boolean", Value::Integer(n))),
        any::<bool>().prop_map(|b| ("boolean", Value::Text(if b { "true" } else { "f" }.into()))),
        any::<i64>().prop_map(|n| ("integer", Value::Integer(n))),
        (-1e9f64..1e9).prop_map(|x| ("float", Value::Float(x))),
        (any::<i64>(), 0u32..6)
            .prop_map(|(m, d)| ("decimal", Value::Text(Decimal::new(m, d).to_string()))),
        (-1e6f64..1e6).prop_map(|x| ("decimal", Value::Float(x))),
        (-1e9f64..1e9).prop_map(|x| ("string", Value::Float(x))),
        any::<String>().prop_map(|s| ("text", Value::Text(s))),
        (any::<i64>(), "[a-z ]{0,10}").prop_map(|(n, s)| {
            ("json", Value::Text(format!(r#"{{ "s": "{s}", "n": {n} }}"#)))
        }),
        any::<u128>()
            .prop_map(|b| ("uuid", Value::Text(Uuid::from_u128(b).to_string().to_uppercase()))),
    ]
}

proptest! {
    #[test]
    fn decimal_normalization_is_idempotent(mantissa in any::<i64>(), digits in 0u32..8, scale in 0u32..8) {
        let input = Decimal::new(mantissa, digits).to_string();
        let once = normalize_decimal(&input, scale).unwrap();
        let twice = normalize_decimal(&once, scale).unwrap();
        prop_assert_eq!(&once, &twice);

        let fraction = once.split_once('.').map_or(0, |(_, f)| f.len());
        prop_assert_eq!(fraction, scale as usize);
    }

    #[test]
    fn decimal_defaults_compare_after_padding(mantissa in -1_000_000i64..1_000_000, digits in 0u32..4) {
        let value = Decimal::new(mantissa, digits);
        let padded = if digits == 0 {
            format!("{value}.000")
        } else {
            format!("{value}000")
        };
        prop_assert_eq!(
            normalize_decimal(&value.to_string(), 4).unwrap(),
            normalize_decimal(&padded, 4).unwrap()
        );
    }

    #[test]
    fn decimal_round_trips_through_storage(mantissa in any::<i64>(), digits in 0u32..6) {
        let registry = registry();
        let ty = registry.resolve("decimal").unwrap();
        let options = TypeOptions::with_precision(28, 6);
        let value = Value::Decimal(Decimal::new(mantissa, digits));

        let stored = ty.to_storage(&value, &options).unwrap();
        prop_assert!(stored.is_storage_shaped());
        prop_assert_eq!(ty.to_value(&stored, &options).unwrap(), value);
    }

    #[test]
    fn reading_then_storing_is_idempotent((name, stored) in stored_values()) {
        let registry = registry();
        let ty = registry.resolve(name).unwrap();
        let options = options_for(name);

        let direct = ty.to_storage(&stored, &options).unwrap();
        let value = ty.to_value(&stored, &options).unwrap();
        prop_assert_eq!(ty.to_storage(&value, &options).unwrap(), direct.clone());
        prop_assert!(direct.is_storage_shaped());
    }

    #[test]
    fn text_json_and_float_round_trip(s in any::<String>(), n in any::<i64>(), x in -1e12f64..1e12) {
        let registry = registry();
        let options = TypeOptions::default();

        let text = registry.resolve("text").unwrap();
        let stored = text.to_storage(&Value::Text(s.clone()), &options).unwrap();
        prop_assert_eq!(text.to_value(&stored, &options).unwrap(), Value::Text(s.clone()));

        let json = registry.resolve("json").unwrap();
        let doc = Value::Json(serde_json::json!({ "label": s, "count": n, "tags": [n, null] }));
        let stored = json.to_storage(&doc, &options).unwrap();
        prop_assert!(matches!(stored, Value::Text(_)));
        prop_assert_eq!(json.to_value(&stored, &options).unwrap(), doc);

        let float = registry.resolve("float").unwrap();
        let stored = float.to_storage(&Value::Float(x), &options).unwrap();
        prop_assert_eq!(float.to_value(&stored, &options).unwrap(), Value::Float(x));
    }

    #[test]
    fn uuid_round_trips_through_storage(bits in any::<u128>()) {
        let registry = registry();
        let ty = registry.resolve("uuid").unwrap();
        let value = Value::Uuid(Uuid::from_u128(bits));

        let stored = ty.to_storage(&value, &TypeOptions::default()).unwrap();
        prop_assert!(matches!(&stored, Value::Text(s) if s.len() == 36));
        prop_assert_eq!(ty.to_value(&stored, &TypeOptions::default()).unwrap(), value);
    }

    #[test]
    fn integers_and_booleans_round_trip(n in any::<i64>(), flag in any::<bool>()) {
        let registry = registry();
        let options = TypeOptions::default();

        let integer = registry.resolve("integer").unwrap();
        let stored = integer.to_storage(&Value::Integer(n), &options).unwrap();
        prop_assert_eq!(integer.to_value(&stored, &options).unwrap(), Value::Integer(n));

        let boolean = registry.resolve("boolean").unwrap();
        let stored = boolean.to_storage(&Value::Bool(flag), &options).unwrap();
        prop_assert_eq!(stored.clone(), Value::Integer(i64::from(flag)));
        prop_assert_eq!(boolean.to_value(&stored, &options).unwrap(), Value::Bool(flag));
    }

    #[test]
    fn strings_respect_declared_length(s in "[a-z]{0,20}", length in 1u32..20) {
        let registry = registry();
        let ty = registry.resolve("string").unwrap();
        let result = ty.to_storage(&Value::Text(s.clone()), &TypeOptions::with_length(length));
        prop_assert_eq!(result.is_ok(), s.chars().count() <= length as usize);
    }

    #[test]
    fn values_resolve_to_a_compatible_type(n in any::<i64>()) {
        let registry = registry();
        let ty = registry.resolve_for_value(&Value::Integer(n)).unwrap();
        prop_assert_eq!(ty.name(), "integer");
    }
}

#[test]
fn decimals_store_and_read_floats_alike() {
    let registry = registry();
    let ty = registry.resolve("decimal").unwrap();
    let options = TypeOptions::with_precision(10, 2);

    let stored = ty.to_storage(&Value::Float(0.1), &options).unwrap();
    assert_eq!(stored, Value::Text("0.10".into()));
    assert_eq!(
        ty.to_value(&Value::Float(0.1), &options).unwrap(),
        ty.to_value(&stored, &options).unwrap()
    );
    assert!(ty.to_storage(&Value::Float(f64::INFINITY), &options).is_err());
}

#[test]
fn null_passes_through() {
    let registry = registry();
    for name in ["uuid", "decimal", "json", "boolean"] {
        let ty = registry.resolve(name).unwrap();
        assert_eq!(
            ty.to_storage(&Value::Null, &TypeOptions::default()).unwrap(),
            Value::Null,
            "{name}"
        );
    }
}
