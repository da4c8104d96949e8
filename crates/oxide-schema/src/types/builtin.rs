//! Built-in logical types.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::decimal::{parse_decimal, rescale};
use super::{LogicalType, NativeType, TypeOptions, Value};
use crate::error::{Result, SchemaError};
use crate::platform::PlatformFamily;

/// Default `VARCHAR` length when none is declared.
pub const DEFAULT_STRING_LENGTH: u32 = 255;
/// Default decimal precision when none is declared.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 10;
/// Default decimal scale when none is declared.
pub const DEFAULT_DECIMAL_SCALE: u32 = 0;

fn unsupported(type_name: &str, value: &Value) -> SchemaError {
    SchemaError::invalid_value(
        type_name,
        value.to_string(),
        format!("{} values are not supported", value.kind()),
    )
}

// ================================================================
// integer
// ================================================================

/// 64-bit signed integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerType;

impl IntegerType {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn coerce(value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Integer(i) => Ok(Value::Integer(*i)),
            Value::Float(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => {
                Ok(Value::Integer(*x as i64))
            }
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| SchemaError::invalid_value("integer", s.as_str(), e.to_string())),
            other => Err(unsupported("integer", other)),
        }
    }
}

impl LogicalType for IntegerType {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn to_storage(&self, value: &Value, _options: &TypeOptions) -> Result<Value> {
        Self::coerce(value)
    }

    fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
        Self::coerce(stored)
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Integer(_))
    }

    fn declare_generic(&self, _options: &TypeOptions) -> String {
        "INTEGER".to_string()
    }

    fn declare_mysql(&self, _options: &TypeOptions) -> Option<String> {
        Some("INT".to_string())
    }

    fn claims(&self, _family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        native
            .is(&["INTEGER", "INT"])
            .then(TypeOptions::default)
    }

    fn normalize_default(&self, raw: &str, _options: &TypeOptions) -> Result<String> {
        raw.trim()
            .parse::<i64>()
            .map(|i| i.to_string())
            .map_err(|e| SchemaError::invalid_value("integer", raw, e.to_string()))
    }

    fn numeric_literal(&self) -> bool {
        true
    }
}

// ================================================================
// float
// ================================================================

/// Double-precision floating point.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatType;

impl FloatType {
    #[allow(clippy::cast_precision_loss)]
    fn coerce(value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Float(x) => Ok(Value::Float(*x)),
            Value::Integer(i) => Ok(Value::Float(*i as f64)),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| SchemaError::invalid_value("float", s.as_str(), e.to_string())),
            other => Err(unsupported("float", other)),
        }
    }
}

impl LogicalType for FloatType {
    fn name(&self) -> &'static str {
        "float"
    }

    fn to_storage(&self, value: &Value, _options: &TypeOptions) -> Result<Value> {
        Self::coerce(value)
    }

    fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
        Self::coerce(stored)
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Float(_))
    }

    fn declare_generic(&self, _options: &TypeOptions) -> String {
        "DOUBLE PRECISION".to_string()
    }

    fn declare_sqlite(&self, _options: &TypeOptions) -> Option<String> {
        Some("REAL".to_string())
    }

    fn declare_mysql(&self, _options: &TypeOptions) -> Option<String> {
        Some("DOUBLE".to_string())
    }

    fn claims(&self, _family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        native
            .is(&["REAL", "DOUBLE", "DOUBLE PRECISION", "FLOAT"])
            .then(TypeOptions::default)
    }

    fn normalize_default(&self, raw: &str, _options: &TypeOptions) -> Result<String> {
        raw.trim()
            .parse::<f64>()
            .map(|x| x.to_string())
            .map_err(|e| SchemaError::invalid_value("float", raw, e.to_string()))
    }

    fn numeric_literal(&self) -> bool {
        true
    }
}

// ================================================================
// boolean
// ================================================================

/// Boolean, stored as `0` / `1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanType;

impl BooleanType {
    fn parse_flag(raw: &str) -> Option<bool> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" => Some(true),
            "0" | "false" | "f" => Some(false),
            _ => None,
        }
    }

    fn flag(value: &Value) -> Result<Option<bool>> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            Value::Integer(i) => Ok(Some(*i != 0)),
            Value::Text(s) => Self::parse_flag(s).map(Some).ok_or_else(|| {
                SchemaError::invalid_value("boolean", s.as_str(), "expected true/false or 1/0")
            }),
            other => Err(unsupported("boolean", other)),
        }
    }
}

impl LogicalType for BooleanType {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn to_storage(&self, value: &Value, _options: &TypeOptions) -> Result<Value> {
        Ok(Self::flag(value)?.map_or(Value::Null, |b| Value::Integer(i64::from(b))))
    }

    fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
        Ok(Self::flag(stored)?.map_or(Value::Null, Value::Bool))
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }

    fn declare_generic(&self, _options: &TypeOptions) -> String {
        "BOOLEAN".to_string()
    }

    fn declare_mysql(&self, _options: &TypeOptions) -> Option<String> {
        Some("TINYINT(1)".to_string())
    }

    fn claims(&self, family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        let owned = native.is(&["BOOLEAN", "BOOL"])
            || (family == PlatformFamily::MySql
                && native.is(&["TINYINT"])
                && native.arg(0) == Some(1));
        owned.then(TypeOptions::default)
    }

    fn normalize_default(&self, raw: &str, _options: &TypeOptions) -> Result<String> {
        Self::parse_flag(raw)
            .map(|b| if b { "1" } else { "0" }.to_string())
            .ok_or_else(|| {
                SchemaError::invalid_value("boolean", raw, "expected true/false or 1/0")
            })
    }

    fn numeric_literal(&self) -> bool {
        true
    }
}

// ================================================================
// string / text
// ================================================================

/// Bounded-length character data.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

fn to_text(type_name: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => Ok(Value::Text(s.clone())),
        Value::Integer(i) => Ok(Value::Text(i.to_string())),
        Value::Float(x) => Ok(Value::Text(x.to_string())),
        other => Err(unsupported(type_name, other)),
    }
}

impl LogicalType for StringType {
    fn name(&self) -> &'static str {
        "string"
    }

    fn resolve_options(&self, options: &TypeOptions) -> TypeOptions {
        TypeOptions {
            length: Some(options.length.unwrap_or(DEFAULT_STRING_LENGTH)),
            nullable: options.nullable,
            ..TypeOptions::default()
        }
    }

    fn to_storage(&self, value: &Value, options: &TypeOptions) -> Result<Value> {
        let stored = to_text("string", value)?;
        if let (Value::Text(s), Some(max)) = (&stored, options.length) {
            let len = s.chars().count();
            if len > max as usize {
                return Err(SchemaError::invalid_value(
                    "string",
                    s.as_str(),
                    format!("length {len} exceeds {max}"),
                ));
            }
        }
        Ok(stored)
    }

    fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
        to_text("string", stored)
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Text(_))
    }

    fn declare_generic(&self, options: &TypeOptions) -> String {
        format!(
            "VARCHAR({})",
            options.length.unwrap_or(DEFAULT_STRING_LENGTH)
        )
    }

    fn claims(&self, _family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        native
            .is(&["VARCHAR", "CHARACTER VARYING", "NVARCHAR"])
            .then(|| TypeOptions {
                length: native.arg(0),
                ..TypeOptions::default()
            })
    }
}

/// Unbounded character data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextType;

impl LogicalType for TextType {
    fn name(&self) -> &'static str {
        "text"
    }

    fn to_storage(&self, value: &Value, _options: &TypeOptions) -> Result<Value> {
        to_text("text", value)
    }

    fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
        to_text("text", stored)
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Text(_))
    }

    fn declare_generic(&self, _options: &TypeOptions) -> String {
        "TEXT".to_string()
    }

    fn claims(&self, family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        let owned = match family {
            PlatformFamily::Sqlite => native.is(&["TEXT", "CLOB"]),
            PlatformFamily::MySql => native.is(&["TEXT", "MEDIUMTEXT", "TINYTEXT"]),
            PlatformFamily::Generic => native.is(&["TEXT"]),
        };
        owned.then(TypeOptions::default)
    }
}

// ================================================================
// json
// ================================================================

/// JSON document, stored as canonical text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonType;

impl JsonType {
    fn document(value: &Value) -> Result<Option<serde_json::Value>> {
        match value {
            Value::Null => Ok(None),
            Value::Json(doc) => Ok(Some(doc.clone())),
            Value::Text(s) => serde_json::from_str(s)
                .map(Some)
                .map_err(|e| SchemaError::invalid_value("json", s.as_str(), e.to_string())),
            Value::Bool(b) => Ok(Some(serde_json::Value::Bool(*b))),
            Value::Integer(i) => Ok(Some(serde_json::Value::from(*i))),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(|n| Some(serde_json::Value::Number(n)))
                .ok_or_else(|| {
                    SchemaError::invalid_value("json", x.to_string(), "non-finite number")
                }),
            other => Err(unsupported("json", other)),
        }
    }

    fn canonical(doc: &serde_json::Value) -> Result<String> {
        serde_json::to_string(doc)
            .map_err(|e| SchemaError::invalid_value("json", doc.to_string(), e.to_string()))
    }
}

impl LogicalType for JsonType {
    fn name(&self) -> &'static str {
        "json"
    }

    fn to_storage(&self, value: &Value, _options: &TypeOptions) -> Result<Value> {
        match Self::document(value)? {
            Some(doc) => Ok(Value::Text(Self::canonical(&doc)?)),
            None => Ok(Value::Null),
        }
    }

    fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
        Ok(Self::document(stored)?.map_or(Value::Null, Value::Json))
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Json(_))
    }

    fn declare_generic(&self, _options: &TypeOptions) -> String {
        "JSON".to_string()
    }

    fn claims(&self, family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        // MariaDB reports JSON columns as LONGTEXT.
        let owned = native.is(&["JSON"])
            || (family == PlatformFamily::MySql && native.is(&["LONGTEXT"]));
        owned.then(TypeOptions::default)
    }

    fn normalize_default(&self, raw: &str, _options: &TypeOptions) -> Result<String> {
        let doc: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| SchemaError::invalid_value("json", raw, e.to_string()))?;
        Self::canonical(&doc)
    }
}

// ================================================================
// uuid
// ================================================================

/// UUID, stored as lower-case hyphenated text.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidType;

impl UuidType {
    fn parse(value: &Value) -> Result<Option<Uuid>> {
        match value {
            Value::Null => Ok(None),
            Value::Uuid(u) => Ok(Some(*u)),
            Value::Text(s) => Uuid::parse_str(s.trim())
                .map(Some)
                .map_err(|e| SchemaError::invalid_value("uuid", s.as_str(), e.to_string())),
            other => Err(unsupported("uuid", other)),
        }
    }
}

impl LogicalType for UuidType {
    fn name(&self) -> &'static str {
        "uuid"
    }

    fn to_storage(&self, value: &Value, _options: &TypeOptions) -> Result<Value> {
        Ok(Self::parse(value)?.map_or(Value::Null, |u| {
            Value::Text(u.hyphenated().to_string())
        }))
    }

    fn to_value(&self, stored: &Value, _options: &TypeOptions) -> Result<Value> {
        Ok(Self::parse(stored)?.map_or(Value::Null, Value::Uuid))
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Uuid(_))
    }

    fn declare_generic(&self, _options: &TypeOptions) -> String {
        "UUID".to_string()
    }

    fn declare_sqlite(&self, _options: &TypeOptions) -> Option<String> {
        Some("CHAR(36)".to_string())
    }

    fn declare_mysql(&self, _options: &TypeOptions) -> Option<String> {
        Some("CHAR(36)".to_string())
    }

    fn claims(&self, family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        let owned = match family {
            PlatformFamily::Generic => native.is(&["UUID"]),
            PlatformFamily::Sqlite => native.is(&["CHAR"]) && native.arg(0) == Some(36),
            PlatformFamily::MySql => {
                native.is(&["UUID"]) || (native.is(&["CHAR"]) && native.arg(0) == Some(36))
            }
        };
        owned.then(TypeOptions::default)
    }

    fn normalize_default(&self, raw: &str, _options: &TypeOptions) -> Result<String> {
        Uuid::from_str(raw.trim())
            .map(|u| u.hyphenated().to_string())
            .map_err(|e| SchemaError::invalid_value("uuid", raw, e.to_string()))
    }
}

// ================================================================
// decimal
// ================================================================

/// Exact fixed-point decimal, stored as text.
///
/// Values never pass through binary floating point arithmetic. An `f64`
/// is read through its shortest round-trip text on both the way in and
/// the way out, so a REAL `0.1` reads back as `0.1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalType;

impl DecimalType {
    fn from_float(x: f64) -> Result<Decimal> {
        if !x.is_finite() {
            return Err(SchemaError::invalid_value("decimal", x.to_string(), "non-finite number"));
        }
        parse_decimal(&x.to_string())
    }

    fn at_scale(value: Decimal, options: &TypeOptions) -> Result<Decimal> {
        match options.scale {
            Some(scale) => rescale(value, scale),
            None => Ok(value),
        }
    }
}

impl LogicalType for DecimalType {
    fn name(&self) -> &'static str {
        "decimal"
    }

    fn resolve_options(&self, options: &TypeOptions) -> TypeOptions {
        TypeOptions {
            precision: Some(options.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION)),
            scale: Some(options.scale.unwrap_or(DEFAULT_DECIMAL_SCALE)),
            nullable: options.nullable,
            ..TypeOptions::default()
        }
    }

    fn to_storage(&self, value: &Value, options: &TypeOptions) -> Result<Value> {
        let decimal = match value {
            Value::Null => return Ok(Value::Null),
            Value::Decimal(d) => *d,
            Value::Integer(i) => Decimal::from(*i),
            Value::Text(s) => parse_decimal(s)?,
            Value::Float(x) => Self::from_float(*x)?,
            other => return Err(unsupported("decimal", other)),
        };
        Ok(Value::Text(Self::at_scale(decimal, options)?.to_string()))
    }

    fn to_value(&self, stored: &Value, options: &TypeOptions) -> Result<Value> {
        let decimal = match stored {
            Value::Null => return Ok(Value::Null),
            Value::Decimal(d) => *d,
            Value::Integer(i) => Decimal::from(*i),
            Value::Text(s) => parse_decimal(s)?,
            // Engines with numeric affinity hand back REAL.
            Value::Float(x) => Self::from_float(*x)?,
            other => return Err(unsupported("decimal", other)),
        };
        Ok(Value::Decimal(Self::at_scale(decimal, options)?))
    }

    fn is_compatible(&self, value: &Value) -> bool {
        matches!(value, Value::Decimal(_))
    }

    fn declare_generic(&self, options: &TypeOptions) -> String {
        format!(
            "DECIMAL({}, {})",
            options.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
            options.scale.unwrap_or(DEFAULT_DECIMAL_SCALE)
        )
    }

    fn claims(&self, _family: PlatformFamily, native: &NativeType) -> Option<TypeOptions> {
        native.is(&["DECIMAL", "NUMERIC"]).then(|| TypeOptions {
            precision: native.arg(0),
            scale: native.arg(1).or_else(|| native.arg(0).map(|_| 0)),
            ..TypeOptions::default()
        })
    }

    fn normalize_default(&self, raw: &str, options: &TypeOptions) -> Result<String> {
        super::normalize_decimal(raw, options.scale.unwrap_or(DEFAULT_DECIMAL_SCALE))
    }

    fn numeric_literal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> TypeOptions {
        TypeOptions::default()
    }

    #[test]
    fn null_passes_through_every_type() {
        let types: Vec<Box<dyn LogicalType>> = vec![
            Box::new(IntegerType),
            Box::new(FloatType),
            Box::new(BooleanType),
            Box::new(StringType),
            Box::new(TextType),
            Box::new(JsonType),
            Box::new(UuidType),
            Box::new(DecimalType),
        ];
        for ty in types {
            assert_eq!(ty.to_storage(&Value::Null, &opts()).unwrap(), Value::Null);
            assert_eq!(ty.to_value(&Value::Null, &opts()).unwrap(), Value::Null);
        }
    }

    #[test]
    fn boolean_storage_is_integer() {
        let stored = BooleanType.to_storage(&Value::Bool(true), &opts()).unwrap();
        assert_eq!(stored, Value::Integer(1));
        assert_eq!(
            BooleanType.to_value(&stored, &opts()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(BooleanType.normalize_default("FALSE", &opts()).unwrap(), "0");
    }

    #[test]
    fn string_enforces_length() {
        let options = TypeOptions::with_length(3);
        assert!(StringType.to_storage(&"abc".into(), &options).is_ok());
        assert!(matches!(
            StringType.to_storage(&"abcd".into(), &options),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn json_storage_is_canonical() {
        let stored = JsonType
            .to_storage(&Value::Text("{ \"b\": 1, \"a\": [true] }".into()), &opts())
            .unwrap();
        assert_eq!(stored, Value::Text("{\"a\":[true],\"b\":1}".into()));
        assert!(JsonType.to_storage(&"{oops".into(), &opts()).is_err());
    }

    #[test]
    fn uuid_round_trip() {
        let id = Uuid::new_v4();
        let stored = UuidType.to_storage(&Value::Uuid(id), &opts()).unwrap();
        assert_eq!(stored, Value::Text(id.hyphenated().to_string()));
        assert_eq!(UuidType.to_value(&stored, &opts()).unwrap(), Value::Uuid(id));
    }

    #[test]
    fn decimal_reads_floats_through_their_shortest_text() {
        let options = TypeOptions::with_precision(10, 2);
        let stored = DecimalType.to_storage(&Value::Float(0.1), &options).unwrap();
        assert_eq!(stored, Value::Text("0.10".into()));

        let err = DecimalType
            .to_storage(&Value::Float(f64::NAN), &options)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidValue { .. }));
    }

    #[test]
    fn decimal_storage_uses_scale() {
        let options = TypeOptions::with_precision(10, 2);
        let stored = DecimalType.to_storage(&"3.1".into(), &options).unwrap();
        assert_eq!(stored, Value::Text("3.10".into()));
        let back = DecimalType.to_value(&Value::Float(3.1), &options).unwrap();
        assert_eq!(back, Value::Decimal(Decimal::new(310, 2)));
    }

    #[test]
    fn decimal_defaults_compare_after_normalization() {
        let options = TypeOptions::with_precision(10, 2);
        let a = DecimalType.normalize_default("10.5", &options).unwrap();
        let b = DecimalType.normalize_default("10.50", &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn claims_are_family_aware() {
        let tinyint = NativeType::parse("tinyint(1)");
        assert!(BooleanType.claims(PlatformFamily::MySql, &tinyint).is_some());
        assert!(BooleanType.claims(PlatformFamily::Sqlite, &tinyint).is_none());

        let char36 = NativeType::parse("CHAR(36)");
        assert!(UuidType.claims(PlatformFamily::Sqlite, &char36).is_some());
        assert!(UuidType.claims(PlatformFamily::Generic, &char36).is_none());

        let decimal = NativeType::parse("decimal(12,4)");
        let options = DecimalType.claims(PlatformFamily::MySql, &decimal).unwrap();
        assert_eq!(options.precision, Some(12));
        assert_eq!(options.scale, Some(4));
    }
}
