//! Exact decimal normalization.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Result, SchemaError};

/// Largest scale `rust_decimal` can represent.
const MAX_SCALE: u32 = 28;

/// Parses a decimal literal without going through binary floating point.
pub(crate) fn parse_decimal(input: &str) -> Result<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SchemaError::invalid_value("decimal", input, "empty input"));
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| SchemaError::invalid_value("decimal", input, e.to_string()))
}

/// Re-renders `value` at exactly `scale` fractional digits.
pub(crate) fn rescale(mut value: Decimal, scale: u32) -> Result<Decimal> {
    if scale > MAX_SCALE {
        return Err(SchemaError::invalid_value(
            "decimal",
            value.to_string(),
            format!("scale {scale} exceeds the maximum of {MAX_SCALE}"),
        ));
    }
    value = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(scale);
    Ok(value)
}

/// Normalizes a numeric string to a fixed scale.
///
/// Leading and trailing whitespace is ignored, the input must be a
/// decimal number, and the result always carries exactly `scale`
/// fractional digits (rounding half away from zero).
///
/// ```
/// use oxide_schema::types::normalize_decimal;
///
/// assert_eq!(normalize_decimal("10", 2).unwrap(), "10.00");
/// assert_eq!(normalize_decimal("10.5", 2).unwrap(), "10.50");
/// assert_eq!(normalize_decimal(" 10.50 ", 2).unwrap(), "10.50");
/// assert!(normalize_decimal("abc", 2).is_err());
/// ```
///
/// # Errors
///
/// Returns [`SchemaError::InvalidValue`] if the input is not numeric or
/// the scale is out of range.
pub fn normalize_decimal(input: &str, scale: u32) -> Result<String> {
    let value = parse_decimal(input)?;
    Ok(rescale(value, scale)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_scale() {
        assert_eq!(normalize_decimal("10", 2).unwrap(), "10.00");
        assert_eq!(normalize_decimal("10.5", 2).unwrap(), "10.50");
        assert_eq!(normalize_decimal(" 10.50 ", 2).unwrap(), "10.50");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(normalize_decimal("1.005", 2).unwrap(), "1.01");
        assert_eq!(normalize_decimal("-1.005", 2).unwrap(), "-1.01");
        assert_eq!(normalize_decimal("2.5", 0).unwrap(), "3");
    }

    #[test]
    fn keeps_large_values_exact() {
        assert_eq!(
            normalize_decimal("12345678901234567.89", 2).unwrap(),
            "12345678901234567.89"
        );
    }

    #[test]
    fn accepts_scientific_notation() {
        assert_eq!(normalize_decimal("1.5e2", 1).unwrap(), "150.0");
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(matches!(
            normalize_decimal("abc", 2),
            Err(SchemaError::InvalidValue { .. })
        ));
        assert!(matches!(
            normalize_decimal("   ", 2),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_oversized_scale() {
        assert!(normalize_decimal("1", 40).is_err());
    }
}
