//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use validator::ValidationError;

/// Upper bound on units in a single reservation line or restock.
pub const MAX_UNITS_PER_OPERATION: i32 = 100_000;

lazy_static! {
    static ref TICKET_NUMBER_RE: Regex = Regex::new(r"^TKT-\d{6}-\d{4}$").unwrap();
}

/// Validates that a unit count is positive and within bounds.
pub fn validate_units(units: i32) -> Result<(), ValidationError> {
    if (1..=MAX_UNITS_PER_OPERATION).contains(&units) {
        Ok(())
    } else {
        let mut err = ValidationError::new("units_range");
        err.message = Some(
            format!("Quantity must be between 1 and {}", MAX_UNITS_PER_OPERATION).into(),
        );
        Err(err)
    }
}

/// Validates that a price is non-negative.
pub fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        let mut err = ValidationError::new("price_negative");
        err.message = Some("Price must be non-negative".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates that a string has visible content.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Returns true if the string looks like a ticket number (`TKT-123456-1234`).
pub fn is_ticket_number(value: &str) -> bool {
    TICKET_NUMBER_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_units() {
        assert!(validate_units(1).is_ok());
        assert!(validate_units(MAX_UNITS_PER_OPERATION).is_ok());
        assert!(validate_units(0).is_err());
        assert!(validate_units(-3).is_err());
        assert!(validate_units(MAX_UNITS_PER_OPERATION + 1).is_err());
    }

    #[test]
    fn test_validate_units_error_message() {
        let err = validate_units(0).unwrap_err();
        assert!(err.message.unwrap().to_string().contains("between 1 and"));
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(&Decimal::ZERO).is_ok());
        assert!(validate_unit_price(&Decimal::new(1999, 2)).is_ok());
        assert!(validate_unit_price(&Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Stage").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   ").is_err());
    }

    #[test]
    fn test_is_ticket_number() {
        assert!(is_ticket_number("TKT-123456-0042"));
        assert!(!is_ticket_number("TKT-12345-0042"));
        assert!(!is_ticket_number("tkt-123456-0042"));
        assert!(!is_ticket_number("TKT-123456-0042x"));
    }
}
