use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Amounts are exact decimals. Nothing is rounded internally; rounding to two
/// fractional digits only happens when formatting for display.
pub type Amount = Decimal;

/// Format an amount for display with exactly two fractional digits.
/// Example: 50 -> "50.00", -12.345 -> "-12.35"
pub fn format_amount(amount: Amount) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.to_string()
}

/// Parse a user-supplied amount into a non-negative magnitude.
/// Example: "50.00" -> 50.00, "12.5" -> 12.5, ".5" -> 0.5
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    // Decimal rejects a bare leading dot, users type it anyway
    let normalized = if input.starts_with('.') {
        format!("0{}", input)
    } else {
        input.to_string()
    };

    let amount = Decimal::from_str(&normalized)
        .map_err(|_| ParseAmountError::InvalidFormat(input.to_string()))?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ParseAmountError::Negative(input.to_string()));
    }

    Ok(amount.abs())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat(String),
    Negative(String),
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "amount is missing"),
            ParseAmountError::InvalidFormat(s) => write!(f, "'{}' is not a number", s),
            ParseAmountError::Negative(s) => {
                write!(f, "'{}' is negative, amounts are magnitudes", s)
            }
        }
    }
}

impl std::error::Error for ParseAmountError {}
