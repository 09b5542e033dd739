//! Accounting amount parsing.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Parses a report amount.
///
/// Thousands separators are stripped and a value in parentheses is
/// negative. Empty or unparsable input yields zero so one bad cell cannot
/// fail a whole import.
#[must_use]
pub fn parse_amount(raw: &str) -> Decimal {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();

    let (negative, digits) = match cleaned
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner.trim()),
        None => (false, cleaned),
    };

    if digits.is_empty() {
        return Decimal::ZERO;
    }

    match Decimal::from_str(digits) {
        Ok(value) if negative => -value,
        Ok(value) => value,
        Err(_) => Decimal::ZERO,
    }
}
