//! Integer arithmetic on native amounts (decimal strings in the smallest
//! unit of a currency).

use std::cmp::Ordering;

use crate::error::CollaboratorError;

use super::context::CollabResult;

pub fn parse(amount: &str) -> CollabResult<u128> {
    amount
        .trim()
        .parse::<u128>()
        .map_err(|_| CollaboratorError::Invalid(format!("invalid native amount '{amount}'")))
}

pub fn add(a: &str, b: &str) -> CollabResult<String> {
    parse(a)?
        .checked_add(parse(b)?)
        .map(|sum| sum.to_string())
        .ok_or_else(|| CollaboratorError::Invalid(format!("native amount overflow: {a} + {b}")))
}

/// `amount * percent / 100`, rounded down.
pub fn percent_of(amount: &str, percent: u128) -> CollabResult<String> {
    parse(amount)?
        .checked_mul(percent)
        .map(|scaled| (scaled / 100).to_string())
        .ok_or_else(|| CollaboratorError::Invalid(format!("native amount overflow: {amount}")))
}

pub fn compare(a: &str, b: &str) -> CollabResult<Ordering> {
    Ok(parse(a)?.cmp(&parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_on_large_amounts() {
        assert_eq!(
            add("1000000000000000000", "2500000000000000000").unwrap(),
            "3500000000000000000"
        );
        assert_eq!(percent_of("1000", 90).unwrap(), "900");
        assert_eq!(percent_of("15", 90).unwrap(), "13");
        assert_eq!(compare("10", "9").unwrap(), Ordering::Greater);
    }

    #[test]
    fn rejects_non_integer_amounts() {
        assert!(parse("1.5").is_err());
        assert!(parse("-3").is_err());
        assert!(add("1", "x").unwrap_err().is_validation());
    }
}
