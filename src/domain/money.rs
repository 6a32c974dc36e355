use thiserror::Error;

/// Tuition amounts are held as integer cents so two-decimal values survive
/// storage and arithmetic unchanged: ¥150.00 = 15000 cents.
pub type Cents = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid money format: {0}")]
    InvalidFormat(String),

    #[error("amount is too large: {0}")]
    Overflow(String),
}

/// Render cents with exactly two decimals: 15000 -> "150.00", -5 -> "-0.05".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Convert cents to a floating value for spreadsheet cells.
pub fn cents_to_units(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

/// Parse a decimal amount into cents.
///
/// Accepts "150", "150.5", "150.00" and ".5". Digits past the second decimal
/// place are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let invalid = || ParseCentsError::InvalidFormat(trimmed.to_string());
    let overflow = || ParseCentsError::Overflow(trimmed.to_string());

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(invalid());
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| overflow())?
    };

    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => fraction_str.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction_str[..2].parse().map_err(|_| invalid())?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(overflow)?;

    Ok(if negative { -cents } else { cents })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(15000), "150.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("150"), Ok(15000));
        assert_eq!(parse_cents("150.00"), Ok(15000));
        assert_eq!(parse_cents("150.5"), Ok(15050));
        assert_eq!(parse_cents(" 0.01 "), Ok(1));
        assert_eq!(parse_cents(".5"), Ok(50));
        assert_eq!(parse_cents("-3.20"), Ok(-320));
        assert_eq!(parse_cents("99.999"), Ok(9999));
    }

    #[test]
    fn test_parse_cents_rejects_garbage() {
        assert_eq!(parse_cents(""), Err(ParseCentsError::Empty));
        assert!(matches!(parse_cents("abc"), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(parse_cents("1.2.3"), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(parse_cents("."), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(parse_cents("1e5"), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(
            parse_cents("99999999999999999999"),
            Err(ParseCentsError::Overflow(_))
        ));
    }

    #[test]
    fn test_cents_to_units() {
        assert_eq!(cents_to_units(15050), 150.5);
        assert_eq!(cents_to_units(0), 0.0);
    }
}
