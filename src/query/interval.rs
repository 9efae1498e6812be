/// Error for a shorthand duration token such as `10m`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    Empty,
    InvalidNumber(String),
    UnknownUnit(char),
}

impl std::fmt::Display for IntervalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalError::Empty => write!(f, "empty interval"),
            IntervalError::InvalidNumber(n) => write!(f, "invalid interval amount '{}'", n),
            IntervalError::UnknownUnit(u) => write!(f, "unknown interval unit '{}'", u),
        }
    }
}

impl std::error::Error for IntervalError {}

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Parse `<amount><unit>` into milliseconds, unit one of `m`, `h`, `d`
pub fn parse_interval(token: &str) -> Result<u64, IntervalError> {
    let token = token.trim();
    let unit = token.chars().last().ok_or(IntervalError::Empty)?;

    let unit_ms = match unit {
        'm' => MINUTE_MS,
        'h' => HOUR_MS,
        'd' => DAY_MS,
        other => return Err(IntervalError::UnknownUnit(other)),
    };

    let amount = &token[..token.len() - unit.len_utf8()];
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IntervalError::InvalidNumber(amount.to_string()));
    }

    amount
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit_ms))
        .ok_or_else(|| IntervalError::InvalidNumber(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(parse_interval("10m"), Ok(600_000));
        assert_eq!(parse_interval("1h"), Ok(3_600_000));
        assert_eq!(parse_interval("6h"), Ok(21_600_000));
        assert_eq!(parse_interval("1d"), Ok(86_400_000));
    }

    #[test]
    fn test_rejects_bad_tokens() {
        assert_eq!(parse_interval("5x"), Err(IntervalError::UnknownUnit('x')));
        assert_eq!(parse_interval(""), Err(IntervalError::Empty));
        assert!(matches!(parse_interval("m"), Err(IntervalError::InvalidNumber(_))));
        assert!(matches!(parse_interval("-5m"), Err(IntervalError::InvalidNumber(_))));
        assert!(matches!(parse_interval("1.5h"), Err(IntervalError::InvalidNumber(_))));
        assert!(matches!(
            parse_interval("99999999999999999999d"),
            Err(IntervalError::InvalidNumber(_))
        ));
    }
}
