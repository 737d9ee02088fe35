//! Timer error types

use thiserror::Error;

/// Errors raised while configuring scheduling units
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimerError {
    /// Duration input was negative, NaN or infinite
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// An option was present but held the wrong kind of value
    #[error("Invalid option '{name}': expected {expected}")]
    InvalidOption {
        name: String,
        expected: &'static str,
    },

    /// A cycle unit has nothing to step through
    #[error("Cycle has no values to step through")]
    EmptyCycle,
}

/// Result type for timer operations
pub type Result<T> = std::result::Result<T, TimerError>;

/// Coerce a millisecond duration to the integer form every unit stores.
///
/// Fractional input is truncated. Non-finite or negative input is rejected
/// instead of producing a timer that never fires.
pub fn coerce_duration(ms: f64) -> Result<u32> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(TimerError::InvalidDuration(ms.to_string()));
    }
    Ok(ms.trunc().min(u32::MAX as f64) as u32)
}

/// Parse a textual duration (e.g. from a config file) into milliseconds
pub fn parse_duration(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix("ms").unwrap_or(trimmed).trim();
    number
        .parse::<f64>()
        .map_err(|_| TimerError::InvalidDuration(text.to_string()))
        .and_then(coerce_duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_truncated() {
        assert_eq!(coerce_duration(999.9), Ok(999));
        assert_eq!(coerce_duration(0.0), Ok(0));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(matches!(
            coerce_duration(f64::NAN),
            Err(TimerError::InvalidDuration(_))
        ));
        assert!(coerce_duration(f64::INFINITY).is_err());
        assert!(coerce_duration(-1.0).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250"), Ok(250));
        assert_eq!(parse_duration(" 1500ms "), Ok(1500));
        assert_eq!(parse_duration("12.7"), Ok(12));
        assert!(parse_duration("soon").is_err());
    }
}
