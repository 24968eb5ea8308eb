//! Signed time values used for clip boundaries.

use crate::error::{ModelError, ModelResult};
use chrono::TimeDelta;
use std::fmt;
use std::str::FromStr;

const MICROS_PER_SECOND: u128 = 1_000_000;
const MICROS_PER_MILLI: u128 = 1_000;

/// A signed offset in media time with microsecond resolution.
///
/// Written as compact seconds (`0s`, `10s`, `1.5s`, `-0.25s`). Parsing also
/// accepts clock values (`hh:mm:ss.fff`, `mm:ss`), milliseconds (`250ms`)
/// and bare seconds (`2.5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time(TimeDelta);

impl Time {
    pub fn zero() -> Self {
        Self(TimeDelta::zero())
    }

    pub fn from_micros(micros: i64) -> Self {
        Self(TimeDelta::microseconds(micros))
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(TimeDelta::milliseconds(millis))
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(TimeDelta::seconds(secs))
    }

    pub fn as_micros(&self) -> i64 {
        // Constructed from i64 microseconds, so this never overflows.
        self.0.num_microseconds().unwrap_or(i64::MAX)
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < TimeDelta::zero()
    }

    /// Parse a time string, treating an empty string as zero.
    pub fn parse_or_zero(value: &str) -> ModelResult<Self> {
        if value.trim().is_empty() {
            Ok(Self::zero())
        } else {
            value.parse()
        }
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<TimeDelta> for Time {
    fn from(delta: TimeDelta) -> Self {
        Self(delta)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = self.as_micros();
        let sign = if micros < 0 { "-" } else { "" };
        let abs = micros.unsigned_abs();
        let secs = abs / 1_000_000;
        let frac = abs % 1_000_000;
        if frac == 0 {
            write!(f, "{}{}s", sign, secs)
        } else {
            let digits = format!("{:06}", frac);
            write!(f, "{}{}.{}s", sign, secs, digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Time {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidTime(s.to_string());
        let trimmed = s.trim();
        let (negative, body) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if body.is_empty() {
            return Err(invalid());
        }

        let magnitude = if let Some(ms) = body.strip_suffix("ms") {
            parse_decimal(ms, MICROS_PER_MILLI).ok_or_else(invalid)?
        } else if let Some(secs) = body.strip_suffix('s') {
            parse_decimal(secs, MICROS_PER_SECOND).ok_or_else(invalid)?
        } else if body.contains(':') {
            parse_clock(body).ok_or_else(invalid)?
        } else {
            parse_decimal(body, MICROS_PER_SECOND).ok_or_else(invalid)?
        };

        let micros = i64::try_from(magnitude).map_err(|_| invalid())?;
        Ok(Self::from_micros(if negative { -micros } else { micros }))
    }
}

/// Parse `int[.frac]` scaled by `unit` microseconds.
fn parse_decimal(value: &str, unit: u128) -> Option<u128> {
    let (whole, frac) = match value.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole_value: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut total = whole_value.checked_mul(unit)?;

    // Sub-microsecond digits are dropped.
    let mut scale = unit;
    for digit in frac.bytes() {
        scale /= 10;
        if scale == 0 {
            break;
        }
        total = total.checked_add(u128::from(digit - b'0') * scale)?;
    }
    Some(total)
}

/// Parse `hh:mm:ss[.fff]` or `mm:ss[.fff]`.
fn parse_clock(value: &str) -> Option<u128> {
    let parts: Vec<&str> = value.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return None,
    };
    if hours.is_empty() || minutes.is_empty() || seconds.is_empty() {
        return None;
    }
    if !hours.bytes().all(|b| b.is_ascii_digit()) || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: u128 = hours.parse().ok()?;
    let minutes: u128 = minutes.parse().ok()?;
    let seconds = parse_decimal(seconds, MICROS_PER_SECOND)?;

    hours
        .checked_mul(3600 * MICROS_PER_SECOND)?
        .checked_add(minutes.checked_mul(60 * MICROS_PER_SECOND)?)?
        .checked_add(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_compact_seconds() {
        assert_eq!(Time::zero().to_string(), "0s");
        assert_eq!(Time::from_secs(10).to_string(), "10s");
        assert_eq!(Time::from_millis(1500).to_string(), "1.5s");
        assert_eq!(Time::from_millis(-250).to_string(), "-0.25s");
        assert_eq!(Time::from_micros(1).to_string(), "0.000001s");
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("0s".parse::<Time>().unwrap(), Time::zero());
        assert_eq!("10s".parse::<Time>().unwrap(), Time::from_secs(10));
        assert_eq!("1.5s".parse::<Time>().unwrap(), Time::from_millis(1500));
        assert_eq!("-0.25s".parse::<Time>().unwrap(), Time::from_millis(-250));
        assert_eq!("250ms".parse::<Time>().unwrap(), Time::from_millis(250));
        assert_eq!("2.5".parse::<Time>().unwrap(), Time::from_millis(2500));
        assert_eq!(
            "01:02:03.5".parse::<Time>().unwrap(),
            Time::from_millis(3_723_500)
        );
        assert_eq!("02:03".parse::<Time>().unwrap(), Time::from_secs(123));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("abc".parse::<Time>().is_err());
        assert!("1.2.3s".parse::<Time>().is_err());
        assert!("-".parse::<Time>().is_err());
        assert!("1:2:3:4".parse::<Time>().is_err());
        assert!("".parse::<Time>().is_err());
    }

    #[test]
    fn test_parse_or_zero() {
        assert_eq!(Time::parse_or_zero("").unwrap(), Time::zero());
        assert_eq!(Time::parse_or_zero("  ").unwrap(), Time::zero());
        assert_eq!(Time::parse_or_zero("3s").unwrap(), Time::from_secs(3));
    }

    #[test]
    fn test_display_parse_agree() {
        for micros in [0, 1, 999_999, 1_000_000, -1_500_000, 123_456_789] {
            let time = Time::from_micros(micros);
            assert_eq!(time.to_string().parse::<Time>().unwrap(), time);
        }
    }
}
