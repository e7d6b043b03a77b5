//! Job timeouts.
//!
//! Timeouts are written either as a number of seconds (`7200`) or as a
//! human-readable duration (`"2h"`, `"1h30m"`, `"90s"`). Units are
//! `s`, `m`, `h` and `d`; a trailing number without a unit counts as seconds.

use std::time::Duration;

use crate::{Error, Result};

/// Build a timeout from a raw number of seconds.
pub fn from_secs(secs: i64) -> Result<Duration> {
    if secs <= 0 {
        return Err(Error::field(
            "timeout",
            format!("must be a positive number of seconds, got {}", secs),
        ));
    }
    Ok(Duration::from_secs(secs as u64))
}

/// Parse a timeout string.
pub fn parse_timeout(input: &str) -> Result<Duration> {
    let input = input.trim();

    if input.is_empty() {
        return Err(Error::field("timeout", "cannot be empty"));
    }

    if let Ok(secs) = input.parse::<i64>() {
        return from_secs(secs);
    }

    let mut total_seconds: u64 = 0;
    let mut current_num = String::new();

    for c in input.chars() {
        let unit_secs = match c {
            '0'..='9' => {
                current_num.push(c);
                continue;
            }
            ' ' => continue,
            's' | 'S' => 1,
            'm' | 'M' => 60,
            'h' | 'H' => 60 * 60,
            'd' | 'D' => 24 * 60 * 60,
            _ => {
                return Err(Error::field(
                    "timeout",
                    format!("invalid character '{}' in duration '{}'", c, input),
                ));
            }
        };

        if current_num.is_empty() {
            return Err(Error::field(
                "timeout",
                format!("missing number before '{}' in duration '{}'", c, input),
            ));
        }
        let value: u64 = current_num
            .parse()
            .map_err(|_| Error::field("timeout", format!("number too large in '{}'", input)))?;
        total_seconds = value
            .checked_mul(unit_secs)
            .and_then(|secs| total_seconds.checked_add(secs))
            .ok_or_else(|| Error::field("timeout", format!("duration '{}' overflows", input)))?;
        current_num.clear();
    }

    if !current_num.is_empty() {
        let value: u64 = current_num
            .parse()
            .map_err(|_| Error::field("timeout", format!("number too large in '{}'", input)))?;
        total_seconds = total_seconds
            .checked_add(value)
            .ok_or_else(|| Error::field("timeout", format!("duration '{}' overflows", input)))?;
    }

    if total_seconds == 0 {
        return Err(Error::field(
            "timeout",
            format!("duration '{}' evaluates to zero", input),
        ));
    }

    Ok(Duration::from_secs(total_seconds))
}

/// Serialize a [`Duration`] as whole seconds.
pub mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        super::from_secs(secs).map_err(serde::de::Error::custom)
    }
}

/// Serialize an optional [`Duration`] as whole seconds.
pub mod secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<i64>::deserialize(deserializer)?
            .map(|secs| super::from_secs(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_seconds() {
        assert_eq!(parse_timeout("7200").unwrap(), Duration::from_secs(7200));
        assert_eq!(from_secs(1).unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn test_human_durations() {
        assert_eq!(parse_timeout("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_timeout("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_timeout("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_timeout("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_timeout("1m 30").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(
            from_secs(-1),
            Err(Error::InvalidField { ref field, .. }) if field == "timeout"
        ));
        assert!(from_secs(0).is_err());
        assert!(parse_timeout("-1").is_err());
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("0h0m").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timeout("").is_err());
        assert!(parse_timeout("soon").is_err());
        assert!(parse_timeout("h").is_err());
        assert!(parse_timeout("10w").is_err());
    }
}
