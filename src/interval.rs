//! Interval arithmetic (§4.11 / C11): compact interval strings and the
//! derivation of a config's next run time.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// A parsed interval: either "no interval" (the `"0"` external-alert
/// sentinel) or a positive duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    None,
    Duration(Duration),
}

impl Interval {
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Duration(d) => Some(d),
        }
    }
}

/// Parses `<positive-int><unit>` with unit in `{m, h, d}` (minutes, hours,
/// 24-hour days), or the literal `"0"` for "no interval".
///
/// # Errors
///
/// Returns `Err` if the string is not `"0"` and does not match the grammar,
/// or the leading integer is not strictly positive.
pub fn parse(raw: &str) -> Result<Interval, crate::error::Error> {
    let raw = raw.trim();
    if raw == "0" {
        return Ok(Interval::None);
    }

    if raw.is_empty() {
        return Err(crate::error::Error::msg("empty interval string"));
    }

    let (digits, unit) = raw.split_at(raw.len() - 1);
    let count: u64 = digits
        .parse()
        .map_err(|_| crate::error::Error::msg(format!("malformed interval '{raw}'")))?;

    if count == 0 {
        return Err(crate::error::Error::msg(format!(
            "interval '{raw}' must be positive (use \"0\" for no interval)"
        )));
    }

    let seconds = match unit {
        "m" => count * 60,
        "h" => count * 3600,
        "d" => count * 86400,
        other => {
            return Err(crate::error::Error::msg(format!(
                "unknown interval unit '{other}' in '{raw}'"
            )))
        }
    };

    Ok(Interval::Duration(Duration::from_secs(seconds)))
}

/// Derives the `next_run_at` the server stamps on a config after ingesting
/// a result, per §4.7:
///
/// 1. `next_run` on the payload, if present, wins outright.
/// 2. Otherwise, `executed_at + interval` when the config's interval is
///    positive.
/// 3. Otherwise `None`.
#[must_use]
pub fn derive_next_run(
    payload_next_run: Option<DateTime<Utc>>,
    executed_at: DateTime<Utc>,
    interval: Interval,
) -> Option<DateTime<Utc>> {
    if let Some(explicit) = payload_next_run {
        return Some(explicit);
    }
    match interval {
        Interval::None => None,
        Interval::Duration(d) => {
            let delta = ChronoDuration::from_std(d).ok()?;
            Some(executed_at + delta)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_hours_days() {
        assert_eq!(parse("5m").unwrap(), Interval::Duration(Duration::from_secs(300)));
        assert_eq!(parse("2h").unwrap(), Interval::Duration(Duration::from_secs(7200)));
        assert_eq!(parse("1d").unwrap(), Interval::Duration(Duration::from_secs(86400)));
    }

    #[test]
    fn zero_is_no_interval_sentinel() {
        assert_eq!(parse("0").unwrap(), Interval::None);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(parse("").is_err());
        assert!(parse("5").is_err());
        assert!(parse("m").is_err());
        assert!(parse("5x").is_err());
        assert!(parse("0m").is_err());
        assert!(parse("-5m").is_err());
    }

    #[test]
    fn next_run_precedence_matches_testable_property_8() {
        let executed = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let interval = parse("1m").unwrap();

        // absent next_run -> executed_at + interval
        let derived = derive_next_run(None, executed, interval).unwrap();
        assert_eq!(derived, "2024-01-01T00:01:00Z".parse::<DateTime<Utc>>().unwrap());

        // explicit next_run wins regardless of interval
        let explicit = "2024-01-01T06:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let derived = derive_next_run(Some(explicit), executed, interval).unwrap();
        assert_eq!(derived, explicit);
    }

    #[test]
    fn no_interval_and_no_payload_next_run_yields_none() {
        let executed = Utc::now();
        assert_eq!(derive_next_run(None, executed, Interval::None), None);
    }
}
