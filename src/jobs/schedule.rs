use crate::health::duration::{format_duration, parse_duration};
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// When a bound job fires.
///
/// Every schedule fires on multiples of its period counted from the Unix
/// epoch (UTC), so instances sharing a schedule share its tick instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Minutely,
    Hourly,
    Daily,
    Every(Duration),
}

impl Schedule {
    /// First tick instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.period();
        now.duration_trunc(step)
            .ok()
            .and_then(|start| start.checked_add_signed(step))
            .or_else(|| now.checked_add_signed(step))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn period(&self) -> ChronoDuration {
        match self {
            Self::Minutely => ChronoDuration::minutes(1),
            Self::Hourly => ChronoDuration::hours(1),
            Self::Daily => ChronoDuration::days(1),
            Self::Every(interval) => {
                ChronoDuration::from_std(*interval).unwrap_or(ChronoDuration::MAX)
            }
        }
    }

    pub fn every(interval: Duration) -> Self {
        Self::Every(interval)
    }
}

impl FromStr for Schedule {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        match spec {
            "@minutely" => Ok(Self::Minutely),
            "@hourly" => Ok(Self::Hourly),
            "@daily" | "@midnight" => Ok(Self::Daily),
            _ => {
                let interval = spec
                    .strip_prefix("@every")
                    .ok_or_else(|| format!("unsupported schedule '{}'", spec))?;
                let interval = parse_duration(interval.trim())
                    .map_err(|err| format!("invalid schedule '{}': {}", spec, err))?;
                if interval.is_zero() {
                    return Err(format!("invalid schedule '{}': interval must be positive", spec));
                }
                Ok(Self::Every(interval))
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutely => f.write_str("@minutely"),
            Self::Hourly => f.write_str("@hourly"),
            Self::Daily => f.write_str("@daily"),
            Self::Every(interval) => write!(f, "@every {}", format_duration(*interval)),
        }
    }
}
