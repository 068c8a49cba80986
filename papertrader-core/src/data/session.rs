//! Trading-session filter for intraday bars.

use crate::domain::{Bar, BarSeries, InputError};
use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Local trading hours, inclusive at both ends.
///
/// Bar timestamps are UTC and are converted into `timezone` (an IANA name
/// such as `America/New_York`) before comparing, so daylight saving moves
/// the UTC window with the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default = "utc")]
    pub timezone: Tz,
}

fn utc() -> Tz {
    Tz::UTC
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            timezone: Tz::UTC,
        }
    }
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, timezone: Tz) -> Result<Self, InputError> {
        if start > end {
            return Err(InputError::InvalidParameter {
                name: "session",
                reason: format!("start {start} is after end {end}"),
            });
        }
        Ok(Self { start, end, timezone })
    }

    /// Parse `HH:MM` bounds and an IANA zone name.
    pub fn parse(start: &str, end: &str, timezone: &str) -> Result<Self, InputError> {
        let parse = |raw: &str| {
            NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| InputError::InvalidParameter {
                name: "session",
                reason: format!("'{raw}' is not HH:MM: {e}"),
            })
        };
        let tz: Tz = timezone.trim().parse().map_err(|e| InputError::InvalidParameter {
            name: "session",
            reason: format!("unknown time zone '{timezone}': {e}"),
        })?;
        Self::new(parse(start)?, parse(end)?, tz)
    }

    pub fn contains(&self, bar: &Bar) -> bool {
        let local = bar.timestamp.with_timezone(&self.timezone).time();
        let time = local.with_nanosecond(0).unwrap_or(local);
        time >= self.start && time <= self.end
    }

    /// Keep only bars inside the session.
    pub fn apply(&self, series: BarSeries) -> Result<BarSeries, InputError> {
        series.retain(|bar| self.contains(bar))
    }
}
