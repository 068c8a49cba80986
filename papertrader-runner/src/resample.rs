//! Equity curve resampling.

use chrono::{DateTime, NaiveTime, Utc};
use papertrader_core::domain::EquityPoint;

/// Keep the last point of each UTC calendar day, stamped at that day's
/// 00:00 UTC.
///
/// The day key makes curves whose sessions close at different times line
/// up when blended. Input must be in increasing time order; output is too.
pub fn resample_daily(curve: &[EquityPoint]) -> Vec<EquityPoint> {
    let mut out: Vec<EquityPoint> = Vec::new();
    for point in curve {
        let day = day_key(point.timestamp);
        match out.last_mut() {
            Some(last) if last.timestamp == day => last.equity = point.equity,
            _ => out.push(EquityPoint::new(day, point.equity)),
        }
    }
    out
}

fn day_key(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn keeps_last_point_per_day() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        let curve: Vec<EquityPoint> = (0..60)
            .map(|i| EquityPoint::new(start + Duration::hours(i), 100.0 + i as f64))
            .collect();
        let daily = resample_daily(&curve);

        // 14:30 on day 0 through 01:30 on day 3.
        assert_eq!(daily.len(), 4);
        assert_eq!(daily[0].equity, 109.0);
        assert_eq!(daily[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(daily[3].equity, 159.0);
        assert!(daily.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn different_closing_times_share_a_day_key() {
        let day = |d: u32, h: u32, m: u32| Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap();
        let a = resample_daily(&[
            EquityPoint::new(day(4, 19, 30), 1.0),
            EquityPoint::new(day(4, 20, 30), 2.0),
            EquityPoint::new(day(5, 20, 30), 3.0),
        ]);
        let b = resample_daily(&[
            EquityPoint::new(day(4, 20, 45), 5.0),
            EquityPoint::new(day(5, 20, 45), 6.0),
        ]);
        let keys = |c: &[EquityPoint]| c.iter().map(|p| p.timestamp).collect::<Vec<_>>();
        assert_eq!(keys(&a[..]), keys(&b[..]));
        assert_eq!(a[0].equity, 2.0);
    }

    #[test]
    fn midnight_daily_curve_is_unchanged() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let curve: Vec<EquityPoint> = (0..5)
            .map(|i| EquityPoint::new(start + Duration::days(i), 1.0))
            .collect();
        assert_eq!(resample_daily(&curve), curve);
        assert!(resample_daily(&[]).is_empty());
    }
}
