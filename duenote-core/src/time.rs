//! Time utilities: local calendar days and wall-clock times in a settings timezone.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Local calendar date of an instant.
pub fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Whole calendar days from `now`'s local date to `due`'s local date.
///
/// Due later today is 0, tomorrow is 1, regardless of the hour.
pub fn days_until(due: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> i64 {
    (local_date(due, tz) - local_date(now, tz)).num_days()
}

/// The instant a local wall-clock time occurs on `date`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap are pushed forward by an hour.
pub fn at_local_time(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let ndt = date.and_time(time);
    tz.from_local_datetime(&ndt)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(ndt + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&ndt))
}

/// Next occurrence of `time` strictly after `now`: today if not yet passed, else tomorrow.
pub fn next_occurrence(time: NaiveTime, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = local_date(now, tz);
    let candidate = at_local_time(today, time, tz);
    if is_future(candidate, now) {
        return candidate;
    }
    let tomorrow = today.succ_opt().unwrap_or(today);
    at_local_time(tomorrow, time, tz)
}

/// Strictly-later comparison at whole-millisecond precision.
pub fn is_future(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    at.timestamp_millis() > now.timestamp_millis()
}

pub fn same_instant(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp_millis() == b.timestamp_millis()
}

/// Parse a local time like "2026-02-20 23:59" in `tz`, returning UTC.
pub fn parse_local_datetime_to_utc(local: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Helper: format a UTC time in the local zone for humans.
pub fn format_local(dt: DateTime<Utc>, tz: Tz, fmt: &str) -> String {
    dt.with_timezone(&tz).format(fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse_chicago_datetime() {
        // Feb is CST (UTC-6)
        let tz: Tz = "America/Chicago".parse().unwrap();
        let got = parse_local_datetime_to_utc("2026-02-20 23:59", tz).unwrap();
        assert_eq!(got.to_rfc3339(), "2026-02-21T05:59:00+00:00");
    }

    #[test]
    fn days_until_uses_local_midnight() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        // 23:00 local on Feb 20 and 01:00 local on Feb 21 are one calendar day apart.
        let now = utc(2026, 2, 21, 5, 0);
        let due = utc(2026, 2, 21, 7, 0);
        assert_eq!(days_until(due, now, tz), 1);
        assert_eq!(days_until(due, now, Tz::UTC), 0);
    }

    #[test]
    fn next_occurrence_rolls_to_tomorrow_once_passed() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let before = utc(2026, 3, 2, 7, 59);
        assert_eq!(next_occurrence(eight, before, Tz::UTC), utc(2026, 3, 2, 8, 0));

        let exactly = utc(2026, 3, 2, 8, 0);
        assert_eq!(next_occurrence(eight, exactly, Tz::UTC), utc(2026, 3, 3, 8, 0));
    }

    #[test]
    fn local_time_inside_dst_gap_moves_forward() {
        // 2026-03-08 02:30 does not exist in America/Chicago.
        let tz: Tz = "America/Chicago".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let t = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let got = at_local_time(date, t, tz);
        assert_eq!(format_local(got, tz, "%H:%M"), "03:30");
    }

    #[test]
    fn millisecond_precision_comparisons() {
        let a = utc(2026, 3, 2, 8, 0);
        let b = a + Duration::microseconds(400);
        assert!(same_instant(a, b));
        assert!(!is_future(b, a));
        assert!(is_future(a + Duration::milliseconds(1), a));
    }
}
