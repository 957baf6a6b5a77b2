//! Date reconstruction. FIS-B rarely transmits a full timestamp; most
//! fields arrive as hour+minute, day+hour+minute, or month+day+hour+minute,
//! and must be resolved against the packet's reception instant. Centralized
//! here so every product family shares the same ±10 day / nearest-candidate
//! rules (see the module doc in `normalize`).

use crate::error::NormalizeError;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

/// Resolve an hour+minute pair to a full UTC instant by choosing whichever
/// of {same day, +1 day, -1 day} is closest to `reference`. Ties are broken
/// towards the past (FIS-B messages describe events close to, but usually
/// not after, the moment they were received).
pub fn resolve_hour_minute(reference: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let same_day = reference
        .date_naive()
        .and_hms_opt(hour % 24, minute, 0)
        .expect("hour/minute in range");
    let same_day = Utc.from_utc_datetime(&same_day) + Duration::days((hour / 24) as i64);

    let candidates = [same_day - Duration::days(1), same_day, same_day + Duration::days(1)];
    pick_closest(reference, &candidates)
}

/// Resolve day+hour+minute by searching ±10 days around the reference day
/// for a matching day-of-month. `hour == 24` rolls to the next day's
/// midnight, per spec.
pub fn resolve_day_hour_minute(
    reference: DateTime<Utc>,
    day: u32,
    hour: u32,
    minute: u32,
) -> Result<DateTime<Utc>, NormalizeError> {
    let (hour, extra_day) = if hour == 24 { (0, 1) } else { (hour, 0) };

    for offset in -10..=10 {
        let probe = reference + Duration::days(offset);
        if probe.day() == day {
            let candidate = Utc
                .with_ymd_and_hms(probe.year(), probe.month(), probe.day(), hour, minute, 0)
                .single()
                .expect("valid probe date")
                + Duration::days(extra_day);
            return Ok(candidate);
        }
    }

    Err(NormalizeError::DateCandidateOutOfRange {
        reference: reference.to_rfc3339(),
        max_days: 10,
    })
}

/// Resolve month+day+hour+minute by picking the year in
/// {reference_year-1, reference_year, reference_year+1} that minimizes the
/// distance to `reference`.
pub fn resolve_month_day_hour_minute(
    reference: DateTime<Utc>,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
) -> Result<DateTime<Utc>, NormalizeError> {
    let (hour, extra_day) = if hour == 24 { (0, 1) } else { (hour, 0) };
    let ref_year = reference.year();

    let mut best: Option<DateTime<Utc>> = None;
    for year in [ref_year - 1, ref_year, ref_year + 1] {
        if let Some(naive) = Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).single() {
            let candidate = naive + Duration::days(extra_day);
            best = Some(match best {
                None => candidate,
                Some(prev) => {
                    if (candidate - reference).num_seconds().abs() < (prev - reference).num_seconds().abs() {
                        candidate
                    } else {
                        prev
                    }
                }
            });
        }
    }

    best.ok_or(NormalizeError::DateCandidateOutOfRange {
        reference: reference.to_rfc3339(),
        max_days: 366,
    })
}

/// Interpret a two-digit year as the nearest year within -50..+49 of the
/// reference year.
pub fn resolve_two_digit_year(reference: DateTime<Utc>, two_digit_year: u32) -> i32 {
    let ref_year = reference.year();
    let century = (ref_year / 100) * 100;
    let mut candidate = century + two_digit_year as i32;

    while candidate - ref_year > 49 {
        candidate -= 100;
    }
    while candidate - ref_year < -50 {
        candidate += 100;
    }
    candidate
}

fn pick_closest(reference: DateTime<Utc>, candidates: &[DateTime<Utc>]) -> DateTime<Utc> {
    *candidates
        .iter()
        .min_by_key(|c| {
            let diff = (**c - reference).num_milliseconds();
            // Ties broken towards the past: a non-negative (future) diff
            // sorts after an equal-magnitude past diff.
            (diff.abs(), diff > 0)
        })
        .expect("non-empty candidate list")
}

/// Convert a demodulator's `t=<epoch_seconds_float>` field into a UTC
/// instant (spec §6 "Input line format").
pub fn epoch_to_instant(epoch: f64) -> DateTime<Utc> {
    let secs = epoch.trunc() as i64;
    let nanos = (epoch.fract() * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(secs, nanos).single().unwrap_or_else(Utc::now)
}

/// Truncate fractional seconds and render RFC3339 with a trailing 'Z', the
/// wire format required by spec §6.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant
        .with_nanosecond(0)
        .unwrap_or(instant)
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hour_minute_same_day() {
        let reference = Utc.with_ymd_and_hms(2024, 6, 11, 4, 57, 0).unwrap();
        let resolved = resolve_hour_minute(reference, 4, 54);
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 6, 11, 4, 54, 0).unwrap());
    }

    #[test]
    fn hour_minute_wraps_to_previous_day_when_closer() {
        let reference = Utc.with_ymd_and_hms(2024, 6, 11, 0, 5, 0).unwrap();
        let resolved = resolve_hour_minute(reference, 23, 58);
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 6, 10, 23, 58, 0).unwrap());
    }

    #[test]
    fn day_hour_minute_rolls_hour_24() {
        let reference = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let resolved = resolve_day_hour_minute(reference, 11, 24, 0).unwrap();
        assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 0).unwrap());
    }

    #[test]
    fn day_hour_minute_out_of_range_fails() {
        let reference = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        // day 30 does not occur within +-10 days of June 11
        assert!(resolve_day_hour_minute(reference, 30, 0, 0).is_err());
    }

    #[test]
    fn two_digit_year_nearest() {
        let reference = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(resolve_two_digit_year(reference, 99), 1999);
        assert_eq!(resolve_two_digit_year(reference, 24), 2024);
        assert_eq!(resolve_two_digit_year(reference, 73), 2073);
    }
}
