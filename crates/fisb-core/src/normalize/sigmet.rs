//! SIGMET/AIRMET/WST/CWA, G-AIRMET, and SUA normalization (spec §4.4).

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::apdu::twgo::{GraphicRecord, PartialTime};
use crate::error::NormalizeError;
use crate::time::{format_instant, resolve_day_hour_minute};

use super::geometry::normalize_geometry;
use super::record::Record;

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(SIGMET|AIRMET|WST|CWA)\s+([A-Z0-9]{3,4})\s+(\d{2})(\d{2})(\d{2})\b").unwrap());

fn partial_time_to_instant(reception: DateTime<Utc>, partial: &PartialTime) -> Option<DateTime<Utc>> {
    match (partial.day, partial.month) {
        (Some(day), _) => resolve_day_hour_minute(reception, day as u32, partial.hour as u32, partial.minute as u32).ok(),
        _ => None,
    }
}

pub fn normalize_sigwx(
    contents: &str,
    reception_time: DateTime<Utc>,
    graphics: Vec<GraphicRecord>,
) -> Result<Record, NormalizeError> {
    let caps = HEADER.captures(contents).ok_or_else(|| NormalizeError::UnrecognizedBody("SIGWX".to_string()))?;
    let sigwx_type = caps[1].to_string();
    let station = caps[2].to_string();
    let day: u32 = caps[3].parse().unwrap();
    let hour: u32 = caps[4].parse().unwrap();
    let minute: u32 = caps[5].parse().unwrap();

    let issued_time = resolve_day_hour_minute(reception_time, day, hour, minute)?;

    let stop_times: Vec<DateTime<Utc>> = graphics
        .iter()
        .filter_map(|g| g.stop_time.as_ref())
        .filter_map(|t| partial_time_to_instant(issued_time, t))
        .collect();
    let expiration_time = stop_times.into_iter().max().unwrap_or(issued_time + Duration::hours(6));

    let geometry = normalize_geometry(graphics);

    Ok(Record::Sigwx {
        unique_name: format!("{sigwx_type}-{station}-{day:02}{hour:02}{minute:02}"),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(expiration_time),
        sigwx_type,
        station,
        issued_time: format_instant(issued_time),
        contents: contents.trim().to_string(),
        geometry,
    })
}

/// Identify the G-AIRMET forecast hour {0, 3, 6} by the stop-time pattern
/// (spec §4.4): equal start/stop implies the 6-hour forecast, with stop
/// then shifted +3 hours; otherwise the hour is read from the stop minute
/// falling on a three-hour boundary relative to issued_time.
fn forecast_hour(issued_time: DateTime<Utc>, start: Option<&PartialTime>, stop: Option<&PartialTime>) -> (u8, DateTime<Utc>) {
    use chrono::Timelike;
    match (start, stop) {
        (Some(s), Some(t)) if s.hour == t.hour && s.minute == t.minute => {
            let stop_instant = partial_time_to_instant(issued_time, t).unwrap_or(issued_time) + Duration::hours(3);
            (6, stop_instant)
        }
        (_, Some(t)) => {
            let stop_instant = partial_time_to_instant(issued_time, t).unwrap_or(issued_time + Duration::hours(3));
            let delta_hours = ((stop_instant - issued_time).num_minutes() as f64 / 60.0).round() as i64;
            let hour = if delta_hours <= 0 { 0 } else if delta_hours <= 3 { 3 } else { 6 };
            let _ = stop_instant.hour();
            (hour as u8, stop_instant)
        }
        _ => (3, issued_time + Duration::hours(3)),
    }
}

pub fn normalize_g_airmet(
    contents: &str,
    reception_time: DateTime<Utc>,
    issued_time: DateTime<Utc>,
    graphics: Vec<GraphicRecord>,
) -> Result<Record, NormalizeError> {
    let first = graphics.first();
    let (hour, stop_instant) = forecast_hour(issued_time, first.and_then(|g| g.start_time.as_ref()), first.and_then(|g| g.stop_time.as_ref()));
    let geometry = normalize_geometry(graphics);

    Ok(Record::GAirmet {
        unique_name: format!("G_AIRMET-{hour}-{}", format_instant(issued_time)),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(stop_instant),
        forecast_hour: hour,
        issued_time: format_instant(issued_time),
        contents: contents.trim().to_string(),
        geometry,
    })
}

static SUA_FIELDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z0-9 ]+)\s+SCHED:(\w+)\s+STATUS:(\w+)\s+ALT:(\d+)-(\d+)").unwrap());

pub fn normalize_sua(
    contents: &str,
    reception_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Record, NormalizeError> {
    let caps = SUA_FIELDS.captures(contents).ok_or_else(|| NormalizeError::UnrecognizedBody("SUA".to_string()))?;

    Ok(Record::Sua {
        unique_name: caps[1].trim().to_string(),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(end_time),
        airspace_id: caps[1].trim().to_string(),
        schedule: caps[2].to_string(),
        status: caps[3].to_string(),
        altitude_low_ft: caps[4].parse().unwrap_or(0),
        altitude_high_ft: caps[5].parse().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_sigmet_header() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let record = normalize_sigwx("SIGMET KIND 110500 SEVERE TURB", reception, vec![]).unwrap();
        match record {
            Record::Sigwx { station, sigwx_type, .. } => {
                assert_eq!(station, "KIND");
                assert_eq!(sigwx_type, "SIGMET");
            }
            _ => panic!("expected SIGWX"),
        }
    }

    #[test]
    fn parses_sua_fields() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 11, 12, 0, 0).unwrap();
        let record = normalize_sua("R1234A SCHED:CONT STATUS:ACT ALT:0-18000", reception, end).unwrap();
        match record {
            Record::Sua { altitude_low_ft, altitude_high_ft, .. } => {
                assert_eq!(altitude_low_ft, 0);
                assert_eq!(altitude_high_ft, 18000);
            }
            _ => panic!("expected SUA"),
        }
    }
}
