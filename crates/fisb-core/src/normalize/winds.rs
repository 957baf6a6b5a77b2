//! WINDS (aloft forecast) normalization, including the 6/12/24-hour
//! forecast horizon selection of spec §4.4 ("Table A-9").

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NormalizeError;
use crate::time::{format_instant, resolve_day_hour_minute};

use super::record::Record;

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FD([A-Z0-9]{3,4})\s+(\d{2})(\d{2})(\d{2})\b").unwrap());

/// Table A-9: pick the forecast horizon {6, 12, 24} whose nominal product
/// hour is closest to (but not before) the APDU's own available-hour,
/// given the message's stated valid hour in {0, 6, 12, 18}.
fn select_horizon(apdu_hour: u32, valid_hour: u32) -> u8 {
    let diff = (valid_hour + 24 - apdu_hour) % 24;
    if diff <= 6 {
        6
    } else if diff <= 12 {
        12
    } else {
        24
    }
}

pub fn normalize(
    contents: &str,
    reception_time: DateTime<Utc>,
    apdu_hour: u32,
) -> Result<Record, NormalizeError> {
    let caps = HEADER.captures(contents).ok_or_else(|| NormalizeError::UnrecognizedBody("WINDS".to_string()))?;
    let station = caps[1].to_string();
    let day: u32 = caps[2].parse().unwrap();
    let valid_hour: u32 = caps[3].parse().unwrap();
    let minute: u32 = caps[4].parse().unwrap();

    let valid_time = resolve_day_hour_minute(reception_time, day, valid_hour, minute)?;
    let horizon = select_horizon(apdu_hour, valid_hour);

    let (issued_offset, model_run_offset, use_from_offset, use_to_offset) = match horizon {
        6 => (4, 6, 4, 3),
        12 => (10, 12, 3, 6),
        _ => (22, 24, 6, 6),
    };

    let issued_time = valid_time - Duration::hours(issued_offset);
    let model_run_time = valid_time - Duration::hours(model_run_offset);
    let for_use_from = valid_time - Duration::hours(use_from_offset);
    let for_use_to = valid_time + Duration::hours(use_to_offset);

    let mut expiration_time = for_use_to;
    if horizon == 6 {
        expiration_time += Duration::days(1);
    }

    Ok(Record::Winds {
        unique_name: format!("{station}-{horizon}"),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(expiration_time),
        station,
        forecast_hour: horizon,
        valid_time: format_instant(valid_time),
        issued_time: format_instant(issued_time),
        model_run_time: format_instant(model_run_time),
        for_use_from: format_instant(for_use_from),
        for_use_to: format_instant(for_use_to),
        contents: contents.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn scenario_two_six_hour_horizon() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 14, 3, 0).unwrap();
        let body = "FDKIND 111800";
        let record = normalize(body, reception, 14).unwrap();
        match record {
            Record::Winds {
                valid_time,
                issued_time,
                model_run_time,
                for_use_from,
                for_use_to,
                expiration_time,
                forecast_hour,
                ..
            } => {
                assert_eq!(forecast_hour, 6);
                assert_eq!(valid_time, "2024-06-11T18:00:00Z");
                assert_eq!(issued_time, "2024-06-11T14:00:00Z");
                assert_eq!(model_run_time, "2024-06-11T12:00:00Z");
                assert_eq!(for_use_from, "2024-06-11T14:00:00Z");
                assert_eq!(for_use_to, "2024-06-11T21:00:00Z");
                assert_eq!(expiration_time, "2024-06-12T21:00:00Z");
            }
            _ => panic!("expected WINDS"),
        }
    }
}
