//! TAF normalization (spec §4.4).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NormalizeError;
use crate::time::{format_instant, resolve_day_hour_minute};

use super::record::Record;

static ICAO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^TAF\s+(?:AMD\s+|COR\s+)?([A-Z0-9]{3,4})\s").unwrap());
static ISSUED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})(\d{2})(\d{2})Z\b").unwrap());
static VALID_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})(\d{2})/(\d{2})(\d{2})\b").unwrap());

pub fn normalize(contents: &str, reception_time: DateTime<Utc>) -> Result<Record, NormalizeError> {
    let station = ICAO
        .captures(contents.trim_start())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| NormalizeError::UnrecognizedBody("TAF".to_string()))?;

    let issued_caps = ISSUED.captures(contents).ok_or_else(|| NormalizeError::UnrecognizedBody("TAF".to_string()))?;
    let issued_time = resolve_day_hour_minute(
        reception_time,
        issued_caps[1].parse().unwrap(),
        issued_caps[2].parse().unwrap(),
        issued_caps[3].parse().unwrap(),
    )?;

    let valid_caps = VALID_PERIOD.captures(contents).ok_or_else(|| NormalizeError::UnrecognizedBody("TAF".to_string()))?;
    let begin_day: u32 = valid_caps[1].parse().unwrap();
    let begin_hour: u32 = valid_caps[2].parse().unwrap();
    let end_day: u32 = valid_caps[3].parse().unwrap();
    let end_hour: u32 = valid_caps[4].parse().unwrap();

    let valid_period_begin_time = resolve_day_hour_minute(reception_time, begin_day, begin_hour, 0)?;
    let valid_period_end_time = resolve_day_hour_minute(reception_time, end_day, end_hour, 0)?;

    Ok(Record::Taf {
        unique_name: station.clone(),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(valid_period_end_time),
        station,
        issued_time: format_instant(issued_time),
        valid_period_begin_time: format_instant(valid_period_begin_time),
        valid_period_end_time: format_instant(valid_period_end_time),
        contents: contents.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_taf_header_and_validity() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let body = "TAF KIND 110454Z 1106/1212 03006KT P6SM SCT060";
        let record = normalize(body, reception).unwrap();
        match record {
            Record::Taf { unique_name, issued_time, valid_period_end_time, .. } => {
                assert_eq!(unique_name, "KIND");
                assert_eq!(issued_time, "2024-06-11T04:54:00Z");
                assert_eq!(valid_period_end_time, "2024-06-12T12:00:00Z");
            }
            _ => panic!("expected TAF"),
        }
    }
}
