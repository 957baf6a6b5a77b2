//! METAR/SPECI normalization (spec §4.4).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NormalizeError;
use crate::time::{format_instant, resolve_day_hour_minute};

use super::record::Record;

static DDHHMMZ: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})(\d{2})(\d{2})Z\b").unwrap());
static ICAO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:METAR|SPECI)\s+([A-Z0-9]{3,4})\s").unwrap());

pub fn normalize(
    contents: &str,
    reception_time: DateTime<Utc>,
    metar_expire_minutes: i64,
) -> Result<Record, NormalizeError> {
    let station = ICAO
        .captures(contents.trim_start())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| NormalizeError::UnrecognizedBody("METAR".to_string()))?;

    let caps = DDHHMMZ
        .captures(contents)
        .ok_or_else(|| NormalizeError::UnrecognizedBody("METAR".to_string()))?;
    let day: u32 = caps[1].parse().unwrap();
    let hour: u32 = caps[2].parse().unwrap();
    let minute: u32 = caps[3].parse().unwrap();

    let observation_time = resolve_day_hour_minute(reception_time, day, hour, minute)?;
    let expiration_time = observation_time + chrono::Duration::minutes(metar_expire_minutes);

    Ok(Record::Metar {
        unique_name: station.clone(),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(expiration_time),
        station,
        observation_time: format_instant(observation_time),
        contents: contents.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn scenario_one_metar_line() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 4, 57, 0).unwrap();
        let body = "METAR KIND 110454Z 03006KT 10SM SCT060 OVC110 11/06 A3016";
        let record = normalize(body, reception, 120).unwrap();
        match record {
            Record::Metar { unique_name, observation_time, expiration_time, .. } => {
                assert_eq!(unique_name, "KIND");
                assert_eq!(observation_time, "2024-06-11T04:54:00Z");
                assert_eq!(expiration_time, "2024-06-11T06:54:00Z");
            }
            _ => panic!("expected METAR"),
        }
    }

    #[test]
    fn rejects_body_without_station() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 4, 57, 0).unwrap();
        assert!(normalize("garbage text", reception, 120).is_err());
    }
}
