//! NOTAM-TFR and NOTAM-D/FDC/TMOA/TRA normalization (spec §4.4).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NormalizeError;
use crate::time::format_instant;

use super::geometry::normalize_geometry;
use super::record::Record;
use crate::apdu::twgo::GraphicRecord;

static TFR_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{10})-(\d{10}|PERM)").unwrap());
static TFR_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2}/\d{4})\b").unwrap());

static NOTAM_COMPONENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<accountable>[A-Z0-9]+)\s+(?P<keyword>[A-Z]+)\s+(?P<number>[A-Z0-9/]+)\s+(?P<affected>[A-Z0-9]+)\s+(?P<contents>.*)$").unwrap()
});

static ALTITUDE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SFC-(\d+)FT|(\d+)FT-(\d+)FT").unwrap());

fn resolve_tfr_instant(raw: &str, notam_perm_time: DateTime<Utc>) -> Result<DateTime<Utc>, NormalizeError> {
    if raw == "PERM" {
        return Ok(notam_perm_time);
    }
    // yymmddhhmm
    if raw.len() != 10 {
        return Err(NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()));
    }
    let year: i32 = 2000 + raw[0..2].parse::<i32>().map_err(|_| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))?;
    let month: u32 = raw[2..4].parse().map_err(|_| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))?;
    let day: u32 = raw[4..6].parse().map_err(|_| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))?;
    let hour: u32 = raw[6..8].parse().map_err(|_| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))?;
    let minute: u32 = raw[8..10].parse().map_err(|_| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))
}

use chrono::TimeZone;

pub fn normalize_tfr(
    contents: &str,
    reception_time: DateTime<Utc>,
    notam_perm_time: DateTime<Utc>,
) -> Result<Record, NormalizeError> {
    let number = TFR_NUMBER
        .find(contents)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))?;

    let range = TFR_RANGE.captures(contents).ok_or_else(|| NormalizeError::UnrecognizedBody("NOTAM_TFR".to_string()))?;
    let start_of_activity_time = resolve_tfr_instant(&range[1], notam_perm_time)?;
    let end_of_validity_time = resolve_tfr_instant(&range[2], notam_perm_time)?;

    Ok(Record::NotamTfr {
        unique_name: number.clone(),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(end_of_validity_time),
        notam_number: number,
        start_of_activity_time: format_instant(start_of_activity_time),
        end_of_validity_time: format_instant(end_of_validity_time),
        contents: contents.trim().to_string(),
        geometry: Vec::new(),
    })
}

pub fn normalize_notam(
    contents: &str,
    reception_time: DateTime<Utc>,
    graphics: Vec<GraphicRecord>,
    default_expire: DateTime<Utc>,
) -> Result<Record, NormalizeError> {
    let caps = NOTAM_COMPONENTS
        .captures(contents)
        .ok_or_else(|| NormalizeError::UnrecognizedBody("NOTAM".to_string()))?;

    let accountable = caps["accountable"].to_string();
    let keyword = caps["keyword"].to_string();
    let number = caps["number"].to_string();
    let affected_location = caps["affected"].to_string();
    let body = caps["contents"].to_string();

    let (subtype, altitudes) = if accountable.starts_with("SUA") {
        let altitudes = ALTITUDE_CLAUSE.captures(&body).map(|c| {
            if let Some(high) = c.get(1) {
                (None, Some(high.as_str().parse::<i32>().unwrap_or(0)))
            } else {
                let low = c.get(2).map(|m| m.as_str().parse::<i32>().unwrap_or(0));
                let high = c.get(3).map(|m| m.as_str().parse::<i32>().unwrap_or(0));
                (low, high)
            }
        });
        ("D-SUA".to_string(), altitudes)
    } else {
        ("D".to_string(), None)
    };

    let geometry = normalize_geometry(graphics);

    Ok(Record::Notam {
        unique_name: format!("{number}-{affected_location}"),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(default_expire),
        subtype,
        accountable,
        affected_location,
        keyword,
        number,
        start_of_activity_time: None,
        end_of_validity_time: None,
        altitudes,
        contents: body,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tfr_range() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let perm = Utc.with_ymd_and_hms(2099, 12, 31, 23, 59, 59).unwrap();
        let body = "FDC 4/1234 TEMPORARY FLIGHT RESTRICTIONS 2406110500-2406120500";
        let record = normalize_tfr(body, reception, perm).unwrap();
        match record {
            Record::NotamTfr { notam_number, .. } => assert_eq!(notam_number, "4/1234"),
            _ => panic!("expected NOTAM_TFR"),
        }
    }

    #[test]
    fn perm_sentinel_uses_far_future() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let perm = Utc.with_ymd_and_hms(2099, 12, 31, 23, 59, 59).unwrap();
        let body = "FDC 4/1234 TEMPORARY FLIGHT RESTRICTIONS 2406110500-PERM";
        let record = normalize_tfr(body, reception, perm).unwrap();
        match record {
            Record::NotamTfr { end_of_validity_time, .. } => {
                assert_eq!(end_of_validity_time, "2099-12-31T23:59:59Z");
            }
            _ => panic!("expected NOTAM_TFR"),
        }
    }
}
