//! PIREP normalization (spec §4.4): split the header (time, station,
//! UA/UUA) then the body by its fixed field-tag set, preserving `/`
//! characters inside field bodies.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NormalizeError;
use crate::time::{format_instant, resolve_hour_minute};

use super::record::Record;

const FIELD_TAGS: [&str; 11] = ["/OV", "/TM", "/FL", "/TP", "/TB", "/SK", "/RM", "/WX", "/TA", "/WV", "/IC"];

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(UUA|UA)\s*/OV").unwrap());

/// Split the body on field tags, keeping the tag as the field name and
/// everything up to (not including) the next tag as its value. Text
/// before the first recognized tag is returned separately as the raw
/// station/header fragment (spec's "preserve the raw unmatched leading
/// segment as `station_raw`").
fn split_fields(body: &str) -> (String, Vec<(String, String)>) {
    let mut first_tag_idx = None;
    for tag in FIELD_TAGS {
        if let Some(idx) = body.find(tag) {
            first_tag_idx = Some(first_tag_idx.map_or(idx, |prev: usize| prev.min(idx)));
        }
    }
    let (header, rest) = match first_tag_idx {
        Some(idx) => (body[..idx].to_string(), &body[idx..]),
        None => return (body.to_string(), Vec::new()),
    };

    let mut indices: Vec<(usize, &str)> = Vec::new();
    for tag in FIELD_TAGS {
        let mut start = 0;
        while let Some(pos) = rest[start..].find(tag) {
            let abs = start + pos;
            indices.push((abs, tag));
            start = abs + tag.len();
        }
    }
    indices.sort_by_key(|(idx, _)| *idx);

    let mut fields = Vec::new();
    for (i, (idx, tag)) in indices.iter().enumerate() {
        let value_start = idx + tag.len();
        let value_end = indices.get(i + 1).map(|(next, _)| *next).unwrap_or(rest.len());
        let value = rest[value_start..value_end].trim().to_string();
        fields.push((tag.trim_start_matches('/').to_string(), value));
    }

    (header.trim().to_string(), fields)
}

pub fn normalize(
    contents: &str,
    reception_time: DateTime<Utc>,
    pirep_expire_minutes: i64,
    use_reception_for_expiry: bool,
) -> Result<Record, NormalizeError> {
    let urgent = HEADER.is_match(contents.trim_start()) && contents.trim_start().starts_with("UUA");
    let (station_raw, fields) = split_fields(contents);

    let report_time = fields.iter().find(|(tag, _)| tag == "TM").and_then(|(_, value)| {
        if value.len() >= 4 {
            let hour: u32 = value[0..2].parse().ok()?;
            let minute: u32 = value[2..4].parse().ok()?;
            Some(resolve_hour_minute(reception_time, hour, minute))
        } else {
            None
        }
    });

    if fields.is_empty() {
        return Err(NormalizeError::UnmatchedPirep { raw: contents.to_string() });
    }

    let expiration_base = if use_reception_for_expiry {
        reception_time
    } else {
        report_time.unwrap_or(reception_time)
    };
    let expiration_time = expiration_base + Duration::minutes(pirep_expire_minutes);

    let unique_name = fields
        .iter()
        .find(|(tag, _)| tag == "OV")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| format!("PIREP-{}", format_instant(reception_time)));

    Ok(Record::Pirep {
        unique_name,
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(expiration_time),
        report_time: report_time.map(format_instant),
        station_raw,
        urgent,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn splits_fields_preserving_slashes_in_values() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let body = "UA /OV KIND180010/TM 0456/FL080/TP C172/RM SMOOTH/WX OVC 3000";
        let record = normalize(body, reception, 90, false).unwrap();
        match record {
            Record::Pirep { fields, report_time, .. } => {
                assert!(fields.iter().any(|(t, v)| t == "OV" && v == "KIND180010"));
                assert!(fields.iter().any(|(t, v)| t == "RM" && v == "SMOOTH"));
                assert_eq!(report_time.unwrap(), "2024-06-11T04:56:00Z");
            }
            _ => panic!("expected PIREP"),
        }
    }

    #[test]
    fn unmatched_body_is_an_error() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        assert!(normalize("not a pirep at all", reception, 90, false).is_err());
    }
}
