//! FIS-B-unavailable normalization (spec §4.4): issued time + center list.

use chrono::{DateTime, Duration, Utc};

use crate::error::NormalizeError;
use crate::time::{format_instant, resolve_hour_minute};

use super::record::Record;

pub fn normalize(
    contents: &str,
    reception_time: DateTime<Utc>,
    fisb_unavail_expire_minutes: i64,
) -> Result<Record, NormalizeError> {
    let mut parts = contents.split_whitespace();
    let time_field = parts.next().ok_or_else(|| NormalizeError::UnrecognizedBody("FIS_B_UNAVAILABLE".to_string()))?;
    let centers: Vec<String> = parts.map(|s| s.to_string()).collect();

    let issued_time = if time_field.len() == 4 {
        let hour: u32 = time_field[0..2].parse().map_err(|_| NormalizeError::UnrecognizedBody("FIS_B_UNAVAILABLE".to_string()))?;
        let minute: u32 = time_field[2..4].parse().map_err(|_| NormalizeError::UnrecognizedBody("FIS_B_UNAVAILABLE".to_string()))?;
        Some(resolve_hour_minute(reception_time, hour, minute))
    } else {
        None
    };

    let expiration_time = reception_time + Duration::minutes(fisb_unavail_expire_minutes);

    Ok(Record::FisbUnavailable {
        unique_name: "FIS_B_UNAVAILABLE".to_string(),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(expiration_time),
        issued_time: issued_time.map(format_instant),
        centers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_issued_time_and_centers() {
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let record = normalize("0500 ZKC ZDV", reception, 20).unwrap();
        match record {
            Record::FisbUnavailable { centers, issued_time, .. } => {
                assert_eq!(centers, vec!["ZKC".to_string(), "ZDV".to_string()]);
                assert_eq!(issued_time.unwrap(), "2024-06-11T05:00:00Z");
            }
            _ => panic!("expected FIS_B_UNAVAILABLE"),
        }
    }
}
