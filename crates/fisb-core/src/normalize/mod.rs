//! Product normalizer (spec §4.4): turns a reconstructed APDU/CRL/service-
//! status frame into a fully-typed [`Record`] with resolved timestamps and
//! a canonical identity.

pub mod fisb_unavailable;
pub mod geometry;
pub mod metar;
pub mod notam;
pub mod pirep;
pub mod record;
pub mod sigmet;
pub mod taf;
pub mod winds;

pub use record::Record;

use chrono::{DateTime, Duration, Utc};

use crate::apdu::crl::Crl;
use crate::apdu::service_status::ServiceStatus;
use crate::apdu::twgo::TwgoObject;
use crate::config::Config;
use crate::error::NormalizeError;
use crate::time::format_instant;

use record::CrlEntrySummary;

/// TWGO product-id family, used to route a reassembled/matched TWGO object
/// to its normalizer. Best-effort mapping reconstructed from the FIS-B
/// product table; not independently verified byte-exact against the FAA
/// spec (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwgoFamily {
    NotamTfr,
    Airmet,
    Sigmet,
    Cwa,
    Notam,
    GAirmet,
    Sua,
}

pub fn twgo_family(product_id: u16) -> TwgoFamily {
    match product_id {
        8 => TwgoFamily::NotamTfr,
        11 => TwgoFamily::Airmet,
        12 | 13 => TwgoFamily::Sigmet,
        14 => TwgoFamily::Cwa,
        15 => TwgoFamily::Notam,
        16 => TwgoFamily::GAirmet,
        _ => TwgoFamily::Sua,
    }
}

/// Normalize a DLAC-text APDU body. The text family is identified by its
/// own leading token (`METAR`/`SPECI`/`TAF`/`FD<station>`/a PIREP
/// UA-header/a bare time+center list for FIS-B-unavailable), matching the
/// original's dispatch-by-content approach for product 413.
pub fn normalize_dlac_text(text: &str, reception_time: DateTime<Utc>, cfg: &Config) -> Result<Record, NormalizeError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with("METAR") || trimmed.starts_with("SPECI") {
        metar::normalize(text, reception_time, cfg.metar_expire)
    } else if trimmed.starts_with("TAF") {
        taf::normalize(text, reception_time)
    } else if trimmed.starts_with("FD") {
        normalize_winds_with_header_hour(text, reception_time)
    } else if trimmed.starts_with("UA") || trimmed.starts_with("UUA") {
        pirep::normalize(text, reception_time, cfg.pirep_expire, cfg.pirep_use_report_time_to_expire)
    } else {
        fisb_unavailable::normalize(text, reception_time, cfg.fisb_unavail_expire)
    }
}

fn normalize_winds_with_header_hour(text: &str, reception_time: DateTime<Utc>) -> Result<Record, NormalizeError> {
    use chrono::Timelike;
    winds::normalize(text, reception_time, reception_time.hour())
}

/// Normalize a matched TWGO object (text and/or graphics already paired by
/// the reconstructor) into its product-family record.
pub fn normalize_twgo(
    product_id: u16,
    object: &TwgoObject,
    reception_time: DateTime<Utc>,
    cfg: &Config,
) -> Result<Record, NormalizeError> {
    let text = object.text_records.first().map(|t| t.text.clone()).unwrap_or_default();
    let notam_perm_time = cfg
        .notam_perm_time
        .parse::<DateTime<Utc>>()
        .unwrap_or_else(|_| Utc::now());

    match twgo_family(product_id) {
        TwgoFamily::NotamTfr => notam::normalize_tfr(&text, reception_time, notam_perm_time),
        TwgoFamily::Notam => {
            let default_expire = reception_time + Duration::minutes(cfg.twgo_default_expire.max(61));
            notam::normalize_notam(&text, reception_time, object.graphic_records.clone(), default_expire)
        }
        TwgoFamily::Sigmet | TwgoFamily::Cwa => sigmet::normalize_sigwx(&text, reception_time, object.graphic_records.clone()),
        TwgoFamily::Airmet => sigmet::normalize_sigwx(&text, reception_time, object.graphic_records.clone()),
        TwgoFamily::GAirmet => sigmet::normalize_g_airmet(&text, reception_time, reception_time, object.graphic_records.clone()),
        TwgoFamily::Sua => {
            if cfg.block_sua_messages {
                Err(NormalizeError::UnrecognizedBody("SUA suppressed by configuration".to_string()))
            } else {
                let end_time = reception_time + Duration::minutes(cfg.twgo_default_expire.max(61));
                sigmet::normalize_sua(&text, reception_time, end_time)
            }
        }
    }
}

/// Normalize a CRL frame (spec §4.6): identity entries with their content
/// classification suffix; completeness markers are computed later by the
/// harvester against actual store contents, so `complete` starts `false`
/// here.
pub fn normalize_crl(crl: &Crl, station: &str, reception_time: DateTime<Utc>) -> Record {
    let entries = crl
        .entries
        .iter()
        .map(|e| CrlEntrySummary {
            identity: format!("{}-{}", e.report_year_or_month, e.report_number),
            content_tag: e.tag,
            complete: false,
        })
        .collect();

    // Twice the nominal transmission interval; CRL is re-sent roughly every
    // 10s on the live feed, so 20s is used as the nominal floor.
    let expiration_time = reception_time + Duration::seconds(20);

    Record::Crl {
        unique_name: station.to_string(),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(expiration_time),
        product_id: crl.product_id,
        station: station.to_string(),
        range_nm: crl.range_nm as u32,
        has_overflow: crl.has_overflow,
        entries,
    }
}

pub fn normalize_service_status(status: &ServiceStatus, station: &str, reception_time: DateTime<Utc>) -> Record {
    Record::ServiceStatus {
        unique_name: station.to_string(),
        insert_time: format_instant(reception_time),
        expiration_time: format_instant(reception_time + Duration::seconds(40)),
        station: station.to_string(),
        traffic: status.traffic.iter().map(|t| t.icao_address).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dispatches_metar_text() {
        let cfg = Config::default();
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 4, 57, 0).unwrap();
        let record = normalize_dlac_text("METAR KIND 110454Z 03006KT 10SM SCT060 A3016", reception, &cfg).unwrap();
        assert_eq!(record.type_name(), "METAR");
    }

    #[test]
    fn dispatches_fisb_unavailable_fallback() {
        let cfg = Config::default();
        let reception = Utc.with_ymd_and_hms(2024, 6, 11, 4, 57, 0).unwrap();
        let record = normalize_dlac_text("0457 ZKC", reception, &cfg).unwrap();
        assert_eq!(record.type_name(), "FIS_B_UNAVAILABLE");
    }
}
