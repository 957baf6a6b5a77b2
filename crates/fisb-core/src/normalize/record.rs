//! The normalized `Record` enum (spec §3 "Normalized record"): one variant
//! per product family, every variant carrying the four fields every record
//! always has (`type` via the serde tag, `unique_name`, `insert_time`,
//! `expiration_time`), matching the teacher's single tagged-enum approach
//! for its own `Message`/`DF` wire types rather than a struct per product
//! with a shared trait.

use super::geometry::GeometryItem;
use crate::apdu::crl::ContentTag;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type")]
pub enum Record {
    #[serde(rename = "METAR")]
    Metar {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        station: String,
        observation_time: String,
        contents: String,
    },
    #[serde(rename = "TAF")]
    Taf {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        station: String,
        issued_time: String,
        valid_period_begin_time: String,
        valid_period_end_time: String,
        contents: String,
    },
    #[serde(rename = "WINDS")]
    Winds {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        station: String,
        forecast_hour: u8,
        valid_time: String,
        issued_time: String,
        model_run_time: String,
        for_use_from: String,
        for_use_to: String,
        contents: String,
    },
    #[serde(rename = "PIREP")]
    Pirep {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        report_time: Option<String>,
        station_raw: String,
        urgent: bool,
        fields: Vec<(String, String)>,
    },
    #[serde(rename = "FIS_B_UNAVAILABLE")]
    FisbUnavailable {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        issued_time: Option<String>,
        centers: Vec<String>,
    },
    #[serde(rename = "NOTAM_TFR")]
    NotamTfr {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        notam_number: String,
        start_of_activity_time: String,
        end_of_validity_time: String,
        contents: String,
        geometry: Vec<GeometryItem>,
    },
    #[serde(rename = "NOTAM")]
    Notam {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        subtype: String,
        accountable: String,
        affected_location: String,
        keyword: String,
        number: String,
        start_of_activity_time: Option<String>,
        end_of_validity_time: Option<String>,
        altitudes: Option<(Option<i32>, Option<i32>)>,
        contents: String,
        geometry: Vec<GeometryItem>,
    },
    #[serde(rename = "SIGWX")]
    Sigwx {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        sigwx_type: String,
        station: String,
        issued_time: String,
        contents: String,
        geometry: Vec<GeometryItem>,
    },
    #[serde(rename = "G_AIRMET")]
    GAirmet {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        forecast_hour: u8,
        issued_time: String,
        contents: String,
        geometry: Vec<GeometryItem>,
    },
    #[serde(rename = "SUA")]
    Sua {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        airspace_id: String,
        schedule: String,
        status: String,
        altitude_low_ft: i32,
        altitude_high_ft: i32,
    },
    #[serde(rename = "CRL")]
    Crl {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        product_id: u16,
        station: String,
        range_nm: u32,
        has_overflow: bool,
        entries: Vec<CrlEntrySummary>,
    },
    #[serde(rename = "SERVICE_STATUS")]
    ServiceStatus {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        station: String,
        traffic: Vec<u32>,
    },
    #[serde(rename = "RSR_STATUS")]
    RsrStatus {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        station: String,
        rsr_percent: f64,
    },
    #[serde(rename = "IMAGE")]
    Image {
        unique_name: String,
        insert_time: String,
        expiration_time: String,
        product: String,
        event_time: String,
        alternate_block_number: i64,
        scale_factor: crate::geo::ScaleFactor,
        obs_or_valid: String,
        /// Hex-encoded 128-byte run-length-decoded bin, or `None` when this
        /// record only signals that the block currently carries no data
        /// (spec §6 "image records carry `bins` as a fixed-length byte
        /// sequence per block plus `alt_bn` and `scale_factor`").
        bins: Option<String>,
        bbox: (f64, f64, f64, f64),
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CrlEntrySummary {
    pub identity: String,
    pub content_tag: ContentTag,
    pub complete: bool,
}

impl Record {
    pub fn unique_name(&self) -> &str {
        match self {
            Record::Metar { unique_name, .. }
            | Record::Taf { unique_name, .. }
            | Record::Winds { unique_name, .. }
            | Record::Pirep { unique_name, .. }
            | Record::FisbUnavailable { unique_name, .. }
            | Record::NotamTfr { unique_name, .. }
            | Record::Notam { unique_name, .. }
            | Record::Sigwx { unique_name, .. }
            | Record::GAirmet { unique_name, .. }
            | Record::Sua { unique_name, .. }
            | Record::Crl { unique_name, .. }
            | Record::ServiceStatus { unique_name, .. }
            | Record::RsrStatus { unique_name, .. }
            | Record::Image { unique_name, .. } => unique_name,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Record::Metar { .. } => "METAR",
            Record::Taf { .. } => "TAF",
            Record::Winds { .. } => "WINDS",
            Record::Pirep { .. } => "PIREP",
            Record::FisbUnavailable { .. } => "FIS_B_UNAVAILABLE",
            Record::NotamTfr { .. } => "NOTAM_TFR",
            Record::Notam { .. } => "NOTAM",
            Record::Sigwx { .. } => "SIGWX",
            Record::GAirmet { .. } => "G_AIRMET",
            Record::Sua { .. } => "SUA",
            Record::Crl { .. } => "CRL",
            Record::ServiceStatus { .. } => "SERVICE_STATUS",
            Record::RsrStatus { .. } => "RSR_STATUS",
            Record::Image { .. } => "IMAGE",
        }
    }

    /// Store key, shaped `<TYPE>-<unique_name>` (spec §6 "Store interface").
    pub fn store_key(&self) -> String {
        format!("{}-{}", self.type_name(), self.unique_name())
    }

    pub fn expiration_time(&self) -> &str {
        match self {
            Record::Metar { expiration_time, .. }
            | Record::Taf { expiration_time, .. }
            | Record::Winds { expiration_time, .. }
            | Record::Pirep { expiration_time, .. }
            | Record::FisbUnavailable { expiration_time, .. }
            | Record::NotamTfr { expiration_time, .. }
            | Record::Notam { expiration_time, .. }
            | Record::Sigwx { expiration_time, .. }
            | Record::GAirmet { expiration_time, .. }
            | Record::Sua { expiration_time, .. }
            | Record::Crl { expiration_time, .. }
            | Record::ServiceStatus { expiration_time, .. }
            | Record::RsrStatus { expiration_time, .. }
            | Record::Image { expiration_time, .. } => expiration_time,
        }
    }

    /// Whether this record's product type bypasses the deduplicator's
    /// digest cache entirely (spec §4.5 "always pass" list).
    pub fn always_passes_dedup(&self) -> bool {
        matches!(
            self,
            Record::FisbUnavailable { .. }
                | Record::Sigwx { .. }
                | Record::GAirmet { .. }
                | Record::NotamTfr { .. }
                | Record::Notam { .. }
                | Record::Crl { .. }
                | Record::ServiceStatus { .. }
        )
    }
}
