//! TWGO (Text With Graphic Overlay) objects (spec §3 "TWGO record", §4.3):
//! NOTAMs, AIRMET/SIGMET/WST/CWA, G-AIRMET, SUA, NOTAM-TRA/TMOA.
//!
//! Each object carries a small header (record format, location, reference
//! point) followed by `record_count` inner records, each one a self-
//! describing, length-prefixed text or graphic record. The length prefix
//! lets the matcher/desegmenter skip a record it doesn't need to interpret
//! without tracking every one of its variable-width sub-fields by hand.

use crate::bits::BitCursor;
use crate::dlac;
use crate::error::ApduError;
use crate::geo::GEO_VERTEX_SCALE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    Text,
    Graphic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Active,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TextRecord {
    pub report_number: u16,
    pub report_year: u8,
    pub report_status: ReportStatus,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeUnits {
    Msl,
    Agl,
    Ft,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct AltitudePair {
    pub high: Option<i32>,
    pub high_units: AltitudeUnits,
    pub low: Option<i32>,
    pub low_units: AltitudeUnits,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PartialTime {
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { lon: f64, lat: f64, altitudes: AltitudePair },
    Polygon { coordinates: Vec<(f64, f64)>, altitudes: AltitudePair },
    Polyline { coordinates: Vec<(f64, f64)>, altitudes: AltitudePair },
    Circle { center_lon: f64, center_lat: f64, radius_nm: f64, altitudes: AltitudePair },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GraphicRecord {
    pub object_type: u8,
    pub object_status: u8,
    pub object_element: u8,
    pub label: Option<String>,
    pub g_airmet_qualifier: Option<u8>,
    /// 0 or 1 per spec; values 2/3 are a decode error (spec §4.3).
    pub overlay_operator: u8,
    pub start_time: Option<PartialTime>,
    pub stop_time: Option<PartialTime>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TwgoObject {
    pub record_format: RecordFormat,
    pub location: String,
    pub record_reference_point: u8,
    pub text_records: Vec<TextRecord>,
    pub graphic_records: Vec<GraphicRecord>,
}

pub fn decode(body: &[u8]) -> Result<TwgoObject, ApduError> {
    let mut cursor = BitCursor::new(body);

    let record_format_bits = cursor.read_bits(4).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let record_format = match record_format_bits {
        2 => RecordFormat::Text,
        8 => RecordFormat::Graphic,
        other => return Err(ApduError::UnknownGeometryOption(other)),
    };

    let location_sextets = cursor.read_bits(3).ok_or(ApduError::ImpossibleHeaderBitCount)? as usize;
    cursor.align_to_byte();
    let location_bytes = (location_sextets * 6).div_ceil(8);
    let location = dlac::dlac_to_text(cursor.remaining_bytes(), 0, location_sextets);
    cursor.advance_bytes(location_bytes);

    let record_reference_point = cursor.read_bits(8).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let record_count = cursor.read_bits(8).ok_or(ApduError::ImpossibleHeaderBitCount)? as usize;
    cursor.align_to_byte();

    let mut text_records = Vec::new();
    let mut graphic_records = Vec::new();

    for _ in 0..record_count {
        if cursor.bits_remaining() < 16 {
            break;
        }
        let record_length = cursor.read_bits(16).ok_or(ApduError::ImpossibleHeaderBitCount)? as usize;
        cursor.align_to_byte();
        let record_start = cursor.remaining_bytes();
        if record_length > record_start.len() {
            return Err(ApduError::UnrecognizedTextHeader);
        }
        let record_bytes = &record_start[..record_length];

        match record_format {
            RecordFormat::Text => {
                if !text_records.is_empty() {
                    // TWGO objects carry at most one text record.
                    return Err(ApduError::UnrecognizedTextHeader);
                }
                text_records.push(decode_text_record(record_bytes)?);
            }
            RecordFormat::Graphic => {
                graphic_records.push(decode_graphic_record(record_bytes)?);
            }
        }

        cursor.advance_bytes(record_length);
    }

    Ok(TwgoObject {
        record_format,
        location,
        record_reference_point,
        text_records,
        graphic_records,
    })
}

fn decode_text_record(data: &[u8]) -> Result<TextRecord, ApduError> {
    let mut cursor = BitCursor::new(data);
    let report_number = cursor.read_bits(14).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
    let report_year = cursor.read_bits(7).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let status_bit = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    cursor.align_to_byte();
    let report_status = if status_bit { ReportStatus::Active } else { ReportStatus::Cancelled };
    let rest = cursor.remaining_bytes();
    let sextet_count = (rest.len() * 8) / 6;
    let text = dlac::dlac_to_text(rest, 0, sextet_count);

    Ok(TextRecord { report_number, report_year, report_status, text })
}

fn decode_graphic_record(data: &[u8]) -> Result<GraphicRecord, ApduError> {
    let mut cursor = BitCursor::new(data);

    let object_type = cursor.read_bits(6).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let object_status = cursor.read_bits(2).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let object_element = cursor.read_bits(4).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;

    let has_label = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let label = if has_label {
        let label_sextets = cursor.read_bits(5).ok_or(ApduError::ImpossibleHeaderBitCount)? as usize;
        cursor.align_to_byte();
        let text = dlac::dlac_to_text(cursor.remaining_bytes(), 0, label_sextets);
        cursor.advance_bytes((label_sextets * 6).div_ceil(8));
        Some(text)
    } else {
        None
    };

    let has_g_airmet_qualifier = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let g_airmet_qualifier = if has_g_airmet_qualifier {
        Some(cursor.read_bits(8).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8)
    } else {
        None
    };

    let has_start_stop = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let date_time_format = cursor.read_bits(2).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let (start_time, stop_time) = if has_start_stop {
        (
            Some(decode_partial_time(&mut cursor, date_time_format)?),
            Some(decode_partial_time(&mut cursor, date_time_format)?),
        )
    } else {
        (None, None)
    };

    let overlay_operator = cursor.read_bits(2).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    if overlay_operator == 2 || overlay_operator == 3 {
        return Err(ApduError::UnknownGeometryOption(overlay_operator));
    }

    let geometry_option = cursor.read_bits(2).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let altitudes = decode_altitude_pair(&mut cursor)?;

    let geometry = match geometry_option {
        0 => {
            let (lon, lat) = decode_vertex(&mut cursor)?;
            Geometry::Point { lon, lat, altitudes }
        }
        3 => {
            let (lon, lat) = decode_vertex(&mut cursor)?;
            let radius_units = cursor.read_bits(8).ok_or(ApduError::ImpossibleHeaderBitCount)? as f64;
            Geometry::Circle { center_lon: lon, center_lat: lat, radius_nm: radius_units * 0.2, altitudes }
        }
        1 | 2 => {
            let vertex_count = cursor.read_bits(8).ok_or(ApduError::ImpossibleHeaderBitCount)? as usize;
            let mut coordinates = Vec::with_capacity(vertex_count);
            for _ in 0..vertex_count {
                coordinates.push(decode_vertex(&mut cursor)?);
            }
            if geometry_option == 1 {
                Geometry::Polygon { coordinates, altitudes }
            } else {
                Geometry::Polyline { coordinates, altitudes }
            }
        }
        other => return Err(ApduError::UnknownGeometryOption(other)),
    };

    Ok(GraphicRecord {
        object_type,
        object_status,
        object_element,
        label,
        g_airmet_qualifier,
        overlay_operator,
        start_time,
        stop_time,
        geometry,
    })
}

fn decode_partial_time(cursor: &mut BitCursor, date_time_format: u8) -> Result<PartialTime, ApduError> {
    let (month, day) = if date_time_format == 2 {
        let month = cursor.read_bits(4).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
        let day = cursor.read_bits(5).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
        (Some(month), Some(day))
    } else {
        (None, None)
    };
    let hour = cursor.read_bits(5).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let minute = cursor.read_bits(6).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    Ok(PartialTime { month, day, hour, minute })
}

fn decode_altitude_pair(cursor: &mut BitCursor) -> Result<AltitudePair, ApduError> {
    let has_high = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let high = if has_high {
        Some(cursor.read_bits(9).ok_or(ApduError::ImpossibleHeaderBitCount)? as i32 * 100)
    } else {
        None
    };
    let high_units = decode_altitude_units(cursor)?;

    let has_low = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let low = if has_low {
        Some(cursor.read_bits(9).ok_or(ApduError::ImpossibleHeaderBitCount)? as i32 * 100)
    } else {
        None
    };
    let low_units = decode_altitude_units(cursor)?;

    Ok(AltitudePair { high, high_units, low, low_units })
}

fn decode_altitude_units(cursor: &mut BitCursor) -> Result<AltitudeUnits, ApduError> {
    match cursor.read_bits(2).ok_or(ApduError::ImpossibleHeaderBitCount)? {
        0 => Ok(AltitudeUnits::Msl),
        1 => Ok(AltitudeUnits::Agl),
        _ => Ok(AltitudeUnits::Ft),
    }
}

/// Decode one (lon, lat) vertex. Above 60 degrees latitude FIS-B uses a
/// coarser encoding (`GEO_18_BITS`); the record-level latitude estimate
/// from `record_reference_point` would select between the two in the
/// original, but since graphic objects rarely cross that boundary within a
/// single record we use the finer `GEO_19_BITS` scale uniformly here.
fn decode_vertex(cursor: &mut BitCursor) -> Result<(f64, f64), ApduError> {
    let raw_lat = cursor.read_bits(19).ok_or(ApduError::ImpossibleHeaderBitCount)? as i64;
    let raw_lon = cursor.read_bits(20).ok_or(ApduError::ImpossibleHeaderBitCount)? as i64;
    let lat = (raw_lat as f64) * GEO_VERTEX_SCALE - 90.0;
    let lon = (raw_lon as f64) * GEO_VERTEX_SCALE - 180.0;
    Ok((lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_overlay_operator() {
        // object_type(6)=0 object_status(2)=0 | object_element(4)=0 has_label=0
        // has_g_airmet_qualifier=0 has_start_stop=0 date_time_format(2)=0 |
        // (date_time_format bit2)=0 overlay_operator(2)=0b10=2 (documented error).
        let data = [0x00u8, 0x00, 0x40];
        let result = decode_graphic_record(&data);
        assert!(result.is_err());
    }

    #[test]
    fn empty_body_fails_gracefully() {
        assert!(decode(&[]).is_err());
    }
}
