//! The 8-byte ground-uplink header (spec §4.1).

use deku::prelude::*;

use crate::geo::decode_station_position;

/// 64-bit fixed-point/flag header preceding a ground-uplink packet's inner
/// frames. Laid out MSB-first: 23-bit lat, 24-bit lon (the lat/lon boundary
/// falls at bit 0 of byte 2, not on a byte boundary), then the flag/id
/// fields packed into the final 16 bits: `position_valid` (byte 5 LSB),
/// `utc_coupled`/reserved/`app_data_valid`/`slot_id` (byte 6), and
/// `tisb_site_id`/reserved (byte 7).
#[derive(Debug, Clone, PartialEq, DekuRead)]
#[deku(endian = "big")]
pub struct GroundUplinkHeaderRaw {
    #[deku(bits = 23)]
    pub raw_lat: u32,
    #[deku(bits = 24)]
    pub raw_lon: u32,
    /// Ignored downstream; retained per spec §9 Open Questions.
    #[deku(bits = 1)]
    pub position_valid: u8,
    #[deku(bits = 1)]
    pub utc_coupled: u8,
    #[deku(bits = 1)]
    pub reserved_6: u8,
    #[deku(bits = 1)]
    pub app_data_valid: u8,
    #[deku(bits = 5)]
    pub slot_id: u8,
    #[deku(bits = 4)]
    pub tisb_site_id: u8,
    #[deku(bits = 4)]
    pub reserved_7: u8,
}

/// Decoded, human-usable form of [`GroundUplinkHeaderRaw`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GroundUplinkHeader {
    pub station_lat: f64,
    pub station_lon: f64,
    pub station: String,
    pub app_data_valid: bool,
    pub utc_coupled: bool,
    pub slot_id: u16,
    pub transmission_time_slot: u16,
    pub mso: u32,
    pub tisb_site_id: u8,
}

impl From<GroundUplinkHeaderRaw> for GroundUplinkHeader {
    fn from(raw: GroundUplinkHeaderRaw) -> Self {
        let (station_lat, station_lon) = decode_station_position(raw.raw_lat, raw.raw_lon);
        GroundUplinkHeader {
            station_lat,
            station_lon,
            station: create_station_name(station_lat, station_lon),
            app_data_valid: raw.app_data_valid != 0,
            utc_coupled: raw.utc_coupled != 0,
            slot_id: raw.slot_id as u16,
            transmission_time_slot: raw.slot_id as u16 + 1,
            mso: raw.slot_id as u32 * 22,
            tisb_site_id: raw.tisb_site_id,
        }
    }
}

/// Build a stable station identity string from its decoded position, the
/// way the original derives a human-readable station key from lat/lon
/// rather than an opaque ground-station id: latitude and longitude (each
/// already truncated to 6 decimal places), joined with `~`, each formatted
/// the way Python's `str()` renders a float (trailing zeros dropped, but at
/// least one digit after the decimal point).
pub fn create_station_name(lat: f64, lon: f64) -> String {
    format!("{}~{}", python_float_str(lat), python_float_str(lon))
}

fn python_float_str(value: f64) -> String {
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

/// Expected packets/second for a given `tisb_site_id` tier, used by the RSR
/// accumulator (spec §4.1). Values follow the FAA's published TIS-B site
/// tier table; unrecognized tiers fall back to the lowest rate.
pub fn expected_packets_per_second(tisb_site_id: u8) -> f64 {
    match tisb_site_id {
        0 => 2.133,
        1 => 1.067,
        2 => 0.533,
        8 => 2.133,
        9 => 1.067,
        _ => 0.533,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_zeroed_header() {
        let raw = GroundUplinkHeaderRaw::try_from([0u8; 8].as_slice()).unwrap();
        let header: GroundUplinkHeader = raw.into();
        assert_eq!(header.station_lat, 0.0);
        assert_eq!(header.station_lon, 0.0);
        assert!(!header.app_data_valid);
        assert_eq!(header.transmission_time_slot, 1);
        assert_eq!(header.mso, 0);
    }
}
