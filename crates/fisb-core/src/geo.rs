//! Geodesic and raster-grid helpers: ground-uplink station position
//! decoding, great-circle distance (used by nothing in the core pipeline
//! today but kept alongside the other geo helpers the way the teacher
//! keeps `cpr::haversine` beside its CPR decode), and the alternate
//! block-number / bounding-box math for imagery tiles.

use std::f64::consts::PI;

/// Degrees per raw count for the ground-uplink header's 24-bit fixed-point
/// lat/lon fields (spec §4.1: "fixed-point 360/2^24").
const GEO_24_BITS: f64 = 360.0 / (1u32 << 24) as f64;

/// Degrees per raw count for TWGO graphic-record vertices (19-bit
/// latitude / 20-bit longitude fields, spec §3 "Geometry"), matching the
/// finer `GEO_19_BITS` scale used below 60 degrees latitude.
pub const GEO_VERTEX_SCALE: f64 = 180.0 / (1u32 << 20) as f64;

/// Decode a ground-uplink header's raw lat/lon pair into decimal degrees.
/// Neither field is two's-complement: `raw_lat` is a 23-bit and `raw_lon` a
/// 24-bit *unsigned* count of the same angular unit (`GEO_24_BITS`), so a
/// 23-bit latitude naturally spans 0..180 where a 24-bit longitude spans
/// 0..360; both wrap into their canonical signed range by subtracting a
/// half-turn/full-turn once the unsigned angle exceeds it.
pub fn decode_station_position(raw_lat: u32, raw_lon: u32) -> (f64, f64) {
    (
        wrap_latitude(raw_lat as f64 * GEO_24_BITS),
        wrap_longitude(raw_lon as f64 * GEO_24_BITS),
    )
}

fn wrap_latitude(lat: f64) -> f64 {
    let mut lat = lat;
    if lat > 90.0 {
        lat -= 180.0;
    }
    truncate6(lat)
}

fn wrap_longitude(lon: f64) -> f64 {
    let mut lon = lon;
    if lon > 180.0 {
        lon -= 360.0;
    }
    truncate6(lon)
}

fn truncate6(value: f64) -> f64 {
    (value * 1_000_000.0).trunc() / 1_000_000.0
}

/// Great-circle distance in nautical miles.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_NM: f64 = 3440.065;
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_NM * a.sqrt().asin().min(PI)
}

/// Image tile raster scale, see spec §3 "GlobalBlock" / §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFactor {
    High,
    Medium,
    Low,
}

impl ScaleFactor {
    /// `(blockOffset, divisor, divFactor)` used by the alternate-block-number
    /// conversion (spec §3 "Alternate block number"): high blocks need no
    /// adjustment, medium and low blocks are offset and their column
    /// compressed by a scale-specific divisor before being combined into
    /// `row*1000 + col`.
    fn alt_block_params(self) -> (u32, u32, u32) {
        match self {
            ScaleFactor::High => (0, 450, 1),
            ScaleFactor::Medium => (1800, 2250, 5),
            ScaleFactor::Low => (3600, 4050, 9),
        }
    }

    /// `(res_lat_minutes, res_long_minutes, row_width)` used by the bbox
    /// pixel math below: latitude/longitude minutes of arc per raw pixel,
    /// and the number of 32-pixel-wide columns in one row at this scale.
    fn res(self) -> (f64, f64, u32) {
        match self {
            ScaleFactor::High => (1.0, 1.5, 450),
            ScaleFactor::Medium => (5.0, 7.5, 90),
            ScaleFactor::Low => (9.0, 13.5, 50),
        }
    }
}

/// A geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Split a raw FIS-B block number into (row, column), using the
/// scale-dependent offset/divisor/column-compression of the alternate
/// block number conversion (spec §3 "Alternate block number"). Only `High`
/// divides evenly by its row width; `Medium` and `Low` are first offset,
/// then their column compressed by a scale-specific factor.
pub fn block_row_col(block_number: u32, scale: ScaleFactor) -> (u32, u32) {
    let (offset, divisor, div_factor) = scale.alt_block_params();
    let adjusted = block_number.saturating_sub(offset);
    let row = adjusted / divisor;
    let col = (adjusted % divisor) / div_factor;
    (row, col)
}

/// Combine (row, column) into the alternate block number `row*1000 + col`.
pub fn alternate_block_number(row: u32, col: u32) -> u32 {
    row * 1000 + col
}

/// Above 60 degrees latitude only even columns are transmitted and each
/// covers what would otherwise be two columns; spec §8 "Above-60 blocks
/// yield two alternate block numbers per input block." This returns both
/// half-tile alternate block numbers for a block at or above 60N.
pub fn above_60_split(row: u32, col: u32) -> (u32, u32) {
    let left = alternate_block_number(row, col);
    let right = alternate_block_number(row, col + 1);
    (left, right)
}

/// Compute the bounding box for a (row, col) tile at the given scale,
/// measuring latitude in 4-pixel rows from the equator and longitude in
/// 32-pixel columns from the prime meridian (spec §3 "Alternate block
/// number", §4.7 "Block bbox computed from (row, col, scale)").
pub fn bbox_for_block(row: u32, col: u32, scale: ScaleFactor) -> BBox {
    let (res_lat_min, res_long_min, row_width) = scale.res();

    let p_long_west = (row_width as f64 - col as f64) * 32.0;
    let p_long_east = p_long_west - 32.0;
    let p_lat_north = (row as f64 + 1.0) * 4.0;
    let p_lat_south = p_lat_north - 4.0;

    BBox {
        west: truncate6(-(p_long_west * res_long_min) / 60.0),
        south: truncate6((p_lat_south * res_lat_min) / 60.0),
        east: truncate6(-(p_long_east * res_long_min) / 60.0),
        north: truncate6((p_lat_north * res_lat_min) / 60.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_position_round_trip_zero() {
        let (lat, lon) = decode_station_position(0, 0);
        assert_eq!(lat, 0.0);
        assert_eq!(lon, 0.0);
    }

    #[test]
    fn alternate_block_number_rule() {
        let (row, col) = block_row_col(276_640, ScaleFactor::High);
        assert_eq!((row, col), (614, 340));
        let alt = alternate_block_number(row, col);
        assert_eq!(alt, row * 1000 + col);
    }

    #[test]
    fn bbox_matches_high_resolution_scenario() {
        // spec §8 scenario 5: block_number=276640, scale=high.
        let (row, col) = block_row_col(276_640, ScaleFactor::High);
        let bbox = bbox_for_block(row, col, ScaleFactor::High);
        assert_eq!(bbox.north, 41.0);
        assert!((bbox.south - 40.933333).abs() < 1e-6);
        assert_eq!(bbox.west, -88.0);
        assert!((bbox.east - -87.2).abs() < 1e-6);
    }

    #[test]
    fn medium_scale_block_row_col_uses_scale_offset() {
        // scale_factor=1 (medium): blockOffset=1800, divisor=2250, divFactor=5.
        let (row, col) = block_row_col(1800 + 2250 * 3 + 25, ScaleFactor::Medium);
        assert_eq!((row, col), (3, 5));
    }

    #[test]
    fn haversine_same_point_is_zero() {
        assert_eq!(haversine_nm(40.0, -100.0, 40.0, -100.0), 0.0);
    }
}
