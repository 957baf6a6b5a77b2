//! Image-tile lifecycle (spec §3 "Image-tile state", §4.7 "Harvester and
//! image lifecycle"): latency window, quiet-period rendering, and
//! revert-to-no-data, one [`ImageState`] per product type.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::RenderError;
use crate::geo::{BBox, ScaleFactor};

/// Per-product colour/bit-function selector (spec §4.4 "Colour/bit-function
/// selection"). The actual RGBA tables belong to whatever `Renderer` is
/// plugged in; this crate only picks which one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMap {
    Radar,
    Turbulence,
    CloudTops,
    Lightning,
    IcingSld,
    IcingSeverity,
    IcingProbability,
}

pub type BinsDict = HashMap<i64, (Vec<u8>, DateTime<Utc>)>;

pub trait Renderer {
    fn render(
        &mut self,
        filename: &str,
        bins: &BinsDict,
        scale_factor: ScaleFactor,
        map_fn: ColorMap,
    ) -> Result<BBox, RenderError>;
}

/// No-op `Renderer`: computes a bbox spanning the supplied bins without
/// writing a tile file, so the CLI and tests run without an image backend
/// (spec §6 "Non-goals: raster tile rendering").
#[derive(Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(
        &mut self,
        _filename: &str,
        bins: &BinsDict,
        scale_factor: ScaleFactor,
        _map_fn: ColorMap,
    ) -> Result<BBox, RenderError> {
        let mut west = 180.0_f64;
        let mut east = -180.0_f64;
        let mut south = 90.0_f64;
        let mut north = -90.0_f64;
        for alt_bn in bins.keys() {
            let row = alt_bn / 1000;
            let col = alt_bn % 1000;
            let bbox = crate::geo::bbox_for_block(row as u32, col as u32, scale_factor);
            west = west.min(bbox.west);
            east = east.max(bbox.east);
            south = south.min(bbox.south);
            north = north.max(bbox.north);
        }
        if bins.is_empty() {
            return Ok(BBox { west: 0.0, south: 0.0, east: 0.0, north: 0.0 });
        }
        Ok(BBox { west, south, east, north })
    }
}

/// Lifecycle state for one imagery product (spec §3 "Image-tile state").
pub struct ImageState {
    pub product: String,
    pub scale_factor: ScaleFactor,
    pub color_map: ColorMap,
    pub obs_or_valid: String,
    /// 0 means "no latency permitted" (e.g. most image products);
    /// non-NEXRAD/lightning products that do allow bin-age drift set this.
    pub max_latency: Duration,
    pub revert_to_no_data: Duration,
    pub bins: BinsDict,
    pub newest_official_ts: Option<DateTime<Utc>>,
    pub oldest_official_ts: Option<DateTime<Utc>>,
    pub last_changed_ts: Option<DateTime<Utc>>,
    pub file_creation_ts: Option<DateTime<Utc>>,
}

impl ImageState {
    pub fn new(
        product: String,
        scale_factor: ScaleFactor,
        color_map: ColorMap,
        obs_or_valid: String,
        max_latency: Duration,
        revert_to_no_data: Duration,
    ) -> Self {
        ImageState {
            product,
            scale_factor,
            color_map,
            obs_or_valid,
            max_latency,
            revert_to_no_data,
            bins: HashMap::new(),
            newest_official_ts: None,
            oldest_official_ts: None,
            last_changed_ts: None,
            file_creation_ts: None,
        }
    }

    /// Ingest one decoded block record (spec §4.7 "Image lifecycle
    /// (blocks)").
    pub fn ingest_block(&mut self, alt_bn: i64, bytes: Vec<u8>, official_ts: DateTime<Utc>, now: DateTime<Utc>) {
        let is_newer = match self.newest_official_ts {
            Some(newest) => official_ts > newest,
            None => true,
        };

        if is_newer && self.max_latency.is_zero() {
            self.bins.clear();
        }

        if let Some((existing_bytes, existing_ts)) = self.bins.get(&alt_bn) {
            if *existing_bytes == bytes && *existing_ts == official_ts {
                return;
            }
        }

        self.bins.insert(alt_bn, (bytes, official_ts));
        self.last_changed_ts = Some(now);
        if is_newer {
            self.newest_official_ts = Some(official_ts);
        }
    }

    /// Periodic maintenance (spec §4.7 "Periodic maintenance"). Returns
    /// `true` if the product's image files should be deleted and its
    /// state reset because no bins remain.
    pub fn expire_bins(&mut self, now: DateTime<Utc>) -> bool {
        let newest = match self.newest_official_ts {
            Some(ts) => ts,
            None => return false,
        };

        let before = self.bins.len();
        self.bins.retain(|_, (_, ts)| {
            let age_vs_newest = newest - *ts;
            let age_vs_wall = now - *ts;
            let latency_ok = self.max_latency.is_zero() || age_vs_newest < self.max_latency;
            let fresh_enough = age_vs_wall < self.revert_to_no_data;
            latency_ok && fresh_enough
        });

        if self.bins.len() != before {
            self.last_changed_ts = Some(now);
        }

        if self.bins.is_empty() {
            self.newest_official_ts = None;
            self.oldest_official_ts = None;
            self.last_changed_ts = None;
            self.file_creation_ts = None;
            return true;
        }

        self.oldest_official_ts = self.bins.values().map(|(_, ts)| *ts).min();
        false
    }

    /// Whether a quiet period has elapsed since the last change and no
    /// render has been emitted since (spec §4.7 "File creation is
    /// suppressed until last_changed_ts is older than the quiet threshold
    /// and later than file_creation_ts").
    pub fn should_render(&self, now: DateTime<Utc>, quiet_period: Duration) -> bool {
        let Some(last_changed) = self.last_changed_ts else { return false };
        if now - last_changed < quiet_period {
            return false;
        }
        match self.file_creation_ts {
            Some(created) => last_changed > created,
            None => true,
        }
    }

    pub fn mark_rendered(&mut self, now: DateTime<Utc>) {
        self.file_creation_ts = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state() -> ImageState {
        ImageState::new(
            "NEXRAD_REGIONAL".to_string(),
            ScaleFactor::High,
            ColorMap::Radar,
            "obs".to_string(),
            Duration::minutes(15),
            Duration::minutes(75),
        )
    }

    #[test]
    fn newer_bin_without_latency_purges_old_bins() {
        let mut s = state();
        s.max_latency = Duration::zero();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        s.ingest_block(1000, vec![1, 2, 3], t0, t0);
        assert_eq!(s.bins.len(), 1);

        let t1 = t0 + Duration::minutes(10);
        s.ingest_block(2000, vec![4, 5, 6], t1, t1);
        assert_eq!(s.bins.len(), 1);
        assert!(s.bins.contains_key(&2000));
    }

    #[test]
    fn expire_bins_drops_stale_by_wall_clock() {
        let mut s = state();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        s.ingest_block(1000, vec![1], t0, t0);
        let reset = s.expire_bins(t0 + Duration::minutes(100));
        assert!(reset);
        assert!(s.bins.is_empty());
    }

    #[test]
    fn should_render_waits_for_quiet_period() {
        let mut s = state();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        s.ingest_block(1000, vec![1], t0, t0);
        assert!(!s.should_render(t0 + Duration::seconds(5), Duration::seconds(10)));
        assert!(s.should_render(t0 + Duration::seconds(15), Duration::seconds(10)));
    }
}
