//! Wires frame -> apdu -> reconstruct -> normalize -> dedup -> harvest into
//! one ingest path (spec §2 "System overview", §5 "Concurrency & resource
//! model"). The CLI's composed `pipeline` stage and its per-stage
//! subcommands both build on the pieces assembled here.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::apdu::{self, global_block::ImageProduct, Apdu, ApduPayload};
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::error::{ApduError, FrameError, NormalizeError, ReconstructError, StoreError};
use crate::frame::{self, Frame};
use crate::geo::ScaleFactor;
use crate::harvest::image::{ColorMap, ImageState, Renderer};
use crate::harvest::{Harvester, Store};
use crate::normalize::{self, Record};
use crate::reconstruct::{Desegmenter, TwgoMatcher};
use crate::rsr::RsrAccumulator;

pub struct Pipeline<'a> {
    pub config: Config,
    desegmenter: Desegmenter,
    matcher: TwgoMatcher,
    dedup: Deduplicator,
    harvester: Harvester,
    store: &'a mut dyn Store,
    renderer: &'a mut dyn Renderer,
    images: std::collections::HashMap<&'static str, ImageState>,
    rsr: RsrAccumulator,
}

fn image_product_name(product: ImageProduct) -> &'static str {
    match product {
        ImageProduct::NexradRegional => "NEXRAD_REGIONAL",
        ImageProduct::NexradConus => "NEXRAD_CONUS",
        ImageProduct::Turbulence => "TURBULENCE",
        ImageProduct::Icing => "ICING",
        ImageProduct::CloudTops => "CLOUDTOPS",
        ImageProduct::Lightning => "LIGHTNING",
    }
}

fn image_color_map(product: ImageProduct) -> ColorMap {
    match product {
        ImageProduct::NexradRegional | ImageProduct::NexradConus => ColorMap::Radar,
        ImageProduct::Turbulence => ColorMap::Turbulence,
        ImageProduct::Icing => ColorMap::IcingSeverity,
        ImageProduct::CloudTops => ColorMap::CloudTops,
        ImageProduct::Lightning => ColorMap::Lightning,
    }
}

/// NEXRAD and lightning tolerate bin-age drift (spec §3 "max_latency_time =
/// 0 (non-NEXRAD/lightning)"); every other image product purges on a newer
/// frame instead.
fn image_max_latency(product: ImageProduct) -> Duration {
    match product {
        ImageProduct::NexradRegional | ImageProduct::NexradConus | ImageProduct::Lightning => Duration::minutes(15),
        _ => Duration::zero(),
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(config: Config, store: &'a mut dyn Store, renderer: &'a mut dyn Renderer) -> Self {
        Pipeline {
            config,
            desegmenter: Desegmenter::new(),
            matcher: TwgoMatcher::new(),
            dedup: Deduplicator::new(),
            harvester: Harvester::new(),
            store,
            renderer,
            images: std::collections::HashMap::new(),
            rsr: RsrAccumulator::new(),
        }
    }

    /// Parse a demodulator line (spec §6 "Input line format"): `+<hex>;t=<epoch>`,
    /// lines starting with `#` or `-` or empty lines are ignored (returns
    /// `Ok(None)`).
    pub fn parse_line(line: &str) -> Option<(Vec<u8>, f64)> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            return None;
        }
        let body = line.strip_prefix('+')?;
        let (hex_part, tail) = body.split_once(';')?;
        let epoch = tail
            .split(';')
            .find_map(|field| field.strip_prefix("t="))
            .and_then(|s| s.parse::<f64>().ok())?;
        let bytes = hex_decode(hex_part)?;
        Some((bytes, epoch))
    }

    /// Run one ground-uplink packet through the entire pipeline, returning
    /// every record admitted for emission (already upserted into the
    /// store), in arrival order (spec §5 "Ordering is preserved").
    pub fn ingest_line(&mut self, line: &str) -> Vec<Record> {
        let Some((bytes, epoch)) = Self::parse_line(line) else {
            return Vec::new();
        };
        let reception_time = crate::time::epoch_to_instant(epoch);
        self.ingest_packet(&bytes, reception_time)
    }

    pub fn ingest_packet(&mut self, data: &[u8], reception_time: DateTime<Utc>) -> Vec<Record> {
        let packet = match frame::decode_packet(data, reception_time.timestamp_millis()) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "dropping malformed packet");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        if self.config.calculate_rsr {
            if let Some(record) = self.rsr.ingest(
                &packet.station,
                packet.tisb_site_id,
                reception_time,
                self.config.rsr_window_seconds,
                self.config.rsr_stride_seconds,
            ) {
                out.extend(self.finish(Ok(record)));
            }
        }
        for f in packet.frames {
            out.extend(self.ingest_frame(f, &packet.station, reception_time));
        }
        out
    }

    fn ingest_frame(&mut self, f: Frame, station: &str, reception_time: DateTime<Utc>) -> Vec<Record> {
        match f {
            Frame::Apdu { payload, .. } => self.ingest_apdu_bytes(&payload, reception_time),
            Frame::Crl { payload, .. } => self.ingest_crl_bytes(&payload, station, reception_time),
            Frame::ServiceStatus { payload, .. } => self.ingest_service_status_bytes(&payload, station, reception_time),
            Frame::Reserved { frame_type, .. } => {
                debug!(frame_type, "ignoring reserved frame");
                Vec::new()
            }
        }
    }

    fn ingest_apdu_bytes(&mut self, payload: &[u8], reception_time: DateTime<Utc>) -> Vec<Record> {
        let apdu = match apdu::decode_apdu(payload) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "dropping malformed apdu");
                return Vec::new();
            }
        };
        self.ingest_apdu(apdu, reception_time)
    }

    fn ingest_apdu(&mut self, apdu: Apdu, reception_time: DateTime<Utc>) -> Vec<Record> {
        let product_id = apdu.header.product_id;
        let reassembled = match self.desegmenter.ingest(apdu, reception_time) {
            Ok(Some(a)) => a,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "dropping unreassemblable apdu");
                return Vec::new();
            }
        };

        match &reassembled.payload {
            ApduPayload::DlacText { text } => self
                .finish(normalize::normalize_dlac_text(text, reception_time, &self.config))
                .into_iter()
                .collect(),
            ApduPayload::Twgo(object) => {
                let referencing_month = reassembled.header.month.unwrap_or(0);
                match self.matcher.ingest(product_id, referencing_month, object.clone(), reception_time) {
                    Some(matched) => {
                        let merged = crate::apdu::twgo::TwgoObject {
                            record_format: object.record_format,
                            location: matched.key.location.clone(),
                            record_reference_point: object.record_reference_point,
                            text_records: matched.text.into_iter().collect(),
                            graphic_records: matched.graphics,
                        };
                        self.finish(normalize::normalize_twgo(product_id, &merged, reception_time, &self.config))
                            .into_iter()
                            .collect()
                    }
                    None => Vec::new(),
                }
            }
            ApduPayload::GlobalBlock(block) => self.ingest_global_block(block.clone(), reception_time),
            ApduPayload::Segment { .. } => Vec::new(),
        }
    }

    /// Ingest one global-block image APDU (spec §4.7 "Image lifecycle
    /// (blocks)", §8 scenario 5): feeds the product's [`ImageState`] for
    /// later latency/quiet-period maintenance, and immediately emits one
    /// `IMAGE` record per affected alternate block number, each carrying
    /// that block's own bins/bbox (spec §6 "image records carry `bins` as
    /// a fixed-length byte sequence per block plus `alt_bn` and
    /// `scale_factor`").
    fn ingest_global_block(&mut self, block: crate::apdu::global_block::GlobalBlock, reception_time: DateTime<Utc>) -> Vec<Record> {
        let name = image_product_name(block.product);
        let obs_or_valid = "observation".to_string();
        let revert_to_no_data = Duration::minutes(75);
        let scale_factor = block.scale_factor;
        let state = self.images.entry(name).or_insert_with(|| {
            ImageState::new(
                name.to_string(),
                scale_factor,
                image_color_map(block.product),
                obs_or_valid.clone(),
                image_max_latency(block.product),
                revert_to_no_data,
            )
        });

        let (row, col) = crate::geo::block_row_col(block.block_number, block.scale_factor);

        // Above 60N a single transmitted (even) column covers two tile
        // columns via pixel doubling (spec §4.7, §8 "Above-60 blocks yield
        // two alternate block numbers per input block").
        let lat_band = crate::geo::bbox_for_block(row, col, block.scale_factor).south;
        let alt_bns: Vec<i64> = if lat_band >= 60.0 {
            let (left, right) = crate::geo::above_60_split(row, col);
            vec![left as i64, right as i64]
        } else {
            vec![crate::geo::alternate_block_number(row, col) as i64]
        };

        let mut out = Vec::new();
        let expiration_time = reception_time + revert_to_no_data;

        if let Some(bins) = &block.bins {
            for alt_bn in &alt_bns {
                state.ingest_block(*alt_bn, bins.clone(), reception_time, reception_time);
                out.push(build_image_record(
                    name,
                    *alt_bn,
                    block.scale_factor,
                    &obs_or_valid,
                    Some(bins.clone()),
                    reception_time,
                    expiration_time,
                ));
            }
        } else if let Some(empty_flags) = &block.empty_blocks {
            // Empty-block bitmaps above 60N would need doubled offsets too;
            // not observed on the live feed, so the first half-tile's
            // numbering is used for the whole run (see DESIGN.md).
            let base = alt_bns[0];
            for (i, empty) in empty_flags.iter().enumerate() {
                if *empty {
                    let alt_bn = base + i as i64;
                    state.ingest_block(alt_bn, Vec::new(), reception_time, reception_time);
                    out.push(build_image_record(
                        name,
                        alt_bn,
                        block.scale_factor,
                        &obs_or_valid,
                        None,
                        reception_time,
                        expiration_time,
                    ));
                }
            }
        }

        out.into_iter().filter_map(|r| self.finish(Ok(r))).collect()
    }
}

fn build_image_record(
    product: &str,
    alt_bn: i64,
    scale_factor: ScaleFactor,
    obs_or_valid: &str,
    bins: Option<Vec<u8>>,
    event_time: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
) -> Record {
    let row = (alt_bn / 1000) as u32;
    let col = (alt_bn % 1000) as u32;
    let bbox = crate::geo::bbox_for_block(row, col, scale_factor);
    Record::Image {
        unique_name: format!("{product}-{}-{alt_bn}", crate::time::format_instant(event_time)),
        insert_time: crate::time::format_instant(event_time),
        expiration_time: crate::time::format_instant(expiration_time),
        product: product.to_string(),
        event_time: crate::time::format_instant(event_time),
        alternate_block_number: alt_bn,
        scale_factor,
        obs_or_valid: obs_or_valid.to_string(),
        bins: bins.map(hex::encode),
        bbox: (bbox.west, bbox.south, bbox.east, bbox.north),
    }
}

impl<'a> Pipeline<'a> {
    fn ingest_crl_bytes(&mut self, payload: &[u8], station: &str, reception_time: DateTime<Utc>) -> Vec<Record> {
        match crate::apdu::crl::decode(payload) {
            Ok(crl) => {
                let mut record = normalize::normalize_crl(&crl, station, reception_time);
                if self.config.annotate_crl_reports {
                    if let Record::Crl { entries, .. } = &mut record {
                        let product_type = crl_product_type_name(crl.product_id);
                        let _ = self.harvester.annotate_crl_completeness(self.store, product_type, entries);
                    }
                }
                self.finish(Ok(record)).into_iter().collect()
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed crl frame");
                Vec::new()
            }
        }
    }

    fn ingest_service_status_bytes(&mut self, payload: &[u8], station: &str, reception_time: DateTime<Utc>) -> Vec<Record> {
        match crate::apdu::service_status::decode(payload) {
            Ok(status) => self
                .finish(Ok(normalize::normalize_service_status(&status, station, reception_time)))
                .into_iter()
                .collect(),
            Err(e) => {
                warn!(error = %e, "dropping malformed service-status frame");
                Vec::new()
            }
        }
    }

    fn finish(&mut self, result: Result<Record, NormalizeError>) -> Option<Record> {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "dropping unnormalizable record");
                return None;
            }
        };

        if !self.dedup.admit(&record, Utc::now()) {
            return None;
        }

        if let Err(e) = self.harvester.upsert(self.store, &record) {
            warn!(error = %e, "store upsert failed");
            return None;
        }

        Some(record)
    }

    /// Periodic maintenance tick (spec §4.7 "Periodic maintenance", §4.5
    /// "Periodic sweep", §4.3 eviction rules).
    pub fn run_maintenance(&mut self, now: DateTime<Utc>) -> Vec<Record> {
        self.desegmenter.evict(now, self.config.segment_expire);
        self.matcher.evict(now, self.config.twgo_expire);
        self.dedup.expunge(now, self.config.dedup_expire_msg_time);
        if self.config.expire_messages {
            if let Err(e) = self.harvester.expire(self.store, now) {
                warn!(error = %e, "expiration sweep failed");
            }
        }

        if self.config.process_images {
            self.run_image_maintenance(now)
        } else {
            Vec::new()
        }
    }

    /// Image-tile lifecycle advancement (spec §4.7 "Periodic maintenance"):
    /// drop bins past their latency/revert-to-no-data window, drop a
    /// product entirely once it has no surviving bins, and invoke the
    /// renderer once a quiet period has elapsed since the last change.
    fn run_image_maintenance(&mut self, now: DateTime<Utc>) -> Vec<Record> {
        let quiet_period = Duration::seconds(self.config.quiet_image_seconds as i64);
        let mut emptied = Vec::new();

        for (name, state) in self.images.iter_mut() {
            if state.expire_bins(now) {
                emptied.push(*name);
                continue;
            }

            if !state.should_render(now, quiet_period) {
                continue;
            }

            let filename = format!("{}/{}.tif", self.config.image_directory, name);
            match self.renderer.render(&filename, &state.bins, state.scale_factor, state.color_map) {
                Ok(_bbox) => state.mark_rendered(now),
                Err(e) => warn!(error = %e, product = *name, "image render failed"),
            }
        }

        for name in emptied {
            self.images.remove(name);
        }

        Vec::new()
    }
}

fn crl_product_type_name(product_id: u16) -> &'static str {
    match normalize::twgo_family(product_id) {
        normalize::TwgoFamily::NotamTfr => "NOTAM_TFR",
        normalize::TwgoFamily::Airmet | normalize::TwgoFamily::Sigmet | normalize::TwgoFamily::Cwa => "SIGWX",
        normalize::TwgoFamily::Notam => "NOTAM",
        normalize::TwgoFamily::GAirmet => "G_AIRMET",
        normalize::TwgoFamily::Sua => "SUA",
    }
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::image::NullRenderer;
    use crate::harvest::MemoryStore;

    #[test]
    fn parse_line_ignores_comments_and_uat() {
        assert!(Pipeline::parse_line("# comment").is_none());
        assert!(Pipeline::parse_line("-8d3abc...").is_none());
        assert!(Pipeline::parse_line("").is_none());
    }

    #[test]
    fn parse_line_extracts_hex_and_epoch() {
        let (bytes, epoch) = Pipeline::parse_line("+00ff;t=1718085420.5").unwrap();
        assert_eq!(bytes, vec![0x00, 0xFF]);
        assert_eq!(epoch, 1718085420.5);
    }

    #[test]
    fn malformed_packet_is_dropped_without_panic() {
        let mut store = MemoryStore::new();
        let mut renderer = NullRenderer;
        let mut pipeline = Pipeline::new(Config::default(), &mut store, &mut renderer);
        let records = pipeline.ingest_packet(&[0u8; 4], Utc::now());
        assert!(records.is_empty());
    }
}
