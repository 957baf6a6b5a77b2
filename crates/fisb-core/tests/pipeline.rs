//! End-to-end pipeline tests: a hand-built ground-uplink packet goes in,
//! a normalized record comes out. Unit tests inside each module already
//! cover frame/apdu/reconstruct/normalize boundaries in isolation; this
//! exercises `Pipeline::ingest_packet` across all of them at once, the way
//! the teacher's `rs1090` crate pairs per-module unit tests with a small
//! number of whole-message fixtures.

use chrono::Utc;
use fisb_core::harvest::image::NullRenderer;
use fisb_core::harvest::MemoryStore;
use fisb_core::normalize::Record;
use fisb_core::{Config, Pipeline};

const PACKET_LEN: usize = 432;

/// A ground-uplink packet carrying one unsegmented product-413 (DLAC text)
/// APDU whose body decodes to the two-letter payload "AB". Bytes below are
/// hand-packed per spec §4.1/§4.2's bit layouts:
///
/// - bytes[0..8]: header, all zero except the `app_data_valid` flag bit
///   (byte 6, bit 0x20 — see `frame::tests::zeroed_packet`).
/// - bytes[8..10]: inner-frame header, 9-bit length=6 + 4-bit type=0 (APDU),
///   padded to a byte boundary.
/// - bytes[10..16]: the APDU itself: a 4-byte normalized header (product_id
///   413, s_flag=0, time_option=0, hour=0, minute=0) followed by 2 bytes of
///   DLAC-packed sextets for "AB" (`dlac::tests::decodes_plain_letters`
///   shows the same packing for "ABC").
/// - the remainder is zero, which `walk_inner_frames` reads as the
///   zero-length terminator frame.
fn packet_with_one_dlac_text_apdu() -> Vec<u8> {
    let mut data = vec![0u8; PACKET_LEN];
    data[6] = 0b0010_0000;
    data[8] = 0x03;
    data[9] = 0x00;
    data[10] = 0x06;
    data[11] = 0x74;
    data[12] = 0x00;
    data[13] = 0x00;
    data[14] = 0x04;
    data[15] = 0x20;
    data
}

#[test]
fn full_pipeline_decodes_and_harvests_one_record() {
    let mut store = MemoryStore::new();
    let mut renderer = NullRenderer;
    let mut pipeline = Pipeline::new(Config::default(), &mut store, &mut renderer);

    let records = pipeline.ingest_packet(&packet_with_one_dlac_text_apdu(), Utc::now());

    assert_eq!(records.len(), 1);
    match &records[0] {
        Record::FisbUnavailable { centers, .. } => assert!(centers.is_empty()),
        other => panic!("expected FIS_B_UNAVAILABLE, got {other:?}"),
    }
}

#[test]
fn fisb_unavailable_bypasses_the_dedup_cache() {
    // FIS_B_UNAVAILABLE is one of the always-pass types (spec §4.5): unlike
    // a repeated METAR, the same packet ingested twice is harvested both
    // times.
    let mut store = MemoryStore::new();
    let mut renderer = NullRenderer;
    let mut pipeline = Pipeline::new(Config::default(), &mut store, &mut renderer);

    let packet = packet_with_one_dlac_text_apdu();
    let now = Utc::now();
    let first = pipeline.ingest_packet(&packet, now);
    let second = pipeline.ingest_packet(&packet, now);

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
}

#[test]
fn empty_packet_round_trips_with_no_records() {
    let mut store = MemoryStore::new();
    let mut renderer = NullRenderer;
    let mut pipeline = Pipeline::new(Config::default(), &mut store, &mut renderer);

    let mut data = vec![0u8; PACKET_LEN];
    data[6] = 0b0010_0000;

    let records = pipeline.ingest_packet(&data, Utc::now());
    assert!(records.is_empty());

    let maintenance = pipeline.run_maintenance(Utc::now());
    assert!(maintenance.is_empty());
}

#[test]
fn malformed_packet_length_is_dropped_without_panicking() {
    let mut store = MemoryStore::new();
    let mut renderer = NullRenderer;
    let mut pipeline = Pipeline::new(Config::default(), &mut store, &mut renderer);

    assert!(pipeline.ingest_packet(&[0u8; 16], Utc::now()).is_empty());
}

#[test]
fn parse_line_then_ingest_matches_ingest_line() {
    let mut store = MemoryStore::new();
    let mut renderer = NullRenderer;
    let mut pipeline = Pipeline::new(Config::default(), &mut store, &mut renderer);

    let line = format!("+{};t=1718085420.5", hex::encode(packet_with_one_dlac_text_apdu()));
    let records = pipeline.ingest_line(&line);
    assert_eq!(records.len(), 1);
}
