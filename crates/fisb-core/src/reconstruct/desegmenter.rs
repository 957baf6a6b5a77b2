//! Multi-APDU TWGO desegmentation (spec §4.3 "Desegmenter").

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::apdu::{self, Apdu, ApduHeader, ApduPayload};
use crate::error::ReconstructError;

/// The first 6 bytes of a reassembled TWGO payload are that segment's own
/// TWGO header (record_format/location/reference point); every segment
/// after the first repeats it, and it must be stripped before
/// concatenation (spec §4.3).
const TWGO_HEADER_BYTES: usize = 6;

struct Pending {
    product_id: u16,
    header_template: ApduHeader,
    slots: Vec<Option<Vec<u8>>>,
    have: usize,
    last_update: DateTime<Utc>,
}

/// Reassembles segmented TWGO APDUs keyed by `(product_id, product_file_id)`.
#[derive(Default)]
pub struct Desegmenter {
    pending: HashMap<(u16, u16), Pending>,
}

impl Desegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded APDU through the desegmenter. Returns `Ok(Some(apdu))`
    /// immediately for anything that isn't a segment; for segments, returns
    /// `Ok(None)` while incomplete and `Ok(Some(reconstructed))` exactly when
    /// the final segment arrives.
    pub fn ingest(&mut self, apdu: Apdu, now: DateTime<Utc>) -> Result<Option<Apdu>, ReconstructError> {
        let ApduPayload::Segment { raw } = &apdu.payload else {
            return Ok(Some(apdu));
        };

        let product_id = apdu.header.product_id;
        let product_file_id = apdu.header.product_file_id.unwrap_or(0);
        let product_file_length = apdu.header.product_file_length.unwrap_or(0) as usize;
        let apdu_number = apdu.header.apdu_number.unwrap_or(0) as usize;

        if apdu_number == 0 || apdu_number > product_file_length {
            return Err(ReconstructError::SegmentIndexOutOfBounds {
                slot: apdu_number as i64 - 1,
                len: product_file_length,
            });
        }
        let slot = apdu_number - 1;

        let entry = self.pending.entry((product_id, product_file_id)).or_insert_with(|| Pending {
            product_id,
            header_template: apdu.header.clone(),
            slots: vec![None; product_file_length],
            have: 0,
            last_update: now,
        });

        if slot >= entry.slots.len() {
            return Err(ReconstructError::SegmentIndexOutOfBounds { slot: slot as i64, len: entry.slots.len() });
        }

        entry.last_update = now;
        if entry.slots[slot].is_none() {
            entry.slots[slot] = Some(raw.clone());
            entry.have += 1;
        }

        if entry.have < entry.slots.len() {
            return Ok(None);
        }

        let Pending { header_template, slots, .. } = self.pending.remove(&(product_id, product_file_id)).unwrap();

        let mut concatenated = Vec::new();
        for (i, segment) in slots.into_iter().enumerate() {
            let segment = segment.expect("completion implies all slots filled");
            if i == 0 {
                concatenated.extend(segment);
            } else if segment.len() > TWGO_HEADER_BYTES {
                concatenated.extend(&segment[TWGO_HEADER_BYTES..]);
            }
        }

        let payload = apdu::decode_payload(product_id, &concatenated)
            .map_err(|e| ReconstructError::ReassemblyDecodeFailed(e.to_string()))?;

        let mut header = header_template;
        header.s_flag = false;
        header.product_file_id = None;
        header.product_file_length = None;
        header.apdu_number = None;

        Ok(Some(Apdu { header, payload }))
    }

    /// Drop any pending reassembly whose last update is older than
    /// `segment_expire` minutes (spec §4.3 eviction rule).
    pub fn evict(&mut self, now: DateTime<Utc>, segment_expire_minutes: i64) {
        self.pending.retain(|_, pending| {
            (now - pending.last_update).num_minutes() < segment_expire_minutes
        });
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn segment(product_id: u16, file_id: u16, len: u16, num: u16, raw: Vec<u8>) -> Apdu {
        Apdu {
            header: ApduHeader {
                product_id,
                s_flag: true,
                time_option: 0,
                month: None,
                day: None,
                hour: 0,
                minute: 0,
                product_file_id: Some(file_id),
                product_file_length: Some(len),
                apdu_number: Some(num),
            },
            payload: ApduPayload::Segment { raw },
        }
    }

    #[test]
    fn reassembles_two_segments_order_independent() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        // product_id=8 is TWGO; build a minimal valid two-segment body:
        // a 6-byte header per segment, second contributing extra bytes
        // beyond the header which get appended.
        let header = vec![0x20, 0x00, 0x00, 0x00, 0x00, 0x00]; // record_format text-ish bits, rest zero
        let seg1 = header.clone();
        let mut seg2 = header.clone();
        seg2.push(0xAA);

        let mut d1 = Desegmenter::new();
        let r1 = d1.ingest(segment(8, 1, 2, 1, seg1.clone()), now).unwrap();
        assert!(r1.is_none());
        let r2 = d1.ingest(segment(8, 1, 2, 2, seg2.clone()), now);
        assert!(r2.is_ok());

        // Reverse order should produce the same concatenation.
        let mut d2 = Desegmenter::new();
        let r1b = d2.ingest(segment(8, 1, 2, 2, seg2), now).unwrap();
        assert!(r1b.is_none());
        let r2b = d2.ingest(segment(8, 1, 2, 1, seg1), now);
        assert!(r2b.is_ok());
    }

    #[test]
    fn rejects_out_of_bounds_apdu_number() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut d = Desegmenter::new();
        let result = d.ingest(segment(8, 1, 2, 5, vec![0; 6]), now);
        assert!(result.is_err());
    }

    #[test]
    fn eviction_drops_stale_pending() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut d = Desegmenter::new();
        d.ingest(segment(8, 1, 2, 1, vec![0; 6]), now).unwrap();
        assert_eq!(d.pending_count(), 1);
        d.evict(now + chrono::Duration::minutes(10), 5);
        assert_eq!(d.pending_count(), 0);
    }
}
