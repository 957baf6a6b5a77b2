//! Reception Success Rate accumulator (spec §4.1 "Optional reception-
//! success-rate accumulator"): counts packets per station in a sliding
//! wall-clock window and emits a transient `RSR_STATUS` record every
//! `rsr_stride_seconds`, comparing actual arrivals against the station
//! tier's expected packets/second (`frame::header::expected_packets_per_second`).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::frame::header::expected_packets_per_second;
use crate::normalize::Record;
use crate::time::format_instant;

struct StationWindow {
    tisb_site_id: u8,
    /// Reception instants still inside the window, oldest first.
    arrivals: VecDeque<DateTime<Utc>>,
    last_emit: Option<DateTime<Utc>>,
}

/// Per-station sliding-window packet counter (spec §4.1, §6 `calculate_rsr`,
/// `rsr_window_seconds`, `rsr_stride_seconds`).
#[derive(Default)]
pub struct RsrAccumulator {
    stations: HashMap<String, StationWindow>,
}

impl RsrAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one received packet and, if `rsr_stride_seconds` have
    /// elapsed since this station's last emission, return a fresh
    /// `RSR_STATUS` record (spec: "transient record with short
    /// expiration").
    pub fn ingest(
        &mut self,
        station: &str,
        tisb_site_id: u8,
        now: DateTime<Utc>,
        window_seconds: u64,
        stride_seconds: u64,
    ) -> Option<Record> {
        let window = self.stations.entry(station.to_string()).or_insert_with(|| StationWindow {
            tisb_site_id,
            arrivals: VecDeque::new(),
            last_emit: None,
        });
        window.tisb_site_id = tisb_site_id;
        window.arrivals.push_back(now);

        let window_span = Duration::seconds(window_seconds.max(1) as i64);
        while let Some(&oldest) = window.arrivals.front() {
            if now - oldest > window_span {
                window.arrivals.pop_front();
            } else {
                break;
            }
        }

        let stride = Duration::seconds(stride_seconds.max(1) as i64);
        let should_emit = match window.last_emit {
            Some(last) => now - last >= stride,
            None => true,
        };
        if !should_emit {
            return None;
        }
        window.last_emit = Some(now);

        let expected_pps = expected_packets_per_second(window.tisb_site_id);
        let elapsed_secs = window_seconds.max(1) as f64;
        let expected_total = expected_pps * elapsed_secs;
        let actual_total = window.arrivals.len() as f64;
        let rsr_percent = if expected_total > 0.0 {
            (actual_total / expected_total * 100.0).min(100.0)
        } else {
            100.0
        };

        Some(Record::RsrStatus {
            unique_name: station.to_string(),
            insert_time: format_instant(now),
            expiration_time: format_instant(now + stride * 2),
            station: station.to_string(),
            rsr_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_packet_emits_immediately() {
        let mut rsr = RsrAccumulator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let record = rsr.ingest("1,2", 0, t0, 120, 1).unwrap();
        assert!(matches!(record, Record::RsrStatus { .. }));
    }

    #[test]
    fn suppresses_emission_within_stride() {
        let mut rsr = RsrAccumulator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        rsr.ingest("1,2", 0, t0, 120, 5).unwrap();
        assert!(rsr.ingest("1,2", 0, t0 + Duration::seconds(1), 120, 5).is_none());
        assert!(rsr.ingest("1,2", 0, t0 + Duration::seconds(6), 120, 5).is_some());
    }

    #[test]
    fn full_reception_at_expected_rate_yields_near_100_percent() {
        let mut rsr = RsrAccumulator::new();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let pps = expected_packets_per_second(0);
        let mut t = t0;
        let mut last = None;
        let step_ms = (1000.0 / pps) as i64;
        for _ in 0..240 {
            last = rsr.ingest("1,2", 0, t, 120, 1);
            t += Duration::milliseconds(step_ms);
        }
        if let Some(Record::RsrStatus { rsr_percent, .. }) = last {
            assert!(rsr_percent > 50.0 && rsr_percent <= 100.0);
        }
    }
}
