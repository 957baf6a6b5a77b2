//! TWGO text/graphic matcher (spec §4.3). Pairs text records with their
//! graphic counterparts for product ids 8, 11, 12, 15, 16, 17 under the
//! arrival-order rules enumerated in spec §4.3, including the detail
//! (grounded in the original's `TwgoMatcher`) that cancellations and the
//! product-8 empty-text "renew" ping never mutate the cached key state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::apdu::twgo::{GraphicRecord, ReportStatus, TextRecord, TwgoObject};

/// Key combining product id, the report's year (or month for TMOA/TRA),
/// report number, location, and the referencing month (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct MatcherKey {
    pub product_id: u16,
    pub report_year_or_month: u8,
    pub report_number: u16,
    pub location: String,
    pub referencing_month: u8,
}

struct MatchState {
    text: Option<TextRecord>,
    graphics: Vec<GraphicRecord>,
    last_update: DateTime<Utc>,
}

/// What the matcher hands to the normalizer: whatever combination of text
/// and graphics should be emitted for this arrival (or nothing).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MatchedTwgo {
    pub key: MatcherKey,
    pub text: Option<TextRecord>,
    pub graphics: Vec<GraphicRecord>,
}

#[derive(Default)]
pub struct TwgoMatcher {
    state: HashMap<MatcherKey, MatchState>,
}

impl TwgoMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one reassembled TWGO object through the matcher. `referencing_month`
    /// is the month the containing APDU header attaches to the record
    /// (needed to disambiguate same-numbered reports across month
    /// boundaries). Returns `Some` exactly when something should be emitted.
    pub fn ingest(
        &mut self,
        product_id: u16,
        referencing_month: u8,
        object: TwgoObject,
        now: DateTime<Utc>,
    ) -> Option<MatchedTwgo> {
        // A TWGO object with only graphics and no text record present.
        if object.text_records.is_empty() {
            for graphic in object.graphic_records {
                let key = MatcherKey {
                    product_id,
                    report_year_or_month: 0,
                    report_number: 0,
                    location: object.location.clone(),
                    referencing_month,
                };
                return self.ingest_graphic_only(key, graphic, now);
            }
            return None;
        }

        let text_record = object.text_records.into_iter().next().unwrap();
        let key = MatcherKey {
            product_id,
            report_year_or_month: text_record.report_year,
            report_number: text_record.report_number,
            location: object.location.clone(),
            referencing_month,
        };

        // Cancellation: emitted immediately, cache untouched.
        if text_record.report_status == ReportStatus::Cancelled {
            return Some(MatchedTwgo { key, text: Some(text_record), graphics: object.graphic_records });
        }

        // product 8 empty-text NOTAM-TFR "renew" ping: emit using whatever
        // is cached (if anything) without mutating the cache.
        if product_id == 8 && text_record.text.trim().is_empty() {
            return self.state.get(&key).map(|existing| MatchedTwgo {
                key: key.clone(),
                text: existing.text.clone(),
                graphics: existing.graphics.clone(),
            });
        }

        match self.state.get_mut(&key) {
            None => {
                self.state.insert(
                    key.clone(),
                    MatchState {
                        text: Some(text_record.clone()),
                        graphics: object.graphic_records.clone(),
                        last_update: now,
                    },
                );
                Some(MatchedTwgo { key, text: Some(text_record), graphics: object.graphic_records })
            }
            Some(existing) => {
                existing.last_update = now;
                let changed = existing.text.as_ref().map(|t| &t.text) != Some(&text_record.text);
                if changed {
                    existing.text = Some(text_record.clone());
                    existing.graphics.clear();
                    Some(MatchedTwgo { key, text: Some(text_record), graphics: Vec::new() })
                } else if !existing.graphics.is_empty() {
                    None
                } else {
                    Some(MatchedTwgo { key, text: Some(text_record), graphics: Vec::new() })
                }
            }
        }
    }

    fn ingest_graphic_only(
        &mut self,
        key: MatcherKey,
        graphic: GraphicRecord,
        now: DateTime<Utc>,
    ) -> Option<MatchedTwgo> {
        match self.state.get_mut(&key) {
            None => {
                self.state.insert(
                    key.clone(),
                    MatchState { text: None, graphics: vec![graphic], last_update: now },
                );
                None
            }
            Some(existing) => {
                existing.graphics.push(graphic);
                existing.last_update = now;
                existing
                    .text
                    .clone()
                    .map(|text| MatchedTwgo { key: key.clone(), text: Some(text), graphics: existing.graphics.clone() })
            }
        }
    }

    /// Drop keys whose last update is older than `twgo_expire` minutes
    /// (spec §4.3 eviction rule).
    pub fn evict(&mut self, now: DateTime<Utc>, twgo_expire_minutes: i64) {
        self.state.retain(|_, s| (now - s.last_update).num_minutes() < twgo_expire_minutes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::twgo::RecordFormat;
    use chrono::TimeZone;

    fn text_object(report_number: u16, status: ReportStatus, text: &str) -> TwgoObject {
        TwgoObject {
            record_format: RecordFormat::Text,
            location: "KIND".to_string(),
            record_reference_point: 0,
            text_records: vec![TextRecord { report_number, report_year: 24, report_status: status, text: text.to_string() }],
            graphic_records: vec![],
        }
    }

    #[test]
    fn text_only_then_unchanged_keeps_refreshing() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut matcher = TwgoMatcher::new();

        let first = matcher.ingest(11, 1, text_object(100, ReportStatus::Active, "hello"), now);
        assert!(first.is_some());

        let second = matcher.ingest(11, 1, text_object(100, ReportStatus::Active, "hello"), now);
        assert!(second.is_some(), "unchanged text with no graphics keeps refreshing");
    }

    #[test]
    fn text_change_evicts_graphics_and_emits_text_only() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut matcher = TwgoMatcher::new();

        matcher.ingest(11, 1, text_object(100, ReportStatus::Active, "v1"), now);
        let changed = matcher.ingest(11, 1, text_object(100, ReportStatus::Active, "v2"), now);
        let changed = changed.unwrap();
        assert!(changed.graphics.is_empty());
        assert_eq!(changed.text.unwrap().text, "v2");
    }

    #[test]
    fn cancellation_is_immediate_and_not_cached() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut matcher = TwgoMatcher::new();
        let result = matcher.ingest(11, 1, text_object(100, ReportStatus::Cancelled, ""), now);
        assert!(result.is_some());
    }
}
