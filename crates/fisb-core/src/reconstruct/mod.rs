//! Reconstruction (spec §4.3): reassembly of segmented TWGO APDUs and
//! pairing of TWGO text records with their graphic counterparts.

pub mod desegmenter;
pub mod matcher;

pub use desegmenter::Desegmenter;
pub use matcher::{MatchedTwgo, TwgoMatcher};
