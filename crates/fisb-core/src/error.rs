//! Per-stage error kinds. No `anyhow`/`thiserror`: every stage returns a
//! plain `Result` with a hand-rolled error enum, in the spirit of the
//! decode errors threaded through `deku`'s custom `reader` functions.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    WrongPacketLength { expected: usize, got: usize },
    BadInnerFrameLength { offset: usize, remaining: usize },
    UnknownFrameType(u8),
    ApplicationDataInvalid,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::WrongPacketLength { expected, got } => {
                write!(f, "expected {expected} byte packet, got {got}")
            }
            FrameError::BadInnerFrameLength { offset, remaining } => {
                write!(f, "inner frame length overruns packet at offset {offset} ({remaining} bytes remain)")
            }
            FrameError::UnknownFrameType(t) => write!(f, "unknown frame type {t}"),
            FrameError::ApplicationDataInvalid => write!(f, "app_data_valid is false"),
        }
    }
}

impl std::error::Error for FrameError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ApduError {
    UnknownProductId(u16),
    SegmentIndexOutOfBounds { apdu_number: u16, product_file_length: u16 },
    ImpossibleHeaderBitCount,
    UnknownGeometryOption(u8),
    RunLengthTotalMismatch { expected: u32, got: u32 },
    UnrecognizedTextHeader,
    Deku(String),
}

impl fmt::Display for ApduError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApduError::UnknownProductId(id) => write!(f, "unknown product id {id}"),
            ApduError::SegmentIndexOutOfBounds { apdu_number, product_file_length } => write!(
                f,
                "apdu_number {apdu_number} out of bounds for product_file_length {product_file_length}"
            ),
            ApduError::ImpossibleHeaderBitCount => write!(f, "impossible apdu header bit count"),
            ApduError::UnknownGeometryOption(g) => write!(f, "unknown geometry option {g}"),
            ApduError::RunLengthTotalMismatch { expected, got } => {
                write!(f, "run-length total {got} != expected {expected}")
            }
            ApduError::UnrecognizedTextHeader => write!(f, "unrecognized text header"),
            ApduError::Deku(msg) => write!(f, "bitfield decode error: {msg}"),
        }
    }
}

impl std::error::Error for ApduError {}

impl From<deku::DekuError> for ApduError {
    fn from(e: deku::DekuError) -> Self {
        ApduError::Deku(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructError {
    SegmentIndexOutOfBounds { slot: i64, len: usize },
    TooManyTextRecords,
    ReassemblyDecodeFailed(String),
}

impl fmt::Display for ReconstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructError::SegmentIndexOutOfBounds { slot, len } => {
                write!(f, "segment slot {slot} out of bounds for {len} segments")
            }
            ReconstructError::TooManyTextRecords => write!(f, "more than one text record in a TWGO object"),
            ReconstructError::ReassemblyDecodeFailed(msg) => write!(f, "reassembled TWGO payload failed to decode: {msg}"),
        }
    }
}

impl std::error::Error for ReconstructError {}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    DateCandidateOutOfRange { reference: String, max_days: i64 },
    UnrecognizedBody(String),
    UnmatchedPirep { raw: String },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::DateCandidateOutOfRange { reference, max_days } => write!(
                f,
                "no date candidate within {max_days} days of reference {reference}"
            ),
            NormalizeError::UnrecognizedBody(kind) => write!(f, "unrecognized {kind} body"),
            NormalizeError::UnmatchedPirep { raw } => write!(f, "unmatched PIREP body: {raw}"),
        }
    }
}

impl std::error::Error for NormalizeError {}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    ConnectionFailure(String),
    NotFound,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionFailure(msg) => write!(f, "store connection failure: {msg}"),
            StoreError::NotFound => write!(f, "document not found"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    Io(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Io(msg) => write!(f, "render i/o error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}
