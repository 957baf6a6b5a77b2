//! APDU decoder (spec §4.2): normalizes the variable-width APDU header into
//! a fixed set of fields, then dispatches the payload by product id.

pub mod crl;
pub mod dlac_text;
pub mod global_block;
pub mod service_status;
pub mod twgo;

use crate::bits::BitCursor;
use crate::error::ApduError;

/// Product ids dispatched to the generic DLAC text decoder (spec §4.2).
pub const PRODUCT_IDS_DLAC_TEXT: [u16; 1] = [413];

/// Product ids dispatched to the TWGO decoder.
pub const PRODUCT_IDS_TWGO: [u16; 8] = [8, 11, 12, 13, 14, 15, 16, 17];

/// Product ids dispatched to the global-block image decoder.
pub const PRODUCT_IDS_GLOBAL_BLOCK: [u16; 8] = [63, 64, 70, 71, 84, 90, 91, 103];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFamily {
    DlacText,
    Twgo,
    GlobalBlock,
}

pub fn product_family(product_id: u16) -> Result<ProductFamily, ApduError> {
    if PRODUCT_IDS_DLAC_TEXT.contains(&product_id) {
        Ok(ProductFamily::DlacText)
    } else if PRODUCT_IDS_TWGO.contains(&product_id) {
        Ok(ProductFamily::Twgo)
    } else if PRODUCT_IDS_GLOBAL_BLOCK.contains(&product_id) {
        Ok(ProductFamily::GlobalBlock)
    } else {
        Err(ApduError::UnknownProductId(product_id))
    }
}

/// The normalized APDU header: a fixed 65-bit logical layout regardless of
/// which optional fields were actually transmitted (spec §4.2). Absent
/// month/day or segmentation fields are zero-filled, exactly as the
/// original's `normalizeApduHeader` always reserves their bit positions.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ApduHeader {
    pub product_id: u16,
    pub s_flag: bool,
    pub time_option: u8,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub hour: u8,
    pub minute: u8,
    pub product_file_id: Option<u16>,
    pub product_file_length: Option<u16>,
    pub apdu_number: Option<u16>,
}

/// A decoded APDU: its normalized header plus the dispatched payload, or
/// the raw bytes of a still-segmented payload awaiting desegmentation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Apdu {
    pub header: ApduHeader,
    pub payload: ApduPayload,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "payload_type")]
pub enum ApduPayload {
    GlobalBlock(global_block::GlobalBlock),
    Twgo(twgo::TwgoObject),
    DlacText { text: String },
    /// Captured for the desegmenter; `s_flag` was set so the payload is not
    /// yet a complete, decodable record.
    Segment { raw: Vec<u8> },
}

/// Parse the variable-width APDU header and dispatch the remaining bytes
/// to the appropriate product decoder. `frame_type` selects TWGO vs
/// global-block vs DLAC text once product_id is known; segmented payloads
/// (`s_flag == 1`) are captured raw for the reconstructor per spec §4.2.
pub fn decode_apdu(data: &[u8]) -> Result<Apdu, ApduError> {
    let mut cursor = BitCursor::new(data);

    // 3 reserved bits precede the 11-bit product id (normalized header
    // offsets 0:3 and 3:14).
    cursor.read_bits(3).ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let product_id = cursor.read_bits(11).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
    let s_flag = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let time_option = cursor.read_bits(2).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;

    let (month, day) = if time_option == 2 {
        let month = cursor.read_bits(4).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
        let day = cursor.read_bits(5).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
        (Some(month), Some(day))
    } else {
        (None, None)
    };

    let hour = cursor.read_bits(5).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
    let minute = cursor.read_bits(6).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;

    let (product_file_id, product_file_length, apdu_number) = if s_flag {
        let id = cursor.read_bits(10).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
        let len = cursor.read_bits(9).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
        let num = cursor.read_bits(9).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
        (Some(id), Some(len), Some(num))
    } else {
        (None, None, None)
    };

    if apdu_number.is_some_and(|n| n == 0)
        || (apdu_number.is_some() && apdu_number.unwrap() > product_file_length.unwrap_or(0))
    {
        return Err(ApduError::SegmentIndexOutOfBounds {
            apdu_number: apdu_number.unwrap_or(0),
            product_file_length: product_file_length.unwrap_or(0),
        });
    }

    let header = ApduHeader {
        product_id,
        s_flag,
        time_option,
        month,
        day,
        hour,
        minute,
        product_file_id,
        product_file_length,
        apdu_number,
    };

    cursor.align_to_byte();
    let body = cursor.remaining_bytes();

    let payload = if s_flag {
        ApduPayload::Segment { raw: body.to_vec() }
    } else {
        decode_payload(product_id, body)?
    };

    Ok(Apdu { header, payload })
}

/// Decode a (re-)assembled, unsegmented APDU body for the given product id.
/// Used both by [`decode_apdu`] directly and by the desegmenter once a
/// segmented TWGO object has been fully reassembled.
pub fn decode_payload(product_id: u16, body: &[u8]) -> Result<ApduPayload, ApduError> {
    match product_family(product_id)? {
        ProductFamily::DlacText => Ok(ApduPayload::DlacText {
            text: dlac_text::decode(body),
        }),
        ProductFamily::Twgo => Ok(ApduPayload::Twgo(twgo::decode(body)?)),
        ProductFamily::GlobalBlock => {
            Ok(ApduPayload::GlobalBlock(global_block::decode(product_id, body)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_product_id() {
        assert_eq!(product_family(9999), Err(ApduError::UnknownProductId(9999)));
    }

    #[test]
    fn classifies_families() {
        assert_eq!(product_family(413), Ok(ProductFamily::DlacText));
        assert_eq!(product_family(8), Ok(ProductFamily::Twgo));
        assert_eq!(product_family(63), Ok(ProductFamily::GlobalBlock));
    }
}
