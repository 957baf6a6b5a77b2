//! CRL (Current Report List) frame decode (spec §4.6, §3 "CRL state").

use crate::bits::BitCursor;
use crate::dlac;
use crate::error::ApduError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTag {
    TextOnly,
    GraphicsOnly,
    TextAndGraphics,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CrlEntry {
    pub report_year_or_month: u8,
    pub report_number: u16,
    pub tag: ContentTag,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Crl {
    pub product_id: u16,
    pub range_nm: u16,
    pub has_overflow: bool,
    pub location: Option<String>,
    pub entries: Vec<CrlEntry>,
}

pub fn decode(body: &[u8]) -> Result<Crl, ApduError> {
    let mut cursor = BitCursor::new(body);

    let product_id_high = cursor.read_bits(8).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
    let product_id_low = cursor.read_bits(3).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
    let product_id = (product_id_high << 3) | product_id_low;

    let range_byte = cursor.read_bits(8).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
    let range_nm = range_byte * 5;

    let tfr_notam = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let has_overflow = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let has_location = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
    let _ = tfr_notam;

    let location = if has_location {
        cursor.align_to_byte();
        let text = dlac::dlac_to_text(cursor.remaining_bytes(), 0, 3);
        cursor.advance_bytes((3 * 6usize).div_ceil(8));
        Some(text)
    } else {
        None
    };

    cursor.align_to_byte();
    let mut entries = Vec::new();
    while cursor.bits_remaining() >= 24 {
        let report_year_or_month = cursor.read_bits(7).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
        let report_number = cursor.read_bits(14).ok_or(ApduError::ImpossibleHeaderBitCount)? as u16;
        let text_flag = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
        let graphics_flag = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;

        let tag = match (text_flag, graphics_flag) {
            (true, true) => ContentTag::TextAndGraphics,
            (true, false) => ContentTag::TextOnly,
            (false, true) => ContentTag::GraphicsOnly,
            (false, false) => ContentTag::TextOnly,
        };

        entries.push(CrlEntry { report_year_or_month, report_number, tag });
    }

    Ok(Crl { product_id, range_nm, has_overflow, location, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_empty_crl_body() {
        let data = [0x00, 0x00, 0x00];
        let crl = decode(&data).unwrap();
        assert_eq!(crl.product_id, 0);
        assert_eq!(crl.range_nm, 0);
        assert!(!crl.has_overflow);
        assert!(crl.location.is_none());
        assert!(crl.entries.is_empty());
    }
}
