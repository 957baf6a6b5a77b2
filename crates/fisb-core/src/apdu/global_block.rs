//! Global-block run-length images (spec §3 "GlobalBlock", §4.7 "Run-length
//! decoders"): NEXRAD regional/CONUS, turbulence, cloud tops, icing,
//! lightning.

use crate::bits::BitCursor;
use crate::error::ApduError;

pub const BINS_PER_BLOCK: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hemisphere {
    North,
    South,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ImageProduct {
    NexradRegional,
    NexradConus,
    Turbulence,
    Icing,
    CloudTops,
    Lightning,
}

fn image_product(product_id: u16) -> Result<ImageProduct, ApduError> {
    match product_id {
        63 => Ok(ImageProduct::NexradRegional),
        64 => Ok(ImageProduct::NexradConus),
        70 => Ok(ImageProduct::Icing),
        71 => Ok(ImageProduct::Icing),
        84 => Ok(ImageProduct::CloudTops),
        90 => Ok(ImageProduct::Turbulence),
        91 => Ok(ImageProduct::Turbulence),
        103 => Ok(ImageProduct::Lightning),
        other => Err(ApduError::UnknownProductId(other)),
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GlobalBlock {
    pub product: ImageProduct,
    pub block_number: u32,
    pub scale_factor: crate::geo::ScaleFactor,
    pub hemisphere: Hemisphere,
    pub altitude_level: Option<u8>,
    /// `Some` for a normal run-length-decoded block; `None` when this is
    /// an empty-block bitmap frame (see `empty_blocks`).
    pub bins: Option<Vec<u8>>,
    /// Present when the block header signalled "empty blocks": one bool
    /// per block starting at `block_number`, `true` meaning that block has
    /// no data for this period.
    pub empty_blocks: Option<Vec<bool>>,
}

pub fn decode(product_id: u16, body: &[u8]) -> Result<GlobalBlock, ApduError> {
    let product = image_product(product_id)?;
    let mut cursor = BitCursor::new(body);

    let block_number = cursor.read_bits(20).ok_or(ApduError::ImpossibleHeaderBitCount)? as u32;
    let is_run_length = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;

    let (scale_factor, hemisphere) = match product {
        ImageProduct::NexradRegional | ImageProduct::NexradConus => {
            let scale_bits = cursor.read_bits(2).ok_or(ApduError::ImpossibleHeaderBitCount)?;
            let scale_factor = match scale_bits {
                0 => crate::geo::ScaleFactor::High,
                1 => crate::geo::ScaleFactor::Medium,
                _ => crate::geo::ScaleFactor::Low,
            };
            let hemi_bit = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
            (scale_factor, if hemi_bit { Hemisphere::South } else { Hemisphere::North })
        }
        _ => {
            let hemi_bit = cursor.read_bool().ok_or(ApduError::ImpossibleHeaderBitCount)?;
            (
                crate::geo::ScaleFactor::Medium,
                if hemi_bit { Hemisphere::South } else { Hemisphere::North },
            )
        }
    };

    let altitude_level = match product {
        ImageProduct::Icing | ImageProduct::Turbulence => {
            Some(cursor.read_bits(4).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8)
        }
        _ => None,
    };

    cursor.align_to_byte();
    let rest = cursor.remaining_bytes();

    if !is_run_length {
        let empty_blocks = rest.iter().flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1 != 0)).collect();
        return Ok(GlobalBlock {
            product,
            block_number,
            scale_factor,
            hemisphere,
            altitude_level,
            bins: None,
            empty_blocks: Some(empty_blocks),
        });
    }

    let bins = match product {
        ImageProduct::NexradRegional | ImageProduct::NexradConus => nexrad_rl(rest)?,
        ImageProduct::Turbulence | ImageProduct::CloudTops => turb_cloudtop_rl(rest)?,
        ImageProduct::Icing => icing_rl(rest)?,
        ImageProduct::Lightning => lightning_rl(rest)?,
    };

    Ok(GlobalBlock {
        product,
        block_number,
        scale_factor,
        hemisphere,
        altitude_level,
        bins: Some(bins),
        empty_blocks: None,
    })
}

fn check_total(total: usize) -> Result<(), ApduError> {
    if total != BINS_PER_BLOCK {
        return Err(ApduError::RunLengthTotalMismatch {
            expected: BINS_PER_BLOCK as u32,
            got: total as u32,
        });
    }
    Ok(())
}

/// NEXRAD: 1-byte runs, 5-bit count (+1), 3-bit value.
fn nexrad_rl(data: &[u8]) -> Result<Vec<u8>, ApduError> {
    let mut bins = Vec::with_capacity(BINS_PER_BLOCK);
    for &byte in data {
        let count = (byte >> 3) as usize + 1;
        let value = byte & 0x07;
        bins.extend(std::iter::repeat(value).take(count));
        if bins.len() >= BINS_PER_BLOCK {
            break;
        }
    }
    check_total(bins.len())?;
    Ok(bins)
}

/// Turbulence / cloud-tops: 1-byte runs normally (4-bit count-1, 4-bit
/// value); a leading nibble of 0xE signals a 2-byte run whose second byte
/// is `count - 1` and whose value is the following nibble.
fn turb_cloudtop_rl(data: &[u8]) -> Result<Vec<u8>, ApduError> {
    let mut bins = Vec::with_capacity(BINS_PER_BLOCK);
    let mut i = 0;
    while i < data.len() && bins.len() < BINS_PER_BLOCK {
        let byte = data[i];
        let high_nibble = byte >> 4;
        if high_nibble == 0xE {
            if i + 1 >= data.len() {
                break;
            }
            let count = data[i + 1] as usize + 1;
            let value = byte & 0x0F;
            bins.extend(std::iter::repeat(value).take(count));
            i += 2;
        } else {
            let count = high_nibble as usize + 1;
            let value = byte & 0x0F;
            bins.extend(std::iter::repeat(value).take(count));
            i += 1;
        }
    }
    check_total(bins.len())?;
    Ok(bins)
}

/// Icing: 2-byte runs. First byte is `count - 1`; second byte packs
/// `{SLD:2, severity:3, probability:3}`, stored here as a single value
/// byte per bin for the renderer to unpack.
fn icing_rl(data: &[u8]) -> Result<Vec<u8>, ApduError> {
    let mut bins = Vec::with_capacity(BINS_PER_BLOCK);
    let mut i = 0;
    while i + 1 < data.len() && bins.len() < BINS_PER_BLOCK {
        let count = data[i] as usize + 1;
        let value = data[i + 1];
        bins.extend(std::iter::repeat(value).take(count));
        i += 2;
    }
    check_total(bins.len())?;
    Ok(bins)
}

/// Unpack an icing bin byte into `(sld, severity, probability)`.
pub fn unpack_icing(value: u8) -> (u8, u8, u8) {
    (value >> 6 & 0x03, value >> 3 & 0x07, value & 0x07)
}

/// Lightning: 1-byte runs, 4-bit count+1, 1-bit polarity, 3-bit strike
/// class; an exact byte value of 0xF8 is a documented irregularity that
/// expands to 32 bins instead of following the normal count field (spec §9
/// Open Questions: only the exact byte matches this case).
fn lightning_rl(data: &[u8]) -> Result<Vec<u8>, ApduError> {
    let mut bins = Vec::with_capacity(BINS_PER_BLOCK);
    for &byte in data {
        if byte == 0xF8 {
            bins.extend(std::iter::repeat(0u8).take(32));
        } else {
            let count = (byte >> 4) as usize + 1;
            let value = byte & 0x0F;
            bins.extend(std::iter::repeat(value).take(count));
        }
        if bins.len() >= BINS_PER_BLOCK {
            break;
        }
    }
    check_total(bins.len())?;
    Ok(bins)
}

/// Unpack a lightning bin byte into `(polarity, strike_class)`.
pub fn unpack_lightning(value: u8) -> (u8, u8) {
    (value >> 3 & 0x01, value & 0x07)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nexrad_rl_sums_to_128() {
        // One run covering all 128 bins: count-1 = 127 -> 5 bits max 31, so
        // use 5 runs of 25.6... use exact: 4 runs of 32 (count=32 -> count-1=31, fits 5 bits)
        let data = [0b11111_000u8; 4]; // count=32, value=0, four times = 128
        let bins = nexrad_rl(&data).unwrap();
        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|&v| v == 0));
    }

    #[test]
    fn nexrad_rl_rejects_short_total() {
        let data = [0b00000_000u8]; // count=1, total=1
        assert!(nexrad_rl(&data).is_err());
    }

    #[test]
    fn lightning_0xf8_expands_to_32() {
        let mut data = vec![0xF8u8; 4]; // 4 * 32 = 128
        data.truncate(4);
        let bins = lightning_rl(&data).unwrap();
        assert_eq!(bins.len(), 128);
    }

    #[test]
    fn icing_unpack_roundtrip_shape() {
        let value = (0b10 << 6) | (0b101 << 3) | 0b011;
        assert_eq!(unpack_icing(value), (0b10, 0b101, 0b011));
    }
}
