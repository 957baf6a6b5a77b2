//! Frame decoder (spec §4.1): parses a 432-byte ground-uplink packet into
//! its header and ordered inner frames.

pub mod header;

use crate::bits::BitCursor;
use crate::error::FrameError;
use header::{GroundUplinkHeader, GroundUplinkHeaderRaw};

pub const PACKET_LEN: usize = 432;
const HEADER_LEN: usize = 8;

/// One of the four inner-frame kinds the ground-uplink payload carries.
/// The frame-type tiering follows the UAT "FIS-B Product Frames" table:
/// 0 = APDU, 14 = CRL, 15 = Service Status; everything else is Reserved.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "frame_type")]
pub enum Frame {
    Apdu { length: u16, payload: Vec<u8> },
    Crl { length: u16, payload: Vec<u8> },
    ServiceStatus { length: u16, payload: Vec<u8> },
    Reserved { frame_type: u8, length: u16, payload: Vec<u8> },
}

impl Frame {
    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Apdu { payload, .. }
            | Frame::Crl { payload, .. }
            | Frame::ServiceStatus { payload, .. }
            | Frame::Reserved { payload, .. } => payload,
        }
    }
}

/// A fully parsed ground-uplink packet.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Packet {
    pub reception_time_ms: i64,
    pub station: String,
    pub app_data_valid: bool,
    /// Station tier, used by the RSR accumulator to look up expected
    /// packets/second (spec §4.1).
    pub tisb_site_id: u8,
    pub frames: Vec<Frame>,
}

/// Parse a 432-byte ground-uplink packet. `reception_time_ms` is the
/// millisecond-resolution UTC instant supplied by the demodulator (outside
/// this crate's scope to produce).
pub fn decode_packet(data: &[u8], reception_time_ms: i64) -> Result<Packet, FrameError> {
    if data.len() != PACKET_LEN {
        return Err(FrameError::WrongPacketLength {
            expected: PACKET_LEN,
            got: data.len(),
        });
    }

    let raw = GroundUplinkHeaderRaw::try_from(&data[..HEADER_LEN])
        .map_err(|_| FrameError::BadInnerFrameLength { offset: 0, remaining: data.len() })?;
    let header: GroundUplinkHeader = raw.into();

    if !header.app_data_valid {
        return Err(FrameError::ApplicationDataInvalid);
    }

    let frames = walk_inner_frames(&data[HEADER_LEN..])?;

    Ok(Packet {
        reception_time_ms,
        station: header.station,
        app_data_valid: header.app_data_valid,
        tisb_site_id: header.tisb_site_id,
        frames,
    })
}

fn walk_inner_frames(data: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut cursor = BitCursor::new(data);
    let mut frames = Vec::new();

    loop {
        if cursor.bits_remaining() < 16 {
            break;
        }

        let length = cursor.read_bits(9).ok_or(FrameError::BadInnerFrameLength {
            offset: cursor.bit_position(),
            remaining: cursor.bits_remaining(),
        })? as u16;
        // 3 reserved bits between the 9-bit length and the 4-bit frame type.
        cursor.read_bits(3).ok_or(FrameError::BadInnerFrameLength {
            offset: cursor.bit_position(),
            remaining: cursor.bits_remaining(),
        })?;
        let frame_type = cursor.read_bits(4).ok_or(FrameError::BadInnerFrameLength {
            offset: cursor.bit_position(),
            remaining: cursor.bits_remaining(),
        })? as u8;

        // A zero length is the padding/terminator the ground station emits
        // to fill the rest of the packet, whatever its frame type.
        if length == 0 {
            break;
        }

        if (length as usize) * 8 > cursor.bits_remaining() {
            return Err(FrameError::BadInnerFrameLength {
                offset: cursor.bit_position(),
                remaining: cursor.bits_remaining(),
            });
        }

        cursor.align_to_byte();
        let payload_start = cursor.bit_position() / 8;
        let payload = cursor.remaining_bytes()[..length as usize].to_vec();
        cursor = BitCursor::new(&data[payload_start + length as usize..]);

        frames.push(match frame_type {
            0 => Frame::Apdu { length, payload },
            14 => Frame::Crl { length, payload },
            15 => Frame::ServiceStatus { length, payload },
            other => Frame::Reserved { frame_type: other, length, payload },
        });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed_packet() -> Vec<u8> {
        let mut data = vec![0u8; PACKET_LEN];
        data[6] = 0b0010_0000; // app_data_valid bit set (byte 6 bit 5)
        data
    }

    #[test]
    fn rejects_wrong_length() {
        let data = vec![0u8; 10];
        assert_eq!(
            decode_packet(&data, 0),
            Err(FrameError::WrongPacketLength { expected: PACKET_LEN, got: 10 })
        );
    }

    #[test]
    fn rejects_invalid_app_data() {
        let data = vec![0u8; PACKET_LEN];
        assert_eq!(decode_packet(&data, 0), Err(FrameError::ApplicationDataInvalid));
    }

    #[test]
    fn accepts_valid_empty_packet() {
        let data = zeroed_packet();
        let packet = decode_packet(&data, 1_000).unwrap();
        assert!(packet.app_data_valid);
        assert!(packet.frames.is_empty());
    }
}
