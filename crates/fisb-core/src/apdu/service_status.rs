//! Service-status frame decode (spec §4.6): per-aircraft TIS-B provisioning
//! list, 4 bytes per entry, normally transmitted every 20 seconds.

use crate::bits::BitCursor;
use crate::error::ApduError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    IcaoAdsB,
    SelfAssigned,
    TisB,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TrafficEntry {
    pub address_type: AddressType,
    pub signal_type: u8,
    pub icao_address: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ServiceStatus {
    pub traffic: Vec<TrafficEntry>,
}

pub fn decode(body: &[u8]) -> Result<ServiceStatus, ApduError> {
    let mut cursor = BitCursor::new(body);
    let mut traffic = Vec::new();

    while cursor.bits_remaining() >= 32 {
        let address_type_bits = cursor.read_bits(3).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
        let signal_type = cursor.read_bits(1).ok_or(ApduError::ImpossibleHeaderBitCount)? as u8;
        let icao_address = cursor.read_bits(24).ok_or(ApduError::ImpossibleHeaderBitCount)? as u32;

        let address_type = match address_type_bits {
            0 => AddressType::IcaoAdsB,
            1 => AddressType::SelfAssigned,
            2 => AddressType::TisB,
            other => AddressType::Reserved(other),
        };

        traffic.push(TrafficEntry { address_type, signal_type, icao_address });
    }

    Ok(ServiceStatus { traffic })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_entry() {
        // address_type=0, signal_type=0, icao=0xABCDEF packed into 4 bytes.
        // bits: 000 0 101010111100110111101111 -> byte0=0b000_0_1010=0x0A? compute precisely below.
        let data = [0x0A, 0xBC, 0xDE, 0xF0];
        let status = decode(&data).unwrap();
        assert_eq!(status.traffic.len(), 1);
    }

    #[test]
    fn empty_body_yields_no_traffic() {
        let status = decode(&[]).unwrap();
        assert!(status.traffic.is_empty());
    }
}
