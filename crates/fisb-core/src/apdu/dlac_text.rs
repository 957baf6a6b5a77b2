//! Product 413: the entire APDU payload is DLAC text (spec §4.2), used for
//! METAR/SPECI, TAF, PIREP, and WINDS products.

use crate::dlac;

pub fn decode(body: &[u8]) -> String {
    let sextet_count = (body.len() * 8) / 6;
    dlac::dlac_to_text(body, 0, sextet_count)
}
