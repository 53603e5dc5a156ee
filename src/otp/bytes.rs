//! Radix-256 integer packing, both byte orders. The record stores integers
//! little-endian while key names and the wire prefix use big-endian.

#[must_use]
pub fn encode_le<const N: usize>(mut val: u64) -> [u8; N] {
    let mut out = [0u8; N];
    for byte in &mut out {
        *byte = (val & 0xff) as u8;
        val >>= 8;
    }
    out
}

#[must_use]
pub fn encode_be<const N: usize>(mut val: u64) -> [u8; N] {
    let mut out = [0u8; N];
    for byte in out.iter_mut().rev() {
        *byte = (val & 0xff) as u8;
        val >>= 8;
    }
    out
}

#[must_use]
pub fn decode_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0, |acc, &byte| acc << 8 | u64::from(byte))
}

#[must_use]
pub fn decode_be(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0, |acc, &byte| acc << 8 | u64::from(byte))
}
