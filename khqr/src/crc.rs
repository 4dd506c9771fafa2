//! CRC-16/CCITT-FALSE, as mandated by EMV-Co for the trailing checksum tag.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

/// Compute the checksum over the raw payload bytes.
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc = INIT;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
