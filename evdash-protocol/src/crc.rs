//! CRC-16/Modbus checksum
//!
//! Polynomial 0xA001 (reflected 0x8005), seed 0xFFFF, processed LSB-first,
//! no final XOR.

/// Reflected Modbus polynomial
pub const CRC16_POLY: u16 = 0xA001;

/// Initial register value
pub const CRC16_SEED: u16 = 0xFFFF;

/// Incremental CRC-16/Modbus calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    crc: u16,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    /// Start a new checksum
    pub const fn new() -> Self {
        Self { crc: CRC16_SEED }
    }

    /// Feed a single byte
    pub fn update_byte(&mut self, byte: u8) {
        self.crc ^= u16::from(byte);
        for _ in 0..8 {
            if self.crc & 0x0001 != 0 {
                self.crc = (self.crc >> 1) ^ CRC16_POLY;
            } else {
                self.crc >>= 1;
            }
        }
    }

    /// Feed a run of bytes
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    /// Current checksum value
    pub const fn finish(&self) -> u16 {
        self.crc
    }
}

/// Compute the CRC-16/Modbus checksum of `data`
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_seed() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_check_vector() {
        // Published check value for CRC-16/MODBUS
        assert_eq!(checksum(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_modbus_request_vector() {
        // Read holding registers: slave 1, addr 0, count 1 -> CRC bytes 84 0A (LE on wire)
        assert_eq!(checksum(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let data = b"evdash telemetry";
        let mut crc = Crc16::new();
        crc.update(&data[..5]);
        crc.update(&data[5..]);
        assert_eq!(crc.finish(), checksum(data));
    }

    #[test]
    fn test_every_bit_matters() {
        let data = [0x00, 0x09, 0x00, 0x00, 0x00, 0x85, 0x19, 0x83, 0x09, 0x06, 0x78];
        let reference = checksum(&data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data;
                flipped[i] ^= 1 << bit;
                assert_ne!(checksum(&flipped), reference, "byte {} bit {}", i, bit);
            }
        }
    }
}
