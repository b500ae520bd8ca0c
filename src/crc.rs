//! CRC32 as used by the NAND-scheme partition tables.

/// Standard reflected CRC32 (polynomial 0xEDB88320) of `data`.
pub fn calculate_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
