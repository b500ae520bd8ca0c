//! The fixed 1536-byte boot0 image header.
//!
//! Layout (word offsets, one word = 4 bytes):
//!
//! | word   | field                                        |
//! |--------|----------------------------------------------|
//! | 0      | branch instruction over the header           |
//! | 1..3   | 8-byte magic, "uboot"                        |
//! | 3      | checksum                                     |
//! | 4      | section alignment (0x4000)                   |
//! | 5      | total padded length                          |
//! | 6      | primary size (length before final alignment) |
//! | 11     | DRAM load address                            |
//! | 0x140  | section table, 10 (offset, size) word pairs  |

use crate::buffer::RawBuffer;
use crate::checksum::word_sum;
use crate::error::{Boot0ImgError, Result};
use crate::{BOOT0_ALIGN, CHECKSUM_SEED, HEADER_SIZE, UBOOT_LOAD_ADDR};

/// Word offsets of the named header fields.
mod field {
    pub const JUMP_INS: usize = 0;
    pub const MAGIC: usize = 1;
    pub const CHECKSUM: usize = 3;
    pub const ALIGN: usize = 4;
    pub const LENGTH: usize = 5;
    pub const PRIMARY_SIZE: usize = 6;
    pub const LOAD_ADDR: usize = 11;
    pub const SECTION_TABLE: usize = 0x500 / 4;
}

/// Magic string in the 8-byte region at word 1.
pub const HEADER_MAGIC: &[u8; 5] = b"uboot";

/// Number of (offset, size) pairs in the section table.
pub const SECTION_SLOTS: usize = 10;

/// Section-table pair used for the DRAM payload.
pub const DRAM_ENTRY: usize = 0;

/// Section-table pair used for the SRAM payload.
pub const SRAM_ENTRY: usize = 4;

/// Builder for the fixed-size header region.
///
/// The checksum must be written last, after every other field is final,
/// because it covers the rest of the header plus all section payload
/// bytes; [`ImageHeader::seal`] enforces that ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    buf: RawBuffer,
}

impl ImageHeader {
    /// Fresh header with the branch instruction, magic and the platform
    /// constants filled in.
    pub fn new() -> Self {
        let mut header = Self {
            buf: RawBuffer::with_len(HEADER_SIZE),
        };
        // AArch64 `b` to the first byte after the header.
        header
            .buf
            .put_u32(field::JUMP_INS, 0x1400_0000 | (HEADER_SIZE as u32 / 4));
        header.write_static_fields();
        header
    }

    /// Adopt the header embedded at the front of a U-Boot binary.
    ///
    /// The pre-existing branch instruction is trusted unmodified; the
    /// static fields are rewritten and the section table and checksum are
    /// contributed as usual.
    pub fn from_embedded(uboot: &[u8]) -> Result<Self> {
        if uboot.len() < HEADER_SIZE {
            return Err(Boot0ImgError::EmbeddedHeaderTooSmall { size: uboot.len() });
        }
        let mut header = Self {
            buf: RawBuffer::from_vec(uboot[..HEADER_SIZE].to_vec()),
        };
        header.write_static_fields();
        Ok(header)
    }

    fn write_static_fields(&mut self) {
        let magic = &mut self.buf.as_mut_slice()[field::MAGIC * 4..field::CHECKSUM * 4];
        magic.fill(0);
        magic[..HEADER_MAGIC.len()].copy_from_slice(HEADER_MAGIC);

        self.buf.put_u32(field::ALIGN, BOOT0_ALIGN as u32);
        self.buf.put_u32(field::LOAD_ADDR, UBOOT_LOAD_ADDR);
    }

    /// Record a section in the table as an (absolute offset, padded size)
    /// word pair. `entry` is one of [`DRAM_ENTRY`] / [`SRAM_ENTRY`].
    pub fn set_section_entry(&mut self, entry: usize, offset: u32, size: u32) {
        assert!(entry < SECTION_SLOTS);
        self.buf.put_u32(field::SECTION_TABLE + entry * 2, offset);
        self.buf.put_u32(field::SECTION_TABLE + entry * 2 + 1, size);
    }

    /// Read back a section-table pair.
    pub fn section_entry(&self, entry: usize) -> (u32, u32) {
        assert!(entry < SECTION_SLOTS);
        (
            self.buf.get_u32(field::SECTION_TABLE + entry * 2),
            self.buf.get_u32(field::SECTION_TABLE + entry * 2 + 1),
        )
    }

    /// Store the unpadded total length and its 0x4000-aligned counterpart.
    pub fn set_sizes(&mut self, primary: u32, total: u32) {
        self.buf.put_u32(field::PRIMARY_SIZE, primary);
        self.buf.put_u32(field::LENGTH, total);
    }

    /// Compute and store the final checksum.
    ///
    /// `payload_sum` is the word-sum of every payload byte outside this
    /// header. The checksum slot is preloaded with the seed so the stored
    /// value covers seed + header + payloads. Returns the stored value.
    pub fn seal(&mut self, payload_sum: u32) -> u32 {
        self.buf.put_u32(field::CHECKSUM, CHECKSUM_SEED);
        let sum = payload_sum.wrapping_add(word_sum(self.buf.as_slice()));
        self.buf.put_u32(field::CHECKSUM, sum);
        sum
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }

    pub fn checksum(&self) -> u32 {
        self.buf.get_u32(field::CHECKSUM)
    }
}

impl Default for ImageHeader {
    fn default() -> Self {
        Self::new()
    }
}
