//! Legacy MBR partition table emitted ahead of raw SD images.
//!
//! Some firmware and every PC-style consumer expect an MBR in sector 0.
//! The boot0 carve-out starts at 8 KiB, so the table costs nothing; it
//! advertises one real partition behind the firmware area plus, in the
//! unpatched layout, a reserved entry covering the raw firmware region.

use crate::{BOOT0_OFFSET, SECTOR_SIZE};
use byteorder::{ByteOrder, LittleEndian};

/// Standard legacy geometry used for CHS encoding.
pub const SECTORS_PER_TRACK: u32 = 63;
pub const HEADS: u32 = 255;

/// Byte offset of the partition entries: 27 zero-filled 16-byte legacy
/// slots plus a 14-byte pad.
const ENTRY_TABLE: usize = 446;

/// First sector of the advertised partition.
const PART_START: u32 = 2048;

/// First sector of the advertised partition when the boot0 patch moved
/// the firmware below it.
const PART_START_PATCHED: u32 = 4096;

/// Partition type byte reserving the raw firmware region.
const TYPE_FIRMWARE: u8 = 0xA2;

const TYPE_FAT32_LBA: u8 = 0x0C;
const TYPE_EFI_PROTECTIVE: u8 = 0xEE;

/// Kind of partition advertised in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Fat,
    Efi,
}

/// A request for the 512-byte table preceding the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTable {
    pub kind: PartitionKind,
    /// Partition size in MB (1 MB = 2048 sectors).
    pub size_mb: u32,
    /// The boot0 patch relocated the firmware below the partition start.
    pub patched_layout: bool,
}

impl PartitionTable {
    /// First sector of the advertised partition for this layout.
    pub fn start_sector(&self) -> u32 {
        if self.patched_layout {
            PART_START_PATCHED
        } else {
            PART_START
        }
    }

    /// Serialize the full 512-byte table.
    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];

        let start = self.start_sector();
        // a zero-MB request still produces a well-formed one-sector entry
        let sectors = (self.size_mb * 2048).max(1);
        let (flag, ptype) = match self.kind {
            PartitionKind::Fat => (0x80, TYPE_FAT32_LBA),
            PartitionKind::Efi => (0x00, TYPE_EFI_PROTECTIVE),
        };
        write_entry(
            &mut sector[ENTRY_TABLE..ENTRY_TABLE + 16],
            flag,
            ptype,
            start,
            sectors,
        );

        if !self.patched_layout {
            // reserve the raw firmware area up to the partition start
            let boot0_sector = (BOOT0_OFFSET / SECTOR_SIZE) as u32;
            write_entry(
                &mut sector[ENTRY_TABLE + 16..ENTRY_TABLE + 32],
                0x00,
                TYPE_FIRMWARE,
                boot0_sector,
                start - boot0_sector,
            );
        }

        sector[510] = 0x55;
        sector[511] = 0xAA;
        sector
    }
}

fn write_entry(entry: &mut [u8], flag: u8, ptype: u8, lba: u32, sectors: u32) {
    entry[0] = flag;
    entry[1..4].copy_from_slice(&lba_to_chs(lba));
    entry[4] = ptype;
    entry[5..8].copy_from_slice(&lba_to_chs(lba + sectors - 1));
    LittleEndian::write_u32(&mut entry[8..12], lba);
    LittleEndian::write_u32(&mut entry[12..16], sectors);
}

/// Encode an LBA as the packed head/sector/cylinder bytes of a legacy
/// partition entry, on the standard 63-sector, 255-head geometry.
/// Addresses beyond the CHS ceiling saturate at (1023, 254, 63).
pub fn lba_to_chs(lba: u32) -> [u8; 3] {
    let (c, h, s) = chs(lba);
    [
        h as u8,
        (s as u8) | (((c >> 2) & 0xC0) as u8),
        (c & 0xFF) as u8,
    ]
}

/// The (cylinder, head, sector) triple for an LBA.
pub fn chs(lba: u32) -> (u32, u32, u32) {
    let c = lba / (SECTORS_PER_TRACK * HEADS);
    if c > 1023 {
        return (1023, 254, 63);
    }
    let h = (lba / SECTORS_PER_TRACK) % HEADS;
    let s = lba % SECTORS_PER_TRACK + 1;
    (c, h, s)
}
