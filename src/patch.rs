//! In-place relocation of the firmware load offset inside a boot0 binary.
//!
//! A stock boot0 loads the secondary firmware from a fixed sector on the
//! SD card. That sector number is materialized by a Thumb-2 `movw`
//! (two consecutive 16-bit halfwords carrying a 16-bit immediate in four
//! scattered bit-fields) in two places of the binary. Rewriting both
//! immediates moves the firmware right behind the boot0 carve-out, which
//! frees the megabytes in between for a real partition.

use crate::{BOOT0_OFFSET, BOOT0_SIZE, SECTOR_SIZE, UBOOT_OFFSET_KB};
use byteorder::{ByteOrder, LittleEndian};

/// Firmware load offset a stock boot0 carries, in 512-byte sectors.
pub const LEGACY_SECTOR: u16 = (UBOOT_OFFSET_KB * 1024 / SECTOR_SIZE) as u16;

/// Relocated load offset: the sector right after the boot0 carve-out.
pub const PATCHED_SECTOR: u16 = ((BOOT0_OFFSET + BOOT0_SIZE) / SECTOR_SIZE) as u16;

/// Number of places the offset constant appears in a known boot0.
const EXPECTED_SITES: usize = 2;

/// First halfword of a `movw`: `11110 i 100100 imm4`.
const MOVW_MASK: u16 = 0xFBF0;
const MOVW_PATTERN: u16 = 0xF240;

/// The scanner is a two-state machine over the halfword stream. It
/// resets to `Idle` after every attempted match, whatever the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Idle,
    SawCandidate,
}

/// What a patch pass concluded about the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    /// Both sites already hold the wanted offset; nothing was changed.
    AlreadyPatched,
    /// Both sites were rewritten.
    Patched,
    /// Not a known boot0 variant; the buffer was left untouched.
    Unrecognized,
}

/// Outcome of [`Boot0Patcher::apply`].
///
/// The checksum and direction signals are deliberately separate fields:
/// a reverted binary needs its checksum refreshed just like a freshly
/// patched one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub state: PatchState,
    /// The stored checksum no longer covers the buffer contents.
    pub checksum_dirty: bool,
    /// The applied direction was patched-to-legacy.
    pub reverted: bool,
}

/// Patches (or reverts) the firmware load offset of a boot0 binary held
/// in memory. Operates purely on the buffer; checksum refresh is the
/// caller's move, via [`crate::checksum::refresh`], when
/// [`PatchOutcome::checksum_dirty`] says so.
#[derive(Debug, Clone, Copy, Default)]
pub struct Boot0Patcher {
    revert: bool,
}

impl Boot0Patcher {
    /// Forward patcher: legacy offset to the relocated one.
    pub fn new() -> Self {
        Self { revert: false }
    }

    /// Reversal patcher: relocated offset back to the legacy one.
    pub fn reverting() -> Self {
        Self { revert: true }
    }

    /// Scan and rewrite `boot0` in place.
    ///
    /// Policy, first success wins: the wanted value already present at
    /// both sites is a no-op; otherwise the rewrite must hit exactly both
    /// sites or the buffer is restored and passed through unrecognized.
    pub fn apply(&self, boot0: &mut [u8]) -> PatchOutcome {
        let (from, to) = if self.revert {
            (PATCHED_SECTOR, LEGACY_SECTOR)
        } else {
            (LEGACY_SECTOR, PATCHED_SECTOR)
        };

        // Rewriting a value into itself counts sites without changing
        // any bytes.
        if rewrite_imm16(boot0, to, to) == EXPECTED_SITES {
            return PatchOutcome {
                state: PatchState::AlreadyPatched,
                checksum_dirty: false,
                reverted: self.revert,
            };
        }

        let pristine = boot0.to_vec();
        if rewrite_imm16(boot0, from, to) == EXPECTED_SITES {
            PatchOutcome {
                state: PatchState::Patched,
                checksum_dirty: true,
                reverted: self.revert,
            }
        } else {
            boot0.copy_from_slice(&pristine);
            PatchOutcome {
                state: PatchState::Unrecognized,
                checksum_dirty: false,
                reverted: self.revert,
            }
        }
    }
}

/// Rewrite every `movw` immediate equal to `from` into `to`, preserving
/// all other bits. Returns the number of sites matched. Scanning covers
/// the whole buffer; the same constant may appear more than once.
fn rewrite_imm16(buf: &mut [u8], from: u16, to: u16) -> usize {
    let mut state = ScanState::Idle;
    let mut candidate = 0usize;
    let mut hits = 0;

    let mut off = 0;
    while off + 2 <= buf.len() {
        let hw = LittleEndian::read_u16(&buf[off..off + 2]);
        state = match state {
            ScanState::Idle if hw & MOVW_MASK == MOVW_PATTERN => {
                candidate = off;
                ScanState::SawCandidate
            }
            ScanState::Idle => ScanState::Idle,
            ScanState::SawCandidate => {
                // the second halfword of a movw has its high bit clear
                if hw & 0x8000 == 0 {
                    let first = LittleEndian::read_u16(&buf[candidate..candidate + 2]);
                    if decode_imm16(first, hw) == from {
                        let (hw1, hw2) = encode_imm16(first, hw, to);
                        LittleEndian::write_u16(&mut buf[candidate..candidate + 2], hw1);
                        LittleEndian::write_u16(&mut buf[off..off + 2], hw2);
                        hits += 1;
                    }
                }
                ScanState::Idle
            }
        };
        off += 2;
    }

    hits
}

/// Reassemble imm16 = imm4:i:imm3:imm8 from the two halfwords.
fn decode_imm16(hw1: u16, hw2: u16) -> u16 {
    ((hw1 & 0x000F) << 12) | (((hw1 >> 10) & 1) << 11) | (((hw2 >> 12) & 0x7) << 8) | (hw2 & 0xFF)
}

/// Scatter `imm` back into the two halfwords, touching only the
/// immediate fields.
fn encode_imm16(hw1: u16, hw2: u16, imm: u16) -> (u16, u16) {
    let hw1 = (hw1 & !0x040F) | (imm >> 12) | (((imm >> 11) & 1) << 10);
    let hw2 = (hw2 & !0x70FF) | (((imm >> 8) & 0x7) << 12) | (imm & 0xFF);
    (hw1, hw2)
}
