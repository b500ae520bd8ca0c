//! Section payload composition: files, trampolines, arisc vectors.

use crate::buffer::RawBuffer;
use crate::error::Result;
use crate::SECTOR_SIZE;
use std::path::{Path, PathBuf};

/// AArch64 trampoline: `ldr x16, #8; br x16; .word addr; .word 0`.
const TRAMPOLINE64: [u32; 2] = [0x5800_0050, 0xD61F_0200];

/// AArch32 trampoline: `ldr r12, [pc, #-0]; bx r12; .word addr`.
const TRAMPOLINE32: [u32; 2] = [0xE51F_C000, 0xE12F_FF1C];

/// OpenRISC reset-vector base the arisc jump displacement is relative to.
pub const ARISC_VECTOR_BASE: u32 = 0x40100;

/// Bytes vacated at the front of the SRAM payload for the arisc
/// exception vectors.
pub const ARISC_VECTOR_AREA: usize = 0x4000;

/// Word offset of the arisc reset entry inside the vector area.
const ARISC_ENTRY_WORD: usize = 64;

/// OpenRISC `l.nop`, placed in the jump's delay slot.
const ARISC_NOP: u32 = 0x1500_0000;

/// Where the DRAM payload bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DramSource {
    /// A plain binary file.
    File(PathBuf),
    /// A synthesized jump to `address`, no file read.
    Trampoline { aarch64: bool, address: u32 },
}

impl DramSource {
    /// Parse a `--dram` argument: a `trampoline64:<addr>` or
    /// `trampoline32:<addr>` directive, anything else is a file path.
    pub fn parse(arg: &str) -> Self {
        if let Some(addr) = arg.strip_prefix("trampoline64:") {
            Self::Trampoline {
                aarch64: true,
                address: parse_address(addr),
            }
        } else if let Some(addr) = arg.strip_prefix("trampoline32:") {
            Self::Trampoline {
                aarch64: false,
                address: parse_address(addr),
            }
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// Produce the raw (unpadded for files, 512-byte for trampolines)
    /// DRAM payload.
    pub fn load(&self) -> Result<RawBuffer> {
        match self {
            Self::File(path) => RawBuffer::load(path),
            Self::Trampoline { aarch64, address } => Ok(make_trampoline(*aarch64, *address)),
        }
    }
}

/// Synthesize a 512-byte load-and-branch stub jumping to `address`.
pub fn make_trampoline(aarch64: bool, address: u32) -> RawBuffer {
    let mut buf = RawBuffer::with_len(SECTOR_SIZE);
    let code = if aarch64 { &TRAMPOLINE64 } else { &TRAMPOLINE32 };
    buf.put_u32(0, code[0]);
    buf.put_u32(1, code[1]);
    buf.put_u32(2, address);
    // word 3 (the high half of the 64-bit literal) stays zero
    buf
}

/// Load the SRAM payload, rearranging it for the arisc when an entry
/// address is given: the buffer grows by the vector area, the original
/// payload moves up behind it, and the reset vector gets an OpenRISC
/// jump to `address` plus a delay-slot nop.
pub fn load_sram<P: AsRef<Path>>(path: P, arisc_entry: Option<u32>) -> Result<RawBuffer> {
    let mut buf = RawBuffer::load(path)?;
    if arisc_entry.is_some() {
        buf.grow_zeroed(buf.len() + ARISC_VECTOR_AREA);
    }
    buf.pad_to(SECTOR_SIZE);
    if let Some(address) = arisc_entry {
        install_arisc_vector(&mut buf, address);
    }
    Ok(buf)
}

/// Shift the payload of an already-grown, padded SRAM buffer behind the
/// vector area and write the arisc entry jump.
fn install_arisc_vector(sram: &mut RawBuffer, address: u32) {
    let len = sram.len();
    let slice = sram.as_mut_slice();
    slice.copy_within(0..len - ARISC_VECTOR_AREA, ARISC_VECTOR_AREA);
    slice[..ARISC_VECTOR_AREA].fill(0);

    // OpenRISC `l.j <displacement>` at the reset exception vector
    sram.put_u32(
        ARISC_ENTRY_WORD,
        address.wrapping_sub(ARISC_VECTOR_BASE) / 4,
    );
    sram.put_u32(ARISC_ENTRY_WORD + 1, ARISC_NOP);
}

/// strtoul-style permissive address parser: `0x` hex, leading-zero octal,
/// decimal otherwise; parsing stops at the first invalid character and an
/// empty or malformed prefix yields 0.
pub fn parse_address(s: &str) -> u32 {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    u32::from_str_radix(&digits[..end], radix).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_trampoline64_encoding() {
        let buf = make_trampoline(true, 0x4000_0000);
        assert_eq!(buf.len(), 512);
        assert_eq!(buf.get_u32(0), 0x5800_0050); // ldr x16, #8
        assert_eq!(buf.get_u32(1), 0xD61F_0200); // br x16
        assert_eq!(buf.get_u32(2), 0x4000_0000);
        assert_eq!(buf.get_u32(3), 0);
        assert!(buf.as_slice()[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_trampoline32_encoding() {
        let buf = make_trampoline(false, 0x1234_5678);
        assert_eq!(buf.len(), 512);
        assert_eq!(buf.get_u32(0), 0xE51F_C000); // ldr r12, [pc, #-0]
        assert_eq!(buf.get_u32(1), 0xE12F_FF1C); // bx r12
        assert_eq!(buf.get_u32(2), 0x1234_5678);
    }

    #[test]
    fn test_dram_source_parse() {
        assert_eq!(
            DramSource::parse("trampoline64:0x40000000"),
            DramSource::Trampoline {
                aarch64: true,
                address: 0x4000_0000
            }
        );
        assert_eq!(
            DramSource::parse("trampoline32:1024"),
            DramSource::Trampoline {
                aarch64: false,
                address: 1024
            }
        );
        assert_eq!(
            DramSource::parse("bl31.bin"),
            DramSource::File(PathBuf::from("bl31.bin"))
        );
    }

    #[test]
    fn test_load_sram_plain() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xCC; 700]).unwrap();
        file.flush().unwrap();

        let buf = load_sram(file.path(), None).unwrap();
        assert_eq!(buf.len(), 1024);
        assert_eq!(buf.as_slice()[699], 0xCC);
        assert_eq!(buf.as_slice()[700], 0);
    }

    #[test]
    fn test_load_sram_arisc() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xCC; 700]).unwrap();
        file.flush().unwrap();

        // entry address documented for the A64: SRAM + vector area + 8
        let buf = load_sram(file.path(), Some(0x44008)).unwrap();
        assert_eq!(buf.len(), crate::align_up(700 + ARISC_VECTOR_AREA, 512));

        // payload relocated behind the vector area
        assert_eq!(buf.as_slice()[ARISC_VECTOR_AREA], 0xCC);
        assert_eq!(buf.as_slice()[ARISC_VECTOR_AREA + 699], 0xCC);

        // l.j (0x44008 - 0x40100) / 4 at word 64, l.nop in the delay slot
        assert_eq!(buf.get_u32(64), (0x44008 - 0x40100) / 4);
        assert_eq!(buf.get_u32(65), 0x1500_0000);

        // the rest of the vector area is zero
        assert!(buf.as_slice()[..256].iter().all(|&b| b == 0));
        assert!(buf.as_slice()[264..ARISC_VECTOR_AREA].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_address_permissive() {
        assert_eq!(parse_address("0x44008"), 0x44008);
        assert_eq!(parse_address("2048"), 2048);
        assert_eq!(parse_address("010"), 8);
        assert_eq!(parse_address("0x40000000junk"), 0x4000_0000);
        assert_eq!(parse_address(""), 0);
        assert_eq!(parse_address("bogus"), 0);
    }
}
