//! "Allwinner NAND scheme" partition tables, as emitted by gen-part.
//!
//! A completely different table format from the MBR in [`crate::mbr`]:
//! 16 KiB, magic "softw411", up to 120 named partitions, written as four
//! redundant copies each signed with a CRC32 over everything behind the
//! checksum field. Addresses and lengths are stored as 512-byte sector
//! counts split into hi/lo words.

use crate::crc::calculate_crc32;
use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, Write};

pub const TABLE_MAGIC: &[u8; 8] = b"softw411";
pub const TABLE_VERSION: u32 = 0x0200;
pub const TABLE_SIZE: usize = 16 * 1024;
pub const TABLE_COPIES: u32 = 4;
pub const MAX_PARTITIONS: usize = 120;

const ENTRY_SIZE: usize = 128;
const ENTRIES_OFFSET: usize = 32;
const NAME_LEN: usize = 16;
const CLASS_NAME: &[u8] = b"DISK";
const USER_TYPE: u32 = 0x8000;

/// One `name[@offset]+len` specification from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSpec {
    pub name: String,
    /// Absolute byte offset; sequential placement when absent.
    pub offset: Option<u64>,
    /// Length in bytes.
    pub length: u64,
}

impl PartSpec {
    /// Parse `name[@offset]+len`. `None` when the length part is
    /// missing, which the caller warns about and skips.
    pub fn parse(arg: &str) -> Option<Self> {
        let (head, len) = arg.split_once('+')?;
        let length = parse_size(len);
        let (name, offset) = match head.split_once('@') {
            Some((name, off)) => (name, Some(parse_size(off))),
            None => (head, None),
        };
        Some(Self {
            name: name.to_string(),
            offset,
            length,
        })
    }
}

/// strtoull-style size parser: leading digits (`0x` hex accepted), then
/// an optional suffix, `k`/`m`/`g` binary multipliers or `s` for
/// 512-byte sectors. Malformed input yields 0.
pub fn parse_size(s: &str) -> u64 {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        (hex, 16)
    } else {
        (s, 10)
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let value = u64::from_str_radix(&digits[..end], radix).unwrap_or(0);

    match digits[end..].chars().next() {
        Some('k') | Some('K') => value * 1024,
        Some('m') | Some('M') => value * 1024 * 1024,
        Some('g') | Some('G') => value * 1024 * 1024 * 1024,
        Some('s') => value * 512,
        _ => value,
    }
}

/// A laid-out partition: name plus byte address and length.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Partition {
    name: String,
    addr: u64,
    length: u64,
}

/// The complete table, ready to serialize.
#[derive(Debug, Clone, Default)]
pub struct NandTable {
    parts: Vec<Partition>,
}

impl NandTable {
    /// Lay the specs out. The global `offset` primes the sequential
    /// placement cursor and is subtracted from absolute `@` addresses.
    pub fn from_specs(specs: &[PartSpec], offset: u64) -> Self {
        let mut parts = Vec::new();
        let mut next_addr = offset;
        for spec in specs.iter().take(MAX_PARTITIONS) {
            let addr = match spec.offset {
                Some(abs) => abs.wrapping_sub(offset),
                None => next_addr,
            };
            next_addr = addr + spec.length;
            parts.push(Partition {
                name: spec.name.clone(),
                addr,
                length: spec.length,
            });
        }
        Self { parts }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Serialize the `copy`-th CRC32-signed table copy.
    pub fn copy_bytes(&self, copy: u32) -> Vec<u8> {
        let mut buf = vec![0u8; TABLE_SIZE];

        LittleEndian::write_u32(&mut buf[4..8], TABLE_VERSION);
        buf[8..16].copy_from_slice(TABLE_MAGIC);
        LittleEndian::write_u32(&mut buf[20..24], copy);
        LittleEndian::write_u32(&mut buf[24..28], self.parts.len() as u32);

        for (i, part) in self.parts.iter().enumerate() {
            let entry = &mut buf[ENTRIES_OFFSET + i * ENTRY_SIZE..ENTRIES_OFFSET + (i + 1) * ENTRY_SIZE];
            LittleEndian::write_u32(&mut entry[0..4], (part.addr >> 41) as u32);
            LittleEndian::write_u32(&mut entry[4..8], (part.addr >> 9) as u32);
            LittleEndian::write_u32(&mut entry[8..12], (part.length >> 41) as u32);
            LittleEndian::write_u32(&mut entry[12..16], (part.length >> 9) as u32);
            entry[16..16 + CLASS_NAME.len()].copy_from_slice(CLASS_NAME);
            let name = part.name.as_bytes();
            let name_len = name.len().min(NAME_LEN - 1);
            entry[32..32 + name_len].copy_from_slice(&name[..name_len]);
            LittleEndian::write_u32(&mut entry[48..52], USER_TYPE);
        }

        let crc = calculate_crc32(&buf[4..]);
        LittleEndian::write_u32(&mut buf[0..4], crc);
        buf
    }

    /// Emit all four redundant copies.
    pub fn write_copies<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for copy in 0..TABLE_COPIES {
            writer.write_all(&self.copy_bytes(copy))?;
        }
        Ok(())
    }
}
