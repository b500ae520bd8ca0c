//! # boot0img
//!
//! Assemble a firmware image for the Allwinner "boot0" first-stage loader.
//!
//! boot0 is the mask-ROM-loaded program that locates the secondary firmware
//! blob on an SD card and jumps into it. This crate composes that blob: a
//! fixed 1536-byte header with a word-sum checksum, a DRAM payload (or a
//! synthesized trampoline), an SRAM/SCP payload (optionally rearranged for
//! the arisc control processor), and an optional U-Boot binary, all padded
//! and placed at the offsets the loader expects. The blob can be prefixed
//! with an existing boot0 binary (and a legacy partition table) to produce
//! an image writable straight to an SD card or block device.
//!
//! ## Example
//!
//! ```no_run
//! use boot0img::{Boot0ImageBuilder, OutputSink};
//!
//! let builder = Boot0ImageBuilder::new()
//!     .sram("scp.bin")
//!     .dram("trampoline64:0x40000000")
//!     .quiet(true);
//! builder.write(OutputSink::create("boot.img")?)?;
//! # Ok::<(), boot0img::Boot0ImgError>(())
//! ```

pub mod buffer;
pub mod builder;
pub mod checksum;
pub mod cli;
pub mod crc;
pub mod error;
pub mod genpart;
pub mod header;
pub mod mbr;
pub mod patch;
pub mod section;
pub mod sink;

pub use buffer::RawBuffer;
pub use builder::Boot0ImageBuilder;
pub use checksum::{ChecksumReport, word_sum};
pub use crc::calculate_crc32;
pub use error::{Boot0ImgError, Result};
pub use header::ImageHeader;
pub use patch::{Boot0Patcher, PatchOutcome, PatchState};
pub use sink::OutputSink;

/// Current version of the tool.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed size of the boot0 image header in bytes.
pub const HEADER_SIZE: usize = 0x600;

/// Seed folded into every word-sum checksum of the format.
pub const CHECKSUM_SEED: u32 = 0x5F0A_6C39;

/// Byte offset of the boot0 carve-out in a raw SD image.
pub const BOOT0_OFFSET: usize = 8192;

/// Maximum size of a boot0 binary.
pub const BOOT0_SIZE: usize = 32768;

/// Alignment of the final image length.
pub const BOOT0_ALIGN: usize = 0x4000;

/// DRAM address where boot0 loads the assembled blob.
pub const UBOOT_LOAD_ADDR: u32 = 0x4A00_0000;

/// Offset of the firmware blob in a raw SD image, in KiB.
pub const UBOOT_OFFSET_KB: usize = 19096;

/// Sector size the format expresses offsets and padding in.
pub const SECTOR_SIZE: usize = 512;

/// Round `value` up to the next multiple of `align`.
pub fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}
