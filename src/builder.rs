//! Whole-image composition.
//!
//! Pulls the pieces together in strictly increasing file-offset order:
//! partition table, boot0 prefix, header, U-Boot, DRAM, SRAM. The sink
//! never has to move backward (see [`crate::sink`]).

use crate::buffer::RawBuffer;
use crate::checksum::{self, word_sum};
use crate::error::{Boot0ImgError, Result};
use crate::header::{DRAM_ENTRY, ImageHeader, SRAM_ENTRY};
use crate::mbr::{PartitionKind, PartitionTable};
use crate::patch::{Boot0Patcher, PatchState};
use crate::section::{self, DramSource};
use crate::sink::OutputSink;
use crate::{
    BOOT0_ALIGN, BOOT0_OFFSET, BOOT0_SIZE, HEADER_SIZE, SECTOR_SIZE, UBOOT_OFFSET_KB, align_up,
};
use std::path::PathBuf;

/// Configures and writes a complete boot0 image.
///
/// Mirrors the command line: every setter corresponds to one option.
#[derive(Debug, Clone, Default)]
pub struct Boot0ImageBuilder {
    boot0: Option<PathBuf>,
    patch_boot0: bool,
    revert_patch: bool,
    uboot: Option<PathBuf>,
    embedded_header: bool,
    dram: Option<DramSource>,
    sram: Option<PathBuf>,
    arisc_entry: Option<u32>,
    partition: Option<(PartitionKind, u32)>,
    quiet: bool,
}

impl Boot0ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed a boot0 binary, producing a raw-SD image.
    pub fn boot0(mut self, path: impl Into<PathBuf>) -> Self {
        self.boot0 = Some(path.into());
        self
    }

    /// Attempt to relocate the embedded boot0's firmware load offset.
    pub fn patch_boot0(mut self, patch: bool) -> Self {
        self.patch_boot0 = patch;
        self
    }

    /// Reverse a previous relocation instead of applying one.
    pub fn revert_patch(mut self, revert: bool) -> Self {
        self.revert_patch = revert;
        self
    }

    pub fn uboot(mut self, path: impl Into<PathBuf>) -> Self {
        self.uboot = Some(path.into());
        self
    }

    /// Reuse the header found inside the U-Boot binary instead of
    /// synthesizing one.
    pub fn embedded_header(mut self, embedded: bool) -> Self {
        self.embedded_header = embedded;
        self
    }

    /// DRAM payload: a file path or a `trampoline64:`/`trampoline32:`
    /// directive.
    pub fn dram(mut self, source: &str) -> Self {
        self.dram = Some(DramSource::parse(source));
        self
    }

    pub fn sram(mut self, path: impl Into<PathBuf>) -> Self {
        self.sram = Some(path.into());
        self
    }

    /// Populate the arisc reset vector with a jump to this address.
    pub fn arisc_entry(mut self, address: u32) -> Self {
        self.arisc_entry = Some(address);
        self
    }

    /// Emit a legacy partition table ahead of the image.
    pub fn partition(mut self, kind: PartitionKind, size_mb: u32) -> Self {
        self.partition = Some((kind, size_mb));
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Check that the configuration is complete.
    pub fn validate(&self) -> Result<()> {
        if self.embedded_header && self.uboot.is_none() {
            return Err(Boot0ImgError::EmbeddedHeaderNeedsUboot);
        }
        if self.sram.is_none() {
            return Err(Boot0ImgError::MissingSram);
        }
        Ok(())
    }

    fn info(&self, line: std::fmt::Arguments) {
        if !self.quiet {
            eprintln!("{line}");
        }
    }

    /// Compose the image and write it through `sink`.
    pub fn write(&self, mut sink: OutputSink) -> Result<()> {
        self.validate()?;

        let mut checksum: u32 = 0;

        // U-Boot payload and the header it may carry.
        let mut uboot = match &self.uboot {
            Some(path) => {
                let mut buf = RawBuffer::load(path)?;
                self.info(format_args!("U-Boot: {}: {} Bytes", path.display(), buf.len()));
                buf.pad_to(SECTOR_SIZE);
                Some(buf)
            }
            None => None,
        };

        let mut header;
        let mut offset;
        match &uboot {
            Some(buf) if self.embedded_header => {
                header = ImageHeader::from_embedded(buf.as_slice())?;
                checksum = checksum.wrapping_add(word_sum(&buf.as_slice()[HEADER_SIZE..]));
                offset = buf.len();
            }
            Some(buf) => {
                header = ImageHeader::new();
                checksum = checksum.wrapping_add(word_sum(buf.as_slice()));
                offset = buf.len() + HEADER_SIZE;
            }
            None => {
                header = ImageHeader::new();
                offset = HEADER_SIZE;
            }
        }

        // DRAM section, if any.
        let dram = match &self.dram {
            Some(source) => {
                match source {
                    DramSource::File(path) => {
                        self.info(format_args!("DRAM  : {}", path.display()))
                    }
                    DramSource::Trampoline { aarch64, address } => self.info(format_args!(
                        "DRAM  : trampoline{}:0x{address:x}",
                        if *aarch64 { 64 } else { 32 }
                    )),
                }
                let mut buf = source.load()?;
                buf.pad_to(SECTOR_SIZE);
                checksum = checksum.wrapping_add(word_sum(buf.as_slice()));
                header.set_section_entry(DRAM_ENTRY, offset as u32, buf.len() as u32);
                offset += buf.len();
                Some(buf)
            }
            None => None,
        };

        // SRAM section, always present.
        let sram_path = self.sram.as_ref().expect("validated above");
        let sram = section::load_sram(sram_path, self.arisc_entry)?;
        self.info(format_args!(
            "SRAM  : {}: {} Bytes",
            sram_path.display(),
            sram.len()
        ));
        checksum = checksum.wrapping_add(word_sum(sram.as_slice()));
        header.set_section_entry(SRAM_ENTRY, offset as u32, sram.len() as u32);
        offset += sram.len();

        let total = align_up(offset, BOOT0_ALIGN);
        header.set_sizes(offset as u32, total as u32);
        header.seal(checksum);

        // an embedded header lives inside the U-Boot payload
        if self.embedded_header {
            if let Some(buf) = &mut uboot {
                buf.as_mut_slice()[..HEADER_SIZE].copy_from_slice(header.as_bytes());
            }
        }

        // Raw-SD prefix: partition table, boot0, firmware gap.
        let mut final_len = total as u64;
        if self.boot0.is_some() || self.partition.is_some() {
            if let Some((kind, size_mb)) = self.partition {
                let table = PartitionTable {
                    kind,
                    size_mb,
                    patched_layout: self.patch_boot0 && !self.revert_patch,
                };
                sink.write(&table.to_bytes())?;
            }

            if let Some(path) = &self.boot0 {
                let boot0 = self.prepare_boot0(path)?;
                sink.advance_to(BOOT0_OFFSET as u64)?;
                sink.write(boot0.as_slice())?;
            }

            let firmware_offset = if self.patch_boot0 && !self.revert_patch {
                (BOOT0_OFFSET + BOOT0_SIZE) as u64
            } else {
                (UBOOT_OFFSET_KB * 1024) as u64
            };
            sink.advance_to(firmware_offset)?;
            final_len += firmware_offset;
        }

        if !self.embedded_header {
            sink.write(header.as_bytes())?;
        }
        if let Some(buf) = &uboot {
            sink.write(buf.as_slice())?;
        }
        if let Some(buf) = &dram {
            sink.write(buf.as_slice())?;
        }
        sink.write(sram.as_slice())?;

        sink.finalize(final_len)
    }

    /// Load the boot0 prefix and, when asked, relocate its firmware
    /// load offset and refresh its checksum.
    fn prepare_boot0(&self, path: &std::path::Path) -> Result<RawBuffer> {
        let mut boot0 = RawBuffer::load(path)?;
        if boot0.len() > BOOT0_SIZE {
            return Err(Boot0ImgError::Boot0TooBig { size: boot0.len() });
        }
        self.info(format_args!(
            "boot0 : {}: {} Bytes",
            path.display(),
            boot0.len()
        ));

        if self.patch_boot0 {
            boot0.pad_to(4);
            let patcher = if self.revert_patch {
                Boot0Patcher::reverting()
            } else {
                Boot0Patcher::new()
            };
            let outcome = patcher.apply(boot0.as_mut_slice());
            match outcome.state {
                PatchState::Patched => {
                    self.info(format_args!("boot0 : firmware offset relocated"))
                }
                PatchState::AlreadyPatched => {
                    self.info(format_args!("boot0 : firmware offset already in place"))
                }
                PatchState::Unrecognized => self.info(format_args!(
                    "boot0 : unknown variant, passed through unmodified"
                )),
            }
            if outcome.checksum_dirty {
                checksum::refresh(boot0.as_mut_slice());
            }
        }

        Ok(boot0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_missing_sram() {
        let err = Boot0ImageBuilder::new().validate().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_validate_embedded_header_needs_uboot() {
        let err = Boot0ImageBuilder::new()
            .sram("scp.bin")
            .embedded_header(true)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Boot0ImgError::EmbeddedHeaderNeedsUboot));
    }

    #[test]
    fn test_validate_complete() {
        assert!(Boot0ImageBuilder::new().sram("scp.bin").validate().is_ok());
    }
}
