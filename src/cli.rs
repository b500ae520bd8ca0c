//! Command line interface for boot0img

use crate::builder::Boot0ImageBuilder;
use crate::buffer::RawBuffer;
use crate::checksum;
use crate::error::{Boot0ImgError, Result};
use crate::mbr::PartitionKind;
use crate::section;
use crate::sink::OutputSink;
use crate::VERSION;
use clap::Parser;
use std::path::PathBuf;

/// Command line arguments for boot0img
#[derive(Parser, Debug)]
#[command(name = "boot0img")]
#[command(version = VERSION)]
#[command(about = "Assemble an Allwinner boot image for boot0", long_about = None)]
pub struct Args {
    /// Output file name, stdout if omitted
    #[arg(short, long)]
    pub output: Option<String>,

    /// Block device to write to (overrides --output, not truncated)
    #[arg(short = 'D', long)]
    pub device: Option<PathBuf>,

    /// boot0 image to embed into the image
    #[arg(short, long)]
    pub boot0: Option<PathBuf>,

    /// boot0 image to embed, relocating its firmware load offset
    #[arg(short = 'B', long)]
    pub boot0_patch: Option<PathBuf>,

    /// Undo a previous firmware-offset relocation (with --boot0-patch)
    #[arg(long, requires = "boot0_patch")]
    pub revert: bool,

    /// Calculate and verify the checksum of a file, build nothing
    #[arg(short, long)]
    pub checksum: Option<PathBuf>,

    /// U-Boot image file (without SPL)
    #[arg(short, long)]
    pub uboot: Option<PathBuf>,

    /// Image file to write into SRAM
    #[arg(short, long)]
    pub sram: Option<PathBuf>,

    /// Image file to write into DRAM, or trampoline64:<addr> /
    /// trampoline32:<addr>
    #[arg(short, long)]
    pub dram: Option<String>,

    /// Reset vector address for arisc
    #[arg(short, long = "arisc_entry")]
    pub arisc_entry: Option<String>,

    /// Use the header found in the U-Boot binary (requires --uboot)
    #[arg(short, long = "embedded_header")]
    pub embedded_header: bool,

    /// Prepend a partition table with a FAT partition of this many MB
    #[arg(short, long)]
    pub partition: Option<u32>,

    /// Prepend a partition table with an EFI partition of this many MB
    #[arg(short = 'E', long)]
    pub efi_partition: Option<u32>,

    /// Quiet mode - only output errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Main CLI handler
pub fn run(args: Args) -> Result<()> {
    if let Some(path) = &args.checksum {
        return verify_file(path, !args.quiet);
    }

    let mut builder = Boot0ImageBuilder::new().quiet(args.quiet);

    if let Some(path) = &args.boot0_patch {
        builder = builder.boot0(path).patch_boot0(true).revert_patch(args.revert);
    } else if let Some(path) = &args.boot0 {
        builder = builder.boot0(path);
    }
    builder = builder.embedded_header(args.embedded_header);
    if let Some(path) = &args.uboot {
        builder = builder.uboot(path);
    }
    if let Some(source) = &args.dram {
        builder = builder.dram(source);
    }
    if let Some(path) = &args.sram {
        builder = builder.sram(path);
    }
    if let Some(addr) = &args.arisc_entry {
        builder = builder.arisc_entry(section::parse_address(addr));
    }
    if let Some(size_mb) = args.partition {
        builder = builder.partition(PartitionKind::Fat, size_mb);
    } else if let Some(size_mb) = args.efi_partition {
        builder = builder.partition(PartitionKind::Efi, size_mb);
    }

    // Surface configuration errors before touching the output.
    builder.validate()?;

    let sink = match (&args.device, args.output.as_deref()) {
        (Some(path), _) => OutputSink::device(path)?,
        (None, Some("stdout")) | (None, None) => OutputSink::stdout(),
        (None, Some(path)) => OutputSink::create(path)?,
    };

    builder.write(sink)
}

/// Verify-only mode: print the computed image checksum and compare it
/// with the stored one.
fn verify_file(path: &PathBuf, verbose: bool) -> Result<()> {
    let image = RawBuffer::load(path)?;
    let report = checksum::verify(image.as_slice());

    if verbose {
        println!("{}: {} Bytes", path.display(), image.len());
    }
    println!("0x{:08x}", report.computed);
    if verbose {
        println!(
            "stored checksum: 0x{:08x}, {}matching",
            report.stored,
            if report.matches { "" } else { "NOT " }
        );
    }

    if report.matches {
        Ok(())
    } else {
        Err(Boot0ImgError::ChecksumMismatch {
            stored: report.stored,
            computed: report.computed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_build() {
        let args = Args::parse_from([
            "boot0img",
            "-o",
            "out.img",
            "--dram",
            "trampoline64:0x40000000",
            "--sram",
            "scp.bin",
            "-a",
            "0x44008",
        ]);
        assert_eq!(args.output.as_deref(), Some("out.img"));
        assert_eq!(args.dram.as_deref(), Some("trampoline64:0x40000000"));
        assert_eq!(args.sram, Some(PathBuf::from("scp.bin")));
        assert_eq!(args.arisc_entry.as_deref(), Some("0x44008"));
        assert!(!args.embedded_header);
    }

    #[test]
    fn test_args_parse_checksum_mode() {
        let args = Args::parse_from(["boot0img", "--checksum", "image.img", "-q"]);
        assert_eq!(args.checksum, Some(PathBuf::from("image.img")));
        assert!(args.quiet);
    }

    #[test]
    fn test_run_embedded_header_without_uboot() {
        let args = Args::parse_from(["boot0img", "-e", "-s", "scp.bin", "-o", "out.img"]);
        let err = run(args).unwrap_err();
        assert!(matches!(err, Boot0ImgError::EmbeddedHeaderNeedsUboot));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_revert_requires_patch() {
        assert!(Args::try_parse_from(["boot0img", "--revert", "-s", "scp.bin"]).is_err());
        assert!(
            Args::try_parse_from(["boot0img", "-B", "boot0.img", "--revert", "-s", "scp.bin"])
                .is_ok()
        );
    }
}
