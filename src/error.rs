//! Error types for boot0img.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Boot0ImgError>;

/// Errors the composer can run into.
///
/// Every variant maps to the process exit code the tool has always used,
/// see [`Boot0ImgError::exit_code`].
#[derive(Debug, Error)]
pub enum Boot0ImgError {
    /// An input file could not be read.
    #[error("{}: {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },

    /// The output file or device could not be opened.
    #[error("cannot open {}: {}", .path.display(), .source)]
    OutputOpen { path: PathBuf, source: io::Error },

    /// Writing to the output sink failed.
    #[error("write error: {0}")]
    Write(#[from] io::Error),

    /// The boot0 binary exceeds its 32 KiB carve-out.
    #[error("boot0 is bigger than 32K ({size} Bytes)")]
    Boot0TooBig { size: usize },

    /// No SRAM/SCP payload was given and no checksum-only mode requested.
    #[error("boot0 requires an \"SCP\" binary (--sram)")]
    MissingSram,

    /// `--embedded_header` only makes sense together with `--uboot`.
    #[error("must provide U-Boot file (--uboot) with embedded header")]
    EmbeddedHeaderNeedsUboot,

    /// The U-Boot binary is too small to contain an embedded header.
    #[error("U-Boot binary too small for an embedded header ({size} Bytes)")]
    EmbeddedHeaderTooSmall { size: usize },

    /// Checksum verification mode found a stale stored checksum.
    #[error("checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

impl Boot0ImgError {
    /// Process exit code mandated for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChecksumMismatch { .. } => 1,
            Self::MissingSram
            | Self::EmbeddedHeaderNeedsUboot
            | Self::EmbeddedHeaderTooSmall { .. } => 2,
            Self::Read { .. } | Self::Boot0TooBig { .. } => 3,
            Self::OutputOpen { .. } | Self::Write(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Boot0ImgError::MissingSram.exit_code(), 2);
        assert_eq!(Boot0ImgError::EmbeddedHeaderNeedsUboot.exit_code(), 2);
        assert_eq!(Boot0ImgError::Boot0TooBig { size: 40000 }.exit_code(), 3);
        assert_eq!(
            Boot0ImgError::ChecksumMismatch {
                stored: 0,
                computed: 1
            }
            .exit_code(),
            1
        );
        let io_err = || io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(
            Boot0ImgError::Read {
                path: "x".into(),
                source: io_err()
            }
            .exit_code(),
            3
        );
        assert_eq!(
            Boot0ImgError::OutputOpen {
                path: "x".into(),
                source: io_err()
            }
            .exit_code(),
            5
        );
    }
}
