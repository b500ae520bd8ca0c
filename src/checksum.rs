//! The boot0 word-sum checksum.
//!
//! Not a CRC: the format's integrity check is the wrapping sum of the
//! image interpreted as little-endian 32-bit words, seeded with a fixed
//! constant. The header stores the sum at byte offset 12, with that word
//! itself replaced by the seed while summing.

use crate::CHECKSUM_SEED;
use byteorder::{ByteOrder, LittleEndian};

/// Byte offset of the stored checksum word inside an image.
pub const CHECKSUM_WORD_OFFSET: usize = 12;

/// Wrapping sum of `buf` interpreted as little-endian u32 words.
///
/// The length must be a multiple of 4. Callers pad their buffers before
/// summing; this function never silently drops trailing bytes.
pub fn word_sum(buf: &[u8]) -> u32 {
    debug_assert_eq!(buf.len() % 4, 0);
    buf.chunks_exact(4)
        .fold(0u32, |sum, w| sum.wrapping_add(LittleEndian::read_u32(w)))
}

/// Result of re-verifying a stored image checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumReport {
    /// Stored and recomputed checksums agree.
    pub matches: bool,
    /// The checksum word embedded in the image.
    pub stored: u32,
    /// What the checksum should be for the current contents.
    pub computed: u32,
}

/// Recompute the checksum of a complete image and compare it against the
/// word stored at byte offset 12.
///
/// Images whose length is not a multiple of 4 have their trailing bytes
/// ignored here, matching what the loader sums.
pub fn verify(image: &[u8]) -> ChecksumReport {
    if image.len() < CHECKSUM_WORD_OFFSET + 4 {
        return ChecksumReport {
            matches: false,
            stored: 0,
            computed: CHECKSUM_SEED,
        };
    }

    let stored = LittleEndian::read_u32(&image[CHECKSUM_WORD_OFFSET..CHECKSUM_WORD_OFFSET + 4]);
    let body = &image[CHECKSUM_WORD_OFFSET + 4..];
    let body = &body[..body.len() & !3];

    let computed = word_sum(&image[..CHECKSUM_WORD_OFFSET])
        .wrapping_add(word_sum(body))
        .wrapping_add(CHECKSUM_SEED);

    ChecksumReport {
        matches: stored == computed,
        stored,
        computed,
    }
}

/// Overwrite the stored checksum word so that [`verify`] passes again.
///
/// Used after patching a boot0 binary in place. Buffers too short to
/// hold the checksum word are left alone, mirroring [`verify`].
pub fn refresh(image: &mut [u8]) {
    if image.len() < CHECKSUM_WORD_OFFSET + 4 {
        return;
    }
    LittleEndian::write_u32(
        &mut image[CHECKSUM_WORD_OFFSET..CHECKSUM_WORD_OFFSET + 4],
        CHECKSUM_SEED,
    );
    let trimmed = image.len() & !3;
    let sum = word_sum(&image[..trimmed]);
    LittleEndian::write_u32(&mut image[CHECKSUM_WORD_OFFSET..CHECKSUM_WORD_OFFSET + 4], sum);
}
