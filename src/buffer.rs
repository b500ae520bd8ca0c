//! Growable owned byte buffers and whole-file loading.

use crate::error::{Boot0ImgError, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;

/// Owned, growable byte buffer.
///
/// All section payloads, headers and boot0 prefixes live in one of these.
/// Growing always zero-fills the new tail; nothing ever reads
/// uninitialized memory. Word accessors are little-endian and indexed in
/// 4-byte words, matching how the boot0 format addresses its header
/// fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBuffer {
    data: Vec<u8>,
}

impl RawBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-filled buffer of `len` bytes.
    pub fn with_len(len: usize) -> Self {
        Self {
            data: vec![0u8; len],
        }
    }

    /// Take ownership of existing bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Read an entire file into a fresh buffer.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Boot0ImgError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Grow to `new_len` bytes, zero-filling the new tail.
    ///
    /// Shrinking is not a thing this buffer does; a smaller `new_len` is
    /// left as is.
    pub fn grow_zeroed(&mut self, new_len: usize) {
        if new_len > self.data.len() {
            self.data.resize(new_len, 0);
        }
    }

    /// Zero-pad the buffer up to the next multiple of `align`.
    pub fn pad_to(&mut self, align: usize) {
        let padded = crate::align_up(self.data.len(), align);
        self.grow_zeroed(padded);
    }

    /// Little-endian u32 at word index `word` (byte offset `word * 4`).
    pub fn get_u32(&self, word: usize) -> u32 {
        LittleEndian::read_u32(&self.data[word * 4..word * 4 + 4])
    }

    /// Store a little-endian u32 at word index `word`.
    pub fn put_u32(&mut self, word: usize, value: u32) {
        LittleEndian::write_u32(&mut self.data[word * 4..word * 4 + 4], value);
    }
}

impl AsRef<[u8]> for RawBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
