//! Output destinations: files, streams, block devices.
//!
//! Every component appends bytes strictly in final-file-offset order, so
//! the sink only ever needs to move forward. Whether "moving forward"
//! is a seek or a run of zero bytes is decided once at open time by the
//! `can_seek` capability; no call site checks errno.

use crate::error::{Boot0ImgError, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

const ZERO_CHUNK: usize = 8192;

enum Dest {
    /// Regular file, created by us, truncated to content at the end.
    File(File),
    /// Block device: opened read-write, never truncated, zero-padded up
    /// to the declared image length instead.
    Device(File),
    /// stdout or any other non-seekable byte stream.
    Stream(Box<dyn Write>),
}

/// Strictly forward, append-only writer over the output destination.
pub struct OutputSink {
    dest: Dest,
    can_seek: bool,
    pos: u64,
}

impl OutputSink {
    /// Create (or replace) a regular output file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Boot0ImgError::OutputOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dest: Dest::File(file),
            can_seek: true,
            pos: 0,
        })
    }

    /// Open a block device read-write, without truncating it.
    pub fn device<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Boot0ImgError::OutputOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            dest: Dest::Device(file),
            can_seek: true,
            pos: 0,
        })
    }

    /// Write to standard output. Pipes cannot seek, so skipped regions
    /// are emitted as zero bytes.
    pub fn stdout() -> Self {
        Self::stream(Box::new(io::stdout()))
    }

    /// Write to an arbitrary non-seekable stream.
    pub fn stream(writer: Box<dyn Write>) -> Self {
        Self {
            dest: Dest::Stream(writer),
            can_seek: false,
            pos: 0,
        }
    }

    /// Bytes emitted (or skipped over) so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        match &mut self.dest {
            Dest::File(f) | Dest::Device(f) => f.write_all(buf)?,
            Dest::Stream(w) => w.write_all(buf)?,
        }
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Move forward `n` bytes: a forward seek when the sink allows it, a
    /// run of zero bytes otherwise.
    pub fn advance(&mut self, n: u64) -> Result<()> {
        if self.can_seek {
            match &mut self.dest {
                Dest::File(f) | Dest::Device(f) => {
                    f.seek(SeekFrom::Current(n as i64))?;
                }
                Dest::Stream(_) => unreachable!("streams are never seekable"),
            }
            self.pos += n;
        } else {
            self.write_zeros(n)?;
        }
        Ok(())
    }

    /// Advance to an absolute offset. Offsets behind the current
    /// position are a bug in the caller: nothing here moves backward.
    pub fn advance_to(&mut self, offset: u64) -> Result<()> {
        assert!(offset >= self.pos, "sink only moves forward");
        self.advance(offset - self.pos)
    }

    fn write_zeros(&mut self, n: u64) -> Result<()> {
        let zeros = [0u8; ZERO_CHUNK];
        let mut left = n;
        while left > 0 {
            let chunk = left.min(ZERO_CHUNK as u64) as usize;
            self.write(&zeros[..chunk])?;
            left -= chunk as u64;
        }
        Ok(())
    }

    /// Settle the final image length and flush.
    ///
    /// Files are cut (or extended) at the true end of content; devices
    /// cannot be shrunk and are zero-filled up to `total_len` instead;
    /// plain streams end where the content ends.
    pub fn finalize(mut self, total_len: u64) -> Result<()> {
        if matches!(self.dest, Dest::Device(_)) && total_len > self.pos {
            self.write_zeros(total_len - self.pos)?;
        }
        match &mut self.dest {
            Dest::File(f) => {
                f.set_len(self.pos)?;
                f.flush()?;
            }
            Dest::Device(f) => f.flush()?,
            Dest::Stream(w) => w.flush()?,
        }
        Ok(())
    }
}
