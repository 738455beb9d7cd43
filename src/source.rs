//! Random-access byte window over a file or block device.
//!
//! Deliberately crude: the format is small and randomly accessed only in
//! a few patterns (sequential inode walk, the occasional jump to a data
//! block), so a single rolling 16 KiB window covers them all. Generic
//! over `R: Read + Seek` rather than hardcoded to `std::fs::File` so
//! tests can drive it against an in-memory `io::Cursor`.

use std::io::{self, Read, Seek, SeekFrom};

/// log2 of the 8 KiB alignment unit.
const WINDOW_BITS: u32 = 13;
/// Size of a single alignment unit: 8 KiB.
const WINDOW_SIZE: u64 = 1 << WINDOW_BITS;
/// Size of the resident window: two adjacent 8 KiB blocks, 16 KiB total.
const BUFFER_SIZE: usize = (WINDOW_SIZE * 2) as usize;

/// A windowed, cached view over a seekable byte source.
///
/// Callers must not hold a slice returned by [`ImageSource::read`] across
/// a subsequent call: the window may be replaced by then.
pub struct ImageSource<R> {
    inner: R,
    buffer: Vec<u8>,
    /// The 8 KiB-aligned block number the buffer currently starts at, or
    /// `None` if nothing has been cached yet.
    cached_block: Option<u64>,
}

impl<R: Read + Seek> ImageSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: vec![0; BUFFER_SIZE],
            cached_block: None,
        }
    }

    /// Returns a slice of `len` bytes starting at `offset`, refilling the
    /// resident window if necessary.
    ///
    /// `len` must not exceed `BUFFER_SIZE - (offset % WINDOW_SIZE)`: every
    /// caller in this crate reads at most one inode record or one 32-bit
    /// pointer at a time, both of which fit comfortably inside a single
    /// window no matter the alignment of `offset`.
    ///
    /// A window near the end of the image may have fewer than
    /// `BUFFER_SIZE` bytes behind it; the tail is left zero-filled rather
    /// than treating a short read as an error, since every valid image is
    /// at least one `BLOCK_SIZE` but need not be a multiple of the window
    /// size.
    pub fn read(&mut self, offset: u64, len: usize) -> io::Result<&[u8]> {
        let block = offset >> WINDOW_BITS;
        if self.cached_block != Some(block) {
            self.inner.seek(SeekFrom::Start(block << WINDOW_BITS))?;
            self.buffer.fill(0);
            let mut filled = 0;
            while filled < self.buffer.len() {
                let n = self.inner.read(&mut self.buffer[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            self.cached_block = Some(block);
        }
        let start = (offset - (block << WINDOW_BITS)) as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "read crosses window boundary")
            })?;
        Ok(&self.buffer[start..end])
    }

    /// Reads exactly `N` bytes at `offset` into a fixed-size array.
    pub fn read_array<const N: usize>(&mut self, offset: u64) -> io::Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(offset, N)?);
        Ok(out)
    }

    /// Reads a little-endian `u32` at `offset`.
    pub fn read_u32(&mut self, offset: u64) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(offset)?))
    }
}
