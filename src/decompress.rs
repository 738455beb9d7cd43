//! Block decompression: LZO1X, zlib, or uncompressed passthrough, plus
//! the LZO overlap self-check.
//!
//! The zlib path reuses a single `flate2::Decompress` stream across the
//! whole walk instead of creating one per block. The LZO path uses the
//! `rust-lzo` crate's safe decompressor for the primary pass; the overlap
//! self-check needs the input and output buffers to alias the way an
//! in-kernel decompressor would alias them, which the safe wrapper can't
//! express, so that one pass calls the underlying `lzo1x_decompress_safe`
//! C symbol directly through a thin `extern "C"` declaration.

use crate::crc;
use crate::error::{PolyfsError, Result};
use crate::format::{BLOCK_MAX_SIZE_WITH_OVERHEAD, BLOCK_SIZE, FLAG_LZO_COMPRESSION, FLAG_ZLIB_COMPRESSION, LZO_MAX_COMPRESSED};
use flate2::{Decompress, FlushDecompress, Status};
use rust_lzo::LZOContext;
use std::os::raw::{c_int, c_void};

#[allow(non_camel_case_types)]
type lzo_uint = usize;

// `rust-lzo` links against liblzo2's C sources; this declares the same
// entry point it wraps, used only for the overlap self-check below,
// which needs the input and output buffers to alias within one
// allocation the way `LZOContext::decompress`'s safe interface cannot
// express.
extern "C" {
    fn lzo1x_decompress_safe(
        src: *const u8,
        src_len: lzo_uint,
        dst: *mut u8,
        dst_len: *mut lzo_uint,
        wrkmem: *mut c_void,
    ) -> c_int;
}

const LZO_E_OK: c_int = 0;

/// Decompresses a single block, writing into the shared scratch buffer
/// and returning the number of decompressed bytes.
///
/// Owns the zlib inflate stream and the `2*BLOCK_SIZE` scratch buffer,
/// both reused across the whole walk.
pub struct Decompressor {
    scratch: Vec<u8>,
    inflate: Decompress,
    lzo: LZOContext,
    flags: u32,
}

impl Decompressor {
    pub fn new(flags: u32) -> Self {
        Self {
            scratch: vec![0u8; BLOCK_SIZE * 2],
            inflate: Decompress::new(true),
            lzo: LZOContext::new(),
            flags,
        }
    }

    /// Decompresses `compressed` (the `declared_len`-byte slice read from
    /// the image) according to the superblock's compression flag.
    /// Returns the slice of the scratch buffer holding the decompressed
    /// bytes.
    pub fn uncompress_block(&mut self, compressed: &[u8]) -> Result<&[u8]> {
        if self.flags & FLAG_LZO_COMPRESSION != 0 {
            self.uncompress_lzo(compressed)
        } else if self.flags & FLAG_ZLIB_COMPRESSION != 0 {
            self.uncompress_zlib(compressed)
        } else {
            self.uncompress_raw(compressed)
        }
    }

    fn uncompress_lzo(&mut self, compressed: &[u8]) -> Result<&[u8]> {
        if compressed.len() > LZO_MAX_COMPRESSED {
            return Err(PolyfsError::uncorrected("data block too large"));
        }
        let decompressed = self
            .lzo
            .decompress(compressed, BLOCK_SIZE * 2)
            .map_err(|e| PolyfsError::uncorrected(format!("decompression error {e}")))?;
        let out_len = decompressed.len();
        self.scratch[..out_len].copy_from_slice(&decompressed);
        let checksum = crc::compute(&self.scratch[..out_len]);

        // Overlap self-check: copy the compressed data to the tail of a
        // scratch buffer sized for the worst case, then decompress in
        // place with input and output aliasing the same allocation.
        let mut overlap = vec![0u8; BLOCK_MAX_SIZE_WITH_OVERHEAD];
        let tail_off = BLOCK_MAX_SIZE_WITH_OVERHEAD - compressed.len();
        overlap[tail_off..].copy_from_slice(compressed);
        let mut expected_len: lzo_uint = if compressed.len() < BLOCK_SIZE {
            out_len
        } else {
            BLOCK_SIZE
        };
        let err = unsafe {
            lzo1x_decompress_safe(
                overlap.as_ptr().add(tail_off),
                compressed.len(),
                overlap.as_mut_ptr(),
                &mut expected_len,
                std::ptr::null_mut(),
            )
        };
        if err != LZO_E_OK {
            return Err(PolyfsError::uncorrected(format!(
                "LZO overlap decompression failed: {err} (1)"
            )));
        }
        let checksum2 = crc::compute(&overlap[..expected_len]);
        if expected_len != out_len || checksum != checksum2 {
            return Err(PolyfsError::uncorrected(
                "LZO overlap decompression failed (2)",
            ));
        }

        Ok(&self.scratch[..out_len])
    }

    fn uncompress_zlib(&mut self, compressed: &[u8]) -> Result<&[u8]> {
        if compressed.len() > BLOCK_SIZE * 2 {
            return Err(PolyfsError::uncorrected("data block too large"));
        }
        self.inflate.reset(true);
        let before_out = self.inflate.total_out();
        let status = self
            .inflate
            .decompress(compressed, &mut self.scratch, FlushDecompress::Finish)
            .map_err(|e| PolyfsError::uncorrected(format!("decompression error: {e}")))?;
        if status != Status::StreamEnd {
            return Err(PolyfsError::uncorrected("decompression error"));
        }
        let produced = (self.inflate.total_out() - before_out) as usize;
        Ok(&self.scratch[..produced])
    }

    fn uncompress_raw(&mut self, compressed: &[u8]) -> Result<&[u8]> {
        if compressed.len() > BLOCK_SIZE {
            return Err(PolyfsError::uncorrected("data block too large"));
        }
        self.scratch[..compressed.len()].copy_from_slice(compressed);
        Ok(&self.scratch[..compressed.len()])
    }

    /// Returns a zero-filled slice of `len` bytes from the scratch buffer,
    /// for a hole block.
    pub fn zero_fill(&mut self, len: usize) -> &[u8] {
        self.scratch[..len].fill(0);
        &self.scratch[..len]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn zlib_roundtrip() {
        let mut dec = Decompressor::new(FLAG_ZLIB_COMPRESSION);
        let data = vec![0x42u8; 1000];
        let compressed = zlib_compress(&data);
        let out = dec.uncompress_block(&compressed).unwrap();
        assert_eq!(out, data.as_slice());
    }

    #[test]
    fn zlib_rejects_oversized_input() {
        let mut dec = Decompressor::new(FLAG_ZLIB_COMPRESSION);
        let oversized = vec![0u8; BLOCK_SIZE * 2 + 1];
        let err = dec.uncompress_block(&oversized).unwrap_err();
        assert!(matches!(err, PolyfsError::Uncorrected(_)));
    }

    #[test]
    fn raw_passthrough() {
        let mut dec = Decompressor::new(0);
        let data = vec![1, 2, 3, 4, 5];
        let out = dec.uncompress_block(&data).unwrap();
        assert_eq!(out, data.as_slice());
    }

    #[test]
    fn raw_rejects_oversized_input() {
        let mut dec = Decompressor::new(0);
        let oversized = vec![0u8; BLOCK_SIZE + 1];
        let err = dec.uncompress_block(&oversized).unwrap_err();
        assert!(matches!(err, PolyfsError::Uncorrected(_)));
    }
}
