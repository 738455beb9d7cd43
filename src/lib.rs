//! `polyfsck` library: checks and optionally extracts a PolyFS image.
//!
//! The driver wires the pieces together: decode the superblock, verify
//! its CRC, walk the tree, report the outcome. `main.rs` is a thin front
//! door over [`check`].

pub mod crc;
pub mod decompress;
pub mod diag;
pub mod error;
pub mod expand;
pub mod format;
pub mod inode;
pub mod sink;
pub mod source;
pub mod superblock;
pub mod walker;

use decompress::Decompressor;
use error::Result;
use sink::ExtractSink;
use source::ImageSource;
use std::io::{Read, Seek};
use std::path::Path;
use superblock::Superblock;
use walker::WalkContext;

/// Outcome of a successful check: the decoded superblock plus whether
/// the image extends past its declared size (a non-fatal warning).
pub struct CheckOutcome {
    pub superblock: Superblock,
    pub trailing_bytes: bool,
}

/// Runs the full check (and, if `extract_root` is given, extraction)
/// against an already-open image source of known `file_length`.
///
/// This is the library entry point exercised by `main` and by the
/// integration tests; it performs every check and, optionally,
/// extraction step except locating and opening the image file itself.
pub fn check<R: Read + Seek>(
    source: &mut ImageSource<R>,
    file_length: u64,
    verbosity: u8,
    extract_root: Option<&Path>,
) -> Result<CheckOutcome> {
    let (super_, start) = superblock::decode_superblock(source, file_length)?;
    let trailing_bytes = superblock::extends_past_end(&super_, file_length);
    superblock::verify_crc(source, &super_, start)?;

    let sink = extract_root.map(|_| ExtractSink::new());
    let mut decompressor = Decompressor::new(super_.flags);
    let mut ctx = WalkContext::new(source, &mut decompressor, sink.as_ref(), verbosity);
    ctx.run(&super_, start, extract_root)?;

    Ok(CheckOutcome {
        superblock: super_,
        trailing_bytes,
    })
}
