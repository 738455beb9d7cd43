//! Superblock location and decoding.

use crate::crc;
use crate::error::{PolyfsError, Result};
use crate::format::{self, CRC_FIELD_OFFSET, PAD_SIZE, SUPER_SIZE};
use crate::inode::Inode;
use crate::source::ImageSource;
use std::io::{Read, Seek};

/// The decoded, host-endian superblock, plus the embedded root inode.
#[derive(Debug, Clone, Copy)]
pub struct Superblock {
    pub size: u32,
    pub flags: u32,
    pub crc: u32,
    pub edition: u32,
    pub blocks: u32,
    pub files: u32,
    pub root: Inode,
}

impl Superblock {
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    fn decode(buf: &[u8; SUPER_SIZE]) -> Option<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != format::MAGIC {
            return None;
        }
        let size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let flags = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        // buf[12..16] is `future`, reserved and ignored.
        // buf[16..32] is `signature`, informational and not checked here.
        let crc = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        let edition = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        let blocks = u32::from_le_bytes(buf[40..44].try_into().unwrap());
        let files = u32::from_le_bytes(buf[44..48].try_into().unwrap());
        // buf[48..64] is `name`, informational.
        let root_bytes: [u8; 12] = buf[64..76].try_into().unwrap();
        let root = Inode::decode(&root_bytes);

        Some(Self {
            size,
            flags,
            crc,
            edition,
            blocks,
            files,
            root,
        })
    }
}

/// Locates, decodes, and validates the superblock.
///
/// Returns the decoded superblock and the image's `start` offset (0 or
/// [`PAD_SIZE`]). `file_length` must already be known (determining the
/// size of a block device is the caller's job).
pub fn decode_superblock<R: Read + Seek>(
    source: &mut ImageSource<R>,
    file_length: u64,
) -> Result<(Superblock, u64)> {
    if file_length < SUPER_SIZE as u64 {
        return Err(PolyfsError::uncorrected(
            "filesystem smaller than a polyfs superblock",
        ));
    }

    let at_zero: [u8; SUPER_SIZE] = source.read_array(0)?;
    let (super_, start) = if let Some(s) = Superblock::decode(&at_zero) {
        (s, 0)
    } else if file_length >= PAD_SIZE + SUPER_SIZE as u64 {
        let at_pad: [u8; SUPER_SIZE] = source.read_array(PAD_SIZE)?;
        match Superblock::decode(&at_pad) {
            Some(s) => (s, PAD_SIZE),
            None => return Err(PolyfsError::uncorrected("superblock magic not found")),
        }
    } else {
        return Err(PolyfsError::uncorrected("superblock magic not found"));
    };

    if super_.flags & !format::SUPPORTED_FLAGS != 0 {
        return Err(PolyfsError::operational("unsupported filesystem features"));
    }
    if super_.size < format::BLOCK_SIZE as u32 {
        return Err(PolyfsError::uncorrected(format!(
            "superblock size ({}) too small",
            super_.size
        )));
    }
    if !super_.has_flag(format::FLAG_FSID_VERSION_1) {
        return Err(PolyfsError::uncorrected("invalid filesystem version"));
    }
    if super_.files == 0 {
        return Err(PolyfsError::uncorrected("zero file count"));
    }
    if file_length < super_.size as u64 {
        return Err(PolyfsError::uncorrected(format!(
            "file length too short, {} is smaller than {}",
            file_length, super_.size
        )));
    }

    Ok((super_, start))
}

/// Tells whether `file_length` extends past the declared image size, the
/// one non-fatal condition this tool reports.
pub fn extends_past_end(super_: &Superblock, file_length: u64) -> bool {
    file_length > super_.size as u64
}

/// Recomputes the whole-image CRC-32 with the `fsid.crc` field masked to
/// zero, and compares it against the stored value.
pub fn verify_crc<R: Read + Seek>(
    source: &mut ImageSource<R>,
    super_: &Superblock,
    start: u64,
) -> Result<()> {
    let region_len = super_.size as u64 - start;
    let mut running = 0u32;
    let mut offset = start;
    let mut remaining = region_len;
    const CHUNK: usize = 4096;
    let mut first_chunk = true;

    while remaining > 0 {
        let take = remaining.min(CHUNK as u64) as usize;
        let chunk = source.read(offset, take)?;
        if first_chunk {
            let mut patched = chunk.to_vec();
            let crc_off = CRC_FIELD_OFFSET;
            if crc_off + 4 <= patched.len() {
                patched[crc_off..crc_off + 4].copy_from_slice(&0u32.to_le_bytes());
            }
            running = crc::update(running, &patched);
            first_chunk = false;
        } else {
            running = crc::update(running, chunk);
        }
        offset += take as u64;
        remaining -= take as u64;
    }

    if running != super_.crc {
        return Err(PolyfsError::uncorrected("crc error"));
    }
    Ok(())
}
