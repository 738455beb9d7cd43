//! On-disk layout constants for the PolyFS format.
//!
//! All multi-byte scalars on disk are little-endian. Structural sizes here
//! mirror `struct polyfs_super` / `struct polyfs_inode` byte-for-byte.

/// A data block is the unit of compression.
pub const BLOCK_SIZE: usize = 4096;
/// The superblock may additionally live at this offset when it isn't at 0.
pub const PAD_SIZE: u64 = 512;

/// `POLYFS_MAGIC`, as stored little-endian on disk.
pub const MAGIC: u32 = 0xe96d_3513;

/// Size in bytes of the fixed-layout superblock header (without the root
/// inode, which is embedded immediately after): magic, size, flags,
/// future, signature, fsid.crc, fsid.edition, fsid.blocks, fsid.files,
/// name.
pub const SUPER_HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 16 + 4 + 4 + 4 + 4 + 16;
/// Size in bytes of a packed inode record.
pub const INODE_SIZE: usize = 12;
/// Total on-disk size of the superblock, header plus embedded root inode.
pub const SUPER_SIZE: usize = SUPER_HEADER_SIZE + INODE_SIZE;

/// Byte offset of the `fsid.crc` field within the superblock, used to mask
/// the field to zero before recomputing the whole-image CRC.
/// `future` (4) precedes `signature` (16) which precedes `fsid.crc`.
pub const CRC_FIELD_OFFSET: usize = 4 + 4 + 4 + 4 + 16;

/// Worst-case expansion of an LZO1X-compressed block, per the algorithm's
/// documented bound: `in_len + in_len / 16 + 64 + 3`.
pub const LZO_MAX_COMPRESSED: usize = BLOCK_SIZE + BLOCK_SIZE / 16 + 64 + 3;
/// Size of the scratch buffer used for the LZO overlap self-check: the
/// compressed data is copied to its tail and decompressed in place ahead
/// of it, so the buffer must hold one block of output plus the worst-case
/// compressed input.
pub const BLOCK_MAX_SIZE_WITH_OVERHEAD: usize = BLOCK_SIZE + LZO_MAX_COMPRESSED;

/// Feature flag: required; the fields in `Fsid` carry defined meaning.
pub const FLAG_FSID_VERSION_1: u32 = 0x0000_0001;
/// Feature flag: the root inode's payload offset is not fixed relative to
/// the superblock; the walker must not check it structurally.
pub const FLAG_SHIFTED_ROOT_OFFSET: u32 = 0x0000_0002;
/// Feature flag: blocks are zlib-compressed.
pub const FLAG_ZLIB_COMPRESSION: u32 = 0x0000_0004;
/// Feature flag: blocks are LZO1X-compressed.
pub const FLAG_LZO_COMPRESSION: u32 = 0x0000_0008;

/// All flag bits this implementation understands. Anything else present
/// in `superblock.flags` is rejected.
pub const SUPPORTED_FLAGS: u32 =
    FLAG_FSID_VERSION_1 | FLAG_SHIFTED_ROOT_OFFSET | FLAG_ZLIB_COMPRESSION | FLAG_LZO_COMPRESSION;

/// POSIX file-type bits within `inode.mode` (the `S_IFMT` mask and its
/// members), used to decode the tagged [`crate::inode::FileType`].
pub mod mode {
    pub const S_IFMT: u16 = 0o170000;
    pub const S_IFSOCK: u16 = 0o140000;
    pub const S_IFLNK: u16 = 0o120000;
    pub const S_IFREG: u16 = 0o100000;
    pub const S_IFBLK: u16 = 0o060000;
    pub const S_IFDIR: u16 = 0o040000;
    pub const S_IFCHR: u16 = 0o020000;
    pub const S_IFIFO: u16 = 0o010000;
    pub const S_ISUID: u16 = 0o004000;
    pub const S_ISGID: u16 = 0o002000;
}
