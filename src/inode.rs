//! Inode records: the packed on-disk layout and its decoded, host-endian
//! form.
//!
//! The 6-bit `namelen` / 26-bit `offset` pair is bit-packed into the last
//! 4 bytes of the record. Decoding goes through one explicit function
//! that extracts the packed word as a `u32` and masks out the two
//! fields; this is correct regardless of host endianness because the
//! word is always read via `from_le_bytes` first.

use crate::format::{self, mode, INODE_SIZE};

/// An inode record, decoded into host-native fields. Transient: owned by
/// the walker frame that read it and dropped after dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Inode {
    /// Full POSIX mode, including the file-type bits.
    pub mode: u16,
    pub uid: u16,
    /// File size, directory-entries length, or packed device major/minor.
    pub size: u32,
    pub gid: u8,
    /// Filename length in bytes (namelen * 4, already expanded).
    pub namelen: u32,
    /// Byte offset to the inode's payload (offset * 4, already expanded).
    pub offset: u32,
}

/// The file-type tag decoded from `inode.mode`'s `S_IFMT` bits.
///
/// A single decode site rather than a chain of `S_ISDIR`/`S_ISREG`/...
/// predicates; anything left over is `Bogus` and rejected once, at the
/// point of decode, rather than falling through an `if` chain in the
/// walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Directory,
    Regular,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Bogus,
}

impl Inode {
    /// Decodes a 12-byte packed inode record.
    ///
    /// `buf` must contain exactly [`INODE_SIZE`] bytes, as read from the
    /// image at the record's offset.
    pub fn decode(buf: &[u8; INODE_SIZE]) -> Self {
        let mode = u16::from_le_bytes([buf[0], buf[1]]);
        let uid = u16::from_le_bytes([buf[2], buf[3]]);
        // 24-bit size followed by the 8-bit gid, packed little-endian.
        let size = u32::from_le_bytes([buf[4], buf[5], buf[6], 0]);
        let gid = buf[7];
        // namelen (6 bits) | offset (26 bits), packed little-endian.
        let packed = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let namelen = packed & 0x3f;
        let offset = packed >> 6;

        Self {
            mode,
            uid,
            size,
            gid,
            namelen: namelen * 4,
            offset: offset * 4,
        }
    }

    /// Returns this inode's file-type tag.
    pub fn file_type(&self) -> FileType {
        match self.mode & mode::S_IFMT {
            mode::S_IFDIR => FileType::Directory,
            mode::S_IFREG => FileType::Regular,
            mode::S_IFLNK => FileType::Symlink,
            mode::S_IFCHR => FileType::CharDevice,
            mode::S_IFBLK => FileType::BlockDevice,
            mode::S_IFIFO => FileType::Fifo,
            mode::S_IFSOCK => FileType::Socket,
            _ => FileType::Bogus,
        }
    }

    /// Returns the mode bits without the file-type bits, for the
    /// verbose per-inode listing's octal mode column.
    pub fn perm_bits(&self) -> u16 {
        self.mode & !mode::S_IFMT
    }
}

/// Splits a device number packed the way char/block device inodes store
/// `size` (major in the high 12 bits, minor in the low 20, matching
/// glibc's `major()`/`minor()` for a 32-bit `dev_t`).
pub fn split_devno(size: u32) -> (u32, u32) {
    let major = (size >> 8) & 0xfff;
    let minor = (size & 0xff) | ((size >> 12) & 0xfff00);
    (major, minor)
}

/// Packs a major/minor pair the way `mknod`'s device-number encoding does.
pub fn makedev(major: u32, minor: u32) -> u32 {
    ((major & 0xfff) << 8) | (minor & 0xff) | ((minor & 0xfff00) << 12)
}
