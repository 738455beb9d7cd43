//! Extraction sink: host-side materialisation of directories, files,
//! symlinks and special inodes — a thin adaptation layer over the
//! relevant syscalls.

use crate::inode::Inode;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{symlink, FileTypeExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// A destination for a single file's decompressed byte stream.
///
/// Abstracts over `std::fs::File` so [`crate::expand::expand_data`] can be
/// driven in tests without touching the filesystem (e.g. writing into a
/// `Vec<u8>`).
pub trait FileSink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl FileSink for File {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }
}

impl FileSink for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

/// Host-filesystem extraction sink, rooted at an extraction directory.
///
/// Materialises each inode type with its matching syscall — `mkdir`,
/// `open(O_CREAT|O_TRUNC)`, `symlink`, `mknod` — followed by a status
/// fixup pass (ownership, setuid/setgid bits, and resetting mtime to
/// the epoch).
pub struct ExtractSink {
    euid: u32,
}

impl ExtractSink {
    pub fn new() -> Self {
        Self {
            euid: unsafe { libc::geteuid() },
        }
    }

    fn is_privileged(&self) -> bool {
        self.euid == 0
    }

    pub fn create_dir(&self, path: &Path, inode: &Inode) -> io::Result<()> {
        fs::create_dir(path)?;
        fs::set_permissions(path, fs::Permissions::from_mode(inode.mode as u32))?;
        self.change_status(path, inode, false)
    }

    pub fn create_file(&self, path: &Path, inode: &Inode) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(inode.mode as u32)
            .open(path)
    }

    pub fn finish_file(&self, path: &Path, inode: &Inode) -> io::Result<()> {
        self.change_status(path, inode, false)
    }

    pub fn create_symlink(&self, path: &Path, target: &str, inode: &Inode) -> io::Result<()> {
        symlink(target, path)?;
        self.change_status(path, inode, true)
    }

    pub fn create_special(&self, path: &Path, inode: &Inode, devno: u32) -> io::Result<()> {
        let path_c = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let ret = unsafe { libc::mknod(path_c.as_ptr(), inode.mode as libc::mode_t, devno as _) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        self.change_status(path, inode, false)
    }

    /// Applies ownership (if privileged), setuid/setgid bits, and resets
    /// the modification time to the epoch. Symlinks skip mode and time
    /// changes, matching `change_file_status`'s early return for
    /// `S_ISLNK`.
    fn change_status(&self, path: &Path, inode: &Inode, is_symlink: bool) -> io::Result<()> {
        if self.is_privileged() {
            lchown(path, inode.uid as u32, inode.gid as u32)?;
            if is_symlink {
                return Ok(());
            }
            use crate::format::mode::{S_ISGID, S_ISUID};
            if inode.mode & (S_ISUID | S_ISGID) != 0 {
                fs::set_permissions(path, fs::Permissions::from_mode(inode.mode as u32))?;
            }
        }
        if is_symlink {
            return Ok(());
        }
        set_epoch_mtime(path)
    }
}

impl Default for ExtractSink {
    fn default() -> Self {
        Self::new()
    }
}

fn lchown(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    let path_c = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let ret = unsafe { libc::lchown(path_c.as_ptr(), uid, gid) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_epoch_mtime(path: &Path) -> io::Result<()> {
    let path_c = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let times = [
        libc::utimbuf {
            actime: 0,
            modtime: 0,
        },
    ];
    let ret = unsafe { libc::utime(path_c.as_ptr(), times.as_ptr()) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Returns the size in bytes of the open file or block device, the same
/// way `utils::disk::get_disk_size` wraps `BLKGETSIZE64` for a raw disk.
pub fn file_length(file: &File) -> io::Result<u64> {
    let metadata = file.metadata()?;
    let file_type = metadata.file_type();
    if file_type.is_block_device() {
        let mut size: u64 = 0;
        let ret = unsafe {
            libc::ioctl(
                std::os::unix::io::AsRawFd::as_raw_fd(file),
                BLKGETSIZE64 as _,
                &mut size,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(size)
    } else {
        Ok(metadata.size())
    }
}

/// ioctl command: get the size of a block device in bytes.
const BLKGETSIZE64: u64 = (2u64 << 30) | (0x12 << 8) | 114 | ((std::mem::size_of::<usize>() as u64) << 16);
