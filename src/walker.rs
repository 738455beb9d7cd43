//! Tree walker: recursive descent from the root inode, dispatching on
//! file type and enforcing the global layout invariants.
//!
//! Threads a single [`WalkContext`] through the recursion rather than
//! relying on process-wide globals for the layout-bookkeeping counters.

use crate::decompress::Decompressor;
use crate::error::{PolyfsError, Result};
use crate::expand;
use crate::format::{self, INODE_SIZE};
use crate::inode::{split_devno, FileType, Inode};
use crate::sink::{ExtractSink, FileSink};
use crate::source::ImageSource;
use crate::superblock::Superblock;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

/// Threads the image source, decompressor, extraction sink, and the four
/// layout-bookkeeping counters through the recursive walk.
pub struct WalkContext<'a, R: Read + Seek> {
    source: &'a mut ImageSource<R>,
    decompressor: &'a mut Decompressor,
    sink: Option<&'a ExtractSink>,
    verbosity: u8,
    start_dir: Option<u64>,
    end_dir: u64,
    start_data: Option<u64>,
    end_data: u64,
}

impl<'a, R: Read + Seek> WalkContext<'a, R> {
    pub fn new(
        source: &'a mut ImageSource<R>,
        decompressor: &'a mut Decompressor,
        sink: Option<&'a ExtractSink>,
        verbosity: u8,
    ) -> Self {
        Self {
            source,
            decompressor,
            sink,
            verbosity,
            start_dir: None,
            end_dir: 0,
            start_data: None,
            end_data: 0,
        }
    }

    /// Runs the whole walk from the superblock's embedded root inode,
    /// then enforces the completion-time layout invariants.
    pub fn run(&mut self, super_: &Superblock, start: u64, extract_root: Option<&Path>) -> Result<()> {
        let root = &super_.root;
        if root.file_type() != FileType::Directory {
            return Err(PolyfsError::uncorrected("root inode is not directory"));
        }
        if !super_.has_flag(format::FLAG_SHIFTED_ROOT_OFFSET) {
            let fixed_a = format::SUPER_SIZE as u32;
            let fixed_b = format::PAD_SIZE as u32 + format::SUPER_SIZE as u32;
            if root.offset != fixed_a && root.offset != fixed_b {
                return Err(PolyfsError::uncorrected(format!(
                    "bad root offset ({})",
                    root.offset
                )));
            }
        }

        self.walk_directory(root, "", extract_root)?;

        if let Some(start_data) = self.start_data {
            let floor = format::SUPER_SIZE as u64 + start;
            if start_data < floor {
                return Err(PolyfsError::uncorrected(format!(
                    "directory data start ({start_data}) < sizeof(super) + start ({floor})"
                )));
            }
            if let Some(start_dir) = self.start_dir {
                if start_dir < floor {
                    return Err(PolyfsError::uncorrected(format!(
                        "directory data start ({start_dir}) < sizeof(super) + start ({floor})"
                    )));
                }
                if start_dir > self.end_dir {
                    return Err(PolyfsError::uncorrected(
                        "directory data start exceeds directory data end",
                    ));
                }
            }
            if self.end_dir > start_data {
                return Err(PolyfsError::uncorrected(format!(
                    "directory data end ({}) > file data start ({start_data})",
                    self.end_dir
                )));
            }
        }
        if self.end_data > super_.size as u64 {
            return Err(PolyfsError::uncorrected("invalid file data offset"));
        }

        Ok(())
    }

    fn note_dir_start(&mut self, offset: u64) {
        self.start_dir = Some(self.start_dir.map_or(offset, |s| s.min(offset)));
    }

    fn note_dir_end(&mut self, offset: u64) {
        self.end_dir = self.end_dir.max(offset);
    }

    fn note_data_start(&mut self, offset: u64) {
        self.start_data = Some(self.start_data.map_or(offset, |s| s.min(offset)));
    }

    fn walk_inode(&mut self, inode: &Inode, logical: &str, host: Option<&Path>) -> Result<()> {
        match inode.file_type() {
            FileType::Directory => self.walk_directory(inode, logical, host),
            FileType::Regular => self.walk_regular(inode, logical, host),
            FileType::Symlink => self.walk_symlink(inode, logical, host),
            FileType::CharDevice => self.walk_device('c', inode, logical, host),
            FileType::BlockDevice => self.walk_device('b', inode, logical, host),
            FileType::Fifo => self.walk_special('p', inode, logical, host),
            FileType::Socket => self.walk_special('s', inode, logical, host),
            FileType::Bogus => Err(PolyfsError::uncorrected(format!(
                "bogus mode ({:o}): {logical}",
                inode.mode
            ))),
        }
    }

    fn walk_directory(&mut self, inode: &Inode, logical: &str, host: Option<&Path>) -> Result<()> {
        if inode.offset == 0 && inode.size != 0 {
            return Err(PolyfsError::uncorrected(format!(
                "directory inode has zero offset and non-zero size: {logical}"
            )));
        }
        if inode.offset != 0 {
            self.note_dir_start(inode.offset as u64);
        }

        if self.verbosity >= 1 {
            self.print_inode('d', inode, logical);
        }

        if let (Some(host), Some(sink)) = (host, self.sink) {
            sink.create_dir(host, inode).map_err(io_err)?;
        }

        let mut pos = inode.offset as u64;
        let end = pos + inode.size as u64;
        while pos < end {
            let record: [u8; INODE_SIZE] = self.source.read_array(pos)?;
            let child = Inode::decode(&record);
            pos += INODE_SIZE as u64;

            if child.namelen == 0 {
                return Err(PolyfsError::uncorrected("filename length is zero"));
            }
            let name_bytes = self.source.read(pos, child.namelen as usize)?.to_vec();
            let strlen = name_bytes
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(name_bytes.len());
            if child.namelen as usize - strlen > 3 {
                return Err(PolyfsError::uncorrected("bad filename length"));
            }
            let name = String::from_utf8_lossy(&name_bytes[..strlen]).into_owned();

            let child_logical = if logical.is_empty() {
                format!("/{name}")
            } else {
                format!("{logical}/{name}")
            };
            let child_host: Option<PathBuf> = host.map(|h| h.join(&name));
            self.walk_inode(&child, &child_logical, child_host.as_deref())?;

            pos += child.namelen as u64;
            if let Some(start_dir) = self.start_dir {
                if pos <= start_dir {
                    return Err(PolyfsError::uncorrected("bad inode offset"));
                }
            }
            self.note_dir_end(pos);
        }
        Ok(())
    }

    fn walk_regular(&mut self, inode: &Inode, logical: &str, host: Option<&Path>) -> Result<()> {
        if (inode.offset == 0) != (inode.size == 0) {
            return Err(PolyfsError::uncorrected(format!(
                "file inode has mismatched zero offset/size: {logical}"
            )));
        }
        if inode.offset != 0 {
            self.note_data_start(inode.offset as u64);
        }

        if self.verbosity >= 1 {
            self.print_inode('f', inode, logical);
        }

        let mut handle = match (host, self.sink) {
            (Some(path), Some(sink)) => Some(sink.create_file(path, inode).map_err(io_err)?),
            _ => None,
        };

        if inode.size != 0 {
            let sink_dyn: Option<&mut dyn FileSink> =
                handle.as_mut().map(|f| f as &mut dyn FileSink);
            expand::expand_data(
                self.source,
                self.decompressor,
                inode.offset,
                inode.size,
                &mut self.end_data,
                sink_dyn,
                self.verbosity >= 2,
            )?;
        }

        if let (Some(path), Some(sink)) = (host, self.sink) {
            sink.finish_file(path, inode).map_err(io_err)?;
        }
        Ok(())
    }

    fn walk_symlink(&mut self, inode: &Inode, logical: &str, host: Option<&Path>) -> Result<()> {
        if inode.offset == 0 {
            return Err(PolyfsError::uncorrected(format!(
                "symbolic link has zero offset: {logical}"
            )));
        }
        if inode.size == 0 {
            return Err(PolyfsError::uncorrected(format!(
                "symbolic link has zero size: {logical}"
            )));
        }
        self.note_data_start(inode.offset as u64);

        let mut target = Vec::new();
        expand::expand_data(
            self.source,
            self.decompressor,
            inode.offset,
            inode.size,
            &mut self.end_data,
            Some(&mut target as &mut dyn FileSink),
            self.verbosity >= 2,
        )?;
        let target = String::from_utf8_lossy(&target).into_owned();

        if self.verbosity >= 1 {
            self.print_inode('l', inode, &format!("{logical} -> {target}"));
        }

        if let (Some(path), Some(sink)) = (host, self.sink) {
            sink.create_symlink(path, &target, inode).map_err(io_err)?;
        }
        Ok(())
    }

    fn walk_device(
        &mut self,
        type_char: char,
        inode: &Inode,
        logical: &str,
        host: Option<&Path>,
    ) -> Result<()> {
        if inode.offset != 0 {
            return Err(PolyfsError::uncorrected(format!(
                "special file has non-zero offset: {logical}"
            )));
        }
        if self.verbosity >= 1 {
            self.print_inode(type_char, inode, logical);
        }
        if let (Some(path), Some(sink)) = (host, self.sink) {
            sink.create_special(path, inode, inode.size).map_err(io_err)?;
        }
        Ok(())
    }

    fn walk_special(
        &mut self,
        type_char: char,
        inode: &Inode,
        logical: &str,
        host: Option<&Path>,
    ) -> Result<()> {
        if inode.offset != 0 {
            return Err(PolyfsError::uncorrected(format!(
                "special file has non-zero offset: {logical}"
            )));
        }
        if self.verbosity >= 1 {
            self.print_inode(type_char, inode, logical);
        }
        if let (Some(path), Some(sink)) = (host, self.sink) {
            sink.create_special(path, inode, 0).map_err(io_err)?;
        }
        Ok(())
    }

    /// Prints one verbose line: `<type> <mode-no-type> <info> <uid>:<gid> <path>`.
    fn print_inode(&self, type_char: char, inode: &Inode, path: &str) {
        let info = if type_char == 'c' || type_char == 'b' {
            let (major, minor) = split_devno(inode.size);
            format!("{major:4},{minor:4}")
        } else {
            format!("{:9}", inode.size)
        };
        println!(
            "{type_char} {:04o} {info} {:5}:{:<3} {path}",
            inode.perm_bits(),
            inode.uid,
            inode.gid
        );
    }
}

fn io_err(e: std::io::Error) -> PolyfsError {
    PolyfsError::operational(e.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crc;
    use crate::decompress::Decompressor;
    use crate::format::{self as fmt, mode};
    use crate::superblock::decode_superblock;
    use std::io::Cursor;

    /// Builds a minimal image: superblock + empty root directory.
    fn empty_root_image() -> Vec<u8> {
        let size = fmt::BLOCK_SIZE as u32;
        let mut buf = vec![0u8; size as usize];
        buf[0..4].copy_from_slice(&fmt::MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&size.to_le_bytes());
        buf[8..12].copy_from_slice(&fmt::FLAG_FSID_VERSION_1.to_le_bytes());
        buf[44..48].copy_from_slice(&1u32.to_le_bytes());
        buf[64..66].copy_from_slice(&(mode::S_IFDIR | 0o755).to_le_bytes());
        // offset=0, namelen=0 (empty directory, offset legally zero).
        buf[72..76].copy_from_slice(&0u32.to_le_bytes());
        let crc = crc::compute(&buf);
        buf[32..36].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    #[test]
    fn walks_empty_root() {
        let data = empty_root_image();
        let len = data.len() as u64;
        let mut src = ImageSource::new(Cursor::new(data));
        let (super_, start) = decode_superblock(&mut src, len).unwrap();
        let mut dec = Decompressor::new(super_.flags);
        let mut ctx = WalkContext::new(&mut src, &mut dec, None, 0);
        ctx.run(&super_, start, None).unwrap();
    }

    #[test]
    fn rejects_non_directory_root() {
        let mut data = empty_root_image();
        // Turn the root into a regular file.
        data[64..66].copy_from_slice(&(mode::S_IFREG | 0o644).to_le_bytes());
        let crc = {
            let mut zeroed = data.clone();
            zeroed[32..36].copy_from_slice(&0u32.to_le_bytes());
            crc::compute(&zeroed)
        };
        data[32..36].copy_from_slice(&crc.to_le_bytes());
        let len = data.len() as u64;
        let mut src = ImageSource::new(Cursor::new(data));
        let (super_, start) = decode_superblock(&mut src, len).unwrap();
        let mut dec = Decompressor::new(super_.flags);
        let mut ctx = WalkContext::new(&mut src, &mut dec, None, 0);
        let err = ctx.run(&super_, start, None).unwrap_err();
        assert!(matches!(err, PolyfsError::Uncorrected(_)));
    }
}
