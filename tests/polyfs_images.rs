//! Integration tests: assemble whole synthetic PolyFS images byte-by-byte
//! and drive the checker/extractor end-to-end against the boundary cases
//! named in spec §8.

use polyfsck::error::PolyfsError;
use polyfsck::format::{self, mode};
use polyfsck::source::ImageSource;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A byte buffer under construction, with helpers for the packed fields
/// PolyFS uses throughout (inode records, the superblock header).
struct Image {
    buf: Vec<u8>,
}

impl Image {
    fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size],
        }
    }

    fn put_u16(&mut self, off: usize, v: u16) {
        self.buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, off: usize, v: u32) {
        self.buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u24(&mut self, off: usize, v: u32) {
        self.buf[off..off + 3].copy_from_slice(&v.to_le_bytes()[0..3]);
    }

    /// Writes a 12-byte packed inode record at `off`.
    fn write_inode(&mut self, off: usize, mode: u16, uid: u16, size: u32, gid: u8, namelen: u32, payload_offset: u32) {
        self.put_u16(off, mode);
        self.put_u16(off + 2, uid);
        self.put_u24(off + 4, size);
        self.buf[off + 7] = gid;
        let packed = (namelen / 4) | ((payload_offset / 4) << 6);
        self.put_u32(off + 8, packed);
    }

    fn write_bytes(&mut self, off: usize, data: &[u8]) {
        self.buf[off..off + data.len()].copy_from_slice(data);
    }

    /// Stamps the superblock header (magic/size/flags/files) and the
    /// embedded root inode, then fixes up the whole-image CRC.
    fn finish(mut self, flags: u32, files: u32, root_mode: u16, root_size: u32, root_offset: u32) -> Vec<u8> {
        let size = self.buf.len() as u32;
        self.put_u32(0, format::MAGIC);
        self.put_u32(4, size);
        self.put_u32(8, flags);
        self.put_u32(44, files);
        self.write_inode(64, root_mode, 0, root_size, 0, 0, root_offset);
        let crc = {
            let mut zeroed = self.buf.clone();
            zeroed[32..36].fill(0);
            polyfsck::crc::compute(&zeroed)
        };
        self.put_u32(32, crc);
        self.buf
    }
}

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "polyfsck-test-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn run_check(data: Vec<u8>, verbosity: u8, extract_root: Option<&Path>) -> Result<polyfsck::CheckOutcome, PolyfsError> {
    let len = data.len() as u64;
    let mut source = ImageSource::new(Cursor::new(data));
    polyfsck::check(&mut source, len, verbosity, extract_root)
}

/// Scenario 1: minimal image, one empty root directory, no files.
#[test]
fn minimal_empty_root() {
    let image = Image::new(format::BLOCK_SIZE);
    // An empty directory may still carry the structurally-required fixed
    // root offset; `size == 0` means the child loop never runs.
    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        1,
        mode::S_IFDIR | 0o755,
        0,
        format::SUPER_SIZE as u32,
    );
    let outcome = run_check(data, 0, None).unwrap();
    assert!(!outcome.trailing_bytes);
}

/// Scenario 2: a single 1-byte regular file `/a`, zlib-compressed.
#[test]
fn single_zlib_file() {
    let super_size = format::SUPER_SIZE as u32;
    // Root directory: one child record ("a", padded to 4 bytes).
    let dir_size = 12 + 4;
    let file_offset = super_size + dir_size;

    let compressed = zlib_compress(&[0x42]);
    let ptr_array_len = 4u32;
    let data_start = file_offset + ptr_array_len;
    let data_end = data_start + compressed.len() as u32;
    let image_size = (data_end + format::BLOCK_SIZE as u32).max(format::BLOCK_SIZE as u32);

    let mut image = Image::new(image_size as usize);
    image.write_inode(super_size as usize, mode::S_IFREG | 0o644, 0, 1, 0, 4, file_offset);
    image.write_bytes(super_size as usize + 12, b"a\0\0\0");
    image.put_u32(file_offset as usize, data_end);
    image.write_bytes(data_start as usize, &compressed);

    let data = image.finish(
        format::FLAG_FSID_VERSION_1 | format::FLAG_ZLIB_COMPRESSION,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let extract = TempDir::new("zlib-file");
    let outcome = run_check(data, 0, Some(extract.path())).unwrap();
    assert!(outcome.superblock.has_flag(format::FLAG_ZLIB_COMPRESSION));
    let written = std::fs::read(extract.path().join("a")).unwrap();
    assert_eq!(written, vec![0x42]);
}

/// Scenario 3: a 12,288-byte file (3 blocks) where the middle block is a
/// hole. Bytes `[0,4096)` and `[8192,12288)` come from passthrough
/// decompression; `[4096,8192)` must be all zeros.
#[test]
fn file_with_hole_block() {
    let super_size = format::SUPER_SIZE as u32;
    let dir_size = 12 + 4;
    let file_offset = super_size + dir_size;
    let block = format::BLOCK_SIZE as u32;
    let ptr_array_len = 4 * 3;
    let data_start = file_offset + ptr_array_len;

    let block0 = vec![0xAAu8; format::BLOCK_SIZE];
    let block2 = vec![0xBBu8; format::BLOCK_SIZE];

    let block0_end = data_start + block;
    let block1_end = block0_end; // hole: start == end
    let block2_end = block1_end + block;
    let image_size = block2_end + block;

    let mut image = Image::new(image_size as usize);
    image.write_inode(
        super_size as usize,
        mode::S_IFREG | 0o644,
        0,
        3 * block,
        0,
        4,
        file_offset,
    );
    image.write_bytes(super_size as usize + 12, b"f\0\0\0");
    image.put_u32(file_offset as usize, block0_end);
    image.put_u32(file_offset as usize + 4, block1_end);
    image.put_u32(file_offset as usize + 8, block2_end);
    image.write_bytes(data_start as usize, &block0);
    image.write_bytes(block1_end as usize, &block2);

    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let extract = TempDir::new("hole-file");
    run_check(data, 0, Some(extract.path())).unwrap();
    let written = std::fs::read(extract.path().join("f")).unwrap();
    assert_eq!(&written[0..4096], block0.as_slice());
    assert!(written[4096..8192].iter().all(|&b| b == 0));
    assert_eq!(&written[8192..12288], block2.as_slice());
}

/// Scenario 4: a symlink `/link -> target`.
#[test]
fn symlink_target() {
    let super_size = format::SUPER_SIZE as u32;
    let dir_size = 12 + 4; // "link" is 4 bytes, no padding needed
    let link_offset = super_size + dir_size;
    let target = b"target";
    let data_start = link_offset + 4;
    let data_end = data_start + target.len() as u32;
    let image_size = data_end + format::BLOCK_SIZE as u32;

    let mut image = Image::new(image_size as usize);
    image.write_inode(
        super_size as usize,
        mode::S_IFLNK | 0o777,
        0,
        target.len() as u32,
        0,
        4,
        link_offset,
    );
    image.write_bytes(super_size as usize + 12, b"link");
    image.put_u32(link_offset as usize, data_end);
    image.write_bytes(data_start as usize, target);

    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let extract = TempDir::new("symlink");
    run_check(data, 0, Some(extract.path())).unwrap();
    let resolved = std::fs::read_link(extract.path().join("link")).unwrap();
    assert_eq!(resolved, PathBuf::from("target"));
}

/// Scenario 6: a corrupt image with one byte flipped inside a compressed
/// block fails with an UNCORRECTED decompression error.
#[test]
fn corrupt_block_fails_uncorrected() {
    let super_size = format::SUPER_SIZE as u32;
    let dir_size = 12 + 4;
    let file_offset = super_size + dir_size;
    let compressed = zlib_compress(&[0x42; 64]);
    let data_start = file_offset + 4;
    let data_end = data_start + compressed.len() as u32;
    let image_size = data_end + format::BLOCK_SIZE as u32;

    let mut image = Image::new(image_size as usize);
    image.write_inode(super_size as usize, mode::S_IFREG | 0o644, 0, 64, 0, 4, file_offset);
    image.write_bytes(super_size as usize + 12, b"a\0\0\0");
    image.put_u32(file_offset as usize, data_end);
    image.write_bytes(data_start as usize, &compressed);

    let mut data = image.finish(
        format::FLAG_FSID_VERSION_1 | format::FLAG_ZLIB_COMPRESSION,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );
    // Flip a bit inside the compressed stream, then repair the CRC so the
    // failure we observe is the decompression error, not a CRC mismatch.
    let flip_at = data_start as usize + 2;
    data[flip_at] ^= 0x01;
    let mut zeroed = data.clone();
    zeroed[32..36].fill(0);
    let crc = polyfsck::crc::compute(&zeroed);
    data[32..36].copy_from_slice(&crc.to_le_bytes());

    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}

/// Boundary case: an image smaller than a superblock is UNCORRECTED.
#[test]
fn too_small_for_superblock() {
    let data = vec![0u8; 16];
    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}

/// Boundary case: an unknown flag bit set is an operational ERROR, not
/// an UNCORRECTED corruption.
#[test]
fn unknown_flag_is_error() {
    let image = Image::new(format::BLOCK_SIZE);
    let data = image.finish(
        format::FLAG_FSID_VERSION_1 | 0x4000_0000,
        1,
        mode::S_IFDIR | 0o755,
        0,
        0,
    );
    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Operational(_)));
}

/// Boundary case: directory data placed after file data (`end_dir >
/// start_data`) violates the layout invariant and is UNCORRECTED.
#[test]
fn directory_data_after_file_data_is_uncorrected() {
    let super_size = format::SUPER_SIZE as u32; // 76
    let file_offset = super_size; // file payload right after the header
    let root_offset = super_size + 200; // directory payload placed later

    let mut image = Image::new(format::BLOCK_SIZE);
    // File "a"'s payload: one uncompressed 4-byte block at `file_offset`.
    image.put_u32(file_offset as usize, file_offset + 8);
    image.write_bytes(file_offset as usize + 4, b"abcd");

    // Root directory's one child record, placed after the file's data.
    image.write_inode(root_offset as usize, mode::S_IFREG | 0o644, 0, 4, 0, 4, file_offset);
    image.write_bytes(root_offset as usize + 12, b"a\0\0\0");

    let data = image.finish(
        format::FLAG_FSID_VERSION_1 | format::FLAG_SHIFTED_ROOT_OFFSET,
        2,
        mode::S_IFDIR | 0o755,
        16,
        root_offset,
    );

    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}

/// Boundary case: a symlink whose decompressed length disagrees with its
/// declared size is UNCORRECTED.
#[test]
fn symlink_size_mismatch_is_uncorrected() {
    let super_size = format::SUPER_SIZE as u32;
    let dir_size = 12 + 4;
    let link_offset = super_size + dir_size;
    let target = b"target"; // 6 bytes on disk
    let data_start = link_offset + 4;
    let data_end = data_start + target.len() as u32;
    let image_size = data_end + format::BLOCK_SIZE as u32;

    let mut image = Image::new(image_size as usize);
    // Declares size 5, but 6 bytes are actually stored.
    image.write_inode(super_size as usize, mode::S_IFLNK | 0o777, 0, 5, 0, 4, link_offset);
    image.write_bytes(super_size as usize + 12, b"link");
    image.put_u32(link_offset as usize, data_end);
    image.write_bytes(data_start as usize, target);

    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}

/// Boundary case: a regular file inode with a zero size but a non-zero
/// payload offset violates the `(offset==0) <=> (size==0)` biconditional
/// from spec §3.3/§4.7 and is UNCORRECTED.
#[test]
fn regular_file_size_offset_mismatch_is_uncorrected() {
    let super_size = format::SUPER_SIZE as u32;
    let dir_size = 12 + 4;
    let file_offset = super_size + dir_size;

    let mut image = Image::new(format::BLOCK_SIZE);
    image.write_inode(super_size as usize, mode::S_IFREG | 0o644, 0, 0, 0, 4, file_offset);
    image.write_bytes(super_size as usize + 12, b"a\0\0\0");

    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}

/// Boundary case: a directory child whose name is padded with more than
/// 3 trailing NUL bytes is rejected as "bad filename length" (spec.md
/// §9 Open Questions; see DESIGN.md decision 3).
#[test]
fn bad_filename_padding_is_uncorrected() {
    let super_size = format::SUPER_SIZE as u32;
    // namelen = 8 (2 packed units) but the name is only "a" (1 byte),
    // leaving 7 bytes of NUL padding -- more than the tolerated 3.
    let dir_size = 12 + 8;

    let mut image = Image::new(format::BLOCK_SIZE);
    image.write_inode(super_size as usize, mode::S_IFREG | 0o644, 0, 0, 0, 8, 0);
    image.write_bytes(super_size as usize + 12, b"a\0\0\0\0\0\0\0");

    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}

/// Scenario 5 (FIFO variant): a special inode with a non-zero payload
/// offset is always UNCORRECTED, regardless of which special type it is.
/// (Char/block device creation needs `CAP_MKNOD`, so the extraction path
/// for those is exercised by the sink's own logic rather than here; the
/// offset-must-be-zero invariant they share with FIFO/socket is covered
/// through this cheaper-to-construct case.)
#[test]
fn special_inode_with_nonzero_offset_is_uncorrected() {
    let super_size = format::SUPER_SIZE as u32;
    let dir_size = 12 + 4;
    let bogus_offset = super_size + dir_size;

    let mut image = Image::new(format::BLOCK_SIZE);
    image.write_inode(super_size as usize, mode::S_IFIFO | 0o644, 0, 0, 0, 4, bogus_offset);
    image.write_bytes(super_size as usize + 12, b"p\0\0\0");

    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}

/// Boundary case: a bogus mode (no recognised file-type bits) is
/// rejected at the single dispatch site in the walker.
#[test]
fn bogus_mode_is_uncorrected() {
    let super_size = format::SUPER_SIZE as u32;
    let dir_size = 12 + 4;

    let mut image = Image::new(format::BLOCK_SIZE);
    // mode 0o644 with no S_IFMT bits set at all.
    image.write_inode(super_size as usize, 0o644, 0, 0, 0, 4, 0);
    image.write_bytes(super_size as usize + 12, b"a\0\0\0");

    let data = image.finish(
        format::FLAG_FSID_VERSION_1,
        2,
        mode::S_IFDIR | 0o755,
        dir_size,
        super_size,
    );

    let err = run_check(data, 0, None).unwrap_err();
    assert!(matches!(err, PolyfsError::Uncorrected(_)));
}
