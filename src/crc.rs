//! CRC-32 (IEEE 802.3 polynomial), the same checksum zlib's `crc32()`
//! computes. Hand-rolled rather than pulling in a checksum crate, since
//! the algorithm is a couple dozen lines.

use std::sync::OnceLock;

/// The reflected IEEE 802.3 generator polynomial, as used by zlib/gzip.
const IEEE_POLYNOMIAL: u32 = 0xedb8_8320;

fn lookup_table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        compute_lookup_table(&mut table, IEEE_POLYNOMIAL);
        table
    })
}

/// Computes the lookup table for the given generator polynomial.
///
/// Arguments:
/// - `table` is filled with the table's values.
/// - `polynom` is the polynomial.
fn compute_lookup_table(table: &mut [u32; 256], polynom: u32) {
    // Little endian
    let mut i = table.len() / 2;
    let mut crc = 1;
    while i > 0 {
        if crc & 1 != 0 {
            crc = (crc >> 1) ^ polynom;
        } else {
            crc >>= 1;
        }
        for j in (0..table.len()).step_by(2 * i) {
            table[i ^ j] = crc ^ table[j];
        }
        i >>= 1;
    }
}

/// Computes the CRC-32 checksum of `data`, continuing from `crc` (pass
/// `0` to start a fresh checksum, mirroring zlib's `crc32(0, ...)`
/// idiom used to seed the running computation across chunks).
pub fn update(crc: u32, data: &[u8]) -> u32 {
    // Sarwate algorithm.
    let table = lookup_table();
    let mut crc = !crc;
    for &b in data {
        let i = ((crc as usize) ^ (b as usize)) & 0xff;
        crc = table[i] ^ (crc >> 8);
    }
    !crc
}

/// Computes the CRC-32 checksum of a single buffer.
pub fn compute(data: &[u8]) -> u32 {
    update(0, data)
}
