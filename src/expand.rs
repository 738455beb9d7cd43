//! File-data expansion: walks a file or symlink's block-pointer table,
//! handling holes and invoking the decompressor.

use crate::decompress::Decompressor;
use crate::error::{PolyfsError, Result};
use crate::format::BLOCK_SIZE;
use crate::sink::FileSink;
use crate::source::ImageSource;
use std::io::{Read, Seek};

/// Walks the block-pointer table for a file/symlink payload at `offset`
/// with logical size `size`, decompressing each block in turn.
///
/// `end_data` is updated with every block-end pointer seen, for the
/// walker's layout bookkeeping. When `sink` is `Some`, decompressed
/// bytes are streamed to it in order. When `trace` is set (`-vv`), each
/// block prints a `hole at ...` or `uncompressing block at ...` line.
pub fn expand_data<R: Read + Seek>(
    source: &mut ImageSource<R>,
    decompressor: &mut Decompressor,
    offset: u32,
    size: u32,
    end_data: &mut u64,
    mut sink: Option<&mut dyn FileSink>,
    trace: bool,
) -> Result<()> {
    let nblocks = (size as u64).div_ceil(BLOCK_SIZE as u64);
    let mut curr = offset as u64 + 4 * nblocks;
    let mut remaining = size as u64;

    for k in 0..nblocks {
        let ptr_off = offset as u64 + 4 * k;
        let next = source.read_u32(ptr_off)? as u64;
        *end_data = (*end_data).max(next);

        let is_last = k + 1 == nblocks;
        let want = if is_last {
            remaining
        } else {
            BLOCK_SIZE as u64
        };

        let out: &[u8] = if curr == next {
            if trace {
                println!("  hole at {curr} ({BLOCK_SIZE})");
            }
            // Hole: zero-filled block (or zero-filled remainder).
            decompressor.zero_fill(want as usize)
        } else {
            if trace {
                println!("  uncompressing block at {curr} to {next} ({})", next - curr);
            }
            let compressed = source.read(curr, (next - curr) as usize)?;
            decompressor.uncompress_block(compressed)?
        };

        if is_last {
            if out.len() as u64 != remaining {
                return Err(PolyfsError::uncorrected(format!(
                    "non-size ({} vs {}) bytes",
                    out.len(),
                    remaining
                )));
            }
        } else if out.len() != BLOCK_SIZE {
            return Err(PolyfsError::uncorrected(format!(
                "non-block ({}) bytes",
                out.len()
            )));
        }

        if let Some(sink) = sink.as_deref_mut() {
            sink.write_all(out)
                .map_err(|e| PolyfsError::operational(e.to_string()))?;
        }

        remaining -= out.len() as u64;
        curr = next;
    }

    Ok(())
}
