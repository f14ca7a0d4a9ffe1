// vis.rs — zero-run codec for the visibility lump

use crate::error::MergeError;

/// Bytes in one uncompressed vis row for a map with `leaf_count` leaves.
/// Bit i of a row refers to leaf i+1; leaf 0 (solid) has no bit.
pub fn row_bytes(leaf_count: usize) -> usize {
    leaf_count.saturating_sub(1).div_ceil(8)
}

/// Decompress one row starting at `ofs`. In the compressed stream a zero
/// byte is followed by a repeat count; all other bytes are literal.
pub fn decompress_row(vis: &[u8], ofs: usize, row_len: usize) -> Result<Vec<u8>, MergeError> {
    let mut row = Vec::with_capacity(row_len);
    let mut pos = ofs;
    while row.len() < row_len {
        if pos >= vis.len() {
            return Err(MergeError::VisTruncated(pos));
        }
        let b = vis[pos];
        pos += 1;
        if b != 0 {
            row.push(b);
            continue;
        }
        if pos >= vis.len() {
            return Err(MergeError::VisTruncated(pos));
        }
        let count = vis[pos] as usize;
        pos += 1;
        if count == 0 {
            return Err(MergeError::VisTruncated(pos));
        }
        for _ in 0..count {
            if row.len() < row_len {
                row.push(0);
            }
        }
    }
    Ok(row)
}

pub fn compress_row(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len());
    let mut i = 0;
    while i < row.len() {
        if row[i] != 0 {
            out.push(row[i]);
            i += 1;
            continue;
        }
        let mut run = 0usize;
        while i < row.len() && row[i] == 0 && run < 255 {
            run += 1;
            i += 1;
        }
        out.push(0);
        out.push(run as u8);
    }
    out
}

/// Returns whether `leaf` is marked visible in an uncompressed row.
pub fn row_bit(row: &[u8], leaf: usize) -> bool {
    if leaf == 0 {
        return false;
    }
    let bit = leaf - 1;
    row.get(bit / 8).is_some_and(|b| b & (1 << (bit % 8)) != 0)
}

/// Sets the bit for `leaf` in an uncompressed row.
pub fn set_row_bit(row: &mut [u8], leaf: usize) {
    if leaf == 0 {
        return;
    }
    let bit = leaf - 1;
    row[bit / 8] |= 1 << (bit % 8);
}
