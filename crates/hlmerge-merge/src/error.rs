// error.rs — merge failure kinds, all surfaced as structured results

use hlmerge_bsp::BspError;
use hlmerge_common::Vec3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("need at least two maps to merge")]
    TooFewMaps,

    #[error("{lump} overflow: combined count {count} exceeds format maximum {max}")]
    Overflow {
        lump: &'static str,
        count: usize,
        max: usize,
    },

    #[error("maps '{first}' and '{second}' overlap spatially")]
    Collision {
        first: String,
        second: String,
        /// translation of `second` that would separate the two boxes
        move_fixes: Vec3,
        /// the opposite-direction alternative
        move_fixes2: Vec3,
    },

    #[error("no axis-aligned plane separates '{first}' from '{second}'")]
    NoSeparatingAxis { first: String, second: String },

    #[error("visibility data truncated at offset {0}")]
    VisTruncated(usize),

    #[error(transparent)]
    Bsp(#[from] BspError),
}

impl MergeError {
    pub fn is_overflow(&self) -> bool {
        matches!(self, MergeError::Overflow { .. })
    }
}

/// Fails when an appended lump would exceed its format ceiling.
pub fn check_capacity(lump: &'static str, count: usize, max: usize) -> Result<(), MergeError> {
    if count > max {
        return Err(MergeError::Overflow { lump, count, max });
    }
    Ok(())
}
