// error.rs — parse/serialize/validation errors for BSP files

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BspError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{name}: not a v30 BSP (version {version})")]
    BadVersion { name: String, version: i32 },

    #[error("file too small for BSP header ({0} bytes)")]
    Truncated(usize),

    #[error("{name} lump extends past end of file (ofs {ofs}, len {len})")]
    LumpOutOfRange {
        name: &'static str,
        ofs: usize,
        len: usize,
    },

    #[error("funny lump size in {name} lump ({len} bytes)")]
    FunnyLumpSize { name: &'static str, len: usize },

    #[error("{lump}[{index}]: {field} {value} out of range (limit {limit})")]
    BadReference {
        lump: &'static str,
        index: usize,
        field: &'static str,
        value: i64,
        limit: usize,
    },

    #[error("hull {hull}: node {node} referenced more than once (tree is not acyclic)")]
    CyclicTree { hull: usize, node: usize },

    #[error("entity text: {0} at byte {1}")]
    EntityParse(&'static str, usize),

    #[error("entity lump too large ({len} > {max} bytes)")]
    EntStringTooLarge { len: usize, max: usize },
}
