// lib.rs — offline merging of compiled GoldSrc maps into one playable map

pub mod arrange;
pub mod context;
pub mod error;
pub mod lumps;
pub mod merger;
pub mod ripent;
pub mod tree;
pub mod vis;

pub use error::MergeError;
pub use merger::{merge, MergeFailure, MergeOptions, MergeOutcome};
