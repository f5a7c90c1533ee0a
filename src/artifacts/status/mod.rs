//! Working tree status inspection
//!
//! Compares the working directory against the index and the index against
//! the HEAD tree.
//!
//! - `file_change`: change kinds for each comparison
//! - `inspector`: per-file comparisons
//! - `status_info`: the full report

pub mod file_change;
pub mod inspector;
pub mod status_info;
