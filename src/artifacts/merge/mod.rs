//! Three-way merge
//!
//! - `merge_base`: best common ancestor of two commits
//! - `line_merge`: three-way reconciliation of file contents
//! - `tree_merge`: three-way reconciliation of whole trees
//! - `conflict`: what a merge could not resolve

pub mod conflict;
pub mod line_merge;
pub mod merge_base;
pub mod tree_merge;
