//! Repository operations
//!
//! Every operation is an `impl Repository` block, split in two groups:
//!
//! - `plumbing`: low-level access to objects and the commit graph
//!   (hash-object, cat-object, ls-tree, write-tree, commit-tree, merge-base)
//! - `porcelain`: the user-facing workflow (stage, commit, log, branch, merge)
//!
//! Plumbing provides the building blocks; porcelain composes them.

pub mod plumbing;
pub mod porcelain;
