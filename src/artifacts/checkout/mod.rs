//! Bringing the working directory and index to a target tree
//!
//! Used by checkout and by merge once the merged tree is committed.

pub mod migration;
