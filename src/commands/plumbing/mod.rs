//! Plumbing operations
//!
//! Direct access to the object store and the commit graph. Porcelain
//! operations are built on top of these.
//!
//! - `hash-object`, `cat-object`: store and read raw objects
//! - `ls-tree`: list the contents of a tree
//! - `write-tree`, `commit-tree`: turn the index into a tree and a tree into a commit
//! - `merge-trees`, `merge-base`: the building blocks of a merge

pub mod cat_object;
pub mod commit_tree;
pub mod hash_object;
pub mod ls_tree;
pub mod merge_base;
pub mod merge_trees;
pub mod write_tree;
