//! Data structures and algorithms
//!
//! - `branch`: branch names
//! - `checkout`: syncing the working directory and index to a tree
//! - `database`: tree entries as stored in the database
//! - `diff`: Myers diff and changed-range extraction
//! - `index`: index file format
//! - `log`: commit history traversal
//! - `merge`: merge base search and three-way merge
//! - `objects`: blob, tree and commit objects
//! - `status`: working tree status inspection

pub mod branch;
pub mod checkout;
pub mod database;
pub mod diff;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod status;
