//! svcs - core engine of a local version control system
//!
//! The crate is organised the same way a repository is laid out on disk:
//!
//! - `areas`: the stateful parts of a repository (object database, index, refs,
//!   working directory, ignore rules, configuration)
//! - `artifacts`: the data structures and algorithms operating on them (objects,
//!   diffing, merge-base search, three-way merge, history traversal, status)
//! - `commands`: repository operations, split into plumbing and porcelain
//! - `errors`: the error kinds callers can match on
//!
//! Every operation lives on [`Repository`](areas::repository::Repository).

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;

pub use areas::config::Config;
pub use areas::repository::Repository;
pub use errors::RepositoryError;
pub use artifacts::log::rev_list::LogMode;
pub use artifacts::merge::conflict::{ConflictKind, ConflictRecord, ConflictStyle};
pub use commands::porcelain::merge::MergeOutcome;
