//! Error kinds a caller can tell apart
//!
//! Fallible operations return `anyhow::Result`; the cases listed here are
//! raised as [`RepositoryError`] so they can be recovered with
//! `error.downcast_ref::<RepositoryError>()`. Anything else (I/O failures,
//! corrupt objects) arrives as plain context-annotated `anyhow` errors.

use crate::artifacts::merge::conflict::ConflictRecord;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("object {oid} is a {actual}, expected a {expected}")]
    UnexpectedObjectType {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("nothing to commit, working tree clean")]
    NothingToCommit,

    #[error("commits {ours} and {theirs} have no common ancestor")]
    NoCommonAncestor { ours: ObjectId, theirs: ObjectId },

    #[error("uncommitted changes in {}", display_paths(.paths))]
    UncommittedChanges { paths: Vec<PathBuf> },

    #[error("cannot delete branch '{0}' while it is checked out")]
    CannotDeleteCurrent(String),

    #[error("merge stopped with {} conflict(s)", .conflicts.len())]
    MergeConflict { conflicts: Vec<ConflictRecord> },

    #[error("branch '{0}' not found")]
    BranchNotFound(String),

    #[error("a branch named '{0}' already exists")]
    BranchExists(String),

    #[error("'{0}' is not a valid branch name")]
    InvalidBranchName(String),

    #[error("invalid identity '{}'", .0.escape_debug())]
    InvalidIdentity(String),

    #[error("current branch '{0}' does not have any commits yet")]
    NoCommits(String),

    #[error("pathspec '{}' did not match any files", .0.display())]
    PathNotFound(PathBuf),

    #[error("not a repository (or any parent up to mount point): {}", .0.display())]
    NotARepository(PathBuf),

    #[error("repository already exists in {}", .0.display())]
    AlreadyInitialized(PathBuf),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pull a [`RepositoryError`] out of an `anyhow` chain, if one is there
pub fn repository_error(error: &anyhow::Error) -> Option<&RepositoryError> {
    error.chain().find_map(|cause| cause.downcast_ref::<RepositoryError>())
}
