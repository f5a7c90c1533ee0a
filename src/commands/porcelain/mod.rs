//! Porcelain operations
//!
//! The everyday workflow, composed from plumbing and the artifacts:
//!
//! - `init`: create a repository
//! - `stage`, `unstage`: move files in and out of the index
//! - `status`: staged, unstaged and untracked files
//! - `commit`: commit the index
//! - `log`: walk history
//! - `branch_create`, `branch_delete`, `branch_list`, `checkout`: branches
//! - `merge`: three-way merge of another branch
//! - `read_file_at`: file contents as of a commit

pub mod add;
pub mod branch;
pub mod checkout;
pub mod commit;
pub mod init;
pub mod log;
pub mod merge;
pub mod show;
pub mod status;
