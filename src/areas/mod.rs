//! Stateful parts of a repository
//!
//! - `config`: author identity, default branch and merge settings
//! - `database`: content-addressed object store
//! - `ignore`: ignore rules consulted while staging
//! - `index`: staging area
//! - `refs`: branches and HEAD
//! - `repository`: the handle tying everything together
//! - `workspace`: working directory access

pub mod config;
pub mod database;
pub mod ignore;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
