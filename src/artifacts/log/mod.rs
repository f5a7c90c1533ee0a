//! Commit history traversal
//!
//! `rev_list` walks history from a starting commit, either along first
//! parents only (the mainline) or through every reachable commit, newest
//! first.

pub mod rev_list;
