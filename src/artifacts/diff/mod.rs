//! Line diffing
//!
//! - `myers`: Myers' shortest edit script over any sequence of comparable items
//! - `hunk`: groups an edit script into the base ranges it replaces, which is
//!   what three-way merging works on

pub mod hunk;
pub mod myers;
