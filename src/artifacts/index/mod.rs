//! Index file format
//!
//! The index (staging area) records which content goes into the next commit.
//!
//! ## File Format
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "SIDX" (4 bytes)
//!   - Version: 1 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - Sorted by path, each padded to 8-byte alignment
//!
//! Checksum (32 bytes):
//!   - SHA-256 of all preceding bytes
//! ```

pub mod checksum;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;

/// Size of SHA-256 checksum in bytes
pub const CHECKSUM_SIZE: usize = 32;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12; // 4 bytes for marker, 4 for version, 4 for entries_count

/// Magic signature identifying index files
pub const SIGNATURE: &str = "SIDX";

/// Index file format version
pub const VERSION: u32 = 1;
