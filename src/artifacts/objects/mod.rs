//! Stored object types
//!
//! Everything the repository records is an immutable object identified by the
//! SHA-256 hash of its canonical form. There are three kinds:
//!
//! - **Blob**: file content (raw bytes)
//! - **Tree**: directory listing (names, modes and object IDs)
//! - **Commit**: snapshot with metadata (tree, parents, author, message)
//!
//! The canonical form of every object is `<type> <size>\0<content>`.

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-256 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 64;

/// Length of a SHA-256 hash in raw bytes
pub const OBJECT_ID_RAW_LENGTH: usize = OBJECT_ID_LENGTH / 2;
