//! Index entry representation
//!
//! Each entry in the index represents a staged file: its repository-relative
//! path, the blob holding its content and its file mode.
//!
//! ## Entry Format
//!
//! ```text
//! mode         u32 (network order)
//! object id    32 raw bytes
//! path length  u16 (network order)
//! path         UTF-8, `/`-separated, NUL-terminated
//! padding      NUL bytes up to the next multiple of 8
//! ```

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Maximum path length supported in index entries
pub const MAX_PATH_SIZE: usize = u16::MAX as usize;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Size of the fixed-width prefix of an entry (mode, object id, path length)
pub const ENTRY_PREFIX_SIZE: usize = 4 + OBJECT_ID_RAW_LENGTH + 2;

/// Index entry representing a staged file
#[derive(Debug, Clone, new)]
pub struct IndexEntry {
    /// File path relative to repository root
    pub name: PathBuf,
    /// Hash of the staged blob
    pub oid: ObjectId,
    pub mode: FileMode,
}

impl IndexEntry {
    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid file name"))
    }

    /// Every proper ancestor directory of the entry, outermost first
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = self
            .name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect::<Vec<_>>();
        dirs.reverse();

        dirs
    }

    pub fn entry_mode(&self) -> EntryMode {
        EntryMode::from(self.mode)
    }

    /// Content and mode match, path aside
    pub fn same_content(&self, oid: &ObjectId, mode: FileMode) -> bool {
        &self.oid == oid && self.mode == mode
    }

    /// Total on-disk size of an entry whose path is `path_len` bytes long
    pub fn padded_size(path_len: usize) -> usize {
        let unpadded = ENTRY_PREFIX_SIZE + path_len + 1;
        unpadded.div_ceil(ENTRY_BLOCK) * ENTRY_BLOCK
    }

    /// Read the path length out of a fixed-width entry prefix
    pub fn path_len_from_prefix(prefix: &[u8]) -> anyhow::Result<usize> {
        if prefix.len() < ENTRY_PREFIX_SIZE {
            return Err(anyhow::anyhow!("Truncated index entry"));
        }
        Ok(byteorder::NetworkEndian::read_u16(&prefix[ENTRY_PREFIX_SIZE - 2..ENTRY_PREFIX_SIZE]) as usize)
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.oid == other.oid && self.mode == other.mode
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.oid.cmp(&other.oid))
            .then_with(|| self.mode.cmp(&other.mode))
    }
}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid entry name: {:?}", self.name))?;
        if entry_name.len() > MAX_PATH_SIZE {
            return Err(anyhow::anyhow!("Entry name too long: {entry_name}"));
        }

        let mut entry_bytes = Vec::with_capacity(Self::padded_size(entry_name.len()));
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.entry_mode().as_u32())?;
        self.oid.write_raw_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(entry_name.len() as u16)?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL terminates the path
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let path_len = Self::path_len_from_prefix(&bytes)?;
        if bytes.len() != Self::padded_size(path_len) {
            return Err(anyhow::anyhow!("Invalid index entry size"));
        }

        let mode = EntryMode::try_from(byteorder::NetworkEndian::read_u32(&bytes[0..4]))?;
        let mode = FileMode::try_from(mode)?;
        let mut oid_bytes = &bytes[4..4 + OBJECT_ID_RAW_LENGTH];
        let oid = ObjectId::read_raw_from(&mut oid_bytes)?;

        let name_bytes = &bytes[ENTRY_PREFIX_SIZE..ENTRY_PREFIX_SIZE + path_len];
        if bytes[ENTRY_PREFIX_SIZE + path_len] != 0 {
            return Err(anyhow::anyhow!("Missing null terminator in entry name"));
        }
        let name = PathBuf::from(
            std::str::from_utf8(name_bytes)
                .map_err(|_| anyhow::anyhow!("Invalid UTF-8 in entry name"))?,
        );

        Ok(IndexEntry { name, oid, mode })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        ObjectId::from_content(b"test data")
    }

    #[rstest]
    fn test_entry_parent_dirs(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("a/b/c"), oid, FileMode::Regular);

        assert_eq!(entry.parent_dirs(), vec![Path::new("a"), Path::new("a/b")]);
    }

    #[rstest]
    fn test_entry_parent_dirs_root(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("a"), oid, FileMode::Regular);

        assert_eq!(entry.parent_dirs(), Vec::<&Path>::new());
    }

    #[rstest]
    fn test_entry_basename(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("a/b/c"), oid, FileMode::Regular);

        assert_eq!(entry.basename().unwrap(), "c");
    }

    #[rstest]
    #[case("a", 40)]
    #[case("abc", 48)]
    #[case("src/very/deep/file.rs", 64)]
    fn entries_are_padded_to_eight_bytes(oid: ObjectId, #[case] path: &str, #[case] size: usize) {
        let entry = IndexEntry::new(PathBuf::from(path), oid, FileMode::Executable);
        let bytes = entry.serialize().unwrap();

        assert_eq!(bytes.len(), size);
        assert_eq!(IndexEntry::padded_size(path.len()), size);
        assert_eq!(IndexEntry::deserialize(bytes.as_ref()).unwrap(), entry);
    }

    #[rstest]
    fn directory_mode_is_not_a_valid_entry(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("dir"), oid, FileMode::Regular);
        let mut bytes = entry.serialize().unwrap().to_vec();
        bytes[0..4].copy_from_slice(&0o40000u32.to_be_bytes());

        assert!(IndexEntry::deserialize(bytes.as_slice()).is_err());
    }
}
