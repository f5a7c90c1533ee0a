//! Staging area
//!
//! The index maps repository-relative paths to the blob and mode that will go
//! into the next commit.
//!
//! ## Index File Format
//!
//! See [`crate::artifacts::index`]: a header, the entries sorted by path and a
//! SHA-256 checksum over both. Reads hold a shared lock on the file; writes go
//! to a temp file under an exclusive lock and are renamed over the old index.
//!
//! ## Data Structures
//!
//! - `entries`: maps file paths to their index entries
//! - `children`: maps directory paths to the tracked files beneath them, so a
//!   file replacing a directory (or the reverse) can evict the other side

use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::HEADER_SIZE;
use crate::artifacts::index::index_entry::ENTRY_PREFIX_SIZE;
use crate::artifacts::objects::object::{Packable, Unpackable};
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (`.svcs/index`)
    path: Box<Path>,
    entries: BTreeMap<Box<Path>, IndexEntry>,
    children: BTreeMap<Box<Path>, BTreeSet<Box<Path>>>,
    /// Set when the in-memory entries differ from what was loaded
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    /// Read the index file at `path`; a missing file is an empty index
    pub fn load(path: Box<Path>) -> anyhow::Result<Self> {
        let mut index = Self::new(path);
        index.rehydrate()?;

        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = false;
    }

    /// Reload the entries from disk, verifying the checksum
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new()
            .read(true)
            .open(&self.path)
            .with_context(|| format!("Unable to open index file {}", self.path.display()))?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.deref_mut().metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock);
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;

        reader.verify().context("Corrupt index file")?;
        self.changed = false;

        Ok(())
    }

    /// True for a tracked file and for a directory containing tracked files
    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        self.entries.contains_key(path) || self.children.contains_key(path)
    }

    fn parse_header(&self, reader: &mut Checksum) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(header_bytes.as_ref())?;
        header.validate()?;

        Ok(header.entries_count)
    }

    /// Each entry is a fixed-width prefix carrying the path length, followed
    /// by the padded path
    fn parse_entries(&mut self, entries_count: u32, reader: &mut Checksum) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let prefix = reader.read(ENTRY_PREFIX_SIZE)?;
            let path_len = IndexEntry::path_len_from_prefix(&prefix)?;
            let rest = reader.read(IndexEntry::padded_size(path_len) - ENTRY_PREFIX_SIZE)?;

            let entry_bytes = Bytes::from([prefix.as_ref(), rest.as_ref()].concat());
            let entry = IndexEntry::deserialize(entry_bytes.as_ref())?;

            self.store_entry(&entry);
        }

        Ok(())
    }

    /// Evict whatever would clash with `entry`: files standing where its
    /// parent directories go, and files below it if it replaces a directory
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_entry(parent);
        }
        self.remove_children(&entry.name);
    }

    fn store_entry(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_owned().into_boxed_path())
                .or_default()
                .insert(entry.name.clone().into_boxed_path());
        }

        self.entries
            .insert(entry.name.clone().into_boxed_path(), entry.clone());
    }

    fn remove_children(&mut self, path_name: &Path) {
        if let Some(children) = self.children.remove(path_name) {
            for child in children {
                self.remove_entry(&child);
            }
        }
    }

    fn remove_entry(&mut self, path_name: &Path) {
        if let Some(entry) = self.entries.remove(path_name) {
            for parent in entry.parent_dirs() {
                if let Some(children) = self.children.get_mut(parent) {
                    children.remove(path_name);
                    if children.is_empty() {
                        self.children.remove(parent);
                    }
                }
            }
        }
    }

    pub fn add(&mut self, entry: IndexEntry) {
        if self.entries.get(entry.name.as_path()) == Some(&entry) {
            return;
        }

        self.discard_conflicts(&entry);
        self.store_entry(&entry);
        self.changed = true;
    }

    /// Drop a file, or every file below a directory
    pub fn remove(&mut self, path: &Path) {
        if self.is_directly_tracked(path) {
            self.remove_entry(path);
            self.remove_children(path);
            self.changed = true;
        }
    }

    /// Replace every entry at once
    pub fn reset(&mut self, entries: impl IntoIterator<Item = IndexEntry>) {
        self.clear();
        for entry in entries {
            self.store_entry(&entry);
        }
        self.changed = true;
    }

    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        let index_dir = self
            .path
            .parent()
            .with_context(|| format!("Invalid index path {}", self.path.display()))?;
        let temp_path = index_dir.join(format!(".tmp-index-{}", rand::random::<u32>()));

        {
            let mut index_file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
                .with_context(|| format!("Unable to create {}", temp_path.display()))?;
            let lock = file_guard::lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)?;

            let mut writer = Checksum::new(lock);

            let header = IndexHeader {
                entries_count: u32::try_from(self.entries.len())?,
                ..IndexHeader::empty()
            };
            writer.write(&header.serialize()?)?;

            for entry in self.entries() {
                writer.write(&entry.serialize()?)?;
            }

            writer.write_checksum()?;
        }

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Unable to replace index file {}", self.path.display()))?;
        self.changed = false;

        Ok(())
    }

    /// Entries sorted by path
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> impl Iterator<Item = IndexEntry> {
        self.entries.into_values()
    }

    /// Tracked files equal to or below `path` (`.` or an empty path means all)
    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|entry_path| {
                path == Path::new(".") || path.as_os_str().is_empty() || entry_path.starts_with(path)
            })
            .map(|p| p.to_path_buf())
            .collect()
    }
}
