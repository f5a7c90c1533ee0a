//! Tree object
//!
//! Trees represent directory snapshots. They map entry names to the object
//! each name points at (a blob for files, another tree for directories)
//! together with the entry mode.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<32-byte-sha256>`
//!
//! Entries are ordered by name, where directory names compare as if they
//! carried a trailing `/`. The same set of entries always serializes to the
//! same bytes and therefore the same object ID.
//!
//! ## Tree Building
//!
//! [`Tree`] is the stored form. [`TreeBuilder`] is an in-memory hierarchy
//! whose leaves may still be unstored content; it is turned into stored
//! trees by [`TreeBuilder::resolve`] which hands each new object to a sink.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// Stored directory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, DatabaseEntry>,
}

impl Tree {
    pub fn new(entries: BTreeMap<String, DatabaseEntry>) -> Self {
        Tree { entries }
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseEntry> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.entries.into_iter()
    }

    /// Entries in canonical on-disk order
    fn sorted_entries(&self) -> Vec<(&String, &DatabaseEntry)> {
        let mut entries = self.entries.iter().collect::<Vec<_>>();
        entries.sort_by_cached_key(|(name, entry)| sort_key(name, &entry.mode));
        entries
    }
}

fn sort_key(name: &str, mode: &EntryMode) -> String {
    if mode.is_tree() {
        format!("{name}/")
    } else {
        name.to_string()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();

        for (name, entry) in self.sorted_entries() {
            let header = format!("{} {}", entry.mode.as_str(), name);
            content_bytes.write_all(header.as_bytes())?;
            content_bytes.push(0);
            entry.oid.write_raw_to(&mut content_bytes)?;
        }

        Ok(self.object_type().frame(&content_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid = ObjectId::read_raw_from(&mut reader).context("unexpected EOF in object id")?;

            entries.insert(name, DatabaseEntry::new(oid, mode));
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.sorted_entries()
            .into_iter()
            .map(|(name, entry)| {
                let object_type = if entry.is_tree() {
                    ObjectType::Tree
                } else {
                    ObjectType::Blob
                };
                format!("{} {} {}\t{}", entry.mode, object_type, entry.oid, name)
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// Entry of a tree that is still being assembled
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEntry {
    /// Already in the object store
    Stored(DatabaseEntry),
    /// File content not yet stored
    Blob { content: Bytes, mode: EntryMode },
    /// Nested directory not yet stored
    Directory(TreeBuilder),
}

/// In-memory directory hierarchy that can be resolved into stored trees
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeBuilder {
    entries: BTreeMap<String, PendingEntry>,
}

impl TreeBuilder {
    /// Build a hierarchy from a flat list of staged entries
    pub fn build<'e>(entries: impl IntoIterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut root = Self::default();

        for entry in entries {
            let mut names = entry
                .parent_dirs()
                .into_iter()
                .map(|dir| {
                    dir.file_name()
                        .and_then(|name| name.to_str())
                        .map(str::to_string)
                        .context("Invalid parent")
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            names.push(entry.basename()?.to_string());

            let stored = DatabaseEntry::new(entry.oid.clone(), entry.entry_mode());
            root.insert_path(&names, PendingEntry::Stored(stored))?;
        }

        Ok(root)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: PendingEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &PendingEntry)> {
        self.entries.iter()
    }

    fn insert_path(&mut self, names: &[String], entry: PendingEntry) -> anyhow::Result<()> {
        match names {
            [] => Err(anyhow::anyhow!("Empty entry path")),
            [name] => {
                self.insert(name.clone(), entry);
                Ok(())
            }
            [parent, rest @ ..] => {
                let slot = self
                    .entries
                    .entry(parent.clone())
                    .or_insert_with(|| PendingEntry::Directory(TreeBuilder::default()));
                match slot {
                    PendingEntry::Directory(tree) => tree.insert_path(rest, entry),
                    _ => Err(anyhow::anyhow!("{parent} is both a file and a directory")),
                }
            }
        }
    }

    /// Turn the hierarchy into stored trees, children before parents
    ///
    /// Every object that has to exist for the root to be valid is passed to
    /// `sink`, which returns its ID. Empty directories are dropped. Returns the
    /// root tree's ID.
    pub fn resolve<F>(self, sink: &mut F) -> anyhow::Result<ObjectId>
    where
        F: FnMut(&dyn Object) -> anyhow::Result<ObjectId>,
    {
        let tree = self.resolve_entries(sink)?;
        sink(&tree)
    }

    fn resolve_entries<F>(self, sink: &mut F) -> anyhow::Result<Tree>
    where
        F: FnMut(&dyn Object) -> anyhow::Result<ObjectId>,
    {
        let mut entries = BTreeMap::new();

        for (name, entry) in self.entries {
            let stored = match entry {
                PendingEntry::Stored(stored) => stored,
                PendingEntry::Blob { content, mode } => {
                    let oid = sink(&Blob::new(content))?;
                    DatabaseEntry::new(oid, mode)
                }
                PendingEntry::Directory(builder) => {
                    let tree = builder.resolve_entries(sink)?;
                    if tree.is_empty() {
                        continue;
                    }
                    DatabaseEntry::new(sink(&tree)?, EntryMode::Directory)
                }
            };
            entries.insert(name, stored);
        }

        Ok(Tree::new(entries))
    }
}
