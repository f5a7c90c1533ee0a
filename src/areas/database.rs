//! Content-addressed object store
//!
//! Objects live under `.svcs/objects/<2 hex>/<62 hex>`, zlib-compressed, in
//! their canonical `<type> <size>\0<body>` form. A stored object never changes,
//! so reads need no locking. Writes go through a temp file that is fsynced and
//! then renamed into place, which makes concurrent identical puts harmless.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::RepositoryError;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Store a raw object body of the given kind and return its ID
    ///
    /// Writing is skipped when the object is already present.
    pub fn put(&self, object_type: ObjectType, body: &[u8]) -> anyhow::Result<ObjectId> {
        let framed = object_type.frame(body);
        let oid = ObjectId::from_content(&framed);
        self.write_if_absent(&oid, framed)?;

        Ok(oid)
    }

    /// Load the kind and raw body of an object
    pub fn get(&self, object_id: &ObjectId) -> anyhow::Result<(ObjectType, Bytes)> {
        let content = self.load(object_id)?;
        let mut reader = content.as_ref();

        let (object_type, size) = ObjectType::parse_header(&mut reader)
            .with_context(|| format!("Corrupt object {object_id}"))?;
        if reader.len() != size {
            anyhow::bail!("Corrupt object {object_id}: size mismatch");
        }
        let offset = content.len() - reader.len();

        Ok((object_type, content.slice(offset..)))
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Load the framed, decompressed bytes of an object
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());
        if !object_path.is_file() {
            return Err(RepositoryError::ObjectNotFound(object_id.clone()).into());
        }

        self.read_object(object_path)
    }

    pub fn store<O: Object + ?Sized>(&self, object: &O) -> anyhow::Result<ObjectId> {
        let content = object.serialize()?;
        let oid = ObjectId::from_content(&content);
        self.write_if_absent(&oid, content)?;

        Ok(oid)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, body) = self.get(object_id)?;
        let object_reader = Cursor::new(body);

        let object = match object_type {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(object_reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(object_reader)?)),
            ObjectType::Commit => {
                ObjectBox::Commit(Box::new(Commit::deserialize(object_reader)?))
            }
        };

        Ok(object)
    }

    pub fn load_blob(&self, object_id: &ObjectId) -> anyhow::Result<Blob> {
        let body = self.load_typed(object_id, ObjectType::Blob)?;
        Blob::deserialize(Cursor::new(body))
    }

    pub fn load_tree(&self, object_id: &ObjectId) -> anyhow::Result<Tree> {
        let body = self.load_typed(object_id, ObjectType::Tree)?;
        Tree::deserialize(Cursor::new(body)).with_context(|| format!("Corrupt tree {object_id}"))
    }

    pub fn load_commit(&self, object_id: &ObjectId) -> anyhow::Result<Commit> {
        let body = self.load_typed(object_id, ObjectType::Commit)?;
        Commit::deserialize(Cursor::new(body))
            .with_context(|| format!("Corrupt commit {object_id}"))
    }

    pub fn load_slim_commit(&self, object_id: &ObjectId) -> anyhow::Result<SlimCommit> {
        Ok(self.load_commit(object_id)?.to_slim(object_id.clone()))
    }

    fn load_typed(&self, object_id: &ObjectId, expected: ObjectType) -> anyhow::Result<Bytes> {
        let (actual, body) = self.get(object_id)?;
        if actual != expected {
            return Err(RepositoryError::UnexpectedObjectType {
                oid: object_id.clone(),
                expected,
                actual,
            }
            .into());
        }

        Ok(body)
    }

    /// ID of the tree with no entries
    pub fn empty_tree_oid() -> anyhow::Result<ObjectId> {
        Tree::default().object_id()
    }

    /// Load a tree, treating `None` as the empty tree
    pub fn load_tree_or_empty(&self, object_id: Option<&ObjectId>) -> anyhow::Result<Tree> {
        match object_id {
            Some(oid) => self.load_tree(oid),
            None => Ok(Tree::default()),
        }
    }

    /// Every file reachable from a tree, keyed by its full path
    pub fn flatten_tree(
        &self,
        object_id: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut files = BTreeMap::new();
        if let Some(oid) = object_id {
            self.collect_files(oid, Path::new(""), &mut files)?;
        }

        Ok(files)
    }

    fn collect_files(
        &self,
        tree_oid: &ObjectId,
        prefix: &Path,
        files: &mut BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<()> {
        for (name, entry) in self.load_tree(tree_oid)?.into_entries() {
            let path = prefix.join(name);
            if entry.is_tree() {
                self.collect_files(&entry.oid, &path, files)?;
            } else {
                files.insert(path, entry);
            }
        }

        Ok(())
    }

    /// Look up the entry at `path` inside a tree
    pub fn find_entry(
        &self,
        tree_oid: &ObjectId,
        path: &Path,
    ) -> anyhow::Result<Option<DatabaseEntry>> {
        let mut current = DatabaseEntry::new(
            tree_oid.clone(),
            crate::artifacts::index::entry_mode::EntryMode::Directory,
        );

        for component in path.components() {
            if !current.is_tree() {
                return Ok(None);
            }
            let name = component
                .as_os_str()
                .to_str()
                .with_context(|| format!("Invalid path {}", path.display()))?;
            match self.load_tree(&current.oid)?.get(name) {
                Some(entry) => current = entry.clone(),
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }

    fn write_if_absent(&self, oid: &ObjectId, content: Bytes) -> anyhow::Result<()> {
        let object_path = self.path.join(oid.to_path());
        if object_path.exists() {
            return Ok(());
        }

        std::fs::create_dir_all(
            object_path
                .parent()
                .context(format!("Invalid object path {}", object_path.display()))?,
        )
        .context(format!(
            "Unable to create object directory {}",
            object_path.display()
        ))?;

        trace!(%oid, "writing object");
        self.write_object(object_path, content)
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(&object_path).context(format!(
            "Unable to read object file {}",
            object_path.display()
        ))?;

        Self::decompress(object_content.into())
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .context(format!(
                "Unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&object_content).context(format!(
            "Unable to write object file {}",
            temp_object_path.display()
        ))?;
        file.sync_all().context(format!(
            "Unable to sync object file {}",
            temp_object_path.display()
        ))?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, &object_path).context(format!(
            "Unable to rename object file to {}",
            object_path.display()
        ))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    /// Find all objects whose ID starts with the given prefix
    ///
    /// Used to resolve abbreviated IDs. More than one match means the prefix
    /// is ambiguous; the caller decides what to do with that.
    ///
    /// For prefixes of 2+ characters only the matching fan-out directory is
    /// read.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Vec::new());
        }

        let dir_names = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255).map(|i| format!("{i:02x}")).collect()
        };

        let mut matches = Vec::new();
        for dir_name in dir_names {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let file_name = entry?.file_name();
                let full_oid = format!("{}{}", dir_name, file_name.to_string_lossy());

                // temp files never parse as an ID
                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(full_oid)
                {
                    matches.push(oid);
                }
            }
        }
        matches.sort();

        Ok(matches)
    }

    pub fn get_object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        let (object_type, _) = self.get(object_id)?;
        Ok(object_type)
    }
}

/// Per-operation memo of decoded commits for graph walks
#[derive(Debug, Default)]
pub struct CommitCache {
    commits: RefCell<HashMap<ObjectId, SlimCommit>>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load_slim_commit(
        &self,
        database: &Database,
        oid: &ObjectId,
    ) -> anyhow::Result<SlimCommit> {
        if let Some(commit) = self.commits.borrow().get(oid) {
            return Ok(commit.clone());
        }

        let commit = database.load_slim_commit(oid)?;
        self.commits.borrow_mut().insert(oid.clone(), commit.clone());

        Ok(commit)
    }
}
