//! Repository handle
//!
//! A [`Repository`] ties together the object database, the references, the
//! working directory and the ignore rules of one repository. The index is
//! loaded from disk by each operation that needs it.
//!
//! ## Concurrency
//!
//! Operations that change anything take `&mut Repository` and hold an
//! exclusive advisory lock on `.svcs/lock` while they run, so writers in other
//! processes are serialized too. Read-only operations take `&Repository` and
//! need no lock: objects never change once written and every ref file is
//! replaced atomically.

use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::ignore::{IgnoreMatcher, IgnoreRules};
use crate::areas::index::Index;
use crate::areas::refs::{HeadSnapshot, Refs};
use crate::areas::workspace::{WorkingDirectory, Workspace};
use crate::artifacts::branch::branch_name::BranchName;
use crate::errors::RepositoryError;
use anyhow::Context;
use file_guard::{FileGuard, Lock};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const METADATA_DIR: &str = ".svcs";
pub const OBJECTS_DIR: &str = "objects";
pub const INDEX_FILE: &str = "index";
pub const LOCK_FILE: &str = "lock";

/// Held for the duration of a mutating operation
pub(crate) type WriteLock = FileGuard<Box<File>>;

#[derive(Debug)]
pub struct Repository {
    root: Box<Path>,
    config: Config,
    database: Database,
    refs: Refs,
    workspace: Box<dyn WorkingDirectory>,
    ignore: Box<dyn IgnoreMatcher>,
}

impl Repository {
    pub fn open(root: impl AsRef<Path>, config: Config) -> anyhow::Result<Self> {
        let root = Self::locate(root.as_ref())?;
        let workspace = Box::new(Workspace::new(root.clone().into_boxed_path()));
        let ignore = Box::new(IgnoreRules::load(&root)?);

        Self::open_with(root, config, workspace, ignore)
    }

    /// Open with custom working-directory and ignore collaborators
    pub fn open_with(
        root: impl AsRef<Path>,
        config: Config,
        workspace: Box<dyn WorkingDirectory>,
        ignore: Box<dyn IgnoreMatcher>,
    ) -> anyhow::Result<Self> {
        let root = Self::locate(root.as_ref())?;
        let metadata_path = root.join(METADATA_DIR);

        Ok(Repository {
            database: Database::new(metadata_path.join(OBJECTS_DIR).into_boxed_path()),
            refs: Refs::new(metadata_path.into_boxed_path()),
            root: root.into_boxed_path(),
            config,
            workspace,
            ignore,
        })
    }

    fn locate(root: &Path) -> anyhow::Result<PathBuf> {
        let head_path = root.join(METADATA_DIR).join(crate::areas::refs::HEAD_REF_NAME);
        if !head_path.is_file() {
            return Err(RepositoryError::NotARepository(root.to_path_buf()).into());
        }

        root.canonicalize()
            .with_context(|| format!("Unable to resolve {}", root.display()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn workspace(&self) -> &dyn WorkingDirectory {
        self.workspace.as_ref()
    }

    pub fn ignore(&self) -> &dyn IgnoreMatcher {
        self.ignore.as_ref()
    }

    pub fn index_path(&self) -> PathBuf {
        self.metadata_path().join(INDEX_FILE)
    }

    /// Current on-disk state of the index
    pub fn load_index(&self) -> anyhow::Result<Index> {
        Index::load(self.index_path().into_boxed_path())
    }

    pub fn current_branch(&self) -> anyhow::Result<BranchName> {
        self.refs.current_branch()
    }

    /// Current branch and its tip, `None` while unborn
    pub fn head(&self) -> anyhow::Result<HeadSnapshot> {
        self.refs.head_snapshot()
    }

    /// Block until no other writer holds the repository
    pub(crate) fn lock_for_write(&mut self) -> anyhow::Result<WriteLock> {
        let lock_path = self.metadata_path().join(LOCK_FILE);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Unable to open {}", lock_path.display()))?;

        let guard = file_guard::lock(Box::new(file), Lock::Exclusive, 0, 1)
            .with_context(|| format!("Unable to lock {}", lock_path.display()))?;
        debug!("acquired repository write lock");

        Ok(guard)
    }
}
