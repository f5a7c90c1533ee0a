//! Working directory access
//!
//! The engine never touches user files directly; it goes through
//! [`WorkingDirectory`]. [`Workspace`] is the local filesystem implementation.
//! All paths crossing the trait are relative to the repository root.

use crate::areas::repository::METADATA_DIR;
use crate::artifacts::index::entry_mode::FileMode;
use anyhow::Context;
use bytes::Bytes;
use is_executable::IsExecutable;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub trait WorkingDirectory: std::fmt::Debug + Send + Sync {
    fn root(&self) -> &Path;

    /// Files at or below `path` (the whole tree for `None`), sorted
    ///
    /// The repository metadata directory is never listed. A path that does not
    /// exist yields no files.
    fn list_files(&self, path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>>;

    fn read_file(&self, path: &Path) -> anyhow::Result<Bytes>;

    fn file_mode(&self, path: &Path) -> anyhow::Result<FileMode>;

    /// True when `path` is an existing regular file
    fn exists(&self, path: &Path) -> bool;

    /// Create or replace a file, making room for it if a directory (or a
    /// file standing where a parent directory goes) is in the way
    fn write_file(&self, path: &Path, content: &[u8], mode: FileMode) -> anyhow::Result<()>;

    /// Remove a file and any parent directories left empty
    fn remove_file(&self, path: &Path) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_metadata(&self, path: &Path) -> bool {
        path.strip_prefix(&self.path)
            .ok()
            .and_then(|relative| relative.components().next())
            .is_some_and(|first| first.as_os_str() == METADATA_DIR)
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let mut parent = path.parent();

        while let Some(dir) = parent
            && dir != self.path.as_ref()
            && dir.starts_with(&self.path)
        {
            match dir.read_dir().map(|mut entries| entries.next().is_none()) {
                Ok(true) => {
                    std::fs::remove_dir(dir)
                        .with_context(|| format!("Failed to remove directory: {:?}", dir))?;
                }
                _ => break,
            }
            parent = dir.parent();
        }

        Ok(())
    }

    /// Remove files standing where a directory of `path` has to go
    fn clear_parent_files(&self, path: &Path) -> anyhow::Result<()> {
        let mut current = self.path.to_path_buf();
        let Some(parent) = path.parent() else {
            return Ok(());
        };

        for component in parent.components() {
            current.push(component);
            if current.is_file() {
                std::fs::remove_file(&current)
                    .with_context(|| format!("Failed to remove file: {:?}", current))?;
            }
        }

        Ok(())
    }
}

impl WorkingDirectory for Workspace {
    fn root(&self) -> &Path {
        &self.path
    }

    fn list_files(&self, path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let start = match path {
            Some(p) => self.path.join(p),
            None => self.path.to_path_buf(),
        };

        if start.is_file() {
            return Ok(vec![
                start
                    .strip_prefix(&self.path)
                    .map(PathBuf::from)
                    .context("Path outside of the working directory")?,
            ]);
        }
        if !start.is_dir() || self.is_metadata(&start) {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&start)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_metadata(entry.path()))
        {
            let entry = entry.context("Failed to walk working directory")?;
            if entry.file_type().is_file() {
                files.push(entry.path().strip_prefix(&self.path)?.to_path_buf());
            }
        }
        files.sort();

        Ok(files)
    }

    fn read_file(&self, path: &Path) -> anyhow::Result<Bytes> {
        let file_path = self.path.join(path);
        let content = std::fs::read(&file_path)
            .with_context(|| format!("Failed to read file: {:?}", path))?;

        Ok(Bytes::from(content))
    }

    fn file_mode(&self, path: &Path) -> anyhow::Result<FileMode> {
        let file_path = self.path.join(path);
        if !file_path.is_file() {
            anyhow::bail!("Not a file: {:?}", path);
        }

        Ok(if file_path.is_executable() {
            FileMode::Executable
        } else {
            FileMode::Regular
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.path.join(path).is_file()
    }

    fn write_file(&self, path: &Path, content: &[u8], mode: FileMode) -> anyhow::Result<()> {
        let file_path = self.path.join(path);

        self.clear_parent_files(path)?;
        if file_path.is_dir() {
            std::fs::remove_dir_all(&file_path)
                .with_context(|| format!("Failed to remove existing directory: {:?}", path))?;
        }
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for: {:?}", path))?;
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .with_context(|| format!("Failed to open file: {:?}", path))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to file: {:?}", path))?;

        #[cfg(unix)]
        {
            use crate::artifacts::index::entry_mode::EntryMode;
            use std::os::unix::fs::PermissionsExt;

            let permissions = std::fs::Permissions::from_mode(EntryMode::File(mode).as_u32() & 0o777);
            std::fs::set_permissions(&file_path, permissions)
                .with_context(|| format!("Failed to set permissions for file: {:?}", path))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
        let file_path = self.path.join(path);

        if file_path.is_file() {
            std::fs::remove_file(&file_path)
                .with_context(|| format!("Failed to remove file: {:?}", path))?;
        }
        self.prune_empty_parent_dirs(&file_path)
    }
}
