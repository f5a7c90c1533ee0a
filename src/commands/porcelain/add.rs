use crate::areas::repository::Repository;
use crate::artifacts::index::entry_mode::FileMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::errors::RepositoryError;
use anyhow::Context;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

impl Repository {
    /// Record the working-directory state of a file, or of every file below
    /// a directory, in the index
    ///
    /// Untracked ignored files are skipped. Tracked files that are gone from
    /// the working directory are dropped from the index.
    pub fn stage(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = self.relative_path(path.as_ref())?;
        let _lock = self.lock_for_write()?;

        // Load the index file from the disk
        let mut index = self.load_index()?;

        let present = self
            .workspace()
            .list_files(scope(&path))?
            .into_iter()
            .collect::<BTreeSet<_>>();
        let tracked = index.entries_under_path(&path);
        if present.is_empty() && tracked.is_empty() {
            return Err(RepositoryError::PathNotFound(path).into());
        }

        // Deletions go first: a file that became a directory must be gone
        // before the files below it are added
        for file in tracked.iter().filter(|file| !present.contains(*file)) {
            if index.entry_by_path(file).is_some() {
                debug!(path = %file.display(), "staging deletion");
                index.remove(file);
            }
        }

        for file in &present {
            if index.entry_by_path(file).is_none() && self.ignore().is_ignored(file) {
                debug!(path = %file.display(), "skipping ignored file");
                continue;
            }

            let content = self.workspace().read_file(file)?;
            let mode = self.workspace().file_mode(file)?;
            let oid = self.database().store(&Blob::new(content))?;
            index.add(IndexEntry::new(file.clone(), oid, mode));
        }

        if index.is_changed() {
            index.write_updates()?;
        }

        Ok(())
    }

    /// Put a file, or every file below a directory, back to its state in HEAD
    ///
    /// Paths HEAD does not have are dropped from the index. The working
    /// directory is not touched.
    pub fn unstage(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = self.relative_path(path.as_ref())?;
        let _lock = self.lock_for_write()?;

        let mut index = self.load_index()?;
        let head_tree = self.head_tree()?;

        let in_scope = |file: &Path| path.as_os_str().is_empty() || file.starts_with(&path);
        let paths = index
            .entries_under_path(&path)
            .into_iter()
            .chain(head_tree.keys().filter(|file| in_scope(file)).cloned())
            .collect::<BTreeSet<_>>();
        if paths.is_empty() {
            return Err(RepositoryError::PathNotFound(path).into());
        }

        for file in paths {
            match head_tree.get(&file) {
                Some(entry) => {
                    let mode = FileMode::try_from(entry.mode)?;
                    index.add(IndexEntry::new(file, entry.oid.clone(), mode));
                }
                None => index.remove(&file),
            }
        }

        if index.is_changed() {
            index.write_updates()?;
        }

        Ok(())
    }

    /// Repository-relative form of `path`, empty for the root itself
    pub(crate) fn relative_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let relative = if path.is_absolute() {
            path.strip_prefix(self.root())
                .with_context(|| format!("{} is outside the repository", path.display()))?
        } else {
            path
        };

        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => normalized.push(name),
                Component::CurDir => {}
                _ => anyhow::bail!("{} is outside the repository", path.display()),
            }
        }

        Ok(normalized)
    }
}

fn scope(path: &Path) -> Option<&Path> {
    (!path.as_os_str().is_empty()).then_some(path)
}
