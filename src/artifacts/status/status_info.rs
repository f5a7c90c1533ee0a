use crate::areas::ignore::IgnoreMatcher;
use crate::areas::index::Index;
use crate::areas::workspace::WorkingDirectory;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use derive_new::new;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub type ChangeSet<T> = BTreeMap<PathBuf, T>;
pub type FileSet = BTreeSet<PathBuf>;
pub type HeadTree = BTreeMap<PathBuf, DatabaseEntry>;

/// Three partitions of the repository state, each sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusInfo {
    /// Index against HEAD
    pub staged: ChangeSet<IndexChangeType>,
    /// Working directory against the index
    pub unstaged: ChangeSet<WorkspaceChangeType>,
    /// Files in neither the index nor HEAD, ignored ones excluded
    pub untracked: FileSet,
}

impl StatusInfo {
    pub fn is_clean(&self) -> bool {
        !self.has_changes() && self.untracked.is_empty()
    }

    /// Staged or unstaged modifications exist; untracked files do not count
    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty() || !self.unstaged.is_empty()
    }

    /// Paths with staged or unstaged modifications
    pub fn changed_paths(&self) -> Vec<PathBuf> {
        self.staged
            .keys()
            .chain(self.unstaged.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(new)]
pub struct Status<'r> {
    workspace: &'r dyn WorkingDirectory,
    ignore: &'r dyn IgnoreMatcher,
}

impl<'r> Status<'r> {
    pub fn initialize(&self, index: &Index, head_tree: &HeadTree) -> anyhow::Result<StatusInfo> {
        let inspector = Inspector::new(self.workspace);

        Ok(StatusInfo {
            staged: self.check_index_against_head_tree(index, head_tree, &inspector),
            unstaged: self.check_workspace_against_index(index, &inspector)?,
            untracked: self.scan_untracked(index, head_tree)?,
        })
    }

    fn check_index_against_head_tree(
        &self,
        index: &Index,
        head_tree: &HeadTree,
        inspector: &Inspector<'_>,
    ) -> ChangeSet<IndexChangeType> {
        let mut staged = index
            .entries()
            .map(|entry| {
                let change = inspector.check_index_against_head_tree(Some(entry), head_tree.get(&entry.name));
                (entry.name.clone(), change)
            })
            .filter(|(_, change)| *change != IndexChangeType::None)
            .collect::<ChangeSet<_>>();

        for (path, head_entry) in head_tree {
            if index.entry_by_path(path).is_none() {
                staged.insert(
                    path.clone(),
                    inspector.check_index_against_head_tree(None, Some(head_entry)),
                );
            }
        }

        staged
    }

    fn check_workspace_against_index(
        &self,
        index: &Index,
        inspector: &Inspector<'_>,
    ) -> anyhow::Result<ChangeSet<WorkspaceChangeType>> {
        let mut unstaged = ChangeSet::new();

        for entry in index.entries() {
            let change = inspector.check_index_against_workspace(entry)?;
            if change != WorkspaceChangeType::None {
                unstaged.insert(entry.name.clone(), change);
            }
        }

        Ok(unstaged)
    }

    fn scan_untracked(&self, index: &Index, head_tree: &HeadTree) -> anyhow::Result<FileSet> {
        Ok(self
            .workspace
            .list_files(None)?
            .into_iter()
            .filter(|path| index.entry_by_path(path).is_none() && !head_tree.contains_key(path))
            .filter(|path| !self.ignore.is_ignored(path))
            .collect())
    }
}
