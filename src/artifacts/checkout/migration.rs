//! Checkout migration
//!
//! Moving to another tree happens in two steps:
//!
//! 1. Plan: compare the target tree with the index (and the working copy of
//!    each tracked file) and record what has to be added, modified or deleted
//! 2. Apply: delete first, then write files, then replace the index entries
//!
//! Only tracked files are ever deleted. When untracked files are guarded,
//! planning fails if the target tree would overwrite one of them, either at
//! the same path or by putting a file where its directory is (or a directory
//! where it is). Ignored files are not guarded.

use crate::areas::database::Database;
use crate::areas::ignore::IgnoreMatcher;
use crate::areas::index::Index;
use crate::areas::workspace::WorkingDirectory;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::status::file_change::WorkspaceChangeType;
use crate::artifacts::status::inspector::Inspector;
use crate::artifacts::status::status_info::HeadTree;
use crate::errors::RepositoryError;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Type of file system action required for checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionType {
    /// Create new file
    Add,
    /// Delete file
    Delete,
    /// Rewrite an existing file
    Modify,
}

/// Planned actions grouped by type, each list sorted by path
pub type ActionsSet = BTreeMap<ActionType, Vec<(PathBuf, Option<DatabaseEntry>)>>;

pub struct Migration<'r> {
    database: &'r Database,
    workspace: &'r dyn WorkingDirectory,
    index: &'r mut Index,
    guard: Option<&'r dyn IgnoreMatcher>,
    actions: ActionsSet,
}

impl<'r> Migration<'r> {
    pub fn new(
        database: &'r Database,
        workspace: &'r dyn WorkingDirectory,
        index: &'r mut Index,
    ) -> Self {
        Self {
            database,
            workspace,
            index,
            guard: None,
            actions: ActionsSet::new(),
        }
    }

    /// Refuse to overwrite untracked files that `ignore` does not match
    pub fn guard_untracked(mut self, ignore: &'r dyn IgnoreMatcher) -> Self {
        self.guard = Some(ignore);
        self
    }

    pub fn actions(&self) -> &ActionsSet {
        &self.actions
    }

    /// Make the working directory and the index match `target`
    pub fn apply_changes(&mut self, target: &HeadTree) -> anyhow::Result<()> {
        self.plan_changes(target)?;
        self.update_workspace()?;
        self.update_index(target)?;

        Ok(())
    }

    /// Work out what `apply_changes` would do without touching anything
    pub fn plan_changes(&mut self, target: &HeadTree) -> anyhow::Result<()> {
        if let Some(ignore) = self.guard {
            self.check_untracked(target, ignore)?;
        }

        let inspector = Inspector::new(self.workspace);
        let mut actions = ActionsSet::new();

        for entry in self.index.entries() {
            if !target.contains_key(&entry.name) {
                actions
                    .entry(ActionType::Delete)
                    .or_default()
                    .push((entry.name.clone(), None));
            }
        }

        for (path, target_entry) in target {
            let action = match self.index.entry_by_path(path) {
                None => Some(ActionType::Add),
                Some(index_entry) if !index_entry.same_content(&target_entry.oid, file_mode(target_entry)?) => {
                    Some(ActionType::Modify)
                }
                Some(index_entry) => (inspector.check_index_against_workspace(index_entry)?
                    != WorkspaceChangeType::None)
                    .then_some(ActionType::Modify),
            };

            if let Some(action) = action {
                actions
                    .entry(action)
                    .or_default()
                    .push((path.clone(), Some(target_entry.clone())));
            }
        }

        debug!(
            added = actions.get(&ActionType::Add).map_or(0, Vec::len),
            modified = actions.get(&ActionType::Modify).map_or(0, Vec::len),
            deleted = actions.get(&ActionType::Delete).map_or(0, Vec::len),
            "planned checkout"
        );
        self.actions = actions;

        Ok(())
    }

    fn check_untracked(&self, target: &HeadTree, ignore: &dyn IgnoreMatcher) -> anyhow::Result<()> {
        let mut lost = Vec::new();

        for path in self.workspace.list_files(None)? {
            if self.index.entry_by_path(&path).is_some() || ignore.is_ignored(&path) {
                continue;
            }

            let overwritten = match target.get(&path) {
                Some(entry) => !self.matches_workspace(&path, entry)?,
                None => shadowed_by_file(target, &path) || has_files_below(target, &path),
            };
            if overwritten {
                lost.push(path);
            }
        }

        if !lost.is_empty() {
            debug!(count = lost.len(), "untracked files in the way");
            return Err(RepositoryError::UncommittedChanges { paths: lost }.into());
        }

        Ok(())
    }

    fn matches_workspace(&self, path: &Path, entry: &DatabaseEntry) -> anyhow::Result<bool> {
        let blob = Blob::new(self.workspace.read_file(path)?);
        let mode = EntryMode::File(self.workspace.file_mode(path)?);

        Ok(blob.object_id()? == entry.oid && mode == entry.mode)
    }

    fn update_workspace(&self) -> anyhow::Result<()> {
        for (path, _) in self.actions.get(&ActionType::Delete).into_iter().flatten() {
            self.workspace.remove_file(path)?;
        }

        for action_type in [ActionType::Add, ActionType::Modify] {
            for (path, entry) in self.actions.get(&action_type).into_iter().flatten() {
                let Some(entry) = entry else {
                    anyhow::bail!("Entry must be provided for Add and Modify actions");
                };
                let blob = self.database.load_blob(&entry.oid)?;
                self.workspace
                    .write_file(path, blob.content(), file_mode(entry)?)?;
            }
        }

        Ok(())
    }

    fn update_index(&mut self, target: &HeadTree) -> anyhow::Result<()> {
        let entries = target
            .iter()
            .map(|(path, entry)| Ok(IndexEntry::new(path.clone(), entry.oid.clone(), file_mode(entry)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.index.reset(entries);

        Ok(())
    }
}

/// The target has a file where one of `path`'s directories has to be
fn shadowed_by_file(target: &HeadTree, path: &Path) -> bool {
    path.ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .any(|ancestor| target.contains_key(ancestor))
}

/// The target needs `path` to be a directory
fn has_files_below(target: &HeadTree, path: &Path) -> bool {
    target
        .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
        .next()
        .is_some_and(|(next, _)| next.starts_with(path))
}

fn file_mode(entry: &DatabaseEntry) -> anyhow::Result<FileMode> {
    FileMode::try_from(entry.mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::ignore::IgnoreRules;
    use crate::areas::workspace::Workspace;
    use crate::errors::repository_error;
    use assert_fs::TempDir;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::path::Path;

    struct Setup {
        dir: TempDir,
        database: Database,
        workspace: Workspace,
        index: Index,
    }

    #[fixture]
    fn setup() -> Setup {
        let dir = TempDir::new().unwrap();
        let metadata = dir.path().join(".svcs");
        std::fs::create_dir_all(&metadata).unwrap();

        Setup {
            database: Database::new(metadata.join("objects").into_boxed_path()),
            workspace: Workspace::new(dir.path().to_path_buf().into_boxed_path()),
            index: Index::new(metadata.join("index").into_boxed_path()),
            dir,
        }
    }

    impl Setup {
        fn target(&self, files: &[(&str, &str)]) -> HeadTree {
            files
                .iter()
                .map(|(path, content)| {
                    let oid = self
                        .database
                        .store(&Blob::new(Bytes::copy_from_slice(content.as_bytes())))
                        .unwrap();
                    (
                        PathBuf::from(path),
                        DatabaseEntry::new(oid, EntryMode::File(FileMode::Regular)),
                    )
                })
                .collect()
        }

        fn migrate(&mut self, target: &HeadTree) {
            Migration::new(&self.database, &self.workspace, &mut self.index)
                .apply_changes(target)
                .unwrap();
        }

        fn guarded_migrate(&mut self, target: &HeadTree, rules: &str) -> anyhow::Result<()> {
            let rules = IgnoreRules::parse(rules).unwrap();
            Migration::new(&self.database, &self.workspace, &mut self.index)
                .guard_untracked(&rules)
                .apply_changes(target)
        }

        fn read(&self, path: &str) -> String {
            String::from_utf8(self.workspace.read_file(Path::new(path)).unwrap().to_vec()).unwrap()
        }
    }

    #[rstest]
    fn target_tree_is_materialized(mut setup: Setup) {
        let first = setup.target(&[("a.txt", "a\n"), ("dir/b.txt", "b\n")]);
        setup.migrate(&first);

        let second = setup.target(&[("a.txt", "changed\n"), ("c.txt", "c\n")]);
        setup.migrate(&second);

        assert_eq!(setup.read("a.txt"), "changed\n");
        assert_eq!(setup.read("c.txt"), "c\n");
        assert!(!setup.dir.path().join("dir").exists());
        assert_eq!(
            setup.index.entries().map(|entry| entry.name.clone()).collect::<Vec<_>>(),
            vec![PathBuf::from("a.txt"), PathBuf::from("c.txt")]
        );
    }

    #[rstest]
    fn untracked_files_are_left_alone(mut setup: Setup) {
        setup
            .workspace
            .write_file(Path::new("notes.txt"), b"mine", FileMode::Regular)
            .unwrap();

        let target = setup.target(&[("a.txt", "a\n")]);
        setup.migrate(&target);

        assert_eq!(setup.read("notes.txt"), "mine");
    }

    #[rstest]
    fn locally_modified_tracked_file_is_restored(mut setup: Setup) {
        let target = setup.target(&[("a.txt", "a\n")]);
        setup.migrate(&target);
        setup
            .workspace
            .write_file(Path::new("a.txt"), b"local edit", FileMode::Regular)
            .unwrap();

        let mut migration = Migration::new(&setup.database, &setup.workspace, &mut setup.index);
        migration.apply_changes(&target).unwrap();

        assert_eq!(
            migration.actions().get(&ActionType::Modify).map(Vec::len),
            Some(1)
        );
        assert_eq!(setup.read("a.txt"), "a\n");
    }

    fn refused_paths(error: &anyhow::Error) -> Vec<PathBuf> {
        match repository_error(error) {
            Some(RepositoryError::UncommittedChanges { paths }) => paths.clone(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn untracked_file_at_a_target_path_is_refused(mut setup: Setup) {
        setup
            .workspace
            .write_file(Path::new("x.txt"), b"precious", FileMode::Regular)
            .unwrap();
        let target = setup.target(&[("x.txt", "incoming\n")]);

        let error = setup.guarded_migrate(&target, "").unwrap_err();

        assert_eq!(refused_paths(&error), vec![PathBuf::from("x.txt")]);
        assert_eq!(setup.read("x.txt"), "precious");
        assert!(setup.index.is_empty());
    }

    #[rstest]
    #[case::file_replaces_directory("build/out.txt", "build")]
    #[case::directory_replaces_file("build", "build/out.txt")]
    fn untracked_file_on_a_replaced_path_is_refused(
        mut setup: Setup,
        #[case] untracked: &str,
        #[case] incoming: &str,
    ) {
        setup
            .workspace
            .write_file(Path::new(untracked), b"precious", FileMode::Regular)
            .unwrap();
        let target = setup.target(&[(incoming, "incoming\n")]);

        let error = setup.guarded_migrate(&target, "").unwrap_err();

        assert_eq!(refused_paths(&error), vec![PathBuf::from(untracked)]);
        assert_eq!(setup.read(untracked), "precious");
    }

    #[rstest]
    fn identical_or_ignored_untracked_files_do_not_block(mut setup: Setup) {
        setup
            .workspace
            .write_file(Path::new("same.txt"), b"same\n", FileMode::Regular)
            .unwrap();
        setup
            .workspace
            .write_file(Path::new("cache.log"), b"stale", FileMode::Regular)
            .unwrap();
        let target = setup.target(&[("same.txt", "same\n"), ("cache.log", "fresh\n")]);

        setup.guarded_migrate(&target, "*.log\n").unwrap();

        assert_eq!(setup.read("cache.log"), "fresh\n");
        assert_eq!(setup.index.len(), 2);
    }
}
