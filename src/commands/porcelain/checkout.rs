use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::status_info::HeadTree;
use crate::errors::RepositoryError;
use tracing::info;

impl Repository {
    /// Switch to another branch
    ///
    /// The index and the working directory are reset to the branch's tree
    /// before HEAD moves. Staged or unstaged changes, and untracked files the
    /// branch would overwrite, block the switch unless `force` is set, in
    /// which case they are overwritten.
    pub fn checkout(&mut self, name: &str, force: bool) -> anyhow::Result<()> {
        let branch_name = BranchName::try_parse(name)?;
        let _lock = self.lock_for_write()?;

        let target_oid = self
            .refs()
            .read_branch(&branch_name)?
            .ok_or_else(|| RepositoryError::BranchNotFound(branch_name.to_string()))?;

        if !force {
            self.ensure_clean()?;
        }

        let target_tree = self.database().load_commit(&target_oid)?.tree_oid().clone();
        self.sync_to_tree(&target_tree, force)?;
        self.refs().set_head(&branch_name)?;

        info!(branch = %branch_name, oid = %target_oid, "checked out branch");

        Ok(())
    }

    /// Caller holds the write lock
    pub(crate) fn ensure_clean(&self) -> anyhow::Result<()> {
        let status = self.status()?;
        if status.has_changes() {
            return Err(RepositoryError::UncommittedChanges {
                paths: status.changed_paths(),
            }
            .into());
        }

        Ok(())
    }

    /// Make the index and the working directory match a stored tree
    ///
    /// Unless `force` is set, untracked files the tree would overwrite make
    /// this fail with `UncommittedChanges` before anything changes. Caller
    /// holds the write lock.
    pub(crate) fn sync_to_tree(&self, tree_oid: &ObjectId, force: bool) -> anyhow::Result<()> {
        let target = self.database().flatten_tree(Some(tree_oid))?;

        // Load the index file from the disk
        let mut index = self.load_index()?;

        let mut migration = Migration::new(self.database(), self.workspace(), &mut index);
        if !force {
            migration = migration.guard_untracked(self.ignore());
        }
        migration.apply_changes(&target)?;
        index.write_updates()?;

        Ok(())
    }

    /// Fail like `sync_to_tree` would, without changing anything
    ///
    /// Caller holds the write lock.
    pub(crate) fn ensure_untracked_preserved(&self, target: &HeadTree) -> anyhow::Result<()> {
        let mut index = self.load_index()?;

        let mut migration =
            Migration::new(self.database(), self.workspace(), &mut index).guard_untracked(self.ignore());
        migration.plan_changes(target)
    }
}
