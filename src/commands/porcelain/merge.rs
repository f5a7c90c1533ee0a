use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use tracing::{debug, info};

/// What a merge did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The branch was already part of the current history; nothing changed
    AlreadyUpToDate,
    /// A merge commit was recorded on the current branch
    Merged { commit: ObjectId, base: ObjectId },
}

impl Repository {
    /// Merge another branch into the current one
    ///
    /// A merge always records a two-parent commit, even when the current
    /// branch could simply be moved forward. On conflict nothing is written:
    /// the object store, index, working directory and refs stay as they were
    /// and the conflicts are returned in `MergeConflict`. The same holds when
    /// the merged tree would overwrite untracked files (`UncommittedChanges`).
    pub fn merge(&mut self, branch: &str, message: &str) -> anyhow::Result<MergeOutcome> {
        let branch_name = BranchName::try_parse(branch)?;
        let _lock = self.lock_for_write()?;

        let theirs = self
            .refs()
            .read_branch(&branch_name)?
            .ok_or_else(|| RepositoryError::BranchNotFound(branch_name.to_string()))?;
        let head = self.head()?;
        let ours = head
            .oid
            .ok_or_else(|| RepositoryError::NoCommits(head.branch.to_string()))?;

        if self.is_ancestor(&theirs, &ours)? {
            debug!(branch = %branch_name, "already up to date");
            return Ok(MergeOutcome::AlreadyUpToDate);
        }

        self.ensure_clean()?;

        // Find the best common ancestor
        let base = self.merge_base(&ours, &theirs)?;

        let tree_of = |oid: &ObjectId| -> anyhow::Result<ObjectId> {
            Ok(self.database().load_commit(oid)?.tree_oid().clone())
        };
        let result = self.merge_trees(&tree_of(&base)?, &tree_of(&ours)?, &tree_of(&theirs)?)?;
        if !result.is_clean() {
            return Err(RepositoryError::MergeConflict {
                conflicts: result.into_conflicts(),
            }
            .into());
        }

        self.ensure_untracked_preserved(&result.files(self.database())?)?;

        let tree_oid = result.write(self.database())?;
        let commit = self.write_commit(
            &tree_oid,
            vec![ours, theirs],
            message,
            self.config().author()?,
        )?;
        self.sync_to_tree(&tree_oid, false)?;

        info!(
            branch = %branch_name,
            %commit,
            %base,
            "merged branch"
        );

        Ok(MergeOutcome::Merged { commit, base })
    }
}
