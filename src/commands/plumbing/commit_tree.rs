use crate::areas::database::Database;
use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use tracing::info;

impl Repository {
    /// Record `tree` as a new commit on the current branch and advance it
    ///
    /// The parent is the current tip, none while the branch is unborn. A tree
    /// identical to the parent's (or the empty tree as a first commit) is
    /// refused with `NothingToCommit`.
    pub fn commit_tree(
        &mut self,
        tree: &ObjectId,
        message: &str,
        author: Author,
    ) -> anyhow::Result<ObjectId> {
        let _lock = self.lock_for_write()?;

        let parents = self.refs().read_head()?.into_iter().collect();
        self.write_commit(tree, parents, message, author)
    }

    /// Caller holds the write lock
    ///
    /// Merge commits (two parents) are written even when the tree matches the
    /// first parent's.
    pub(crate) fn write_commit(
        &self,
        tree: &ObjectId,
        parents: Vec<ObjectId>,
        message: &str,
        author: Author,
    ) -> anyhow::Result<ObjectId> {
        // fails unless the tree is stored
        self.database().load_tree(tree)?;
        self.ensure_tree_changed(tree, &parents)?;
        author.ensure_valid()?;
        let branch = self.current_branch()?;

        let commit = Commit::new(parents, tree.clone(), author, message.to_string());
        let commit_oid = self.database().store(&commit)?;
        self.refs().update_head(&commit_oid)?;

        info!(
            commit = %commit_oid,
            %branch,
            parents = commit.parents().len(),
            "created commit"
        );

        Ok(commit_oid)
    }

    /// `NothingToCommit` unless `tree` differs from the single parent's tree
    /// (or from the empty tree for a root commit)
    pub(crate) fn ensure_tree_changed(
        &self,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> anyhow::Result<()> {
        let unchanged = match parents {
            [] => *tree == Database::empty_tree_oid()?,
            [parent] => self.database().load_commit(parent)?.tree_oid() == tree,
            _ => false,
        };

        if unchanged {
            return Err(RepositoryError::NothingToCommit.into());
        }

        Ok(())
    }
}
