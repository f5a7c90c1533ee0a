use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use tracing::info;

impl Repository {
    /// Create a branch at `at`, or at the current tip
    pub fn branch_create(&mut self, name: &str, at: Option<&ObjectId>) -> anyhow::Result<()> {
        let branch_name = BranchName::try_parse(name)?;
        let _lock = self.lock_for_write()?;

        let source_oid = match at {
            Some(oid) => oid.clone(),
            None => {
                let head = self.head()?;
                head.oid
                    .ok_or_else(|| RepositoryError::NoCommits(head.branch.to_string()))?
            }
        };
        // fails unless the target is a stored commit
        self.database().load_commit(&source_oid)?;

        self.refs().create_branch(&branch_name, &source_oid)?;
        info!(branch = %branch_name, oid = %source_oid, "created branch");

        Ok(())
    }

    /// Delete a branch other than the current one, returning its last tip
    pub fn branch_delete(&mut self, name: &str) -> anyhow::Result<ObjectId> {
        let branch_name = BranchName::try_parse(name)?;
        let _lock = self.lock_for_write()?;

        if self.refs().is_current_branch(&branch_name)? {
            return Err(RepositoryError::CannotDeleteCurrent(branch_name.to_string()).into());
        }

        let oid = self.refs().delete_branch(&branch_name)?;
        info!(branch = %branch_name, %oid, "deleted branch");

        Ok(oid)
    }

    /// Branches that have at least one commit, sorted by name
    pub fn branch_list(&self) -> anyhow::Result<Vec<BranchName>> {
        self.refs().list_branches()
    }
}
