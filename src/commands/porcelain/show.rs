use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use bytes::Bytes;
use std::path::Path;

impl Repository {
    /// Contents of the file at `path` as of `commit`
    pub fn read_file_at(&self, commit: &ObjectId, path: impl AsRef<Path>) -> anyhow::Result<Bytes> {
        let path = self.relative_path(path.as_ref())?;
        let commit = self.database().load_commit(commit)?;

        match self.database().find_entry(commit.tree_oid(), &path)? {
            Some(entry) if !entry.is_tree() => {
                Ok(self.database().load_blob(&entry.oid)?.into_content())
            }
            _ => Err(RepositoryError::PathNotFound(path).into()),
        }
    }
}
