use crate::areas::database::CommitCache;
use crate::areas::repository::Repository;
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;

impl Repository {
    /// Best common ancestor of two commits
    pub fn merge_base(&self, ours: &ObjectId, theirs: &ObjectId) -> anyhow::Result<ObjectId> {
        let cache = CommitCache::new();
        let finder =
            MergeBaseFinder::new(|oid: &ObjectId| cache.get_or_load_slim_commit(self.database(), oid));

        finder
            .find(ours, theirs)?
            .ok_or_else(|| {
                RepositoryError::NoCommonAncestor {
                    ours: ours.clone(),
                    theirs: theirs.clone(),
                }
                .into()
            })
    }

    /// True when `ancestor` is reachable from `descendant`, itself included
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        let cache = CommitCache::new();
        let finder =
            MergeBaseFinder::new(|oid: &ObjectId| cache.get_or_load_slim_commit(self.database(), oid));

        finder.is_ancestor(ancestor, descendant)
    }
}
