use crate::areas::repository::Repository;
use crate::artifacts::merge::tree_merge::{MergeResult, TreeMerge};
use crate::artifacts::objects::object_id::ObjectId;

impl Repository {
    /// Three-way merge of trees, using the configured conflict style
    ///
    /// Nothing is stored; call [`MergeResult::write`] to persist a result.
    pub fn merge_trees(
        &self,
        base: &ObjectId,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> anyhow::Result<MergeResult> {
        TreeMerge::new(self.database(), self.config().conflict_style()).merge(base, ours, theirs)
    }
}
