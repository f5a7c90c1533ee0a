use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeBuilder;
use tracing::debug;

impl Repository {
    /// Store the staged files as a tree hierarchy and return the root tree
    ///
    /// Identical index contents always produce the same root ID. An empty
    /// index produces the empty tree.
    pub fn build_tree(&mut self) -> anyhow::Result<ObjectId> {
        let _lock = self.lock_for_write()?;

        // Load the index file from the disk
        let index = self.load_index()?;

        let tree_oid = TreeBuilder::build(index.entries())?
            .resolve(&mut |object: &dyn Object| self.database().store(object))?;
        debug!(tree = %tree_oid, entries = index.len(), "wrote index tree");

        Ok(tree_oid)
    }
}
