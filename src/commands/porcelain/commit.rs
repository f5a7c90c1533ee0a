use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeBuilder;

impl Repository {
    /// Commit the staged files on the current branch as the configured author
    ///
    /// A refused commit stores nothing.
    pub fn commit(&mut self, message: &str) -> anyhow::Result<ObjectId> {
        let _lock = self.lock_for_write()?;

        // Load the index file from the disk
        let index = self.load_index()?;

        let tree = TreeBuilder::build(index.entries())?;
        let tree_oid = tree
            .clone()
            .resolve(&mut |object: &dyn Object| object.object_id())?;
        let parents = self.refs().read_head()?.into_iter().collect::<Vec<_>>();
        self.ensure_tree_changed(&tree_oid, &parents)?;

        tree.resolve(&mut |object: &dyn Object| self.database().store(object))?;
        let author = self.config().author()?;

        self.write_commit(&tree_oid, parents, message, author)
    }
}
