use crate::areas::repository::Repository;
use crate::artifacts::status::status_info::{HeadTree, Status, StatusInfo};

// Terminology:
// - staged: the index differs from HEAD
// - unstaged: the working directory differs from the index
// - untracked: files in neither the index nor HEAD
impl Repository {
    /// Read-only snapshot of staged, unstaged and untracked files
    pub fn status(&self) -> anyhow::Result<StatusInfo> {
        let index = self.load_index()?;
        let head_tree = self.head_tree()?;

        Status::new(self.workspace(), self.ignore()).initialize(&index, &head_tree)
    }

    /// Every file of the current tip's tree, empty while unborn
    pub(crate) fn head_tree(&self) -> anyhow::Result<HeadTree> {
        let tree_oid = match self.refs().read_head()? {
            Some(head) => Some(self.database().load_commit(&head)?.tree_oid().clone()),
            None => None,
        };

        self.database().flatten_tree(tree_oid.as_ref())
    }
}
