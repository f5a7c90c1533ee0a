use crate::areas::workspace::WorkingDirectory;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use derive_new::new;

#[derive(new)]
pub struct Inspector<'w> {
    workspace: &'w dyn WorkingDirectory,
}

impl<'w> Inspector<'w> {
    fn is_content_changed(&self, index_entry: &IndexEntry) -> anyhow::Result<bool> {
        let blob = Blob::new(self.workspace.read_file(&index_entry.name)?);
        let mode = self.workspace.file_mode(&index_entry.name)?;

        Ok(!index_entry.same_content(&blob.object_id()?, mode))
    }

    pub fn check_index_against_workspace(
        &self,
        index_entry: &IndexEntry,
    ) -> anyhow::Result<WorkspaceChangeType> {
        if !self.workspace.exists(&index_entry.name) {
            Ok(WorkspaceChangeType::Deleted)
        } else if self.is_content_changed(index_entry)? {
            Ok(WorkspaceChangeType::Modified)
        } else {
            Ok(WorkspaceChangeType::None)
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
    ) -> IndexChangeType {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.entry_mode()
                    || head_entry.oid != index_entry.oid =>
            {
                IndexChangeType::Modified
            }
            (Some(_), None) => IndexChangeType::Added,
            (None, Some(_)) => IndexChangeType::Deleted,
            _ => IndexChangeType::None,
        }
    }
}
