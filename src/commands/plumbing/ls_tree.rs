use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use std::path::PathBuf;

impl Repository {
    /// Entries of a tree, or of the tree of a commit, sorted by path
    ///
    /// Without `recursive` only the top level is listed, subtrees included.
    /// With it, every file below the tree is listed by its full path and
    /// subtrees themselves are left out.
    pub fn ls_tree(
        &self,
        oid: &ObjectId,
        recursive: bool,
    ) -> anyhow::Result<Vec<(PathBuf, DatabaseEntry)>> {
        let tree_oid = match self.database().get_object_type(oid)? {
            ObjectType::Commit => self.database().load_commit(oid)?.tree_oid().clone(),
            _ => oid.clone(),
        };

        if recursive {
            return Ok(self
                .database()
                .flatten_tree(Some(&tree_oid))?
                .into_iter()
                .collect());
        }

        Ok(self
            .database()
            .load_tree(&tree_oid)?
            .into_entries()
            .map(|(name, entry)| (PathBuf::from(name), entry))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::areas::config::Config;
    use crate::areas::repository::Repository;
    use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
    use crate::artifacts::objects::commit::Author;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn lists_top_level_or_every_file() {
        let dir = TempDir::new().unwrap();
        let mut repository = Repository::init(dir.path(), Config::default()).unwrap();
        dir.child("a.txt").write_str("a\n").unwrap();
        dir.child("src/lib.rs").write_str("lib\n").unwrap();
        repository.stage(".").unwrap();
        let tree = repository.build_tree().unwrap();
        let author = Author::new("Ann".to_string(), "ann@example.com".to_string());
        let commit = repository
            .commit_tree(&tree, "first", author)
            .unwrap();

        let top = repository.ls_tree(&commit, false).unwrap();
        assert_eq!(
            top.iter()
                .map(|(path, entry)| (path.clone(), entry.mode))
                .collect::<Vec<_>>(),
            vec![
                (PathBuf::from("a.txt"), EntryMode::File(FileMode::Regular)),
                (PathBuf::from("src"), EntryMode::Directory),
            ]
        );

        let all = repository.ls_tree(&tree, true).unwrap();
        assert_eq!(
            all.into_iter().map(|(path, _)| path).collect::<Vec<_>>(),
            vec![PathBuf::from("a.txt"), PathBuf::from("src/lib.rs")]
        );
    }
}
