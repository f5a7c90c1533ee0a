//! Three-way merge of trees
//!
//! Every name in the union of the three trees is resolved on its own; an
//! absent entry counts as deleted. When only one side changed a name its
//! version wins. When both changed it differently, files are merged line by
//! line, directories recursively, and everything else is a conflict.
//!
//! The merged tree stays in memory as a [`TreeBuilder`] until
//! [`MergeResult::write`] is called, so a merge that is abandoned because of
//! conflicts leaves the object store untouched.

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::merge::conflict::{ConflictKind, ConflictRecord, ConflictStyle};
use crate::artifacts::merge::line_merge::{LineMerge, merge_lines};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{PendingEntry, Tree, TreeBuilder};
use crate::artifacts::status::status_info::HeadTree;
use bytes::Bytes;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    tree: TreeBuilder,
    conflicts: Vec<ConflictRecord>,
}

impl MergeResult {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Sorted by path
    pub fn conflicts(&self) -> &[ConflictRecord] {
        &self.conflicts
    }

    pub fn into_conflicts(self) -> Vec<ConflictRecord> {
        self.conflicts
    }

    pub fn tree(&self) -> &TreeBuilder {
        &self.tree
    }

    /// ID the merged tree will have once written
    pub fn tree_id(&self) -> anyhow::Result<ObjectId> {
        self.tree
            .clone()
            .resolve(&mut |object: &dyn Object| object.object_id())
    }

    /// Every file of the merged tree keyed by path, nothing stored
    pub fn files(&self, database: &Database) -> anyhow::Result<HeadTree> {
        let mut files = HeadTree::new();
        collect_files(&self.tree, Path::new(""), database, &mut files)?;

        Ok(files)
    }

    /// Store the merged tree and every new blob and subtree it needs
    pub fn write(self, database: &Database) -> anyhow::Result<ObjectId> {
        self.tree
            .resolve(&mut |object: &dyn Object| database.store(object))
    }
}

fn collect_files(
    tree: &TreeBuilder,
    prefix: &Path,
    database: &Database,
    files: &mut HeadTree,
) -> anyhow::Result<()> {
    for (name, entry) in tree.entries() {
        let path = prefix.join(name);
        match entry {
            PendingEntry::Stored(stored) if stored.is_tree() => {
                for (file, entry) in database.flatten_tree(Some(&stored.oid))? {
                    files.insert(path.join(file), entry);
                }
            }
            PendingEntry::Stored(stored) => {
                files.insert(path, stored.clone());
            }
            PendingEntry::Blob { content, mode } => {
                let oid = Blob::new(content.clone()).object_id()?;
                files.insert(path, DatabaseEntry::new(oid, *mode));
            }
            PendingEntry::Directory(builder) => collect_files(builder, &path, database, files)?,
        }
    }

    Ok(())
}

/// Merged content of a file both sides changed
enum MergedContent {
    Existing(ObjectId),
    Merged(LineMerge),
}

#[derive(Debug)]
pub struct TreeMerge<'d> {
    database: &'d Database,
    style: ConflictStyle,
}

impl<'d> TreeMerge<'d> {
    pub fn new(database: &'d Database, style: ConflictStyle) -> Self {
        TreeMerge { database, style }
    }

    pub fn merge(
        &self,
        base: &ObjectId,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> anyhow::Result<MergeResult> {
        let base_tree = self.database.load_tree(base)?;
        let ours_tree = self.database.load_tree(ours)?;
        let theirs_tree = self.database.load_tree(theirs)?;

        let mut conflicts = Vec::new();
        let tree = self.merge_trees(
            &base_tree,
            &ours_tree,
            &theirs_tree,
            Path::new(""),
            &mut conflicts,
        )?;
        // plain byte order of the path text, so `a.txt` comes before `a/x.txt`
        conflicts.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));

        debug!(
            conflicts = conflicts.len(),
            "merged trees {} and {} over {}",
            ours.to_short_oid(),
            theirs.to_short_oid(),
            base.to_short_oid()
        );

        Ok(MergeResult { tree, conflicts })
    }

    fn merge_trees(
        &self,
        base: &Tree,
        ours: &Tree,
        theirs: &Tree,
        prefix: &Path,
        conflicts: &mut Vec<ConflictRecord>,
    ) -> anyhow::Result<TreeBuilder> {
        let names = base
            .entries()
            .chain(ours.entries())
            .chain(theirs.entries())
            .map(|(name, _)| name)
            .collect::<BTreeSet<_>>();
        let mut builder = TreeBuilder::default();

        for name in names {
            let path = prefix.join(name);
            let base_entry = base.get(name);
            let ours_entry = ours.get(name);
            let theirs_entry = theirs.get(name);

            let unchanged_side_wins = if ours_entry == theirs_entry || theirs_entry == base_entry {
                Some(ours_entry)
            } else if ours_entry == base_entry {
                Some(theirs_entry)
            } else {
                None
            };
            if let Some(winner) = unchanged_side_wins {
                if let Some(entry) = winner {
                    builder.insert(name.as_str(), PendingEntry::Stored(entry.clone()));
                }
                continue;
            }

            let resolved = match (ours_entry, theirs_entry) {
                (Some(o), Some(t)) if o.is_tree() && t.is_tree() => {
                    let base_tree = match base_entry {
                        Some(b) if b.is_tree() => self.database.load_tree(&b.oid)?,
                        _ => Tree::default(),
                    };
                    let subtree = self.merge_trees(
                        &base_tree,
                        &self.database.load_tree(&o.oid)?,
                        &self.database.load_tree(&t.oid)?,
                        &path,
                        conflicts,
                    )?;
                    Some(PendingEntry::Directory(subtree))
                }
                (Some(o), Some(t)) if !o.is_tree() && !t.is_tree() => {
                    self.merge_files(&path, base_entry, o, t, conflicts)?
                }
                (Some(_), None) | (None, Some(_)) => {
                    self.merge_deletion(&path, base_entry, ours_entry, theirs_entry, conflicts)?
                }
                _ => self.structural_conflict(
                    &path,
                    ConflictKind::FileDirectory,
                    base_entry,
                    ours_entry,
                    theirs_entry,
                    conflicts,
                ),
            };

            if let Some(entry) = resolved {
                builder.insert(name.as_str(), entry);
            }
        }

        Ok(builder)
    }

    /// One side deleted what the other side changed
    fn merge_deletion(
        &self,
        path: &Path,
        base: Option<&DatabaseEntry>,
        ours: Option<&DatabaseEntry>,
        theirs: Option<&DatabaseEntry>,
        conflicts: &mut Vec<ConflictRecord>,
    ) -> anyhow::Result<Option<PendingEntry>> {
        let Some(present) = ours.or(theirs) else {
            return Ok(None);
        };

        match base {
            Some(base) if base.is_tree() && present.is_tree() => {
                let present_tree = self.database.load_tree(&present.oid)?;
                let (ours_tree, theirs_tree) = if ours.is_some() {
                    (present_tree, Tree::default())
                } else {
                    (Tree::default(), present_tree)
                };
                let subtree = self.merge_trees(
                    &self.database.load_tree(&base.oid)?,
                    &ours_tree,
                    &theirs_tree,
                    path,
                    conflicts,
                )?;

                Ok(Some(PendingEntry::Directory(subtree)))
            }
            Some(base) if !base.is_tree() && !present.is_tree() => Ok(self.structural_conflict(
                path,
                ConflictKind::ModifyDelete,
                Some(base),
                ours,
                theirs,
                conflicts,
            )),
            _ => Ok(self.structural_conflict(
                path,
                ConflictKind::FileDirectory,
                base,
                ours,
                theirs,
                conflicts,
            )),
        }
    }

    /// Both sides changed a file differently
    fn merge_files(
        &self,
        path: &Path,
        base: Option<&DatabaseEntry>,
        ours: &DatabaseEntry,
        theirs: &DatabaseEntry,
        conflicts: &mut Vec<ConflictRecord>,
    ) -> anyhow::Result<Option<PendingEntry>> {
        let base = base.filter(|entry| !entry.is_tree());
        let mode = merge_modes(base.map(|entry| entry.mode), ours.mode, theirs.mode);

        let content = if ours.oid == theirs.oid || base.is_some_and(|b| b.oid == theirs.oid) {
            MergedContent::Existing(ours.oid.clone())
        } else if base.is_some_and(|b| b.oid == ours.oid) {
            MergedContent::Existing(theirs.oid.clone())
        } else {
            let base_content = match base {
                Some(entry) => self.database.load_blob(&entry.oid)?.into_content(),
                None => Bytes::new(),
            };
            MergedContent::Merged(merge_lines(
                &base_content,
                self.database.load_blob(&ours.oid)?.content(),
                self.database.load_blob(&theirs.oid)?.content(),
            ))
        };

        let kind = match (&content, mode) {
            (MergedContent::Merged(LineMerge::Conflicted(_)), _) => Some(ConflictKind::Content),
            (_, None) => Some(ConflictKind::Mode),
            _ => None,
        };
        let mode = mode.unwrap_or(ours.mode);
        let entry = match content {
            MergedContent::Existing(oid) => PendingEntry::Stored(DatabaseEntry::new(oid, mode)),
            MergedContent::Merged(merged) => PendingEntry::Blob {
                content: merged.into_content(),
                mode,
            },
        };

        match kind {
            Some(kind) => {
                self.record(path, kind, base, Some(ours), Some(theirs), conflicts);
                Ok((self.style == ConflictStyle::Markers).then_some(entry))
            }
            None => Ok(Some(entry)),
        }
    }

    /// Record a conflict whose placeholder is ours' entry
    fn structural_conflict(
        &self,
        path: &Path,
        kind: ConflictKind,
        base: Option<&DatabaseEntry>,
        ours: Option<&DatabaseEntry>,
        theirs: Option<&DatabaseEntry>,
        conflicts: &mut Vec<ConflictRecord>,
    ) -> Option<PendingEntry> {
        self.record(path, kind, base, ours, theirs, conflicts);

        match self.style {
            ConflictStyle::Markers => ours.map(|entry| PendingEntry::Stored(entry.clone())),
            ConflictStyle::Omit => None,
        }
    }

    fn record(
        &self,
        path: &Path,
        kind: ConflictKind,
        base: Option<&DatabaseEntry>,
        ours: Option<&DatabaseEntry>,
        theirs: Option<&DatabaseEntry>,
        conflicts: &mut Vec<ConflictRecord>,
    ) {
        trace!(%kind, "conflict at {}", path.display());

        conflicts.push(ConflictRecord {
            path: path.to_path_buf(),
            kind,
            base: base.map(|entry| entry.oid.clone()),
            ours: ours.map(|entry| entry.oid.clone()),
            theirs: theirs.map(|entry| entry.oid.clone()),
        });
    }
}

/// `None` when both sides changed the mode differently
fn merge_modes(base: Option<EntryMode>, ours: EntryMode, theirs: EntryMode) -> Option<EntryMode> {
    if ours == theirs || base == Some(theirs) {
        Some(ours)
    } else if base == Some(ours) {
        Some(theirs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::FileMode;
    use crate::artifacts::index::index_entry::IndexEntry;
    use crate::artifacts::objects::blob::Blob;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    struct Store {
        _dir: TempDir,
        database: Database,
    }

    #[fixture]
    fn store() -> Store {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        Store { _dir: dir, database }
    }

    impl Store {
        fn tree(&self, files: &[(&str, &str)]) -> ObjectId {
            let files = files
                .iter()
                .map(|(path, content)| (*path, *content, FileMode::Regular))
                .collect::<Vec<_>>();
            self.tree_with_modes(&files)
        }

        fn tree_with_modes(&self, files: &[(&str, &str, FileMode)]) -> ObjectId {
            let entries = files
                .iter()
                .map(|(path, content, mode)| {
                    let blob = Blob::new(Bytes::copy_from_slice(content.as_bytes()));
                    IndexEntry::new(PathBuf::from(path), self.database.store(&blob).unwrap(), *mode)
                })
                .collect::<Vec<_>>();

            TreeBuilder::build(entries.iter())
                .unwrap()
                .resolve(&mut |object: &dyn Object| self.database.store(object))
                .unwrap()
        }

        fn contents(&self, tree: &ObjectId) -> BTreeMap<String, String> {
            self.database
                .flatten_tree(Some(tree))
                .unwrap()
                .into_iter()
                .map(|(path, entry)| {
                    let blob = self.database.load_blob(&entry.oid).unwrap();
                    (
                        path.display().to_string(),
                        String::from_utf8(blob.content().to_vec()).unwrap(),
                    )
                })
                .collect()
        }

        fn merge(&self, base: &ObjectId, ours: &ObjectId, theirs: &ObjectId, style: ConflictStyle) -> MergeResult {
            TreeMerge::new(&self.database, style)
                .merge(base, ours, theirs)
                .unwrap()
        }
    }

    fn expected(files: &[(&str, &str)]) -> BTreeMap<String, String> {
        files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect()
    }

    fn paths(result: &MergeResult) -> Vec<(String, ConflictKind)> {
        result
            .conflicts()
            .iter()
            .map(|conflict| (conflict.path.display().to_string(), conflict.kind))
            .collect()
    }

    #[rstest]
    fn changes_on_different_paths_combine(store: Store) {
        let base = store.tree(&[("a.txt", "1\n"), ("b.txt", "x\n"), ("gone.txt", "bye\n")]);
        let ours = store.tree(&[("a.txt", "ours\n"), ("b.txt", "x\n")]);
        let theirs = store.tree(&[
            ("a.txt", "1\n"),
            ("b.txt", "x\n"),
            ("gone.txt", "bye\n"),
            ("dir/new.txt", "new\n"),
        ]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);
        assert!(result.is_clean());

        let merged = result.write(&store.database).unwrap();
        assert_eq!(
            store.contents(&merged),
            expected(&[("a.txt", "ours\n"), ("b.txt", "x\n"), ("dir/new.txt", "new\n")])
        );
    }

    #[rstest]
    fn same_file_edited_in_different_places_merges_lines(store: Store) {
        let base = store.tree(&[("f.txt", "1\n2\n3\n4\n")]);
        let ours = store.tree(&[("f.txt", "one\n2\n3\n4\n")]);
        let theirs = store.tree(&[("f.txt", "1\n2\n3\nfour\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);
        assert!(result.is_clean());

        let merged = result.write(&store.database).unwrap();
        assert_eq!(store.contents(&merged), expected(&[("f.txt", "one\n2\n3\nfour\n")]));
    }

    #[rstest]
    fn conflicts_are_ordered_by_path_text(store: Store) {
        let base = store.tree(&[("a.txt", "0\n"), ("a/x.txt", "0\n")]);
        let ours = store.tree(&[("a.txt", "1\n"), ("a/x.txt", "1\n")]);
        let theirs = store.tree(&[("a.txt", "2\n"), ("a/x.txt", "2\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);

        assert_eq!(
            paths(&result),
            vec![
                ("a.txt".to_string(), ConflictKind::Content),
                ("a/x.txt".to_string(), ConflictKind::Content),
            ]
        );
    }

    #[rstest]
    fn files_lists_the_merged_tree_without_storing_it(store: Store) {
        let base = store.tree(&[("f.txt", "1\n2\n3\n4\n"), ("lib/a.txt", "a\n")]);
        let ours = store.tree(&[("f.txt", "one\n2\n3\n4\n"), ("lib/a.txt", "a\n")]);
        let theirs = store.tree(&[("f.txt", "1\n2\n3\nfour\n"), ("lib/a.txt", "a\n"), ("new.txt", "n\n")]);
        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);

        let files = result.files(&store.database).unwrap();
        let merged_blob = files[&PathBuf::from("f.txt")].oid.clone();
        assert!(!store.database.exists(&merged_blob));

        let merged = result.write(&store.database).unwrap();
        assert_eq!(files, store.database.flatten_tree(Some(&merged)).unwrap());
    }

    #[rstest]
    fn content_conflict_is_omitted_by_default(store: Store) {
        let base = store.tree(&[("f.txt", "a\n"), ("keep.txt", "k\n")]);
        let ours = store.tree(&[("f.txt", "b\n"), ("keep.txt", "k\n")]);
        let theirs = store.tree(&[("f.txt", "c\n"), ("keep.txt", "k\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);

        assert_eq!(
            result.conflicts(),
            &[ConflictRecord {
                path: PathBuf::from("f.txt"),
                kind: ConflictKind::Content,
                base: Some(ObjectId::from_content(b"blob 2\0a\n")),
                ours: Some(ObjectId::from_content(b"blob 2\0b\n")),
                theirs: Some(ObjectId::from_content(b"blob 2\0c\n")),
            }]
        );
        let merged = result.write(&store.database).unwrap();
        assert_eq!(store.contents(&merged), expected(&[("keep.txt", "k\n")]));
    }

    #[rstest]
    fn content_conflict_gets_markers_on_request(store: Store) {
        let base = store.tree(&[("f.txt", "a\n")]);
        let ours = store.tree(&[("f.txt", "b\n")]);
        let theirs = store.tree(&[("f.txt", "c\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Markers);
        assert_eq!(paths(&result), vec![("f.txt".to_string(), ConflictKind::Content)]);

        let merged = result.write(&store.database).unwrap();
        assert_eq!(
            store.contents(&merged),
            expected(&[("f.txt", "<<<<<<< ours\nb\n=======\nc\n>>>>>>> theirs\n")])
        );
    }

    #[rstest]
    fn conflicted_merge_writes_nothing(store: Store) {
        let base = store.tree(&[("f.txt", "a\n")]);
        let ours = store.tree(&[("f.txt", "b\n")]);
        let theirs = store.tree(&[("f.txt", "c\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Markers);

        assert!(!result.is_clean());
        assert!(!store.database.exists(&result.tree_id().unwrap()));
    }

    #[rstest]
    fn modified_on_one_side_deleted_on_the_other(store: Store) {
        let base = store.tree(&[("f.txt", "a\n"), ("g.txt", "g\n")]);
        let ours = store.tree(&[("f.txt", "changed\n"), ("g.txt", "g\n")]);
        let theirs = store.tree(&[("g.txt", "g\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Markers);
        assert_eq!(paths(&result), vec![("f.txt".to_string(), ConflictKind::ModifyDelete)]);
        assert_eq!(result.conflicts()[0].theirs, None);

        let merged = result.write(&store.database).unwrap();
        assert_eq!(
            store.contents(&merged),
            expected(&[("f.txt", "changed\n"), ("g.txt", "g\n")])
        );
    }

    #[rstest]
    fn file_against_directory_always_conflicts(store: Store) {
        let base = store.tree(&[("other.txt", "o\n")]);
        let ours = store.tree(&[("other.txt", "o\n"), ("d", "file\n")]);
        let theirs = store.tree(&[("other.txt", "o\n"), ("d/inner.txt", "nested\n")]);

        let omitted = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);
        assert_eq!(paths(&omitted), vec![("d".to_string(), ConflictKind::FileDirectory)]);
        let merged = omitted.write(&store.database).unwrap();
        assert_eq!(store.contents(&merged), expected(&[("other.txt", "o\n")]));

        let marked = store.merge(&base, &ours, &theirs, ConflictStyle::Markers);
        let merged = marked.write(&store.database).unwrap();
        assert_eq!(
            store.contents(&merged),
            expected(&[("d", "file\n"), ("other.txt", "o\n")])
        );
    }

    #[rstest]
    fn deleted_directory_is_resolved_per_file(store: Store) {
        let base = store.tree(&[("dir/a.txt", "1\n"), ("dir/b.txt", "2\n"), ("top.txt", "t\n")]);
        let ours = store.tree(&[("top.txt", "t\n")]);
        let theirs = store.tree(&[("dir/a.txt", "1\n"), ("dir/b.txt", "changed\n"), ("top.txt", "t\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);

        assert_eq!(
            paths(&result),
            vec![("dir/b.txt".to_string(), ConflictKind::ModifyDelete)]
        );
        let merged = result.write(&store.database).unwrap();
        assert_eq!(store.contents(&merged), expected(&[("top.txt", "t\n")]));
    }

    #[rstest]
    fn nested_conflicts_are_sorted_by_path(store: Store) {
        let base = store.tree(&[("a/x.txt", "a\n"), ("b.txt", "a\n")]);
        let ours = store.tree(&[("a/x.txt", "b\n"), ("b.txt", "b\n")]);
        let theirs = store.tree(&[("a/x.txt", "c\n"), ("b.txt", "c\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);

        assert_eq!(
            paths(&result),
            vec![
                ("a/x.txt".to_string(), ConflictKind::Content),
                ("b.txt".to_string(), ConflictKind::Content),
            ]
        );
    }

    #[rstest]
    fn mode_change_merges_with_content_change(store: Store) {
        let base = store.tree_with_modes(&[("run.sh", "echo 1\n", FileMode::Regular)]);
        let ours = store.tree_with_modes(&[("run.sh", "echo 1\n", FileMode::Executable)]);
        let theirs = store.tree_with_modes(&[("run.sh", "echo 2\n", FileMode::Regular)]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);
        assert!(result.is_clean());

        let merged = result.write(&store.database).unwrap();
        let entry = store
            .database
            .find_entry(&merged, Path::new("run.sh"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.mode, EntryMode::File(FileMode::Executable));
        assert_eq!(entry.oid, ObjectId::from_content(b"blob 7\0echo 2\n"));
    }

    #[rstest]
    fn added_on_both_sides_with_different_modes_conflicts(store: Store) {
        let base = store.tree(&[("other.txt", "o\n")]);
        let ours = store.tree_with_modes(&[
            ("other.txt", "o\n", FileMode::Regular),
            ("tool", "x\n", FileMode::Executable),
        ]);
        let theirs = store.tree_with_modes(&[
            ("other.txt", "o\n", FileMode::Regular),
            ("tool", "x\n", FileMode::Regular),
        ]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);

        assert_eq!(paths(&result), vec![("tool".to_string(), ConflictKind::Mode)]);
    }

    #[rstest]
    fn both_sides_deleting_is_clean(store: Store) {
        let base = store.tree(&[("f.txt", "a\n"), ("g.txt", "g\n")]);
        let ours = store.tree(&[("g.txt", "g\n")]);
        let theirs = store.tree(&[("g.txt", "g\n")]);

        let result = store.merge(&base, &ours, &theirs, ConflictStyle::Omit);

        assert!(result.is_clean());
        assert_eq!(result.tree_id().unwrap(), ours);
    }
}
