use crate::artifacts::objects::object_id::ObjectId;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Both sides edited the same lines differently
    Content,
    /// One side changed the file, the other deleted it
    ModifyDelete,
    /// A file on one side stands where the other side has a directory
    FileDirectory,
    /// Both sides changed the file mode differently
    Mode,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ConflictKind::Content => "content",
            ConflictKind::ModifyDelete => "modify/delete",
            ConflictKind::FileDirectory => "file/directory",
            ConflictKind::Mode => "mode",
        };
        write!(f, "{kind}")
    }
}

/// A path automatic resolution gave up on, with what each version held there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub path: PathBuf,
    pub kind: ConflictKind,
    pub base: Option<ObjectId>,
    pub ours: Option<ObjectId>,
    pub theirs: Option<ObjectId>,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict in {}", self.kind, self.path.display())
    }
}

/// What a conflicted path holds in the merged tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStyle {
    /// Leave conflicted paths out
    #[default]
    Omit,
    /// Conflict-marker content for files, ours' entry for structural conflicts
    Markers,
}
