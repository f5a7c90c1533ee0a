use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use derive_new::new;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// Follow first parents only
    #[default]
    FirstParent,
    /// Every reachable commit once, newest timestamp first, ties by hash
    Full,
}

/// History starting at a commit
///
/// Walking is lazy: commits are decoded as the iterator reaches them, so
/// consumers can stop early. Every call to [`RevList::iter`] starts over.
#[derive(Debug, Clone, new)]
pub struct RevList<'d> {
    database: &'d Database,
    start: Option<ObjectId>,
    mode: LogMode,
}

impl<'d> RevList<'d> {
    pub fn iter(&self) -> RevListIter<'d> {
        RevListIter {
            database: self.database,
            mode: self.mode,
            queue: BinaryHeap::new(),
            unloaded: self.start.iter().cloned().collect(),
            seen: self.start.iter().cloned().collect(),
            failed: false,
        }
    }
}

impl<'d> IntoIterator for &RevList<'d> {
    type Item = anyhow::Result<(ObjectId, Commit)>;
    type IntoIter = RevListIter<'d>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug)]
struct QueuedCommit {
    oid: ObjectId,
    commit: Commit,
}

impl PartialEq for QueuedCommit {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid
    }
}

impl Eq for QueuedCommit {}

impl PartialOrd for QueuedCommit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCommit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.commit
            .timestamp()
            .cmp(&other.commit.timestamp())
            .then_with(|| self.oid.cmp(&other.oid))
    }
}

#[derive(Debug)]
pub struct RevListIter<'d> {
    database: &'d Database,
    mode: LogMode,
    queue: BinaryHeap<QueuedCommit>,
    /// Discovered but not decoded yet
    unloaded: Vec<ObjectId>,
    seen: HashSet<ObjectId>,
    failed: bool,
}

impl Iterator for RevListIter<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while let Some(oid) = self.unloaded.pop() {
            match self.database.load_commit(&oid) {
                Ok(commit) => self.queue.push(QueuedCommit { oid, commit }),
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }

        let QueuedCommit { oid, commit } = self.queue.pop()?;
        let parents = match self.mode {
            LogMode::FirstParent => commit.parent().into_iter().collect::<Vec<_>>(),
            LogMode::Full => commit.parents().iter().collect(),
        };
        for parent in parents {
            if self.seen.insert(parent.clone()) {
                self.unloaded.push(parent.clone());
            }
        }

        trace!("log yields {}", oid.to_short_oid());
        Some(Ok((oid, commit)))
    }
}
