//! Best common ancestor search
//!
//! A best common ancestor of commits X and Y is any common ancestor of X and Y
//! that is not an ancestor of any other common ancestor.
//!
//! ## Algorithm
//!
//! ### Phase 1: lock-step expansion
//!
//! Both ancestor sets grow breadth-first, one generation per round. Every
//! commit carries the sides it was reached from. A commit reached from both
//! sides becomes a candidate, remembered with the round it was found in, and
//! everything behind it is marked STALE: a stale commit is an ancestor of a
//! candidate and can never be a best one. The walk stops once only stale
//! commits are left to expand.
//!
//! ### Phase 2: redundancy filter
//!
//! Candidates found before the walk could mark them stale are checked
//! pairwise; a candidate that is an ancestor of another one is dropped.
//!
//! Among the survivors the earliest round wins, then the most recent
//! timestamp, then the greatest hash, so the answer does not depend on which
//! commit was passed first.

use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, trace};

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b00;
        const VISITED_FROM_SOURCE = 0b01;
        const VISITED_FROM_TARGET = 0b10;
        const VISITED_FROM_BOTH = Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        const STALE = 0b100;
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

#[derive(Debug)]
struct Candidate {
    round: usize,
    commit: SlimCommit,
}

/// Finds merge bases over any commit storage
///
/// `commit_loader` returns the parents and timestamp of a commit; wrap it
/// around a [`CommitCache`](crate::areas::database::CommitCache) to avoid
/// decoding the same commit twice.
#[derive(Debug, Clone)]
pub struct MergeBaseFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    commit_loader: CommitLoaderFn,
}

impl<CommitLoaderFn> MergeBaseFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    pub fn new(commit_loader: CommitLoaderFn) -> Self {
        Self { commit_loader }
    }

    /// The best common ancestor of `source` and `target`, `None` for
    /// disconnected histories
    pub fn find(&self, source: &ObjectId, target: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
        if source == target {
            return Ok(Some(source.clone()));
        }

        let candidates = self.find_candidates(source, target)?;
        debug!(
            candidates = candidates.len(),
            "common ancestors of {} and {}",
            source.to_short_oid(),
            target.to_short_oid()
        );

        let mut redundant = HashSet::new();
        for (i, candidate) in candidates.iter().enumerate() {
            for other in candidates.iter().skip(i + 1) {
                if self.is_ancestor(&candidate.commit.oid, &other.commit.oid)? {
                    redundant.insert(candidate.commit.oid.clone());
                } else if self.is_ancestor(&other.commit.oid, &candidate.commit.oid)? {
                    redundant.insert(other.commit.oid.clone());
                }
            }
        }

        let best = candidates
            .into_iter()
            .filter(|candidate| !redundant.contains(&candidate.commit.oid))
            .min_by(|a, b| {
                a.round
                    .cmp(&b.round)
                    .then_with(|| b.commit.cmp(&a.commit))
            })
            .map(|candidate| candidate.commit.oid);

        Ok(best)
    }

    /// True when `ancestor` is reachable from `descendant` (or is it)
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        let mut queue = VecDeque::from([descendant.clone()]);
        let mut seen = HashSet::from([descendant.clone()]);

        while let Some(oid) = queue.pop_front() {
            if &oid == ancestor {
                return Ok(true);
            }
            for parent in (self.commit_loader)(&oid)?.parents {
                if seen.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(false)
    }

    fn find_candidates(&self, source: &ObjectId, target: &ObjectId) -> anyhow::Result<Vec<Candidate>> {
        let mut states = HashMap::<ObjectId, VisitState>::from([
            (source.clone(), VisitState::VISITED_FROM_SOURCE),
            (target.clone(), VisitState::VISITED_FROM_TARGET),
        ]);
        let mut candidates = Vec::new();
        let mut frontier = vec![source.clone(), target.clone()];
        let mut round = 0;

        while frontier.iter().any(|oid| {
            !states
                .get(oid)
                .copied()
                .unwrap_or(VisitState::NONE)
                .contains(VisitState::STALE)
        }) {
            round += 1;
            let mut next = Vec::new();
            let mut queued = HashSet::new();

            for oid in frontier {
                let current_state = states.get(&oid).copied().unwrap_or(VisitState::NONE);
                let mut inherited = current_state & (VisitState::VISITED_FROM_BOTH | VisitState::STALE);
                if current_state.contains(VisitState::RESULT) {
                    inherited |= VisitState::STALE;
                }
                trace!(round, state = ?current_state, "expanding {}", oid.to_short_oid());

                for parent_id in (self.commit_loader)(&oid)?.parents {
                    let parent_state = states.get(&parent_id).copied().unwrap_or(VisitState::NONE);
                    let mut new_state = parent_state | inherited;
                    if new_state == parent_state {
                        continue;
                    }

                    if new_state.contains(VisitState::VISITED_FROM_BOTH)
                        && !new_state.intersects(VisitState::STALE | VisitState::RESULT)
                    {
                        new_state |= VisitState::RESULT;
                        candidates.push(Candidate {
                            round,
                            commit: (self.commit_loader)(&parent_id)?,
                        });
                    }

                    states.insert(parent_id.clone(), new_state);
                    if queued.insert(parent_id.clone()) {
                        next.push(parent_id);
                    }
                }
            }

            frontier = next;
        }

        Ok(candidates
            .into_iter()
            .filter(|candidate| {
                !states
                    .get(&candidate.commit.oid)
                    .is_some_and(|state| state.contains(VisitState::STALE))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::*;

    type CommitData = (Vec<ObjectId>, DateTime<FixedOffset>);

    /// In-memory commit store for testing
    #[derive(Debug, Clone, Default)]
    struct InMemoryCommitStore {
        commits: HashMap<ObjectId, CommitData>,
    }

    impl InMemoryCommitStore {
        fn new() -> Self {
            Self::default()
        }

        /// Commits get timestamps one hour apart in insertion order
        fn add_commit(&mut self, commit_id: &ObjectId, parents: &[&ObjectId]) {
            let offset = self.commits.len() as i64 * 3600;
            let timestamp = FixedOffset::east_opt(0)
                .unwrap()
                .timestamp_opt(1640995200 + offset, 0)
                .unwrap();
            self.add_commit_with_timestamp(commit_id, parents, timestamp);
        }

        fn add_commit_with_timestamp(
            &mut self,
            commit_id: &ObjectId,
            parents: &[&ObjectId],
            timestamp: DateTime<FixedOffset>,
        ) {
            let parents = parents.iter().map(|oid| (*oid).clone()).collect();
            self.commits.insert(commit_id.clone(), (parents, timestamp));
        }

        fn get_slim_commit(&self, commit_id: &ObjectId) -> anyhow::Result<SlimCommit> {
            let (parents, timestamp) = self
                .commits
                .get(commit_id)
                .ok_or_else(|| anyhow::anyhow!("commit {commit_id} not in store"))?;

            Ok(SlimCommit {
                oid: commit_id.clone(),
                parents: parents.clone(),
                timestamp: *timestamp,
            })
        }

        fn merge_base(&self, source: &ObjectId, target: &ObjectId) -> Option<ObjectId> {
            MergeBaseFinder::new(|oid| self.get_slim_commit(oid))
                .find(source, target)
                .unwrap()
        }
    }

    /// Deterministic 64-character hex ID spelling out `id`
    fn create_oid(id: &str) -> ObjectId {
        let mut hex_string = id
            .as_bytes()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();
        while hex_string.len() < 64 {
            hex_string.push('0');
        }
        hex_string.truncate(64);

        ObjectId::try_parse(hex_string).unwrap()
    }

    /// A <- B <- C <- D
    #[fixture]
    fn linear_history() -> InMemoryCommitStore {
        let mut store = InMemoryCommitStore::new();
        let (a, b, c, d) = (create_oid("a"), create_oid("b"), create_oid("c"), create_oid("d"));
        store.add_commit(&a, &[]);
        store.add_commit(&b, &[&a]);
        store.add_commit(&c, &[&b]);
        store.add_commit(&d, &[&c]);
        store
    }

    /// A <- B <- D, A <- C <- E, D and E merged into F
    #[fixture]
    fn simple_merge() -> InMemoryCommitStore {
        let mut store = InMemoryCommitStore::new();
        let [a, b, c, d, e, f] = ["a", "b", "c", "d", "e", "f"].map(create_oid);
        store.add_commit(&a, &[]);
        store.add_commit(&b, &[&a]);
        store.add_commit(&c, &[&a]);
        store.add_commit(&d, &[&b]);
        store.add_commit(&e, &[&c]);
        store.add_commit(&f, &[&d, &e]);
        store
    }

    /// ```text
    ///     A
    ///    / \
    ///   B   C
    ///   |\ /|
    ///   | X |
    ///   |/ \|
    ///   D   E
    ///   |   |
    ///   F   G
    /// ```
    #[fixture]
    fn criss_cross_merge() -> InMemoryCommitStore {
        let mut store = InMemoryCommitStore::new();
        let [a, b, c, d, e, f, g] = ["a", "b", "c", "d", "e", "f", "g"].map(create_oid);
        store.add_commit(&a, &[]);
        store.add_commit(&b, &[&a]);
        store.add_commit(&c, &[&a]);
        store.add_commit(&d, &[&b, &c]);
        store.add_commit(&e, &[&c, &b]);
        store.add_commit(&f, &[&d]);
        store.add_commit(&g, &[&e]);
        store
    }

    #[rstest]
    #[case("b", "d", "b")]
    #[case("d", "b", "b")]
    #[case("c", "d", "c")]
    #[case("a", "d", "a")]
    fn linear_history_base_is_the_older_commit(
        linear_history: InMemoryCommitStore,
        #[case] source: &str,
        #[case] target: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(
            linear_history.merge_base(&create_oid(source), &create_oid(target)),
            Some(create_oid(expected))
        );
    }

    #[rstest]
    fn commit_is_its_own_merge_base(linear_history: InMemoryCommitStore) {
        let c = create_oid("c");
        assert_eq!(linear_history.merge_base(&c, &c), Some(c));
    }

    #[rstest]
    fn diverged_branches_meet_at_the_fork(simple_merge: InMemoryCommitStore) {
        assert_eq!(
            simple_merge.merge_base(&create_oid("d"), &create_oid("e")),
            Some(create_oid("a"))
        );
        assert_eq!(
            simple_merge.merge_base(&create_oid("b"), &create_oid("e")),
            Some(create_oid("a"))
        );
    }

    #[rstest]
    fn merged_branch_tip_is_the_base(simple_merge: InMemoryCommitStore) {
        assert_eq!(
            simple_merge.merge_base(&create_oid("f"), &create_oid("e")),
            Some(create_oid("e"))
        );
        assert_eq!(
            simple_merge.merge_base(&create_oid("d"), &create_oid("f")),
            Some(create_oid("d"))
        );
    }

    #[rstest]
    fn criss_cross_prefers_the_most_recent_best_ancestor(criss_cross_merge: InMemoryCommitStore) {
        let f = create_oid("f");
        let g = create_oid("g");

        // B and C are both best common ancestors found in the same round; C is newer
        assert_eq!(criss_cross_merge.merge_base(&f, &g), Some(create_oid("c")));
        assert_eq!(criss_cross_merge.merge_base(&g, &f), Some(create_oid("c")));
    }

    #[rstest]
    fn same_timestamp_falls_back_to_the_greater_hash() {
        let mut store = InMemoryCommitStore::new();
        let [root, x, y, left, right] = ["root", "x", "y", "left", "right"].map(create_oid);
        let at = FixedOffset::east_opt(0).unwrap().timestamp_opt(1_700_000_000, 0).unwrap();
        store.add_commit_with_timestamp(&root, &[], at);
        store.add_commit_with_timestamp(&x, &[&root], at);
        store.add_commit_with_timestamp(&y, &[&root], at);
        store.add_commit_with_timestamp(&left, &[&x, &y], at);
        store.add_commit_with_timestamp(&right, &[&y, &x], at);

        let expected = std::cmp::max(x, y);
        assert_eq!(store.merge_base(&left, &right), Some(expected));
    }

    #[rstest]
    fn ancestor_of_another_common_ancestor_is_discarded() {
        // A <- B <- C <- E, and a long detour A <- D1 <- D2 <- D3 <- F with B merged into F
        let mut store = InMemoryCommitStore::new();
        let [a, b, c, d1, d2, d3, e, f] = ["a", "b", "c", "d1", "d2", "d3", "e", "f"].map(create_oid);
        store.add_commit(&a, &[]);
        store.add_commit(&b, &[&a]);
        store.add_commit(&c, &[&b]);
        store.add_commit(&d1, &[&a]);
        store.add_commit(&d2, &[&d1]);
        store.add_commit(&d3, &[&d2]);
        store.add_commit(&e, &[&c]);
        store.add_commit(&f, &[&d3, &b]);

        assert_eq!(store.merge_base(&e, &f), Some(b));
    }

    #[rstest]
    fn disconnected_histories_have_no_base() {
        let mut store = InMemoryCommitStore::new();
        let [a, b, x, y] = ["a", "b", "x", "y"].map(create_oid);
        store.add_commit(&a, &[]);
        store.add_commit(&b, &[&a]);
        store.add_commit(&x, &[]);
        store.add_commit(&y, &[&x]);

        assert_eq!(store.merge_base(&b, &y), None);
    }

    #[rstest]
    fn missing_commit_is_an_error() {
        let store = InMemoryCommitStore::new();
        let finder = MergeBaseFinder::new(|oid| store.get_slim_commit(oid));

        assert!(finder.find(&create_oid("a"), &create_oid("b")).is_err());
    }

    #[rstest]
    fn ancestry_follows_every_parent(simple_merge: InMemoryCommitStore) {
        let finder = MergeBaseFinder::new(|oid| simple_merge.get_slim_commit(oid));

        assert!(finder.is_ancestor(&create_oid("c"), &create_oid("f")).unwrap());
        assert!(finder.is_ancestor(&create_oid("f"), &create_oid("f")).unwrap());
        assert!(!finder.is_ancestor(&create_oid("d"), &create_oid("e")).unwrap());
    }

    /// Random DAG: commit `i` picks its parents among commits `0..i`
    fn random_history() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (2usize..12).prop_flat_map(|size| {
            (0..size)
                .map(|i| {
                    if i == 0 {
                        Just(Vec::new()).boxed()
                    } else {
                        proptest::collection::vec(0..i, 0..=2).boxed()
                    }
                })
                .collect::<Vec<_>>()
        })
    }

    proptest! {
        #[test]
        fn merge_base_is_symmetric_and_common(
            history in random_history(),
            picks in (0usize..64, 0usize..64),
        ) {
            let mut store = InMemoryCommitStore::new();
            let oids = (0..history.len()).map(|i| create_oid(&format!("c{i}"))).collect::<Vec<_>>();
            for (i, parents) in history.iter().enumerate() {
                let parents = parents.iter().map(|p| &oids[*p]).collect::<Vec<_>>();
                store.add_commit(&oids[i], &parents);
            }

            let a = &oids[picks.0 % oids.len()];
            let b = &oids[picks.1 % oids.len()];
            let forward = store.merge_base(a, b);
            prop_assert_eq!(&forward, &store.merge_base(b, a));

            if let Some(base) = forward {
                let finder = MergeBaseFinder::new(|oid| store.get_slim_commit(oid));
                prop_assert!(finder.is_ancestor(&base, a).unwrap());
                prop_assert!(finder.is_ancestor(&base, b).unwrap());
            }
        }
    }
}
