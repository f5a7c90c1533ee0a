use crate::artifacts::diff::myers::{DiffAlgorithm, Edit, MyersDiff};

/// A replaced range of the old sequence
///
/// `start..end` indexes the old sequence (empty for a pure insertion) and
/// `lines` is what the new sequence has there instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk<T> {
    pub start: usize,
    pub end: usize,
    pub lines: Vec<T>,
}

impl<T> Hunk<T> {
    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }
}

/// Changed ranges of `old` in ascending order, each separated from the next
/// by at least one unchanged item
pub fn hunks<T: Eq + Clone>(old: &[T], new: &[T]) -> Vec<Hunk<T>> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk<T>> = None;
    let mut position = 0;

    for edit in MyersDiff::new(old, new).diff() {
        match edit {
            Edit::Equal { .. } => {
                hunks.extend(current.take());
                position += 1;
            }
            Edit::Delete { .. } => {
                let hunk = current.get_or_insert_with(|| Hunk {
                    start: position,
                    end: position,
                    lines: Vec::new(),
                });
                position += 1;
                hunk.end = position;
            }
            Edit::Insert { value } => {
                current
                    .get_or_insert_with(|| Hunk {
                        start: position,
                        end: position,
                        lines: Vec::new(),
                    })
                    .lines
                    .push(value);
            }
        }
    }
    hunks.extend(current);

    hunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn replacement_insertion_and_deletion() {
        let old = vec!["a", "b", "c", "d", "e"];
        let new = vec!["a", "B", "c", "x", "d"];

        assert_eq!(
            hunks(&old, &new),
            vec![
                Hunk { start: 1, end: 2, lines: vec!["B"] },
                Hunk { start: 3, end: 3, lines: vec!["x"] },
                Hunk { start: 4, end: 5, lines: vec![] },
            ]
        );
    }

    #[rstest]
    fn identical_sequences_have_no_hunks() {
        let lines = vec!["same", "lines"];
        assert!(hunks(&lines, &lines).is_empty());
    }

    #[rstest]
    fn everything_replaced_is_one_hunk() {
        let old = vec!["a", "b"];
        let new = vec!["x"];
        assert_eq!(hunks(&old, &new), vec![Hunk { start: 0, end: 2, lines: vec!["x"] }]);
    }
}
