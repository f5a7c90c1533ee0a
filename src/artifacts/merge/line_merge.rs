//! Three-way merge of file contents
//!
//! Both sides are diffed line by line against the base. Changed base ranges
//! that touch (overlap, or insert at the same spot) are grouped into clusters.
//! A cluster edited by one side only, or identically by both, resolves
//! cleanly; anything else is a conflict and gets marker lines.

use crate::artifacts::diff::hunk::{Hunk, hunks};
use bytes::Bytes;

pub const OURS_MARKER: &[u8] = b"<<<<<<< ours\n";
pub const SEPARATOR_MARKER: &[u8] = b"=======\n";
pub const THEIRS_MARKER: &[u8] = b">>>>>>> theirs\n";

/// Content with a NUL byte in its first block is not merged line by line
const BINARY_PROBE_SIZE: usize = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMerge {
    Clean(Bytes),
    /// Content with conflict markers; ours verbatim for binary files
    Conflicted(Bytes),
}

impl LineMerge {
    pub fn is_clean(&self) -> bool {
        matches!(self, LineMerge::Clean(_))
    }

    pub fn content(&self) -> &Bytes {
        match self {
            LineMerge::Clean(content) | LineMerge::Conflicted(content) => content,
        }
    }

    pub fn into_content(self) -> Bytes {
        match self {
            LineMerge::Clean(content) | LineMerge::Conflicted(content) => content,
        }
    }
}

#[derive(Debug)]
struct Cluster<'a> {
    start: usize,
    end: usize,
    ours: Vec<Hunk<&'a [u8]>>,
    theirs: Vec<Hunk<&'a [u8]>>,
}

pub fn merge_lines(base: &Bytes, ours: &Bytes, theirs: &Bytes) -> LineMerge {
    if ours == theirs || base == theirs {
        return LineMerge::Clean(ours.clone());
    }
    if base == ours {
        return LineMerge::Clean(theirs.clone());
    }
    if [base, ours, theirs].iter().any(|content| is_binary(content)) {
        return LineMerge::Conflicted(ours.clone());
    }

    let base_lines = split_lines(base);
    let clusters = clusters(
        hunks(&base_lines, &split_lines(ours)),
        hunks(&base_lines, &split_lines(theirs)),
    );

    let mut merged = Vec::with_capacity(ours.len().max(theirs.len()));
    let mut conflicted = false;
    let mut position = 0;

    for cluster in clusters {
        merged.extend(base_lines[position..cluster.start].concat());

        let base_version = &base_lines[cluster.start..cluster.end];
        let ours_version = apply(&base_lines, &cluster, &cluster.ours);
        let theirs_version = apply(&base_lines, &cluster, &cluster.theirs);

        if ours_version == theirs_version || theirs_version == base_version {
            merged.extend(ours_version.concat());
        } else if ours_version == base_version {
            merged.extend(theirs_version.concat());
        } else {
            conflicted = true;
            merged.extend_from_slice(OURS_MARKER);
            push_section(&mut merged, &ours_version);
            merged.extend_from_slice(SEPARATOR_MARKER);
            push_section(&mut merged, &theirs_version);
            merged.extend_from_slice(THEIRS_MARKER);
        }

        position = cluster.end;
    }
    merged.extend(base_lines[position..].concat());

    if conflicted {
        LineMerge::Conflicted(Bytes::from(merged))
    } else {
        LineMerge::Clean(Bytes::from(merged))
    }
}

fn is_binary(content: &[u8]) -> bool {
    content.iter().take(BINARY_PROBE_SIZE).any(|byte| *byte == 0)
}

/// Lines keep their terminating newline; a last line without one is kept too
fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    content.split_inclusive(|byte| *byte == b'\n').collect()
}

fn clusters<'a>(ours: Vec<Hunk<&'a [u8]>>, theirs: Vec<Hunk<&'a [u8]>>) -> Vec<Cluster<'a>> {
    let mut changes = ours
        .into_iter()
        .map(|hunk| (true, hunk))
        .chain(theirs.into_iter().map(|hunk| (false, hunk)))
        .collect::<Vec<_>>();
    changes.sort_by_key(|(_, hunk)| (hunk.start, hunk.end));

    let mut clusters: Vec<Cluster> = Vec::new();
    for (is_ours, hunk) in changes {
        let touches_last = clusters
            .last()
            .is_some_and(|last| hunk.start < last.end || hunk.start == last.start);

        if touches_last && let Some(last) = clusters.last_mut() {
            last.add(is_ours, hunk);
        } else {
            let mut cluster = Cluster {
                start: hunk.start,
                end: hunk.end,
                ours: Vec::new(),
                theirs: Vec::new(),
            };
            cluster.add(is_ours, hunk);
            clusters.push(cluster);
        }
    }

    clusters
}

impl<'a> Cluster<'a> {
    fn add(&mut self, is_ours: bool, hunk: Hunk<&'a [u8]>) {
        self.end = self.end.max(hunk.end);
        if is_ours {
            self.ours.push(hunk);
        } else {
            self.theirs.push(hunk);
        }
    }
}

/// The cluster's base range with one side's hunks applied
fn apply<'a>(base: &[&'a [u8]], cluster: &Cluster<'a>, hunks: &[Hunk<&'a [u8]>]) -> Vec<&'a [u8]> {
    let mut lines = Vec::new();
    let mut position = cluster.start;

    for hunk in hunks {
        lines.extend_from_slice(&base[position..hunk.start]);
        lines.extend_from_slice(&hunk.lines);
        position = hunk.end;
    }
    lines.extend_from_slice(&base[position..cluster.end]);

    lines
}

fn push_section(merged: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        merged.extend_from_slice(line);
    }
    if merged.last().is_some_and(|byte| *byte != b'\n') {
        merged.push(b'\n');
    }
}
