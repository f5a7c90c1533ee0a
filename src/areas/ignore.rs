//! Ignore rules consulted while staging and reporting untracked files
//!
//! The metadata directory is always ignored. Further rules come from
//! `.svcsignore` at the repository root: one glob per line, blank lines and
//! `#` comments skipped.
//!
//! - `*` matches within a path component, `**` across components, `?` one
//!   character
//! - a trailing `/` restricts the pattern to directories
//! - a pattern without any other `/` matches a component at any depth;
//!   otherwise it is anchored at the repository root
//! - a matched directory ignores everything below it

use crate::areas::repository::METADATA_DIR;
use anyhow::Context;
use regex::Regex;
use std::path::{Component, Path};

pub const IGNORE_FILE: &str = ".svcsignore";

/// Decides which repository-relative file paths are invisible to staging
pub trait IgnoreMatcher: std::fmt::Debug + Send + Sync {
    fn is_ignored(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone)]
struct IgnorePattern {
    regex: Regex,
    directory_only: bool,
    anchored: bool,
}

impl IgnorePattern {
    fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let directory_only = line.ends_with('/');
        let pattern = line.trim_end_matches('/');
        let anchored = pattern.contains('/');
        let pattern = pattern.trim_start_matches('/');
        if pattern.is_empty() {
            return Ok(None);
        }

        let regex = Regex::new(&glob_to_regex(pattern))
            .with_context(|| format!("Invalid ignore pattern: {line}"))?;

        Ok(Some(IgnorePattern {
            regex,
            directory_only,
            anchored,
        }))
    }

    /// `candidate` is `path` itself or one of its ancestors; only ancestors are
    /// known to be directories
    fn matches(&self, candidate: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }

        if self.anchored {
            self.regex.is_match(candidate)
        } else {
            let name = candidate.rsplit('/').next().unwrap_or(candidate);
            self.regex.is_match(name)
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // "**/" also matches zero directories
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            _ => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');

    regex
}

/// Default matcher: the metadata directory plus `.svcsignore` patterns
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreRules {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let patterns = content
            .lines()
            .map(IgnorePattern::parse)
            .filter_map(Result::transpose)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(IgnoreRules { patterns })
    }

    /// Load `.svcsignore` from a repository root; a missing file means no rules
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let ignore_path = root.join(IGNORE_FILE);
        if !ignore_path.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&ignore_path)
            .with_context(|| format!("Unable to read {}", ignore_path.display()))?;
        Self::parse(&content)
    }
}

impl IgnoreMatcher for IgnoreRules {
    fn is_ignored(&self, path: &Path) -> bool {
        let components = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>();

        if components.first().is_some_and(|first| first == METADATA_DIR) {
            return true;
        }

        let mut candidate = String::new();
        for (depth, component) in components.iter().enumerate() {
            if depth > 0 {
                candidate.push('/');
            }
            candidate.push_str(component);

            let is_dir = depth + 1 < components.len();
            if self
                .patterns
                .iter()
                .any(|pattern| pattern.matches(&candidate, is_dir))
            {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("*.pyc", "module.pyc", true)]
    #[case("*.pyc", "pkg/deep/module.pyc", true)]
    #[case("*.pyc", "module.py", false)]
    #[case("__pycache__/", "__pycache__/a.txt", true)]
    #[case("__pycache__/", "pkg/__pycache__/a.txt", true)]
    #[case("__pycache__/", "__pycache__", false)]
    #[case("build/out", "build/out/bin", true)]
    #[case("build/out", "src/build/out", false)]
    #[case("/target", "target/debug/x", true)]
    #[case("docs/**/*.md", "docs/a/b/c.md", true)]
    #[case("docs/**/*.md", "docs/c.md", true)]
    #[case("file?.txt", "file1.txt", true)]
    #[case("file?.txt", "file10.txt", false)]
    #[case("a+b.txt", "a+b.txt", true)]
    fn patterns_match_like_globs(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        let rules = IgnoreRules::parse(pattern).unwrap();
        assert_eq!(rules.is_ignored(Path::new(path)), expected, "{pattern} vs {path}");
    }

    #[rstest]
    fn metadata_directory_is_always_ignored() {
        let rules = IgnoreRules::default();
        assert!(rules.is_ignored(Path::new(".svcs/HEAD")));
        assert!(!rules.is_ignored(Path::new("src/.svcs")));
    }

    #[rstest]
    fn comments_and_blank_lines_are_skipped() {
        let rules = IgnoreRules::parse("# header\n\n*.log\n   \n").unwrap();
        assert!(rules.is_ignored(Path::new("debug.log")));
        assert!(!rules.is_ignored(Path::new("# header")));
    }
}
