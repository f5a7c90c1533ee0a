//! Branch references and HEAD
//!
//! A branch is a text file under `refs/heads/` holding the hex ID of its tip
//! commit. `HEAD` always holds `ref: refs/heads/<name>`, naming the current
//! branch. The current branch may be unborn: HEAD names it but its ref file
//! does not exist until the first commit.
//!
//! ## Atomicity
//!
//! Every ref file is written to a temp file beside the repository metadata,
//! fsynced and then renamed over the old file. A reader therefore sees either
//! the old or the new value, never a torn write.

use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use anyhow::Context;
use derive_new::new;
use fake::rand;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

pub const HEAD_REF_NAME: &str = "HEAD";

/// Reference manager rooted at the repository metadata directory
#[derive(Debug, new)]
pub struct Refs {
    path: Box<Path>,
}

/// Value of HEAD and the current branch tip, read together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadSnapshot {
    pub branch: BranchName,
    pub oid: Option<ObjectId>,
}

impl Refs {
    pub fn current_branch(&self) -> anyhow::Result<BranchName> {
        let head_path = self.head_path();
        let content = std::fs::read_to_string(&head_path)
            .with_context(|| format!("failed to read HEAD at {:?}", head_path))?;
        let content = content.trim();

        let symref_match = regex::Regex::new(SYMREF_REGEX)?
            .captures(content)
            .with_context(|| format!("HEAD is not a symbolic reference: {content}"))?;

        BranchName::try_parse_sym_ref_name(&SymRefName::new(symref_match[1].to_string()))
    }

    pub fn is_current_branch(&self, branch_name: &BranchName) -> anyhow::Result<bool> {
        Ok(&self.current_branch()? == branch_name)
    }

    /// Tip of the current branch, `None` while it is unborn
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        Ok(self.head_snapshot()?.oid)
    }

    pub fn head_snapshot(&self) -> anyhow::Result<HeadSnapshot> {
        let branch = self.current_branch()?;
        let oid = self.read_branch(&branch)?;

        Ok(HeadSnapshot { branch, oid })
    }

    /// Point HEAD at a branch
    pub fn set_head(&self, branch_name: &BranchName) -> anyhow::Result<()> {
        debug!(branch = %branch_name, "moving HEAD");
        self.write_ref_file(
            &self.head_path(),
            &format!("ref: {}", branch_name.to_sym_ref_name()),
        )
    }

    /// Advance the current branch to a new commit
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let branch = self.current_branch()?;
        self.update_branch(&branch, oid)
    }

    pub fn read_branch(&self, branch_name: &BranchName) -> anyhow::Result<Option<ObjectId>> {
        let branch_path = self.branch_path(branch_name);
        if !branch_path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&branch_path)
            .with_context(|| format!("failed to read ref file at {:?}", branch_path))?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        Ok(Some(ObjectId::try_parse(content.to_string()).with_context(
            || format!("corrupt ref file at {:?}", branch_path),
        )?))
    }

    pub fn branch_exists(&self, branch_name: &BranchName) -> bool {
        self.branch_path(branch_name).is_file()
    }

    pub fn update_branch(&self, branch_name: &BranchName, oid: &ObjectId) -> anyhow::Result<()> {
        debug!(branch = %branch_name, %oid, "updating branch");
        self.write_ref_file(&self.branch_path(branch_name), oid.as_ref())
    }

    pub fn create_branch(&self, name: &BranchName, source_oid: &ObjectId) -> anyhow::Result<()> {
        if self.branch_exists(name) {
            return Err(RepositoryError::BranchExists(name.to_string()).into());
        }

        self.update_branch(name, source_oid)
    }

    pub fn delete_branch(&self, name: &BranchName) -> anyhow::Result<ObjectId> {
        let branch_path = self.branch_path(name);

        let oid = self
            .read_branch(name)?
            .ok_or_else(|| RepositoryError::BranchNotFound(name.to_string()))?;

        std::fs::remove_file(&branch_path)
            .with_context(|| format!("failed to delete branch file at {:?}", branch_path))?;
        self.prune_branch_empty_parent_dirs(&branch_path)?;

        Ok(oid)
    }

    /// Every branch with a ref file, sorted by name
    pub fn list_branches(&self) -> anyhow::Result<Vec<BranchName>> {
        let heads_path = self.heads_path();
        let mut branches = WalkDir::new(&heads_path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative_path = entry.path().strip_prefix(&heads_path).ok()?;
                BranchName::try_parse(relative_path.to_string_lossy().replace('\\', "/")).ok()
            })
            .collect::<Vec<_>>();
        branches.sort();

        Ok(branches)
    }

    fn write_ref_file(&self, path: &Path, raw_ref: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!(
                "failed to create parent directories for ref file at {:?}",
                path
            )
        })?)?;

        // temp files stay outside refs/ so branch listing never sees them
        let temp_path = self
            .path
            .join(format!(".tmp-ref-{}", rand::random::<u32>()));
        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("failed to open ref file at {:?}", temp_path))?;
        temp_file.write_all(raw_ref.as_bytes())?;
        temp_file.write_all(b"\n")?;
        temp_file.sync_all()?;

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("failed to replace ref file at {:?}", path))?;

        Ok(())
    }

    fn prune_branch_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && parent != self.heads_path().as_ref()
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent).with_context(|| {
                format!("failed to remove empty branch directory at {:?}", parent)
            })?;
            self.prune_branch_empty_parent_dirs(parent)?;
        }

        Ok(())
    }

    fn branch_path(&self, branch_name: &BranchName) -> Box<Path> {
        self.path
            .join(branch_name.to_sym_ref_name().as_ref_path())
            .into_boxed_path()
    }

    pub fn head_path(&self) -> Box<Path> {
        self.path.join(HEAD_REF_NAME).into_boxed_path()
    }

    pub fn refs_path(&self) -> Box<Path> {
        self.path.join("refs").into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.refs_path().join("heads").into_boxed_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::repository_error;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn refs_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn branch(name: &str) -> BranchName {
        BranchName::try_parse(name).unwrap()
    }

    fn refs(dir: &TempDir) -> Refs {
        let refs = Refs::new(dir.path().to_path_buf().into_boxed_path());
        refs.set_head(&branch("main")).unwrap();
        refs
    }

    #[rstest]
    fn fresh_head_names_an_unborn_branch(refs_dir: TempDir) {
        let refs = refs(&refs_dir);

        assert_eq!(refs.current_branch().unwrap(), branch("main"));
        assert_eq!(refs.read_head().unwrap(), None);
        assert!(refs.list_branches().unwrap().is_empty());
    }

    #[rstest]
    fn updating_head_creates_the_current_branch(refs_dir: TempDir) {
        let refs = refs(&refs_dir);
        let oid = ObjectId::from_content(b"commit");

        refs.update_head(&oid).unwrap();

        assert_eq!(refs.read_head().unwrap(), Some(oid.clone()));
        assert_eq!(refs.list_branches().unwrap(), vec![branch("main")]);
        assert_eq!(
            std::fs::read_to_string(refs_dir.path().join("refs/heads/main")).unwrap(),
            format!("{oid}\n")
        );
    }

    #[rstest]
    fn duplicate_branch_is_rejected(refs_dir: TempDir) {
        let refs = refs(&refs_dir);
        let oid = ObjectId::from_content(b"commit");
        refs.create_branch(&branch("topic"), &oid).unwrap();

        let error = refs.create_branch(&branch("topic"), &oid).unwrap_err();
        assert!(matches!(
            repository_error(&error),
            Some(RepositoryError::BranchExists(name)) if name == "topic"
        ));
    }

    #[rstest]
    fn deleting_a_nested_branch_prunes_empty_directories(refs_dir: TempDir) {
        let refs = refs(&refs_dir);
        let oid = ObjectId::from_content(b"commit");
        refs.create_branch(&branch("feature/deep/x"), &oid).unwrap();
        refs.create_branch(&branch("feature/y"), &oid).unwrap();

        assert_eq!(refs.delete_branch(&branch("feature/deep/x")).unwrap(), oid);

        assert!(!refs_dir.path().join("refs/heads/feature/deep").exists());
        assert!(refs_dir.path().join("refs/heads/feature").exists());
        assert_eq!(refs.list_branches().unwrap(), vec![branch("feature/y")]);
    }

    #[rstest]
    fn deleting_a_missing_branch_fails(refs_dir: TempDir) {
        let refs = refs(&refs_dir);

        let error = refs.delete_branch(&branch("ghost")).unwrap_err();
        assert!(matches!(
            repository_error(&error),
            Some(RepositoryError::BranchNotFound(name)) if name == "ghost"
        ));
    }
}
