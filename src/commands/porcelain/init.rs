use crate::areas::config::Config;
use crate::areas::repository::{METADATA_DIR, OBJECTS_DIR, Repository};
use crate::areas::refs::Refs;
use crate::errors::RepositoryError;
use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::info;

impl Repository {
    /// Create an empty repository in `root`
    ///
    /// The current branch is the configured default branch, unborn until the
    /// first commit.
    pub fn init(root: impl AsRef<Path>, config: Config) -> anyhow::Result<Self> {
        let root = root.as_ref();
        let metadata_path = root.join(METADATA_DIR);
        if metadata_path.exists() {
            return Err(RepositoryError::AlreadyInitialized(root.to_path_buf()).into());
        }

        let default_branch = config.default_branch()?;
        let refs = Refs::new(metadata_path.clone().into_boxed_path());

        fs::create_dir_all(metadata_path.join(OBJECTS_DIR))
            .context("Failed to create .svcs/objects directory")?;

        fs::create_dir_all(refs.heads_path())
            .context("Failed to create .svcs/refs/heads directory")?;

        refs.set_head(&default_branch)
            .context("Failed to create initial HEAD reference")?;

        info!(root = %root.display(), branch = %default_branch, "initialized repository");

        Self::open(root, config)
    }
}
