use crate::common::file::{FileSpec, read_file, write_file};
use assert_fs::TempDir;
use chrono::{DateTime, Duration, FixedOffset};
use rstest::fixture;
use std::path::Path;
use svcs::artifacts::objects::object_id::ObjectId;
use svcs::{Config, Repository};

pub const AUTHOR_NAME: &str = "Ada Lovelace";
pub const AUTHOR_EMAIL: &str = "ada@example.com";
pub const AUTHOR_DATE: &str = "2023-01-01T12:00:00+00:00";

pub fn base_date() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(AUTHOR_DATE).expect("valid test date")
}

/// Configuration with a fixed identity and a clock `minutes` past the base date
pub fn config_at(minutes: i64) -> Config {
    Config::default()
        .with_author(AUTHOR_NAME, AUTHOR_EMAIL)
        .with_author_date(base_date() + Duration::minutes(minutes))
}

/// A repository in a temp directory along with helpers to edit its files
pub struct TestRepository {
    pub dir: TempDir,
    pub repo: Repository,
    clock: i64,
}

impl TestRepository {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, path: &str, content: &str) {
        write_file(FileSpec::new(self.dir.path().join(path), content.to_string()));
    }

    pub fn read(&self, path: &str) -> String {
        read_file(&self.dir.path().join(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.dir.path().join(path).exists()
    }

    pub fn remove(&self, path: &str) {
        std::fs::remove_file(self.dir.path().join(path))
            .unwrap_or_else(|e| panic!("Failed to remove file {:?}: {}", path, e));
    }

    /// Move the commit clock forward so later commits sort as newer
    pub fn tick(&mut self) {
        self.clock += 1;
        self.reopen(config_at(self.clock));
    }

    pub fn reopen(&mut self, config: Config) {
        self.repo = Repository::open(self.dir.path(), config).expect("Failed to reopen repository");
    }

    /// Stage everything and commit it one minute after the previous commit
    pub fn commit_all(&mut self, message: &str) -> ObjectId {
        self.tick();
        self.repo.stage(".").expect("Failed to stage files");
        self.repo.commit(message).expect("Failed to commit")
    }

    pub fn tree_of(&self, commit: &ObjectId) -> ObjectId {
        self.repo
            .database()
            .load_commit(commit)
            .expect("Failed to load commit")
            .tree_oid()
            .clone()
    }
}

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

#[fixture]
pub fn repository(repository_dir: TempDir) -> TestRepository {
    let repo = Repository::init(repository_dir.path(), config_at(0))
        .expect("Failed to initialize repository");

    TestRepository {
        dir: repository_dir,
        repo,
        clock: 0,
    }
}

/// Repository with one commit holding `1.txt`, `a/2.txt` and `a/b/3.txt`
#[fixture]
pub fn committed_repository(mut repository: TestRepository) -> TestRepository {
    repository.write("1.txt", "one\n");
    repository.write("a/2.txt", "two\n");
    repository.write("a/b/3.txt", "three\n");
    repository.commit_all("Initial commit");

    repository
}
