//! Repository configuration
//!
//! Values set explicitly on a [`Config`] win; anything left unset falls back
//! to the environment when it is needed:
//!
//! - `SVCS_AUTHOR_NAME`, `SVCS_AUTHOR_EMAIL`: commit identity
//! - `SVCS_AUTHOR_DATE`: fixed commit date (RFC 2822 or `%Y-%m-%d %H:%M:%S %z`),
//!   the current time otherwise
//! - `SVCS_DEFAULT_BRANCH`: branch a new repository starts on (`main`)

use crate::artifacts::branch::DEFAULT_BRANCH;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::merge::conflict::ConflictStyle;
use crate::artifacts::objects::commit::Author;
use anyhow::Context;

pub const AUTHOR_NAME_ENV: &str = "SVCS_AUTHOR_NAME";
pub const AUTHOR_EMAIL_ENV: &str = "SVCS_AUTHOR_EMAIL";
pub const AUTHOR_DATE_ENV: &str = "SVCS_AUTHOR_DATE";
pub const DEFAULT_BRANCH_ENV: &str = "SVCS_DEFAULT_BRANCH";

#[derive(Debug, Clone, Default)]
pub struct Config {
    author_name: Option<String>,
    author_email: Option<String>,
    author_date: Option<chrono::DateTime<chrono::FixedOffset>>,
    default_branch: Option<BranchName>,
    conflict_style: ConflictStyle,
}

impl Config {
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self.author_email = Some(email.into());
        self
    }

    pub fn with_author_date(mut self, date: chrono::DateTime<chrono::FixedOffset>) -> Self {
        self.author_date = Some(date);
        self
    }

    pub fn with_default_branch(mut self, branch: BranchName) -> Self {
        self.default_branch = Some(branch);
        self
    }

    pub fn with_conflict_style(mut self, style: ConflictStyle) -> Self {
        self.conflict_style = style;
        self
    }

    pub fn conflict_style(&self) -> ConflictStyle {
        self.conflict_style
    }

    pub fn default_branch(&self) -> anyhow::Result<BranchName> {
        if let Some(branch) = &self.default_branch {
            return Ok(branch.clone());
        }

        match std::env::var(DEFAULT_BRANCH_ENV) {
            Ok(name) if !name.trim().is_empty() => BranchName::try_parse(name.trim()),
            _ => BranchName::try_parse(DEFAULT_BRANCH),
        }
    }

    /// Identity recorded as author and committer of new commits
    pub fn author(&self) -> anyhow::Result<Author> {
        let name = match &self.author_name {
            Some(name) => name.clone(),
            None => std::env::var(AUTHOR_NAME_ENV)
                .with_context(|| format!("{AUTHOR_NAME_ENV} not set"))?,
        };
        let email = match &self.author_email {
            Some(email) => email.clone(),
            None => std::env::var(AUTHOR_EMAIL_ENV)
                .with_context(|| format!("{AUTHOR_EMAIL_ENV} not set"))?,
        };

        let date = match self.author_date {
            Some(date) => Some(date),
            None => match std::env::var(AUTHOR_DATE_ENV) {
                Ok(date) => Some(Author::parse_date(&date)?),
                Err(_) => None,
            },
        };

        let author = match date {
            Some(date) => Author::new_with_timestamp(name, email, date),
            None => Author::new(name, email),
        };
        author.ensure_valid()?;

        Ok(author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RepositoryError, repository_error};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn explicit_values_are_used_as_given() {
        let date = Author::parse_date("2023-01-01 12:00:00 +0000").unwrap();
        let config = Config::default()
            .with_author("Ada", "ada@example.com")
            .with_author_date(date)
            .with_default_branch(BranchName::try_parse("trunk").unwrap())
            .with_conflict_style(ConflictStyle::Markers);

        let author = config.author().unwrap();
        assert_eq!(author.display(), "Ada <ada@example.com> 1672574400 +0000");
        assert_eq!(config.default_branch().unwrap().as_ref(), "trunk");
        assert_eq!(config.conflict_style(), ConflictStyle::Markers);
    }

    #[rstest]
    #[case::newline_in_name("Ann\nEvil", "ann@example.com")]
    #[case::bracket_in_name("Ann <x", "ann@example.com")]
    #[case::bracket_in_email("Ann", "ann>@example.com")]
    fn identities_that_break_the_header_are_rejected(#[case] name: &str, #[case] email: &str) {
        let error = Config::default().with_author(name, email).author().unwrap_err();

        assert!(matches!(
            repository_error(&error),
            Some(RepositoryError::InvalidIdentity(_))
        ));
    }
}
