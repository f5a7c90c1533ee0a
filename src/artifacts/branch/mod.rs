//! Branch names
//!
//! Names follow the usual ref-name rules: no leading `.` or `/`, no `..`,
//! `/.`, `@{`, trailing `/` or `.lock`, and no whitespace, control or glob
//! characters.

pub mod branch_name;

pub const INVALID_BRANCH_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\.lock$|@\{|\/\/|[\x00-\x20\*:\?\[\\~\^\x7f]";

/// Branch a new repository starts on
pub const DEFAULT_BRANCH: &str = "main";
