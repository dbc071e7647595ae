//! Provider-agnostic data model for change requests (MRs / PRs) and diffs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::GitContextEngineConfigError;
use crate::lang::detect_language;
use crate::parser::{looks_like_binary_patch, parse};

/// Supported Git providers used at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderKind {
    GitLab,
    GitHub,
}

impl ProviderKind {
    /// Public API base used when `GIT_API_BASE` is not set.
    pub fn default_api_base(self) -> &'static str {
        match self {
            ProviderKind::GitLab => "https://gitlab.com/api/v4",
            ProviderKind::GitHub => "https://api.github.com",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = GitContextEngineConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gitlab" => Ok(ProviderKind::GitLab),
            "github" => Ok(ProviderKind::GitHub),
            other => Err(GitContextEngineConfigError::UnsupportedProvider(
                other.to_string(),
            )),
        }
    }
}

/// A unique reference to a change request inside a provider.
///
/// * `project` – GitLab: numeric ID or "group/project"; GitHub: "owner/repo".
/// * `iid`     – GitLab MR IID or GitHub PR number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeRequestId {
    pub project: String,
    pub iid: u64,
}

/// Revision identifiers a provider needs to bind a comment to a diff position.
///
/// Scoped to one review execution and passed explicitly to every call that
/// needs it. GitLab exposes `base/start/head`; GitHub only `base/head`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffAnchorContext {
    pub base_sha: Option<String>,
    pub start_sha: Option<String>,
    pub head_sha: Option<String>,
}

impl DiffAnchorContext {
    /// Anchors are usable when both ends of the diff are known.
    pub fn is_present(&self) -> bool {
        self.base_sha.is_some() && self.head_sha.is_some()
    }

    /// `start_sha`, falling back to `base_sha` when the provider has none.
    pub fn start_or_base(&self) -> Option<&str> {
        self.start_sha.as_deref().or(self.base_sha.as_deref())
    }
}

/// Classification of a diff line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineKind {
    Added,
    Deleted,
    Unchanged,
}

/// One line of a parsed unified diff.
///
/// ADDED carries only `new_line`, DELETED only `old_line`, UNCHANGED both when
/// inside a hunk. Lines seen before any hunk header carry neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineChange {
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    /// Line text without the diff marker.
    pub text: String,
    pub kind: LineKind,
    /// Index of the hunk this line belongs to.
    pub hunk: Option<usize>,
}

/// A changed file with its current content and parsed diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChange {
    /// Path in the new revision (old path for deleted files).
    pub path: String,
    pub old_path: Option<String>,
    /// Full current text; empty when unavailable.
    pub content: String,
    /// Display label from the language detector.
    pub language: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_renamed: bool,
    pub is_binary: bool,
    /// Provider raw unified diff text.
    pub raw_diff: Option<String>,
    pub lines: Vec<LineChange>,
}

impl FileChange {
    /// Builds a change from a provider's per-file diff text.
    ///
    /// Binary patches keep their raw text but get no lines. Flags other than
    /// `is_binary` and the content are left for the caller.
    pub fn from_diff(path: String, old_path: Option<String>, raw_diff: Option<String>) -> Self {
        let is_binary = raw_diff.as_deref().is_some_and(looks_like_binary_patch);
        let lines = match raw_diff.as_deref() {
            Some(d) if !is_binary => parse(d),
            _ => Vec::new(),
        };

        Self {
            language: detect_language(&path).to_string(),
            path,
            old_path,
            is_binary,
            raw_diff,
            lines,
            ..Default::default()
        }
    }

    /// The non-deleted line anchored at `new_line`, if the diff shows it.
    pub fn line_at_new(&self, new_line: u32) -> Option<&LineChange> {
        self.lines
            .iter()
            .find(|l| l.kind != LineKind::Deleted && l.new_line == Some(new_line))
    }

    /// Whether the diff has at least one positioned line.
    pub fn has_hunks(&self) -> bool {
        self.lines.iter().any(|l| l.hunk.is_some())
    }
}

/// Everything `fetch_changed_files` returns for one change request.
#[derive(Debug, Clone, Default)]
pub struct ChangedFiles {
    pub files: Vec<FileChange>,
    pub anchors: DiffAnchorContext,
    /// True if the provider truncated diffs and they could not be recovered.
    pub is_truncated: bool,
}

/// Where an existing comment lives on the provider side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommentKind {
    /// Diff-bound review comment (GitLab DiffNote, GitHub review comment).
    Inline,
    /// Conversation-level note (GitLab note, GitHub issue comment).
    Note,
}

/// A comment already present on the change request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExistingComment {
    pub id: u64,
    pub kind: CommentKind,
    pub body: String,
}

/// Provider-neutral positional address for one comment.
///
/// With `old_path`/`old_line` unset the comment targets the new side only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionPayload {
    pub new_path: String,
    pub new_line: u32,
    pub old_path: Option<String>,
    pub old_line: Option<u32>,
    /// 1-based offset inside the file patch (GitHub legacy addressing).
    pub diff_position: Option<u32>,
}

impl PositionPayload {
    pub fn new_side(path: &str, line: u32) -> Self {
        Self {
            new_path: path.to_string(),
            new_line: line,
            old_path: None,
            old_line: None,
            diff_position: None,
        }
    }

    pub fn is_both_sides(&self) -> bool {
        self.old_line.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_need_base_and_head() {
        let mut a = DiffAnchorContext::default();
        assert!(!a.is_present());
        a.base_sha = Some("b".into());
        a.head_sha = Some("h".into());
        assert!(a.is_present());
        assert_eq!(a.start_or_base(), Some("b"));
        a.start_sha = Some("s".into());
        assert_eq!(a.start_or_base(), Some("s"));
    }

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("GitLab".parse::<ProviderKind>().unwrap(), ProviderKind::GitLab);
        assert!("bitbucket".parse::<ProviderKind>().is_err());
    }
}
