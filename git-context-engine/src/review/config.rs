//! Review knobs loaded from the environment.
//!
//! - `MR_REVIEWER_DRY_RUN`        = `true|false` (default `false`)
//! - `MR_REVIEWER_LINE_FILTER`    = `added|added_or_context` (default `added_or_context`)
//! - `MR_REVIEWER_MAX_COMMENTS`   = optional cap on posted comments
//! - `MR_REVIEWER_MAX_FILE_CHARS` = per-file content budget in the prompt (default 12000)

use crate::errors::{GitContextEngineConfigError, GitContextEngineResult};
use crate::git_providers::env_opt;
use crate::review::normalize::{LineFilter, NormalizeOptions};

const DEFAULT_MAX_FILE_CHARS: usize = 12_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewConfig {
    /// Run everything except deleting and posting.
    pub dry_run: bool,
    pub line_filter: LineFilter,
    pub max_comments: Option<usize>,
    pub max_file_chars: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            line_filter: LineFilter::AddedOrContext,
            max_comments: None,
            max_file_chars: DEFAULT_MAX_FILE_CHARS,
        }
    }
}

impl ReviewConfig {
    pub fn from_env() -> GitContextEngineResult<Self> {
        let dry_run = match env_opt("MR_REVIEWER_DRY_RUN") {
            Some(v) => parse_bool(&v).ok_or(GitContextEngineConfigError::InvalidValue {
                var: "MR_REVIEWER_DRY_RUN",
                reason: "expected true/false",
            })?,
            None => false,
        };

        let line_filter = match env_opt("MR_REVIEWER_LINE_FILTER") {
            Some(v) => parse_line_filter(&v).ok_or(GitContextEngineConfigError::InvalidValue {
                var: "MR_REVIEWER_LINE_FILTER",
                reason: "expected added or added_or_context",
            })?,
            None => LineFilter::default(),
        };

        let max_comments = parse_usize("MR_REVIEWER_MAX_COMMENTS")?;
        let max_file_chars = parse_usize("MR_REVIEWER_MAX_FILE_CHARS")?.unwrap_or(DEFAULT_MAX_FILE_CHARS);

        Ok(Self {
            dry_run,
            line_filter,
            max_comments,
            max_file_chars,
        })
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            line_filter: self.line_filter,
            max_comments: self.max_comments,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_line_filter(v: &str) -> Option<LineFilter> {
    match v.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "added" | "added_only" => Some(LineFilter::AddedOnly),
        "added_or_context" | "context" => Some(LineFilter::AddedOrContext),
        _ => None,
    }
}

fn parse_usize(var: &'static str) -> GitContextEngineResult<Option<usize>> {
    match env_opt(var) {
        Some(v) => v.trim().parse::<usize>().map(Some).map_err(|_| {
            GitContextEngineConfigError::InvalidValue {
                var,
                reason: "expected a non-negative integer",
            }
            .into()
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_parsers() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_line_filter("added"), Some(LineFilter::AddedOnly));
        assert_eq!(
            parse_line_filter("Added-Or-Context"),
            Some(LineFilter::AddedOrContext)
        );
        assert_eq!(parse_line_filter("all"), None);
    }

    #[test]
    fn defaults() {
        let cfg = ReviewConfig::default();
        assert!(!cfg.dry_run);
        assert_eq!(cfg.normalize_options().line_filter, LineFilter::AddedOrContext);
        assert_eq!(cfg.max_file_chars, 12_000);
    }
}
