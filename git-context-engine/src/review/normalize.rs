//! Turns raw model output into a validated, diff-filtered comment list.
//!
//! Pipeline: slice the JSON object span, sanitize escapes and control
//! characters, strict parse, then repair (trailing commas, then per-field
//! regex extraction). The result is tagged with a [`ParseOutcome`].

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::ReviewError;
use crate::git_providers::types::{FileChange, LineKind};
use crate::review::types::{Category, ReviewComment, Severity};

lazy_static! {
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
    static ref FIELD_FILE: Regex =
        Regex::new(r#""(?:file|filePath|file_path|path)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref FIELD_LINE: Regex =
        Regex::new(r#""(?:line|lineNumber|line_number)"\s*:\s*"?(\d+)"#).unwrap();
    static ref FIELD_END_LINE: Regex =
        Regex::new(r#""(?:endLine|endLineNumber|end_line|end_line_number)"\s*:\s*"?(\d+)"#)
            .unwrap();
    static ref FIELD_CATEGORY: Regex =
        Regex::new(r#""category"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref FIELD_SEVERITY: Regex =
        Regex::new(r#""severity"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref FIELD_TEXT: Regex =
        Regex::new(r#""(?:text|comment|message|body)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref FIELD_SUMMARY: Regex =
        Regex::new(r#""summary"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap();
}

/// Summary used when nothing could be recovered from the model output.
pub const UNRECOVERABLE_SUMMARY: &str =
    "The review response could not be interpreted; no findings were posted.";

/// How the model output was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Strict JSON parse succeeded.
    Parsed,
    /// Trailing-comma fix or field extraction recovered content.
    Repaired,
    /// A JSON span existed but nothing usable came out of it.
    Unrecoverable,
}

/// Which diff lines a comment may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFilter {
    /// Only ADDED lines.
    AddedOnly,
    /// ADDED lines and UNCHANGED lines inside a hunk.
    #[default]
    AddedOrContext,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub line_filter: LineFilter,
    /// Keep at most this many comments, most severe first.
    pub max_comments: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub comments: Vec<ReviewComment>,
    pub summary: String,
    pub outcome: ParseOutcome,
    /// Comments dropped by validation, line filter, dedup or cap.
    pub dropped: usize,
}

/// Normalizes `raw` against the files of the review.
///
/// # Errors
/// [`ReviewError::ResponseParse`] when `raw` holds no `{ … }` span at all.
pub fn normalize(
    raw: &str,
    files: &[FileChange],
    opts: &NormalizeOptions,
) -> Result<Normalized, ReviewError> {
    let span = json_span(raw).ok_or_else(|| {
        ReviewError::ResponseParse(format!(
            "no JSON object in model output ({} chars)",
            raw.len()
        ))
    })?;
    let clean = sanitize(span);

    let (candidates, summary, outcome) = match parse_strict(&clean) {
        Some(resp) => (resp.comments, resp.summary, ParseOutcome::Parsed),
        None => repair(&clean),
    };
    debug!(?outcome, candidates = candidates.len(), "model output parsed");

    let total = candidates.len();
    let mut seen = HashSet::new();
    let mut comments: Vec<ReviewComment> = candidates
        .into_iter()
        .filter_map(RawComment::into_comment)
        .filter_map(|c| anchor_in_diff(c, files, opts.line_filter))
        .filter(|c| seen.insert((c.file_path.clone(), c.line_number, c.text.clone())))
        .collect();

    if let Some(max) = opts.max_comments {
        comments = cap_by_severity(comments, max);
    }

    let dropped = total - comments.len();
    if dropped > 0 {
        debug!(dropped, kept = comments.len(), "comments filtered out");
    }

    let summary = match (outcome, summary) {
        (ParseOutcome::Unrecoverable, _) => UNRECOVERABLE_SUMMARY.to_string(),
        (_, Some(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => String::new(),
    };

    Ok(Normalized {
        comments,
        summary,
        outcome,
        dropped,
    })
}

/// From the first `{` to the last `}`.
fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Literal `\n`, `\r`, `\t` escapes and raw control characters (other than
/// tab, newline, carriage return) become a single space. `\\` pairs are kept.
fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('n' | 'r' | 't') => {
                    chars.next();
                    out.push(' ');
                }
                Some('\\') => {
                    chars.next();
                    out.push_str("\\\\");
                }
                _ => out.push('\\'),
            },
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

fn parse_strict(s: &str) -> Option<RawResponse> {
    serde_json::from_str::<RawResponse>(s).ok()
}

fn repair(s: &str) -> (Vec<RawComment>, Option<String>, ParseOutcome) {
    let without_commas = TRAILING_COMMA.replace_all(s, "$1");
    if let Some(resp) = parse_strict(&without_commas) {
        return (resp.comments, resp.summary, ParseOutcome::Repaired);
    }

    let comments: Vec<RawComment> = comment_chunks(s)
        .into_iter()
        .filter_map(extract_fields)
        .collect();
    let summary = capture(&FIELD_SUMMARY, s);

    if comments.is_empty() && summary.is_none() {
        warn!(len = s.len(), "model output is unrecoverable");
        return (Vec::new(), None, ParseOutcome::Unrecoverable);
    }
    warn!(recovered = comments.len(), "model output repaired by field extraction");
    (comments, summary, ParseOutcome::Repaired)
}

/// Objects nested directly inside the outer object, found by brace depth.
///
/// Braces inside string literals do not count, so code in a comment's text
/// stays inside its chunk. Falls back to the whole span when the outer
/// object has no children.
fn comment_chunks(s: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                depth += 1;
                if depth == 2 {
                    start = Some(idx);
                }
            }
            '}' => {
                if depth == 2 {
                    if let Some(from) = start.take() {
                        chunks.push(&s[from..=idx]);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    if chunks.is_empty() {
        chunks.push(s);
    }
    chunks
}

fn extract_fields(chunk: &str) -> Option<RawComment> {
    let file = capture(&FIELD_FILE, chunk)?;
    let line = capture(&FIELD_LINE, chunk)?;
    let text = capture(&FIELD_TEXT, chunk)?;

    Some(RawComment {
        file: Some(file),
        line: Some(LineValue::Text(line)),
        end_line: capture(&FIELD_END_LINE, chunk).map(LineValue::Text),
        category: capture(&FIELD_CATEGORY, chunk),
        severity: capture(&FIELD_SEVERITY, chunk),
        text: Some(text),
    })
}

fn capture(re: &Regex, s: &str) -> Option<String> {
    re.captures(s)
        .and_then(|c| c.get(1))
        .map(|m| unescape(m.as_str()))
}

/// JSON string unescape, tolerant of raw newlines inside the value.
fn unescape(s: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{s}\"")).unwrap_or_else(|_| {
        s.replace("\\\"", "\"")
            .replace("\\\\", "\\")
            .replace("\\/", "/")
    })
}

/// The diff file a model path refers to.
///
/// An exact match wins. Otherwise one leading `./`, `a/`, `b/` or `/` is
/// stripped and matched again, so real `a/` or `b/` directories survive.
pub fn match_file<'a>(files: &'a [FileChange], path: &str) -> Option<&'a FileChange> {
    let path = path.trim();
    if let Some(f) = files.iter().find(|f| f.path == path) {
        return Some(f);
    }
    let stripped = ["./", "a/", "b/", "/"]
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))?;
    files.iter().find(|f| f.path == stripped)
}

/// Keeps `c` only if it targets a reviewable line; its path becomes the
/// matched diff path.
fn anchor_in_diff(
    mut c: ReviewComment,
    files: &[FileChange],
    filter: LineFilter,
) -> Option<ReviewComment> {
    let Some(file) = match_file(files, &c.file_path) else {
        debug!(path = %c.file_path, "comment targets a file outside the diff");
        return None;
    };

    let hit = file.lines.iter().any(|l| {
        l.new_line == Some(c.line_number)
            && match (filter, l.kind) {
                (_, LineKind::Added) => true,
                (LineFilter::AddedOrContext, LineKind::Unchanged) => l.hunk.is_some(),
                _ => false,
            }
    });
    if !hit {
        debug!(path = %c.file_path, line = c.line_number, "comment line is not in the diff");
        return None;
    }
    c.file_path = file.path.clone();
    Some(c)
}

/// Keeps the `max` most severe comments, preserving their original order.
fn cap_by_severity(comments: Vec<ReviewComment>, max: usize) -> Vec<ReviewComment> {
    if comments.len() <= max {
        return comments;
    }
    let mut ranked: Vec<usize> = (0..comments.len()).collect();
    ranked.sort_by_key(|&i| comments[i].severity); // stable
    let keep: HashSet<usize> = ranked.into_iter().take(max).collect();

    comments
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, c)| c)
        .collect()
}

/* ==========================
Model output shape
========================== */

#[derive(Debug, Default, Deserialize)]
struct RawResponse {
    #[serde(default, alias = "issues", alias = "findings")]
    comments: Vec<RawComment>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawComment {
    #[serde(default, alias = "filePath", alias = "file_path", alias = "path")]
    file: Option<String>,
    #[serde(default, alias = "lineNumber", alias = "line_number")]
    line: Option<LineValue>,
    #[serde(
        default,
        rename = "endLine",
        alias = "endLineNumber",
        alias = "end_line",
        alias = "end_line_number"
    )]
    end_line: Option<LineValue>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default, alias = "comment", alias = "message", alias = "body")]
    text: Option<String>,
}

/// Line numbers arrive as numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineValue {
    Number(u64),
    Text(String),
}

impl LineValue {
    fn as_line(&self) -> Option<u32> {
        let n = match self {
            LineValue::Number(n) => *n,
            LineValue::Text(s) => s.trim().parse().ok()?,
        };
        u32::try_from(n).ok().filter(|n| *n > 0)
    }
}

impl RawComment {
    fn into_comment(self) -> Option<ReviewComment> {
        let file_path = self.file?.trim().to_string();
        let line_number = self.line.as_ref()?.as_line()?;
        let text = self.text?.trim().to_string();
        if file_path.is_empty() || text.is_empty() {
            return None;
        }
        let end_line_number = self
            .end_line
            .as_ref()
            .and_then(LineValue::as_line)
            .filter(|end| *end >= line_number);

        Some(ReviewComment {
            file_path,
            line_number,
            end_line_number,
            category: self
                .category
                .as_deref()
                .map(Category::from_label)
                .unwrap_or(Category::Other),
            severity: self
                .severity
                .as_deref()
                .map(Severity::from_label)
                .unwrap_or(Severity::Info),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_providers::types::FileChange;

    fn files() -> Vec<FileChange> {
        let diff = "@@ -50,4 +50,6 @@\n ctx50\n+add51\n+add52\n ctx53\n-gone\n+add54\n ctx55";
        vec![FileChange::from_diff(
            "src/file.js".into(),
            Some("src/file.js".into()),
            Some(diff.into()),
        )]
    }

    fn run(raw: &str) -> Normalized {
        normalize(raw, &files(), &NormalizeOptions::default()).unwrap()
    }

    #[test]
    fn fenced_json_with_prose() {
        let raw = "Sure! Here is the review:\n```json\n{\"comments\":[\
{\"file\":\"src/file.js\",\"line\":51,\"category\":\"bug\",\"severity\":\"high\",\"text\":\"Off by one.\"},\
{\"file\":\"src/file.js\",\"line\":52,\"category\":\"style\",\"severity\":\"low\",\"text\":\"Naming.\"}],\
\"summary\":\"Two issues.\"}\n```\nHope this helps.";
        let out = run(raw);
        assert_eq!(out.outcome, ParseOutcome::Parsed);
        assert_eq!(out.comments.len(), 2);
        assert_eq!(out.comments[0].severity, Severity::Critical);
        assert_eq!(out.summary, "Two issues.");
    }

    #[test]
    fn drops_lines_outside_the_diff() {
        let raw = r#"{"comments":[{"file":"src/file.js","line":57,"text":"x"},
            {"file":"src/file.js","line":54,"text":"y"},
            {"file":"other.js","line":51,"text":"z"}],"summary":""}"#;
        let out = run(raw);
        assert_eq!(out.comments.len(), 1);
        assert_eq!(out.comments[0].line_number, 54);
        assert_eq!(out.dropped, 2);
    }

    #[test]
    fn context_lines_follow_the_filter() {
        let raw = r#"{"comments":[{"file":"src/file.js","line":53,"text":"ctx"}]}"#;
        assert_eq!(run(raw).comments.len(), 1);

        let strict = NormalizeOptions {
            line_filter: LineFilter::AddedOnly,
            max_comments: None,
        };
        assert!(normalize(raw, &files(), &strict).unwrap().comments.is_empty());
    }

    #[test]
    fn trailing_commas_are_repaired() {
        let raw = r#"{"comments":[{"file":"./src/file.js","line":"51","text":"a",},],"summary":"s",}"#;
        let out = run(raw);
        assert_eq!(out.outcome, ParseOutcome::Repaired);
        assert_eq!(out.comments.len(), 1);
        assert_eq!(out.comments[0].file_path, "src/file.js");
    }

    #[test]
    fn field_extraction_recovers_broken_json() {
        // raw newline inside a string and a missing comma between objects
        let raw = "{\"comments\":[{\"filePath\":\"b/src/file.js\",\"lineNumber\":52,\"category\":\"Sécurité\",\"severity\":\"Majeur\",\"comment\":\"first\nsecond\"} {\"file\":\"src/file.js\",\"line\":54,\"text\":\"other\"}],\"summary\":\"partial\"}";
        let out = run(raw);
        assert_eq!(out.outcome, ParseOutcome::Repaired);
        assert_eq!(out.comments.len(), 2);
        assert_eq!(out.comments[0].category, Category::Security);
        assert_eq!(out.comments[0].severity, Severity::Major);
        assert_eq!(out.comments[0].text, "first\nsecond");
        assert_eq!(out.summary, "partial");
    }

    #[test]
    fn field_extraction_keeps_code_with_braces() {
        let raw = "{\"comments\":[{\"file\":\"src/file.js\",\"line\":51,\"severity\":\"minor\",\"text\":\"wrap in if (x) { return; }\"} {\"file\":\"src/file.js\",\"line\":52,\"text\":\"use \\\"{}\\\" here\"}],\"summary\":\"ok\"}";
        let out = run(raw);
        assert_eq!(out.outcome, ParseOutcome::Repaired);
        assert_eq!(out.comments.len(), 2);
        assert_eq!(out.comments[0].text, "wrap in if (x) { return; }");
        assert_eq!(out.comments[1].line_number, 52);
        assert_eq!(out.comments[1].text, "use \"{}\" here");
    }

    #[test]
    fn brace_scanner_ignores_braces_in_strings() {
        let chunks = comment_chunks(r#"{"comments":[{"text":"a } b"},{"text":"{"}],"summary":"}"}"#);
        assert_eq!(chunks, vec![r#"{"text":"a } b"}"#, r#"{"text":"{"}"#]);
    }

    #[test]
    fn escaped_newlines_become_spaces() {
        let raw = r#"{"comments":[{"file":"src/file.js","line":51,"text":"a\nb"}]}"#;
        assert_eq!(run(raw).comments[0].text, "a b");
    }

    #[test]
    fn no_json_span_is_an_error() {
        let err = normalize("I could not review this.", &files(), &NormalizeOptions::default());
        assert!(matches!(err, Err(ReviewError::ResponseParse(_))));
    }

    #[test]
    fn unusable_object_yields_diagnostic_summary() {
        let out = run("{ this is not json at all }");
        assert_eq!(out.outcome, ParseOutcome::Unrecoverable);
        assert!(out.comments.is_empty());
        assert_eq!(out.summary, UNRECOVERABLE_SUMMARY);
    }

    #[test]
    fn duplicates_are_removed() {
        let raw = r#"{"comments":[{"file":"src/file.js","line":51,"text":"same"},
            {"file":"src/file.js","line":51,"text":"same"}]}"#;
        assert_eq!(run(raw).comments.len(), 1);
    }

    #[test]
    fn cap_keeps_most_severe_in_original_order() {
        let raw = r#"{"comments":[
            {"file":"src/file.js","line":51,"severity":"info","text":"a"},
            {"file":"src/file.js","line":52,"severity":"critical","text":"b"},
            {"file":"src/file.js","line":54,"severity":"minor","text":"c"}]}"#;
        let opts = NormalizeOptions {
            line_filter: LineFilter::AddedOrContext,
            max_comments: Some(2),
        };
        let out = normalize(raw, &files(), &opts).unwrap();
        let lines: Vec<u32> = out.comments.iter().map(|c| c.line_number).collect();
        assert_eq!(lines, vec![52, 54]);
    }

    #[test]
    fn path_prefixes() {
        let files = files();
        let hit = |p: &str| match_file(&files, p).map(|f| f.path.as_str());
        assert_eq!(hit("src/file.js"), Some("src/file.js"));
        assert_eq!(hit("./src/file.js"), Some("src/file.js"));
        assert_eq!(hit("b/src/file.js"), Some("src/file.js"));
        assert_eq!(hit("/src/file.js"), Some("src/file.js"));
        assert_eq!(hit("./a/src/file.js"), None);
        assert_eq!(hit("file.js"), None);
    }

    #[test]
    fn real_a_directory_keeps_its_path() {
        let diff = "@@ -1,1 +1,2 @@\n fn main() {}\n+fn serve() {}";
        let files = vec![
            FileChange::from_diff("a/server.rs".into(), None, Some(diff.into())),
            FileChange::from_diff("server.rs".into(), None, Some(diff.into())),
        ];
        let raw = r#"{"comments":[
            {"file":"a/server.rs","line":2,"text":"x"},
            {"file":"b/server.rs","line":2,"text":"y"}]}"#;
        let out = normalize(raw, &files, &NormalizeOptions::default()).unwrap();
        let paths: Vec<&str> = out.comments.iter().map(|c| c.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a/server.rs", "server.rs"]);
    }
}
