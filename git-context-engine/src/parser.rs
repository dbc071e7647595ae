//! Utilities for parsing unified diffs for git-context-engine.
//!
//! The parser never fails: malformed input degrades to unpositioned lines.

use crate::git_providers::types::{LineChange, LineKind};

/// Heuristic to detect whether a unified diff text represents a binary patch.
///
/// This checks for common markers like `GIT binary patch`, `Binary files differ`
/// and the presence of NUL bytes.
pub fn looks_like_binary_patch(diff: &str) -> bool {
    if diff.contains("GIT binary patch") {
        return true;
    }
    if diff.contains("Binary files") && diff.contains(" differ") {
        return true;
    }
    diff.bytes().any(|b| b == 0)
}

/// Parses a unified diff text into an ordered list of line changes.
///
/// A hunk header `@@ -O[,len] +N[,len] @@` resets the old cursor to `O` and
/// the new cursor to `N`. `+` lines are ADDED at the new cursor, `-` lines
/// DELETED at the old cursor, anything else UNCHANGED at both.
pub fn parse(diff: &str) -> Vec<LineChange> {
    let mut scanner = Scanner::default();
    diff.lines().filter_map(|l| scanner.feed(l)).collect()
}

/// GitHub "position" of `new_line` inside a file patch.
///
/// The line right after the first hunk header is position 1; every later
/// line, including further hunk headers, adds one.
pub fn diff_position(diff: &str, new_line: u32) -> Option<u32> {
    let first_header = diff.lines().position(|l| l.starts_with("@@"))?;
    let mut scanner = Scanner::default();

    for (idx, line) in diff.lines().enumerate() {
        let Some(change) = scanner.feed(line) else {
            continue;
        };
        if idx > first_header
            && change.hunk.is_some()
            && change.kind != LineKind::Deleted
            && change.new_line == Some(new_line)
        {
            return u32::try_from(idx - first_header).ok();
        }
    }
    None
}

/// One file's slice of a multi-file raw diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileDiff {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub diff: String,
}

/// Splits a `diff --git` separated multi-file diff into per-file chunks.
///
/// Paths come from the `---`/`+++` headers (`/dev/null` maps to `None`),
/// falling back to the `diff --git a/.. b/..` line.
pub fn split_raw_diff(raw: &str) -> Vec<RawFileDiff> {
    let mut chunks: Vec<Vec<&str>> = Vec::new();
    for line in raw.lines() {
        if line.starts_with("diff --git ") || chunks.is_empty() {
            chunks.push(Vec::new());
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push(line);
        }
    }

    chunks
        .into_iter()
        .filter(|c| c.iter().any(|l| !l.trim().is_empty()))
        .map(|lines| {
            let (mut old_path, mut new_path) = lines
                .first()
                .and_then(|l| l.strip_prefix("diff --git "))
                .map(paths_from_git_header)
                .unwrap_or((None, None));

            for l in lines.iter().take_while(|l| !l.starts_with("@@")) {
                if let Some(p) = l.strip_prefix("--- ") {
                    old_path = header_path(p, "a/");
                } else if let Some(p) = l.strip_prefix("+++ ") {
                    new_path = header_path(p, "b/");
                }
            }

            RawFileDiff {
                old_path,
                new_path,
                diff: lines.join("\n"),
            }
        })
        .collect()
}

fn header_path(p: &str, side_prefix: &str) -> Option<String> {
    let p = p.trim();
    if p == "/dev/null" {
        return None;
    }
    Some(p.strip_prefix(side_prefix).unwrap_or(p).to_string())
}

fn paths_from_git_header(rest: &str) -> (Option<String>, Option<String>) {
    // "a/x b/y"; paths with spaces are resolved by the ---/+++ headers instead
    match rest.split_once(" b/") {
        Some((a, b)) => (
            Some(a.strip_prefix("a/").unwrap_or(a).to_string()),
            Some(b.to_string()),
        ),
        None => (None, None),
    }
}

/// Line-by-line diff state.
#[derive(Debug, Default)]
struct Scanner {
    old: Option<u32>,
    new: Option<u32>,
    hunk: Option<usize>,
    hunks_seen: usize,
    /// Lines still promised by the current hunk header (old side, new side).
    old_left: u32,
    new_left: u32,
}

impl Scanner {
    fn feed(&mut self, line: &str) -> Option<LineChange> {
        if line.starts_with("@@") {
            match parse_hunk_header(line) {
                Some(h) => {
                    self.old = Some(h.old_start);
                    self.new = Some(h.new_start);
                    self.hunk = Some(self.hunks_seen);
                    self.old_left = h.old_lines;
                    self.new_left = h.new_lines;
                }
                None => {
                    self.old = None;
                    self.new = None;
                    self.hunk = None;
                    self.old_left = 0;
                    self.new_left = 0;
                }
            }
            self.hunks_seen += 1;
            return None;
        }

        if line.starts_with('\\') {
            // "\ No newline at end of file"
            return None;
        }

        if self.is_header(line) {
            if line.starts_with("diff --git ") {
                self.old = None;
                self.new = None;
                self.hunk = None;
            }
            return None;
        }

        let in_hunk = self.hunk.is_some();

        if let (true, Some(text)) = (in_hunk, line.strip_prefix('+')) {
            let new_line = self.new;
            self.new = step(self.new);
            self.new_left = self.new_left.saturating_sub(1);
            return Some(LineChange {
                old_line: None,
                new_line,
                text: text.to_string(),
                kind: LineKind::Added,
                hunk: self.hunk,
            });
        }

        if let (true, Some(text)) = (in_hunk, line.strip_prefix('-')) {
            let old_line = self.old;
            self.old = step(self.old);
            self.old_left = self.old_left.saturating_sub(1);
            return Some(LineChange {
                old_line,
                new_line: None,
                text: text.to_string(),
                kind: LineKind::Deleted,
                hunk: self.hunk,
            });
        }

        let text = line.strip_prefix(' ').unwrap_or(line).to_string();
        let (old_line, new_line) = (self.old, self.new);
        self.old = step(self.old);
        self.new = step(self.new);
        self.old_left = self.old_left.saturating_sub(1);
        self.new_left = self.new_left.saturating_sub(1);

        Some(LineChange {
            old_line,
            new_line,
            text,
            kind: LineKind::Unchanged,
            hunk: self.hunk,
        })
    }

    /// Git metadata and `---`/`+++` file headers.
    ///
    /// Inside a hunk that still expects lines, `---`/`+++` are content
    /// (e.g. a removed `-- comment` line).
    fn is_header(&self, line: &str) -> bool {
        let hunk_open = self.hunk.is_some() && (self.old_left > 0 || self.new_left > 0);
        if line.starts_with("--- ") || line.starts_with("+++ ") || line == "---" || line == "+++" {
            return !hunk_open;
        }
        if hunk_open {
            return false;
        }
        const META: [&str; 13] = [
            "diff --git ",
            "index ",
            "new file mode",
            "deleted file mode",
            "old mode",
            "new mode",
            "similarity index",
            "dissimilarity index",
            "rename from",
            "rename to",
            "copy from",
            "copy to",
            "Binary files",
        ];
        META.iter().any(|m| line.starts_with(m))
    }
}

/// Next line number; a cursor past `u32::MAX` becomes unpositioned.
fn step(cursor: Option<u32>) -> Option<u32> {
    cursor.and_then(|c| c.checked_add(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HunkHeader {
    old_start: u32,
    old_lines: u32,
    new_start: u32,
    new_lines: u32,
}

fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    // "@@ -1,5 +1,7 @@ optional text"
    let rest = line.strip_prefix("@@")?.trim_start();
    let (ranges, _) = rest.split_once("@@")?;
    let mut parts = ranges.split_whitespace();

    let old_part = parts.next()?.strip_prefix('-')?;
    let new_part = parts.next()?.strip_prefix('+')?;

    let (old_start, old_lines) = split_range(old_part)?;
    let (new_start, new_lines) = split_range(new_part)?;

    Some(HunkHeader {
        old_start,
        old_lines,
        new_start,
        new_lines,
    })
}

fn split_range(s: &str) -> Option<(u32, u32)> {
    // a missing length means a single line
    match s.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(lines: &[LineChange]) -> Vec<LineKind> {
        lines.iter().map(|l| l.kind).collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn one_deleted_two_added() {
        let diff = "@@ -10,3 +10,4 @@\n ctx\n-old\n+new1\n+new2\n ctx2";
        let lines = parse(diff);

        let deleted: Vec<_> = lines.iter().filter(|l| l.kind == LineKind::Deleted).collect();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].old_line, Some(11));
        assert_eq!(deleted[0].new_line, None);

        let added: Vec<_> = lines
            .iter()
            .filter(|l| l.kind == LineKind::Added)
            .map(|l| l.new_line)
            .collect();
        assert_eq!(added, vec![Some(11), Some(12)]);

        let last = lines.last().unwrap();
        assert_eq!((last.old_line, last.new_line), (Some(12), Some(13)));
    }

    #[test]
    fn added_lines_increase_and_reset_per_hunk() {
        let diff = "@@ -1,2 +1,3 @@\n a\n+b\n+c\n@@ -20 +21,2 @@\n+x\n y";
        let lines = parse(diff);
        let added: Vec<_> = lines
            .iter()
            .filter(|l| l.kind == LineKind::Added)
            .map(|l| (l.hunk, l.new_line))
            .collect();
        assert_eq!(
            added,
            vec![(Some(0), Some(2)), (Some(0), Some(3)), (Some(1), Some(21))]
        );
        let y = lines.last().unwrap();
        assert_eq!((y.old_line, y.new_line), (Some(20), Some(22)));
    }

    #[test]
    fn lines_without_hunk_are_unpositioned() {
        let lines = parse("just some text\n+not really added");
        assert_eq!(kinds(&lines), vec![LineKind::Unchanged, LineKind::Unchanged]);
        assert!(lines.iter().all(|l| l.old_line.is_none() && l.new_line.is_none()));
        assert_eq!(lines[1].text, "+not really added");
    }

    #[test]
    fn file_headers_and_no_newline_marker_are_skipped() {
        let diff = "diff --git a/x.rs b/x.rs\nindex 1..2 100644\n--- a/x.rs\n+++ b/x.rs\n@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b";
        let lines = parse(diff);
        assert_eq!(kinds(&lines), vec![LineKind::Deleted, LineKind::Added]);
        assert_eq!(lines[1].new_line, Some(1));
    }

    #[test]
    fn removed_sql_comment_is_content_inside_hunk() {
        let diff = "@@ -1,2 +1,1 @@\n--- drop me\n keep";
        let lines = parse(diff);
        assert_eq!(lines[0].kind, LineKind::Deleted);
        assert_eq!(lines[0].text, "-- drop me");
    }

    #[test]
    fn invalid_header_leaves_cursors_unset() {
        let lines = parse("@@ garbage @@\n+a\n@@ -3,1 +3,1 @@\n+b");
        assert_eq!(lines[0].new_line, None);
        assert_eq!(lines[0].hunk, None);
        assert_eq!(lines[1].new_line, Some(3));
    }

    #[test]
    fn cursor_overflow_leaves_rest_of_hunk_unpositioned() {
        let lines = parse("@@ -4294967295,2 +4294967295,2 @@\n a\n b\n+c");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].old_line, Some(u32::MAX));
        assert_eq!(lines[0].new_line, Some(u32::MAX));
        assert_eq!(lines[1].old_line, None);
        assert_eq!(lines[1].new_line, None);
        assert_eq!(lines[2].kind, LineKind::Added);
        assert_eq!(lines[2].new_line, None);
        assert!(lines.iter().all(|l| l.hunk == Some(0)));
    }

    #[test]
    fn copy_metadata_is_not_content() {
        let diff = "diff --git a/x.rs b/y.rs\nsimilarity index 90%\ncopy from x.rs\ncopy to y.rs\n@@ -1 +1 @@\n-a\n+b";
        let lines = parse(diff);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].kind, LineKind::Deleted);
        assert_eq!(lines[1].new_line, Some(1));
    }

    #[test]
    fn empty_line_in_hunk_is_context() {
        let lines = parse("@@ -1,3 +1,3 @@\n a\n\n c");
        assert_eq!(lines[1].kind, LineKind::Unchanged);
        assert_eq!(lines[1].text, "");
        assert_eq!(lines[2].new_line, Some(3));
    }

    #[test]
    fn github_positions_count_later_headers() {
        let diff = "@@ -1,2 +1,3 @@\n a\n+b\n c\n@@ -10,1 +11,2 @@\n x\n+y";
        assert_eq!(diff_position(diff, 1), Some(1));
        assert_eq!(diff_position(diff, 2), Some(2));
        assert_eq!(diff_position(diff, 12), Some(6));
        assert_eq!(diff_position(diff, 50), None);
    }

    #[test]
    fn binary_detection() {
        assert!(looks_like_binary_patch("Binary files a/x.png and b/x.png differ"));
        assert!(looks_like_binary_patch("GIT binary patch\nliteral 12"));
        assert!(!looks_like_binary_patch("@@ -1 +1 @@\n-a\n+b"));
    }

    #[test]
    fn splits_multi_file_raw_diff() {
        let raw = "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1 +1 @@\n-x\n+y\n\
diff --git a/new.txt b/new.txt\nnew file mode 100644\n--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1 @@\n+hi";
        let parts = split_raw_diff(raw);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].new_path.as_deref(), Some("a.rs"));
        assert_eq!(parts[1].old_path, None);
        assert_eq!(parts[1].new_path.as_deref(), Some("new.txt"));

        let added = parse(&parts[1].diff);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].new_line, Some(1));
    }
}
