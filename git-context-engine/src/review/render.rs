//! Comment bodies and the machine-authored markers used to find them again.
//!
//! Every body ends with [`HIDDEN_MARKER`]. Inline bodies also start with the
//! `Code Review:` title and the summary with [`SUMMARY_HEADING`], so comments
//! are still recognized if an editor strips the HTML comment.

use std::fmt::Write;

use crate::review::types::{ReviewComment, ReviewStats, Severity};

/// Hidden HTML marker appended to every machine-authored body.
pub const HIDDEN_MARKER: &str = "<!-- mr-ai-review -->";

/// Title prefix of inline and note bodies.
pub const TITLE_PREFIX: &str = "Code Review:";

/// First line of the summary note.
pub const SUMMARY_HEADING: &str = "## AI Code Review Summary";

fn title(c: &ReviewComment) -> String {
    format!("**{} {} · {}**", TITLE_PREFIX, c.category, c.severity)
}

/// Body of a diff-bound comment.
pub fn inline_body(c: &ReviewComment) -> String {
    format!("{}\n\n{}\n\n{}", title(c), c.text.trim(), HIDDEN_MARKER)
}

/// Body of the fallback note: the location is embedded in the text.
pub fn note_body(c: &ReviewComment) -> String {
    let lines = match c.end_line_number {
        Some(end) if end > c.line_number => format!("lines {}–{}", c.line_number, end),
        _ => format!("line {}", c.line_number),
    };
    format!(
        "{}\n\n`{}` ({})\n\n{}\n\n{}",
        title(c),
        c.file_path,
        lines,
        c.text.trim(),
        HIDDEN_MARKER
    )
}

/// Summary note with per-severity counts and the triggering user.
pub fn summary_body(summary: &str, comments: &[ReviewComment], triggered_by: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SUMMARY_HEADING}\n");

    let summary = summary.trim();
    if summary.is_empty() {
        out.push_str("No summary was provided.\n\n");
    } else {
        let _ = writeln!(out, "{summary}\n");
    }

    out.push_str("| Severity | Count |\n|---|---|\n");
    for sev in Severity::ALL {
        let n = comments.iter().filter(|c| c.severity == sev).count();
        let _ = writeln!(out, "| {} | {} |", sev, n);
    }
    let _ = writeln!(out, "| **Total** | **{}** |\n", comments.len());

    if !triggered_by.trim().is_empty() {
        let _ = writeln!(out, "_Review triggered by @{}_\n", triggered_by.trim());
    }
    out.push_str(HIDDEN_MARKER);
    out
}

/// Short status line for logs and the CLI.
pub fn stats_line(stats: &ReviewStats) -> String {
    format!(
        "positional={} notes={} failed={} deleted={} summary={}",
        stats.posted_positional,
        stats.posted_as_note,
        stats.failed,
        stats.deleted_previous,
        stats.summary_posted
    )
}

/// Whether a comment body was produced by this reviewer.
///
/// Matches a leading `Code Review:` title (ignoring markdown `*`/`#` and
/// whitespace, case-insensitive), the summary heading, or the hidden marker.
pub fn is_machine_authored(body: &str) -> bool {
    if body.contains(HIDDEN_MARKER) {
        return true;
    }

    let stripped = body.trim_start_matches(|c: char| c == '*' || c == '#' || c.is_whitespace());
    let head: String = stripped.chars().take(32).collect::<String>().to_lowercase();

    head.starts_with(&TITLE_PREFIX.to_lowercase())
        || head.starts_with(&SUMMARY_HEADING.trim_start_matches("## ").to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::types::Category;

    fn comment(end: Option<u32>) -> ReviewComment {
        ReviewComment {
            file_path: "src/app.js".into(),
            line_number: 12,
            end_line_number: end,
            category: Category::Security,
            severity: Severity::Major,
            text: "Unescaped input reaches innerHTML.".into(),
        }
    }

    #[test]
    fn bodies_are_recognized_as_machine_authored() {
        let c = comment(None);
        assert!(inline_body(&c).starts_with("**Code Review: Security · Major**"));
        assert!(is_machine_authored(&inline_body(&c)));
        assert!(is_machine_authored(&note_body(&c)));
        assert!(is_machine_authored(&summary_body("ok", &[c], "alice")));
    }

    #[test]
    fn markers_survive_without_hidden_comment() {
        assert!(is_machine_authored("**code review: bug · minor**\n\ntext"));
        assert!(is_machine_authored("## AI Code Review Summary\n\nold run"));
        assert!(!is_machine_authored("Looks good, but see the code review: notes"));
        assert!(!is_machine_authored("LGTM"));
    }

    #[test]
    fn note_embeds_location() {
        let single = note_body(&comment(None));
        assert!(single.contains("`src/app.js` (line 12)"));
        let range = note_body(&comment(Some(15)));
        assert!(range.contains("(lines 12–15)"));
    }

    #[test]
    fn summary_counts_by_severity() {
        let mut minor = comment(None);
        minor.severity = Severity::Minor;
        let body = summary_body("Two findings.", &[comment(None), minor], "bob");
        assert!(body.starts_with(SUMMARY_HEADING));
        assert!(body.contains("| Major | 1 |"));
        assert!(body.contains("| Minor | 1 |"));
        assert!(body.contains("| **Total** | **2** |"));
        assert!(body.contains("@bob"));
        assert!(body.ends_with(HIDDEN_MARKER));
    }
}
