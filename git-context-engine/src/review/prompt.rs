//! Prompt assembly for the review model.

use std::fmt::Write;

use crate::git_providers::types::{FileChange, LineKind};

/// System message sent along with every review prompt.
pub const SYSTEM_PROMPT: &str = "You are a meticulous senior code reviewer. \
You only comment on real problems in the changed lines of a merge request. \
You answer with a single JSON object and nothing else.";

const RESPONSE_CONTRACT: &str = r#"Respond with ONLY this JSON object, no prose and no code fences:
{
  "comments": [
    {
      "file": "<path exactly as shown after 'File:'>",
      "line": <new line number shown in the diff>,
      "endLine": <optional last line of a multi-line finding>,
      "category": "bug | security | performance | style | best_practice | other",
      "severity": "critical | major | minor | info",
      "text": "<concise explanation and a concrete fix>"
    }
  ],
  "summary": "<two or three sentences about the change as a whole>"
}
Rules:
- Only use line numbers of added (+) or unchanged lines shown with a number.
- Do not comment on deleted (-) lines.
- Return "comments": [] when there is nothing worth reporting."#;

/// Builds the review prompt for all reviewable files.
///
/// Each file is rendered with its language, its numbered diff (`N | +text`)
/// and its current content cut to `max_file_chars` characters. Binary and
/// deleted files are listed but not rendered.
pub fn build_prompt(files: &[FileChange], max_file_chars: usize) -> String {
    let mut out = String::from("Review the following merge request changes.\n\n");

    for file in files {
        if file.is_binary || file.is_deleted {
            let why = if file.is_binary { "binary" } else { "deleted" };
            let _ = writeln!(out, "### File: {} ({}, skipped)\n", file.path, why);
            continue;
        }

        let _ = writeln!(out, "### File: {} ({})", file.path, file.language);
        if file.is_renamed {
            if let Some(old) = &file.old_path {
                let _ = writeln!(out, "Renamed from: {old}");
            }
        }

        out.push_str("Diff (new line numbers):\n```diff\n");
        for line in &file.lines {
            let (num, marker) = match line.kind {
                LineKind::Added => (line.new_line, '+'),
                LineKind::Deleted => (None, '-'),
                LineKind::Unchanged => (line.new_line, ' '),
            };
            match num {
                Some(n) => {
                    let _ = writeln!(out, "{n:>5} | {marker}{}", line.text);
                }
                None => {
                    let _ = writeln!(out, "      | {marker}{}", line.text);
                }
            }
        }
        out.push_str("```\n");

        if !file.content.is_empty() {
            let (content, cut) = truncate_chars(&file.content, max_file_chars);
            let _ = writeln!(
                out,
                "Current file content{}:\n```\n{}\n```",
                if cut { " (truncated)" } else { "" },
                content
            );
        }
        out.push('\n');
    }

    out.push_str(RESPONSE_CONTRACT);
    out
}

/// Cuts `s` to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> (&str, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_numbered_diff_and_contract() {
        let mut f = FileChange::from_diff(
            "src/main.rs".into(),
            None,
            Some("@@ -1,2 +1,2 @@\n fn main() {\n-    old();\n+    new();".into()),
        );
        f.content = "fn main() {\n    new();\n}".into();

        let prompt = build_prompt(&[f], 1000);
        assert!(prompt.contains("### File: src/main.rs (Rust)"));
        assert!(prompt.contains("    2 | +    new();"));
        assert!(prompt.contains("      | -    old();"));
        assert!(prompt.contains("\"comments\""));
        assert!(!prompt.contains("(truncated)"));
    }

    #[test]
    fn content_is_truncated_on_char_boundary() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("abc", 5), ("abc", false));
    }

    #[test]
    fn binary_files_are_listed_only() {
        let mut f = FileChange::from_diff("logo.png".into(), None, None);
        f.is_binary = true;
        let prompt = build_prompt(&[f], 10);
        assert!(prompt.contains("### File: logo.png (binary, skipped)"));
        assert!(!prompt.contains("```diff"));
    }
}
