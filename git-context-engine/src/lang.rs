//! File path → display language label used in prompts.

use std::path::Path;

/// Label for files whose extension is unknown.
pub const PLAIN_TEXT: &str = "Text";

/// Detects a human-readable language label from a repository path.
///
/// Well-known extension-less file names (`Dockerfile`, `Makefile`) are
/// recognized by name; everything else goes by the lowercase extension.
pub fn detect_language(path: &str) -> &'static str {
    let p = Path::new(path);
    let file_name = p.file_name().and_then(|n| n.to_str()).unwrap_or(path);

    match file_name {
        "Dockerfile" | "Containerfile" => return "Dockerfile",
        "Makefile" | "GNUmakefile" => return "Makefile",
        "CMakeLists.txt" => return "CMake",
        "Jenkinsfile" => return "Groovy",
        _ => {}
    }

    let Some(ext) = p.extension().and_then(|e| e.to_str()) else {
        return PLAIN_TEXT;
    };

    match ext.to_ascii_lowercase().as_str() {
        "rs" => "Rust",
        "py" | "pyi" => "Python",
        "js" | "mjs" | "cjs" => "JavaScript",
        "jsx" => "JavaScript (JSX)",
        "ts" | "mts" | "cts" => "TypeScript",
        "tsx" => "TypeScript (TSX)",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "scala" => "Scala",
        "groovy" | "gradle" => "Groovy",
        "go" => "Go",
        "rb" => "Ruby",
        "php" => "PHP",
        "cs" => "C#",
        "fs" => "F#",
        "c" | "h" => "C",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "C++",
        "m" | "mm" => "Objective-C",
        "swift" => "Swift",
        "dart" => "Dart",
        "lua" => "Lua",
        "ex" | "exs" => "Elixir",
        "erl" => "Erlang",
        "hs" => "Haskell",
        "clj" | "cljs" => "Clojure",
        "r" => "R",
        "sh" | "bash" | "zsh" => "Shell",
        "ps1" => "PowerShell",
        "sql" => "SQL",
        "html" | "htm" => "HTML",
        "css" => "CSS",
        "scss" | "sass" => "SCSS",
        "less" => "Less",
        "vue" => "Vue",
        "svelte" => "Svelte",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        "xml" => "XML",
        "md" | "markdown" => "Markdown",
        "proto" => "Protocol Buffers",
        "graphql" | "gql" => "GraphQL",
        "tf" | "hcl" => "Terraform",
        _ => PLAIN_TEXT,
    }
}
