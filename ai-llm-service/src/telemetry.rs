use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Crate target prefix used to filter only library-originated logs.
pub const TARGET_PREFIX: &str = "ai_llm_service";

/// RFC3339 UTC timer implemented via `chrono` (no extra features).
/// Example output: `2025-09-12T10:20:30Z`
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        // no fractional seconds, Z-suffix
        let s = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Build a formatting layer that renders ONLY events whose target starts
/// with one of `prefixes` (e.g. `["ai_llm_service", "git_context_engine"]`).
///
/// - RFC3339 UTC timestamps
/// - Compact single-line format with `file:line` and target
/// - Span close events (duration at the end of spans)
/// - ANSI colors only when stdout is a terminal
///
/// The per-layer filter does **not** affect logs from other crates.
pub fn layer<S>(prefixes: &'static [&'static str]) -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stdout().is_terminal();

    let selected = filter::filter_fn(move |meta| {
        prefixes.iter().any(|p| meta.target().starts_with(p))
    });

    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(selected)
}

/// Level directive for a single crate target, e.g. `git_context_engine=debug`.
pub fn level_directive(target: &str, level: Level) -> Result<Directive, ParseError> {
    format!("{target}={}", level.as_str().to_lowercase()).parse()
}

/// EnvFilter from `RUST_LOG` or `default`, plus `level` for each of `targets`.
///
/// Example: `default = "info"`, `level = Level::DEBUG` keeps INFO globally
/// and DEBUG for the listed crates.
pub fn env_filter_with_level(
    default: &str,
    targets: &[&str],
    level: Level,
) -> Result<EnvFilter, ParseError> {
    let mut base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    for target in targets {
        base = base.add_directive(level_directive(target, level)?);
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_is_lowercase() {
        let d = level_directive(TARGET_PREFIX, Level::DEBUG).unwrap();
        assert_eq!(d.to_string(), "ai_llm_service=debug");
    }
}
