//! Static discovery of declared parameter names.
//!
//! The parameter cell is scanned line by line without executing it. This is a
//! best-effort assignment-target heuristic, not a parser: a line contributes
//! a name when it starts with an identifier followed by end-of-line or by
//! optional spaces and `=`. Anything else (comments, blank lines, multi-line
//! expression continuations) is skipped silently.

use std::sync::OnceLock;

use regex::Regex;

fn assignment_target() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][0-9A-Za-z_]*)(?: *=.*)?$").expect("assignment-target regex")
    })
}

/// Collect declared names from raw cell text, in line order.
///
/// Duplicate lines contribute duplicate names; de-duplication is the
/// caller's business.
pub fn declared_names(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| assignment_target().captures(line))
        .map(|captures| captures[1].to_string())
        .collect()
}
