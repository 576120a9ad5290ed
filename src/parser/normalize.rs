use std::sync::LazyLock;

use regex::Regex;

use super::Section;

// Any run of whitespace-family characters, including newlines and the
// full-width and no-break spaces common in filing HTML.
static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s　\u{A0}]+").unwrap());

/// Collapse every whitespace run to a single plain space and trim the ends.
/// Idempotent.
pub fn normalize(text: &str) -> String {
    WS_RUN_RE.replace_all(text, " ").trim_matches(' ').to_string()
}

/// Normalize all finished sections once, after the whole file set is walked,
/// so cross-file boundary spacing collapses too. Texts are immutable after
/// this point.
pub fn normalize_sections(sections: &mut [Section]) {
    for section in sections.iter_mut() {
        section.text = normalize(&section.text);
    }
}
