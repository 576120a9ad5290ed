use std::sync::LazyLock;

use regex::Regex;

/// A heading boundary: up to five lead characters, a full-width-bracketed
/// label, then nothing but whitespace to the end.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.{0,5}【(.*)】[\s　\u{A0}]*$").unwrap());

/// Everything before the last full-width opening bracket.
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)【").unwrap());

/// Numbering-scheme depth rules, tried in order, first match wins. The order
/// is hand-tuned to the nesting conventions of annual securities reports:
/// 部 outranks 第N outranks parenthesized numbers, and so on down to bare
/// Latin letters. Depth is inferred from the title alone, never from markup
/// structure.
static DEPTH_RULES: LazyLock<Vec<(u32, Regex)>> = LazyLock::new(|| {
    [
        (1, r"第.*部"),                     // 第一部, 第２部
        (2, r"第[0-9０-９]"),               // 第１, 第2
        (3, r"[\(（][0-9０-９]+[\)）]"),    // (1), （２）
        (4, r"[0-9０-９]"),                 // bare digit
        (5, r"[①-⑳]"),                     // circled numbers
        (6, r"[\(（][ア-ンｱ-ﾝ]+[\)）]"),   // (ア)
        (7, r"[ア-ンｱ-ﾝ]+"),               // bare katakana
        (8, r"[\(（][a-zａ-ｚ]+[\)）]"),    // (a)
        (9, r"[a-zａ-ｚ]+"),                // bare letter
    ]
    .iter()
    .map(|(depth, pattern)| (*depth, Regex::new(pattern).unwrap()))
    .collect()
});

/// Category for titles whose prefix matches none of the depth rules;
/// treated as innermost by the breadcrumb stack.
pub const UNCLASSIFIED: u32 = 99;

/// Whether a node's flattened text marks a heading boundary.
pub fn is_boundary(text: &str) -> bool {
    HEADING_RE.is_match(text)
}

/// The label inside the full-width brackets of a boundary title.
pub fn label(title: &str) -> Option<&str> {
    HEADING_RE
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Map a heading title to its numbering-depth category. Titles without a
/// bracket, or with nothing before it, carry no hierarchy (category 0) and
/// are used verbatim downstream.
pub fn classify(title: &str) -> u32 {
    let prefix = match PREFIX_RE.captures(title) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(""),
        None => return 0,
    };
    if prefix.is_empty() {
        return 0;
    }
    for (depth, rule) in DEPTH_RULES.iter() {
        if rule.is_match(prefix) {
            return *depth;
        }
    }
    UNCLASSIFIED
}
