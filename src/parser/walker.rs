use std::sync::LazyLock;

use regex::Regex;

use super::dom::Node;
use super::heading;
use super::Section;

/// Default title for the first section of a document (the filing cover).
pub const COVER_TITLE: &str = "表紙";
/// Title opened for the first file of the audit-report annex.
pub const AUDIT_TITLE: &str = "監査報告書";

/// Tags that contribute one space on each side of their content so that
/// table cells and line breaks do not glue words together.
const SPACED_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "td", "th", "br"];

/// Subtrees never walked: the inline-XBRL metadata header and the document head.
const SKIPPED_TAGS: &[&str] = &["ix:header", "head"];

// A whitespace run whose neighbors on both sides are outside the
// digits/Latin-letters/punctuation set. Covers names padded out with spaces
// for layout, e.g. 「監 査 法 人」→「監査法人」.
static MID_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([^0-9０-９a-zA-Zａ-ｚＡ-Ｚ,\.!\?\(\)%])([\s　\u{A0}]+)([^0-9０-９a-zA-Zａ-ｚＡ-Ｚ,\.!\?\(\)%])",
    )
    .unwrap()
});

/// Mutable state threaded through one document's traversal: the section list
/// (the last entry is the single open section), the accumulation buffer, and
/// the per-file cover-page flag. Owned exclusively by one structuring call.
pub struct StructuringContext {
    sections: Vec<Section>,
    buf: String,
    cover_page: bool,
}

impl StructuringContext {
    pub fn new() -> Self {
        StructuringContext {
            sections: Vec::new(),
            buf: String::new(),
            cover_page: false,
        }
    }

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }

    fn open_section(&mut self, title: String, text: String) {
        self.sections.push(Section {
            title,
            breadcrumb: String::new(),
            text,
            order: 0,
        });
    }

    /// Move the accumulation buffer into the open section's text.
    fn flush(&mut self) {
        if let Some(open) = self.sections.last_mut() {
            open.text.push(' ');
            open.text.push_str(&self.buf);
        }
        self.buf.clear();
    }
}

/// Walk one parsed file against the shared context. `audit_first` marks the
/// first file of the audit-report group, which always opens its own section.
pub fn walk_file(ctx: &mut StructuringContext, roots: &[Node], audit_first: bool) {
    ctx.cover_page = false;
    if audit_first {
        ctx.open_section(AUDIT_TITLE.to_string(), String::new());
    } else if ctx.sections.is_empty() {
        // first file of the document: the filing cover, which is never
        // split at heading boundaries
        ctx.open_section(COVER_TITLE.to_string(), String::new());
        ctx.cover_page = true;
    }
    for node in roots {
        walk(ctx, node);
    }
    ctx.flush();
}

fn walk(ctx: &mut StructuringContext, node: &Node) {
    match node {
        Node::Text(text) => ctx.buf.push_str(&collapse_mid_spaces(text)),
        Node::Element { tag, children } => {
            if SKIPPED_TAGS.contains(&tag.as_str()) {
                return;
            }

            if !ctx.cover_page {
                let flat = node.flat_text();
                if heading::is_boundary(&flat) {
                    ctx.flush();
                    // the new section's text is seeded with its own title;
                    // walking the children below appends that text once more
                    ctx.open_section(flat.clone(), flat);
                }
            }

            let spaced = SPACED_TAGS.contains(&tag.as_str());
            if spaced {
                ctx.buf.push(' ');
            }
            for child in children {
                walk(ctx, child);
            }
            if spaced {
                ctx.buf.push(' ');
            }
        }
    }
}

/// Repeatedly collapse padded-out whitespace between non-alphanumeric
/// characters until no run remains.
fn collapse_mid_spaces(text: &str) -> String {
    let mut s = text.to_string();
    while MID_SPACE_RE.is_match(&s) {
        s = MID_SPACE_RE.replace_all(&s, "${1}${3}").into_owned();
    }
    s
}
