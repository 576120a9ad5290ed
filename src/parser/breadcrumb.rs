use super::heading;
use super::Section;

/// Root label every hierarchical breadcrumb starts from.
pub const ROOT_LABEL: &str = "本文";

/// Assign each section its breadcrumb from the classified heading sequence.
///
/// The stack holds the currently open ancestors as `(depth, label)` pairs.
/// Pushing a depth already present first pops everything from its first
/// occurrence to the top, closing same-or-deeper open headings. Depth-0
/// titles carry no hierarchy: their breadcrumb is the title verbatim and the
/// stack is left untouched.
pub fn assign(sections: &mut [Section]) {
    let mut stack: Vec<(u32, String)> = Vec::new();

    for section in sections.iter_mut() {
        let depth = heading::classify(&section.title);
        if depth == 0 {
            section.breadcrumb = section.title.clone();
            continue;
        }

        while stack.iter().any(|(d, _)| *d == depth) {
            stack.pop();
        }
        let label = heading::label(&section.title)
            .unwrap_or(section.title.as_str())
            .to_string();
        stack.push((depth, label));

        let mut crumb = String::from(ROOT_LABEL);
        for (_, label) in &stack {
            crumb.push_str(" > ");
            crumb.push_str(label);
        }
        section.breadcrumb = crumb;
    }
}
