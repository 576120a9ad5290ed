use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::MarkupError;

/// Minimal DOM for one parsed markup file. Attributes are dropped: the walker
/// only ever looks at tag names and text content.
#[derive(Debug)]
pub enum Node {
    Element { tag: String, children: Vec<Node> },
    Text(String),
}

impl Node {
    /// Concatenated text of this node and all its descendants.
    pub fn flat_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Decode a markup file: strip a leading UTF-8 BOM if present, otherwise the
/// bytes are taken as UTF-8 unmodified.
pub fn decode(bytes: &[u8]) -> Result<&str, MarkupError> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
    Ok(std::str::from_utf8(bytes)?)
}

/// Parse one file into root nodes. Lenient where filing HTML tends to be
/// sloppy: end-tag names are not checked and stray closers are tolerated.
pub fn parse(input: &str) -> Result<Vec<Node>, MarkupError> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    // (tag, children) for every element still open
    let mut stack: Vec<(String, Vec<Node>)> = Vec::new();
    let mut roots: Vec<Node> = Vec::new();

    loop {
        match reader.read_event().map_err(quick_xml::Error::from)? {
            Event::Start(e) => {
                stack.push((tag_name(e.name().as_ref()), Vec::new()));
            }
            Event::Empty(e) => {
                let node = Node::Element {
                    tag: tag_name(e.name().as_ref()),
                    children: Vec::new(),
                };
                attach(&mut stack, &mut roots, node);
            }
            Event::End(e) => {
                let end = tag_name(e.name().as_ref());
                // close the innermost matching element; unmatched closers are dropped
                if stack.iter().any(|(tag, _)| *tag == end) {
                    while let Some((tag, children)) = stack.pop() {
                        let done = tag == end;
                        attach(&mut stack, &mut roots, Node::Element { tag, children });
                        if done {
                            break;
                        }
                    }
                }
            }
            Event::Text(e) => {
                // entity references arrive as separate GeneralRef events,
                // so text chunks are taken as-is
                let text = String::from_utf8_lossy(&e).into_owned();
                attach(&mut stack, &mut roots, Node::Text(text));
            }
            Event::GeneralRef(e) => {
                let text = match e.resolve_char_ref().map_err(quick_xml::Error::from)? {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = String::from_utf8_lossy(&e).into_owned();
                        match resolve_entity(&name) {
                            Some(s) => s.to_string(),
                            None => format!("&{};", name),
                        }
                    }
                };
                attach(&mut stack, &mut roots, Node::Text(text));
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                attach(&mut stack, &mut roots, Node::Text(text));
            }
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    // unterminated elements fold upward at EOF
    while let Some((tag, children)) = stack.pop() {
        attach(&mut stack, &mut roots, Node::Element { tag, children });
    }

    Ok(roots)
}

fn attach(stack: &mut [(String, Vec<Node>)], roots: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some((_, children)) => children.push(node),
        None => roots.push(node),
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Named entities seen in filing HTML, the XML builtins included.
fn resolve_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{A0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "middot" => "・",
        "bull" => "•",
        "mdash" => "—",
        "ndash" => "–",
        "yen" => "¥",
        "copy" => "©",
        "reg" => "®",
        "times" => "×",
        "divide" => "÷",
        _ => return None,
    })
}
