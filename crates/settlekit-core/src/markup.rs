//! Forgiving HTML fragment parser.
//!
//! Covers what fixtures and content-editable assignment need: elements,
//! attributes, and text with the common character references. Comments and
//! doctypes are dropped, stray close tags are ignored, and elements still open
//! at the end of input are closed implicitly.
//!
//! # Example
//!
//! ```
//! use settlekit_core::markup::{parse_fragment, MarkupNode};
//!
//! let nodes = parse_fragment("<b>hi</b> there");
//! assert_eq!(nodes.len(), 2);
//! assert!(matches!(&nodes[1], MarkupNode::Text(t) if t == " there"));
//! ```

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// A parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    /// An element with lowercased tag and attribute names.
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    /// A run of decoded text.
    Text(String),
}

/// Returns true if `tag` is an HTML void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

enum Token {
    Open {
        tag: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
}

struct OpenElement {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<MarkupNode>,
}

impl OpenElement {
    fn into_node(self) -> MarkupNode {
        MarkupNode::Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Parses `input` as an HTML fragment.
pub fn parse_fragment(input: &str) -> Vec<MarkupNode> {
    let mut tokenizer = Tokenizer { input, pos: 0 };
    let mut root = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    while let Some(token) = tokenizer.next_token() {
        match token {
            Token::Text(text) => append(&mut stack, &mut root, MarkupNode::Text(text)),
            Token::Open {
                tag,
                attributes,
                self_closing,
            } => {
                if self_closing || is_void_element(&tag) {
                    let node = MarkupNode::Element {
                        tag,
                        attributes,
                        children: Vec::new(),
                    };
                    append(&mut stack, &mut root, node);
                } else {
                    stack.push(OpenElement {
                        tag,
                        attributes,
                        children: Vec::new(),
                    });
                }
            }
            Token::Close(tag) => {
                if let Some(idx) = stack.iter().rposition(|open| open.tag == tag) {
                    close_until(&mut stack, &mut root, idx);
                }
            }
        }
    }

    close_until(&mut stack, &mut root, 0);
    root
}

/// Pops open elements down to (and including) `depth`, attaching each to its parent.
fn close_until(stack: &mut Vec<OpenElement>, root: &mut Vec<MarkupNode>, depth: usize) {
    while stack.len() > depth {
        if let Some(open) = stack.pop() {
            append(stack, root, open.into_node());
        }
    }
}

fn append(stack: &mut [OpenElement], root: &mut Vec<MarkupNode>, node: MarkupNode) {
    let children = match stack.last_mut() {
        Some(open) => &mut open.children,
        None => root,
    };
    if let MarkupNode::Text(text) = &node {
        if let Some(MarkupNode::Text(prev)) = children.last_mut() {
            prev.push_str(text);
            return;
        }
    }
    children.push(node);
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn next_token(&mut self) -> Option<Token> {
        loop {
            let rest = &self.input[self.pos..];
            if rest.is_empty() {
                return None;
            }

            if let Some(body) = rest.strip_prefix("<!--") {
                self.pos += body.find("-->").map_or(rest.len(), |i| i + 7);
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos += rest.find('>').map_or(rest.len(), |i| i + 1);
                continue;
            }
            if rest.starts_with("</") {
                if let Some(end) = rest.find('>') {
                    let name = rest[2..end].trim().to_ascii_lowercase();
                    self.pos += end + 1;
                    return Some(Token::Close(name));
                }
            }
            if rest.len() > 1 && rest.as_bytes()[0] == b'<' && rest.as_bytes()[1].is_ascii_alphabetic() {
                if let Some((token, consumed)) = open_tag(rest) {
                    self.pos += consumed;
                    return Some(token);
                }
            }

            // Text runs to the next '<' after the first character, so a '<'
            // that did not start a tag is kept as literal text.
            let first = rest.chars().next().map_or(1, char::len_utf8);
            let end = rest[first..].find('<').map_or(rest.len(), |i| i + first);
            self.pos += end;
            return Some(Token::Text(decode_entities(&rest[..end])));
        }
    }
}

/// Parses an open tag at the start of `rest`. Returns the token and the number
/// of bytes consumed, or `None` if the tag is not terminated.
fn open_tag(rest: &str) -> Option<(Token, usize)> {
    let bytes = rest.as_bytes();
    let mut i = 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let tag = rest[1..i].to_ascii_lowercase();
    let mut attributes: Vec<(String, String)> = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        match bytes[i] {
            b'>' => {
                let token = Token::Open {
                    tag,
                    attributes,
                    self_closing: false,
                };
                return Some((token, i + 1));
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                let token = Token::Open {
                    tag,
                    attributes,
                    self_closing: true,
                };
                return Some((token, i + 2));
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = rest[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            if bytes[i] == b'"' || bytes[i] == b'\'' {
                let quote = bytes[i];
                let value_start = i + 1;
                let len = bytes[value_start..].iter().position(|&b| b == quote)?;
                value = decode_entities(&rest[value_start..value_start + len]);
                i = value_start + len + 1;
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = decode_entities(&rest[value_start..i]);
            }
        }

        // First occurrence wins, as in HTML.
        if !attributes.iter().any(|(existing, _)| *existing == name) {
            attributes.push((name, value));
        }
    }
}

/// Decodes the character references this parser understands. Unknown
/// references are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&candidate[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Escapes text content for serialization.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', "&nbsp;")
}

/// Escapes a double-quoted attribute value for serialization.
pub fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\u{a0}', "&nbsp;")
}
