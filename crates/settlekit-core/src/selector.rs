//! CSS selector subset used to resolve selector targets.
//!
//! Supported syntax: type and universal selectors, `#id`, `.class`,
//! `[attr]` and `[attr=value]` (value optionally quoted), compound selectors,
//! the descendant (whitespace) and child (`>`) combinators, and selector lists
//! separated by `,`. Anything else is rejected with
//! [`DomError::InvalidSelector`].

use crate::error::DomError;

/// Read access to an element for selector matching.
///
/// Implemented by the document's node views; kept as a trait so matching
/// stays independent of the arena layout.
pub trait Matchable: Sized {
    /// Lowercase tag name.
    fn tag_name(&self) -> &str;
    /// Attribute value, if the attribute is present.
    fn attribute(&self, name: &str) -> Option<&str>;
    /// The parent element, if any.
    fn parent_element(&self) -> Option<Self>;
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    /// Compounds left to right. The combinator stored with each compound
    /// joins it to the compound before it; the first one is unused.
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributeCondition {
    Exists(String),
    Equals(String, String),
}

impl SelectorList {
    /// Parses a selector list.
    pub fn parse(source: &str) -> Result<Self, DomError> {
        let mut parser = Parser {
            source,
            chars: source.char_indices().peekable(),
        };
        let mut selectors = vec![parser.complex()?];
        loop {
            parser.skip_whitespace();
            match parser.chars.next() {
                None => break,
                Some((_, ',')) => selectors.push(parser.complex()?),
                Some((_, c)) => return Err(parser.error(&format!("unexpected '{}'", c))),
            }
        }
        Ok(Self { selectors })
    }

    /// Returns true if `element` matches any selector in the list.
    pub fn matches<E: Matchable + Clone>(&self, element: &E) -> bool {
        self.selectors.iter().any(|selector| selector.matches(element))
    }
}

impl ComplexSelector {
    fn matches<E: Matchable + Clone>(&self, element: &E) -> bool {
        match_from(&self.parts, element.clone())
    }
}

/// Right-to-left match of `parts` ending at `element`.
fn match_from<E: Matchable + Clone>(parts: &[(Combinator, Compound)], element: E) -> bool {
    let Some(((combinator, compound), rest)) = parts.split_last() else {
        return true;
    };
    if !compound.matches(&element) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match combinator {
        Combinator::Child => element
            .parent_element()
            .map_or(false, |parent| match_from(rest, parent)),
        Combinator::Descendant => {
            let mut ancestor = element.parent_element();
            while let Some(candidate) = ancestor {
                if match_from(rest, candidate.clone()) {
                    return true;
                }
                ancestor = candidate.parent_element();
            }
            false
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches<E: Matchable>(&self, element: &E) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && tag != element.tag_name() {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = element.attribute("class").unwrap_or("");
            let has_all = self
                .classes
                .iter()
                .all(|wanted| class_attr.split_ascii_whitespace().any(|c| c == wanted));
            if !has_all {
                return false;
            }
        }
        self.attributes.iter().all(|condition| match condition {
            AttributeCondition::Exists(name) => element.attribute(name).is_some(),
            AttributeCondition::Equals(name, value) => element.attribute(name) == Some(value.as_str()),
        })
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> DomError {
        DomError::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.to_string(),
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
            skipped = true;
        }
        skipped
    }

    fn ident(&mut self) -> Result<String, DomError> {
        let mut ident = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !is_ident_char(c) {
                break;
            }
            ident.push(c);
            self.chars.next();
        }
        if ident.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(ident)
    }

    fn complex(&mut self) -> Result<ComplexSelector, DomError> {
        self.skip_whitespace();
        let mut parts = vec![(Combinator::Descendant, self.compound()?)];
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.chars.peek() {
                None | Some((_, ',')) => break,
                Some((_, '>')) => {
                    self.chars.next();
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_space => Combinator::Descendant,
                Some(&(_, c)) => return Err(self.error(&format!("unexpected '{}'", c))),
            };
            parts.push((combinator, self.compound()?));
        }
        Ok(ComplexSelector { parts })
    }

    fn compound(&mut self) -> Result<Compound, DomError> {
        let mut compound = Compound::default();
        match self.chars.peek() {
            Some((_, '*')) => {
                self.chars.next();
                compound.tag = Some("*".to_string());
            }
            Some(&(_, c)) if is_ident_char(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.chars.peek() {
                Some((_, '#')) => {
                    self.chars.next();
                    compound.id = Some(self.ident()?);
                }
                Some((_, '.')) => {
                    self.chars.next();
                    compound.classes.push(self.ident()?);
                }
                Some((_, '[')) => {
                    self.chars.next();
                    compound.attributes.push(self.attribute_condition()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.error("expected selector"));
        }
        Ok(compound)
    }

    fn attribute_condition(&mut self) -> Result<AttributeCondition, DomError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        match self.chars.next() {
            Some((_, ']')) => Ok(AttributeCondition::Exists(name)),
            Some((_, '=')) => {
                self.skip_whitespace();
                let value = match self.chars.peek() {
                    Some(&(_, quote)) if quote == '"' || quote == '\'' => {
                        self.chars.next();
                        let mut value = String::new();
                        loop {
                            match self.chars.next() {
                                Some((_, c)) if c == quote => break,
                                Some((_, c)) => value.push(c),
                                None => return Err(self.error("unterminated string")),
                            }
                        }
                        value
                    }
                    _ => self.ident()?,
                };
                self.skip_whitespace();
                match self.chars.next() {
                    Some((_, ']')) => Ok(AttributeCondition::Equals(name, value)),
                    _ => Err(self.error("expected ']'")),
                }
            }
            _ => Err(self.error("expected ']' or '='")),
        }
    }
}
