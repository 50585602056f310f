//! Targets and how they resolve to elements.
//!
//! A [`Target`] is what a test hands to an interaction helper: an element it
//! already holds, a CSS selector, or an [`ElementDescriptor`] that knows how
//! to find its element. [`ElementResolver`] turns a target into a live
//! element.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{Document, ElementRef, NodeId};
use crate::error::DomError;

/// Finds an element in a document and describes itself for error messages.
pub trait ElementDescriptor: Send + Sync {
    /// The element this descriptor refers to, if present.
    fn resolve(&self, document: &Document) -> Option<NodeId>;

    /// Human-readable description used in error messages.
    fn description(&self) -> String;
}

/// What an interaction helper acts on.
#[derive(Clone)]
pub enum Target {
    /// A concrete element.
    Element(ElementRef),
    /// A CSS selector, resolved to the first match.
    Selector(String),
    /// A descriptor object.
    Descriptor(Arc<dyn ElementDescriptor>),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Element(element) => f.debug_tuple("Element").field(element).finish(),
            Target::Selector(selector) => f.debug_tuple("Selector").field(selector).finish(),
            Target::Descriptor(descriptor) => f
                .debug_tuple("Descriptor")
                .field(&descriptor.description())
                .finish(),
        }
    }
}

impl Target {
    /// A selector target.
    pub fn selector(selector: impl Into<String>) -> Self {
        Target::Selector(selector.into())
    }

    /// A target that finds a form control by its `<label>` text.
    pub fn label(text: impl Into<String>) -> Self {
        Target::Descriptor(Arc::new(LabelDescriptor::new(text)))
    }

    /// A blank selector counts as no target at all.
    pub fn is_missing(&self) -> bool {
        matches!(self, Target::Selector(selector) if selector.trim().is_empty())
    }

    /// Human-readable description of the target.
    pub fn description(&self) -> String {
        match self {
            Target::Element(element) => element.description(),
            Target::Selector(selector) => selector.clone(),
            Target::Descriptor(descriptor) => descriptor.description(),
        }
    }
}

impl From<ElementRef> for Target {
    fn from(element: ElementRef) -> Self {
        Target::Element(element)
    }
}

impl From<&ElementRef> for Target {
    fn from(element: &ElementRef) -> Self {
        Target::Element(element.clone())
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Target::Selector(selector)
    }
}

/// Description of a possibly absent target.
pub fn describe_optional(target: Option<&Target>) -> String {
    target.map_or_else(|| "<no target>".to_string(), Target::description)
}

/// Finds the form control labelled with the given text.
///
/// Matches a `<label>` whose whitespace-collapsed text equals the wanted
/// text, then follows its `for` attribute, or falls back to the first
/// input, textarea, or select nested inside the label.
#[derive(Debug, Clone)]
pub struct LabelDescriptor {
    text: String,
}

impl LabelDescriptor {
    /// Creates a descriptor for the label `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ElementDescriptor for LabelDescriptor {
    fn resolve(&self, document: &Document) -> Option<NodeId> {
        let wanted = collapse(&self.text);
        let labels = document.query_selector_all("label").ok()?;
        labels
            .iter()
            .filter(|label| collapse(&label.text_content()) == wanted)
            .find_map(|label| {
                if let Some(id) = label.attribute("for") {
                    return document.get_element_by_id(&id);
                }
                label
                    .descendants()
                    .into_iter()
                    .find(|e| matches!(e.tag_name().as_str(), "input" | "textarea" | "select"))
            })
            .map(|element| element.id())
    }

    fn description(&self) -> String {
        format!("label \"{}\"", self.text)
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Maps a [`Target`] to a live element.
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolves `target`. `Ok(None)` means nothing matched; errors are
    /// reserved for targets that cannot be evaluated at all.
    async fn resolve(&self, target: &Target) -> Result<Option<ElementRef>, DomError>;
}

/// [`ElementResolver`] over a [`Document`].
///
/// Element targets resolve only while connected to this document.
#[derive(Debug, Clone)]
pub struct DocumentResolver {
    document: Document,
}

impl DocumentResolver {
    /// Creates a resolver for `document`.
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

#[async_trait]
impl ElementResolver for DocumentResolver {
    async fn resolve(&self, target: &Target) -> Result<Option<ElementRef>, DomError> {
        match target {
            Target::Element(element) => Ok((element.document().same_document(&self.document)
                && element.is_connected())
            .then(|| element.clone())),
            Target::Selector(selector) => self.document.query_selector(selector),
            Target::Descriptor(descriptor) => Ok(descriptor
                .resolve(&self.document)
                .and_then(|id| self.document.element(id))
                .filter(ElementRef::is_connected)),
        }
    }
}
