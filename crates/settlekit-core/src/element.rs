//! Serializable element snapshots.
//!
//! [`ElementSnapshot`] captures what a test usually wants to assert on after
//! an interaction: identity, value, text, and markup. The executor returns
//! snapshots as JSON data and the CLI prints them.

use serde::{Deserialize, Serialize};

use crate::control::{classify, ElementKind, ValueControl};
use crate::document::ElementRef;

/// Point-in-time view of one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Lowercase tag name.
    pub tag: String,

    /// The `id` attribute, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Entries of the `class` attribute.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    /// Human-readable description (`tag#id.class`).
    pub description: String,

    /// Current value, for form controls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Concatenated descendant text.
    pub text: String,

    /// Serialized child markup.
    #[serde(rename = "innerHTML")]
    pub inner_html: String,

    /// Whether this element currently has focus.
    #[serde(default)]
    pub focused: bool,

    /// Attributes in source order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl ElementRef {
    /// Captures the element's current state.
    pub fn snapshot(&self) -> ElementSnapshot {
        let value = match classify(self) {
            ElementKind::Control(control) => Some(control.as_value_control().value()),
            ElementKind::ContentEditable(_) | ElementKind::Unsupported(_) => None,
        };
        ElementSnapshot {
            tag: self.tag_name(),
            id: self.attribute("id"),
            classes: self.classes(),
            description: self.description(),
            value,
            text: self.text_content(),
            inner_html: self.inner_html(),
            focused: self.document().active_element().as_ref() == Some(self),
            attributes: self.attributes(),
        }
    }
}
