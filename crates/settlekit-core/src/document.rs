//! In-memory DOM the interaction helpers operate on.
//!
//! A [`Document`] is a cheap, cloneable handle over an arena of nodes. Every
//! clone sees the same tree, the same focus state, the same event listeners,
//! and the same [`PendingWork`] tracker, so "application" listeners and the
//! test driving the page observe each other's changes.
//!
//! Locks are held only for the duration of a single read or write and never
//! across an `.await` or while a listener runs.
//!
//! # Example
//!
//! ```
//! use settlekit_core::document::Document;
//!
//! let doc = Document::from_html(r#"<form><input id="name" value="old"></form>"#);
//! let input = doc.query_selector("#name").unwrap().expect("input exists");
//! assert_eq!(input.tag_name(), "input");
//! assert_eq!(input.attribute("value").as_deref(), Some("old"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::DomError;
use crate::events::{DomEvent, EventListener};
use crate::markup::{self, MarkupNode};
use crate::selector::{Matchable, SelectorList};
use crate::settled::PendingWork;

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug)]
enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    /// Value set through the value property, overriding the default value
    /// derived from markup.
    dirty_value: Option<String>,
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

type ListenerEntry = (u64, String, Arc<dyn EventListener>);

struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    active: Option<NodeId>,
    listeners: HashMap<NodeId, Vec<ListenerEntry>>,
    next_listener_id: u64,
    event_log: Vec<DomEvent>,
}

impl Tree {
    fn new() -> Self {
        let root = Node {
            data: NodeData::Element(ElementData {
                tag: "body".to_string(),
                attributes: Vec::new(),
                dirty_value: None,
            }),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            active: None,
            listeners: HashMap::new(),
            next_listener_id: 0,
            event_log: Vec::new(),
        }
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Element(data)) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.data) {
            Some(NodeData::Element(data)) => Some(data),
            _ => None,
        }
    }

    fn push(&mut self, data: NodeData, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn append_markup(&mut self, parent: NodeId, nodes: Vec<MarkupNode>) {
        for node in nodes {
            match node {
                MarkupNode::Text(text) => {
                    self.push(NodeData::Text(text), parent);
                }
                MarkupNode::Element {
                    tag,
                    attributes,
                    children,
                } => {
                    let data = NodeData::Element(ElementData {
                        tag,
                        attributes,
                        dirty_value: None,
                    });
                    let id = self.push(data, parent);
                    self.append_markup(id, children);
                }
            }
        }
    }

    fn detach_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
        if let Some(active) = self.active {
            if !self.is_connected(active) {
                self.active = None;
            }
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.nodes.get(node.0).and_then(|n| n.parent);
        }
        false
    }

    fn text_content(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(_) => {
                for child in &self.nodes[id.0].children {
                    self.text_content(*child, out);
                }
            }
        }
    }

    fn serialize_children(&self, id: NodeId, out: &mut String) {
        for child in &self.nodes[id.0].children {
            self.serialize(*child, out);
        }
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => out.push_str(&markup::escape_text(text)),
            NodeData::Element(data) => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&markup::escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if markup::is_void_element(&data.tag) {
                    return;
                }
                self.serialize_children(id, out);
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }

    /// Elements in document order below (not including) `id`.
    fn descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[id.0].children {
            if self.element(*child).is_some() {
                out.push(*child);
                self.descendants(*child, out);
            }
        }
    }
}

/// Borrowed view of one element used for selector matching.
#[derive(Clone, Copy)]
struct NodeView<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> Matchable for NodeView<'a> {
    fn tag_name(&self) -> &str {
        self.tree.element(self.id).map_or("", |e| e.tag.as_str())
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.tree.element(self.id).and_then(|e| {
            e.attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        })
    }

    fn parent_element(&self) -> Option<Self> {
        let parent = self.tree.nodes[self.id.0].parent?;
        self.tree.element(parent).map(|_| NodeView {
            tree: self.tree,
            id: parent,
        })
    }
}

/// Shared handle to an in-memory document.
#[derive(Clone)]
pub struct Document {
    tree: Arc<RwLock<Tree>>,
    pending: PendingWork,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree.read();
        f.debug_struct("Document")
            .field("nodes", &tree.nodes.len())
            .field("active", &tree.active)
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document with an empty `body` root.
    pub fn new() -> Self {
        Self {
            tree: Arc::new(RwLock::new(Tree::new())),
            pending: PendingWork::new(),
        }
    }

    /// Creates a document whose `body` holds the parsed `html` fragment.
    pub fn from_html(html: &str) -> Self {
        let doc = Self::new();
        {
            let mut tree = doc.tree.write();
            let root = tree.root;
            tree.append_markup(root, markup::parse_fragment(html));
        }
        doc
    }

    /// The `body` root element.
    pub fn body(&self) -> ElementRef {
        let root = self.tree.read().root;
        self.element_unchecked(root)
    }

    /// Returns a reference to `id` if it names an element of this document.
    pub fn element(&self, id: NodeId) -> Option<ElementRef> {
        self.tree
            .read()
            .element(id)
            .map(|_| self.element_unchecked(id))
    }

    fn element_unchecked(&self, id: NodeId) -> ElementRef {
        ElementRef {
            document: self.clone(),
            id,
        }
    }

    /// The pending-work tracker shared by everything attached to this document.
    pub fn pending(&self) -> &PendingWork {
        &self.pending
    }

    /// Returns true if both handles point at the same document.
    pub fn same_document(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree)
    }

    /// First connected element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, DomError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// All connected elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, DomError> {
        let list = SelectorList::parse(selector)?;
        let tree = self.tree.read();
        let mut candidates = Vec::new();
        tree.descendants(tree.root, &mut candidates);
        Ok(candidates
            .into_iter()
            .filter(|id| list.matches(&NodeView { tree: &tree, id: *id }))
            .map(|id| self.element_unchecked(id))
            .collect())
    }

    /// The element with the given `id` attribute, if connected.
    pub fn get_element_by_id(&self, id: &str) -> Option<ElementRef> {
        let tree = self.tree.read();
        let mut candidates = Vec::new();
        tree.descendants(tree.root, &mut candidates);
        candidates
            .into_iter()
            .find(|node| {
                NodeView { tree: &tree, id: *node }.attribute("id") == Some(id)
            })
            .map(|node| self.element_unchecked(node))
    }

    /// The currently focused element, if any.
    pub fn active_element(&self) -> Option<ElementRef> {
        let active = self.tree.read().active;
        active.map(|id| self.element_unchecked(id))
    }

    pub(crate) fn set_active(&self, id: Option<NodeId>) {
        self.tree.write().active = id;
    }

    /// Registers `listener` for `event_type` events targeted at (or bubbling
    /// through) `element`.
    ///
    /// The document owns the listener. A listener that captures this
    /// document or one of its elements keeps the tree alive until it is
    /// removed through the returned handle or [`clear_listeners`](Self::clear_listeners).
    pub fn add_event_listener(
        &self,
        element: &ElementRef,
        event_type: impl Into<String>,
        listener: impl EventListener + 'static,
    ) -> ListenerHandle {
        let mut tree = self.tree.write();
        let id = tree.next_listener_id;
        tree.next_listener_id += 1;
        tree.listeners
            .entry(element.id)
            .or_default()
            .push((id, event_type.into(), Arc::new(listener)));
        ListenerHandle {
            tree: Arc::downgrade(&self.tree),
            node: element.id,
            id,
        }
    }

    /// Removes every registered listener.
    pub fn clear_listeners(&self) {
        self.tree.write().listeners.clear();
    }

    /// Number of listeners registered on `element`.
    pub fn listener_count(&self, element: &ElementRef) -> usize {
        self.tree.read().listeners.get(&element.id).map_or(0, Vec::len)
    }

    /// Every event dispatched on this document, oldest first.
    pub fn event_log(&self) -> Vec<DomEvent> {
        self.tree.read().event_log.clone()
    }

    /// Forgets all recorded events.
    pub fn clear_event_log(&self) {
        self.tree.write().event_log.clear();
    }

    pub(crate) fn record_event(&self, event: DomEvent) {
        self.tree.write().event_log.push(event);
    }

    /// Propagation path for an event on `target`: the target itself, then its
    /// ancestors when `bubbles` is set.
    pub(crate) fn propagation_path(&self, target: NodeId, bubbles: bool) -> Vec<NodeId> {
        let tree = self.tree.read();
        let mut path = vec![target];
        if bubbles {
            let mut current = tree.nodes[target.0].parent;
            while let Some(id) = current {
                path.push(id);
                current = tree.nodes[id.0].parent;
            }
        }
        path
    }

    /// Listeners for `event_type` along `path`, in invocation order.
    pub(crate) fn listeners_for(&self, path: &[NodeId], event_type: &str) -> Vec<Arc<dyn EventListener>> {
        let tree = self.tree.read();
        path.iter()
            .filter_map(|id| tree.listeners.get(id))
            .flat_map(|entries| entries.iter())
            .filter(|(_, ty, _)| ty == event_type)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect()
    }
}

/// Handle for removing a listener added with [`Document::add_event_listener`].
#[derive(Debug)]
pub struct ListenerHandle {
    tree: Weak<RwLock<Tree>>,
    node: NodeId,
    id: u64,
}

impl ListenerHandle {
    /// Removes the listener. Does nothing if the document is gone.
    pub fn remove(self) {
        let Some(tree) = self.tree.upgrade() else {
            return;
        };
        let mut tree = tree.write();
        if let Some(list) = tree.listeners.get_mut(&self.node) {
            list.retain(|(id, _, _)| *id != self.id);
            if list.is_empty() {
                tree.listeners.remove(&self.node);
            }
        }
    }
}

/// A reference to one element of a [`Document`].
///
/// Holding an `ElementRef` keeps the document alive but not the element's
/// place in it: after its subtree is replaced the reference reports
/// [`is_connected`](Self::is_connected) as false.
#[derive(Clone)]
pub struct ElementRef {
    document: Document,
    id: NodeId,
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("description", &self.description())
            .finish()
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.document.same_document(&other.document)
    }
}

impl Eq for ElementRef {}

impl ElementRef {
    /// Arena index of this element.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The owning document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Lowercase tag name.
    pub fn tag_name(&self) -> String {
        let tree = self.document.tree.read();
        tree.element(self.id).map(|e| e.tag.clone()).unwrap_or_default()
    }

    /// Attribute value, if present.
    pub fn attribute(&self, name: &str) -> Option<String> {
        let tree = self.document.tree.read();
        NodeView { tree: &tree, id: self.id }
            .attribute(name)
            .map(str::to_string)
    }

    /// Returns true if the attribute is present (boolean attributes).
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Sets or replaces an attribute.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let mut tree = self.document.tree.write();
        if let Some(element) = tree.element_mut(self.id) {
            match element.attributes.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => element.attributes.push((name, value.to_string())),
            }
        }
    }

    /// Removes an attribute if present.
    pub fn remove_attribute(&self, name: &str) {
        let name = name.to_ascii_lowercase();
        let mut tree = self.document.tree.write();
        if let Some(element) = tree.element_mut(self.id) {
            element.attributes.retain(|(n, _)| *n != name);
        }
    }

    /// All attributes in source order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        let tree = self.document.tree.read();
        tree.element(self.id)
            .map(|e| e.attributes.clone())
            .unwrap_or_default()
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> Vec<String> {
        self.attribute("class")
            .map(|c| c.split_ascii_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let tree = self.document.tree.read();
        let mut out = String::new();
        tree.text_content(self.id, &mut out);
        out
    }

    /// Serialized markup of this element's children.
    pub fn inner_html(&self) -> String {
        let tree = self.document.tree.read();
        let mut out = String::new();
        tree.serialize_children(self.id, &mut out);
        out
    }

    /// Replaces this element's children with `html` parsed as markup.
    ///
    /// The markup is used as given. Nothing is escaped, so callers that pass
    /// untrusted text get whatever elements it describes.
    pub fn set_inner_html(&self, html: &str) {
        let nodes = markup::parse_fragment(html);
        let mut tree = self.document.tree.write();
        tree.detach_children(self.id);
        tree.append_markup(self.id, nodes);
    }

    /// Returns true while the element is attached under the document root.
    pub fn is_connected(&self) -> bool {
        self.document.tree.read().is_connected(self.id)
    }

    /// The parent element, if any.
    pub fn parent(&self) -> Option<ElementRef> {
        let parent = self.document.tree.read().nodes[self.id.0].parent?;
        Some(self.document.element_unchecked(parent))
    }

    /// Child elements (text nodes skipped).
    pub fn children(&self) -> Vec<ElementRef> {
        let tree = self.document.tree.read();
        tree.nodes[self.id.0]
            .children
            .iter()
            .filter(|id| tree.element(**id).is_some())
            .map(|id| self.document.element_unchecked(*id))
            .collect()
    }

    /// This element followed by its ancestors, nearest first.
    pub fn ancestors_inclusive(&self) -> Vec<ElementRef> {
        let mut out = vec![self.clone()];
        let mut current = self.parent();
        while let Some(element) = current {
            current = element.parent();
            out.push(element);
        }
        out
    }

    /// All descendant elements in document order.
    pub fn descendants(&self) -> Vec<ElementRef> {
        let tree = self.document.tree.read();
        let mut ids = Vec::new();
        tree.descendants(self.id, &mut ids);
        ids.into_iter()
            .map(|id| self.document.element_unchecked(id))
            .collect()
    }

    /// Human-readable description: `tag#id.class1.class2`.
    pub fn description(&self) -> String {
        let mut description = self.tag_name();
        if let Some(id) = self.attribute("id").filter(|id| !id.is_empty()) {
            description.push('#');
            description.push_str(&id);
        }
        for class in self.classes() {
            description.push('.');
            description.push_str(&class);
        }
        description
    }

    pub(crate) fn dirty_value(&self) -> Option<String> {
        let tree = self.document.tree.read();
        tree.element(self.id).and_then(|e| e.dirty_value.clone())
    }

    pub(crate) fn set_dirty_value(&self, value: Option<String>) {
        let mut tree = self.document.tree.write();
        if let Some(element) = tree.element_mut(self.id) {
            element.dirty_value = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"
        <form id="signup" class="card wide">
          <label for="email">Email</label>
          <input id="email" type="email" value="a@b.c">
          <div class="row"><span>one</span><span>two</span></div>
        </form>
    "#;

    #[test]
    fn builds_tree_under_body() {
        let doc = Document::from_html(FORM);
        let form = doc.query_selector("form").unwrap().unwrap();
        assert_eq!(form.parent().unwrap(), doc.body());
        assert_eq!(form.children().len(), 3);
    }

    #[test]
    fn query_selector_all_is_in_document_order() {
        let doc = Document::from_html(FORM);
        let spans = doc.query_selector_all(".row span").unwrap();
        let texts: Vec<String> = spans.iter().map(|s| s.text_content()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let doc = Document::from_html(FORM);
        assert!(doc.query_selector("input:checked").is_err());
    }

    #[test]
    fn description_includes_id_and_classes() {
        let doc = Document::from_html(FORM);
        let form = doc.get_element_by_id("signup").unwrap();
        assert_eq!(form.description(), "form#signup.card.wide");
    }

    #[test]
    fn set_inner_html_replaces_and_detaches_children() {
        let doc = Document::from_html(r#"<div id="host"><p id="old">x</p></div>"#);
        let host = doc.get_element_by_id("host").unwrap();
        let old = doc.get_element_by_id("old").unwrap();

        host.set_inner_html("<b>hi</b>");

        assert!(!old.is_connected());
        assert!(doc.get_element_by_id("old").is_none());
        assert_eq!(host.inner_html(), "<b>hi</b>");
        assert_eq!(host.text_content(), "hi");
        assert_eq!(host.children()[0].tag_name(), "b");
    }

    #[test]
    fn serialization_escapes_text_and_attributes() {
        let doc = Document::from_html(r#"<p title="a &quot;q&quot;">1 &lt; 2</p>"#);
        assert_eq!(doc.body().inner_html(), r#"<p title="a &quot;q&quot;">1 &lt; 2</p>"#);
    }

    #[test]
    fn attribute_updates() {
        let doc = Document::from_html(r#"<input id="x">"#);
        let input = doc.get_element_by_id("x").unwrap();
        input.set_attribute("DISABLED", "");
        assert!(input.has_attribute("disabled"));
        input.remove_attribute("disabled");
        assert!(!input.has_attribute("disabled"));
    }

    #[test]
    fn replacing_focused_subtree_clears_focus() {
        let doc = Document::from_html(r#"<div id="host"><input id="x"></div><input id="y">"#);
        let host = doc.get_element_by_id("host").unwrap();
        let x = doc.get_element_by_id("x").unwrap();
        let y = doc.get_element_by_id("y").unwrap();

        doc.set_active(Some(y.id()));
        host.set_inner_html("<b>kept focus elsewhere</b>");
        assert_eq!(doc.active_element(), Some(y));

        doc.set_active(Some(x.id()));
        host.set_inner_html("");
        assert!(!x.is_connected());
        assert!(doc.active_element().is_none());
    }

    #[test]
    fn removed_listener_is_not_invoked() {
        let doc = Document::from_html(r#"<input id="x">"#);
        let input = doc.get_element_by_id("x").unwrap();
        let first = doc.add_event_listener(&input, "input", |_: &DomEvent, _: &Document| {});
        doc.add_event_listener(&input, "input", |_: &DomEvent, _: &Document| {});
        assert_eq!(doc.listeners_for(&[input.id()], "input").len(), 2);

        first.remove();

        assert_eq!(doc.listener_count(&input), 1);
        assert_eq!(doc.listeners_for(&[input.id()], "input").len(), 1);
    }

    #[test]
    fn removing_self_referencing_listener_frees_the_document() {
        let doc = Document::from_html(r#"<input id="x">"#);
        let input = doc.get_element_by_id("x").unwrap();
        let captured = input.clone();
        let handle = doc.add_event_listener(&input, "change", move |_: &DomEvent, _: &Document| {
            captured.set_attribute("data-seen", "");
        });
        let tree = Arc::downgrade(&doc.tree);

        handle.remove();
        drop(input);
        drop(doc);

        assert!(tree.upgrade().is_none());
    }

    #[test]
    fn clear_listeners_frees_the_document() {
        let doc = Document::from_html(r#"<input id="x">"#);
        let input = doc.get_element_by_id("x").unwrap();
        let owner = doc.clone();
        doc.add_event_listener(&input, "input", move |_: &DomEvent, _: &Document| {
            let _ = owner.active_element();
        });
        let tree = Arc::downgrade(&doc.tree);

        doc.clear_listeners();
        assert_eq!(doc.listener_count(&input), 0);
        drop(input);
        drop(doc);

        assert!(tree.upgrade().is_none());
    }

    #[test]
    fn clones_share_state() {
        let doc = Document::from_html(r#"<input id="x">"#);
        let other = doc.clone();
        assert!(doc.same_document(&other));
        let input = other.get_element_by_id("x").unwrap();
        doc.set_active(Some(input.id()));
        assert_eq!(other.active_element(), Some(input));
    }
}
