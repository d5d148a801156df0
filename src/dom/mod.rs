//! In-memory document model standing in for the browser DOM.
//!
//! The engine only needs a narrow slice of the DOM: anchors with resolved hrefs, text
//! content, `closest`/`query_selector`, attributes and classes, inline plus computed
//! style, a `<head>` for the stylesheet, and batches of added nodes. `Document` provides
//! exactly that over an arena of nodes addressed by [`NodeId`].

mod css;
mod parse;
pub mod style;

use smallvec::SmallVec;
use url::Url;

use crate::error::TrailError;

pub use css::SelectorList;
pub use style::InlineStyle;

/// Handle to a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element payload: lowercase tag, attributes, class list and inline style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub(crate) tag: String,
    attrs: Vec<(String, String)>,
    classes: SmallVec<[String; 4]>,
    style: InlineStyle,
}

impl ElementData {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            classes: SmallVec::new(),
            style: InlineStyle::default(),
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn has_attr(&self, name: &str) -> bool {
        match name {
            "class" => !self.classes.is_empty(),
            "style" => !self.style.is_empty(),
            _ => self.attr(name).is_some(),
        }
    }

    pub(crate) fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "class" => {
                self.classes.clear();
                for class in value.split_whitespace() {
                    self.add_class(class);
                }
            }
            "style" => self.style = InlineStyle::parse(value),
            _ => {
                if let Some(slot) = self.attrs.iter_mut().find(|(existing, _)| *existing == name) {
                    slot.1 = value.to_string();
                } else {
                    self.attrs.push((name, value.to_string()));
                }
            }
        }
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|existing| existing == class)
    }

    pub(crate) fn add_class(&mut self, class: &str) -> bool {
        if class.is_empty() || self.has_class(class) {
            return false;
        }
        self.classes.push(class.to_string());
        true
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A batch entry delivered to the mutation observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

/// One page's document plus the page-level context the engine reads.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    url: Option<Url>,
    raw_url: String,
    referrer: Option<String>,
    loaded: bool,
    visible: bool,
    observing: bool,
    mutations: Vec<MutationRecord>,
}

impl Document {
    /// An empty `html > head + body` document located at `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        let mut doc = Self::bare(url);
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.attach(doc.root(), html);
        doc.attach(html, head);
        doc.attach(html, body);
        doc
    }

    /// Parse a full HTML document located at `url`.
    #[must_use]
    pub fn parse(html: &str, url: &str) -> Self {
        let mut doc = Self::bare(url);
        parse::import_document(&mut doc, html);
        doc
    }

    fn bare(url: &str) -> Self {
        let parsed = Url::parse(url)
            .map_err(|err| TrailError::InvalidUrl {
                url: url.to_string(),
                reason: err.to_string(),
            })
            .inspect_err(|err| {
                tracing::warn!(error = %err, "document url does not parse; hrefs stay unresolved");
            })
            .ok();
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            url: parsed,
            raw_url: url.to_string(),
            referrer: None,
            loaded: true,
            visible: true,
            observing: false,
            mutations: Vec::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The document location, serialized the way `location.href` reports it.
    #[must_use]
    pub fn location(&self) -> String {
        self.url
            .as_ref()
            .map_or_else(|| self.raw_url.clone(), ToString::to_string)
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    #[must_use]
    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref().filter(|value| !value.is_empty())
    }

    pub fn set_referrer(&mut self, referrer: Option<&str>) {
        self.referrer = referrer.map(ToString::to_string);
    }

    /// Whether the `load` event has already fired.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        let data = self.element_data(id)?;
        Some(ElementRef {
            doc: self,
            id,
            data,
        })
    }

    fn element_data(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_data_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn first_element_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.element_data(*id).is_some_and(|data| data.tag == tag))
    }

    #[must_use]
    pub fn head(&self) -> Option<NodeId> {
        self.first_element_by_tag("head")
    }

    #[must_use]
    pub fn body(&self) -> Option<NodeId> {
        self.first_element_by_tag("body")
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData::new(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Link `child` under `parent` without producing a mutation record.
    fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || parent.0 >= self.nodes.len() || child.0 >= self.nodes.len() {
            return false;
        }
        if self.is_ancestor_or_self(child, parent) {
            return false;
        }
        if let Some(old_parent) = self.nodes[child.0].parent {
            self.nodes[old_parent.0].children.retain(|id| *id != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        true
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    /// Append `child` to `parent`; returns `false` when the move would create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.attach(parent, child) {
            return false;
        }
        self.record_mutation(parent, vec![child], Vec::new());
        true
    }

    /// Parse an HTML fragment and append its top-level nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        if self.element_data(parent).is_none() && parent != self.root() {
            return Vec::new();
        }
        let added = parse::import_fragment(self, parent, html);
        if !added.is_empty() {
            self.record_mutation(parent, added.clone(), Vec::new());
        }
        added
    }

    /// Detach `id` from its parent.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get(id.0).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
        self.nodes[id.0].parent = None;
        self.record_mutation(parent, Vec::new(), vec![id]);
    }

    /// Whether `id` is reachable from the document root.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_ancestor_or_self(self.root(), id)
    }

    fn record_mutation(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if self.observing && self.is_connected(target) {
            self.mutations.push(MutationRecord {
                target,
                added_nodes: added,
                removed_nodes: removed,
            });
        }
    }

    /// Start recording child-list mutations of the whole document.
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stop recording and drop anything not yet delivered.
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.mutations.clear();
    }

    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.observing
    }

    /// Deliver and clear the pending mutation batch.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// All descendants of `root` in document order, excluding `root` itself.
    #[must_use]
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(root.0) else {
            return out;
        };
        let mut stack: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(id.0) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// `root` itself (if an element) followed by its element descendants matching `selector`.
    #[must_use]
    pub fn select_inclusive(&self, root: NodeId, selector: &SelectorList) -> Vec<NodeId> {
        std::iter::once(root)
            .chain(self.descendants(root))
            .filter(|id| self.element(*id).is_some_and(|el| el.matches(selector)))
            .collect()
    }

    /// Every connected `<a>` element in document order.
    #[must_use]
    pub fn anchors(&self) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.element_data(*id).is_some_and(|data| data.tag == "a"))
            .collect()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(data) = self.element_data_mut(id) {
            data.set_attr(name, value);
        }
    }

    /// Add a class; returns `false` when it was already present.
    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        self.element_data_mut(id)
            .is_some_and(|data| data.add_class(class))
    }

    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(data) = self.element_data_mut(id) {
            data.style.set(name, value);
        }
    }

    /// Append raw text to an element (used for stylesheet bodies).
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if self.element_data(id).is_none() {
            return;
        }
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
        let text_node = self.create_text(text);
        self.attach(id, text_node);
    }
}

/// Borrowed view of one element.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Document,
    id: NodeId,
    data: &'a ElementData,
}

impl<'a> ElementRef<'a> {
    fn data(&self) -> &'a ElementData {
        self.data
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    #[must_use]
    pub fn tag(&self) -> &'a str {
        &self.data().tag
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.data().attr(name)
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.data().has_attr(name)
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.data().has_class(class)
    }

    #[must_use]
    pub fn classes(&self) -> &'a [String] {
        &self.data().classes
    }

    #[must_use]
    pub fn style(&self) -> &'a InlineStyle {
        &self.data().style
    }

    #[must_use]
    pub fn matches(&self, selector: &SelectorList) -> bool {
        selector.matches(self)
    }

    #[must_use]
    pub fn parent_element(&self) -> Option<ElementRef<'a>> {
        let parent = self.doc.nodes[self.id.0].parent?;
        self.doc.element(parent)
    }

    /// Nearest inclusive ancestor matching `selector`.
    #[must_use]
    pub fn closest(&self, selector: &SelectorList) -> Option<ElementRef<'a>> {
        let mut cursor = Some(*self);
        while let Some(element) = cursor {
            if element.matches(selector) {
                return Some(element);
            }
            cursor = element.parent_element();
        }
        None
    }

    /// First descendant element matching `selector` (never `self`).
    #[must_use]
    pub fn query_selector(&self, selector: &SelectorList) -> Option<ElementRef<'a>> {
        self.doc
            .descendants(self.id)
            .into_iter()
            .filter_map(|id| self.doc.element(id))
            .find(|element| element.matches(selector))
    }

    /// Concatenated text of all descendant text nodes, like `textContent`.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.doc
            .descendants(self.id)
            .into_iter()
            .filter_map(|id| match &self.doc.nodes[id.0].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text of the element's immediate text children only.
    #[must_use]
    pub fn direct_text(&self) -> String {
        self.doc.nodes[self.id.0]
            .children
            .iter()
            .filter_map(|id| match &self.doc.nodes[id.0].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The `href` attribute resolved against the document URL, like `HTMLAnchorElement.href`.
    ///
    /// `None` when the attribute is missing, blank, or cannot be resolved.
    #[must_use]
    pub fn href(&self) -> Option<String> {
        let raw = self.attr("href")?.trim();
        if raw.is_empty() {
            return None;
        }
        match Url::parse(raw) {
            Ok(url) => Some(url.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .doc
                .base_url()
                .and_then(|base| base.join(raw).ok())
                .map(|url| url.to_string()),
            Err(err) => {
                tracing::debug!(dom.href = raw, error = %err, "href does not parse");
                None
            }
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.doc.is_connected(self.id)
    }

    /// Declared `background-color`, else the color layer of `background`, else transparent.
    #[must_use]
    pub fn computed_background(&self) -> String {
        let style = self.style();
        style
            .get("background-color")
            .or_else(|| style.get("background").and_then(style::shorthand_color))
            .unwrap_or(style::TRANSPARENT)
            .to_string()
    }

    /// Declared `display`, else the user-agent default for the tag.
    #[must_use]
    pub fn computed_display(&self) -> String {
        self.style()
            .get("display")
            .unwrap_or_else(|| style::default_display(self.tag()))
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(source: &str) -> SelectorList {
        SelectorList::parse(source).expect("selector")
    }

    #[test]
    fn direct_and_full_text_differ_for_rich_children() {
        let doc = Document::parse(
            r#"<body><a id="x" href="/t/1">12<span>New Thread</span></a></body>"#,
            "https://forum.example.com/",
        );
        let anchor = doc
            .anchors()
            .into_iter()
            .next()
            .and_then(|id| doc.element(id))
            .expect("anchor");
        assert_eq!(anchor.direct_text(), "12");
        assert_eq!(anchor.text_content(), "12New Thread");
        assert_eq!(
            anchor.href().as_deref(),
            Some("https://forum.example.com/t/1")
        );
    }

    #[test]
    fn closest_includes_self_and_walks_up() {
        let doc = Document::parse(
            r#"<div class="thread"><h3 class="subject"><a href="/t/2">Topic</a></h3></div>"#,
            "https://forum.example.com/",
        );
        let anchor = doc.element(doc.anchors()[0]).expect("anchor");
        assert_eq!(
            anchor.closest(&selector(".thread")).map(|el| el.tag()),
            Some("div")
        );
        assert_eq!(anchor.closest(&selector("a")).map(|el| el.id()), Some(anchor.id()));
        assert!(anchor.closest(&selector(".missing")).is_none());
    }

    #[test]
    fn mutations_are_recorded_only_while_observing() {
        let mut doc = Document::new("https://forum.example.com/");
        let body = doc.body().expect("body");
        doc.append_html(body, r#"<a href="/t/1">before observe</a>"#);
        assert!(doc.take_mutations().is_empty());

        doc.observe();
        let added = doc.append_html(body, r#"<p><a href="/t/2">one</a></p><a href="/t/3">two</a>"#);
        assert_eq!(added.len(), 2);
        let batch = doc.take_mutations();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].added_nodes, added);
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn detached_nodes_do_not_record_mutations() {
        let mut doc = Document::new("https://forum.example.com/");
        doc.observe();
        let holder = doc.create_element("div");
        let anchor = doc.create_element("a");
        doc.append_child(holder, anchor);
        assert!(doc.take_mutations().is_empty());
        assert!(!doc.is_connected(anchor));
    }

    #[test]
    fn append_child_refuses_cycles() {
        let mut doc = Document::new("https://forum.example.com/");
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        assert!(doc.append_child(outer, inner));
        assert!(!doc.append_child(inner, outer));
    }

    #[test]
    fn unresolvable_hrefs_are_none() {
        let doc = Document::parse(
            r#"<a href="   ">blank</a><a href="http://[::1">broken</a>"#,
            "https://forum.example.com/",
        );
        for id in doc.anchors() {
            assert!(doc.element(id).expect("anchor").href().is_none());
        }
    }
}
