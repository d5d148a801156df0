//! HTML import through `scraper` (html5ever) into the arena document.

use scraper::{ElementRef as HtmlElement, Html};

use super::{Document, NodeId};

pub(super) fn import_document(doc: &mut Document, html: &str) {
    let parsed = Html::parse_document(html);
    let root = doc.root();
    import_element(doc, root, parsed.root_element());
}

/// Fragments come back wrapped in a synthetic `<html>`; only its children are imported.
pub(super) fn import_fragment(doc: &mut Document, parent: NodeId, html: &str) -> Vec<NodeId> {
    let parsed = Html::parse_fragment(html);
    import_children(doc, parent, parsed.root_element())
}

fn import_element(doc: &mut Document, parent: NodeId, source: HtmlElement<'_>) -> NodeId {
    let value = source.value();
    let id = doc.create_element(value.name());
    for (name, attr_value) in value.attrs() {
        doc.set_attribute(id, name, attr_value);
    }
    doc.attach(parent, id);
    import_children(doc, id, source);
    id
}

fn import_children(doc: &mut Document, parent: NodeId, source: HtmlElement<'_>) -> Vec<NodeId> {
    let mut added = Vec::new();
    for child in source.children() {
        if let Some(element) = HtmlElement::wrap(child) {
            added.push(import_element(doc, parent, element));
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            let id = doc.create_text(text);
            doc.attach(parent, id);
            added.push(id);
        }
    }
    added
}
