//! CSS selector matching over the arena document.
//!
//! Selector groups are parsed with scraper's selector grammar and matched by the
//! `selectors` engine, so combinators and structural pseudo-classes behave as in a
//! browser. Non-tree pseudo-classes such as `:hover` never parse.

use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    self, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
    NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, SelectorImpl};
use selectors::{Element, NthIndexCache, OpaqueElement};

use super::{ElementRef, NodeId, NodeKind};
use crate::error::{Result, TrailError};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed selector group such as `.thread, h2 > .subject, a[href]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: selectors::SelectorList<Simple>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        selectors::SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
            .map(|selectors| Self {
                source: source.to_string(),
                selectors,
            })
            .map_err(|err| TrailError::InvalidSelector {
                selector: source.to_string(),
                reason: scraper::error::SelectorErrorKind::from(err).to_string(),
            })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn matches(&self, element: &ElementRef<'_>) -> bool {
        let mut nth_index_cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        self.selectors
            .0
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, element, &mut context))
    }
}

impl<'a> ElementRef<'a> {
    fn child_ids(&self) -> &'a [NodeId] {
        &self.doc.nodes[self.id.0].children
    }

    /// Nearest element sibling after (`forward`) or before `self`.
    fn sibling_element(&self, forward: bool) -> Option<ElementRef<'a>> {
        let parent = self.doc.nodes[self.id.0].parent?;
        let siblings = &self.doc.nodes[parent.0].children;
        let position = siblings.iter().position(|id| *id == self.id)?;
        if forward {
            siblings[position + 1..]
                .iter()
                .find_map(|id| self.doc.element(*id))
        } else {
            siblings[..position]
                .iter()
                .rev()
                .find_map(|id| self.doc.element(*id))
        }
    }
}

/// Only tree-structural pseudo-classes can match.
impl Element for ElementRef<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        ElementRef::parent_element(self)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling_element(false)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling_element(true)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.child_ids().iter().find_map(|id| self.doc.element(*id))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &CssLocalName) -> bool {
        self.data.tag == *local_name.0
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag == other.data.tag
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if matches!(ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
            return false;
        }
        let name: &str = &local_name.0;
        match name {
            "class" if !self.data.classes.is_empty() => {
                operation.eval_str(&self.data.classes.join(" "))
            }
            "style" if !self.data.style.is_empty() => {
                operation.eval_str(&self.data.style.to_css())
            }
            _ => self
                .data
                .attr(name)
                .is_some_and(|value| operation.eval_str(value)),
        }
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Simple>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Simple>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.data.tag == "link"
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .classes
            .iter()
            .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self.child_ids().iter().any(|id| {
            matches!(
                self.doc.nodes[id.0].kind,
                NodeKind::Element(_) | NodeKind::Text(_)
            )
        })
    }

    fn is_root(&self) -> bool {
        self.doc.nodes[self.id.0]
            .parent
            .is_some_and(|parent| matches!(self.doc.nodes[parent.0].kind, NodeKind::Document))
    }
}
