//! Wire selector DSL
//!
//! Servers address nodes with JSON selectors of the form
//! `{"selector_type": ..., "selector_value": ...}`. Two closed families:
//! single selectors resolve to one node (or parsed markup), collection
//! selectors resolve to a node list. Unknown types fail decoding instead of
//! being looked up in a dispatch map at apply time.

use serde::{Deserialize, Serialize};

use ego_tree::NodeId;

use crate::error::{EngineError, EngineResult};
use crate::page::Page;
use crate::xpath::XPath;

/// Selector resolving to a single node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "selector_type", content = "selector_value", rename_all = "snake_case")]
pub enum SingleSelector {
    /// Element with the given `id` attribute.
    Id(String),
    /// Markup parsed into a fresh node, not part of the document. Usable as
    /// content for insertion or replacement, never as a mutation target.
    FromString(String),
    /// First match of an XPath expression.
    Xpath(String),
    /// First node of a collection.
    FirstElement(Box<CollectionSelector>),
    /// Last node of a collection.
    LastElement(Box<CollectionSelector>),
    /// The node bound by the enclosing `ForEach` iteration.
    IterationPlaceholder,
}

/// Selector resolving to a list of nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "selector_type", content = "selector_value", rename_all = "snake_case")]
pub enum CollectionSelector {
    /// All matches of an XPath expression, in document order.
    Xpath(String),
    /// All matches of a CSS selector, in document order.
    Query(String),
    /// Element children of a single node.
    Children(Box<SingleSelector>),
}

/// What a single selector resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A live node in the document.
    Node(NodeId),
    /// Markup from a `from_string` selector, not yet in the document.
    Markup(String),
}

impl SingleSelector {
    /// Resolve against a page. `placeholder` is the node bound by the
    /// enclosing `ForEach` iteration, if any.
    pub fn resolve(&self, page: &Page, placeholder: Option<NodeId>) -> EngineResult<Resolved> {
        match self {
            SingleSelector::Id(id) => page
                .element_by_id(id)
                .map(Resolved::Node)
                .ok_or(EngineError::NoMatch),
            SingleSelector::FromString(html) => Ok(Resolved::Markup(html.clone())),
            SingleSelector::Xpath(expr) => XPath::parse(expr)?
                .select_first(page, page.document_root())
                .map(Resolved::Node)
                .ok_or(EngineError::NoMatch),
            SingleSelector::FirstElement(coll) => coll
                .resolve(page, placeholder)?
                .into_iter()
                .next()
                .map(Resolved::Node)
                .ok_or(EngineError::NoMatch),
            SingleSelector::LastElement(coll) => coll
                .resolve(page, placeholder)?
                .into_iter()
                .last()
                .map(Resolved::Node)
                .ok_or(EngineError::NoMatch),
            SingleSelector::IterationPlaceholder => placeholder
                .map(Resolved::Node)
                .ok_or(EngineError::UnboundPlaceholder),
        }
    }

    /// Resolve to a live node, rejecting `from_string` content. Mutation
    /// targets must already be part of the document.
    pub fn resolve_node(&self, page: &Page, placeholder: Option<NodeId>) -> EngineResult<NodeId> {
        match self.resolve(page, placeholder)? {
            Resolved::Node(id) => Ok(id),
            Resolved::Markup(_) => Err(EngineError::InvalidTarget),
        }
    }

    /// Whether this selector (transitively) references the iteration
    /// placeholder.
    pub fn uses_placeholder(&self) -> bool {
        match self {
            SingleSelector::IterationPlaceholder => true,
            SingleSelector::FirstElement(c) | SingleSelector::LastElement(c) => {
                c.uses_placeholder()
            }
            _ => false,
        }
    }
}

impl CollectionSelector {
    /// Resolve against a page, in document order.
    pub fn resolve(&self, page: &Page, placeholder: Option<NodeId>) -> EngineResult<Vec<NodeId>> {
        match self {
            CollectionSelector::Xpath(expr) => {
                Ok(XPath::parse(expr)?.select(page, page.document_root()))
            }
            CollectionSelector::Query(css) => page.query(css),
            CollectionSelector::Children(single) => {
                let parent = single.resolve_node(page, placeholder)?;
                Ok(page.child_elements(parent))
            }
        }
    }

    pub fn uses_placeholder(&self) -> bool {
        match self {
            CollectionSelector::Children(single) => single.uses_placeholder(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div id="main"><p>intro</p></div>
        <ul id="list"><li>one</li><li>two</li><li>three</li></ul>
    </body></html>"#;

    #[test]
    fn test_decode_id_selector() {
        let sel: SingleSelector =
            serde_json::from_str(r#"{"selector_type":"id","selector_value":"main"}"#).unwrap();
        assert_eq!(sel, SingleSelector::Id("main".to_string()));
    }

    #[test]
    fn test_decode_nested_first_element() {
        let sel: SingleSelector = serde_json::from_str(
            r##"{"selector_type":"first_element",
                "selector_value":{"selector_type":"query","selector_value":"#list li"}}"##,
        )
        .unwrap();
        let page = Page::parse(PAGE);
        let Resolved::Node(id) = sel.resolve(&page, None).unwrap() else {
            panic!("expected a node");
        };
        assert_eq!(page.text(id), "one");
    }

    #[test]
    fn test_decode_unknown_type_fails() {
        let err = serde_json::from_str::<SingleSelector>(
            r#"{"selector_type":"nth","selector_value":3}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_resolve_xpath_single_takes_first() {
        let page = Page::parse(PAGE);
        let sel = SingleSelector::Xpath("//li".to_string());
        let Resolved::Node(id) = sel.resolve(&page, None).unwrap() else {
            panic!("expected a node");
        };
        assert_eq!(page.text(id), "one");
    }

    #[test]
    fn test_resolve_last_element() {
        let page = Page::parse(PAGE);
        let sel = SingleSelector::LastElement(Box::new(CollectionSelector::Xpath(
            "//li".to_string(),
        )));
        let Resolved::Node(id) = sel.resolve(&page, None).unwrap() else {
            panic!("expected a node");
        };
        assert_eq!(page.text(id), "three");
    }

    #[test]
    fn test_resolve_children() {
        let page = Page::parse(PAGE);
        let sel = CollectionSelector::Children(Box::new(SingleSelector::Id("list".to_string())));
        let ids = sel.resolve(&page, None).unwrap();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_from_string_rejected_as_target() {
        let page = Page::parse(PAGE);
        let sel = SingleSelector::FromString("<p>x</p>".to_string());
        assert!(matches!(
            sel.resolve_node(&page, None),
            Err(EngineError::InvalidTarget)
        ));
    }

    #[test]
    fn test_placeholder_binding() {
        let page = Page::parse(PAGE);
        let li = page.query("#list li").unwrap()[1];
        let sel = SingleSelector::IterationPlaceholder;
        assert!(matches!(
            sel.resolve(&page, None),
            Err(EngineError::UnboundPlaceholder)
        ));
        assert_eq!(sel.resolve(&page, Some(li)).unwrap(), Resolved::Node(li));
    }

    #[test]
    fn test_no_match_is_reported() {
        let page = Page::parse(PAGE);
        let sel = SingleSelector::Id("missing".to_string());
        assert!(matches!(sel.resolve(&page, None), Err(EngineError::NoMatch)));
    }

    #[test]
    fn test_uses_placeholder_transitively() {
        let sel = SingleSelector::FirstElement(Box::new(CollectionSelector::Children(Box::new(
            SingleSelector::IterationPlaceholder,
        ))));
        assert!(sel.uses_placeholder());
        assert!(!SingleSelector::Id("x".to_string()).uses_placeholder());
    }

    #[test]
    fn test_placeholder_encodes_without_value() {
        let json = serde_json::to_value(SingleSelector::IterationPlaceholder).unwrap();
        assert_eq!(json["selector_type"], "iteration_placeholder");
        // Round-trips with or without an explicit null value.
        let back: SingleSelector = serde_json::from_value(json).unwrap();
        assert_eq!(back, SingleSelector::IterationPlaceholder);
        let back: SingleSelector = serde_json::from_str(
            r#"{"selector_type":"iteration_placeholder","selector_value":null}"#,
        )
        .unwrap();
        assert_eq!(back, SingleSelector::IterationPlaceholder);
    }
}
