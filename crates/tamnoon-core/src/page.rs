//! Mutable HTML page model
//!
//! Wraps a parsed `scraper::Html` document and exposes the mutations the
//! sync engine needs: attribute edits, text/markup replacement and node
//! surgery, all addressed by `ego_tree::NodeId`. A detached node keeps its
//! identity, matching `Element.remove()` semantics in a browser.
//!
//! Mutating operations that insert markup return the inserted root nodes so
//! the caller can re-run listener binding over exactly the new content.
//!
//! Form controls carry a value *property* distinct from their `value`
//! attribute; the property lives in an overlay map keyed by node id and
//! reads fall back to the attribute, the same split the DOM has.

use std::collections::HashMap;

use ego_tree::{NodeId, Tree};
use html5ever::{Attribute, QualName};
use scraper::node::{Element, Node, Text};
use scraper::{ElementRef, Html, Selector};

use crate::error::{EngineError, EngineResult};

/// A live HTML document plus the form-control value overlay.
pub struct Page {
    doc: Html,
    values: HashMap<NodeId, String>,
}

impl Page {
    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
            values: HashMap::new(),
        }
    }

    /// Id of the document root node (the node above `<html>`).
    pub fn document_root(&self) -> NodeId {
        self.doc.tree.root().id()
    }

    /// Serialize the document's root element.
    pub fn html(&self) -> String {
        self.doc.root_element().html()
    }

    pub(crate) fn tree(&self) -> &Tree<Node> {
        &self.doc.tree
    }

    /// Whether the id refers to an element node.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.doc
            .tree
            .get(id)
            .map(|n| n.value().is_element())
            .unwrap_or(false)
    }

    /// Tag name of an element node.
    pub fn element_name(&self, id: NodeId) -> Option<String> {
        let node = self.doc.tree.get(id)?;
        node.value().as_element().map(|el| el.name().to_string())
    }

    /// Attribute value, read fresh from the element.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        let node = self.doc.tree.get(id)?;
        node.value()
            .as_element()
            .and_then(|el| el.attr(name))
            .map(str::to_string)
    }

    /// Whitespace-split class attribute tokens.
    pub fn class_tokens(&self, id: NodeId) -> Vec<String> {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Set (or overwrite) an attribute.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> EngineResult<()> {
        self.rebuild_attrs(id, |attrs| {
            if let Some(slot) = attrs.iter_mut().find(|(k, _)| k == name) {
                slot.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        })
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> EngineResult<()> {
        self.rebuild_attrs(id, |attrs| attrs.retain(|(k, _)| k != name))
    }

    /// Toggle an attribute, forced present/absent when `force` is given.
    /// Returns whether the attribute is present afterwards.
    pub fn toggle_attr(&mut self, id: NodeId, name: &str, force: Option<bool>) -> EngineResult<bool> {
        let present = self.attr(id, name).is_some();
        let target = force.unwrap_or(!present);
        if target && !present {
            self.set_attr(id, name, "")?;
        } else if !target && present {
            self.remove_attr(id, name)?;
        }
        Ok(target)
    }

    // Attribute edits replace the whole element value so scraper's lazy
    // id/class caches can never serve stale data to a later CSS query.
    fn rebuild_attrs(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut Vec<(String, String)>),
    ) -> EngineResult<()> {
        let (name, mut attrs) = {
            let node = self.doc.tree.get(id).ok_or(EngineError::MissingNode)?;
            let el = node.value().as_element().ok_or(EngineError::NotAnElement)?;
            let attrs: Vec<(String, String)> = el
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            (el.name.clone(), attrs)
        };

        edit(&mut attrs);

        let attributes: Vec<Attribute> = attrs
            .into_iter()
            .map(|(k, v)| Attribute {
                name: QualName::new(None, "".into(), k.as_str().into()),
                value: v.as_str().into(),
            })
            .collect();

        let mut node = self.doc.tree.get_mut(id).ok_or(EngineError::MissingNode)?;
        *node.value() = Node::Element(Element::new(name, attributes));
        Ok(())
    }

    /// Rendered text content of the subtree under `id`.
    pub fn text(&self, id: NodeId) -> String {
        let Some(node) = self.doc.tree.get(id) else {
            return String::new();
        };
        match ElementRef::wrap(node) {
            Some(el) => el.text().collect(),
            None => node
                .value()
                .as_text()
                .map(|t| t.to_string())
                .unwrap_or_default(),
        }
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> EngineResult<()> {
        if !self.is_element(id) {
            return Err(if self.doc.tree.get(id).is_none() {
                EngineError::MissingNode
            } else {
                EngineError::NotAnElement
            });
        }
        self.clear_children(id)?;
        let mut node = self.doc.tree.get_mut(id).ok_or(EngineError::MissingNode)?;
        node.append(Node::Text(Text { text: text.into() }));
        Ok(())
    }

    /// Outer HTML of an element.
    pub fn outer_html(&self, id: NodeId) -> EngineResult<String> {
        let node = self.doc.tree.get(id).ok_or(EngineError::MissingNode)?;
        let el = ElementRef::wrap(node).ok_or(EngineError::NotAnElement)?;
        Ok(el.html())
    }

    /// Inner HTML of an element.
    pub fn inner_html(&self, id: NodeId) -> EngineResult<String> {
        let node = self.doc.tree.get(id).ok_or(EngineError::MissingNode)?;
        let el = ElementRef::wrap(node).ok_or(EngineError::NotAnElement)?;
        Ok(el.inner_html())
    }

    /// Replace the inner markup of `id`. Returns the inserted root nodes so
    /// the caller can rebind listeners over exactly the new content.
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> EngineResult<Vec<NodeId>> {
        if !self.is_element(id) {
            return Err(if self.doc.tree.get(id).is_none() {
                EngineError::MissingNode
            } else {
                EngineError::NotAnElement
            });
        }
        self.clear_children(id)?;
        let fragment = Html::parse_fragment(html);
        let mut inserted = Vec::new();
        for src in fragment_roots(&fragment) {
            if let Some(new_id) = copy_subtree(&mut self.doc.tree, id, &fragment.tree, src) {
                inserted.push(new_id);
            }
        }
        Ok(inserted)
    }

    /// Detach a node from the document.
    pub fn remove_node(&mut self, id: NodeId) -> EngineResult<()> {
        let mut node = self.doc.tree.get_mut(id).ok_or(EngineError::MissingNode)?;
        node.detach();
        self.values.remove(&id);
        Ok(())
    }

    /// Move an existing node to be the last child of `parent`.
    /// Returns the id of the node in its new position.
    pub fn append_existing(&mut self, parent: NodeId, child: NodeId) -> EngineResult<NodeId> {
        let sub = self.detach_to_tree(child)?;
        copy_subtree(&mut self.doc.tree, parent, &sub, sub.root().id())
            .ok_or(EngineError::MissingNode)
    }

    /// Parse a fragment and append its first node as the last child of
    /// `parent` (the `template.content.firstChild` rule). Returns the
    /// inserted node.
    pub fn append_fragment(&mut self, parent: NodeId, html: &str) -> EngineResult<NodeId> {
        if !self.is_element(parent) {
            return Err(EngineError::MissingNode);
        }
        let fragment = Html::parse_fragment(html.trim());
        let first = fragment_roots(&fragment)
            .into_iter()
            .next()
            .ok_or(EngineError::NoMatch)?;
        copy_subtree(&mut self.doc.tree, parent, &fragment.tree, first)
            .ok_or(EngineError::MissingNode)
    }

    /// Replace `target` with an existing node. Returns the replacement's id
    /// in its new position.
    pub fn replace_with_existing(&mut self, target: NodeId, node: NodeId) -> EngineResult<NodeId> {
        if target == node {
            return Ok(node);
        }
        let sub = self.detach_to_tree(node)?;
        let new_id = copy_subtree_before(&mut self.doc.tree, target, &sub, sub.root().id())
            .ok_or(EngineError::MissingNode)?;
        self.remove_node(target)?;
        Ok(new_id)
    }

    /// Replace `target` with the first node of a parsed fragment. Returns
    /// the inserted node.
    pub fn replace_with_fragment(&mut self, target: NodeId, html: &str) -> EngineResult<NodeId> {
        let fragment = Html::parse_fragment(html.trim());
        let first = fragment_roots(&fragment)
            .into_iter()
            .next()
            .ok_or(EngineError::NoMatch)?;
        let new_id = copy_subtree_before(&mut self.doc.tree, target, &fragment.tree, first)
            .ok_or(EngineError::MissingNode)?;
        self.remove_node(target)?;
        Ok(new_id)
    }

    /// Set the form-control value property (not the attribute).
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        self.values.insert(id, value.to_string());
    }

    /// Form-control value: property overlay first, `value` attribute second.
    pub fn value(&self, id: NodeId) -> Option<String> {
        self.values
            .get(&id)
            .cloned()
            .or_else(|| self.attr(id, "value"))
    }

    /// Element nodes of the subtree rooted at `root`, root included.
    pub fn element_descendants(&self, root: NodeId) -> Vec<NodeId> {
        match self.doc.tree.get(root) {
            Some(node) => node
                .descendants()
                .filter(|d| d.value().is_element())
                .map(|d| d.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Element children of a node, in document order.
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        match self.doc.tree.get(id) {
            Some(node) => node
                .children()
                .filter(|c| c.value().is_element())
                .map(|c| c.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// First element whose `id` attribute equals `value`.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.doc
            .tree
            .root()
            .descendants()
            .find(|n| {
                n.value()
                    .as_element()
                    .and_then(|el| el.attr("id"))
                    .map(|v| v == value)
                    .unwrap_or(false)
            })
            .map(|n| n.id())
    }

    /// All matches of a CSS selector, in document order.
    pub fn query(&self, selector: &str) -> EngineResult<Vec<NodeId>> {
        let sel = Selector::parse(selector)
            .map_err(|e| EngineError::Css(format!("{selector}: {e}")))?;
        Ok(self.doc.select(&sel).map(|el| el.id()).collect())
    }

    fn clear_children(&mut self, id: NodeId) -> EngineResult<()> {
        let children: Vec<NodeId> = self
            .doc
            .tree
            .get(id)
            .ok_or(EngineError::MissingNode)?
            .children()
            .map(|c| c.id())
            .collect();
        for child in children {
            if let Some(mut node) = self.doc.tree.get_mut(child) {
                node.detach();
            }
            self.values.remove(&child);
        }
        Ok(())
    }

    // Lift a subtree out of the document into a standalone tree, detaching
    // the original. Node ids are not preserved across the move.
    fn detach_to_tree(&mut self, id: NodeId) -> EngineResult<Tree<Node>> {
        let root_value = self
            .doc
            .tree
            .get(id)
            .ok_or(EngineError::MissingNode)?
            .value()
            .clone();
        let mut out = Tree::new(root_value);
        let out_root = out.root().id();
        let children: Vec<NodeId> = self
            .doc
            .tree
            .get(id)
            .ok_or(EngineError::MissingNode)?
            .children()
            .map(|c| c.id())
            .collect();
        for child in children {
            copy_subtree(&mut out, out_root, &self.doc.tree, child);
        }
        self.remove_node(id)?;
        Ok(out)
    }
}

/// Top-level content nodes of a parsed fragment. The HTML5 fragment
/// algorithm wraps content in a synthetic `<html>` element; unwrap it.
fn fragment_roots(fragment: &Html) -> Vec<NodeId> {
    let root = fragment.tree.root();
    let children: Vec<_> = root.children().collect();
    if let [only] = children.as_slice() {
        if let Some(el) = only.value().as_element() {
            if el.name() == "html" {
                return only.children().map(|c| c.id()).collect();
            }
        }
    }
    children.iter().map(|c| c.id()).collect()
}

/// Deep-copy `src_id` (from `src`) as the last child of `dest_parent`.
fn copy_subtree(
    dest: &mut Tree<Node>,
    dest_parent: NodeId,
    src: &Tree<Node>,
    src_id: NodeId,
) -> Option<NodeId> {
    let value = src.get(src_id)?.value().clone();
    let new_id = dest.get_mut(dest_parent)?.append(value).id();
    copy_children(dest, new_id, src, src_id);
    Some(new_id)
}

/// Deep-copy `src_id` (from `src`) as the previous sibling of `before`.
fn copy_subtree_before(
    dest: &mut Tree<Node>,
    before: NodeId,
    src: &Tree<Node>,
    src_id: NodeId,
) -> Option<NodeId> {
    let value = src.get(src_id)?.value().clone();
    let new_id = dest.get_mut(before)?.insert_before(value).id();
    copy_children(dest, new_id, src, src_id);
    Some(new_id)
}

fn copy_children(dest: &mut Tree<Node>, dest_parent: NodeId, src: &Tree<Node>, src_id: NodeId) {
    let children: Vec<NodeId> = match src.get(src_id) {
        Some(node) => node.children().map(|c| c.id()).collect(),
        None => return,
    };
    for child in children {
        copy_subtree(dest, dest_parent, src, child);
    }
}
