//! XPath subset evaluator
//!
//! The server addresses nodes by XPath. The runtime supports the subset the
//! framework actually emits:
//!
//! - child steps (`/html/body/div`) and descendant steps (`//div`,
//!   `//ul//li`); a relative expression is evaluated as a descendant step
//! - name tests and `*`
//! - predicates: position (`[2]`, 1-based), attribute presence
//!   (`[@hidden]`) and attribute equality (`[@id='main']`)
//!
//! Anything outside the subset is a typed parse error, reported up front
//! rather than silently matching nothing. Positional predicates apply
//! within each context node's candidate list.

use std::collections::HashSet;

use ego_tree::NodeId;

use crate::error::{EngineError, EngineResult};
use crate::page::Page;

/// A parsed XPath expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    HasAttr(String),
    AttrEquals(String, String),
}

fn parse_error(expr: &str, reason: impl Into<String>) -> EngineError {
    EngineError::XPath {
        expr: expr.to_string(),
        reason: reason.into(),
    }
}

impl XPath {
    /// Parse an expression, rejecting anything outside the supported subset.
    pub fn parse(expr: &str) -> EngineResult<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(parse_error(expr, "empty expression"));
        }

        let mut rest = trimmed;
        let mut axis = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            Axis::Descendant
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            Axis::Child
        } else {
            // Relative expressions search the whole context subtree.
            Axis::Descendant
        };

        let mut steps = Vec::new();
        loop {
            let (step_text, remainder) = split_step(expr, rest)?;
            steps.push(parse_step(expr, step_text, axis)?);
            match remainder {
                None => break,
                Some((next_axis, r)) => {
                    axis = next_axis;
                    rest = r;
                }
            }
        }
        Ok(Self { steps })
    }

    /// Evaluate against a page, starting at `root`. Results are in document
    /// order, duplicates removed.
    pub fn select(&self, page: &Page, root: NodeId) -> Vec<NodeId> {
        let mut context = vec![root];
        for step in &self.steps {
            let mut next = Vec::new();
            for &ctx in &context {
                let mut candidates: Vec<NodeId> = match step.axis {
                    Axis::Child => page.child_elements(ctx),
                    Axis::Descendant => page
                        .element_descendants(ctx)
                        .into_iter()
                        .filter(|&n| n != ctx)
                        .collect(),
                };
                candidates.retain(|&n| step.test.matches(page, n));
                for pred in &step.predicates {
                    candidates = pred.apply(page, candidates);
                }
                next.extend(candidates);
            }
            dedup_in_order(&mut next);
            context = next;
        }
        context
    }

    /// First match, if any.
    pub fn select_first(&self, page: &Page, root: NodeId) -> Option<NodeId> {
        self.select(page, root).into_iter().next()
    }
}

impl NameTest {
    fn matches(&self, page: &Page, id: NodeId) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Name(name) => page
                .element_name(id)
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false),
        }
    }
}

impl Predicate {
    fn apply(&self, page: &Page, candidates: Vec<NodeId>) -> Vec<NodeId> {
        match self {
            Predicate::Position(n) => candidates.into_iter().nth(n - 1).into_iter().collect(),
            Predicate::HasAttr(name) => candidates
                .into_iter()
                .filter(|&id| page.attr(id, name).is_some())
                .collect(),
            Predicate::AttrEquals(name, value) => candidates
                .into_iter()
                .filter(|&id| page.attr(id, name).as_deref() == Some(value))
                .collect(),
        }
    }
}

// Splits off the leading step, respecting quotes and predicate brackets.
// Returns the step text and, when more steps follow, the axis introduced by
// the separator plus the remaining text.
fn split_step<'a>(
    expr: &str,
    rest: &'a str,
) -> EngineResult<(&'a str, Option<(Axis, &'a str)>)> {
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'[' => depth += 1,
                b']' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| parse_error(expr, "unbalanced ']'"))?;
                }
                b'/' if depth == 0 => {
                    let step = &rest[..i];
                    if step.is_empty() {
                        return Err(parse_error(expr, "empty step"));
                    }
                    let (axis, after) = if rest[i + 1..].starts_with('/') {
                        (Axis::Descendant, &rest[i + 2..])
                    } else {
                        (Axis::Child, &rest[i + 1..])
                    };
                    if after.is_empty() {
                        return Err(parse_error(expr, "trailing slash"));
                    }
                    return Ok((step, Some((axis, after))));
                }
                _ => {}
            },
        }
        i += 1;
    }
    if quote.is_some() {
        return Err(parse_error(expr, "unterminated string literal"));
    }
    if depth != 0 {
        return Err(parse_error(expr, "unterminated predicate"));
    }
    if rest.is_empty() {
        return Err(parse_error(expr, "empty step"));
    }
    Ok((rest, None))
}

fn parse_step(expr: &str, text: &str, axis: Axis) -> EngineResult<Step> {
    let name_end = text.find('[').unwrap_or(text.len());
    let name = &text[..name_end];
    let test = if name == "*" {
        NameTest::Any
    } else {
        if name.is_empty() {
            return Err(parse_error(expr, "step has no name test"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        {
            return Err(parse_error(expr, format!("unsupported name test '{name}'")));
        }
        NameTest::Name(name.to_string())
    };

    let mut predicates = Vec::new();
    let mut rest = &text[name_end..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(parse_error(
                expr,
                format!("unexpected text after predicate: '{rest}'"),
            ));
        }
        let close = find_predicate_end(expr, rest)?;
        predicates.push(parse_predicate(expr, &rest[1..close])?);
        rest = &rest[close + 1..];
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

// Index of the `]` that closes the predicate opened at byte 0.
fn find_predicate_end(expr: &str, text: &str) -> EngineResult<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b']' => return Ok(i),
                b'[' => return Err(parse_error(expr, "nested predicates are not supported")),
                _ => {}
            },
        }
    }
    Err(parse_error(expr, "unterminated predicate"))
}

fn parse_predicate(expr: &str, body: &str) -> EngineResult<Predicate> {
    let body = body.trim();
    if body.is_empty() {
        return Err(parse_error(expr, "empty predicate"));
    }
    if body.chars().all(|c| c.is_ascii_digit()) {
        let n: usize = body
            .parse()
            .map_err(|_| parse_error(expr, "position out of range"))?;
        if n == 0 {
            return Err(parse_error(expr, "positions are 1-based"));
        }
        return Ok(Predicate::Position(n));
    }
    let Some(attr) = body.strip_prefix('@') else {
        return Err(parse_error(
            expr,
            format!("unsupported predicate '[{body}]'"),
        ));
    };
    match attr.find('=') {
        None => {
            let name = attr.trim();
            if name.is_empty() {
                return Err(parse_error(expr, "attribute predicate has no name"));
            }
            Ok(Predicate::HasAttr(name.to_string()))
        }
        Some(eq) => {
            let name = attr[..eq].trim();
            if name.is_empty() {
                return Err(parse_error(expr, "attribute predicate has no name"));
            }
            let value = attr[eq + 1..].trim();
            let unquoted = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(|| parse_error(expr, "attribute value must be quoted"))?;
            Ok(Predicate::AttrEquals(name.to_string(), unquoted.to_string()))
        }
    }
}

fn dedup_in_order(ids: &mut Vec<NodeId>) {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
}
