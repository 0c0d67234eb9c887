//! Engine error types
//!
//! All failures in the sync engine are local: an invalid selector, action or
//! directive is reported and the single operation is skipped, sibling
//! operations continue. Nothing here is fatal to a page session.

use thiserror::Error;

/// Errors produced while parsing a class-name directive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// The class token does not carry the event-directive prefix
    #[error("class '{0}' is not an event directive")]
    NotADirective(String),

    /// A required grammar field is empty or absent
    #[error("event directive '{class}' is missing its {field} field")]
    MissingField {
        class: String,
        field: &'static str,
    },

    /// More dash-delimited tokens than the grammar allows
    #[error("event directive '{class}' has {extra} unexpected trailing token(s)")]
    TrailingTokens { class: String, extra: usize },
}

/// Errors produced by selector resolution, action dispatch and DOM mutation
#[derive(Error, Debug)]
pub enum EngineError {
    /// The node id does not refer to a node in the document
    #[error("node is no longer part of the document")]
    MissingNode,

    /// An element was required but the node is text, a comment, etc.
    #[error("node is not an element")]
    NotAnElement,

    /// A single selector resolved to nothing
    #[error("selector matched no node")]
    NoMatch,

    /// CSS selector failed to parse
    #[error("invalid CSS selector: {0}")]
    Css(String),

    /// XPath expression outside the supported subset
    #[error("invalid XPath expression '{expr}': {reason}")]
    XPath { expr: String, reason: String },

    /// A `from_string` selector was used where a live node is required
    #[error("a from_string selector cannot be used as a mutation target")]
    InvalidTarget,

    /// A `ForEach` callback carries no `iteration_placeholder` argument
    #[error("ForEach callback has no iteration_placeholder argument")]
    MissingPlaceholder,

    /// An `iteration_placeholder` selector reached resolution unbound
    #[error("iteration_placeholder selector outside a ForEach callback")]
    UnboundPlaceholder,

    /// An action failed to decode from its wire representation
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Directive grammar failure
    #[error(transparent)]
    Directive(#[from] DirectiveError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
