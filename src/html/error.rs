//! HTML adapter errors.

use thiserror::Error;

/// Errors returned by [`HtmlParser::select_elements`](super::HtmlParser::select_elements).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HtmlError {
    /// The selector was empty or whitespace.
    #[error("selector must not be empty")]
    EmptySelector,
    /// The selector could not be parsed as CSS.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector {
        /// Selector as given.
        selector: String,
        /// Parser diagnostic.
        reason: String,
    },
}
