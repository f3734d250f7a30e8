//! HTML parsing adapter.
//!
//! [`HtmlParser`] is the seam the harness and scheduled tasks parse pages
//! through. [`ScraperHtmlParser`] implements it on top of `scraper`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod error;
mod scraper_parser;

pub use error::HtmlError;
pub use scraper_parser::ScraperHtmlParser;

/// Parses HTML documents and queries them with CSS selectors.
///
/// Every call takes the raw markup; implementations are expected to be
/// stateless so a single parser can be shared across worker threads.
pub trait HtmlParser: Send + Sync {
    /// Parse a whole document.
    fn parse_html(&self, html: &str) -> ParsedDocument;

    /// Elements matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// [`HtmlError::EmptySelector`] for a blank selector and
    /// [`HtmlError::InvalidSelector`] when it is not valid CSS.
    fn select_elements(&self, html: &str, selector: &str) -> Result<Vec<HtmlElement>, HtmlError>;

    /// Visible text of the document, whitespace-normalised.
    fn extract_text(&self, html: &str) -> String;

    /// `href` values of every anchor with a non-empty `href`, in document order.
    fn extract_links(&self, html: &str) -> Vec<String>;
}

/// Result of [`HtmlParser::parse_html`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Contents of `<title>`, empty if absent.
    pub title: String,
    /// Visible text of the whole document.
    pub text: String,
    /// Every element in document order, starting with `<html>`.
    pub elements: Vec<HtmlElement>,
    /// `meta[name]` and `meta[property]` entries with non-empty content.
    pub metadata: BTreeMap<String, String>,
}

/// A single element extracted from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlElement {
    /// Lower-case tag name.
    pub tag_name: String,
    /// Visible text of the element and its descendants.
    pub text: String,
    /// Attributes by name.
    pub attributes: BTreeMap<String, String>,
}

impl HtmlElement {
    /// Attribute value, or an empty string when the attribute is absent.
    #[must_use]
    pub fn attribute(&self, name: &str) -> &str {
        self.attributes.get(name).map_or("", String::as_str)
    }
}
