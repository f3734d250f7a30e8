//! `scraper`-backed [`HtmlParser`].

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{HtmlElement, HtmlError, HtmlParser, ParsedDocument};

/// Tags whose text never counts as visible.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Tags that separate words in rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "caption", "dd", "details", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hr", "html", "li", "main", "nav", "ol", "option", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

/// [`HtmlParser`] built on the `scraper` crate (html5ever + selectors).
///
/// Documents are re-parsed on every call; the parser holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperHtmlParser;

impl ScraperHtmlParser {
    /// Create a parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HtmlParser for ScraperHtmlParser {
    fn parse_html(&self, html: &str) -> ParsedDocument {
        debug!(length = html.len(), "Parsing HTML document");
        let document = Html::parse_document(html);

        ParsedDocument {
            title: title(&document),
            text: visible_text(document.root_element()),
            elements: document
                .root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .map(to_element)
                .collect(),
            metadata: metadata(&document),
        }
    }

    fn select_elements(&self, html: &str, selector: &str) -> Result<Vec<HtmlElement>, HtmlError> {
        if selector.trim().is_empty() {
            return Err(HtmlError::EmptySelector);
        }
        debug!(selector = selector, "Selecting elements");

        let parsed = Selector::parse(selector).map_err(|e| {
            warn!(selector = selector, error = ?e, "Rejected CSS selector");
            HtmlError::InvalidSelector {
                selector: selector.to_string(),
                reason: format!("{e:?}"),
            }
        })?;

        let document = Html::parse_document(html);
        Ok(document.select(&parsed).map(to_element).collect())
    }

    fn extract_text(&self, html: &str) -> String {
        visible_text(Html::parse_document(html).root_element())
    }

    fn extract_links(&self, html: &str) -> Vec<String> {
        let Ok(anchors) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        Html::parse_document(html)
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| !href.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|t| normalize(&t.text().collect::<String>()))
        .unwrap_or_default()
}

fn metadata(document: &Html) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    // `property` entries win over `name` entries with the same key.
    for attr in ["name", "property"] {
        let Ok(selector) = Selector::parse(&format!("meta[{attr}]")) else {
            continue;
        };
        for meta in document.select(&selector) {
            let key = meta.value().attr(attr).unwrap_or_default();
            let content = meta.value().attr("content").unwrap_or_default();
            if !key.is_empty() && !content.is_empty() {
                out.insert(key.to_string(), content.to_string());
            }
        }
    }
    out
}

fn to_element(element: ElementRef<'_>) -> HtmlElement {
    HtmlElement {
        tag_name: element.value().name().to_string(),
        text: visible_text(element),
        attributes: element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    normalize(&raw)
}

/// Appends text nodes as written. Block boundaries become a space so
/// adjacent paragraphs do not run together; inline markup adds nothing.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if HIDDEN_TAGS.iter().any(|tag| *tag == name) {
                continue;
            }
            let block = BLOCK_TAGS.iter().any(|tag| *tag == name);
            if block {
                out.push(' ');
            }
            collect_text(child_element, out);
            if block {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  a \n\t b  "), "a b");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_hidden_tags_are_skipped() {
        let html = "<html><head><style>p{}</style></head><body><p>shown</p><script>var x;</script></body></html>";
        assert_eq!(ScraperHtmlParser::new().extract_text(html), "shown");
    }

    #[test]
    fn test_inline_markup_does_not_split_words() {
        let parser = ScraperHtmlParser::new();
        assert_eq!(parser.extract_text("<p>Hel<b>lo</b></p>"), "Hello");
        assert_eq!(parser.extract_text("<p>Hello <b>World</b>!</p>"), "Hello World!");
    }

    #[test]
    fn test_block_boundaries_separate_words() {
        let parser = ScraperHtmlParser::new();
        assert_eq!(parser.extract_text("<p>a</p><p>b</p>"), "a b");
        assert_eq!(parser.extract_text("<ul><li>one</li><li>two</li></ul>"), "one two");
        assert_eq!(parser.extract_text("line<br>break"), "line break");
    }

    #[test]
    fn test_property_meta_overrides_name() {
        let html = r#"<head><meta name="k" content="a"><meta property="k" content="b"></head>"#;
        let doc = ScraperHtmlParser::new().parse_html(html);
        assert_eq!(doc.metadata.get("k").map(String::as_str), Some("b"));
    }
}
