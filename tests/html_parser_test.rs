//! Integration tests for the scraper-backed HTML parser

use browseruse::html::{HtmlError, HtmlParser, ScraperHtmlParser};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title> Test   Page </title>
  <meta name="description" content="A test page">
  <meta name="keywords" content="">
  <meta property="og:title" content="Open Graph Title">
  <style>body { color: red; }</style>
</head>
<body>
  <h1 id="main">Hello World</h1>
  <p class="intro">First paragraph.</p>
  <p>Second paragraph.</p>
  <a href="https://example.com">Example</a>
  <a href="/relative">Relative</a>
  <a href="">Empty</a>
  <a>No href</a>
  <script>console.log("hidden");</script>
</body>
</html>"#;

fn parser() -> ScraperHtmlParser {
    ScraperHtmlParser::new()
}

#[test]
fn test_parse_document() {
    let doc = parser().parse_html(PAGE);

    assert_eq!(doc.title, "Test Page");
    assert!(doc.text.contains("Hello World"));
    assert!(doc.text.contains("Second paragraph."));
    assert!(!doc.text.contains("console.log"));
    assert!(!doc.text.contains("color: red"));
    assert!(!doc.text.contains("  "));

    assert_eq!(doc.elements.first().map(|e| e.tag_name.as_str()), Some("html"));
    assert!(doc.elements.iter().any(|e| e.tag_name == "h1" && e.attribute("id") == "main"));
}

#[test]
fn test_metadata_skips_empty_content() {
    let doc = parser().parse_html(PAGE);

    assert_eq!(doc.metadata.get("description").map(String::as_str), Some("A test page"));
    assert_eq!(doc.metadata.get("og:title").map(String::as_str), Some("Open Graph Title"));
    assert!(!doc.metadata.contains_key("keywords"));
}

#[test]
fn test_untitled_document() {
    let doc = parser().parse_html("<p>just text</p>");
    assert_eq!(doc.title, "");
    assert_eq!(doc.text, "just text");
    assert!(doc.metadata.is_empty());
}

#[test]
fn test_select_elements() {
    let paragraphs = parser().select_elements(PAGE, "p").unwrap();
    assert_eq!(paragraphs.len(), 2);
    assert_eq!(paragraphs[0].text, "First paragraph.");
    assert_eq!(paragraphs[0].attribute("class"), "intro");
    assert_eq!(paragraphs[1].attribute("class"), "");

    let none = parser().select_elements(PAGE, "table tr").unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_select_rejects_bad_selectors() {
    assert_eq!(parser().select_elements(PAGE, "  "), Err(HtmlError::EmptySelector));
    assert!(matches!(
        parser().select_elements(PAGE, "p[["),
        Err(HtmlError::InvalidSelector { ref selector, .. }) if selector == "p[["
    ));
}

#[test]
fn test_extract_text() {
    let text = parser().extract_text("<div>\n  Hello\n  <span>there</span>\n</div>");
    assert_eq!(text, "Hello there");
    assert_eq!(parser().extract_text(""), "");
}

#[test]
fn test_extract_links() {
    let links = parser().extract_links(PAGE);
    assert_eq!(links, vec!["https://example.com".to_string(), "/relative".to_string()]);
}

#[test]
fn test_parser_is_shareable_across_threads() {
    let parser = std::sync::Arc::new(parser());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let parser = std::sync::Arc::clone(&parser);
            std::thread::spawn(move || parser.extract_links(PAGE).len())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
}

#[test]
fn test_text_follows_rendering() {
    let parser = parser();

    assert_eq!(parser.extract_text("<p>Hello <b>World</b>!</p>"), "Hello World!");
    assert_eq!(parser.extract_text("<p>a</p><p>b</p>"), "a b");
    assert_eq!(parser.extract_text("<p>Hel<b>lo</b></p>"), "Hello");
    assert_eq!(parser.extract_text("Price: <span>$</span>5"), "Price: $5");
    assert_eq!(
        parser.extract_text("<table><tr><td>x</td><td>y</td></tr></table>"),
        "x y"
    );
}

#[test]
fn test_element_text_keeps_inline_runs() {
    let elements = parser()
        .select_elements(r#"<div><a href="/p">Pri<em>ce</em> list</a></div>"#, "a")
        .unwrap();
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].text, "Price list");
}
