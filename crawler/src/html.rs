//! Markup stripping and link extraction over `scraper`'s parsed tree.

use lazy_static::lazy_static;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose content is never page text and whose links are not followed.
const SKIPPED: [&str; 6] = ["head", "script", "style", "noscript", "svg", "template"];

lazy_static! {
    static ref ANCHORS: Selector = Selector::parse("a[href]").expect("valid selector");
}

fn is_skipped(element: ElementRef) -> bool {
    SKIPPED.contains(&element.value().name())
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|e| SKIPPED.contains(&e.value().name()))
}

/// Visible text of `html`, text nodes separated by single spaces.
pub fn strip_markup(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else { continue };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|e| SKIPPED.contains(&e.value().name()));
        let text = text.trim();
        if !hidden && !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join(" ")
}

/// Absolute http(s) links of `html` in document order, fragments removed.
/// Duplicates are kept; the frontier drops them.
pub fn extract_links(base: &Url, html: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHORS)
        .filter(|a| !is_skipped(*a))
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Title words</title><style>body { color: red }</style></head>
  <body>
    <h1>Hello</h1>
    <p>Plain <b>bold</b> text &amp; more</p>
    <script>var hidden = 1;</script>
    <noscript>enable scripts</noscript>
    <a href="/docs#intro">Docs</a>
    <a href="https://other.example/x">Other</a>
    <a href="mailto:me@example.com">Mail</a>
    <a href="sub/page.html">Sub</a>
    <a href="/docs">Docs again</a>
  </body>
</html>"#;

    #[test]
    fn strips_markup_and_hidden_blocks() {
        let text = strip_markup(PAGE);
        assert_eq!(text, "Hello Plain bold text & more Docs Other Mail Sub Docs again");
    }

    #[test]
    fn links_are_absolute_and_unfragmented() {
        let base = Url::parse("https://example.com/a/index.html").unwrap();
        let links: Vec<String> = extract_links(&base, PAGE).into_iter().map(String::from).collect();
        assert_eq!(
            links,
            [
                "https://example.com/docs",
                "https://other.example/x",
                "https://example.com/a/sub/page.html",
                "https://example.com/docs",
            ]
        );
    }

    #[test]
    fn links_inside_skipped_blocks_are_ignored() {
        let base = Url::parse("http://example.com/").unwrap();
        let html = r#"<html><body><template><a href="/t">t</a></template><a href="/kept">k</a></body></html>"#;
        let links = extract_links(&base, html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "http://example.com/kept");
    }
}
