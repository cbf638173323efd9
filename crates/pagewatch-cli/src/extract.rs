//! Item extraction
//!
//! Turns a fetched page into the items the core diffs. Any block-level
//! element with a link and some text becomes an item.

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use pagewatch_core::models::UNKNOWN_TIMESTAMP;
use pagewatch_core::Item;

/// Elements considered as item containers
const CANDIDATES: &str = "article, li, tr, div, section, p";

/// Navigation and boilerplate text
const JUNK_KEYWORDS: [&str; 4] = ["skip", "main menu", "footer", "cookie"];

/// First date-like run of digits
const DATE_PATTERN: &str = r"\d{4}[-/]\d{1,2}[-/]\d{1,2}";

/// Extract items from a page
///
/// Fails when nothing usable was found, so the target is reported as an
/// error instead of overwriting its snapshot with an empty one.
pub fn extract_items(html: &str, page_url: &str) -> Result<Vec<Item>> {
    let document = Html::parse_document(html);
    let candidates = selector(CANDIDATES)?;
    let anchor = selector("a")?;
    let date = Regex::new(DATE_PATTERN)?;
    let base = Url::parse(page_url).ok();

    let mut items = Vec::new();
    for element in document.select(&candidates) {
        let text = element_text(element);
        if text.is_empty() || is_junk(&text) {
            continue;
        }

        let Some(link) = element.select(&anchor).next() else {
            continue;
        };
        let link = resolve_link(base.as_ref(), page_url, link.value().attr("href"));
        let timestamp = date
            .find(&text)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string());

        items.push(Item::new(text, link, timestamp));
    }

    if items.is_empty() {
        bail!("No extractable content found (possibly dynamic site or unsupported structure)");
    }
    Ok(items)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {:?}", css, e))
}

/// Trimmed text fragments joined without separators
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_junk(text: &str) -> bool {
    let lower = text.to_lowercase();
    JUNK_KEYWORDS.iter().any(|junk| lower.contains(junk))
}

/// Absolute link for an href, falling back to the page itself
fn resolve_link(base: Option<&Url>, page_url: &str, href: Option<&str>) -> String {
    let Some(href) = href.map(str::trim).filter(|h| !h.is_empty()) else {
        return page_url.to_string();
    };

    match base {
        Some(base) => base
            .join(href)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| page_url.to_string()),
        None => Url::parse(href)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| page_url.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://acme.com/news/";

    #[test]
    fn test_extracts_linked_blocks() {
        let html = r#"
            <html><body>
              <article><a href="/q1">Q1 results</a> <span>2024-01-10</span></article>
            </body></html>
        "#;
        let items = extract_items(html, PAGE).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Q1 results2024-01-10");
        assert_eq!(items[0].link, "https://acme.com/q1");
        assert_eq!(items[0].timestamp, "2024-01-10");
    }

    #[test]
    fn test_skips_junk_and_unlinked_text() {
        let html = r##"
            <html><body>
              <p>Plain paragraph without a link</p>
              <p><a href="/privacy">Cookie settings</a></p>
              <p><a href="#main">Skip to content</a></p>
              <section><a href="ceo">New CEO</a></section>
            </body></html>
        "##;
        let items = extract_items(html, PAGE).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "New CEO");
        assert_eq!(items[0].link, "https://acme.com/news/ceo");
        assert_eq!(items[0].timestamp, UNKNOWN_TIMESTAMP);
    }

    #[test]
    fn test_nested_candidates_each_count() {
        let html = r#"
            <html><body>
              <div><ul><li><a href="/a">Alpha 2024/3/5</a></li></ul></div>
            </body></html>
        "#;
        let items = extract_items(html, PAGE).unwrap();

        // div and li both qualify
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.timestamp == "2024/3/5"));
    }

    #[test]
    fn test_missing_href_falls_back_to_page() {
        let html = "<html><body><li><a>Anchor only</a></li></body></html>";
        let items = extract_items(html, PAGE).unwrap();
        assert_eq!(items[0].link, PAGE);
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let title = "x".repeat(400);
        let html = format!("<html><body><li><a href=\"/x\">{}</a></li></body></html>", title);
        let items = extract_items(&html, PAGE).unwrap();
        assert_eq!(items[0].title.chars().count(), 150);
    }

    #[test]
    fn test_no_items_is_an_error() {
        let err = extract_items("<html><body><p>nothing here</p></body></html>", PAGE)
            .unwrap_err();
        assert!(err.to_string().contains("No extractable content"));
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse(PAGE).unwrap();
        assert_eq!(
            resolve_link(Some(&base), PAGE, Some("https://other.io/x")),
            "https://other.io/x"
        );
        assert_eq!(resolve_link(Some(&base), PAGE, Some("  ")), PAGE);
        assert_eq!(resolve_link(None, "not a url", Some("/x")), "not a url");
    }
}
