//! HTML to bounded plain-text excerpt.
//!
//! Mirrors what the fetch fan-out needs and nothing more: find the primary
//! content region, keep substantial heading/paragraph text, bound the result.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

/// Upper bound on the extracted excerpt, in characters.
const MAX_EXCERPT_CHARS: usize = 1200;
/// Blocks whose trimmed text does not exceed this length are dropped.
const MIN_BLOCK_CHARS: usize = 40;

/// Non-content chrome stripped from whichever region is selected.
const STRIP_TAGS: &[&str] = &["script", "style", "nav", "footer", "aside", "noscript"];

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", "body"]
        .iter()
        .map(|selector| Selector::parse(selector).expect("invalid content selector"))
        .collect()
});

static BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, h1, h2, h3").expect("invalid block selector"));

/// Turn a raw page body into a bounded plain-text excerpt.
///
/// Prefers an `<article>` region, then `<main>`, then the whole `<body>`.
/// Heading and paragraph texts longer than 40 characters are kept,
/// newline-joined and truncated to 1200 characters. Malformed markup is
/// tolerated; whatever parses contributes. Returns an empty string when no
/// content region exists.
pub fn extract(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);

    let Some(region) = CONTENT_SELECTORS
        .iter()
        .find_map(|selector| document.select(selector).next())
    else {
        return String::new();
    };

    let mut blocks: Vec<String> = Vec::new();
    for element in region.select(&BLOCK_SELECTOR) {
        if inside_stripped_chrome(&element) {
            continue;
        }
        let text = block_text(&element);
        let text = text.trim();
        if text.chars().count() > MIN_BLOCK_CHARS {
            blocks.push(text.to_string());
        }
    }

    truncate_chars(&blocks.join("\n"), MAX_EXCERPT_CHARS)
}

/// Char-boundary-safe prefix of at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn inside_stripped_chrome(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| STRIP_TAGS.contains(&ancestor.value().name()))
}

fn block_text(element: &ElementRef<'_>) -> String {
    let mut buffer = String::new();
    collect_text(element, &mut buffer);
    buffer
}

fn collect_text(element: &ElementRef<'_>, buffer: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buffer.push_str(text),
            Node::Element(el) => {
                if STRIP_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(&child_ref, buffer);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_PARA: &str =
        "Neural networks are computing systems loosely inspired by biological brains.";

    #[test]
    fn keeps_only_substantial_blocks() {
        let html = format!("<html><body><p>short</p><p>{LONG_PARA}</p></body></html>");
        let text = extract(&html);
        assert_eq!(text, LONG_PARA);
    }

    #[test]
    fn prefers_article_over_body() {
        let html = format!(
            "<html><body><p>{LONG_PARA} This one lives outside the article region.</p>\
             <article><p>{LONG_PARA}</p></article></body></html>"
        );
        let text = extract(&html);
        assert_eq!(text, LONG_PARA);
    }

    #[test]
    fn falls_back_to_main_then_body() {
        let html = format!("<html><body><main><h2>{LONG_PARA}</h2></main></body></html>");
        assert_eq!(extract(&html), LONG_PARA);

        let html = format!("<html><body><p>{LONG_PARA}</p></body></html>");
        assert_eq!(extract(&html), LONG_PARA);
    }

    #[test]
    fn strips_chrome_regions() {
        let html = format!(
            "<html><body><nav><p>{LONG_PARA} navigation links that should vanish.</p></nav>\
             <p>{LONG_PARA}</p>\
             <footer><p>{LONG_PARA} footer boilerplate that should vanish.</p></footer>\
             </body></html>"
        );
        let text = extract(&html);
        assert_eq!(text, LONG_PARA);
    }

    #[test]
    fn ignores_script_text_inside_blocks() {
        let html = format!(
            "<html><body><p>{LONG_PARA}<script>var x = 'not content at all, honestly';</script></p></body></html>"
        );
        let text = extract(&html);
        assert_eq!(text, LONG_PARA);
    }

    #[test]
    fn joins_blocks_with_newlines() {
        let html = format!(
            "<html><body><h1>{LONG_PARA}</h1><p>{LONG_PARA}</p></body></html>"
        );
        let text = extract(&html);
        assert_eq!(text, format!("{LONG_PARA}\n{LONG_PARA}"));
    }

    #[test]
    fn truncates_to_excerpt_bound() {
        let long = "a".repeat(5000);
        let html = format!("<html><body><p>{long}</p></body></html>");
        let text = extract(&html);
        assert_eq!(text.chars().count(), 1200);
    }

    #[test]
    fn empty_document_yields_empty_excerpt() {
        assert_eq!(extract(""), "");
        assert_eq!(extract("<html><body></body></html>"), "");
    }

    #[test]
    fn truncate_chars_respects_multibyte_boundaries() {
        let text = "ééééé";
        assert_eq!(truncate_chars(text, 3), "ééé");
        assert_eq!(truncate_chars(text, 10), text);
    }
}
