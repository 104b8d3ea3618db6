//! Single-pass HTML link and text extraction
//!
//! One DOM traversal produces both the ordered, deduplicated link list and
//! the visible text of a page. Subtrees of non-visible elements (script,
//! style, noscript, head, meta, link) are skipped entirely, for text and
//! links alike.

use std::collections::HashSet;

use ego_tree::NodeRef;
use scraper::{Html, Node};
use url::Url;

use crate::crawler::url::normalize;
use crate::models::ParsedPage;

/// Elements whose entire subtree is invisible to extraction
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "head", "meta", "link"];

/// Check if a Content-Type header value indicates an HTML document
pub fn is_html(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}

/// Parse HTML once, extracting both links and visible text in a single
/// traversal. Links are normalized against `base_url`, deduplicated, and
/// kept in document order of first occurrence.
///
/// An unparseable base URL yields an empty result: without a base there is
/// nothing meaningful to resolve hrefs against.
pub fn extract(body: &[u8], base_url: &str) -> ParsedPage {
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(_) => return ParsedPage::default(),
    };

    let mut collector = Collector::new(Some(&base), true);
    collector.run(body);
    ParsedPage {
        links: collector.links,
        text: collector.text,
    }
}

/// Extract only the normalized links. Runs the same traversal as
/// [`extract`] with text accumulation disabled; exists so tests can check
/// the two collection concerns independently.
pub fn extract_links(body: &[u8], base_url: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(_) => return Vec::new(),
    };

    let mut collector = Collector::new(Some(&base), false);
    collector.run(body);
    collector.links
}

/// Extract only the visible text. Same traversal as [`extract`] with link
/// collection disabled.
pub fn extract_text(body: &[u8]) -> String {
    let mut collector = Collector::new(None, true);
    collector.run(body);
    collector.text
}

struct Collector<'a> {
    /// Some(base) enables link collection
    base: Option<&'a Url>,
    collect_text: bool,
    links: Vec<String>,
    seen: HashSet<String>,
    text: String,
}

impl<'a> Collector<'a> {
    fn new(base: Option<&'a Url>, collect_text: bool) -> Self {
        Self {
            base,
            collect_text,
            links: Vec::new(),
            seen: HashSet::new(),
            text: String::new(),
        }
    }

    fn run(&mut self, body: &[u8]) {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);
        self.walk(document.tree.root());
    }

    fn walk(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    return;
                }

                if name == "a" {
                    if let (Some(base), Some(href)) = (self.base, element.attr("href")) {
                        let link = normalize(href, base);
                        if !link.is_empty() && self.seen.insert(link.clone()) {
                            self.links.push(link);
                        }
                    }
                }
            }
            Node::Text(t) => {
                if self.collect_text {
                    let trimmed = t.trim();
                    if !trimmed.is_empty() {
                        if !self.text.is_empty() {
                            self.text.push(' ');
                        }
                        self.text.push_str(trimmed);
                    }
                }
            }
            _ => {}
        }

        for child in node.children() {
            self.walk(child);
        }
    }
}
