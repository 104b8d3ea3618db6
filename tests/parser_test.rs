//! Link and text extraction over realistic page shapes

use trawler::parser::{extract, extract_links, extract_text, is_html};

const BASE: &str = "https://example.com/articles/post.html";

#[test]
fn test_basic_page() {
    let body = br#"<!DOCTYPE html>
<html>
<head><title>Ignored title</title><meta name="x" content="y"></head>
<body>
  <h1>Heading</h1>
  <p>First paragraph.</p>
  <a href="/next">Next page</a>
</body>
</html>"#;

    let page = extract(body, BASE);
    assert_eq!(page.links, vec!["https://example.com/next"]);
    assert_eq!(page.text, "Heading First paragraph. Next page");
}

#[test]
fn test_head_content_is_invisible() {
    let body = br#"<html><head>
      <title>Title text</title>
      <link rel="canonical" href="https://example.com/canon">
      <style>p { margin: 0 }</style>
      <script src="/app.js"></script>
    </head><body><p>Body</p></body></html>"#;

    let page = extract(body, BASE);
    assert!(page.links.is_empty(), "links: {:?}", page.links);
    assert_eq!(page.text, "Body");
}

#[test]
fn test_noscript_and_inline_script_skipped() {
    let body = br#"<body>
      <noscript><a href="/fallback">fallback</a>enable js</noscript>
      <script>document.write('<a href="/generated">g</a>');</script>
      <span>kept</span>
    </body>"#;

    let page = extract(body, BASE);
    assert!(page.links.is_empty());
    assert_eq!(page.text, "kept");
}

#[test]
fn test_relative_and_absolute_links() {
    let body = br#"
      <a href="sibling.html">a</a>
      <a href="/rooted">b</a>
      <a href="https://other.example/page">c</a>
      <a href="../up.html">d</a>
    "#;

    let links = extract_links(body, BASE);
    assert_eq!(
        links,
        vec![
            "https://example.com/articles/sibling.html",
            "https://example.com/rooted",
            "https://other.example/page",
            "https://example.com/up.html",
        ]
    );
}

#[test]
fn test_unwanted_schemes_and_fragments_dropped() {
    let body = br##"
      <a href="javascript:void(0)">js</a>
      <a href="mailto:hi@example.com">mail</a>
      <a href="tel:+123">tel</a>
      <a href="#top">frag</a>
      <a href="">empty</a>
      <a>no href</a>
      <a href="/real">real</a>
    "##;

    let links = extract_links(body, BASE);
    assert_eq!(links, vec!["https://example.com/real"]);
}

#[test]
fn test_duplicates_removed_order_kept() {
    let body = br#"
      <a href="/b">1</a>
      <a href="/a">2</a>
      <a href="/b">3</a>
      <a href="/a#frag">4</a>
      <a href="/c">5</a>
    "#;

    let links = extract_links(body, BASE);
    // /a#frag normalizes to /a, already seen
    assert_eq!(
        links,
        vec![
            "https://example.com/b",
            "https://example.com/a",
            "https://example.com/c",
        ]
    );
}

#[test]
fn test_text_runs_joined_with_single_spaces() {
    let body = b"<div>\n  one\n  <b>two</b>\n  three\n</div>";
    assert_eq!(extract_text(body), "one two three");
}

#[test]
fn test_single_pass_matches_separate_passes() {
    let body = br#"<html><head><script>x()</script></head><body>
      <p>alpha <a href="/one">beta</a></p>
      <div><a href="/two">gamma</a> delta</div>
      <style>.s{}</style>
      <a href="/one">again</a>
    </body></html>"#;

    let page = extract(body, BASE);
    assert_eq!(page.links, extract_links(body, BASE));
    assert_eq!(page.text, extract_text(body));
}

#[test]
fn test_malformed_html_still_yields_content() {
    let body = br#"<p>unclosed <a href="/x">link<p>more"#;
    let page = extract(body, BASE);
    assert_eq!(page.links, vec!["https://example.com/x"]);
    assert!(page.text.contains("unclosed"));
    assert!(page.text.contains("more"));
}

#[test]
fn test_empty_and_textless_bodies() {
    assert_eq!(extract(b"", BASE).links.len(), 0);
    assert_eq!(extract(b"", BASE).text, "");

    let only_markup = b"<div><span></span></div>";
    assert_eq!(extract(only_markup, BASE).text, "");
}

#[test]
fn test_is_html_matching() {
    assert!(is_html("text/html"));
    assert!(is_html("text/html; charset=ISO-8859-1"));
    assert!(is_html("Application/XHTML+xml"));
    assert!(!is_html("text/plain"));
    assert!(!is_html("image/png"));
    assert!(!is_html("application/json"));
}

#[test]
fn test_nested_anchor_text_counted_once() {
    let body = br#"<a href="/x"><span>inner</span> tail</a>"#;
    let page = extract(body, BASE);
    assert_eq!(page.links, vec!["https://example.com/x"]);
    assert_eq!(page.text, "inner tail");
}
