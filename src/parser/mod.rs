//! HTML parsing and content extraction

pub mod html;

pub use html::{extract, extract_links, extract_text, is_html};
