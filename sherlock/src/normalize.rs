//! Summary markup → plain text.

use scraper::{Html, Node};

/// Hard cap on stored summary text, in characters.
pub const SUMMARY_MAX_CHARS: usize = 500;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section",
    "table", "td", "th", "tr", "ul",
];

/// Text content of `html`, tags/attributes/scripts discarded and whitespace
/// collapsed.
///
/// Input without markup is returned unchanged: no elements, comments or
/// entity references means no rewrite, even when it contains a bare `&` or
/// `<`. The HTML parser recovers from malformed markup on its own, so
/// unterminated tags degrade to literal text instead of dropping the summary.
pub fn normalize(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.to_string();
    }

    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    let mut markup = false;
    let mut out = String::with_capacity(html.len());
    for node in root.descendants() {
        match node.value() {
            Node::Element(_) if node.id() == root.id() => {}
            Node::Element(el) => {
                markup = true;
                if BLOCK_ELEMENTS.contains(&el.name()) {
                    out.push(' ');
                }
            }
            Node::Comment(_) => markup = true,
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .map_or(false, |el| SKIPPED_ELEMENTS.contains(&el.name()))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            _ => {}
        }
    }

    // Text identical to the input means nothing was decoded.
    if !markup && out == html {
        return html.to_string();
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `s`; never splits a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Like [`truncate_chars`], marking a cut with a trailing ellipsis.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

/// Normalized summary capped at [`SUMMARY_MAX_CHARS`].
pub fn summary_text(html: &str) -> String {
    truncate_chars(&normalize(html), SUMMARY_MAX_CHARS)
}
