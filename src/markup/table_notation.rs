//! Inline table notation.
//!
//! The editor stores tables inside rendered text as a single bracketed token:
//!
//! ```text
//! [[TABLE:<id>:<h1>|<h2>::<r1c1>|<r1c2>||<r2c1>|<r2c2>]]
//! ```
//!
//! `::` separates headers from rows, `||` separates rows and `|` separates
//! cells. Cell text is entity-escaped and may carry inline formatting tags
//! once unescaped. Expansion turns each token into ordinary table markup
//! before the document is parsed.

use std::borrow::Cow;
use std::sync::OnceLock;

use html5ever::tendril::TendrilSink;
use html5ever::parse_document;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::{Captures, Regex};

use super::dom;

const OPENING: &str = "[[TABLE:";

/// A decoded inline table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTable {
    /// Table id chosen by the editor
    pub id: String,
    /// Header cells (markup)
    pub headers: Vec<String>,
    /// Body rows (markup per cell)
    pub rows: Vec<Vec<String>>,
}

impl InlineTable {
    /// Table markup with a header row in `thead` and rows in `tbody`.
    ///
    /// Cell content is inserted verbatim so inline tags survive.
    pub fn to_markup(&self) -> String {
        let mut html = String::from("<table>");
        if !self.headers.is_empty() {
            html.push_str("<thead><tr>");
            for cell in &self.headers {
                html.push_str("<th>");
                html.push_str(cell);
                html.push_str("</th>");
            }
            html.push_str("</tr></thead>");
        }
        if !self.rows.is_empty() {
            html.push_str("<tbody>");
            for row in &self.rows {
                html.push_str("<tr>");
                for cell in row {
                    html.push_str("<td>");
                    html.push_str(cell);
                    html.push_str("</td>");
                }
                html.push_str("</tr>");
            }
            html.push_str("</tbody>");
        }
        html.push_str("</table>");
        html
    }
}

fn notation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\[\[TABLE:([^:]+):([^:]+)::(.+?)\]\]").expect("valid table notation regex")
    })
}

/// Parse a single notation token. Returns `None` when it is malformed.
pub fn parse_inline_table(token: &str) -> Option<InlineTable> {
    let caps = notation().captures(token)?;
    if caps.get(0).map(|m| m.as_str()) != Some(token) {
        return None;
    }
    Some(decode(&caps))
}

fn decode(caps: &Captures<'_>) -> InlineTable {
    let headers = decode_entities(&caps[2]);
    let rows = decode_entities(&caps[3]);
    InlineTable {
        id: caps[1].to_string(),
        headers: headers.split('|').map(str::to_string).collect(),
        rows: rows
            .split("||")
            .map(|row| row.split('|').map(str::to_string).collect())
            .collect(),
    }
}

/// Replace every notation token with table markup.
///
/// Openings that do not form a complete token are left untouched and
/// reported with a warning.
pub fn expand_inline_tables(html: &str) -> Cow<'_, str> {
    if !html.contains(OPENING) {
        return Cow::Borrowed(html);
    }

    let expanded = notation().replace_all(html, |caps: &Captures<'_>| decode(caps).to_markup());

    let leftovers = expanded.matches(OPENING).count();
    if leftovers > 0 {
        log::warn!(
            "{} malformed inline table token(s) left as text",
            leftovers
        );
    }
    expanded
}

/// Decode character references the way an HTML text area does.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    // The parser drops one newline directly after the opening tag.
    let source = format!("<textarea>\n{}</textarea>", text);
    let dom = parse_document(RcDom::default(), Default::default()).one(source);
    find_textarea(&dom.document)
        .map(|textarea| dom::text_content(&textarea))
        .unwrap_or_else(|| text.to_string())
}

fn find_textarea(handle: &Handle) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &handle.data {
        if name.local.as_ref() == "textarea" {
            return Some(handle.clone());
        }
    }
    handle.children.borrow().iter().find_map(find_textarea)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_table() {
        let table = parse_inline_table("[[TABLE:t1:A|B::1|2||3|4]]").unwrap();
        assert_eq!(table.id, "t1");
        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn test_escaped_cells_keep_inline_tags() {
        let table = parse_inline_table("[[TABLE:t2:&lt;b&gt;Nome&lt;/b&gt;|Valore::PS &amp; V|8000]]").unwrap();
        assert_eq!(table.headers[0], "<b>Nome</b>");
        assert_eq!(table.rows[0], vec!["PS & V", "8000"]);
    }

    #[test]
    fn test_expand_in_context() {
        let html = "<p>Prima</p>[[TABLE:t1:A|B::1|2]]<p>Dopo</p>";
        let expanded = expand_inline_tables(html);
        assert_eq!(
            expanded,
            "<p>Prima</p><table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table><p>Dopo</p>"
        );
    }

    #[test]
    fn test_malformed_token_left_untouched() {
        let html = "<p>[[TABLE:t1:A|B]]</p>";
        assert_eq!(expand_inline_tables(html), html);
        assert!(parse_inline_table("[[TABLE:t1:A|B]]").is_none());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt; b &amp;&amp; c&#39;s"), "a < b && c's");
        assert_eq!(decode_entities("\nplain"), "\nplain");
    }
}
