//! Small accessors over the html5ever reference-counted DOM.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever::Attribute;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse markup as a full HTML document.
pub fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// The `body` element of a parsed document.
pub fn body(dom: &RcDom) -> Option<Handle> {
    fn find(handle: &Handle) -> Option<Handle> {
        if tag_name(handle).as_deref() == Some("body") {
            return Some(handle.clone());
        }
        handle.children.borrow().iter().find_map(find)
    }
    find(&dom.document)
}

/// Lowercase local name of an element, `None` for other nodes.
pub fn tag_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref().to_ascii_lowercase()),
        _ => None,
    }
}

/// Attribute value of an element.
pub fn attr(handle: &Handle, name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => find_attr(&attrs.borrow(), name),
        _ => None,
    }
}

fn find_attr(attrs: &[Attribute], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|attr| attr.name.local.as_ref() == name)
        .map(|attr| attr.value.to_string())
}

/// Concatenated text of all descendant text nodes.
pub fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    collect_text(handle, &mut text);
    text
}

fn collect_text(handle: &Handle, out: &mut String) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => collect_text(child, out),
            _ => {}
        }
    }
}

/// Child handles, cloned out of the borrow.
pub fn children(handle: &Handle) -> Vec<Handle> {
    handle.children.borrow().iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_and_attributes() {
        let dom = parse(r#"<p class="ql-align-center" style="color:#FF0000">Ciao <b>mondo</b></p>"#);
        let body = body(&dom).unwrap();
        let p = &children(&body)[0];
        assert_eq!(tag_name(p).as_deref(), Some("p"));
        assert_eq!(attr(p, "class").as_deref(), Some("ql-align-center"));
        assert_eq!(attr(p, "id"), None);
        assert_eq!(text_content(p), "Ciao mondo");
    }
}
