//! JSON dump of the document tree.

use crate::error::Result;
use crate::model::Document;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Dump a document tree as JSON.
///
/// The dump carries every page, block, run and table cell with its section
/// id, so it can be read back with [`from_json`].
pub fn to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    let json = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(doc)?,
        JsonFormat::Compact => serde_json::to_string(doc)?,
    };
    log::debug!("Dumped {} pages as {} bytes of JSON", doc.page_count(), json.len());
    Ok(json)
}

/// Read a document tree back from a JSON dump.
pub fn from_json(json: &str) -> Result<Document> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, Paragraph};

    #[test]
    fn test_to_json_pretty() {
        let mut doc = Document::new();
        doc.metadata.title = Some("Verbale".to_string());
        let mut page = Page::a4(1);
        let mut para = Paragraph::with_text("Serbatoio S1");
        para.section = Some("premessa".into());
        page.add_paragraph(para);
        doc.add_page(page);

        let json = to_json(&doc, JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"title\": \"Verbale\""));
        assert!(json.contains("\"type\": \"paragraph\""));
        assert!(json.contains("\"section\": \"premessa\""));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact_roundtrip() {
        let doc = crate::markup::parse("<p><b>PS</b> 13 bar</p>");
        let json = to_json(&doc, JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
        assert_eq!(from_json(&json).unwrap(), doc);
        assert!(from_json("{\"pages\": 3}").is_err());
    }
}
