//! Plain text rendering.

use crate::error::Result;
use crate::model::Document;

use super::visitor::{walk, TextCollector};

/// Convert a document to plain text in reading order.
///
/// Blocks are separated by blank lines, table cells by tabs and list items
/// keep their marker.
pub fn to_text(doc: &Document) -> Result<String> {
    let mut collector = TextCollector::new();
    walk(doc, &mut collector)?;
    Ok(collector.finish())
}
