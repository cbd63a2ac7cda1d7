//! Document-level types.

use super::{Block, Page};
use crate::template::{PageMargins, DEFAULT_FONT, DEFAULT_FONT_SIZE_PT, DEFAULT_MARGINS_CM};
use serde::{Deserialize, Serialize};

/// A rendered document: page-separated blocks plus page setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata and page setup
    pub metadata: Metadata,

    /// Pages in the document
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            metadata: Metadata::default(),
            pages: Vec::new(),
        }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Add a page to the document.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// All blocks in reading order, across pages.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.pages.iter().flat_map(|p| p.elements.iter())
    }

    /// Check if the document has any content.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Page::is_empty)
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .filter(|page| !page.is_empty())
            .map(|page| page.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Document metadata and page setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title; defaults to the text of the first heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Page margins in centimetres
    pub margins: PageMargins,

    /// Default font family
    pub font_name: String,

    /// Default font size in points
    pub font_size: f32,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: None,
            margins: DEFAULT_MARGINS_CM,
            font_name: DEFAULT_FONT.to_string(),
            font_size: DEFAULT_FONT_SIZE_PT as f32,
        }
    }
}

impl Metadata {
    /// Page setup taken from template metadata, with fallbacks applied.
    pub fn from_template(metadata: &crate::template::Metadata) -> Self {
        Self {
            margins: metadata.margins(),
            font_name: metadata.font().to_string(),
            font_size: metadata.font_size() as f32,
            ..Self::default()
        }
    }

    /// Margins as `[top, right, bottom, left]` in centimetres.
    pub fn margins_trbl(&self) -> [f64; 4] {
        self.margins.as_trbl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Paragraph;

    #[test]
    fn test_document_new() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.page_count(), 0);
        assert_eq!(doc.metadata.font_name, "Cambria");
        assert_eq!(doc.metadata.margins_trbl(), [2.5, 1.5, 2.5, 2.5]);
    }

    #[test]
    fn test_plain_text_skips_empty_pages() {
        let mut doc = Document::new();
        let mut first = Page::a4(1);
        first.add_paragraph(Paragraph::with_text("Pagina uno"));
        doc.add_page(first);
        doc.add_page(Page::a4(2));
        let mut third = Page::a4(3);
        third.add_paragraph(Paragraph::with_text("Pagina tre"));
        doc.add_page(third);

        assert_eq!(doc.plain_text(), "Pagina uno\n\nPagina tre");
        assert_eq!(doc.blocks().count(), 2);
    }

    #[test]
    fn test_metadata_from_template() {
        let template_meta = crate::template::Metadata {
            page_margins: None,
            default_font: Some("Arial".into()),
            default_font_size: Some(10.0),
        };
        let meta = Metadata::from_template(&template_meta);
        assert_eq!(meta.font_name, "Arial");
        assert_eq!(meta.font_size, 10.0);
        assert_eq!(meta.margins, DEFAULT_MARGINS_CM);
    }
}
