//! Page-level types.

use super::{Paragraph, Table};
use serde::{Deserialize, Serialize};

/// A4 width in points.
pub const A4_WIDTH_PT: f32 = 595.0;
/// A4 height in points.
pub const A4_HEIGHT_PT: f32 = 842.0;

/// A single page of the rendered document.
///
/// Pages are delimited by page-break sentinels in the rendered markup; the
/// flow within a page is left to the emitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Content blocks on the page
    pub elements: Vec<Block>,
}

impl Page {
    /// Create a new page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            elements: Vec::new(),
        }
    }

    /// Create a new portrait A4 page.
    pub fn a4(number: u32) -> Self {
        Self::new(number, A4_WIDTH_PT, A4_HEIGHT_PT)
    }

    /// Add a block to the page.
    pub fn add_block(&mut self, block: Block) {
        self.elements.push(block);
    }

    /// Add a paragraph to the page.
    pub fn add_paragraph(&mut self, paragraph: Paragraph) {
        self.elements.push(Block::Paragraph(paragraph));
    }

    /// Add a table to the page.
    pub fn add_table(&mut self, table: Table) {
        self.elements.push(Block::Table(table));
    }

    /// Get plain text content of the page.
    pub fn plain_text(&self) -> String {
        self.elements
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check if the page is empty (no content blocks).
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Get the number of blocks on the page.
    pub fn block_count(&self) -> usize {
        self.elements.len()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::a4(1)
    }
}

/// A content block on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A paragraph or heading
    Paragraph(Paragraph),

    /// A table
    Table(Table),
}

impl Block {
    /// Check if this block is a paragraph.
    pub fn is_paragraph(&self) -> bool {
        matches!(self, Block::Paragraph(_))
    }

    /// Check if this block is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, Block::Table(_))
    }

    /// Id of the section the block was rendered from.
    pub fn section(&self) -> Option<&str> {
        match self {
            Block::Paragraph(p) => p.section.as_deref(),
            Block::Table(t) => t.section.as_deref(),
        }
    }

    /// Get plain text content of the block.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Paragraph(p) => p.plain_text(),
            Block::Table(t) => t.plain_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_a4() {
        let page = Page::a4(1);
        assert_eq!(page.number, 1);
        assert_eq!(page.width, A4_WIDTH_PT);
        assert!(page.is_empty());
    }

    #[test]
    fn test_page_plain_text() {
        let mut page = Page::default();
        page.add_paragraph(Paragraph::with_text("Premessa"));
        page.add_table(Table::from_text(["A", "B"], vec![vec!["1".into(), "2".into()]]));
        assert_eq!(page.plain_text(), "Premessa\n\nA\tB\n1\t2");
        assert_eq!(page.block_count(), 2);
    }

    #[test]
    fn test_block_section() {
        let mut paragraph = Paragraph::with_text("x");
        paragraph.section = Some("premessa".into());
        let block = Block::Paragraph(paragraph);
        assert!(block.is_paragraph());
        assert_eq!(block.section(), Some("premessa"));
    }
}
