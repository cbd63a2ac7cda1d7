//! Visitor pattern shared by the emitters.
//!
//! Every emitter is a fold over the same document tree: [`walk`] visits
//! pages and blocks in reading order and the visitor accumulates its output.
//! Keeping a single traversal means the emitters cannot disagree on order.
//!
//! # Example
//!
//! ```
//! use rendoc::model::Paragraph;
//! use rendoc::render::visitor::{walk, DocumentVisitor, Location};
//!
//! #[derive(Default)]
//! struct Headings(Vec<String>);
//!
//! impl DocumentVisitor for Headings {
//!     fn visit_paragraph(&mut self, para: &Paragraph, _at: &Location) -> rendoc::Result<()> {
//!         if para.is_heading() {
//!             self.0.push(para.plain_text());
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let doc = rendoc::markup::parse("<h1>Verbale</h1><p>testo</p>");
//! let mut headings = Headings::default();
//! walk(&doc, &mut headings).unwrap();
//! assert_eq!(headings.0, vec!["Verbale"]);
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::model::{Block, Document, Paragraph, Table};

/// Position of a block, used to locate emission failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Page number (1-indexed)
    pub page: u32,
    /// Block index on the page (1-indexed)
    pub block: usize,
    /// Section the block was rendered from
    pub section: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(section) = &self.section {
            write!(f, "section '{}', ", section)?;
        }
        write!(f, "page {}, block {}", self.page, self.block)
    }
}

impl Location {
    /// An emission error at this location.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Emit {
            location: self.to_string(),
            message: message.into(),
        }
    }
}

/// Trait for visiting document elements during emission.
///
/// All methods do nothing by default.
pub trait DocumentVisitor {
    /// Called for each paragraph or heading.
    fn visit_paragraph(&mut self, para: &Paragraph, at: &Location) -> Result<()> {
        let _ = (para, at);
        Ok(())
    }

    /// Called for each table.
    fn visit_table(&mut self, table: &Table, at: &Location) -> Result<()> {
        let _ = (table, at);
        Ok(())
    }

    /// Called at the start of each page.
    fn on_page_start(&mut self, page_number: u32) -> Result<()> {
        let _ = page_number;
        Ok(())
    }

    /// Called between two consecutive pages.
    fn on_page_break(&mut self, next_page: u32) -> Result<()> {
        let _ = next_page;
        Ok(())
    }

    /// Called at the end of each page.
    fn on_page_end(&mut self, page_number: u32) -> Result<()> {
        let _ = page_number;
        Ok(())
    }
}

/// Visit every page and block of a document in reading order.
pub fn walk<V: DocumentVisitor + ?Sized>(doc: &Document, visitor: &mut V) -> Result<()> {
    for (i, page) in doc.pages.iter().enumerate() {
        if i > 0 {
            visitor.on_page_break(page.number)?;
        }
        visitor.on_page_start(page.number)?;
        for (index, block) in page.elements.iter().enumerate() {
            let at = Location {
                page: page.number,
                block: index + 1,
                section: block.section().map(str::to_string),
            };
            match block {
                Block::Paragraph(para) => visitor.visit_paragraph(para, &at)?,
                Block::Table(table) => visitor.visit_table(table, &at)?,
            }
        }
        visitor.on_page_end(page.number)?;
    }
    Ok(())
}

/// Reject tables no emitter can represent.
pub fn check_table(table: &Table, at: &Location) -> Result<()> {
    if table.is_empty() {
        return Err(at.error("table has no rows"));
    }
    if let Some(i) = table.rows.iter().position(|row| row.cells.is_empty()) {
        return Err(at.error(format!("table row {} has no cells", i + 1)));
    }
    Ok(())
}

/// Collects plain text in reading order.
#[derive(Debug, Default)]
pub struct TextCollector {
    pages: Vec<Vec<String>>,
}

impl TextCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of all non-empty pages, blocks separated by blank lines.
    pub fn finish(self) -> String {
        self.pages
            .into_iter()
            .filter(|blocks| !blocks.is_empty())
            .map(|blocks| blocks.join("\n\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl DocumentVisitor for TextCollector {
    fn visit_paragraph(&mut self, para: &Paragraph, _at: &Location) -> Result<()> {
        if let Some(page) = self.pages.last_mut() {
            page.push(para.plain_text());
        }
        Ok(())
    }

    fn visit_table(&mut self, table: &Table, _at: &Location) -> Result<()> {
        if let Some(page) = self.pages.last_mut() {
            page.push(table.plain_text());
        }
        Ok(())
    }

    fn on_page_start(&mut self, _page_number: u32) -> Result<()> {
        self.pages.push(Vec::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, TableRow};

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl DocumentVisitor for Trace {
        fn visit_paragraph(&mut self, para: &Paragraph, at: &Location) -> Result<()> {
            self.0.push(format!("p{}:{}", at.page, para.plain_text()));
            Ok(())
        }

        fn visit_table(&mut self, _table: &Table, at: &Location) -> Result<()> {
            self.0.push(format!("t{}", at.page));
            Ok(())
        }

        fn on_page_break(&mut self, next_page: u32) -> Result<()> {
            self.0.push(format!("break{}", next_page));
            Ok(())
        }
    }

    #[test]
    fn test_walk_order() {
        let mut doc = Document::new();
        let mut first = Page::a4(1);
        first.add_paragraph(Paragraph::with_text("a"));
        first.add_table(Table::from_text(["x"], Vec::new()));
        doc.add_page(first);
        let mut second = Page::a4(2);
        second.add_paragraph(Paragraph::with_text("b"));
        doc.add_page(second);

        let mut trace = Trace::default();
        walk(&doc, &mut trace).unwrap();
        assert_eq!(trace.0, vec!["p1:a", "t1", "break2", "p2:b"]);
    }

    #[test]
    fn test_location_display() {
        let at = Location {
            page: 2,
            block: 4,
            section: Some("tabelle".into()),
        };
        assert_eq!(at.to_string(), "section 'tabelle', page 2, block 4");
    }

    #[test]
    fn test_check_table() {
        let at = Location {
            page: 1,
            block: 1,
            section: None,
        };
        assert!(check_table(&Table::new(), &at).is_err());

        let mut table = Table::new();
        table.add_row(TableRow::new(Vec::new()));
        let err = check_table(&table, &at).unwrap_err();
        assert!(err.to_string().contains("row 1 has no cells"));

        assert!(check_table(&Table::from_text(["a"], Vec::new()), &at).is_ok());
    }

    #[test]
    fn test_text_collector_matches_document() {
        let doc = crate::markup::parse("<p>uno</p>[PAGE_BREAK][PAGE_BREAK]<p>due</p>");
        let mut collector = TextCollector::new();
        walk(&doc, &mut collector).unwrap();
        assert_eq!(collector.finish(), doc.plain_text());
    }
}
