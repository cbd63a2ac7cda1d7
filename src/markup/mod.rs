//! Rich-text markup to document model.
//!
//! Rendered sections are HTML fragments produced by a rich-text editor.
//! They are parsed with html5ever and walked once into [`Block`]s; the
//! `[PAGE_BREAK]` sentinel ends the current [`Page`].
//!
//! ```
//! let doc = rendoc::markup::parse("<h1>Verbale</h1><p>Testo<br>a capo</p>");
//! assert_eq!(doc.page_count(), 1);
//! assert_eq!(doc.plain_text(), "Verbale\n\nTesto\na capo");
//! ```

mod dom;
pub mod style;
pub mod table_notation;
mod walker;

pub use table_notation::{decode_entities, expand_inline_tables, parse_inline_table, InlineTable};

use crate::model::{Block, Document, Metadata, Page};
use walker::{Event, Walker};

/// Accumulates rendered sections into a paged [`Document`].
#[derive(Debug)]
pub struct DocumentBuilder {
    metadata: Metadata,
    pages: Vec<Page>,
    current: Page,
    section: Option<String>,
}

impl DocumentBuilder {
    /// Start an empty document with the given page setup.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            pages: Vec::new(),
            current: Page::a4(1),
            section: None,
        }
    }

    /// Tag blocks pushed from now on with a section id.
    pub fn begin_section(&mut self, id: impl Into<String>) {
        self.section = Some(id.into());
    }

    /// Parse a markup fragment and append its blocks.
    pub fn push_markup(&mut self, html: &str) {
        let expanded = expand_inline_tables(html);
        let parsed = dom::parse(&expanded);
        let Some(body) = dom::body(&parsed) else {
            log::warn!("Markup without a body element skipped");
            return;
        };

        for event in Walker::new(self.section.clone()).walk(&body) {
            match event {
                Event::Block(block) => self.current.add_block(block),
                Event::PageBreak => self.page_break(),
            }
        }
    }

    /// Append a block built outside the markup path.
    pub fn push_block(&mut self, mut block: Block) {
        if let Some(section) = &self.section {
            match &mut block {
                Block::Paragraph(p) if p.section.is_none() => p.section = Some(section.clone()),
                Block::Table(t) if t.section.is_none() => t.section = Some(section.clone()),
                _ => {}
            }
        }
        self.current.add_block(block);
    }

    /// Close the current page and start a new one.
    pub fn page_break(&mut self) {
        let next = Page::a4(self.current.number + 1);
        let finished = std::mem::replace(&mut self.current, next);
        self.pages.push(finished);
    }

    /// Number of the page currently being filled.
    pub fn current_page(&self) -> u32 {
        self.current.number
    }

    /// Finish the document. The last page is kept even when empty.
    ///
    /// Without an explicit title, the first non-empty heading names the
    /// document.
    pub fn finish(mut self) -> Document {
        self.pages.push(self.current);
        let mut doc = Document {
            metadata: self.metadata,
            pages: self.pages,
        };
        if doc.metadata.title.is_none() {
            doc.metadata.title = first_heading(&doc);
        }
        doc
    }
}

fn first_heading(doc: &Document) -> Option<String> {
    doc.blocks().find_map(|block| match block {
        Block::Paragraph(p) if p.is_heading() => {
            Some(p.plain_text().trim().to_string()).filter(|t| !t.is_empty())
        }
        _ => None,
    })
}

/// Parse a standalone markup fragment with default page setup.
pub fn parse(html: &str) -> Document {
    let mut builder = DocumentBuilder::new(Metadata::default());
    builder.push_markup(html);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, Table};

    #[test]
    fn test_page_break_starts_new_page() {
        let doc = parse("<p>uno</p>[PAGE_BREAK]<p>due</p>");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages[0].plain_text(), "uno");
        assert_eq!(doc.pages[1].plain_text(), "due");
        assert_eq!(doc.pages[1].number, 2);
    }

    #[test]
    fn test_inline_table_becomes_table_block() {
        let doc = parse("<p>Elenco</p>[[TABLE:t1:A|B::1|2||3|4]]");
        let blocks: Vec<&Block> = doc.blocks().collect();
        assert_eq!(blocks.len(), 2);
        let Block::Table(table) = blocks[1] else {
            panic!("expected a table");
        };
        assert_eq!(table.header_rows, 1);
        assert_eq!(table.plain_text(), "A\tB\n1\t2\n3\t4");
    }

    #[test]
    fn test_sections_are_tagged() {
        let mut builder = DocumentBuilder::new(Metadata::default());
        builder.begin_section("premessa");
        builder.push_markup("<p>a</p>");
        builder.push_block(Block::Table(Table::from_text(["x"], Vec::new())));
        builder.begin_section("conclusioni");
        builder.push_block(Block::Paragraph(Paragraph::with_text("b")));
        let doc = builder.finish();

        let sections: Vec<Option<&str>> = doc.blocks().map(Block::section).collect();
        assert_eq!(
            sections,
            vec![Some("premessa"), Some("premessa"), Some("conclusioni")]
        );
    }

    #[test]
    fn test_trailing_page_break_leaves_empty_page() {
        let doc = parse("<p>fine</p>[PAGE_BREAK]");
        assert_eq!(doc.page_count(), 2);
        assert!(doc.pages[1].is_empty());
        assert_eq!(doc.plain_text(), "fine");
    }

    #[test]
    fn test_title_from_first_heading() {
        let doc = parse("<p>intro</p><h2> Verbale di verifica </h2><h1>Altro</h1>");
        assert_eq!(doc.metadata.title.as_deref(), Some("Verbale di verifica"));
        assert!(parse("<p>solo testo</p>").metadata.title.is_none());

        let mut builder = DocumentBuilder::new(Metadata {
            title: Some("Fisso".into()),
            ..Metadata::default()
        });
        builder.push_markup("<h1>Titolo</h1>");
        assert_eq!(builder.finish().metadata.title.as_deref(), Some("Fisso"));
    }

    #[test]
    fn test_empty_markup() {
        let doc = parse("");
        assert_eq!(doc.page_count(), 1);
        assert!(doc.is_empty());
    }
}
