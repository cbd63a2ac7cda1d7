//! Document AST shared by every emitter.
//!
//! The markup parser produces a [`Document`]; the structured, fixed-layout,
//! text and JSON emitters are all folds over the same tree, so they agree on
//! reading order and run content.

mod document;
mod page;
mod paragraph;
mod table;

pub use document::{Document, Metadata};
pub use page::{Block, Page, A4_HEIGHT_PT, A4_WIDTH_PT};
pub use paragraph::{
    pt_to_half_points, Alignment, InlineContent, ListInfo, ListStyle, Paragraph, ParagraphStyle,
    TextRun, TextStyle,
};
pub use table::{Table, TableCell, TableRow, BORDER_COLOR, DEFAULT_HEADER_FILL};
