//! Emitters converting the document tree to output encodings.
//!
//! Each emitter is a fold over the same tree (see [`visitor`]), so every
//! encoding carries the same blocks in the same order.

mod docx;
mod html;
mod json;
mod options;
pub mod pdf;
mod text;
pub mod visitor;

pub use docx::{cm_to_twips, document_xml, heading_metrics, to_docx};
pub use html::{inject_style, to_html};
pub use json::{from_json, to_json, JsonFormat};
pub use options::{OutputFormat, PaperSize, PdfOptions, RenderOptions};
pub use pdf::{to_fixed_layout_markup, to_pdf, ChromeRenderer, PageRenderer, PageSetup};
pub use text::to_text;
pub use visitor::{walk, DocumentVisitor, Location, TextCollector};
