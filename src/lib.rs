//! # rendoc
//!
//! Logic-bearing document templates rendered to DOCX and PDF.
//!
//! A [`Template`] is a list of sections written in a Handlebars-style
//! language. Rendering evaluates each section against a JSON record, parses
//! the resulting rich-text markup into a document tree and emits that tree as
//! a structured word-processor package or as fixed-layout pages.
//!
//! ## Quick Start
//!
//! ```
//! use rendoc::{Section, Template};
//! use serde_json::json;
//!
//! fn main() -> rendoc::Result<()> {
//!     let template = Template::new(vec![
//!         Section::paragraph("intro", "<p>Cliente: <b>{{uppercase cliente}}</b></p>")
//!             .with_title("Premessa"),
//!     ]);
//!
//!     let rendered = rendoc::render(&template, &json!({"cliente": "acme"}))?;
//!     assert_eq!(rendered.plain_text(), "Premessa\n\nCliente: ACME");
//!
//!     let docx = rendered.to_structured_document_bytes()?;
//!     assert!(docx.starts_with(b"PK"));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Template language**: conditionals, iteration, helpers, partials
//! - **Conditional variants**: alternative texts chosen per record
//! - **Domain helpers**: pressure-equipment arithmetic and classification
//! - **Two encodings from one tree**: DOCX and PDF carry the same runs
//! - **Validation**: every section error reported at once
//! - **Parallel batches**: one template over many records with Rayon

pub mod engine;
pub mod error;
pub mod markup;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod template;

// Re-export commonly used types
pub use engine::{Engine, HelperCall, HelperError, HelperRegistry, TemplateError, PAGE_BREAK};
pub use error::{Error, Result};
pub use model::{
    Alignment, Block, Document, InlineContent, ListInfo, Page, Paragraph, ParagraphStyle, Table,
    TableCell, TableRow, TextRun, TextStyle,
};
pub use pipeline::{
    render, render_batch, validate, RenderedDocument, RenderedSection, Renderer, SectionIssue,
    ValidationReport,
};
pub use render::{
    ChromeRenderer, JsonFormat, OutputFormat, PageRenderer, PageSetup, PaperSize, PdfOptions,
    RenderOptions,
};
pub use template::{
    Condition, ConditionalBlock, LogicalOperator, Operator, Section, SectionKind,
    SectionTemplate, TableTemplate, Template, Variant,
};

use std::fs;
use std::path::Path;

use serde_json::Value;

/// Load a template from a JSON file.
///
/// # Example
///
/// ```no_run
/// let template = rendoc::load_template("verbale.json")?;
/// println!("{} sections", template.sections.len());
/// # Ok::<(), rendoc::Error>(())
/// ```
pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Template> {
    let json = fs::read_to_string(path)?;
    Template::from_json(&json)
}

/// Load a record from a JSON file.
pub fn load_record<P: AsRef<Path>>(path: P) -> Result<Value> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Render a template file against a record file.
///
/// # Example
///
/// ```no_run
/// let rendered = rendoc::render_file("verbale.json", "impianto.json")?;
/// std::fs::write("verbale.docx", rendered.to_structured_document_bytes()?)?;
/// # Ok::<(), rendoc::Error>(())
/// ```
pub fn render_file<P: AsRef<Path>, Q: AsRef<Path>>(
    template: P,
    record: Q,
) -> Result<RenderedDocument> {
    let template = load_template(template)?;
    let record = load_record(record)?;
    render(&template, &record)
}

/// Render a template given as JSON text against a record given as JSON text.
pub fn render_json(template: &str, record: &str) -> Result<RenderedDocument> {
    let template = Template::from_json(template)?;
    let record: Value = serde_json::from_str(record)?;
    render(&template, &record)
}

/// Render a template and return the document's plain text.
pub fn render_text(template: &Template, record: &Value) -> Result<String> {
    Ok(render(template, record)?.plain_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEMPLATE: &str = r#"{
        "format": "docx",
        "sections": [
            {
                "id": "intro",
                "title": "Premessa",
                "enabled": true,
                "type": "paragraph",
                "template": "<p>Impianto di {{cliente}}</p>"
            },
            {
                "id": "nota",
                "title": "",
                "enabled": false,
                "type": "paragraph",
                "template": "<p>mai</p>"
            }
        ]
    }"#;

    #[test]
    fn test_render_json() {
        let rendered = render_json(TEMPLATE, r#"{"cliente": "Acme"}"#).unwrap();
        assert_eq!(rendered.plain_text(), "Premessa\n\nImpianto di Acme");
    }

    #[test]
    fn test_render_json_bad_input() {
        assert!(matches!(render_json("{", "{}"), Err(Error::Json(_))));
        assert!(matches!(render_json(TEMPLATE, "[1,"), Err(Error::Json(_))));
    }

    #[test]
    fn test_render_file() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.json");
        let record_path = dir.path().join("record.json");
        fs::File::create(&template_path)
            .unwrap()
            .write_all(TEMPLATE.as_bytes())
            .unwrap();
        fs::write(&record_path, r#"{"cliente": "Beta"}"#).unwrap();

        let rendered = render_file(&template_path, &record_path).unwrap();
        assert_eq!(rendered.sections().len(), 1);
        assert!(rendered.plain_text().ends_with("Beta"));
    }

    #[test]
    fn test_missing_file() {
        let result = load_template("/nonexistent/template.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_render_text_literal_is_unchanged() {
        let template = Template::new(vec![Section::paragraph("p", "Testo senza segnaposto.")]);
        assert_eq!(
            render_text(&template, &serde_json::json!({})).unwrap(),
            "Testo senza segnaposto."
        );
    }
}
