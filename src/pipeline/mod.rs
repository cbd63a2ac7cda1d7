//! Template rendering pipeline.
//!
//! A render evaluates every enabled section of a template against a record,
//! parses the resulting markup into the document tree and keeps both so the
//! caller can pick an output encoding afterwards.
//!
//! Each render builds its own [`Engine`], so helpers and partials never leak
//! between templates or between concurrent renders.
//!
//! # Example
//!
//! ```
//! use rendoc::pipeline::Renderer;
//! use rendoc::template::{Section, Template};
//! use serde_json::json;
//!
//! let template = Template::new(vec![Section::paragraph(
//!     "serbatoi",
//!     "{{#each serbatoi}}<p>Serbatoio {{this.codice}}: PS×V = {{psXvolume this.ps this.volume}}</p>{{/each}}",
//! )]);
//! let record = json!({"serbatoi": [{"codice": "S1", "ps": 13, "volume": 500}]});
//!
//! let rendered = Renderer::new().render(&template, &record).unwrap();
//! assert_eq!(rendered.plain_text(), "Serbatoio S1: PS×V = 6500");
//! ```

mod section;
mod validate;

use rayon::prelude::*;
use serde_json::Value;

use crate::engine::{Engine, HelperCall, HelperError, HelperRegistry};
use crate::error::{Error, Result};
use crate::markup::DocumentBuilder;
use crate::model::{Block, Document, Metadata, Paragraph, Table};
use crate::render::{
    self, ChromeRenderer, JsonFormat, OutputFormat, PageRenderer, RenderOptions,
};
use crate::template::Template;

pub use section::{parse_rows, render_section, RenderedSection, RenderedTable, SECTION_TABLE_FILL};
pub use validate::{validate_with, SectionIssue, ValidationReport};

/// Render a template with the built-in helpers and default options.
pub fn render(template: &Template, record: &Value) -> Result<RenderedDocument> {
    Renderer::new().render(template, record)
}

/// Validate a template against the built-in helpers.
pub fn validate(template: &Template) -> ValidationReport {
    Renderer::new().validate(template)
}

/// Render one template against many records in parallel.
pub fn render_batch(template: &Template, records: &[Value]) -> Vec<Result<RenderedDocument>> {
    Renderer::new().render_batch(template, records)
}

/// Builder for rendering templates.
///
/// # Example
///
/// ```
/// use rendoc::pipeline::Renderer;
/// use rendoc::render::RenderOptions;
/// use rendoc::template::{Section, Template};
/// use serde_json::json;
///
/// let renderer = Renderer::new()
///     .with_helper("euro", |call| {
///         Ok(json!(format!("{:.2} €", call.number(0))))
///     })
///     .with_options(RenderOptions::new().with_section_titles(false));
///
/// let template = Template::new(vec![Section::paragraph("costo", "<p>{{euro importo}}</p>")]);
/// let rendered = renderer.render(&template, &json!({"importo": 12.5}))?;
/// assert_eq!(rendered.plain_text(), "12.50 €");
/// # Ok::<(), rendoc::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Renderer {
    helpers: HelperRegistry,
    options: RenderOptions,
}

impl Renderer {
    /// Create a renderer with the built-in helpers.
    pub fn new() -> Self {
        Self {
            helpers: HelperRegistry::with_builtins(),
            options: RenderOptions::default(),
        }
    }

    /// Register a native helper, replacing any helper with the same name.
    pub fn with_helper<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: Fn(&HelperCall<'_>) -> std::result::Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.helpers.register(name, helper);
        self
    }

    /// Set render options.
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Current render options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Helpers available to templates.
    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// Collect every error and warning of a template without rendering it.
    pub fn validate(&self, template: &Template) -> ValidationReport {
        validate_with(template, &self.helpers)
    }

    /// Render a template against a record.
    ///
    /// Structural problems fail with [`Error::Invalid`] before anything is
    /// evaluated. Compile and evaluation failures fail with
    /// [`Error::Section`] naming the section.
    pub fn render(&self, template: &Template, record: &Value) -> Result<RenderedDocument> {
        let mut report = ValidationReport::default();
        validate::check_structure(template, &mut report);
        if !report.is_valid() {
            return Err(Error::Invalid(report));
        }

        let engine = self.engine(template)?;
        let sections = template
            .enabled_sections()
            .map(|section| render_section(&engine, section, record))
            .collect::<Result<Vec<_>>>()?;

        let document = self.assemble(template, &sections);
        log::debug!(
            "Rendered {} sections into {} pages",
            sections.len(),
            document.page_count()
        );

        Ok(RenderedDocument {
            document,
            sections,
            options: self.options.clone(),
        })
    }

    /// Render one template against many records in parallel.
    ///
    /// Results keep the order of `records`.
    pub fn render_batch(
        &self,
        template: &Template,
        records: &[Value],
    ) -> Vec<Result<RenderedDocument>> {
        self.render_batch_with(template, records, |_, _| {})
    }

    /// Like [`render_batch`](Self::render_batch), calling `progress` with the
    /// record index as each render finishes.
    pub fn render_batch_with<F>(
        &self,
        template: &Template,
        records: &[Value],
        progress: F,
    ) -> Vec<Result<RenderedDocument>>
    where
        F: Fn(usize, &Result<RenderedDocument>) + Send + Sync,
    {
        records
            .par_iter()
            .enumerate()
            .map(|(index, record)| {
                let result = self.render(template, record);
                progress(index, &result);
                result
            })
            .collect()
    }

    fn engine(&self, template: &Template) -> Result<Engine> {
        let mut engine = Engine::with_helpers(self.helpers.clone());
        for (name, source) in &template.partials {
            engine
                .register_partial(name.as_str(), source)
                .map_err(|e| Error::section(format!("partial:{}", name), e))?;
        }
        for name in template.helpers.keys() {
            if !self.helpers.contains(name) {
                log::warn!(
                    "Custom helper '{}' is source text and will not run; register it natively",
                    name
                );
            }
        }
        Ok(engine)
    }

    fn assemble(&self, template: &Template, sections: &[RenderedSection]) -> Document {
        let mut builder = DocumentBuilder::new(Metadata::from_template(&template.metadata()));

        for section in sections {
            builder.begin_section(section.id.as_str());

            let title = section.title.trim();
            if self.options.section_titles && !title.is_empty() {
                builder.push_block(Block::Paragraph(Paragraph::heading(
                    title,
                    section.title_level(),
                )));
            }

            match &section.table {
                Some(table) if table.headers.is_empty() && table.rows.is_empty() => {
                    log::warn!("Section '{}': table has no headers and no rows", section.id);
                }
                Some(table) => builder.push_block(Block::Table(
                    Table::from_text(table.headers.iter().cloned(), table.rows.iter().cloned())
                        .with_header_fill(table.header_fill.as_str()),
                )),
                None => builder.push_markup(&section.markup),
            }
        }

        builder.finish()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a render: the document tree plus per-section output.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    document: Document,
    sections: Vec<RenderedSection>,
    options: RenderOptions,
}

impl RenderedDocument {
    /// The document tree.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consume and return the document tree.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Output of each enabled section, in template order.
    pub fn sections(&self) -> &[RenderedSection] {
        &self.sections
    }

    /// Output of one section.
    pub fn section(&self, id: &str) -> Option<&RenderedSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Plain text of the whole document.
    pub fn plain_text(&self) -> String {
        self.document.plain_text()
    }

    /// JSON dump of the document tree.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.document, format)
    }

    /// Structured word-processor package (DOCX).
    pub fn to_structured_document_bytes(&self) -> Result<Vec<u8>> {
        render::to_docx(&self.document, &self.options)
    }

    /// Print-styled HTML as handed to the page renderer.
    pub fn to_fixed_layout_markup(&self) -> Result<String> {
        render::to_fixed_layout_markup(&self.document, &self.options)
    }

    /// Fixed-layout pages (PDF) through a headless browser found on the system.
    pub fn to_fixed_layout_bytes(&self) -> Result<Vec<u8>> {
        self.to_fixed_layout_bytes_with(&ChromeRenderer::new())
    }

    /// Fixed-layout pages (PDF) through the given page renderer.
    pub fn to_fixed_layout_bytes_with(&self, renderer: &dyn PageRenderer) -> Result<Vec<u8>> {
        render::to_pdf(&self.document, &self.options, renderer)
    }

    /// Encode in any supported format, using `renderer` for PDF output.
    pub fn to_bytes(&self, format: OutputFormat, renderer: &dyn PageRenderer) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Docx => self.to_structured_document_bytes(),
            OutputFormat::Pdf => self.to_fixed_layout_bytes_with(renderer),
            OutputFormat::Html => Ok(self.to_fixed_layout_markup()?.into_bytes()),
            OutputFormat::Json => Ok(self.to_json(JsonFormat::Pretty)?.into_bytes()),
            OutputFormat::Text => Ok(render::to_text(&self.document)?.into_bytes()),
        }
    }
}
