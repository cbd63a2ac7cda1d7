//! Template data model.
//!
//! A [`Template`] is an ordered list of [`Section`]s plus document metadata,
//! named partials and (unexecutable) custom helper sources. Everything here
//! maps one-to-one onto the JSON shape stored by the surrounding application.

pub mod condition;
pub mod variant;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use condition::{Condition, ConditionProbe, LogicalOperator, Operator};
pub use variant::{select_variant, BlockKind, ConditionalBlock, Variant};

/// Default page margins in centimetres (top, bottom, left, right).
pub const DEFAULT_MARGINS_CM: PageMargins = PageMargins {
    top: 2.5,
    bottom: 2.5,
    left: 2.5,
    right: 1.5,
};

/// Default body font family.
pub const DEFAULT_FONT: &str = "Cambria";

/// Default body font size in points.
pub const DEFAULT_FONT_SIZE_PT: f64 = 11.0;

/// A complete document template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Preferred output encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<TemplateFormat>,

    /// Page and font settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Sections in document order
    #[serde(default)]
    pub sections: Vec<Section>,

    /// Named sub-templates available to every section
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partials: BTreeMap<String, String>,

    /// Custom helper source text; never executed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub helpers: BTreeMap<String, String>,
}

impl Template {
    /// Create a template from sections.
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            sections,
            ..Default::default()
        }
    }

    /// Parse a template from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add a named partial.
    pub fn with_partial(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.partials.insert(name.into(), source.into());
        self
    }

    /// Set document metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sections that take part in rendering.
    pub fn enabled_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.enabled)
    }

    /// Metadata, or the defaults when none is set.
    pub fn metadata(&self) -> Metadata {
        self.metadata.clone().unwrap_or_default()
    }
}

/// Output encoding named by a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    /// Structured word-processor document
    Docx,
    /// Fixed-layout pages
    Pdf,
}

/// Document-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Page margins in centimetres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_margins: Option<PageMargins>,

    /// Body font family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_font: Option<String>,

    /// Body font size in points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_font_size: Option<f64>,
}

impl Metadata {
    /// Margins with zero or missing sides replaced by the defaults.
    pub fn margins(&self) -> PageMargins {
        let given = self.page_margins.unwrap_or(DEFAULT_MARGINS_CM);
        let pick = |v: f64, fallback: f64| if v > 0.0 && v.is_finite() { v } else { fallback };
        PageMargins {
            top: pick(given.top, DEFAULT_MARGINS_CM.top),
            bottom: pick(given.bottom, DEFAULT_MARGINS_CM.bottom),
            left: pick(given.left, DEFAULT_MARGINS_CM.left),
            right: pick(given.right, DEFAULT_MARGINS_CM.right),
        }
    }

    /// Body font family, falling back to Cambria.
    pub fn font(&self) -> &str {
        self.default_font
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FONT)
    }

    /// Body font size in points, falling back to 11.
    pub fn font_size(&self) -> f64 {
        self.default_font_size
            .filter(|s| *s > 0.0 && s.is_finite())
            .unwrap_or(DEFAULT_FONT_SIZE_PT)
    }
}

/// Page margins in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    /// Top margin
    #[serde(default)]
    pub top: f64,
    /// Bottom margin
    #[serde(default)]
    pub bottom: f64,
    /// Left margin
    #[serde(default)]
    pub left: f64,
    /// Right margin
    #[serde(default)]
    pub right: f64,
}

impl PageMargins {
    /// Margins as (top, right, bottom, left), the order page renderers expect.
    pub fn as_trbl(&self) -> [f64; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

/// One render target of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique id
    #[serde(default)]
    pub id: String,

    /// Display title
    #[serde(default)]
    pub title: String,

    /// Disabled sections are skipped
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Section kind
    #[serde(rename = "type")]
    pub kind: SectionKind,

    /// Kind-dependent content
    #[serde(default)]
    pub template: SectionTemplate,
}

fn enabled_by_default() -> bool {
    true
}

impl Section {
    /// Create an enabled section.
    pub fn new(id: impl Into<String>, kind: SectionKind, template: SectionTemplate) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            enabled: true,
            kind,
            template,
        }
    }

    /// A paragraph section with a text template.
    pub fn paragraph(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, SectionKind::Paragraph, SectionTemplate::Text(source.into()))
    }

    /// A conditional section from its blocks.
    pub fn conditional(id: impl Into<String>, blocks: Vec<ConditionalBlock>) -> Self {
        Self::new(id, SectionKind::Conditional, SectionTemplate::Conditional(blocks))
    }

    /// A table section.
    pub fn table(id: impl Into<String>, table: TableTemplate) -> Self {
        Self::new(id, SectionKind::Table, SectionTemplate::Table(table))
    }

    /// Set the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Enable or disable the section.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Section kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// Body text
    Paragraph,
    /// Heading text
    Heading,
    /// Tabular data
    Table,
    /// Conditional blocks
    Conditional,
    /// Free-form text
    Custom,
}

impl SectionKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Paragraph => "paragraph",
            SectionKind::Heading => "heading",
            SectionKind::Table => "table",
            SectionKind::Conditional => "conditional",
            SectionKind::Custom => "custom",
        }
    }

    /// Whether a content shape is valid for this kind.
    pub fn accepts(&self, template: &SectionTemplate) -> bool {
        matches!(
            (self, template),
            (
                SectionKind::Paragraph | SectionKind::Heading | SectionKind::Custom,
                SectionTemplate::Text(_)
            ) | (SectionKind::Table, SectionTemplate::Table(_))
                | (SectionKind::Conditional, SectionTemplate::Conditional(_))
        )
    }
}

/// Section content; its shape depends on the section kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionTemplate {
    /// Single template string
    Text(String),
    /// Conditional blocks
    Conditional(Vec<ConditionalBlock>),
    /// Table headers plus a rows template
    Table(TableTemplate),
}

impl Default for SectionTemplate {
    fn default() -> Self {
        SectionTemplate::Text(String::new())
    }
}

impl SectionTemplate {
    /// Short name of the content shape.
    pub fn shape(&self) -> &'static str {
        match self {
            SectionTemplate::Text(_) => "text",
            SectionTemplate::Conditional(_) => "conditional blocks",
            SectionTemplate::Table(_) => "table",
        }
    }
}

/// Template for a table section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableTemplate {
    /// Column headers
    #[serde(default)]
    pub headers: Vec<String>,

    /// Template evaluating to a JSON array of string rows
    #[serde(default)]
    pub rows: String,

    /// Presentation hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<TableStyle>,
}

impl TableTemplate {
    /// Create a table template.
    pub fn new(headers: Vec<String>, rows: impl Into<String>) -> Self {
        Self {
            headers,
            rows: rows.into(),
            style: None,
        }
    }
}

/// Presentation hints for a table section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStyle {
    /// Header shading as hex, e.g. `D9D9D9`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_background_color: Option<String>,

    /// CSS-like width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,

    /// Draw borders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borders: Option<bool>,

    /// Cell padding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_padding: Option<f64>,
}
