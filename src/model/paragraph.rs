//! Paragraph and run-level types.

use serde::{Deserialize, Serialize};

/// A paragraph of formatted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Runs and line breaks in reading order
    pub content: Vec<InlineContent>,

    /// Paragraph style
    pub style: ParagraphStyle,

    /// Id of the template section the paragraph came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Paragraph {
    /// Create a new empty paragraph.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            style: ParagraphStyle::default(),
            section: None,
        }
    }

    /// Create a paragraph with plain text.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_text(text);
        p
    }

    /// Create a heading paragraph (levels 1 to 3).
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        let mut p = Self::with_text(text);
        p.style.heading_level = Some(level.clamp(1, 3));
        p
    }

    /// Set the alignment and return self.
    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.style.alignment = alignment;
        self
    }

    /// Add plain text to the paragraph.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.content.push(InlineContent::Text(TextRun::new(text)));
    }

    /// Add a styled text run.
    pub fn add_run(&mut self, run: TextRun) {
        self.content.push(InlineContent::Text(run));
    }

    /// Add a line break.
    pub fn add_line_break(&mut self) {
        self.content.push(InlineContent::LineBreak);
    }

    /// Text runs, skipping line breaks.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.content.iter().filter_map(|c| match c {
            InlineContent::Text(run) => Some(run),
            InlineContent::LineBreak => None,
        })
    }

    /// Get plain text content of the paragraph.
    pub fn plain_text(&self) -> String {
        let text: String = self
            .content
            .iter()
            .map(|c| match c {
                InlineContent::Text(run) => run.text.as_str(),
                InlineContent::LineBreak => "\n",
            })
            .collect();
        match &self.style.list_info {
            Some(info) => format!("{}{}", info.marker(), text),
            None => text,
        }
    }

    /// Check whether the paragraph has any run at all.
    pub fn is_empty(&self) -> bool {
        self.runs().all(TextRun::is_empty)
    }

    /// Check if this is a heading.
    pub fn is_heading(&self) -> bool {
        self.style.heading_level.is_some()
    }

    /// Get the heading level (1-3) or None.
    pub fn heading_level(&self) -> Option<u8> {
        self.style.heading_level
    }

    /// Check if this is a list item.
    pub fn is_list_item(&self) -> bool {
        self.style.list_info.is_some()
    }
}

impl Default for Paragraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Inline content within a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineContent {
    /// A text run with styling
    Text(TextRun),

    /// An explicit line break (`<br>`)
    LineBreak,
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Text styling
    pub style: TextStyle,
}

impl TextRun {
    /// Create a new text run with default style.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }

    /// Create a text run with a style.
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Create a bold text run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                bold: true,
                ..Default::default()
            },
        )
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Run formatting state.
///
/// Unset font, size and color fall back to the document defaults at
/// emission time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    pub bold: bool,

    /// Italic text
    pub italic: bool,

    /// Underlined text
    pub underline: bool,

    /// Font family name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,

    /// Font size in half-points (`22` is 11 pt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,

    /// Text color as uppercase `RRGGBB`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Convert points to half-points, never below one.
pub fn pt_to_half_points(pt: f32) -> u32 {
    (pt * 2.0).round().max(1.0) as u32
}

/// Paragraph styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Heading level (1-3) or None for a body paragraph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,

    /// Text alignment
    pub alignment: Alignment,

    /// List information if this is a list item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_info: Option<ListInfo>,

    /// Line spacing multiplier (1.0 = single)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f32>,
}

/// Text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left alignment (default)
    #[default]
    Left,
    /// Center alignment
    Center,
    /// Right alignment
    Right,
    /// Justified alignment
    Justify,
}

impl Alignment {
    /// Parse a CSS `text-align` value or editor alignment class suffix.
    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }

    /// CSS keyword for this alignment.
    pub fn as_css(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

/// Information about a list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListInfo {
    /// List style (ordered or unordered)
    pub style: ListStyle,

    /// Nesting level (0 = top level)
    pub level: u8,

    /// Item number for ordered lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_number: Option<u32>,
}

impl ListInfo {
    /// Create a new bulleted list item.
    pub fn bullet(level: u8) -> Self {
        Self {
            style: ListStyle::Unordered,
            level,
            item_number: None,
        }
    }

    /// Create a new numbered list item.
    pub fn numbered(level: u8, number: u32) -> Self {
        Self {
            style: ListStyle::Ordered,
            level,
            item_number: Some(number),
        }
    }

    /// Marker text written before the item's runs.
    pub fn marker(&self) -> String {
        match (self.style, self.item_number) {
            (ListStyle::Ordered, Some(n)) => format!("{}. ", n),
            _ => "\u{2022} ".to_string(),
        }
    }
}

/// List style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    /// Ordered (numbered) list
    Ordered,
    /// Unordered (bulleted) list
    Unordered,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_size_is_half_points() {
        assert_eq!(pt_to_half_points(10.5), 21);
        assert_eq!(pt_to_half_points(0.1), 1);

        let style = TextStyle {
            font_size: Some(21),
            ..TextStyle::default()
        };
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["font_size"], 21);
    }

    #[test]
    fn test_paragraph_plain_text() {
        let mut p = Paragraph::new();
        p.add_text("Serbatoio ");
        p.add_run(TextRun::bold("S1"));
        p.add_line_break();
        p.add_text("PS 13 bar");

        assert_eq!(p.plain_text(), "Serbatoio S1\nPS 13 bar");
        assert_eq!(p.runs().count(), 3);
    }

    #[test]
    fn test_heading_level_is_clamped() {
        let h = Paragraph::heading("Premessa", 5);
        assert!(h.is_heading());
        assert_eq!(h.heading_level(), Some(3));
    }

    #[test]
    fn test_list_marker() {
        let mut item = Paragraph::with_text("valvola di sicurezza");
        item.style.list_info = Some(ListInfo::numbered(0, 2));
        assert_eq!(item.plain_text(), "2. valvola di sicurezza");
        assert_eq!(ListInfo::bullet(0).marker(), "\u{2022} ");
    }

    #[test]
    fn test_alignment_from_css() {
        assert_eq!(Alignment::from_css(" Center "), Some(Alignment::Center));
        assert_eq!(Alignment::from_css("justify"), Some(Alignment::Justify));
        assert_eq!(Alignment::from_css("inherit"), None);
    }

    #[test]
    fn test_whitespace_run_is_not_empty() {
        assert!(!Paragraph::with_text(" ").is_empty());
        assert!(Paragraph::new().is_empty());
    }
}
