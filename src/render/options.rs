//! Rendering options and configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::template::TemplateFormat;

/// Options shared by every emitter.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Emit each section's title as a heading before its content
    pub section_titles: bool,

    /// Paper size of the emitted pages
    pub paper: PaperSize,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable section title headings.
    pub fn with_section_titles(mut self, enabled: bool) -> Self {
        self.section_titles = enabled;
        self
    }

    /// Set the paper size.
    pub fn with_paper(mut self, paper: PaperSize) -> Self {
        self.paper = paper;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            section_titles: true,
            paper: PaperSize::A4,
        }
    }
}

/// Portrait paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaperSize {
    /// ISO A4, 210 x 297 mm
    #[default]
    A4,
    /// US Letter, 8.5 x 11 in
    Letter,
}

impl PaperSize {
    /// Width and height in twentieths of a point.
    pub fn twips(&self) -> (u32, u32) {
        match self {
            PaperSize::A4 => (11906, 16838),
            PaperSize::Letter => (12240, 15840),
        }
    }

    /// CSS `@page` size keyword.
    pub fn css_name(&self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::Letter => "letter",
        }
    }
}

/// Options for the external page renderer.
#[derive(Debug, Clone, Default)]
pub struct PdfOptions {
    /// Browser binary; detected from the environment when unset
    pub browser: Option<PathBuf>,

    /// Extra command-line arguments passed to the browser
    pub extra_args: Vec<String>,
}

impl PdfOptions {
    /// Create new PDF options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific browser binary.
    pub fn with_browser(mut self, path: impl Into<PathBuf>) -> Self {
        self.browser = Some(path.into());
        self
    }

    /// Append an extra browser argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}

/// Output encodings a rendered document can be exported to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Structured word-processor document
    #[default]
    Docx,

    /// Fixed-layout pages through the external renderer
    Pdf,

    /// Print-oriented markup fed to the page renderer
    Html,

    /// Document tree as JSON
    Json,

    /// Plain text
    Text,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Text => "txt",
        }
    }

    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Html => "text/html",
            OutputFormat::Json => "application/json",
            OutputFormat::Text => "text/plain",
        }
    }
}

impl From<TemplateFormat> for OutputFormat {
    fn from(format: TemplateFormat) -> Self {
        match format {
            TemplateFormat::Docx => OutputFormat::Docx,
            TemplateFormat::Pdf => OutputFormat::Pdf,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" | "word" => Ok(OutputFormat::Docx),
            "pdf" => Ok(OutputFormat::Pdf),
            "html" | "htm" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            "text" | "txt" => Ok(OutputFormat::Text),
            other => Err(format!("Unknown output format '{}'", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_builder() {
        let options = RenderOptions::new()
            .with_section_titles(false)
            .with_paper(PaperSize::Letter);

        assert!(!options.section_titles);
        assert_eq!(options.paper, PaperSize::Letter);
        assert!(RenderOptions::default().section_titles);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("DOCX".parse::<OutputFormat>(), Ok(OutputFormat::Docx));
        assert_eq!("txt".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("odt".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::from(TemplateFormat::Pdf), OutputFormat::Pdf);
        assert_eq!(OutputFormat::Pdf.to_string(), "pdf");
    }

    #[test]
    fn test_pdf_options_builder() {
        let options = PdfOptions::new()
            .with_browser("/opt/chrome")
            .with_arg("--lang=it");
        assert_eq!(options.browser, Some(PathBuf::from("/opt/chrome")));
        assert_eq!(options.extra_args, vec!["--lang=it"]);
    }
}
