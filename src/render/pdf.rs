//! Fixed-layout pages through an external page renderer.
//!
//! The fixed-layout markup is handed to a [`PageRenderer`] together with the
//! page setup. [`ChromeRenderer`] shells out to a Chrome/Chromium binary in
//! headless mode and prints the page to PDF.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::tempdir;
use url::Url;
use which::which;

use super::html::{inject_style, to_html};
use super::options::{PaperSize, PdfOptions, RenderOptions};
use crate::error::{Error, Result};
use crate::model::Document;

/// Paper and margins handed to the page renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    /// Paper size, portrait
    pub paper: PaperSize,
    /// Margins as `[top, right, bottom, left]` in centimetres
    pub margins_cm: [f64; 4],
}

impl PageSetup {
    /// Page setup for a document.
    pub fn for_document(doc: &Document, options: &RenderOptions) -> Self {
        Self {
            paper: options.paper,
            margins_cm: doc.metadata.margins_trbl(),
        }
    }

    /// CSS `@page` rule for this setup.
    pub fn page_css(&self) -> String {
        let [top, right, bottom, left] = self.margins_cm;
        format!(
            "@page {{ size: {} portrait; margin: {}cm {}cm {}cm {}cm; }}\nbody {{ margin: 0; }}",
            self.paper.css_name(),
            top,
            right,
            bottom,
            left
        )
    }
}

/// Turns fixed-layout markup into page bytes.
pub trait PageRenderer: Send + Sync {
    /// Render markup to a paginated encoding.
    fn render(&self, html: &str, setup: &PageSetup) -> Result<Vec<u8>>;
}

/// Print markup styled for the given page setup.
pub fn to_fixed_layout_markup(doc: &Document, options: &RenderOptions) -> Result<String> {
    let html = to_html(doc)?;
    Ok(inject_style(
        &html,
        &PageSetup::for_document(doc, options).page_css(),
    ))
}

/// Render a document to PDF with the given page renderer.
pub fn to_pdf(
    doc: &Document,
    options: &RenderOptions,
    renderer: &dyn PageRenderer,
) -> Result<Vec<u8>> {
    let html = to_html(doc)?;
    let setup = PageSetup::for_document(doc, options);
    let bytes = renderer.render(&html, &setup)?;
    if !bytes.starts_with(b"%PDF") {
        return Err(Error::Renderer(
            "renderer output is not a PDF document".to_string(),
        ));
    }
    Ok(bytes)
}

/// Headless Chrome/Chromium page renderer.
#[derive(Debug, Clone, Default)]
pub struct ChromeRenderer {
    options: PdfOptions,
}

impl ChromeRenderer {
    /// Renderer that locates the browser from the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer configured with explicit options.
    pub fn with_options(options: PdfOptions) -> Self {
        Self { options }
    }

    /// Locate the browser binary.
    ///
    /// Order: explicit option, `RENDOC_CHROME_BIN`, `GOOGLE_CHROME_BIN`,
    /// `CHROME_BIN`, well-known names on `PATH`, then platform install paths.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.options.browser {
            return Ok(path.clone());
        }

        for var in ["RENDOC_CHROME_BIN", "GOOGLE_CHROME_BIN", "CHROME_BIN"] {
            if let Some(path) = env::var_os(var) {
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }

        for candidate in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
            "msedge",
        ] {
            if let Ok(path) = which(candidate) {
                return Ok(path);
            }
        }

        #[cfg(target_os = "macos")]
        {
            let candidate =
                PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        #[cfg(target_os = "windows")]
        {
            for candidate in [
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            ] {
                let path = PathBuf::from(candidate);
                if path.exists() {
                    return Ok(path);
                }
            }
        }

        Err(Error::Renderer(
            "Unable to locate a Chrome/Chromium binary. Set RENDOC_CHROME_BIN to override the detection."
                .to_string(),
        ))
    }
}

impl PageRenderer for ChromeRenderer {
    fn render(&self, html: &str, setup: &PageSetup) -> Result<Vec<u8>> {
        let chrome = self.resolve_binary()?;
        let temp_dir = tempdir()?;
        let html_path = temp_dir.path().join("document.html");
        fs::write(&html_path, inject_style(html, &setup.page_css()))?;

        let pdf_path = temp_dir.path().join("document.pdf");
        let file_url = Url::from_file_path(&html_path).map_err(|_| {
            Error::Renderer("Failed to construct file:// URL for markup input".to_string())
        })?;

        log::debug!("Printing {} with {}", file_url, chrome.display());
        let output = Command::new(&chrome)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--no-pdf-header-footer")
            .arg("--print-to-pdf-no-header")
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .args(&self.options.extra_args)
            .arg(file_url.as_str())
            .output()
            .map_err(|e| {
                Error::Renderer(format!(
                    "Failed to launch Chrome ({}): {}",
                    chrome.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Renderer(format!(
                "Chrome exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        fs::read(&pdf_path).map_err(|e| {
            Error::Renderer(format!("Chrome produced no PDF output: {}", e))
        })
    }
}
