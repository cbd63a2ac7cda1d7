//! Fixed-layout markup: a self-contained, print-styled HTML document.
//!
//! This is the input of the external page renderer. It is rebuilt from the
//! document tree rather than from the rendered section markup, so it carries
//! exactly the runs the structured emitter writes.

use super::visitor::{check_table, walk, DocumentVisitor, Location};
use crate::engine::escape_html;
use crate::error::Result;
use crate::model::{
    Alignment, Document, InlineContent, Metadata, Paragraph, Table, TableCell, TextRun,
    BORDER_COLOR, DEFAULT_HEADER_FILL,
};

/// Print stylesheet. Body font and size are appended from metadata.
const STYLESHEET: &str = r#"
    h1 { font-size: 32pt; font-weight: bold; margin-top: 0.67em; margin-bottom: 0.5em; page-break-after: avoid; }
    h2 { font-size: 24pt; font-weight: bold; margin-top: 0.75em; margin-bottom: 0.5em; page-break-after: avoid; }
    h3 { font-size: 18.72pt; font-weight: bold; margin-top: 0.83em; margin-bottom: 0.5em; page-break-after: avoid; }
    p { margin: 0 0 10pt 0; }
    table { width: 100%; border-collapse: collapse; margin: 10pt 0; page-break-inside: avoid; }
    th { font-weight: bold; text-align: center; }
    td { text-align: left; }
    .page-break { page-break-after: always; }
    b, strong { font-weight: bold; }
    i, em { font-style: italic; }
    u { text-decoration: underline; }
"#;

/// Convert a document to print-oriented HTML.
pub fn to_html(doc: &Document) -> Result<String> {
    let mut writer = HtmlWriter::new(&doc.metadata);
    walk(doc, &mut writer)?;
    Ok(writer.finish())
}

/// Insert a stylesheet right before `</head>`.
pub fn inject_style(html: &str, css: &str) -> String {
    let style_tag = format!("<style data-rendoc-page>\n{}\n</style>\n", css);
    match html.find("</head>") {
        Some(idx) => {
            let mut output = String::with_capacity(html.len() + style_tag.len());
            output.push_str(&html[..idx]);
            output.push_str(&style_tag);
            output.push_str(&html[idx..]);
            output
        }
        None => format!("{}{}", style_tag, html),
    }
}

struct HtmlWriter {
    head: String,
    body: String,
}

impl HtmlWriter {
    fn new(metadata: &Metadata) -> Self {
        let mut head = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
        if let Some(title) = &metadata.title {
            head.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        }
        head.push_str("<style>\n");
        head.push_str(&format!(
            "    body {{ font-family: '{}', 'Times New Roman', serif; font-size: {}pt; line-height: 1.6; color: #000; text-align: justify; margin: 0; padding: 0; }}",
            css_string(&metadata.font_name),
            metadata.font_size
        ));
        head.push_str(STYLESHEET);
        head.push_str(&format!(
            "    th, td {{ border: 1px solid #{}; padding: 8pt; vertical-align: middle; }}\n    th {{ background-color: #{}; }}\n",
            BORDER_COLOR, DEFAULT_HEADER_FILL
        ));
        head.push_str("</style>\n</head>\n");

        Self {
            head,
            body: String::new(),
        }
    }

    fn finish(self) -> String {
        format!("{}<body>\n{}</body>\n</html>\n", self.head, self.body)
    }

    fn paragraph(&mut self, para: &Paragraph, in_cell: bool) {
        let mut html = String::new();
        if let Some(info) = &para.style.list_info {
            html.push_str(&escape_html(&info.marker()));
        }
        for item in &para.content {
            match item {
                InlineContent::Text(run) => push_run(&mut html, run),
                InlineContent::LineBreak => html.push_str("<br>"),
            }
        }

        if in_cell {
            self.body.push_str(&html);
            return;
        }

        let tag = match para.heading_level() {
            Some(1) => "h1",
            Some(2) => "h2",
            Some(_) => "h3",
            None => "p",
        };
        let mut style = Vec::new();
        if para.style.alignment != Alignment::Justify {
            style.push(format!("text-align: {}", para.style.alignment.as_css()));
        }
        if let Some(line) = para.style.line_spacing {
            style.push(format!("line-height: {}", line));
        }
        if let Some(info) = &para.style.list_info {
            style.push(format!("margin-left: {}pt", 18 * (u32::from(info.level) + 1)));
        }

        self.body.push('<');
        self.body.push_str(tag);
        if !style.is_empty() {
            self.body.push_str(&format!(" style=\"{}\"", style.join("; ")));
        }
        self.body.push('>');
        self.body.push_str(&html);
        self.body.push_str(&format!("</{}>\n", tag));
    }

    fn table(&mut self, table: &Table) {
        let fill = table.effective_header_fill();
        self.body.push_str("<table>\n");
        if !table.header().is_empty() {
            self.body.push_str("<thead>\n");
            for row in table.header() {
                self.row(&row.cells, true, fill);
            }
            self.body.push_str("</thead>\n");
        }
        if !table.body().is_empty() {
            self.body.push_str("<tbody>\n");
            for row in table.body() {
                self.row(&row.cells, false, fill);
            }
            self.body.push_str("</tbody>\n");
        }
        self.body.push_str("</table>\n");
    }

    fn row(&mut self, cells: &[TableCell], header_row: bool, fill: &str) {
        self.body.push_str("<tr>");
        for cell in cells {
            let header = header_row || cell.header;
            let tag = if header { "th" } else { "td" };
            let default_alignment = if header {
                Alignment::Center
            } else {
                Alignment::Left
            };

            let mut style = Vec::new();
            if header && fill != DEFAULT_HEADER_FILL {
                style.push(format!("background-color: #{}", fill));
            }
            if cell.alignment != default_alignment {
                style.push(format!("text-align: {}", cell.alignment.as_css()));
            }

            self.body.push('<');
            self.body.push_str(tag);
            if cell.colspan > 1 {
                self.body.push_str(&format!(" colspan=\"{}\"", cell.colspan));
            }
            if !style.is_empty() {
                self.body.push_str(&format!(" style=\"{}\"", style.join("; ")));
            }
            self.body.push('>');
            for (i, para) in cell.content.iter().enumerate() {
                if i > 0 {
                    self.body.push_str("<br>");
                }
                self.paragraph(para, true);
            }
            self.body.push_str(&format!("</{}>", tag));
        }
        self.body.push_str("</tr>\n");
    }
}

impl DocumentVisitor for HtmlWriter {
    fn visit_paragraph(&mut self, para: &Paragraph, _at: &Location) -> Result<()> {
        self.paragraph(para, false);
        Ok(())
    }

    fn visit_table(&mut self, table: &Table, at: &Location) -> Result<()> {
        check_table(table, at)?;
        self.table(table);
        Ok(())
    }

    fn on_page_break(&mut self, _next_page: u32) -> Result<()> {
        self.body.push_str("<div class=\"page-break\"></div>\n");
        Ok(())
    }
}

/// Escape a value for use inside a single-quoted CSS string.
fn css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'").replace(['<', '>'], "")
}

fn push_run(html: &mut String, run: &TextRun) {
    if run.text.is_empty() {
        return;
    }
    let style = &run.style;
    let mut css = Vec::new();
    if let Some(font) = &style.font_name {
        css.push(format!("font-family: '{}'", css_string(font)));
    }
    if let Some(size) = style.font_size {
        css.push(format!("font-size: {}pt", size as f32 / 2.0));
    }
    if let Some(color) = &style.color {
        css.push(format!("color: #{}", color));
    }

    let mut open = String::new();
    let mut close = String::new();
    if !css.is_empty() {
        open.push_str(&format!("<span style=\"{}\">", css.join("; ")));
        close.insert_str(0, "</span>");
    }
    for (on, tag) in [
        (style.bold, "b"),
        (style.italic, "i"),
        (style.underline, "u"),
    ] {
        if on {
            open.push_str(&format!("<{}>", tag));
            close.insert_str(0, &format!("</{}>", tag));
        }
    }

    html.push_str(&open);
    html.push_str(&escape_html(&run.text));
    html.push_str(&close);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;

    #[test]
    fn test_headings_and_paragraphs() {
        let doc = crate::markup::parse(
            r#"<h2>Premessa</h2><p class="ql-align-center"><b>Serbatoio</b> <i>S1</i></p>"#,
        );
        let html = to_html(&doc).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h2><b>Premessa</b></h2>"));
        assert!(html.contains(r#"<p style="text-align: center"><b>Serbatoio</b> <i>S1</i></p>"#));
        assert!(html.contains("font-family: 'Cambria'"));
    }

    #[test]
    fn test_run_styles_nest() {
        let doc = crate::markup::parse(
            r#"<p><span style="color:#00ff00;font-size:9pt"><u>nota</u> &lt;b&gt;</span></p>"#,
        );
        let html = to_html(&doc).unwrap();
        assert!(html.contains(r#"<span style="font-size: 9pt; color: #00FF00"><u>nota</u></span>"#));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_page_break_div() {
        let doc = crate::markup::parse("<p>uno</p>[PAGE_BREAK]<p>due</p>");
        let html = to_html(&doc).unwrap();
        assert_eq!(html.matches(r#"<div class="page-break"></div>"#).count(), 1);
        assert!(!html.contains("[PAGE_BREAK]"));
    }

    #[test]
    fn test_table_markup() {
        let mut doc = Document::new();
        let mut page = Page::a4(1);
        page.add_table(
            Table::from_text(["Codice", "PS"], vec![vec!["S1".into(), "13".into()]])
                .with_header_fill("D9D9D9"),
        );
        doc.add_page(page);

        let html = to_html(&doc).unwrap();
        assert!(html.contains(r#"<thead>"#));
        assert!(html.contains(r#"<th style="background-color: #D9D9D9"><b>Codice</b></th>"#));
        assert!(html.contains("<td>S1</td><td>13</td>"));
        assert!(html.contains("border: 1px solid #CCCCCC"));
    }

    #[test]
    fn test_inject_style() {
        let html = "<html><head><title>x</title></head><body></body></html>";
        let injected = inject_style(html, "@page { size: A4; }");
        assert!(injected.contains("@page { size: A4; }\n</style>\n</head>"));
        assert_eq!(inject_style("<p>x</p>", "a{}"), "<style data-rendoc-page>\na{}\n</style>\n<p>x</p>");
    }
}
