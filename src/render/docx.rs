//! Structured document output as a WordprocessingML (`.docx`) package.
//!
//! The body is written as a fold over the document tree. Pages become
//! explicit page-break paragraphs, headings get fixed sizes and spacing,
//! and tables are bordered with a shaded header row.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::options::RenderOptions;
use super::visitor::{check_table, walk, DocumentVisitor, Location};
use crate::error::{Error, Result};
use crate::model::{
    pt_to_half_points, Alignment, Document, InlineContent, Metadata, Paragraph, Table, TableCell,
    TextRun, BORDER_COLOR,
};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

/// Twentieths of a point per centimetre, rounded as word processors do.
pub const TWIPS_PER_CM: f64 = 567.0;

/// Paragraph spacing after body paragraphs and headings, in twips.
const SPACE_AFTER: u32 = 120;

/// Cell margin on every side, in twips.
const CELL_MARGIN: u32 = 100;

/// List indentation step, in twips.
const LIST_INDENT: u32 = 360;

/// Font size (half-points) and spacing before (twips) of heading levels 1-3.
pub fn heading_metrics(level: u8) -> (u32, u32) {
    match level {
        1 => (64, 320),
        2 => (48, 280),
        _ => (37, 240),
    }
}

/// Convert centimetres to twips.
pub fn cm_to_twips(cm: f64) -> u32 {
    (cm * TWIPS_PER_CM).round().max(0.0) as u32
}

fn jc(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "both",
    }
}

/// Convert a document to `.docx` bytes.
pub fn to_docx(doc: &Document, options: &RenderOptions) -> Result<Vec<u8>> {
    let document_xml = document_xml(doc, options)?;
    let styles_xml = styles_xml(&doc.metadata)?;
    let core_xml = core_xml(&doc.metadata)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
        ("word/document.xml", document_xml.as_slice()),
        ("word/styles.xml", styles_xml.as_slice()),
        ("docProps/core.xml", core_xml.as_slice()),
    ];
    for (name, bytes) in parts {
        zip.start_file(name, file_options)?;
        zip.write_all(bytes)?;
    }

    let cursor = zip.finish()?;
    log::debug!("Wrote docx package ({} pages)", doc.page_count());
    Ok(cursor.into_inner())
}

/// The `word/document.xml` part.
pub fn document_xml(doc: &Document, options: &RenderOptions) -> Result<Vec<u8>> {
    let mut body = DocxBody::new(&doc.metadata, options)?;
    walk(doc, &mut body)?;
    body.finish()
}

/// Thin wrapper over the XML writer mapping its errors.
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Result<Self> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(Error::xml)?;
        Ok(Self { writer })
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut tag = BytesStart::new(name);
        tag.extend_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(tag)).map_err(Error::xml)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut tag = BytesStart::new(name);
        tag.extend_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(tag)).map_err(Error::xml)
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(Error::xml)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(Error::xml)
    }

    fn element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

struct DocxBody<'a> {
    out: XmlOut,
    metadata: &'a Metadata,
    options: &'a RenderOptions,
    /// Usable width between the side margins, in twips
    content_width: u32,
}

impl<'a> DocxBody<'a> {
    fn new(metadata: &'a Metadata, options: &'a RenderOptions) -> Result<Self> {
        let (page_width, _) = options.paper.twips();
        let sides = cm_to_twips(metadata.margins.left) + cm_to_twips(metadata.margins.right);

        let mut out = XmlOut::new()?;
        out.start("w:document", &[("xmlns:w", W_NS)])?;
        out.start("w:body", &[])?;
        Ok(Self {
            out,
            metadata,
            options,
            content_width: page_width.saturating_sub(sides).max(1),
        })
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        self.section_properties()?;
        self.out.end("w:body")?;
        self.out.end("w:document")?;
        Ok(self.out.finish())
    }

    fn section_properties(&mut self) -> Result<()> {
        let (width, height) = self.options.paper.twips();
        let margins = &self.metadata.margins;
        let [top, right, bottom, left] = [
            margins.top,
            margins.right,
            margins.bottom,
            margins.left,
        ]
        .map(|cm| cm_to_twips(cm).to_string());

        self.out.start("w:sectPr", &[])?;
        let (width, height) = (width.to_string(), height.to_string());
        self.out
            .empty("w:pgSz", &[("w:w", width.as_str()), ("w:h", height.as_str())])?;
        self.out.empty(
            "w:pgMar",
            &[
                ("w:top", top.as_str()),
                ("w:right", right.as_str()),
                ("w:bottom", bottom.as_str()),
                ("w:left", left.as_str()),
                ("w:header", "708"),
                ("w:footer", "708"),
                ("w:gutter", "0"),
            ],
        )?;
        self.out.end("w:sectPr")
    }

    fn paragraph(&mut self, para: &Paragraph, in_cell: bool) -> Result<()> {
        self.out.start("w:p", &[])?;
        self.out.start("w:pPr", &[])?;

        let heading = para.heading_level().map(heading_metrics);
        let after = if in_cell { 0 } else { SPACE_AFTER };
        let after = after.to_string();
        let before = heading.map(|(_, before)| before.to_string());
        let line = para
            .style
            .line_spacing
            .map(|lh| ((lh * 240.0).round() as u32).to_string());

        let mut spacing: Vec<(&str, &str)> = vec![("w:after", after.as_str())];
        if let Some(before) = &before {
            spacing.push(("w:before", before.as_str()));
        }
        if let Some(line) = &line {
            spacing.push(("w:line", line.as_str()));
            spacing.push(("w:lineRule", "auto"));
        }
        self.out.empty("w:spacing", &spacing)?;

        if let Some(info) = &para.style.list_info {
            let left = (LIST_INDENT * (u32::from(info.level) + 1)).to_string();
            let hanging = LIST_INDENT.to_string();
            self.out.empty(
                "w:ind",
                &[("w:left", left.as_str()), ("w:hanging", hanging.as_str())],
            )?;
        }
        self.out.empty("w:jc", &[("w:val", jc(para.style.alignment))])?;
        self.out.end("w:pPr")?;

        let heading_size = heading.map(|(size, _)| size);
        if let Some(info) = &para.style.list_info {
            let marker_style = para.runs().next().map(|r| r.style.clone()).unwrap_or_default();
            self.run(&TextRun::styled(info.marker(), marker_style), heading_size)?;
        }
        for item in &para.content {
            match item {
                InlineContent::Text(run) => self.run(run, heading_size)?,
                InlineContent::LineBreak => {
                    self.out.start("w:r", &[])?;
                    self.out.empty("w:br", &[])?;
                    self.out.end("w:r")?;
                }
            }
        }
        self.out.end("w:p")
    }

    fn run(&mut self, run: &TextRun, heading_size: Option<u32>) -> Result<()> {
        if run.text.is_empty() {
            return Ok(());
        }
        let style = &run.style;
        let font = style
            .font_name
            .as_deref()
            .unwrap_or(self.metadata.font_name.as_str());
        let size = style
            .font_size
            .or(heading_size)
            .unwrap_or_else(|| pt_to_half_points(self.metadata.font_size))
            .to_string();

        self.out.start("w:r", &[])?;
        self.out.start("w:rPr", &[])?;
        self.out.empty(
            "w:rFonts",
            &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font)],
        )?;
        if style.bold || heading_size.is_some() {
            self.out.empty("w:b", &[])?;
        }
        if style.italic {
            self.out.empty("w:i", &[])?;
        }
        if style.underline {
            self.out.empty("w:u", &[("w:val", "single")])?;
        }
        if let Some(color) = &style.color {
            self.out.empty("w:color", &[("w:val", color.as_str())])?;
        }
        self.out.empty("w:sz", &[("w:val", size.as_str())])?;
        self.out.empty("w:szCs", &[("w:val", size.as_str())])?;
        self.out.end("w:rPr")?;
        self.out
            .element("w:t", &[("xml:space", "preserve")], &run.text)?;
        self.out.end("w:r")
    }

    fn table(&mut self, table: &Table) -> Result<()> {
        let columns = table.column_count().max(1);
        let column_width = self.content_width / columns as u32;
        let column_width_str = column_width.to_string();
        let margin = CELL_MARGIN.to_string();

        self.out.start("w:tbl", &[])?;
        self.out.start("w:tblPr", &[])?;
        self.out
            .empty("w:tblW", &[("w:w", "5000"), ("w:type", "pct")])?;
        self.out.start("w:tblBorders", &[])?;
        for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
            self.out.empty(
                side,
                &[
                    ("w:val", "single"),
                    ("w:sz", "1"),
                    ("w:space", "0"),
                    ("w:color", BORDER_COLOR),
                ],
            )?;
        }
        self.out.end("w:tblBorders")?;
        self.out.start("w:tblCellMar", &[])?;
        for side in ["w:top", "w:left", "w:bottom", "w:right"] {
            self.out
                .empty(side, &[("w:w", margin.as_str()), ("w:type", "dxa")])?;
        }
        self.out.end("w:tblCellMar")?;
        self.out.end("w:tblPr")?;

        self.out.start("w:tblGrid", &[])?;
        for _ in 0..columns {
            self.out
                .empty("w:gridCol", &[("w:w", column_width_str.as_str())])?;
        }
        self.out.end("w:tblGrid")?;

        let fill = table.effective_header_fill();
        for row in &table.rows {
            self.out.start("w:tr", &[])?;
            if row.is_header {
                self.out.start("w:trPr", &[])?;
                self.out.empty("w:tblHeader", &[])?;
                self.out.end("w:trPr")?;
            }
            for cell in &row.cells {
                let shaded = row.is_header || cell.header;
                self.cell(cell, column_width, shaded.then_some(fill))?;
            }
            self.out.end("w:tr")?;
        }
        self.out.end("w:tbl")?;

        // Adjacent tables merge unless a paragraph separates them.
        self.out.empty("w:p", &[])
    }

    fn cell(&mut self, cell: &TableCell, column_width: u32, fill: Option<&str>) -> Result<()> {
        let span = cell.colspan.max(1);
        let width = (column_width * span as u32).to_string();

        self.out.start("w:tc", &[])?;
        self.out.start("w:tcPr", &[])?;
        self.out
            .empty("w:tcW", &[("w:w", width.as_str()), ("w:type", "dxa")])?;
        if span > 1 {
            let span = span.to_string();
            self.out.empty("w:gridSpan", &[("w:val", span.as_str())])?;
        }
        if let Some(fill) = fill {
            self.out.empty(
                "w:shd",
                &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", fill)],
            )?;
        }
        self.out.empty("w:vAlign", &[("w:val", "center")])?;
        self.out.end("w:tcPr")?;

        if cell.content.is_empty() {
            self.out.start("w:p", &[])?;
            self.out.start("w:pPr", &[])?;
            self.out.empty("w:jc", &[("w:val", jc(cell.alignment))])?;
            self.out.end("w:pPr")?;
            self.out.end("w:p")?;
        }
        for para in &cell.content {
            self.paragraph(para, true)?;
        }
        self.out.end("w:tc")
    }
}

impl DocumentVisitor for DocxBody<'_> {
    fn visit_paragraph(&mut self, para: &Paragraph, _at: &Location) -> Result<()> {
        self.paragraph(para, false)
    }

    fn visit_table(&mut self, table: &Table, at: &Location) -> Result<()> {
        check_table(table, at)?;
        self.table(table)
    }

    fn on_page_break(&mut self, _next_page: u32) -> Result<()> {
        self.out.start("w:p", &[])?;
        self.out.start("w:pPr", &[])?;
        self.out.empty("w:spacing", &[("w:after", "0")])?;
        self.out.end("w:pPr")?;
        self.out.start("w:r", &[])?;
        self.out.empty("w:br", &[("w:type", "page")])?;
        self.out.end("w:r")?;
        self.out.end("w:p")
    }
}

/// The `word/styles.xml` part: document defaults from metadata.
fn styles_xml(metadata: &Metadata) -> Result<Vec<u8>> {
    let font = metadata.font_name.as_str();
    let size = pt_to_half_points(metadata.font_size).to_string();

    let mut out = XmlOut::new()?;
    out.start("w:styles", &[("xmlns:w", W_NS)])?;
    out.start("w:docDefaults", &[])?;
    out.start("w:rPrDefault", &[])?;
    out.start("w:rPr", &[])?;
    out.empty(
        "w:rFonts",
        &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font), ("w:eastAsia", font)],
    )?;
    out.empty("w:sz", &[("w:val", size.as_str())])?;
    out.empty("w:szCs", &[("w:val", size.as_str())])?;
    out.end("w:rPr")?;
    out.end("w:rPrDefault")?;
    out.end("w:docDefaults")?;

    out.start(
        "w:style",
        &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")],
    )?;
    out.empty("w:name", &[("w:val", "Normal")])?;
    out.end("w:style")?;
    out.end("w:styles")?;
    Ok(out.finish())
}

/// The `docProps/core.xml` part.
fn core_xml(metadata: &Metadata) -> Result<Vec<u8>> {
    let mut out = XmlOut::new()?;
    out.start(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
        ],
    )?;
    if let Some(title) = &metadata.title {
        out.element("dc:title", &[], title)?;
    }
    out.element("dc:creator", &[], "rendoc")?;
    out.end("cp:coreProperties")?;
    Ok(out.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, TableRow};
    use std::io::Read;

    fn body_of(doc: &Document) -> String {
        String::from_utf8(document_xml(doc, &RenderOptions::default()).unwrap()).unwrap()
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(cm_to_twips(2.5), 1418);
        assert_eq!(cm_to_twips(1.5), 851);
        assert_eq!(pt_to_half_points(11.0), 22);
        assert_eq!(pt_to_half_points(18.72), 37);
        assert_eq!(heading_metrics(1), (64, 320));
    }

    #[test]
    fn test_runs_and_formatting() {
        let doc = crate::markup::parse(
            r#"<p style="text-align:center;line-height:1.5"><b>PS</b> <span style="color:#ff0000;font-size:14pt">13 &amp; bar</span></p>"#,
        );
        let xml = body_of(&doc);
        assert!(xml.contains(r#"<w:jc w:val="center"/>"#));
        assert!(xml.contains(r#"w:line="360""#));
        assert!(xml.contains("<w:b/>"));
        assert!(xml.contains(r#"<w:color w:val="FF0000"/>"#));
        assert!(xml.contains(r#"<w:sz w:val="28"/>"#));
        assert!(xml.contains("13 &amp; bar"));
        assert!(xml.contains(r#"<w:rFonts w:ascii="Cambria""#));
    }

    #[test]
    fn test_heading_sizes() {
        let doc = crate::markup::parse("<h1>Titolo</h1><h3>Sotto</h3>");
        let xml = body_of(&doc);
        assert!(xml.contains(r#"w:before="320""#));
        assert!(xml.contains(r#"<w:sz w:val="64"/>"#));
        assert!(xml.contains(r#"<w:sz w:val="37"/>"#));
    }

    #[test]
    fn test_page_break_between_pages() {
        let doc = crate::markup::parse("<p>uno</p>[PAGE_BREAK]<p>due</p>");
        let xml = body_of(&doc);
        assert_eq!(xml.matches(r#"<w:br w:type="page"/>"#).count(), 1);
        let uno = xml.find("uno").unwrap();
        let brk = xml.find(r#"w:type="page""#).unwrap();
        let due = xml.find("due").unwrap();
        assert!(uno < brk && brk < due);
    }

    #[test]
    fn test_margins_and_table() {
        let mut doc = Document::new();
        let mut page = Page::a4(1);
        page.add_table(
            Table::from_text(["A", "B"], vec![vec!["1".into(), "2".into()]])
                .with_header_fill("D9D9D9"),
        );
        doc.add_page(page);
        let xml = body_of(&doc);

        assert!(xml.contains(r#"<w:pgMar w:top="1418" w:right="851" w:bottom="1418" w:left="1418""#));
        assert!(xml.contains(r#"w:fill="D9D9D9""#));
        assert!(xml.contains(r#"w:color="CCCCCC""#));
        assert!(xml.contains("<w:tblHeader/>"));
        assert_eq!(xml.matches("<w:gridCol ").count(), 2);
        assert!(xml.contains(r#"<w:vAlign w:val="center"/>"#));
    }

    #[test]
    fn test_unrepresentable_table_is_an_error() {
        let mut doc = Document::new();
        let mut page = Page::a4(1);
        let mut table = Table::new();
        table.section = Some("tabelle".into());
        table.add_row(TableRow::new(Vec::new()));
        page.add_table(table);
        doc.add_page(page);

        let err = to_docx(&doc, &RenderOptions::default()).unwrap_err();
        match err {
            Error::Emit { location, .. } => assert_eq!(location, "section 'tabelle', page 1, block 1"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_package_parts() {
        let mut doc = crate::markup::parse("<p>Verbale</p>");
        doc.metadata.title = Some("Verifica".into());
        let bytes = to_docx(&doc, &RenderOptions::default()).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/_rels/document.xml.rels",
            "word/document.xml",
            "word/styles.xml",
            "docProps/core.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {}", name);
        }
        let mut core = String::new();
        archive
            .by_name("docProps/core.xml")
            .unwrap()
            .read_to_string(&mut core)
            .unwrap();
        assert!(core.contains("<dc:title>Verifica</dc:title>"));
    }
}
