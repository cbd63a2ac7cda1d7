//! Integration tests for the output encodings.

use std::io::{Cursor, Read};
use std::sync::Mutex;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde_json::json;

use rendoc::markup::decode_entities;
use rendoc::model::{Document, Page, Table};
use rendoc::render::{self, PageRenderer, PageSetup, RenderOptions};
use rendoc::{Error, RenderedDocument, Section, TableTemplate, Template};

fn rendered() -> RenderedDocument {
    let template = Template::new(vec![
        Section::paragraph(
            "intro",
            r#"<h1>Verbale di verifica</h1><p class="ql-align-center">Cliente <b>{{cliente}}</b> &amp; <i>soci</i></p><ul><li>primo</li><li>secondo</li></ul>{{pageBreak}}<p>Seconda pagina</p>"#,
        )
        .with_title("Premessa"),
        Section::table(
            "serbatoi",
            TableTemplate::new(
                vec!["Codice".into(), "PS×V".into()],
                "{{#each serbatoi}}{{codice}}\t{{psXvolume ps volume}}\n{{/each}}",
            ),
        )
        .with_title("Apparecchi"),
    ]);
    let record = json!({
        "cliente": "Acme <S.p.A.>",
        "serbatoi": [
            {"codice": "S1", "ps": 13, "volume": 500},
            {"codice": "S2", "ps": 8, "volume": 100}
        ]
    });
    rendoc::render(&template, &record).unwrap()
}

fn docx_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

fn docx_text(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    let mut in_text = false;
    let mut text = String::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_text = false,
            Event::Text(t) if in_text => text.push_str(&t.unescape().unwrap()),
            Event::Eof => break,
            _ => {}
        }
    }
    text
}

fn html_text(html: &str) -> String {
    let start = html.find("<body>").unwrap();
    let end = html.find("</body>").unwrap();
    let tags = Regex::new("<[^>]+>").unwrap();
    decode_entities(&tags.replace_all(&html[start..end], ""))
}

fn squash(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[test]
fn test_encodings_carry_the_same_text() {
    let doc = rendered();
    let docx = doc.to_structured_document_bytes().unwrap();
    let from_docx = docx_text(&docx_part(&docx, "word/document.xml"));
    let from_html = html_text(&doc.to_fixed_layout_markup().unwrap());

    assert_eq!(squash(&from_docx), squash(&from_html));
    assert!(from_docx.contains("Acme <S.p.A.>"));
    assert!(from_docx.contains("\u{2022} primo"));
    assert!(from_html.contains("6500"));
}

#[test]
fn test_page_break_in_both_encodings() {
    let doc = rendered();
    assert_eq!(doc.document().page_count(), 2);

    let xml = docx_part(&doc.to_structured_document_bytes().unwrap(), "word/document.xml");
    assert_eq!(xml.matches(r#"<w:br w:type="page"/>"#).count(), 1);

    let html = doc.to_fixed_layout_markup().unwrap();
    assert_eq!(html.matches(r#"class="page-break""#).count(), 1);
    assert!(!html.contains("[PAGE_BREAK]"));
}

#[test]
fn test_docx_formatting_and_layout() {
    let doc = rendered();
    let xml = docx_part(&doc.to_structured_document_bytes().unwrap(), "word/document.xml");

    assert!(xml.contains(r#"<w:jc w:val="center"/>"#));
    assert!(xml.contains(r#"<w:sz w:val="64"/>"#));
    assert!(xml.contains(r#"<w:shd w:val="clear" w:color="auto" w:fill="D9D9D9"/>"#));
    assert!(xml.contains(r#"<w:pgMar w:top="1418" w:right="851" w:bottom="1418" w:left="1418""#));
    assert!(xml.contains("<w:tblHeader/>"));
}

#[test]
fn test_docx_package_parts() {
    let bytes = rendered().to_structured_document_bytes().unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/_rels/document.xml.rels",
            "word/document.xml",
            "word/styles.xml",
        ]
    );
    assert!(docx_part(&bytes, "word/styles.xml").contains("Cambria"));
}

#[test]
fn test_document_title_from_first_heading() {
    let doc = rendered();
    assert_eq!(doc.document().metadata.title.as_deref(), Some("Premessa"));

    let core = docx_part(&doc.to_structured_document_bytes().unwrap(), "docProps/core.xml");
    assert!(core.contains("<dc:title>Premessa</dc:title>"));
    assert!(!core.contains("dcterms:created"));
    assert!(doc
        .to_fixed_layout_markup()
        .unwrap()
        .contains("<title>Premessa</title>"));
}

struct FakeBrowser {
    seen: Mutex<Vec<(String, PageSetup)>>,
}

impl PageRenderer for FakeBrowser {
    fn render(&self, html: &str, setup: &PageSetup) -> rendoc::Result<Vec<u8>> {
        self.seen
            .lock()
            .unwrap()
            .push((html.to_string(), setup.clone()));
        Ok(b"%PDF-1.4\n%%EOF".to_vec())
    }
}

#[test]
fn test_fixed_layout_bytes_through_renderer() {
    let doc = rendered();
    let browser = FakeBrowser {
        seen: Mutex::new(Vec::new()),
    };
    let pdf = doc.to_fixed_layout_bytes_with(&browser).unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    let seen = browser.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1.margins_cm, [2.5, 1.5, 2.5, 2.5]);
    assert!(seen[0].0.contains("<h1>"));
    assert!(seen[0].0.contains("Acme &lt;S.p.A.&gt;"));
}

#[test]
fn test_empty_table_fails_with_location() {
    let mut doc = Document::new();
    let mut page = Page::a4(1);
    let mut table = Table::new();
    table.section = Some("dati".into());
    page.add_table(table);
    doc.add_page(page);

    let err = render::to_docx(&doc, &RenderOptions::default()).unwrap_err();
    match err {
        Error::Emit { location, .. } => assert_eq!(location, "section 'dati', page 1, block 1"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(render::to_html(&doc).is_err());
}

#[test]
fn test_text_and_json_dumps() {
    let doc = rendered();
    let text = render::to_text(doc.document()).unwrap();
    assert_eq!(text, doc.plain_text());

    let json = doc.to_json(render::JsonFormat::Pretty).unwrap();
    let parsed: Document = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.page_count(), 2);
}
