//! Rendering of a single section to markup or table rows.

use serde::Serialize;
use serde_json::Value;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::markup::decode_entities;
use crate::record::to_display_string;
use crate::template::{ConditionalBlock, Section, SectionKind, SectionTemplate, TableTemplate};

/// Header shading used by table sections without an explicit style.
pub const SECTION_TABLE_FILL: &str = "D9D9D9";

/// Output of one enabled section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSection {
    /// Section id
    pub id: String,
    /// Display title
    pub title: String,
    /// Section kind; conditional sections report `paragraph`
    pub kind: SectionKind,
    /// Evaluated template text
    pub markup: String,
    /// Parsed rows, for table sections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<RenderedTable>,
}

/// Headers and rows produced by a table section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTable {
    /// Column headers
    pub headers: Vec<String>,
    /// Body rows
    pub rows: Vec<Vec<String>>,
    /// Header shading as hex without `#`
    pub header_fill: String,
}

impl RenderedSection {
    /// Heading level used for the section title.
    pub fn title_level(&self) -> u8 {
        if self.kind == SectionKind::Heading {
            1
        } else {
            2
        }
    }
}

/// Evaluate one section against a record.
pub fn render_section(engine: &Engine, section: &Section, record: &Value) -> Result<RenderedSection> {
    let wrap = |e| Error::section(section.id.clone(), e);

    let (kind, markup, table) = match &section.template {
        SectionTemplate::Text(source) => {
            let compiled = engine.compile(source).map_err(wrap)?;
            (section.kind, engine.render(&compiled, record).map_err(wrap)?, None)
        }
        SectionTemplate::Conditional(blocks) => (
            SectionKind::Paragraph,
            render_blocks(engine, section, blocks, record)?,
            None,
        ),
        SectionTemplate::Table(layout) => {
            let compiled = engine.compile(&layout.rows).map_err(wrap)?;
            let output = engine.render(&compiled, record).map_err(wrap)?;
            let table = RenderedTable {
                headers: layout.headers.clone(),
                rows: parse_rows(&output),
                header_fill: header_fill(layout),
            };
            (section.kind, output, Some(table))
        }
    };

    Ok(RenderedSection {
        id: section.id.clone(),
        title: section.title.clone(),
        kind,
        markup,
        table,
    })
}

fn render_blocks(
    engine: &Engine,
    section: &Section,
    blocks: &[ConditionalBlock],
    record: &Value,
) -> Result<String> {
    let mut markup = String::new();
    for block in blocks {
        let Some(variant) = block.select(record) else {
            continue;
        };
        log::debug!(
            "Section '{}': block '{}' uses variant '{}'",
            section.id,
            block.id,
            variant.id
        );
        let rendered = engine
            .render_str(&variant.content, record)
            .map_err(|e| Error::section(section.id.clone(), e))?;
        markup.push_str(&rendered);
    }
    Ok(markup)
}

fn header_fill(layout: &TableTemplate) -> String {
    layout.style
        .as_ref()
        .and_then(|style| style.header_background_color.as_deref())
        .map(|color| color.trim().trim_start_matches('#').to_ascii_uppercase())
        .filter(|color| !color.is_empty())
        .unwrap_or_else(|| SECTION_TABLE_FILL.to_string())
}

/// Split the output of a rows template into cells.
///
/// A JSON array of arrays is used as is (non-array rows become one cell).
/// Anything else is read as lines of tab-separated cells; blank lines are
/// skipped. Escaped output (`&quot;` and friends) is decoded first.
pub fn parse_rows(output: &str) -> Vec<Vec<String>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(rows) = json_rows(trimmed).or_else(|| json_rows(&decode_entities(trimmed))) {
        return rows;
    }

    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split('\t')
                .map(|cell| decode_entities(cell.trim()))
                .collect()
        })
        .collect()
}

fn json_rows(text: &str) -> Option<Vec<Vec<String>>> {
    let Value::Array(rows) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };
    Some(
        rows.iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(|c| to_display_string(Some(c))).collect(),
                other => vec![to_display_string(Some(other))],
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Condition, Operator, TableStyle, Variant};
    use serde_json::json;

    #[test]
    fn test_parse_rows_json() {
        assert_eq!(
            parse_rows(r#"[["S1", 13], ["S2", null]]"#),
            vec![vec!["S1".to_string(), "13".to_string()], vec!["S2".to_string(), String::new()]]
        );
        assert_eq!(
            parse_rows("[[&quot;a&quot;,&quot;b&quot;]]"),
            vec![vec!["a".to_string(), "b".to_string()]]
        );
    }

    #[test]
    fn test_parse_rows_tab_separated() {
        assert_eq!(
            parse_rows("S1\t13\n\nS2\t20 &amp; più\n"),
            vec![
                vec!["S1".to_string(), "13".to_string()],
                vec!["S2".to_string(), "20 & più".to_string()],
            ]
        );
        assert!(parse_rows("  \n ").is_empty());
    }

    #[test]
    fn test_text_section() {
        let engine = Engine::new();
        let section = Section::paragraph("intro", "<p>Cliente: {{cliente}}</p>").with_title("Premessa");
        let out = render_section(&engine, &section, &json!({"cliente": "ACME"})).unwrap();
        assert_eq!(out.markup, "<p>Cliente: ACME</p>");
        assert_eq!(out.title_level(), 2);
        assert!(out.table.is_none());
    }

    #[test]
    fn test_conditional_section_concatenates_variants() {
        let singular = Variant::new("s", "<p>Il serbatoio</p>")
            .when(Condition::new("serbatoi.length", Operator::Eq, 1));
        let plural = Variant::new("p", "<p>I {{serbatoi.length}} serbatoi</p>").default_variant();
        let hidden = ConditionalBlock {
            show_condition: Some(Condition::unary("note", Operator::IsNotEmpty)),
            ..ConditionalBlock::new("note", vec![Variant::new("n", "<p>{{note}}</p>")])
        };
        let section = Section::conditional(
            "descrizione",
            vec![ConditionalBlock::new("numero", vec![singular, plural]), hidden],
        );

        let engine = Engine::new();
        let out = render_section(&engine, &section, &json!({"serbatoi": [1, 2]})).unwrap();
        assert_eq!(out.markup, "<p>I 2 serbatoi</p>");
        assert_eq!(out.kind, SectionKind::Paragraph);

        let out = render_section(&engine, &section, &json!({"serbatoi": [1], "note": "ok"})).unwrap();
        assert_eq!(out.markup, "<p>Il serbatoio</p><p>ok</p>");
    }

    #[test]
    fn test_table_section() {
        let mut layout = TableTemplate::new(
            vec!["Codice".into(), "PS".into()],
            "{{#each serbatoi}}{{codice}}\t{{ps}}\n{{/each}}",
        );
        let engine = Engine::new();
        let record = json!({"serbatoi": [{"codice": "S1", "ps": 13}, {"codice": "S2", "ps": 8}]});

        let out = render_section(&engine, &Section::table("t", layout.clone()), &record).unwrap();
        let table = out.table.unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["S2".to_string(), "8".to_string()]);
        assert_eq!(table.header_fill, SECTION_TABLE_FILL);

        layout.style = Some(TableStyle {
            header_background_color: Some("#e0e0e0".into()),
            ..TableStyle::default()
        });
        let out = render_section(&engine, &Section::table("t", layout), &record).unwrap();
        assert_eq!(out.table.unwrap().header_fill, "E0E0E0");
    }

    #[test]
    fn test_errors_carry_section_id() {
        let engine = Engine::new();
        let section = Section::paragraph("rotto", "{{#if x}}aperto");
        let err = render_section(&engine, &section, &json!({})).unwrap_err();
        match err {
            Error::Section { section_id, .. } => assert_eq!(section_id, "rotto"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
