//! Single-pass walk from the parsed DOM to document blocks.
//!
//! Formatting state is threaded through the recursion as a [`TextStyle`]
//! value: each inline element derives its own copy from its parent, so
//! nested tags inherit and override without any shared mutable state.

use markup5ever_rcdom::{Handle, NodeData};

use super::{dom, style};
use crate::engine::PAGE_BREAK;
use crate::model::{
    pt_to_half_points, Alignment, Block, InlineContent, ListInfo, Paragraph, ParagraphStyle,
    Table, TableCell, TableRow, TextRun, TextStyle,
};

/// Elements that form their own paragraph.
const CONTAINERS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "section", "article",
    "header", "footer", "main", "aside", "nav", "address", "figure", "pre", "center", "li",
];

/// Table parts met outside a table walk.
const TABLE_PARTS: &[&str] = &["thead", "tbody", "tfoot", "tr", "td", "th", "caption"];

/// Elements whose content never reaches the document.
const SKIPPED: &[&str] = &[
    "script", "style", "head", "title", "meta", "link", "template", "noscript",
];

fn is_block(tag: &str) -> bool {
    CONTAINERS.contains(&tag)
        || TABLE_PARTS.contains(&tag)
        || matches!(tag, "table" | "ul" | "ol" | "hr")
}

/// Output of a walk, in document order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Block(Block),
    PageBreak,
}

/// Paragraph-level state inherited by nested containers.
#[derive(Debug, Clone)]
struct Context {
    alignment: Alignment,
    line_spacing: Option<f32>,
    heading: Option<u8>,
    base: TextStyle,
}

impl Context {
    fn root() -> Self {
        Self {
            alignment: Alignment::Justify,
            line_spacing: None,
            heading: None,
            base: TextStyle::default(),
        }
    }

    fn cell(header: bool) -> Self {
        Self {
            alignment: if header {
                Alignment::Center
            } else {
                Alignment::Left
            },
            line_spacing: None,
            heading: None,
            base: TextStyle {
                bold: header,
                ..TextStyle::default()
            },
        }
    }

    /// Context for the children of `node`.
    fn enter(&self, tag: &str, node: &Handle) -> Self {
        let mut ctx = self.clone();
        let inline_style = dom::attr(node, "style").unwrap_or_default();
        let class = dom::attr(node, "class").unwrap_or_default();

        let heading = match tag {
            "h1" => Some(1),
            "h2" => Some(2),
            "h3" => Some(3),
            _ => style::class_heading(&class).filter(|level| (1..=3).contains(level)),
        };
        if heading.is_some() {
            ctx.heading = heading;
            ctx.base.bold = true;
        }
        if let Some(alignment) =
            style::text_align(&inline_style).or_else(|| style::class_align(&class))
        {
            ctx.alignment = alignment;
        }
        if let Some(line_height) = style::line_height(&inline_style) {
            ctx.line_spacing = Some(line_height);
        }
        if let Some(font) = style::class_font(&class) {
            ctx.base.font_name = Some(font);
        }
        ctx
    }

    fn paragraph_style(&self) -> ParagraphStyle {
        ParagraphStyle {
            heading_level: self.heading,
            alignment: self.alignment,
            line_spacing: self.line_spacing,
            ..ParagraphStyle::default()
        }
    }
}

/// Derive the run style for an inline element.
fn inline_style(tag: &str, node: &Handle, parent: &TextStyle) -> TextStyle {
    let mut run = parent.clone();
    match tag {
        "b" | "strong" => run.bold = true,
        "i" | "em" => run.italic = true,
        "u" => run.underline = true,
        "span" => {
            let inline = dom::attr(node, "style").unwrap_or_default();
            let class = dom::attr(node, "class").unwrap_or_default();
            if let Some(size) = style::font_size(&inline) {
                run.font_size = Some(pt_to_half_points(size));
            }
            if let Some(family) = style::font_family(&inline).or_else(|| style::class_font(&class)) {
                run.font_name = Some(family);
            }
            if let Some(color) = style::color(&inline) {
                run.color = Some(color);
            }
        }
        _ => {}
    }
    run
}

struct OpenParagraph {
    paragraph: Paragraph,
    /// Written as an element (`<p>`, `<li>`, ...) rather than loose text
    explicit: bool,
    has_content: bool,
}

impl OpenParagraph {
    fn new(style: ParagraphStyle, explicit: bool) -> Self {
        let mut paragraph = Paragraph::new();
        paragraph.style = style;
        Self {
            paragraph,
            explicit,
            has_content: false,
        }
    }
}

/// Whether a text node keeps its paragraph alive.
///
/// Loose text needs a visible character. Inside an explicit element a
/// whitespace-only node also counts, unless it contains a line break or
/// tab, which only ever come from source formatting.
fn is_significant(text: &str, explicit: bool) -> bool {
    if text.chars().any(|c| !c.is_whitespace()) {
        return true;
    }
    explicit && !text.is_empty() && !text.contains(['\n', '\r', '\t'])
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

pub(crate) struct Walker {
    events: Vec<Event>,
    open: Option<OpenParagraph>,
    section: Option<String>,
    in_cell: bool,
}

impl Walker {
    pub fn new(section: Option<String>) -> Self {
        Self {
            events: Vec::new(),
            open: None,
            section,
            in_cell: false,
        }
    }

    /// Walk the children of `root` as top-level content.
    pub fn walk(mut self, root: &Handle) -> Vec<Event> {
        self.blocks(root, &Context::root());
        self.close_paragraph();
        self.events
    }

    fn blocks(&mut self, node: &Handle, ctx: &Context) {
        for child in dom::children(node) {
            match &child.data {
                NodeData::Text { contents } => {
                    let text = contents.borrow().to_string();
                    self.ensure_open(ctx);
                    self.text(&text, &ctx.base);
                }
                NodeData::Element { .. } => {
                    let tag = dom::tag_name(&child).unwrap_or_default();
                    self.block_element(&child, &tag, ctx);
                }
                _ => {}
            }
        }
    }

    fn block_element(&mut self, node: &Handle, tag: &str, ctx: &Context) {
        if SKIPPED.contains(&tag) {
            return;
        }
        match tag {
            "table" if !self.in_cell => {
                self.close_paragraph();
                if let Some(table) = self.table(node) {
                    self.events.push(Event::Block(Block::Table(table)));
                }
            }
            "ul" | "ol" => {
                self.close_paragraph();
                self.list(node, tag == "ol", 0, ctx);
            }
            "hr" => self.close_paragraph(),
            "br" => {
                self.ensure_open(ctx);
                self.line_break();
            }
            _ if is_block(tag) => {
                self.close_paragraph();
                self.container(node, tag, ctx);
            }
            _ => {
                self.ensure_open(ctx);
                self.inline(node, &ctx.base);
            }
        }
    }

    fn container(&mut self, node: &Handle, tag: &str, parent: &Context) {
        let ctx = parent.enter(tag, node);
        let has_blocks = dom::children(node)
            .iter()
            .filter_map(dom::tag_name)
            .any(|t| is_block(&t));

        if has_blocks {
            self.blocks(node, &ctx);
        } else {
            self.open = Some(OpenParagraph::new(ctx.paragraph_style(), true));
            for child in dom::children(node) {
                self.inline(&child, &ctx.base);
            }
        }
        self.close_paragraph();
    }

    fn list(&mut self, node: &Handle, ordered: bool, level: u8, parent: &Context) {
        let ctx = parent.enter(if ordered { "ol" } else { "ul" }, node);
        let mut number: u32 = dom::attr(node, "start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        for child in dom::children(node) {
            match dom::tag_name(&child).as_deref() {
                Some("li") => {
                    let info = if ordered {
                        ListInfo::numbered(level, number)
                    } else {
                        ListInfo::bullet(level)
                    };
                    number += 1;
                    self.list_item(&child, info, level, &ctx);
                }
                Some(nested @ ("ul" | "ol")) => {
                    self.list(&child, nested == "ol", level.saturating_add(1), &ctx)
                }
                _ => {}
            }
        }
    }

    fn list_item(&mut self, item: &Handle, info: ListInfo, level: u8, parent: &Context) {
        let ctx = parent.enter("li", item);
        let mut paragraph_style = ctx.paragraph_style();
        paragraph_style.list_info = Some(info);
        self.open = Some(OpenParagraph::new(paragraph_style, true));

        for child in dom::children(item) {
            match dom::tag_name(&child).as_deref() {
                Some(nested @ ("ul" | "ol")) => {
                    self.close_paragraph();
                    self.list(&child, nested == "ol", level.saturating_add(1), &ctx);
                }
                _ => self.inline(&child, &ctx.base),
            }
        }
        self.close_paragraph();
    }

    fn inline(&mut self, node: &Handle, run_style: &TextStyle) {
        match &node.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                self.text(&text, run_style);
            }
            NodeData::Element { .. } => {
                let tag = dom::tag_name(node).unwrap_or_default();
                if SKIPPED.contains(&tag.as_str()) {
                    return;
                }
                if tag == "br" {
                    self.line_break();
                    return;
                }
                let derived = inline_style(&tag, node, run_style);
                for child in dom::children(node) {
                    self.inline(&child, &derived);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, raw: &str, run_style: &TextStyle) {
        let mut segments = raw.split(PAGE_BREAK);
        if let Some(first) = segments.next() {
            self.push_text(first, run_style);
        }
        for segment in segments {
            if self.in_cell {
                log::warn!("Page break inside a table cell dropped");
            } else {
                self.break_page();
            }
            self.push_text(segment, run_style);
        }
    }

    fn push_text(&mut self, raw: &str, run_style: &TextStyle) {
        if raw.is_empty() {
            return;
        }
        let open = self.open.get_or_insert_with(|| {
            OpenParagraph::new(Context::root().paragraph_style(), false)
        });
        open.has_content |= is_significant(raw, open.explicit);
        open.paragraph
            .add_run(TextRun::styled(normalize(raw), run_style.clone()));
    }

    fn line_break(&mut self) {
        self.open
            .get_or_insert_with(|| OpenParagraph::new(Context::root().paragraph_style(), false))
            .paragraph
            .add_line_break();
    }

    /// End the page; the paragraph in progress continues on the next one.
    fn break_page(&mut self) {
        let reopen = self
            .open
            .as_ref()
            .map(|o| (o.paragraph.style.clone(), o.explicit));
        self.close_paragraph();
        self.events.push(Event::PageBreak);
        if let Some((paragraph_style, explicit)) = reopen {
            self.open = Some(OpenParagraph::new(paragraph_style, explicit));
        }
    }

    fn ensure_open(&mut self, ctx: &Context) {
        if self.open.is_none() {
            self.open = Some(OpenParagraph::new(ctx.paragraph_style(), false));
        }
    }

    fn close_paragraph(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        if !open.has_content {
            return;
        }
        let mut paragraph = open.paragraph;
        if !open.explicit {
            trim_edges(&mut paragraph);
        }
        paragraph.section = self.section.clone();
        self.events.push(Event::Block(Block::Paragraph(paragraph)));
    }

    fn table(&mut self, node: &Handle) -> Option<Table> {
        let mut rows = Vec::new();
        collect_rows(node, false, &mut rows);

        let mut table = Table::new();
        for (row, in_head) in rows {
            let cells: Vec<TableCell> = dom::children(&row)
                .iter()
                .filter_map(|cell| match dom::tag_name(cell).as_deref() {
                    Some("th") => Some(table_cell(cell, true)),
                    Some("td") => Some(table_cell(cell, false)),
                    _ => None,
                })
                .collect();
            if cells.is_empty() {
                continue;
            }
            let header = in_head || cells.iter().all(|c| c.header);
            table.add_row(if header {
                TableRow::header(cells)
            } else {
                TableRow::new(cells)
            });
        }

        if table.is_empty() {
            return None;
        }
        table.section = self.section.clone();
        Some(table)
    }
}

fn collect_rows(node: &Handle, in_head: bool, out: &mut Vec<(Handle, bool)>) {
    for child in dom::children(node) {
        match dom::tag_name(&child).as_deref() {
            Some("tr") => out.push((child, in_head)),
            Some("thead") => collect_rows(&child, true, out),
            Some("tbody") | Some("tfoot") => collect_rows(&child, in_head, out),
            _ => {}
        }
    }
}

fn table_cell(node: &Handle, header: bool) -> TableCell {
    let tag = if header { "th" } else { "td" };
    let ctx = Context::cell(header).enter(tag, node);

    let mut walker = Walker {
        events: Vec::new(),
        open: None,
        section: None,
        in_cell: true,
    };
    walker.blocks(node, &ctx);
    walker.close_paragraph();

    let content = walker
        .events
        .into_iter()
        .filter_map(|event| match event {
            Event::Block(Block::Paragraph(p)) => Some(p),
            _ => None,
        })
        .collect();

    let colspan = dom::attr(node, "colspan")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(1);

    TableCell {
        content,
        alignment: ctx.alignment,
        header,
        ..TableCell::empty()
    }
    .colspan(colspan)
}

/// Trim whitespace at the outer edges of a loose paragraph.
fn trim_edges(paragraph: &mut Paragraph) {
    if let Some(InlineContent::Text(run)) = paragraph
        .content
        .iter_mut()
        .find(|c| matches!(c, InlineContent::Text(_)))
    {
        run.text = run.text.trim_start().to_string();
    }
    if let Some(InlineContent::Text(run)) = paragraph
        .content
        .iter_mut()
        .rev()
        .find(|c| matches!(c, InlineContent::Text(_)))
    {
        run.text = run.text.trim_end().to_string();
    }
    paragraph
        .content
        .retain(|c| !matches!(c, InlineContent::Text(run) if run.text.is_empty()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(html: &str) -> Vec<Event> {
        let dom = dom::parse(html);
        let body = dom::body(&dom).unwrap();
        Walker::new(Some("s1".into())).walk(&body)
    }

    fn paragraphs(html: &str) -> Vec<Paragraph> {
        walk(html)
            .into_iter()
            .filter_map(|e| match e {
                Event::Block(Block::Paragraph(p)) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_runs_follow_formatting_state() {
        let found = paragraphs(r#"<p>Il <b>serbatoio <i>S1</i></b> <span style="color:#ff0000;font-size:14pt">non</span> è conforme</p>"#);
        assert_eq!(found.len(), 1);
        let runs: Vec<&TextRun> = found[0].runs().collect();
        assert_eq!(runs.len(), 6);
        assert_eq!(runs[1].text, "serbatoio ");
        assert!(runs[1].style.bold && !runs[1].style.italic);
        assert!(runs[2].style.bold && runs[2].style.italic);
        assert_eq!(runs[3].text, " ");
        assert_eq!(runs[4].style.color.as_deref(), Some("FF0000"));
        assert_eq!(runs[4].style.font_size, Some(28));
        assert_eq!(found[0].section.as_deref(), Some("s1"));
    }

    #[test]
    fn test_br_only_paragraph_is_dropped() {
        assert!(paragraphs("<p><br></p>").is_empty());
        assert!(paragraphs("<p>\n  <br>\n</p>").is_empty());
        assert!(paragraphs("<div></div>").is_empty());
    }

    #[test]
    fn test_single_space_paragraph_is_kept() {
        let found = paragraphs("<p> </p>");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].plain_text(), " ");
    }

    #[test]
    fn test_line_breaks_inside_paragraph() {
        let found = paragraphs("<p>riga uno<br>riga due</p>");
        assert_eq!(found[0].plain_text(), "riga uno\nriga due");
    }

    #[test]
    fn test_headings_and_alignment() {
        let found = paragraphs(r#"<h2>Premessa</h2><p class="ql-align-center">centro</p><p style="text-align: right">destra</p><p>giustificato</p><p class="ql-header-1">titolo</p>"#);
        assert_eq!(found[0].heading_level(), Some(2));
        assert!(found[0].runs().all(|r| r.style.bold));
        assert_eq!(found[1].style.alignment, Alignment::Center);
        assert_eq!(found[2].style.alignment, Alignment::Right);
        assert_eq!(found[3].style.alignment, Alignment::Justify);
        assert_eq!(found[4].heading_level(), Some(1));
    }

    #[test]
    fn test_inline_style_beats_class_font() {
        let found = paragraphs(r#"<p class="ql-font-arial">a<span style="font-family: 'Courier New'">b</span></p>"#);
        let runs: Vec<&TextRun> = found[0].runs().collect();
        assert_eq!(runs[0].style.font_name.as_deref(), Some("Arial"));
        assert_eq!(runs[1].style.font_name.as_deref(), Some("Courier New"));
    }

    #[test]
    fn test_page_break_splits_paragraph() {
        let events = walk("<p>prima[PAGE_BREAK]dopo</p>");
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], Event::PageBreak);
        match (&events[0], &events[2]) {
            (Event::Block(Block::Paragraph(a)), Event::Block(Block::Paragraph(b))) => {
                assert_eq!(a.plain_text(), "prima");
                assert_eq!(b.plain_text(), "dopo");
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_page_break_only_paragraph_leaves_no_text() {
        let events = walk("<p>a</p><p>[PAGE_BREAK]</p><p>b</p>");
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], Event::PageBreak);
    }

    #[test]
    fn test_loose_text_is_grouped() {
        let found = paragraphs("  Testo libero <b>grassetto</b>\n<p>dopo</p>");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].plain_text(), "Testo libero grassetto");
        assert_eq!(found[0].style.alignment, Alignment::Justify);
    }

    #[test]
    fn test_lists() {
        let found = paragraphs("<ol start=\"3\"><li>uno</li><li>due<ul><li>interno</li></ul></li></ol>");
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].plain_text(), "3. uno");
        assert_eq!(found[1].plain_text(), "4. due");
        let nested = found[2].style.list_info.as_ref().unwrap();
        assert_eq!(nested.level, 1);
        assert_eq!(found[2].plain_text(), "\u{2022} interno");
    }

    #[test]
    fn test_table_walk() {
        let events = walk("<table><thead><tr><th>Nome</th><th>Valore</th></tr></thead><tbody><tr><td><b>PS</b></td><td>13 [PAGE_BREAK]bar</td></tr></tbody></table>");
        assert_eq!(events.len(), 1);
        let Event::Block(Block::Table(table)) = &events[0] else {
            panic!("expected a table");
        };
        assert_eq!(table.header_rows, 1);
        assert_eq!(table.row_count(), 2);
        assert!(table.rows[0].cells[0].header);
        assert_eq!(table.rows[0].cells[0].alignment, Alignment::Center);
        assert!(table.rows[1].cells[0].content[0].runs().all(|r| r.style.bold));
        assert_eq!(table.rows[1].cells[1].plain_text(), "13 bar");
    }

    #[test]
    fn test_unknown_tags_are_transparent() {
        let found = paragraphs("<p><a href=\"#\">link <mark>evidenziato</mark></a></p>");
        assert_eq!(found[0].plain_text(), "link evidenziato");
    }
}
