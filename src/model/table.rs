//! Table types.

use super::{Alignment, Paragraph};
use serde::{Deserialize, Serialize};

/// Header shading used when a table does not specify one.
pub const DEFAULT_HEADER_FILL: &str = "E0E0E0";

/// Border color shared by every emitted table.
pub const BORDER_COLOR: &str = "CCCCCC";

/// A table structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Rows in the table, header rows first
    pub rows: Vec<TableRow>,

    /// Number of header rows (0 = no header)
    pub header_rows: usize,

    /// Header shading as `RRGGBB`; `None` uses [`DEFAULT_HEADER_FILL`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_fill: Option<String>,

    /// Id of the template section the table came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Table {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            header_rows: 0,
            header_fill: None,
            section: None,
        }
    }

    /// Create a table from a header line and body rows of plain text.
    pub fn from_text<S: Into<String>>(
        headers: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<String>>,
    ) -> Self {
        let mut table = Self::new();
        let header: Vec<TableCell> = headers.into_iter().map(TableCell::header_text).collect();
        if !header.is_empty() {
            table.add_row(TableRow::header(header));
        }
        for row in rows {
            table.add_row(TableRow::from_strings(row));
        }
        table
    }

    /// Set the header shading and return self.
    pub fn with_header_fill(mut self, fill: impl Into<String>) -> Self {
        self.header_fill = Some(fill.into());
        self
    }

    /// Add a row, keeping header rows ahead of body rows.
    pub fn add_row(&mut self, row: TableRow) {
        if row.is_header {
            self.rows.insert(self.header_rows, row);
            self.header_rows += 1;
        } else {
            self.rows.push(row);
        }
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of grid columns (widest row, counting spans).
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.colspan.max(1)).sum::<usize>())
            .max()
            .unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get header rows.
    pub fn header(&self) -> &[TableRow] {
        &self.rows[..self.header_rows.min(self.rows.len())]
    }

    /// Get body rows (non-header).
    pub fn body(&self) -> &[TableRow] {
        &self.rows[self.header_rows.min(self.rows.len())..]
    }

    /// Header fill in effect.
    pub fn effective_header_fill(&self) -> &str {
        self.header_fill.as_deref().unwrap_or(DEFAULT_HEADER_FILL)
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

/// A table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Cells in the row
    pub cells: Vec<TableCell>,

    /// Whether this is a header row
    pub is_header: bool,
}

impl TableRow {
    /// Create a new body row with cells.
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self {
            cells,
            is_header: false,
        }
    }

    /// Create a header row.
    pub fn header(cells: Vec<TableCell>) -> Self {
        Self {
            cells,
            is_header: true,
        }
    }

    /// Create a body row from text values.
    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::new(values.into_iter().map(TableCell::text).collect())
    }

    /// Get plain text representation.
    pub fn plain_text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.plain_text())
            .collect::<Vec<_>>()
            .join("\t")
    }
}

/// A table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Cell content (paragraphs)
    pub content: Vec<Paragraph>,

    /// Number of columns this cell spans
    pub colspan: usize,

    /// Horizontal alignment
    pub alignment: Alignment,

    /// Header cell (bold, centered, shaded)
    #[serde(default)]
    pub header: bool,
}

impl TableCell {
    /// Create an empty body cell.
    pub fn empty() -> Self {
        Self {
            content: Vec::new(),
            colspan: 1,
            alignment: Alignment::Left,
            header: false,
        }
    }

    /// Create a body cell with text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_content(vec![Paragraph::with_text(text)])
    }

    /// Create a centered header cell with bold text.
    pub fn header_text(text: impl Into<String>) -> Self {
        let mut paragraph = Paragraph::new().aligned(Alignment::Center);
        paragraph.add_run(super::TextRun::bold(text));
        let mut cell = Self::with_content(vec![paragraph]).align(Alignment::Center);
        cell.header = true;
        cell
    }

    /// Create a cell with multiple paragraphs.
    pub fn with_content(content: Vec<Paragraph>) -> Self {
        Self {
            content,
            ..Self::empty()
        }
    }

    /// Set colspan and return self.
    pub fn colspan(mut self, span: usize) -> Self {
        self.colspan = span.max(1);
        self
    }

    /// Set alignment and return self.
    pub fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Get plain text content.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .map(|p| p.plain_text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if the cell is empty.
    pub fn is_empty(&self) -> bool {
        self.content.iter().all(Paragraph::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_new() {
        let table = Table::new();
        assert!(table.is_empty());
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 0);
        assert_eq!(table.effective_header_fill(), DEFAULT_HEADER_FILL);
    }

    #[test]
    fn test_table_from_text() {
        let table = Table::from_text(
            ["Matricola", "Volume"],
            vec![
                vec!["S1".to_string(), "500".to_string()],
                vec!["S2".to_string(), "100".to_string()],
            ],
        );

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.header().len(), 1);
        assert_eq!(table.body().len(), 2);
        assert_eq!(table.plain_text(), "Matricola\tVolume\nS1\t500\nS2\t100");
    }

    #[test]
    fn test_header_rows_stay_first() {
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["1"]));
        table.add_row(TableRow::header(vec![TableCell::header_text("N")]));
        assert!(table.rows[0].is_header);
        assert_eq!(table.header_rows, 1);
    }

    #[test]
    fn test_colspan_counts_toward_columns() {
        let mut table = Table::new();
        table.add_row(TableRow::new(vec![TableCell::text("Totale").colspan(2)]));
        table.add_row(TableRow::from_strings(["a", "b"]));
        assert_eq!(table.column_count(), 2);
    }
}
