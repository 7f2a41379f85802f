//! Plain-text tables sized by display width

use unicode_width::UnicodeWidthStr;

use crate::colorizer::{paint, Tone};

/// Column-aligned table, two spaces between columns
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.width()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i >= widths.len() {
                    widths.push(0);
                }
                widths[i] = widths[i].max(cell.width());
            }
        }
        widths
    }

    /// Render with a trailing newline; the header is bold when `color` is set
    pub fn render(&self, color: bool) -> String {
        let widths = self.widths();
        let mut out = String::new();
        out.push_str(&paint(&format_row(&self.headers, &widths), Tone::Heading, color));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&format_row(row, &widths));
            out.push('\n');
        }
        out
    }
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        let last = i + 1 == cells.len();
        if !last {
            let pad = widths.get(i).copied().unwrap_or(0).saturating_sub(cell.width());
            line.push_str(&" ".repeat(pad));
        }
    }
    line
}
