// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Paginated plain-text output.

use super::{RenderSummary, Renderer};
use crate::{
    chart::ChartSeries,
    config::PageConfig,
    document::{Align, Block, Chart, HeadingLevel, ReportDocument, Table},
    errors::RenderError,
};
use std::{io::Write, mem};
use swrite::{SWrite, swrite};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

// A blank line followed by the page number.
const FOOTER_LINES: usize = 2;
const COLUMN_SEPARATOR: &str = " | ";
const CHART_GAP: usize = 4;
const BAR_WIDTH: usize = 20;
const MIN_COLUMN_WIDTH: usize = 3;

/// Renders documents as fixed-size pages of plain text.
///
/// Pages are separated by form feeds and carry the page number in their footer. Tables split
/// across pages repeat their header row if requested. Keep-together units that do not fit on the
/// current page start a new one, unless they are taller than a page, in which case they are split
/// like ordinary content.
#[derive(Copy, Clone, Debug)]
pub struct TextRenderer {
    width: usize,
    body_height: usize,
}

impl TextRenderer {
    /// Creates a new renderer for the given page geometry.
    pub fn new(page: PageConfig) -> Self {
        Self {
            width: page.width,
            body_height: page.height.saturating_sub(FOOTER_LINES).max(1),
        }
    }

    fn layout(&self, block: &Block) -> Laid {
        match block {
            Block::Title { lines } => Laid::Fixed {
                what: "title block",
                lines: lines
                    .iter()
                    .flat_map(|line| fit(line.clone(), self.width))
                    .map(|line| align(&line, self.width, Align::Center))
                    .collect(),
            },
            Block::Paragraph { text } => Laid::Flow {
                lines: wrap(text, self.width),
            },
            Block::Heading { level, text } => {
                let mut lines = wrap(text, self.width);
                let underline = match level {
                    HeadingLevel::Section => '=',
                    HeadingLevel::Group => '-',
                };
                let underline_width = lines.iter().map(|line| line.width()).max().unwrap_or(0);
                lines.push(underline.to_string().repeat(underline_width));
                Laid::Fixed {
                    what: "heading",
                    lines,
                }
            }
            Block::Charts { charts } => Laid::Fixed {
                what: "charts",
                lines: self.layout_charts(charts),
            },
            Block::Table(table) => self.layout_table(table),
            Block::KeepTogether { blocks } => {
                Laid::Keep(blocks.iter().map(|block| self.layout(block)).collect())
            }
            Block::PageBreak => Laid::Break,
        }
    }

    fn layout_charts(&self, charts: &[Chart]) -> Vec<String> {
        if charts.is_empty() {
            return Vec::new();
        }
        let column_width =
            self.width.saturating_sub(CHART_GAP * (charts.len() - 1)) / charts.len();
        let columns: Vec<Vec<String>> = charts
            .iter()
            .map(|chart| chart_lines(chart, column_width))
            .collect();
        let height = columns.iter().map(Vec::len).max().unwrap_or(0);

        (0..height)
            .map(|index| {
                let mut line = String::new();
                for (column_index, column) in columns.iter().enumerate() {
                    if column_index > 0 {
                        line.push_str(&" ".repeat(CHART_GAP));
                    }
                    let cell = column.get(index).map_or("", String::as_str);
                    line.push_str(&align(cell, column_width, Align::Left));
                }
                line.trim_end().to_owned()
            })
            .collect()
    }

    fn layout_table(&self, table: &Table) -> Laid {
        let widths = column_widths(
            table.columns.iter().map(|column| column.width),
            self.width,
        );
        let aligns: Vec<_> = table.columns.iter().map(|column| column.align).collect();

        let titles: Vec<Vec<String>> = table
            .columns
            .iter()
            .map(|column| vec![column.title.clone()])
            .collect();
        let mut header = table_row_lines(&titles, &widths, &aligns);
        header.push(
            widths
                .iter()
                .map(|&width| "-".repeat(width))
                .collect::<Vec<_>>()
                .join("-+-"),
        );

        let rows = table
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<Vec<String>> =
                    row.cells.iter().map(|cell| cell.lines.clone()).collect();
                table_row_lines(&cells, &widths, &aligns)
            })
            .collect();

        Laid::Table {
            header,
            rows,
            repeat_header: table.repeat_header,
        }
    }
}

impl Renderer for TextRenderer {
    fn render(
        &self,
        document: &ReportDocument,
        writer: &mut dyn Write,
    ) -> Result<RenderSummary, RenderError> {
        let mut paginator = Paginator::new(self.body_height);
        for block in document.blocks() {
            paginator.place(&self.layout(block))?;
        }
        let pages = paginator.finish();

        for (index, page) in pages.iter().enumerate() {
            if index > 0 {
                writeln!(writer, "\x0c")?;
            }
            for line in page {
                writeln!(writer, "{line}")?;
            }
            for _ in page.len()..self.body_height {
                writeln!(writer)?;
            }
            writeln!(writer)?;
            let footer = format!("Page {}", index + 1);
            writeln!(writer, "{}", align(&footer, self.width, Align::Center).trim_end())?;
        }

        Ok(RenderSummary {
            pages: Some(pages.len()),
        })
    }
}

/// A block laid out into lines, not yet placed on pages.
#[derive(Debug)]
enum Laid {
    /// Lines that must stay on one page.
    Fixed { what: &'static str, lines: Vec<String> },

    /// Lines that may be split anywhere.
    Flow { lines: Vec<String> },

    /// A table, split between rows.
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        repeat_header: bool,
    },

    Keep(Vec<Laid>),

    Break,
}

impl Laid {
    /// The number of lines this occupies if placed without a page break, including the blank
    /// line that follows each block.
    fn height(&self) -> usize {
        match self {
            Laid::Fixed { lines, .. } | Laid::Flow { lines } => lines.len() + 1,
            Laid::Table { header, rows, .. } => {
                header.len() + rows.iter().map(Vec::len).sum::<usize>() + 1
            }
            Laid::Keep(children) => children.iter().map(Laid::height).sum(),
            Laid::Break => 0,
        }
    }
}

struct Paginator {
    body_height: usize,
    pages: Vec<Vec<String>>,
    current: Vec<String>,
}

impl Paginator {
    fn new(body_height: usize) -> Self {
        Self {
            body_height,
            pages: Vec::new(),
            current: Vec::new(),
        }
    }

    fn remaining(&self) -> usize {
        self.body_height - self.current.len()
    }

    fn page_number(&self) -> usize {
        self.pages.len() + 1
    }

    /// Starts a new page, unless the current one is empty.
    fn break_page(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(mem::take(&mut self.current));
        }
    }

    fn push_line(&mut self, line: String) {
        if self.remaining() == 0 {
            self.break_page();
        }
        self.current.push(line);
    }

    fn push_spacer(&mut self) {
        if !self.current.is_empty() && self.remaining() > 0 {
            self.current.push(String::new());
        }
    }

    fn overflow(&self, what: impl Into<String>, needed: usize) -> RenderError {
        RenderError::Overflow {
            what: what.into(),
            needed,
            available: self.body_height,
            page: self.page_number(),
        }
    }

    fn place(&mut self, laid: &Laid) -> Result<(), RenderError> {
        match laid {
            Laid::Fixed { what, lines } => {
                if lines.len() > self.body_height {
                    return Err(self.overflow(*what, lines.len()));
                }
                if lines.len() > self.remaining() {
                    self.break_page();
                }
                self.current.extend(lines.iter().cloned());
                self.push_spacer();
            }
            Laid::Flow { lines } => {
                for line in lines {
                    self.push_line(line.clone());
                }
                self.push_spacer();
            }
            Laid::Table {
                header,
                rows,
                repeat_header,
            } => self.place_table(header, rows, *repeat_header)?,
            Laid::Keep(children) => {
                // The trailing blank line may be dropped at the bottom of a page.
                let needed = laid.height().saturating_sub(1);
                if needed > self.remaining() && needed <= self.body_height {
                    self.break_page();
                }
                for child in children {
                    self.place(child)?;
                }
            }
            Laid::Break => self.break_page(),
        }
        Ok(())
    }

    fn place_table(
        &mut self,
        header: &[String],
        rows: &[Vec<String>],
        repeat_header: bool,
    ) -> Result<(), RenderError> {
        if rows.is_empty() {
            return self.place(&Laid::Fixed {
                what: "table header",
                lines: header.to_vec(),
            });
        }

        let mut header_printed = false;
        let mut needs_header = true;
        for (index, row) in rows.iter().enumerate() {
            if header.len() + row.len() > self.body_height {
                return Err(self.overflow(
                    format!("table row {} (with header)", index + 1),
                    header.len() + row.len(),
                ));
            }

            let header_len = if needs_header { header.len() } else { 0 };
            if header_len + row.len() > self.remaining() {
                self.break_page();
                needs_header = repeat_header || !header_printed;
            }
            if needs_header {
                self.current.extend(header.iter().cloned());
                header_printed = true;
                needs_header = false;
            }
            self.current.extend(row.iter().cloned());
        }
        self.push_spacer();
        Ok(())
    }

    fn finish(mut self) -> Vec<Vec<String>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn chart_lines(chart: &Chart, width: usize) -> Vec<String> {
    let series = &chart.series;
    let mut lines = vec![chart.caption.clone(), bar(series)];
    for entry in series.legend() {
        let mut line = String::new();
        swrite!(
            line,
            "{:<8}{:>6}{:>9.2}%",
            entry.label,
            entry.count,
            entry.percent
        );
        lines.push(line);
    }
    lines
        .into_iter()
        .flat_map(|line| fit(line, width))
        .collect()
}

/// Draws a proportional bar, with the emphasized slice set apart by a gap.
fn bar(series: &ChartSeries) -> String {
    const SLICE_CHARS: [char; 3] = ['#', '~', '!'];

    let total = series.total();
    if total == 0 {
        return "(no data)".to_owned();
    }

    let mut bar = String::from("[");
    let mut cumulative = 0;
    let mut boundary = 0;
    for (entry, ch) in series.slices().iter().zip(SLICE_CHARS) {
        cumulative += entry.count;
        let next = (cumulative * BAR_WIDTH + total / 2) / total;
        if entry.popout.is_some_and(|popout| popout > 0) {
            bar.push(' ');
        }
        bar.extend(std::iter::repeat_n(ch, next - boundary));
        boundary = next;
    }
    bar.push(']');
    bar
}

fn column_widths(relative: impl Iterator<Item = u16> + Clone, width: usize) -> Vec<usize> {
    let count = relative.clone().count();
    if count == 0 {
        return Vec::new();
    }
    let available = width.saturating_sub(COLUMN_SEPARATOR.len() * (count - 1));
    let total: usize = relative.clone().map(usize::from).sum::<usize>().max(1);

    let mut widths: Vec<usize> = relative
        .map(|weight| (available * usize::from(weight) / total).max(MIN_COLUMN_WIDTH))
        .collect();
    let used: usize = widths.iter().sum();
    if let Some(last) = widths.last_mut() {
        if used < available {
            *last += available - used;
        }
    }
    widths
}

fn table_row_lines(cells: &[Vec<String>], widths: &[usize], aligns: &[Align]) -> Vec<String> {
    let wrapped: Vec<Vec<String>> = cells
        .iter()
        .zip(widths)
        .map(|(lines, &width)| lines.iter().flat_map(|line| wrap(line, width)).collect())
        .collect();
    let height = wrapped.iter().map(Vec::len).max().unwrap_or(0).max(1);

    (0..height)
        .map(|index| {
            let line = wrapped
                .iter()
                .zip(widths)
                .zip(aligns)
                .map(|((lines, &width), &align_to)| {
                    align(lines.get(index).map_or("", String::as_str), width, align_to)
                })
                .collect::<Vec<_>>()
                .join(COLUMN_SEPARATOR);
            line.trim_end().to_owned()
        })
        .collect()
}

/// Returns `line` unchanged if it fits in `width`, otherwise wraps it.
fn fit(line: String, width: usize) -> Vec<String> {
    if line.width() <= width {
        vec![line]
    } else {
        wrap(&line, width)
    }
}

/// Greedily wraps `text` into lines no wider than `width`, breaking words that are too long.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        let word_width = word.width();
        let separator = usize::from(!current.is_empty());
        if current_width + separator + word_width <= width {
            if separator == 1 {
                current.push(' ');
            }
            current.push_str(word);
            current_width += separator + word_width;
            continue;
        }

        if !current.is_empty() {
            lines.push(mem::take(&mut current));
            current_width = 0;
        }
        for ch in word.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if current_width + ch_width > width && !current.is_empty() {
                lines.push(mem::take(&mut current));
                current_width = 0;
            }
            current.push(ch);
            current_width += ch_width;
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn align(text: &str, width: usize, align: Align) -> String {
    let padding = width.saturating_sub(text.width());
    match align {
        Align::Left => format!("{text}{}", " ".repeat(padding)),
        Align::Center => {
            let left = padding / 2;
            format!("{}{text}{}", " ".repeat(left), " ".repeat(padding - left))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chart::ChartBuilder,
        document::{Cell, Column, Row},
        statistics::Statistics,
    };
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn renderer() -> TextRenderer {
        TextRenderer::new(PageConfig {
            width: 60,
            height: 12,
        })
    }

    fn render(
        document: &ReportDocument,
    ) -> Result<(Vec<Vec<String>>, RenderSummary), RenderError> {
        let mut out = Vec::new();
        let summary = renderer().render(document, &mut out)?;
        let out = String::from_utf8(out).expect("output is UTF-8");
        let pages = out
            .split("\x0c\n")
            .map(|page| page.lines().map(str::to_owned).collect())
            .collect();
        Ok((pages, summary))
    }

    fn table(rows: usize, lines_per_row: usize) -> Table {
        let mut table = Table::new(
            vec![Column::left("Step", 50), Column::center("Result", 50)],
            true,
        );
        for index in 0..rows {
            let lines = (0..lines_per_row).map(|line| format!("step{index}.{line}")).collect();
            table.rows.push(Row {
                cells: vec![Cell::lines(lines), Cell::text("passed")],
            });
        }
        table
    }

    fn paragraph(lines: usize) -> Block {
        // Each word is wider than half the page, so each gets its own line.
        Block::Paragraph {
            text: (0..lines)
                .map(|index| format!("{index:0>40}"))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    #[test]
    fn every_page_has_footer() {
        let mut document = ReportDocument::new();
        document.push(paragraph(3));
        document.push(Block::PageBreak);
        document.push(paragraph(2));

        let (pages, summary) = render(&document).unwrap();
        assert_eq!(summary.pages, Some(2));
        assert_eq!(pages.len(), 2);
        for (index, page) in pages.iter().enumerate() {
            assert_eq!(page.len(), 12, "page {index} has the full height");
            assert_eq!(page[11].trim(), format!("Page {}", index + 1));
        }
    }

    #[test]
    fn page_breaks_do_not_create_blank_pages() {
        let mut document = ReportDocument::new();
        document.push(Block::PageBreak);
        document.push(paragraph(1));
        document.push(Block::PageBreak);
        document.push(Block::PageBreak);
        document.push(paragraph(1));
        document.push(Block::PageBreak);

        let (_, summary) = render(&document).unwrap();
        assert_eq!(summary.pages, Some(2));
    }

    #[test]
    fn table_split_repeats_header() {
        let mut document = ReportDocument::new();
        document.push(Block::heading(HeadingLevel::Section, "Results"));
        document.push(Block::Table(table(8, 1)));

        let (pages, summary) = render(&document).unwrap();
        assert_eq!(summary.pages, Some(2));

        // Heading (2 lines) and a blank line leave 7 lines: the header (2 lines) and 5 rows.
        assert_eq!(pages[0][0], "Results");
        assert!(pages[0][3].starts_with("Step"));
        assert!(pages[0][4].starts_with("-----"));
        assert!(pages[0][9].starts_with("step4.0"));

        assert!(pages[1][0].starts_with("Step"));
        assert!(pages[1][1].starts_with("-----"));
        assert!(pages[1][2].starts_with("step5.0"));
        assert!(pages[1][4].starts_with("step7.0"));
    }

    #[test]
    fn table_without_repeated_header() {
        let mut document = ReportDocument::new();
        let mut long = table(12, 1);
        long.repeat_header = false;
        document.push(Block::Table(long));

        let (pages, _) = render(&document).unwrap();
        assert!(pages[0][0].starts_with("Step"));
        assert!(pages[1][0].starts_with("step8.0"));
    }

    #[test]
    fn keep_together_moves_to_new_page() {
        let mut document = ReportDocument::new();
        document.push(paragraph(5));
        document.push(Block::KeepTogether {
            blocks: vec![
                Block::heading(HeadingLevel::Group, "case.py"),
                Block::Table(table(3, 1)),
            ],
        });

        let (pages, _) = render(&document).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1][0], "case.py");
        assert_eq!(pages[1][1], "-------");
        assert!(pages[1][3].starts_with("Step"));
    }

    #[test]
    fn keep_together_fits_on_current_page() {
        let mut document = ReportDocument::new();
        document.push(paragraph(1));
        document.push(Block::KeepTogether {
            blocks: vec![
                Block::heading(HeadingLevel::Group, "case.py"),
                Block::Table(table(2, 1)),
            ],
        });

        let (pages, _) = render(&document).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][2], "case.py");
    }

    #[test]
    fn keep_together_falls_back_to_splitting() {
        let mut document = ReportDocument::new();
        document.push(paragraph(2));
        document.push(Block::KeepTogether {
            blocks: vec![
                Block::heading(HeadingLevel::Group, "case.py"),
                Block::Table(table(20, 1)),
            ],
        });

        let (pages, _) = render(&document).unwrap();
        // The unit starts right after the paragraph instead of on a fresh page.
        assert_eq!(pages[0][3], "case.py");
        assert!(pages.len() > 2);
        assert!(pages[1][0].starts_with("Step"));
    }

    #[test]
    fn oversized_row_is_an_error() {
        let mut document = ReportDocument::new();
        document.push(Block::Table(table(2, 9)));

        let error = render(&document).expect_err("row does not fit on a page");
        match error {
            RenderError::Overflow {
                needed, available, ..
            } => {
                assert_eq!(needed, 11);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_title_is_an_error() {
        let mut document = ReportDocument::new();
        document.push(Block::Title {
            lines: (0..11).map(|index| format!("line {index}")).collect(),
        });
        assert!(matches!(
            render(&document),
            Err(RenderError::Overflow { .. })
        ));
    }

    #[test]
    fn charts_side_by_side() {
        let builder = ChartBuilder::default();
        let document = {
            let mut document = ReportDocument::new();
            document.push(Block::Charts {
                charts: vec![
                    Chart {
                        caption: "Test Cases".to_owned(),
                        series: builder.build(Statistics::new(1, 0, 1)),
                    },
                    Chart {
                        caption: "Test Steps".to_owned(),
                        series: builder.build(Statistics::default()),
                    },
                ],
            });
            document
        };

        let (pages, _) = render(&document).unwrap();
        let page = &pages[0];
        assert!(page[0].starts_with("Test Cases"));
        assert!(page[0].contains("Test Steps"));
        assert!(page[1].starts_with("[########## !!!!!!!!!!]"));
        assert!(page[1].contains("(no data)"));
        assert!(page[2].starts_with("passed       1    50.00%"));
        assert!(page[5].starts_with("Sum          2   100.00%"));
    }

    #[test_case("", 10, vec![""]; "empty")]
    #[test_case("a b c", 10, vec!["a b c"]; "fits")]
    #[test_case("alpha beta gamma", 10, vec!["alpha beta", "gamma"]; "wraps at words")]
    #[test_case("abcdefghijkl", 5, vec!["abcde", "fghij", "kl"]; "breaks long words")]
    #[test_case("日本語テキスト", 6, vec!["日本語", "テキス", "ト"]; "wide characters")]
    fn wrap_text(text: &str, width: usize, expected: Vec<&str>) {
        assert_eq!(wrap(text, width), expected);
    }

    #[test]
    fn widths_fill_page() {
        let widths = column_widths([36u16, 24, 10, 30].into_iter(), 100);
        assert_eq!(widths.iter().sum::<usize>() + 3 * COLUMN_SEPARATOR.len(), 100);
        assert_eq!(widths, vec![32, 21, 9, 29]);
    }
}
