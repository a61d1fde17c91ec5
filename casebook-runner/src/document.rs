// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The report document: an ordered list of content blocks handed to a renderer.

use crate::chart::{ChartSeries, Color};
use serde::Serialize;

/// A composed report, ready for rendering.
///
/// Blocks are appended in a single pass and never modified afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReportDocument {
    blocks: Vec<Block>,
}

impl ReportDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block.
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Returns the blocks in order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

impl Extend<Block> for ReportDocument {
    fn extend<T: IntoIterator<Item = Block>>(&mut self, iter: T) {
        self.blocks.extend(iter);
    }
}

/// A unit of content.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Block {
    /// The title block of a project: one centred line each.
    Title {
        /// The lines of the title, the first one being the main title.
        lines: Vec<String>,
    },

    /// A paragraph of running text.
    Paragraph {
        /// The text.
        text: String,
    },

    /// A heading.
    Heading {
        /// The heading level.
        level: HeadingLevel,

        /// The heading text.
        text: String,
    },

    /// Charts placed side by side.
    Charts {
        /// The charts, left to right.
        charts: Vec<Chart>,
    },

    /// A table.
    Table(Table),

    /// Blocks the renderer should keep on one page if they fit on one.
    KeepTogether {
        /// The grouped blocks.
        blocks: Vec<Block>,
    },

    /// Starts a new page.
    PageBreak,
}

impl Block {
    /// Creates a heading block.
    pub fn heading(level: HeadingLevel, text: impl Into<String>) -> Self {
        Self::Heading {
            level,
            text: text.into(),
        }
    }
}

/// The level of a heading.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeadingLevel {
    /// A section heading, such as "Test Step Results".
    Section,

    /// A group heading, such as a test case identifier.
    Group,
}

/// A captioned chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chart {
    /// The caption shown above the chart.
    pub caption: String,

    /// The data.
    pub series: ChartSeries,
}

/// A table with a header row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Table {
    /// The columns.
    pub columns: Vec<Column>,

    /// The body rows. Each row has one cell per column.
    pub rows: Vec<Row>,

    /// Whether the header row is repeated when the table is split across pages.
    pub repeat_header: bool,
}

impl Table {
    /// Creates a table with no rows.
    pub fn new(columns: Vec<Column>, repeat_header: bool) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            repeat_header,
        }
    }
}

/// A table column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    /// The header text.
    pub title: String,

    /// The relative width of this column.
    pub width: u16,

    /// The alignment of cells in this column.
    pub align: Align,
}

impl Column {
    /// Creates a left-aligned column.
    pub fn left(title: impl Into<String>, width: u16) -> Self {
        Self {
            title: title.into(),
            width,
            align: Align::Left,
        }
    }

    /// Creates a centred column.
    pub fn center(title: impl Into<String>, width: u16) -> Self {
        Self {
            title: title.into(),
            width,
            align: Align::Center,
        }
    }
}

/// Horizontal alignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Align {
    /// Left-aligned.
    Left,

    /// Centred.
    Center,
}

/// A table row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    /// The cells, one per column.
    pub cells: Vec<Cell>,
}

/// A table cell: zero or more lines of text, with an optional background.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Cell {
    /// The lines of text.
    pub lines: Vec<String>,

    /// The background colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
}

impl Cell {
    /// Creates a cell with a single line.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            fill: None,
        }
    }

    /// Creates a cell with several lines.
    pub fn lines(lines: Vec<String>) -> Self {
        Self { lines, fill: None }
    }

    /// Sets the background colour.
    pub fn with_fill(mut self, fill: Color) -> Self {
        self.fill = Some(fill);
        self
    }
}
