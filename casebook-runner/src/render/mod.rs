// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering report documents to bytes.

mod json;
mod text;

pub use json::JsonRenderer;
pub use text::TextRenderer;

use crate::{config::PageConfig, document::ReportDocument, errors::RenderError};
use serde::{Deserialize, Serialize};
use std::{fmt, io::Write};

/// The format a report is written in.
#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Paginated plain text.
    #[default]
    Text,

    /// The document structure as JSON.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Turns a [`ReportDocument`] into output.
pub trait Renderer {
    /// Renders `document` to `writer`.
    fn render(
        &self,
        document: &ReportDocument,
        writer: &mut dyn Write,
    ) -> Result<RenderSummary, RenderError>;
}

/// Information about a completed render.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderSummary {
    /// The number of pages produced, for paginated formats.
    pub pages: Option<usize>,
}

/// Returns the renderer for an output format.
pub fn renderer_for(format: OutputFormat, page: PageConfig) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Text => Box::new(TextRenderer::new(page)),
        OutputFormat::Json => Box::new(JsonRenderer),
    }
}
