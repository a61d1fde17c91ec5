// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RenderSummary, Renderer};
use crate::{document::ReportDocument, errors::RenderError};
use std::io::Write;

/// Writes the document structure as pretty-printed JSON.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(
        &self,
        document: &ReportDocument,
        mut writer: &mut dyn Write,
    ) -> Result<RenderSummary, RenderError> {
        serde_json::to_writer_pretty(&mut writer, document)?;
        writeln!(writer)?;
        Ok(RenderSummary { pages: None })
    }
}
