// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalizing failure and skip text for table display.

use itertools::Itertools;

/// Normalizes multi-line failure or skip text into a single bounded line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorTextFormatter {
    max_length: usize,
    ellipsis: String,
    strip_prefix: String,
}

impl ErrorTextFormatter {
    /// The default maximum length of formatted text, in characters, including the ellipsis.
    pub const DEFAULT_MAX_LENGTH: usize = 60;

    /// The default marker appended to truncated text.
    pub const DEFAULT_ELLIPSIS: &'static str = "...";

    /// The default prefix removed from failure text.
    pub const DEFAULT_STRIP_PREFIX: &'static str = "FAILED ";

    /// Creates a new formatter.
    ///
    /// `max_length` is measured in characters and includes the ellipsis. It must be larger than
    /// the ellipsis; configuration validation enforces this.
    pub fn new(
        max_length: usize,
        ellipsis: impl Into<String>,
        strip_prefix: impl Into<String>,
    ) -> Self {
        Self {
            max_length,
            ellipsis: ellipsis.into(),
            strip_prefix: strip_prefix.into(),
        }
    }

    /// Returns the maximum length of formatted text.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Formats failure text for display.
    ///
    /// `phase_suffix` names the phase the failure happened in, if it wasn't the test body (e.g.
    /// `teardown`). Returns `None` if there is nothing to display.
    pub fn failure(&self, raw: &str, phase_suffix: Option<&str>) -> Option<String> {
        format_error_text(
            raw,
            phase_suffix,
            &self.strip_prefix,
            self.max_length,
            &self.ellipsis,
        )
    }

    /// Formats a skip reason for display. Skip reasons never carry a phase suffix.
    pub fn skip_reason(&self, raw: &str) -> Option<String> {
        self.failure(raw, None)
    }
}

impl Default for ErrorTextFormatter {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_LENGTH,
            Self::DEFAULT_ELLIPSIS,
            Self::DEFAULT_STRIP_PREFIX,
        )
    }
}

/// Collapses whitespace in `raw`, removes every leading repetition of `prefix`, appends
/// `phase_suffix` and truncates the result to at most `max_length` characters (ellipsis included).
///
/// Returns `None` if the normalized text is empty.
pub fn format_error_text(
    raw: &str,
    phase_suffix: Option<&str>,
    prefix: &str,
    max_length: usize,
    ellipsis: &str,
) -> Option<String> {
    let collapsed = raw.split_whitespace().join(" ");
    let mut text = strip_prefixes(&collapsed, prefix).to_owned();
    if text.is_empty() {
        return None;
    }

    if let Some(suffix) = phase_suffix.filter(|suffix| !suffix.is_empty()) {
        text.push_str(" (");
        text.push_str(suffix);
        text.push(')');
    }

    let char_count = text.chars().count();
    if char_count <= max_length {
        return Some(text);
    }

    let keep = max_length.saturating_sub(ellipsis.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ellipsis);
    Some(truncated)
}

// Stripping until nothing matches keeps formatting idempotent.
fn strip_prefixes<'a>(mut text: &'a str, prefix: &str) -> &'a str {
    // Collapsing drops trailing whitespace, so a final bare prefix word has no trailing space.
    let bare = prefix.trim_end();
    if bare.is_empty() {
        return text;
    }
    loop {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
        } else if text == bare {
            return "";
        } else {
            return text;
        }
    }
}
