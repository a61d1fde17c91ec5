// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step identifiers.

use crate::errors::MalformedIdentityError;
use camino::Utf8Path;
use std::fmt;

/// The delimiter between the case path and the step name.
pub const CASE_STEP_DELIMITER: &str = "::";

/// A parsed step identifier: a case path and a step name, with an optional parameter suffix.
///
/// For `checkout/test_cart.py::test_add[qty=1]`, the case path is `checkout/test_cart.py`, the
/// step name is `test_add[qty=1]`, the base name is `test_add`, and the parameter suffix is
/// `qty=1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StepId {
    node_id: String,
    // Byte offsets into node_id.
    case_end: usize,
    base_end: usize,
}

impl StepId {
    /// Parses a step identifier.
    ///
    /// The identifier is split at the first `::`. Anything after that, including further `::`
    /// separators (e.g. `Class::method`), is the step name.
    pub fn parse(node_id: impl Into<String>) -> Result<Self, MalformedIdentityError> {
        let node_id = node_id.into();
        let Some((case_path, step_name)) = node_id.split_once(CASE_STEP_DELIMITER) else {
            return Err(MalformedIdentityError::new(
                node_id,
                "missing `::` between case path and step name",
            ));
        };
        if case_path.trim().is_empty() {
            return Err(MalformedIdentityError::new(node_id, "case path is empty"));
        }
        if step_name.trim().is_empty() {
            return Err(MalformedIdentityError::new(node_id, "step name is empty"));
        }

        let case_end = case_path.len();
        let step_start = case_end + CASE_STEP_DELIMITER.len();
        let base_len = match split_parameter_suffix(step_name) {
            Some((base, _)) => base.len(),
            None => step_name.len(),
        };

        Ok(Self {
            case_end,
            base_end: step_start + base_len,
            node_id,
        })
    }

    /// Returns the full identifier as originally supplied.
    pub fn as_str(&self) -> &str {
        &self.node_id
    }

    /// Returns the case path: everything before the first `::`.
    pub fn case_path(&self) -> &str {
        &self.node_id[..self.case_end]
    }

    /// Returns the step name, including any parameter suffix.
    pub fn step_name(&self) -> &str {
        &self.node_id[self.case_end + CASE_STEP_DELIMITER.len()..]
    }

    /// Returns the step name without the parameter suffix.
    pub fn base_name(&self) -> &str {
        &self.node_id[self.case_end + CASE_STEP_DELIMITER.len()..self.base_end]
    }

    /// Returns the parameter suffix without brackets, if any.
    pub fn parameter_suffix(&self) -> Option<&str> {
        split_parameter_suffix(self.step_name()).map(|(_, suffix)| suffix)
    }
}

/// Returns the file name of a case path, used as the script name in reports.
pub fn script_name(case_path: &str) -> &str {
    Utf8Path::new(case_path).file_name().unwrap_or(case_path)
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.node_id)
    }
}

fn split_parameter_suffix(step_name: &str) -> Option<(&str, &str)> {
    let without_close = step_name.strip_suffix(']')?;
    let open = without_close.find('[')?;
    let base = &without_close[..open];
    (!base.is_empty()).then(|| (base, &without_close[open + 1..]))
}
