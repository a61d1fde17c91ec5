// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `casebook` failures.
///
/// Report generation may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum CasebookExitCode {}

impl CasebookExitCode {
    /// No errors occurred and the report was written.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up a casebook invocation, e.g. an invalid config file.
    pub const SETUP_ERROR: i32 = 96;

    /// The outcome event stream could not be read or contained malformed data.
    pub const INPUT_ERROR: i32 = 97;

    /// The session was aborted before it finished, so no report was written.
    pub const SESSION_ABORTED: i32 = 98;

    /// Composing, rendering or writing the report produced an error.
    pub const REPORT_GENERATION_FAILED: i32 = 110;
}
