// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable input for casebook.
//!
//! Host test runners describe a test session as a stream of JSON objects, one per line. Each line
//! is an [`OutcomeEvent`]: the session starting, a single verdict for one test step during one
//! execution phase, and the session finishing (or being aborted).
//!
//! ```text
//! {"type":"session-started","root":"/work/suite"}
//! {"type":"outcome","node-id":"checkout/test_cart.py::test_add[qty=1]","phase":"call","verdict":"passed","parameters":{"qty":"1"}}
//! {"type":"session-finished"}
//! ```
//!
//! Exit codes for the `casebook` binary are documented in [`CasebookExitCode`].

mod errors;
mod events;
mod exit_codes;

pub use errors::*;
pub use events::*;
pub use exit_codes::*;
