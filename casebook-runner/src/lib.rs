// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for casebook: turning a stream of test outcomes into a paginated report.
//!
//! The flow of a report is:
//!
//! 1. Each outcome is assigned to a project by the [`resolver`], which walks up from the test's
//!    location looking for a marker directory.
//! 2. The [`collector`] keeps the outcomes that are final verdicts for a step, grouped by project.
//! 3. When the session finishes, the outcomes are arranged into a [`tree`] of projects, cases
//!    and steps, and [`statistics`] are rolled up at each level.
//! 4. The [`composer`] turns the tree into a [`document`], which a [renderer](render) writes out.
//!
//! [`session`] drives all of this from lifecycle events.

pub mod chart;
pub mod collector;
pub mod composer;
pub mod config;
pub mod document;
pub mod error_text;
pub mod errors;
pub mod identity;
pub mod metadata;
pub mod render;
pub mod resolver;
pub mod session;
pub mod statistics;
pub mod tree;

/// Shown in place of any value that is not known.
pub const UNDEFINED: &str = "undefined";
