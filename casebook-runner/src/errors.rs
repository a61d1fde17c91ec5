// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by casebook.

use crate::config::PageConfig;
use camino::Utf8PathBuf;
use casebook_metadata::EventReadError;
use config::ConfigError;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse casebook config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The output path is not a valid timestamp template.
    #[error(transparent)]
    InvalidOutputTemplate(#[from] InvalidOutputTemplate),

    /// The page geometry cannot hold any content.
    #[error(
        "page size {width}x{height} is too small (must be at least {}x{})",
        PageConfig::MIN_WIDTH,
        PageConfig::MIN_HEIGHT
    )]
    PageTooSmall {
        /// The configured width.
        width: usize,

        /// The configured height.
        height: usize,
    },

    /// The maximum error text length cannot hold the ellipsis.
    #[error("error-text max-length {max_length} must be larger than the ellipsis `{ellipsis}`")]
    ErrorTextTooShort {
        /// The configured maximum length.
        max_length: usize,

        /// The configured ellipsis.
        ellipsis: String,
    },
}

/// An output path contains an invalid strftime placeholder.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("output path `{output}` contains an invalid timestamp placeholder")]
pub struct InvalidOutputTemplate {
    output: Utf8PathBuf,
}

impl InvalidOutputTemplate {
    pub(crate) fn new(output: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    /// Returns the output path as given.
    pub fn output(&self) -> &Utf8PathBuf {
        &self.output
    }
}

/// A step identifier did not match the `<case path>::<step name>` pattern.
///
/// Grouping by test case depends on this split always succeeding, so this is treated as a
/// data-integrity failure rather than skipped.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("malformed step identifier `{node_id}`: {reason}")]
pub struct MalformedIdentityError {
    node_id: String,
    reason: &'static str,
}

impl MalformedIdentityError {
    pub(crate) fn new(node_id: impl Into<String>, reason: &'static str) -> Self {
        Self {
            node_id: node_id.into(),
            reason,
        }
    }

    /// Returns the offending step identifier.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

/// An error in the ordering of session lifecycle events.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    /// An outcome or finish event arrived before the session started.
    #[error("received `{event}` before the session started")]
    NotStarted {
        /// The event that arrived.
        event: &'static str,
    },

    /// A second session-started event arrived.
    #[error("session already started with root `{root}`")]
    AlreadyStarted {
        /// The root of the running session.
        root: Utf8PathBuf,
    },

    /// The event stream ended without a session-finished event.
    #[error("event stream ended before the session finished")]
    Unfinished,
}

/// An error that occurred while rendering a report document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// Some content cannot fit on a single page, even on its own.
    #[error(
        "{what} needs {needed} lines but a page only has room for {available} \
         (page {page})"
    )]
    Overflow {
        /// A description of the content that did not fit.
        what: String,

        /// The number of lines the content needs.
        needed: usize,

        /// The number of body lines on a page.
        available: usize,

        /// The page on which the overflow occurred.
        page: usize,
    },

    /// Writing the rendered output failed.
    #[error("failed to write rendered output")]
    Io(#[from] std::io::Error),

    /// Serializing the document failed.
    #[error("failed to serialize report document")]
    Json(#[from] serde_json::Error),
}

/// An error that occurred while writing the report artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// Creating the parent directory of the artifact failed.
    #[error("failed to create report directory `{dir}`")]
    CreateDir {
        /// The directory that could not be created.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Rendering failed. No artifact was written.
    #[error("failed to render report to `{path}`")]
    Render {
        /// The artifact path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: RenderError,
    },

    /// Moving the rendered artifact into place failed.
    #[error("failed to write report to `{path}`")]
    AtomicWrite {
        /// The artifact path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that aborted report generation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// The event stream could not be read.
    #[error("error reading outcome events")]
    EventRead(#[from] EventReadError),

    /// A step identifier was malformed.
    #[error(
        "malformed outcome{}",
        .line.map(|line| format!(" on line {line}")).unwrap_or_default()
    )]
    MalformedIdentity {
        /// The 1-based line number of the outcome, if read from a stream.
        line: Option<usize>,

        /// The underlying error.
        #[source]
        error: MalformedIdentityError,
    },

    /// Lifecycle events arrived out of order.
    #[error("invalid session lifecycle")]
    SessionState(#[from] SessionStateError),

    /// The session was aborted by the host.
    #[error("session aborted{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Aborted {
        /// The reason supplied by the host, if any.
        reason: Option<String>,
    },

    /// The output path could not be expanded.
    #[error("error determining report path")]
    OutputPath(#[from] InvalidOutputTemplate),

    /// Writing the artifact failed.
    #[error("error generating report")]
    Write(#[from] WriteReportError),
}

/// Displays an error along with its chain of sources on one line each.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut current_error = self.error.source();
        while let Some(error) = current_error {
            write!(f, "\n  caused by: {error}")?;
            current_error = error.source();
        }

        Ok(())
    }
}
