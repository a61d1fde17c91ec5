// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt, io};

/// An error that occurs while reading the outcome event stream.
#[derive(Debug)]
pub enum EventReadError {
    /// Reading from the underlying source failed.
    Io {
        /// The 1-based line number being read.
        line: usize,

        /// The underlying error.
        err: io::Error,
    },

    /// A line was not a valid event.
    Json {
        /// The 1-based line number of the invalid event.
        line: usize,

        /// The underlying error.
        err: serde_json::Error,
    },
}

impl EventReadError {
    /// Returns the 1-based line number at which the error occurred.
    pub fn line(&self) -> usize {
        match self {
            Self::Io { line, .. } | Self::Json { line, .. } => *line,
        }
    }
}

impl fmt::Display for EventReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io { line, .. } => {
                write!(f, "failed to read event stream at line {line}")
            }
            Self::Json { line, .. } => {
                write!(f, "invalid event at line {line}")
            }
        }
    }
}

impl error::Error for EventReadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io { err, .. } => Some(err),
            Self::Json { err, .. } => Some(err),
        }
    }
}
