// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use casebook_metadata::CasebookExitCode;
use casebook_runner::errors::{
    ConfigParseError, InvalidOutputTemplate, ReportError, WriteReportError,
};
use owo_colors::OwoColorize;
use std::{error::Error, path::PathBuf};
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are printed with display_to_stderr, which
// colorizes them.

/// An expected failure, reported to the user with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed { err: std::io::Error },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: PathBuf },
    #[error("failed to open input")]
    InputOpenFailed {
        path: Utf8PathBuf,
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid output path")]
    InvalidOutputTemplate { err: InvalidOutputTemplate },
    #[error("report generation failed")]
    ReportError { err: ReportError },
    #[error("failed to write to stdout")]
    WriteStdout { err: std::io::Error },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::InvalidOutputTemplate { .. } => CasebookExitCode::SETUP_ERROR,
            Self::InputOpenFailed { .. } => CasebookExitCode::INPUT_ERROR,
            Self::ReportError { err } => match err {
                ReportError::EventRead(_)
                | ReportError::MalformedIdentity { .. }
                | ReportError::SessionState(_) => CasebookExitCode::INPUT_ERROR,
                ReportError::Aborted { .. } => CasebookExitCode::SESSION_ABORTED,
                _ => CasebookExitCode::REPORT_GENERATION_FAILED,
            },
            // Unexpected, but not a failure to generate the report.
            Self::WriteStdout { .. } => 1,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { err } => {
                tracing::error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                tracing::error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::InputOpenFailed { path, err } => {
                tracing::error!("failed to open input `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                tracing::error!(
                    "failed to parse casebook config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::InvalidOutputTemplate { err } => {
                tracing::error!("invalid `--output` value");
                Some(err as &dyn Error)
            }
            Self::ReportError { err } => match err {
                ReportError::Aborted { reason } => {
                    match reason {
                        Some(reason) => tracing::error!(
                            "session aborted: {}; no report was written",
                            reason.style(styles.bold)
                        ),
                        None => tracing::error!("session aborted; no report was written"),
                    }
                    None
                }
                ReportError::Write(WriteReportError::Render { path, error }) => {
                    tracing::error!(
                        "failed to render report for `{}`; no report was written",
                        path.style(styles.bold)
                    );
                    Some(error as &dyn Error)
                }
                other => {
                    tracing::error!("{other}");
                    other.source()
                }
            },
            Self::WriteStdout { err } => {
                tracing::error!("failed to write to stdout");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
