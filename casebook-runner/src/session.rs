// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driving a report from session lifecycle events.
//!
//! A [`ReportSession`] collects outcomes between a session start and finish. On finish, it builds
//! the report tree, fetches project metadata, composes the document, and writes the artifact. An
//! aborted session discards everything it collected and writes nothing.

use crate::{
    collector::{OutcomeRecord, RecordDisposition, ResultCollector},
    composer::DocumentComposer,
    config::CasebookConfig,
    document::ReportDocument,
    errors::{DisplayErrorChain, RenderError, ReportError, SessionStateError, WriteReportError},
    metadata::{MetadataProvider, ProjectDescriptor, fetch_all},
    render::{Renderer, renderer_for},
    resolver::ProjectResolver,
    statistics::{ReportStatistics, Statistics},
    tree::ReportTree,
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::{Utf8Path, Utf8PathBuf};
use casebook_metadata::{EventReadError, OutcomeEvent, OutcomeSummary};
use chrono::{DateTime, FixedOffset, Local};
use std::io::{BufWriter, Write};
use tracing::{debug, info};

/// Collects outcomes for one session at a time and writes a report when the session finishes.
pub struct ReportSession<'a> {
    config: &'a CasebookConfig,
    provider: &'a dyn MetadataProvider,
    resolver: ProjectResolver,
    running: Option<RunningSession>,
}

struct RunningSession {
    root: Utf8PathBuf,
    started_at: DateTime<FixedOffset>,
    collector: ResultCollector,
}

/// Whether a session is still running after an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionProgress {
    /// More events are expected.
    Running,

    /// The session finished and the report was written.
    Finished(ReportSummary),
}

/// Information about a written report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSummary {
    /// The path the report was written to.
    pub path: Utf8PathBuf,

    /// The number of projects in the report.
    pub project_count: usize,

    /// One rolled-up verdict per project.
    pub projects: Statistics,

    /// Case and step statistics over all projects.
    pub statistics: ReportStatistics,

    /// The number of pages, for paginated formats.
    pub pages: Option<usize>,
}

impl<'a> ReportSession<'a> {
    /// Creates a new session driver.
    pub fn new(config: &'a CasebookConfig, provider: &'a dyn MetadataProvider) -> Self {
        Self {
            config,
            provider,
            resolver: ProjectResolver::new(config.marker()),
            running: None,
        }
    }

    /// Starts a session rooted at `root`.
    ///
    /// If `started_at` is not provided, the current time is used. The resolver cache is cleared,
    /// since the filesystem may have changed since the last session.
    pub fn start(
        &mut self,
        root: Utf8PathBuf,
        started_at: Option<DateTime<FixedOffset>>,
    ) -> Result<(), SessionStateError> {
        if let Some(running) = &self.running {
            return Err(SessionStateError::AlreadyStarted {
                root: running.root.clone(),
            });
        }

        self.resolver.clear();
        let started_at = started_at.unwrap_or_else(|| Local::now().fixed_offset());
        debug!("session started at {started_at} with root `{root}`");
        self.running = Some(RunningSession {
            root,
            started_at,
            collector: ResultCollector::new(self.config.teardown_policy()),
        });
        Ok(())
    }

    /// Records an outcome.
    ///
    /// A malformed step identifier aborts the session.
    pub fn record(&mut self, outcome: OutcomeSummary) -> Result<RecordDisposition, ReportError> {
        let running = self
            .running
            .as_mut()
            .ok_or(SessionStateError::NotStarted { event: "outcome" })?;

        let project = self
            .resolver
            .resolve(&running.root, OutcomeRecord::location_for(&outcome));
        match OutcomeRecord::new(outcome, project) {
            Ok(record) => Ok(running.collector.record(record)),
            Err(error) => {
                self.abort();
                Err(ReportError::MalformedIdentity { line: None, error })
            }
        }
    }

    /// Finishes the session and writes the report.
    pub fn finish(&mut self) -> Result<ReportSummary, ReportError> {
        let RunningSession {
            root,
            started_at,
            collector,
        } = self.running.take().ok_or(SessionStateError::NotStarted {
            event: "session-finished",
        })?;

        let (hits, misses) = self.resolver.cache_stats();
        debug!(
            "collected {} results in {} projects (project cache: {hits} hits, {misses} misses)",
            collector.record_count(),
            collector.project_count(),
        );

        let tree = ReportTree::build(collector);
        if tree.is_empty() {
            debug!("no results collected, writing an empty report");
        }
        let (statistics, projects) = tree.overall_statistics();

        let descriptors: Vec<_> = tree
            .projects()
            .map(|(_, node)| ProjectDescriptor::new(node.key(), &root))
            .collect();
        let metadata = fetch_all(self.provider, &descriptors);

        let composer = DocumentComposer::new(
            self.config.layout(),
            self.config.error_text_formatter(),
            self.config.chart_builder(),
            Local::now().fixed_offset(),
        );
        let document = composer.compose(&tree, &metadata);

        let path = self.config.output().expand(&root, &started_at)?;
        let renderer = renderer_for(self.config.format(), self.config.page());
        let pages = write_report(&path, renderer.as_ref(), &document)?;
        info!("wrote {} report to {path}", self.config.format());

        Ok(ReportSummary {
            path,
            project_count: descriptors.len(),
            projects,
            statistics,
            pages,
        })
    }

    /// Aborts the session, discarding everything collected.
    pub fn abort(&mut self) {
        if let Some(running) = self.running.take() {
            debug!(
                "discarding {} results for session with root `{}`",
                running.collector.record_count(),
                running.root,
            );
        }
    }

    /// Handles a single lifecycle event.
    pub fn handle(&mut self, event: OutcomeEvent) -> Result<SessionProgress, ReportError> {
        match event {
            OutcomeEvent::SessionStarted { root, started_at } => {
                self.start(root, started_at)?;
            }
            OutcomeEvent::Outcome(outcome) => {
                self.record(outcome)?;
            }
            OutcomeEvent::SessionFinished => {
                return self.finish().map(SessionProgress::Finished);
            }
            OutcomeEvent::SessionAborted { reason } => {
                self.abort();
                return Err(ReportError::Aborted { reason });
            }
        }
        Ok(SessionProgress::Running)
    }

    /// Handles events until the session finishes.
    ///
    /// If the events run out first, or any error occurs, the session is aborted.
    pub fn run<I>(&mut self, events: I) -> Result<ReportSummary, ReportError>
    where
        I: IntoIterator<Item = Result<(usize, OutcomeEvent), EventReadError>>,
    {
        let result = self.run_impl(events);
        if let Err(error) = &result {
            debug!("session failed: {}", DisplayErrorChain::new(error));
            self.abort();
        }
        result
    }

    fn run_impl<I>(&mut self, events: I) -> Result<ReportSummary, ReportError>
    where
        I: IntoIterator<Item = Result<(usize, OutcomeEvent), EventReadError>>,
    {
        for event in events {
            let (line, event) = event?;
            let progress = self.handle(event).map_err(|error| match error {
                ReportError::MalformedIdentity { line: None, error } => {
                    ReportError::MalformedIdentity {
                        line: Some(line),
                        error,
                    }
                }
                other => other,
            })?;
            if let SessionProgress::Finished(summary) = progress {
                return Ok(summary);
            }
        }

        Err(SessionStateError::Unfinished.into())
    }
}

/// Renders `document` and writes it to `path` atomically, creating parent directories as needed.
///
/// If rendering fails, nothing is written to `path`. Returns the number of pages rendered, if the
/// format is paginated.
pub fn write_report(
    path: &Utf8Path,
    renderer: &dyn Renderer,
    document: &ReportDocument,
) -> Result<Option<usize>, WriteReportError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_str().is_empty()) {
        fs_err::create_dir_all(dir).map_err(|error| WriteReportError::CreateDir {
            dir: dir.to_owned(),
            error,
        })?;
    }

    let summary = AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|file| {
            let mut writer = BufWriter::new(file);
            let summary = renderer.render(document, &mut writer)?;
            writer.flush()?;
            Ok::<_, RenderError>(summary)
        })
        .map_err(|err| match err {
            atomicwrites::Error::Internal(error) => WriteReportError::AtomicWrite {
                path: path.to_owned(),
                error,
            },
            atomicwrites::Error::User(error) => WriteReportError::Render {
                path: path.to_owned(),
                error,
            },
        })?;

    Ok(summary.pages)
}
