// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collecting outcome records per project.
//!
//! Only outcomes that represent the final verdict for a test step are kept as scoring records: any
//! call-phase outcome, and setup-phase skips. Teardown failures may be attached to an existing
//! scoring record as supplementary text, depending on the [`TeardownPolicy`].

use crate::{errors::MalformedIdentityError, identity::StepId, resolver::ProjectKey};
use camino::Utf8Path;
use casebook_metadata::{OutcomeSummary, Phase, Verdict};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// One verdict for one test step during one execution phase.
///
/// Records are immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeRecord {
    step_id: StepId,
    phase: Phase,
    verdict: Verdict,
    failure_detail: Option<String>,
    skip_reason: Option<String>,
    parameters: IndexMap<String, String>,
    project: ProjectKey,
}

impl OutcomeRecord {
    /// Creates a new record from an outcome summary and the project it was resolved to.
    pub fn new(
        summary: OutcomeSummary,
        project: ProjectKey,
    ) -> Result<Self, MalformedIdentityError> {
        let step_id = StepId::parse(summary.node_id)?;
        Ok(Self {
            step_id,
            phase: summary.phase,
            verdict: summary.verdict,
            failure_detail: summary.failure_detail,
            skip_reason: summary.skip_reason,
            parameters: summary.parameters,
            project,
        })
    }

    /// Returns the location used to resolve the project of an outcome: the explicit location if
    /// one was provided, otherwise the case path.
    pub fn location_for(summary: &OutcomeSummary) -> &Utf8Path {
        match &summary.location {
            Some(location) => location,
            None => {
                let case_path = summary
                    .node_id
                    .split_once(crate::identity::CASE_STEP_DELIMITER)
                    .map_or(summary.node_id.as_str(), |(case_path, _)| case_path);
                Utf8Path::new(case_path)
            }
        }
    }

    /// Returns the step identifier.
    pub fn step_id(&self) -> &StepId {
        &self.step_id
    }

    /// Returns the execution phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the verdict.
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Returns the raw failure text, if any.
    pub fn failure_detail(&self) -> Option<&str> {
        self.failure_detail.as_deref()
    }

    /// Returns the raw skip reason, if any.
    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// Returns the parameters, in declaration order.
    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    /// Returns the project this record was resolved to.
    pub fn project(&self) -> &ProjectKey {
        &self.project
    }

    /// Returns true if this record is the final verdict for its step.
    pub fn is_scoring(&self) -> bool {
        is_scoring(self.phase, self.verdict)
    }
}

/// Returns true if an outcome with this phase and verdict is the final verdict for a test step.
pub fn is_scoring(phase: Phase, verdict: Verdict) -> bool {
    match phase {
        Phase::Call => true,
        Phase::Setup => verdict == Verdict::Skipped,
        Phase::Teardown => false,
    }
}

/// What to do with teardown-phase failures.
#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownPolicy {
    /// Attach the failure text to the latest scoring record for the same step.
    #[default]
    Attach,

    /// Discard teardown failures.
    Drop,
}

/// What the collector did with a record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordDisposition {
    /// The record was appended as a scoring record.
    Scored,

    /// The record's failure text was attached to an earlier scoring record.
    Attached,

    /// The record was discarded.
    Discarded,
}

/// The records collected for a single project, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct ProjectRecords {
    records: Vec<OutcomeRecord>,
    // Supplementary failure text, keyed by index into `records`.
    attached: BTreeMap<usize, Vec<String>>,
}

impl ProjectRecords {
    /// Returns the scoring records in arrival order.
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    /// Returns supplementary teardown failure text attached to the record at `index`.
    pub fn attached(&self, index: usize) -> &[String] {
        self.attached.get(&index).map_or(&[], Vec::as_slice)
    }

    /// Consumes self, returning the records along with their attached text.
    pub fn into_parts(self) -> (Vec<OutcomeRecord>, BTreeMap<usize, Vec<String>>) {
        (self.records, self.attached)
    }

    fn attach(&mut self, record: &OutcomeRecord) -> bool {
        let Some(text) = record.failure_detail() else {
            return false;
        };
        let Some(index) = self
            .records
            .iter()
            .rposition(|scored| scored.step_id == record.step_id)
        else {
            return false;
        };
        self.attached.entry(index).or_default().push(text.to_owned());
        true
    }
}

/// Appends outcome records to per-project lists.
///
/// Projects appear in the order of their first scoring record.
#[derive(Clone, Debug, Default)]
pub struct ResultCollector {
    teardown_policy: TeardownPolicy,
    projects: IndexMap<ProjectKey, ProjectRecords>,
}

impl ResultCollector {
    /// Creates a new, empty collector.
    pub fn new(teardown_policy: TeardownPolicy) -> Self {
        Self {
            teardown_policy,
            projects: IndexMap::new(),
        }
    }

    /// Records an outcome.
    pub fn record(&mut self, record: OutcomeRecord) -> RecordDisposition {
        if record.is_scoring() {
            trace!(
                "scoring {} ({}, {}) for project {}",
                record.step_id,
                record.phase,
                record.verdict,
                record.project,
            );
            self.projects
                .entry(record.project.clone())
                .or_default()
                .records
                .push(record);
            return RecordDisposition::Scored;
        }

        if record.phase == Phase::Teardown
            && record.verdict == Verdict::Failed
            && self.teardown_policy == TeardownPolicy::Attach
        {
            let attached = self
                .projects
                .get_mut(&record.project)
                .is_some_and(|project| project.attach(&record));
            if attached {
                return RecordDisposition::Attached;
            }
            debug!(
                "dropping teardown failure for {}: no earlier result for this step",
                record.step_id,
            );
            return RecordDisposition::Discarded;
        }

        trace!(
            "discarding {} ({}, {})",
            record.step_id, record.phase, record.verdict,
        );
        RecordDisposition::Discarded
    }

    /// Returns the number of projects with at least one scoring record.
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// Returns the total number of scoring records.
    pub fn record_count(&self) -> usize {
        self.projects.values().map(|p| p.records.len()).sum()
    }

    /// Iterates over projects and their records.
    pub fn projects(&self) -> impl Iterator<Item = (&ProjectKey, &ProjectRecords)> {
        self.projects.iter()
    }

    /// Consumes the collector, returning the records grouped by project.
    pub fn into_projects(self) -> IndexMap<ProjectKey, ProjectRecords> {
        self.projects
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use camino::Utf8PathBuf;

    pub(crate) fn project(name: &str) -> ProjectKey {
        ProjectKey::Marker {
            marker: Utf8PathBuf::from(format!("/work/{name}/impl/project")),
            dir: Utf8PathBuf::from(format!("/work/{name}")),
        }
    }

    pub(crate) fn summary(node_id: &str, phase: Phase, verdict: Verdict) -> OutcomeSummary {
        OutcomeSummary {
            node_id: node_id.to_owned(),
            location: None,
            phase,
            verdict,
            failure_detail: None,
            skip_reason: None,
            parameters: IndexMap::new(),
        }
    }

    pub(crate) fn record(
        project: &ProjectKey,
        node_id: &str,
        phase: Phase,
        verdict: Verdict,
    ) -> OutcomeRecord {
        OutcomeRecord::new(summary(node_id, phase, verdict), project.clone())
            .expect("valid node id")
    }

    pub(crate) fn failed(
        project: &ProjectKey,
        node_id: &str,
        phase: Phase,
        detail: &str,
    ) -> OutcomeRecord {
        let mut summary = summary(node_id, phase, Verdict::Failed);
        summary.failure_detail = Some(detail.to_owned());
        OutcomeRecord::new(summary, project.clone()).expect("valid node id")
    }
}
