// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The project → case → step hierarchy, stored as an arena.

use crate::{
    collector::{OutcomeRecord, ResultCollector},
    identity::script_name,
    resolver::ProjectKey,
    statistics::{ReportStatistics, Statistics, case_statistics, step_statistics},
};
use indexmap::IndexMap;

macro_rules! define_index {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            fn new(index: usize) -> Self {
                Self(index)
            }

            fn get(self) -> usize {
                self.0
            }
        }
    };
}

define_index!(ProjectIx, "An index to a project in a [`ReportTree`].");
define_index!(CaseIx, "An index to a test case in a [`ReportTree`].");
define_index!(StepIx, "An index to a test step in a [`ReportTree`].");

/// A project node.
#[derive(Clone, Debug)]
pub struct ProjectNode {
    key: ProjectKey,
    cases: Vec<CaseIx>,
}

impl ProjectNode {
    /// Returns the project key.
    pub fn key(&self) -> &ProjectKey {
        &self.key
    }

    /// Returns the cases in this project, in order of first appearance.
    pub fn cases(&self) -> &[CaseIx] {
        &self.cases
    }
}

/// A test case node: every step sharing a case path within a project.
#[derive(Clone, Debug)]
pub struct CaseNode {
    case_path: String,
    steps: Vec<StepIx>,
}

impl CaseNode {
    /// Returns the case path.
    pub fn case_path(&self) -> &str {
        &self.case_path
    }

    /// Returns the script name shown for this case.
    pub fn script_name(&self) -> &str {
        script_name(&self.case_path)
    }
}

/// A test step node.
#[derive(Clone, Debug)]
pub struct StepNode {
    record: OutcomeRecord,
    attached: Vec<String>,
}

impl StepNode {
    /// Returns the scoring record for this step.
    pub fn record(&self) -> &OutcomeRecord {
        &self.record
    }

    /// Returns supplementary teardown failure text for this step.
    pub fn attached(&self) -> &[String] {
        &self.attached
    }
}

/// The collected results, arranged as projects containing cases containing steps.
///
/// Built once after collection. Cases are grouped by case path in order of first appearance, so
/// steps of one case that arrived non-contiguously still form one group.
#[derive(Clone, Debug, Default)]
pub struct ReportTree {
    projects: Vec<ProjectNode>,
    cases: Vec<CaseNode>,
    steps: Vec<StepNode>,
}

impl ReportTree {
    /// Builds the tree from a collector.
    pub fn build(collector: ResultCollector) -> Self {
        let mut tree = Self::default();

        for (key, records) in collector.into_projects() {
            let (records, mut attached) = records.into_parts();

            let mut cases: IndexMap<String, CaseIx> = IndexMap::new();
            for (index, record) in records.into_iter().enumerate() {
                let case_ix = *cases
                    .entry(record.step_id().case_path().to_owned())
                    .or_insert_with_key(|case_path| {
                        let case_ix = CaseIx::new(tree.cases.len());
                        tree.cases.push(CaseNode {
                            case_path: case_path.clone(),
                            steps: Vec::new(),
                        });
                        case_ix
                    });

                let step_ix = StepIx::new(tree.steps.len());
                tree.steps.push(StepNode {
                    record,
                    attached: attached.remove(&index).unwrap_or_default(),
                });
                tree.cases[case_ix.get()].steps.push(step_ix);
            }

            tree.projects.push(ProjectNode {
                key,
                cases: cases.into_values().collect(),
            });
        }

        tree
    }

    /// Returns true if there are no projects.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Iterates over all projects in order.
    pub fn projects(&self) -> impl ExactSizeIterator<Item = (ProjectIx, &ProjectNode)> {
        self.projects
            .iter()
            .enumerate()
            .map(|(index, node)| (ProjectIx::new(index), node))
    }

    /// Returns a project node.
    pub fn project(&self, ix: ProjectIx) -> &ProjectNode {
        &self.projects[ix.get()]
    }

    /// Returns a case node.
    pub fn case(&self, ix: CaseIx) -> &CaseNode {
        &self.cases[ix.get()]
    }

    /// Returns a step node.
    pub fn step(&self, ix: StepIx) -> &StepNode {
        &self.steps[ix.get()]
    }

    /// Iterates over the steps of a case.
    pub fn case_steps(&self, ix: CaseIx) -> impl Iterator<Item = &StepNode> {
        self.case(ix).steps.iter().map(|&step| self.step(step))
    }

    /// Iterates over every step of a project, case by case.
    pub fn project_steps(&self, ix: ProjectIx) -> impl Iterator<Item = &StepNode> {
        self.project(ix)
            .cases
            .iter()
            .flat_map(|&case| self.case_steps(case))
    }

    /// Returns step statistics for a single case.
    pub fn case_step_statistics(&self, ix: CaseIx) -> Statistics {
        step_statistics(self.case_steps(ix).map(StepNode::record))
    }

    /// Returns case and step statistics for a project.
    pub fn project_statistics(&self, ix: ProjectIx) -> ReportStatistics {
        ReportStatistics {
            cases: case_statistics(self.project_steps(ix).map(StepNode::record)),
            steps: step_statistics(self.project_steps(ix).map(StepNode::record)),
        }
    }

    /// Returns case and step statistics summed over all projects, plus one rolled-up verdict per
    /// project.
    pub fn overall_statistics(&self) -> (ReportStatistics, Statistics) {
        let mut overall = ReportStatistics::default();
        let mut projects = Statistics::default();
        for (ix, _) in self.projects() {
            let stats = self.project_statistics(ix);
            projects.increment(stats.rollup());
            overall += stats;
        }
        (overall, projects)
    }
}
