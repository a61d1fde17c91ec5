// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composing a [`ReportDocument`] from a [`ReportTree`].
//!
//! For each project the composer emits, in order: a title block, the case and step charts, a page
//! break, the result details (which depend on the [`LayoutMode`]), and an environment table.
//! Consecutive projects are separated by page breaks.
//!
//! The composer does not paginate. It only groups content that should stay on one page into
//! [`Block::KeepTogether`] units and marks table headers for repetition.

use crate::{
    UNDEFINED,
    chart::ChartBuilder,
    document::{Block, Cell, Chart, Column, HeadingLevel, ReportDocument, Row, Table},
    error_text::ErrorTextFormatter,
    metadata::{ProjectMetadata, flatten_context},
    tree::{CaseIx, ProjectIx, ReportTree, StepNode},
};
use casebook_metadata::{Phase, Verdict};
use chrono::{DateTime, FixedOffset};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How much detail to include for each project.
#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    /// One table per test case, listing every step.
    #[default]
    Full,

    /// An overview table of test cases, followed by tables listing only failed steps.
    Short,
}

/// The format used for the generation timestamp in title blocks.
pub const GENERATED_AT_FORMAT: &str = "%d %b %Y, %H:%M:%S";

const STEP_RESULTS_HEADING: &str = "Test Step Results";
const CASE_RESULTS_HEADING: &str = "Test Case Results";
const STEP_ERRORS_HEADING: &str = "Test Step Errors";
const ENVIRONMENT_HEADING: &str = "Environment Data";

/// Builds report documents.
#[derive(Clone, Debug)]
pub struct DocumentComposer {
    layout: LayoutMode,
    formatter: ErrorTextFormatter,
    charts: ChartBuilder,
    generated_at: DateTime<FixedOffset>,
}

impl DocumentComposer {
    /// Creates a new composer.
    pub fn new(
        layout: LayoutMode,
        formatter: ErrorTextFormatter,
        charts: ChartBuilder,
        generated_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            layout,
            formatter,
            charts,
            generated_at,
        }
    }

    /// Composes a document for every project in `tree`.
    ///
    /// `metadata` is indexed by project, in tree order. Projects without an entry use empty
    /// metadata.
    pub fn compose(&self, tree: &ReportTree, metadata: &[ProjectMetadata]) -> ReportDocument {
        let empty = ProjectMetadata::default();
        let mut document = ReportDocument::new();

        for (index, (project_ix, _)) in tree.projects().enumerate() {
            if index > 0 {
                document.push(Block::PageBreak);
            }
            let metadata = metadata.get(index).unwrap_or(&empty);
            self.compose_project(tree, project_ix, metadata, &mut document);
        }

        document
    }

    fn compose_project(
        &self,
        tree: &ReportTree,
        ix: ProjectIx,
        metadata: &ProjectMetadata,
        document: &mut ReportDocument,
    ) {
        let key = tree.project(ix).key();
        let name = metadata
            .name
            .as_deref()
            .or_else(|| key.default_name())
            .unwrap_or(UNDEFINED);
        document.push(self.title(name, metadata));

        let stats = tree.project_statistics(ix);
        document.push(Block::Charts {
            charts: vec![
                Chart {
                    caption: "Test Cases".to_owned(),
                    series: self.charts.build(stats.cases),
                },
                Chart {
                    caption: "Test Steps".to_owned(),
                    series: self.charts.build(stats.steps),
                },
            ],
        });
        document.push(Block::PageBreak);

        let cases = tree.project(ix).cases();
        match self.layout {
            LayoutMode::Full => {
                document.extend(self.step_units(tree, cases, STEP_RESULTS_HEADING, |_| true));
            }
            LayoutMode::Short => {
                document.push(Block::KeepTogether {
                    blocks: vec![
                        Block::heading(HeadingLevel::Section, CASE_RESULTS_HEADING),
                        Block::Table(self.case_overview_table(tree, cases)),
                    ],
                });
                let failed_units = self.step_units(tree, cases, STEP_ERRORS_HEADING, |step| {
                    step.record().verdict() == Verdict::Failed
                });
                if !failed_units.is_empty() {
                    document.push(Block::PageBreak);
                    document.extend(failed_units);
                }
            }
        }

        document.push(self.environment(metadata));
    }

    fn title(&self, name: &str, metadata: &ProjectMetadata) -> Block {
        let version = metadata.version.as_deref().unwrap_or(UNDEFINED);
        let environment = metadata
            .environment
            .as_deref()
            .map_or_else(|| UNDEFINED.to_owned(), str::to_uppercase);
        let tested_software = match &metadata.tested_software {
            Some(software) if !software.is_empty() => software
                .iter()
                .map(|software| format!("{} ({})", software.name, software.version))
                .join(", "),
            _ => UNDEFINED.to_owned(),
        };

        Block::Title {
            lines: vec![
                format!("{name} {version}"),
                "Test report".to_owned(),
                format!("Environment: {environment}"),
                format!("Tested software: {tested_software}"),
                format!(
                    "Generated on: {}",
                    self.generated_at.format(GENERATED_AT_FORMAT)
                ),
            ],
        }
    }

    /// Returns one keep-together unit per case with at least one step matching `filter`. Only
    /// the first unit carries the section heading.
    fn step_units(
        &self,
        tree: &ReportTree,
        cases: &[CaseIx],
        heading: &str,
        filter: impl Fn(&StepNode) -> bool,
    ) -> Vec<Block> {
        let mut units = Vec::new();
        for &case_ix in cases {
            let steps: Vec<_> = tree.case_steps(case_ix).filter(|step| filter(step)).collect();
            if steps.is_empty() {
                continue;
            }

            let mut blocks = Vec::with_capacity(3);
            if units.is_empty() {
                blocks.push(Block::heading(HeadingLevel::Section, heading));
            }
            blocks.push(Block::heading(
                HeadingLevel::Group,
                tree.case(case_ix).case_path(),
            ));
            blocks.push(Block::Table(self.step_table(&steps)));
            units.push(Block::KeepTogether { blocks });
        }
        units
    }

    fn step_table(&self, steps: &[&StepNode]) -> Table {
        let mut table = Table::new(
            vec![
                Column::left("Test Step Id", 36),
                Column::left("Parameter", 24),
                Column::center("Result", 10),
                Column::left("Error/Reason", 30),
            ],
            true,
        );

        let mut previous: Option<&str> = None;
        for step in steps {
            let record = step.record();
            let base_name = record.step_id().base_name();
            let step_cell = if previous == Some(base_name) {
                Cell::default()
            } else {
                Cell::text(base_name)
            };
            previous = Some(base_name);

            let parameters: Vec<String> = if record.parameters().is_empty() {
                record
                    .step_id()
                    .parameter_suffix()
                    .map(str::to_owned)
                    .into_iter()
                    .collect()
            } else {
                record
                    .parameters()
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect()
            };

            let verdict = record.verdict();
            let result_cell = Cell::text(verdict.as_str())
                .with_fill(self.charts.palette().color(verdict).clone());

            table.rows.push(Row {
                cells: vec![
                    step_cell,
                    Cell::lines(parameters),
                    result_cell,
                    Cell::lines(self.error_lines(step)),
                ],
            });
        }

        table
    }

    fn error_lines(&self, step: &StepNode) -> Vec<String> {
        let record = step.record();
        let primary = match record.verdict() {
            Verdict::Skipped => record
                .skip_reason()
                .and_then(|reason| self.formatter.skip_reason(reason)),
            Verdict::Failed => record
                .failure_detail()
                .and_then(|detail| self.formatter.failure(detail, phase_suffix(record.phase()))),
            Verdict::Passed => None,
        };

        primary
            .into_iter()
            .chain(step.attached().iter().filter_map(|text| {
                self.formatter
                    .failure(text, phase_suffix(Phase::Teardown))
            }))
            .collect()
    }

    fn case_overview_table(&self, tree: &ReportTree, cases: &[CaseIx]) -> Table {
        let mut table = Table::new(
            vec![
                Column::left("Script", 22),
                Column::left("Test Case Id", 48),
                Column::center("Passed", 10),
                Column::center("Skipped", 10),
                Column::center("Failed", 10),
            ],
            true,
        );

        for &case_ix in cases {
            let case = tree.case(case_ix);
            let (script, case_path) = (case.script_name(), case.case_path());
            let stats = tree.case_step_statistics(case_ix);
            table.rows.push(Row {
                cells: vec![
                    Cell::text(script),
                    Cell::text(case_path),
                    Cell::text(stats.passed.to_string()),
                    Cell::text(stats.skipped.to_string()),
                    Cell::text(stats.failed.to_string()),
                ],
            });
        }

        table
    }

    fn environment(&self, metadata: &ProjectMetadata) -> Block {
        let rows = flatten_context(&metadata.context);
        let body = if rows.is_empty() {
            Block::Paragraph {
                text: UNDEFINED.to_owned(),
            }
        } else {
            let mut table = Table::new(
                vec![Column::left("Data key", 40), Column::left("Value", 60)],
                true,
            );
            table.rows = rows
                .into_iter()
                .map(|(key, value)| Row {
                    cells: vec![Cell::text(key), Cell::text(value)],
                })
                .collect();
            Block::Table(table)
        };

        Block::KeepTogether {
            blocks: vec![
                Block::heading(HeadingLevel::Section, ENVIRONMENT_HEADING),
                body,
            ],
        }
    }
}

fn phase_suffix(phase: Phase) -> Option<&'static str> {
    match phase {
        Phase::Call => None,
        Phase::Setup | Phase::Teardown => Some(phase.as_str()),
    }
}
