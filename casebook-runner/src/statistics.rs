// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pass/skip/fail statistics and rollups.

use crate::collector::OutcomeRecord;
use casebook_metadata::Verdict;
use indexmap::IndexMap;
use serde::Serialize;
use std::ops::{Add, AddAssign};

/// Counts of passed, skipped and failed items.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Statistics {
    /// The number of passed items.
    pub passed: usize,

    /// The number of skipped items.
    pub skipped: usize,

    /// The number of failed items.
    pub failed: usize,
}

impl Statistics {
    /// Creates a new `Statistics`.
    pub fn new(passed: usize, skipped: usize, failed: usize) -> Self {
        Self {
            passed,
            skipped,
            failed,
        }
    }

    /// Counts verdicts.
    pub fn from_verdicts(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        let mut stats = Self::default();
        for verdict in verdicts {
            stats.increment(verdict);
        }
        stats
    }

    /// Returns the total number of items counted.
    pub fn total(&self) -> usize {
        self.passed + self.skipped + self.failed
    }

    /// Returns the count for a verdict.
    pub fn get(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::Passed => self.passed,
            Verdict::Skipped => self.skipped,
            Verdict::Failed => self.failed,
        }
    }

    /// Increments the count for a verdict.
    pub fn increment(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Passed => self.passed += 1,
            Verdict::Skipped => self.skipped += 1,
            Verdict::Failed => self.failed += 1,
        }
    }

    /// Rolls these statistics up into a single verdict for the group they describe.
    ///
    /// Failed takes precedence over passed, which takes precedence over skipped. A group with
    /// nothing in it is skipped.
    pub fn rollup(&self) -> Verdict {
        if self.failed > 0 {
            Verdict::Failed
        } else if self.passed > 0 {
            Verdict::Passed
        } else {
            Verdict::Skipped
        }
    }
}

impl AddAssign for Statistics {
    fn add_assign(&mut self, rhs: Self) {
        self.passed += rhs.passed;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

impl Add for Statistics {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl std::iter::Sum for Statistics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Counts the scoring records in `records` by verdict. Non-scoring records are ignored.
pub fn step_statistics<'a>(records: impl IntoIterator<Item = &'a OutcomeRecord>) -> Statistics {
    Statistics::from_verdicts(
        records
            .into_iter()
            .filter(|record| record.is_scoring())
            .map(|record| record.verdict()),
    )
}

/// Groups `records` by case path and counts one rolled-up verdict per case.
pub fn case_statistics<'a>(records: impl IntoIterator<Item = &'a OutcomeRecord>) -> Statistics {
    let mut cases: IndexMap<&str, Statistics> = IndexMap::new();
    for record in records {
        let stats = cases.entry(record.step_id().case_path()).or_default();
        if record.is_scoring() {
            stats.increment(record.verdict());
        }
    }
    Statistics::from_verdicts(cases.values().map(Statistics::rollup))
}

/// Statistics for a project or a whole report, at both step and case granularity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReportStatistics {
    /// Rolled-up verdicts per test case.
    pub cases: Statistics,

    /// Verdicts per test step.
    pub steps: Statistics,
}

impl ReportStatistics {
    /// Returns the rolled-up verdict for the group these statistics describe.
    pub fn rollup(&self) -> Verdict {
        self.cases.rollup()
    }
}

impl AddAssign for ReportStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.cases += rhs.cases;
        self.steps += rhs.steps;
    }
}
