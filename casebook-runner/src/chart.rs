// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chart series derived from statistics.

use crate::statistics::Statistics;
use casebook_metadata::Verdict;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A colour name or hex code, passed through to the renderer as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    /// Creates a new colour.
    pub fn new(color: impl Into<String>) -> Self {
        Self(color.into())
    }

    /// Returns the colour as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The colour assigned to each verdict.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Palette {
    /// The colour for passed items.
    pub passed: Color,

    /// The colour for skipped items.
    pub skipped: Color,

    /// The colour for failed items.
    pub failed: Color,
}

impl Palette {
    /// Returns the colour for a verdict.
    pub fn color(&self, verdict: Verdict) -> &Color {
        match verdict {
            Verdict::Passed => &self.passed,
            Verdict::Skipped => &self.skipped,
            Verdict::Failed => &self.failed,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            passed: Color::new("lightgreen"),
            skipped: Color::new("yellow"),
            failed: Color::new("orangered"),
        }
    }
}

/// One row of a chart: a slice and its legend entry, or the synthetic sum row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesEntry {
    /// The legend label.
    pub label: String,

    /// The slice colour. `None` for the sum row.
    pub color: Option<Color>,

    /// The number of items.
    pub count: usize,

    /// The share of the total, in percent, rounded to two decimal places.
    pub percent: f64,

    /// The offset by which this slice is pulled out of the chart, if it is emphasized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popout: Option<u32>,
}

/// Chart data for one statistics tuple: one slice per verdict followed by a sum row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartSeries {
    slices: Vec<SeriesEntry>,
    sum: SeriesEntry,
}

impl ChartSeries {
    /// The label of the synthetic sum row.
    pub const SUM_LABEL: &'static str = "Sum";

    /// Returns the slices, in the order passed, skipped, failed.
    pub fn slices(&self) -> &[SeriesEntry] {
        &self.slices
    }

    /// Returns the sum row.
    pub fn sum(&self) -> &SeriesEntry {
        &self.sum
    }

    /// Returns the total count.
    pub fn total(&self) -> usize {
        self.sum.count
    }

    /// Iterates over all legend rows: the slices followed by the sum row.
    pub fn legend(&self) -> impl Iterator<Item = &SeriesEntry> {
        self.slices.iter().chain(std::iter::once(&self.sum))
    }
}

/// Builds [`ChartSeries`] from statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartBuilder {
    palette: Palette,
    popout: u32,
}

impl ChartBuilder {
    /// The default offset for the emphasized failed slice.
    pub const DEFAULT_POPOUT: u32 = 5;

    /// Creates a new builder.
    pub fn new(palette: Palette, popout: u32) -> Self {
        Self { palette, popout }
    }

    /// Returns the palette.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Builds a series.
    ///
    /// The failed slice is always marked for pop-out, even if there are no failures.
    pub fn build(&self, stats: Statistics) -> ChartSeries {
        let total = stats.total();
        let slices = Verdict::ALL
            .into_iter()
            .map(|verdict| {
                let count = stats.get(verdict);
                SeriesEntry {
                    label: verdict.as_str().to_owned(),
                    color: Some(self.palette.color(verdict).clone()),
                    count,
                    percent: percent(count, total),
                    popout: (verdict == Verdict::Failed).then_some(self.popout),
                }
            })
            .collect();

        ChartSeries {
            slices,
            sum: SeriesEntry {
                label: ChartSeries::SUM_LABEL.to_owned(),
                color: None,
                count: total,
                percent: 100.0,
                popout: None,
            },
        }
    }
}

impl Default for ChartBuilder {
    fn default() -> Self {
        Self::new(Palette::default(), Self::DEFAULT_POPOUT)
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = 100.0 * count as f64 / total as f64;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test]
    fn build_series() {
        let series = ChartBuilder::default().build(Statistics::new(1, 1, 1));

        let rows: Vec<_> = series
            .legend()
            .map(|entry| (entry.label.as_str(), entry.count, entry.percent, entry.popout))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("passed", 1, 33.33, None),
                ("skipped", 1, 33.33, None),
                ("failed", 1, 33.33, Some(5)),
                ("Sum", 3, 100.0, None),
            ]
        );
        assert_eq!(series.sum().color, None);
    }

    #[test]
    fn palette_and_popout() {
        let palette = Palette {
            passed: Color::new("#00ff00"),
            skipped: Color::new("#ffff00"),
            failed: Color::new("#ff0000"),
        };
        let series = ChartBuilder::new(palette, 8).build(Statistics::new(4, 0, 0));

        let colors: Vec<_> = series
            .slices()
            .iter()
            .map(|entry| entry.color.as_ref().map(Color::as_str))
            .collect();
        assert_eq!(colors, vec![Some("#00ff00"), Some("#ffff00"), Some("#ff0000")]);
        assert_eq!(series.slices()[2].popout, Some(8));
        assert_eq!(series.slices()[0].percent, 100.0);
    }

    #[test]
    fn zero_total() {
        let series = ChartBuilder::default().build(Statistics::default());
        assert!(series.slices().iter().all(|entry| entry.percent == 0.0));
        assert_eq!(series.sum().count, 0);
        assert_eq!(series.sum().percent, 100.0);
    }

    #[test_case(1, 3, 33.33)]
    #[test_case(2, 3, 66.67)]
    #[test_case(1, 8, 12.5)]
    #[test_case(0, 5, 0.0)]
    fn rounding(count: usize, total: usize, expected: f64) {
        assert_eq!(percent(count, total), expected);
    }

    #[proptest(cases = 256)]
    fn percentages_sum_to_hundred(
        #[strategy(0usize..10_000)] passed: usize,
        #[strategy(0usize..10_000)] skipped: usize,
        #[strategy(0usize..10_000)] failed: usize,
    ) {
        let stats = Statistics::new(passed, skipped, failed);
        let series = ChartBuilder::default().build(stats);
        let sum: f64 = series.slices().iter().map(|entry| entry.percent).sum();
        if stats.total() == 0 {
            assert_eq!(sum, 0.0);
        } else {
            assert!((sum - 100.0).abs() <= 0.02, "sum was {sum}");
        }
    }
}
