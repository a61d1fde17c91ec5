// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::EventReadError;
use camino::Utf8PathBuf;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{fmt, io::BufRead};

/// A single line of the outcome event stream.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutcomeEvent {
    /// The host runner started a session.
    #[serde(rename_all = "kebab-case")]
    SessionStarted {
        /// The absolute root directory of the session. Test locations are resolved relative to it.
        root: Utf8PathBuf,

        /// The time at which the session started. If absent, the time at which the event was read
        /// is used.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at: Option<DateTime<FixedOffset>>,
    },

    /// A verdict for one test step during one execution phase.
    Outcome(OutcomeSummary),

    /// The host runner finished the session. The report is generated at this point.
    SessionFinished,

    /// The session was aborted. Everything collected so far is discarded.
    #[serde(rename_all = "kebab-case")]
    SessionAborted {
        /// Why the session was aborted, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// The serialized form of one outcome: a verdict for one test step during one execution phase.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct OutcomeSummary {
    /// The step identifier, in the form `<case path>::<step name>`. The step name may carry a
    /// parameter suffix in square brackets.
    pub node_id: String,

    /// The location of the test on disk, relative to the session root or absolute.
    ///
    /// Defaults to the case path portion of `node_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Utf8PathBuf>,

    /// The execution phase this verdict belongs to.
    pub phase: Phase,

    /// The verdict.
    pub verdict: Verdict,

    /// Free-form failure text, usually a traceback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<String>,

    /// The reason a step was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Parameters the step was invoked with, in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, String>,
}

/// The execution phase of a test step.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Fixtures and preconditions are being established.
    Setup,

    /// The test body itself.
    Call,

    /// Fixtures are being torn down.
    Teardown,
}

impl Phase {
    /// Returns the string form of this phase, as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Call => "call",
            Phase::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict for a test step.
///
/// The declaration order (passed, skipped, failed) is the order used for statistics and charts.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// The step passed.
    Passed,

    /// The step was skipped.
    Skipped,

    /// The step failed.
    Failed,
}

impl Verdict {
    /// All verdicts, in display order.
    pub const ALL: [Verdict; 3] = [Verdict::Passed, Verdict::Skipped, Verdict::Failed];

    /// Returns the string form of this verdict, as it appears on the wire and in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Skipped => "skipped",
            Verdict::Failed => "failed",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads [`OutcomeEvent`]s from a JSON-lines source.
///
/// Blank lines are skipped. Each item carries the 1-based line number it was read from.
#[derive(Debug)]
pub struct EventReader<R> {
    reader: R,
    line_number: usize,
    buf: String,
}

impl<R: BufRead> EventReader<R> {
    /// Creates a new reader over the given source.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<(usize, OutcomeEvent), EventReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            self.line_number += 1;
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    return Some(Err(EventReadError::Io {
                        line: self.line_number,
                        err,
                    }));
                }
            }

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str(line)
                    .map(|event| (self.line_number, event))
                    .map_err(|err| EventReadError::Json {
                        line: self.line_number,
                        err,
                    }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn read_session() {
        let input = indoc! {r#"
            {"type":"session-started","root":"/work/suite","started-at":"2024-03-01T10:15:00+01:00"}

            {"type":"outcome","node-id":"checkout/test_cart.py::test_add[qty=1]","phase":"call","verdict":"passed","parameters":{"qty":"1","user":"alice"}}
            {"type":"outcome","node-id":"checkout/test_cart.py::test_remove","phase":"setup","verdict":"skipped","skip-reason":"no backend"}
            {"type":"session-finished"}
        "#};

        let events: Vec<_> = EventReader::new(input.as_bytes())
            .collect::<Result<_, _>>()
            .expect("input is valid");

        assert_eq!(events.len(), 4);
        assert_eq!(events[0].0, 1);
        // The blank line is skipped but still counted.
        assert_eq!(events[1].0, 3);

        match &events[1].1 {
            OutcomeEvent::Outcome(summary) => {
                assert_eq!(summary.node_id, "checkout/test_cart.py::test_add[qty=1]");
                assert_eq!(summary.phase, Phase::Call);
                assert_eq!(summary.verdict, Verdict::Passed);
                assert_eq!(
                    summary.parameters.keys().collect::<Vec<_>>(),
                    vec!["qty", "user"],
                    "parameter order is preserved"
                );
            }
            other => panic!("expected outcome, found {other:?}"),
        }
        match &events[2].1 {
            OutcomeEvent::Outcome(summary) => {
                assert_eq!(summary.skip_reason.as_deref(), Some("no backend"));
                assert!(summary.parameters.is_empty());
            }
            other => panic!("expected outcome, found {other:?}"),
        }
        assert_eq!(events[3].1, OutcomeEvent::SessionFinished);
    }

    #[test_case(r#"{"type":"outcome"}"#; "missing fields")]
    #[test_case(r#"{"type":"unknown-event"}"#; "unknown type")]
    #[test_case(r#"{"type":"outcome","node-id":"a::b","phase":"run","verdict":"passed"}"#; "bad phase")]
    #[test_case("not json"; "not json")]
    fn read_invalid_line(line: &str) {
        let input = format!("{{\"type\":\"session-finished\"}}\n{line}\n");
        let mut reader = EventReader::new(input.as_bytes());
        reader
            .next()
            .expect("first line present")
            .expect("first line is valid");
        let err = reader
            .next()
            .expect("second line present")
            .expect_err("second line is invalid");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn verdict_display_order() {
        let mut verdicts = vec![Verdict::Failed, Verdict::Passed, Verdict::Skipped];
        verdicts.sort();
        assert_eq!(verdicts, Verdict::ALL);
        assert_eq!(Verdict::Skipped.to_string(), "skipped");
        assert_eq!(Phase::Teardown.to_string(), "teardown");
    }
}
