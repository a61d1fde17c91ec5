// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives whole report sessions from JSON-lines fixtures.

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::{Utf8TempDir, tempdir};
use casebook_metadata::{EventReader, OutcomeEvent};
use casebook_runner::{
    composer::LayoutMode,
    config::{CasebookConfig, ConfigOverrides, OutputTemplate},
    errors::{RenderError, ReportError, WriteReportError},
    render::OutputFormat,
    session::{ReportSession, ReportSummary},
    statistics::Statistics,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

const CHECKOUT_SESSION: &str = include_str!("../fixtures/checkout-session.jsonl");

/// A session root with one project marker, under `shop/checkout`.
fn session_root(config: &str) -> Utf8TempDir {
    let root = tempdir().expect("created temp dir");
    fs_err::create_dir_all(root.path().join("shop/checkout/impl/project")).unwrap();
    fs_err::create_dir_all(root.path().join(".config")).unwrap();
    fs_err::write(root.path().join(CasebookConfig::CONFIG_PATH), config).unwrap();
    root
}

fn events(fixture: &str, root: &Utf8Path) -> String {
    fixture.replace("@ROOT@", root.as_str())
}

fn run(
    root: &Utf8Path,
    input: &str,
    overrides: ConfigOverrides,
) -> Result<ReportSummary, ReportError> {
    let mut config = CasebookConfig::from_sources(root, None).expect("config is valid");
    config.apply_overrides(overrides);
    let provider = config.metadata().clone();
    let mut session = ReportSession::new(&config, &provider);
    session.run(EventReader::new(input.as_bytes()))
}

const CONFIG: &str = indoc! {r#"
    [report]
    output = "reports/run-%Y%m%d.txt"

    [metadata.default]
    environment = "staging"

    [metadata.projects."shop/checkout"]
    name = "Checkout"
    version = "2.1"
    tested-software = [{ name = "cart-service", version = "1.4" }]

    [metadata.projects."shop/checkout".context]
    region = "eu-1"
    database = { engine = "postgres", version = "16" }
"#};

#[test]
fn full_report() {
    let root = session_root(CONFIG);
    let summary = run(
        root.path(),
        &events(CHECKOUT_SESSION, root.path()),
        ConfigOverrides::default(),
    )
    .expect("report generated");

    let expected_path: Utf8PathBuf = root.path().join("reports/run-20240309.txt");
    assert_eq!(summary.path, expected_path);
    assert_eq!(summary.project_count, 2);
    assert_eq!(summary.statistics.steps, Statistics::new(2, 1, 1));
    assert_eq!(summary.statistics.cases, Statistics::new(1, 1, 1));
    assert_eq!(summary.projects, Statistics::new(1, 0, 1));

    let pages = summary.pages.expect("text output is paginated");
    let report = fs_err::read_to_string(&expected_path).unwrap();
    assert_eq!(report.matches('\x0c').count(), pages - 1);
    assert!(report.contains(&format!("Page {pages}")));

    for expected in [
        "Checkout 2.1",
        "Environment: STAGING",
        "Tested software: cart-service (1.4)",
        "Test Step Results",
        "shop/checkout/tests/test_cart.py",
        "cart.total() == 2",
        "db connection",
        "(teardown)",
        "identity provider",
        "database.engine",
        "undefined undefined",
        "Environment Data",
    ] {
        assert!(report.contains(expected), "report contains `{expected}`");
    }
    assert!(!report.contains("FAILED assert"), "prefix is stripped");
}

#[test]
fn short_json_report() {
    let root = session_root(CONFIG);
    let output = root.path().join("out/report.json");
    let summary = run(
        root.path(),
        &events(CHECKOUT_SESSION, root.path()),
        ConfigOverrides {
            output: Some(OutputTemplate::new(output.clone()).unwrap()),
            layout: Some(LayoutMode::Short),
            format: Some(OutputFormat::Json),
        },
    )
    .expect("report generated");
    assert_eq!(summary.path, output);
    assert_eq!(summary.pages, None);

    let document: serde_json::Value =
        serde_json::from_str(&fs_err::read_to_string(&output).unwrap()).unwrap();
    let headings: Vec<&str> = document["blocks"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|block| match block["kind"].as_str() {
            Some("keep-together") => block["blocks"].as_array().unwrap().iter().collect(),
            _ => vec![block],
        })
        .filter(|block| block["kind"] == "heading" && block["level"] == "section")
        .map(|block| block["text"].as_str().unwrap())
        .collect();
    assert_eq!(
        headings,
        vec![
            "Test Case Results",
            "Test Step Errors",
            "Environment Data",
            "Test Case Results",
            "Environment Data",
        ]
    );
}

#[test]
fn malformed_identity_aborts() {
    let root = session_root(CONFIG);
    let input = format!(
        "{}\n{}\n{}\n",
        r#"{"type":"session-started","root":"@ROOT@"}"#,
        r#"{"type":"outcome","node-id":"shop/checkout/tests/test_cart.py","phase":"call","verdict":"passed"}"#,
        r#"{"type":"session-finished"}"#,
    );

    let error = run(
        root.path(),
        &events(&input, root.path()),
        ConfigOverrides::default(),
    )
    .expect_err("identifier is malformed");
    match error {
        ReportError::MalformedIdentity { line, error } => {
            assert_eq!(line, Some(2));
            assert_eq!(error.node_id(), "shop/checkout/tests/test_cart.py");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!root.path().join("reports").exists(), "nothing written");
}

#[test]
fn aborted_session_writes_nothing() {
    let root = session_root(CONFIG);
    let input = events(
        &CHECKOUT_SESSION.replace(
            r#"{"type":"session-finished"}"#,
            r#"{"type":"session-aborted","reason":"interrupted"}"#,
        ),
        root.path(),
    );

    let error = run(root.path(), &input, ConfigOverrides::default()).expect_err("aborted");
    assert!(
        matches!(&error, ReportError::Aborted { reason } if reason.as_deref() == Some("interrupted")),
        "unexpected error: {error}"
    );
    assert!(!root.path().join("reports").exists(), "nothing written");
}

#[test]
fn unfinished_session() {
    let root = session_root(CONFIG);
    let input = events(
        &CHECKOUT_SESSION.replace(r#"{"type":"session-finished"}"#, ""),
        root.path(),
    );
    let error = run(root.path(), &input, ConfigOverrides::default()).expect_err("unfinished");
    assert!(matches!(error, ReportError::SessionState(_)), "{error}");
}

#[test]
fn overflow_leaves_no_artifact() {
    let root = session_root(indoc! {r#"
        [report]
        output = "report.txt"

        [page]
        height = 12
    "#});

    // One parameter per line: more lines than fit on a page.
    let parameters: serde_json::Map<String, serde_json::Value> = (0..20)
        .map(|index| (format!("p{index}"), serde_json::Value::from(index.to_string())))
        .collect();
    let outcome = serde_json::json!({
        "type": "outcome",
        "node-id": "shop/checkout/tests/test_big.py::test_many",
        "phase": "call",
        "verdict": "passed",
        "parameters": parameters,
    });
    let input = [
        serde_json::json!({ "type": "session-started", "root": root.path() }),
        outcome,
        serde_json::json!({ "type": "session-finished" }),
    ]
    .iter()
    .map(|event| event.to_string())
    .collect::<Vec<_>>()
    .join("\n");

    let error = run(root.path(), &input, ConfigOverrides::default()).expect_err("overflow");
    match error {
        ReportError::Write(WriteReportError::Render {
            error: RenderError::Overflow { needed, .. },
            ..
        }) => assert!(needed > 10),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!root.path().join("report.txt").exists(), "no partial report");
}

#[test]
fn events_round_trip_through_reader() {
    let root = Utf8Path::new("/work");
    let parsed: Vec<_> = EventReader::new(events(CHECKOUT_SESSION, root).as_bytes())
        .map(|event| event.map(|(_, event)| event))
        .collect::<Result<_, _>>()
        .expect("fixture is valid");
    assert_eq!(parsed.len(), 12);
    assert!(matches!(
        &parsed[0],
        OutcomeEvent::SessionStarted { root, started_at: Some(_) } if root == "/work"
    ));
    assert_eq!(parsed.last(), Some(&OutcomeEvent::SessionFinished));
}
