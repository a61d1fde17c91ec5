// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, StderrStyles, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use casebook_metadata::{CasebookExitCode, EventReader, OutcomeEvent};
use casebook_runner::{
    composer::LayoutMode,
    config::{CasebookConfig, ConfigOverrides, OutputTemplate},
    render::OutputFormat,
    session::{ReportSession, ReportSummary},
    statistics::Statistics,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::io::{self, BufRead, BufReader, Write};

/// Turns a stream of test outcomes into per-project test reports.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct CasebookApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl CasebookApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        match self.command {
            Command::Report(opts) => opts.exec(output),
            Command::ShowConfig(opts) => opts.exec(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read an outcome event stream and write a report
    Report(ReportOpts),

    /// Print the resolved configuration as JSON
    ShowConfig(ShowConfigOpts),
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: <session-root>/.config/casebook.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn load(&self, session_root: &Utf8Path) -> Result<CasebookConfig> {
        let config_file = self.config_file.as_deref().map(absolutize).transpose()?;
        CasebookConfig::from_sources(session_root, config_file.as_deref())
            .map_err(|err| ExpectedError::ConfigParseError { err })
    }
}

#[derive(Debug, Args)]
struct ReportOpts {
    /// JSON-lines outcome events to read, or `-` for standard input
    #[arg(long, short, value_name = "FILE", default_value = "-")]
    input: Utf8PathBuf,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    /// Output path, expanded with strftime escapes [default: from config]
    #[arg(long, short, value_name = "PATH")]
    output: Option<Utf8PathBuf>,

    /// Only list failed steps, after a per-case overview
    #[arg(long)]
    short: bool,

    /// Output format [default: from config]
    #[arg(long, value_enum, value_name = "FORMAT")]
    format: Option<FormatOpt>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatOpt {
    Text,
    Json,
}

impl From<FormatOpt> for OutputFormat {
    fn from(format: FormatOpt) -> Self {
        match format {
            FormatOpt::Text => OutputFormat::Text,
            FormatOpt::Json => OutputFormat::Json,
        }
    }
}

impl ReportOpts {
    fn exec(self, output: OutputContext) -> Result<i32> {
        let reader = self.open_input()?;
        let mut events = EventReader::new(reader).peekable();

        // The configuration lives under the session root, which the first event names.
        let session_root = match events.peek() {
            Some(Ok((_, OutcomeEvent::SessionStarted { root, .. }))) => root.clone(),
            _ => current_dir()?,
        };

        let mut config = self.config_opts.load(&session_root)?;
        config.apply_overrides(self.overrides()?);

        let mut session = ReportSession::new(&config, config.metadata());
        let summary = session
            .run(events)
            .map_err(|err| ExpectedError::ReportError { err })?;

        let styles = output.stdout_styles();
        print_summary(&summary, &styles, &mut io::stdout().lock())
            .map_err(|err| ExpectedError::WriteStdout { err })?;

        Ok(CasebookExitCode::OK)
    }

    fn open_input(&self) -> Result<Box<dyn BufRead>> {
        if self.input == "-" {
            return Ok(Box::new(io::stdin().lock()));
        }
        let file = fs_open(&self.input)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn overrides(&self) -> Result<ConfigOverrides> {
        let output = match &self.output {
            Some(output) => {
                let output = absolutize(output)?;
                Some(
                    OutputTemplate::new(output)
                        .map_err(|err| ExpectedError::InvalidOutputTemplate { err })?,
                )
            }
            None => None,
        };

        Ok(ConfigOverrides {
            output,
            layout: self.short.then_some(LayoutMode::Short),
            format: self.format.map(OutputFormat::from),
        })
    }
}

#[derive(Debug, Args)]
struct ShowConfigOpts {
    /// Session root to resolve configuration for [default: current directory]
    #[arg(long, value_name = "DIR")]
    root: Option<Utf8PathBuf>,

    #[clap(flatten)]
    config_opts: ConfigOpts,
}

impl ShowConfigOpts {
    fn exec(self) -> Result<i32> {
        let root = match &self.root {
            Some(root) => absolutize(root)?,
            None => current_dir()?,
        };
        let config = self.config_opts.load(&root)?;

        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &config)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(stdout))
            .map_err(|err| ExpectedError::WriteStdout { err })?;

        Ok(CasebookExitCode::OK)
    }
}

fn print_summary(
    summary: &ReportSummary,
    styles: &StderrStyles,
    writer: &mut dyn Write,
) -> io::Result<()> {
    write!(
        writer,
        "{} report for {} {} to {}",
        "Wrote".style(styles.bold),
        summary.project_count,
        plural(summary.project_count, "project", "projects"),
        summary.path.style(styles.bold),
    )?;
    if let Some(pages) = summary.pages {
        write!(writer, " ({pages} {})", plural(pages, "page", "pages"))?;
    }
    writeln!(writer)?;

    write_statistics(writer, "cases", &summary.statistics.cases, styles)?;
    write_statistics(writer, "steps", &summary.statistics.steps, styles)?;
    write_statistics(writer, "projects", &summary.projects, styles)
}

fn write_statistics(
    writer: &mut dyn Write,
    label: &str,
    stats: &Statistics,
    styles: &StderrStyles,
) -> io::Result<()> {
    writeln!(
        writer,
        "  {label:>8}: {} passed, {} skipped, {} failed",
        stats.passed.style(styles.passed),
        stats.skipped.style(styles.skipped),
        stats.failed.style(styles.failed),
    )
}

fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 { singular } else { plural }
}

fn fs_open(path: &Utf8Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|err| ExpectedError::InputOpenFailed {
        path: path.to_owned(),
        err,
    })
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 {
        path: err.into_path_buf(),
    })
}

fn absolutize(path: &Utf8Path) -> Result<Utf8PathBuf> {
    if path.is_absolute() {
        Ok(path.to_owned())
    } else {
        Ok(current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_runner::statistics::ReportStatistics;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_app() {
        CasebookApp::command().debug_assert();
    }

    #[test]
    fn parse_report_args() {
        let app = CasebookApp::try_parse_from([
            "casebook",
            "--color",
            "never",
            "report",
            "--input",
            "events.jsonl",
            "--short",
            "--format",
            "json",
        ])
        .expect("arguments are valid");

        let Command::Report(opts) = app.command else {
            panic!("expected report command");
        };
        assert_eq!(opts.input, "events.jsonl");
        assert!(opts.short);
        assert_eq!(opts.format, Some(FormatOpt::Json));

        let overrides = opts.overrides().expect("no output override");
        assert_eq!(overrides.output, None);
        assert_eq!(overrides.layout, Some(LayoutMode::Short));
        assert_eq!(overrides.format, Some(OutputFormat::Json));
    }

    #[test]
    fn invalid_output_override() {
        let app =
            CasebookApp::try_parse_from(["casebook", "report", "--output", "/tmp/report-%Q.txt"])
                .expect("arguments are valid");
        let Command::Report(opts) = app.command else {
            panic!("expected report command");
        };
        let err = opts.overrides().expect_err("template is invalid");
        assert_eq!(err.process_exit_code(), CasebookExitCode::SETUP_ERROR);
    }

    #[test]
    fn summary_output() {
        let summary = ReportSummary {
            path: "/work/reports/run.txt".into(),
            project_count: 1,
            projects: Statistics::new(0, 0, 1),
            statistics: ReportStatistics {
                cases: Statistics::new(1, 0, 1),
                steps: Statistics::new(3, 1, 2),
            },
            pages: Some(2),
        };

        let mut buf = Vec::new();
        print_summary(&summary, &StderrStyles::default(), &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Wrote report for 1 project to /work/reports/run.txt (2 pages)\n\
             \x20    cases: 1 passed, 0 skipped, 1 failed\n\
             \x20    steps: 3 passed, 1 skipped, 2 failed\n\
             \x20 projects: 0 passed, 0 skipped, 1 failed\n"
        );
    }
}
