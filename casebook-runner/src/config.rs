// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for casebook.
//!
//! Configuration is read from, in increasing order of precedence:
//!
//! 1. the default configuration embedded in casebook (see `default-config.toml`)
//! 2. `.config/casebook.toml` under the session root, if it exists
//! 3. a configuration file passed in explicitly
//!
//! Command-line overrides are applied on top through [`ConfigOverrides`].

use crate::{
    chart::{ChartBuilder, Color, Palette},
    collector::TeardownPolicy,
    composer::LayoutMode,
    error_text::ErrorTextFormatter,
    errors::{ConfigParseError, ConfigParseErrorKind, InvalidOutputTemplate},
    metadata::ConfiguredMetadata,
    render::OutputFormat,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{
    DateTime, FixedOffset,
    format::{Item, StrftimeItems},
};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Write as _};
use tracing::warn;

/// Overall configuration for casebook.
#[derive(Clone, Debug, Serialize)]
pub struct CasebookConfig {
    session_root: Utf8PathBuf,
    #[serde(flatten)]
    inner: CasebookConfigDeserialize,
    #[serde(skip)]
    output: OutputTemplate,
}

impl CasebookConfig {
    /// The location of the config within the session root.
    pub const CONFIG_PATH: &'static str = ".config/casebook.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the configuration for a session rooted at `session_root`.
    ///
    /// `config_file` is layered on top of `.config/casebook.toml` in the session root, which is
    /// layered on top of the default config. Unknown keys are reported as warnings.
    pub fn from_sources(
        session_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(session_root, config_file, |config_file, unknown| {
            let mut unknown_str = String::new();
            if unknown.len() == 1 {
                // Print this on the same line.
                unknown_str.push(' ');
                unknown_str.push_str(unknown.iter().next().expect("one element"));
            } else {
                for ignored_key in unknown {
                    unknown_str.push_str("\n  - ");
                    unknown_str.push_str(ignored_key);
                }
            }

            warn!("ignoring unknown configuration keys in config file {config_file}:{unknown_str}")
        })
    }

    // A custom unknown_callback can be passed in while testing.
    fn from_sources_impl(
        session_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let session_root = session_root.into();
        let mut composite_builder = Self::make_default_config();

        let mut sources = vec![(
            session_root.join(Self::CONFIG_PATH),
            File::new(session_root.join(Self::CONFIG_PATH).as_str(), FileFormat::Toml)
                .required(false),
        )];
        if let Some(config_file) = config_file {
            sources.push((
                config_file.to_owned(),
                File::new(config_file.as_str(), FileFormat::Toml),
            ));
        }

        let mut last_file = Utf8PathBuf::from("<default config>");
        for (path, source) in sources {
            // Build each file on top of the defaults on its own first, so that errors and unknown
            // keys are attributed to the right file.
            let this_builder = Self::make_default_config().add_source(source.clone());
            let (this_config, unknown) = Self::build_and_deserialize_config(&this_builder)
                .map_err(|kind| ConfigParseError::new(&path, kind))?;
            if !unknown.is_empty() {
                unknown_callback(&path, &unknown);
            }
            this_config
                .validate()
                .map_err(|kind| ConfigParseError::new(&path, kind))?;

            composite_builder = composite_builder.add_source(source);
            last_file = path;
        }

        // Unknown keys have already been reported above.
        let (inner, _unknown) = Self::build_and_deserialize_config(&composite_builder)
            .map_err(|kind| ConfigParseError::new(&last_file, kind))?;
        let output = inner
            .validate()
            .map_err(|kind| ConfigParseError::new(&last_file, kind))?;

        Ok(Self {
            session_root,
            inner,
            output,
        })
    }

    /// Returns the default configuration for a session rooted at `session_root`.
    #[cfg(test)]
    pub(crate) fn default_config(session_root: impl Into<Utf8PathBuf>) -> Self {
        Self::from_sources_impl(session_root, None, |_, _| {})
            .expect("default config is always valid")
    }

    /// Applies command-line overrides.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(output) = overrides.output {
            self.inner.report.output = output.0.clone();
            self.output = output;
        }
        if let Some(layout) = overrides.layout {
            self.inner.report.layout = layout;
        }
        if let Some(format) = overrides.format {
            self.inner.report.format = format;
        }
    }

    /// Returns the session root.
    pub fn session_root(&self) -> &Utf8Path {
        &self.session_root
    }

    /// Returns the output path template.
    pub fn output(&self) -> &OutputTemplate {
        &self.output
    }

    /// Returns the layout mode.
    pub fn layout(&self) -> LayoutMode {
        self.inner.report.layout
    }

    /// Returns the output format.
    pub fn format(&self) -> OutputFormat {
        self.inner.report.format
    }

    /// Returns the project marker path.
    pub fn marker(&self) -> &Utf8Path {
        &self.inner.report.marker
    }

    /// Returns what to do with teardown failures.
    pub fn teardown_policy(&self) -> TeardownPolicy {
        self.inner.report.teardown_failures
    }

    /// Returns the page geometry.
    pub fn page(&self) -> PageConfig {
        self.inner.page
    }

    /// Returns a formatter for failure and skip text.
    pub fn error_text_formatter(&self) -> ErrorTextFormatter {
        let error_text = &self.inner.error_text;
        ErrorTextFormatter::new(
            error_text.max_length,
            error_text.ellipsis.clone(),
            error_text.strip_prefix.clone(),
        )
    }

    /// Returns a chart builder.
    pub fn chart_builder(&self) -> ChartBuilder {
        let chart = &self.inner.chart;
        let palette = Palette {
            passed: chart.passed.clone(),
            skipped: chart.skipped.clone(),
            failed: chart.failed.clone(),
        };
        ChartBuilder::new(palette, chart.popout)
    }

    /// Returns metadata configured for projects.
    pub fn metadata(&self) -> &ConfiguredMetadata {
        &self.inner.metadata
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(CasebookConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: CasebookConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error and the config crate both report the key. Drop it from the
                // config error for consistency.
                let path = error.path().clone();
                let config_error = error.into_inner();
                let error = match config_error {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// Values from the command line that take precedence over configuration files.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Overrides `report.output`.
    pub output: Option<OutputTemplate>,

    /// Overrides `report.layout`.
    pub layout: Option<LayoutMode>,

    /// Overrides `report.format`.
    pub format: Option<OutputFormat>,
}

/// An output path that may contain strftime placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputTemplate(Utf8PathBuf);

impl OutputTemplate {
    /// Validates a template.
    pub fn new(template: impl Into<Utf8PathBuf>) -> Result<Self, InvalidOutputTemplate> {
        let template = template.into();
        if StrftimeItems::new(template.as_str()).any(|item| matches!(item, Item::Error)) {
            return Err(InvalidOutputTemplate::new(template));
        }
        Ok(Self(template))
    }

    /// Returns the template as given.
    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    /// Replaces placeholders with `time`, resolving relative paths against `root`.
    pub fn expand(
        &self,
        root: &Utf8Path,
        time: &DateTime<FixedOffset>,
    ) -> Result<Utf8PathBuf, InvalidOutputTemplate> {
        let mut expanded = String::new();
        write!(expanded, "{}", time.format(self.0.as_str()))
            .map_err(|_| InvalidOutputTemplate::new(self.0.clone()))?;
        Ok(root.join(expanded))
    }
}

/// Page geometry for paginated output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageConfig {
    /// The page width, in columns.
    pub width: usize,

    /// The page height, in lines, including the footer.
    pub height: usize,
}

impl PageConfig {
    /// The smallest supported page height.
    pub const MIN_HEIGHT: usize = 12;

    /// The smallest supported page width.
    pub const MIN_WIDTH: usize = 40;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
struct CasebookConfigDeserialize {
    report: ReportSection,
    page: PageConfig,
    error_text: ErrorTextSection,
    chart: ChartSection,
    #[serde(default)]
    metadata: ConfiguredMetadata,
}

impl CasebookConfigDeserialize {
    fn validate(&self) -> Result<OutputTemplate, ConfigParseErrorKind> {
        let output = OutputTemplate::new(self.report.output.clone())?;
        if self.page.height < PageConfig::MIN_HEIGHT || self.page.width < PageConfig::MIN_WIDTH {
            return Err(ConfigParseErrorKind::PageTooSmall {
                width: self.page.width,
                height: self.page.height,
            });
        }
        if self.error_text.max_length <= self.error_text.ellipsis.chars().count() {
            return Err(ConfigParseErrorKind::ErrorTextTooShort {
                max_length: self.error_text.max_length,
                ellipsis: self.error_text.ellipsis.clone(),
            });
        }
        Ok(output)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ReportSection {
    output: Utf8PathBuf,
    layout: LayoutMode,
    format: OutputFormat,
    marker: Utf8PathBuf,
    teardown_failures: TeardownPolicy,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ErrorTextSection {
    max_length: usize,
    ellipsis: String,
    strip_prefix: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ChartSection {
    popout: u32,
    passed: Color,
    skipped: Color,
    failed: Color,
}
