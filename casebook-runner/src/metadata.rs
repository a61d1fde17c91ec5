// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-project metadata shown in the title block and environment table.

use crate::resolver::ProjectKey;
use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Descriptive information about a project. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectMetadata {
    /// The display name of the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The release or version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The name of the environment the tests ran against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// The software under test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested_software: Option<Vec<TestedSoftware>>,

    /// Free-form context shown in the environment table. Nested tables are flattened into dotted
    /// keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ProjectMetadata {
    /// Layers `overlay` on top of `self`, field by field. Context maps are merged key by key.
    pub fn merge(mut self, overlay: ProjectMetadata) -> Self {
        self.name = overlay.name.or(self.name);
        self.version = overlay.version.or(self.version);
        self.environment = overlay.environment.or(self.environment);
        self.tested_software = overlay.tested_software.or(self.tested_software);
        self.context.extend(overlay.context);
        self
    }
}

/// A package under test, with its version.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestedSoftware {
    /// The package name.
    pub name: String,

    /// The package version.
    pub version: String,
}

/// Identifies a project to a [`MetadataProvider`].
#[derive(Clone, Debug)]
pub struct ProjectDescriptor<'a> {
    key: &'a ProjectKey,
    relative_dir: Option<Utf8PathBuf>,
}

impl<'a> ProjectDescriptor<'a> {
    /// Creates a descriptor for `key`, within a session rooted at `root`.
    pub fn new(key: &'a ProjectKey, root: &Utf8Path) -> Self {
        let relative_dir = key.dir().map(|dir| match dir.strip_prefix(root) {
            Ok(relative) => relative.to_owned(),
            Err(_) => dir.to_owned(),
        });
        Self { key, relative_dir }
    }

    /// Returns the project key.
    pub fn key(&self) -> &'a ProjectKey {
        self.key
    }

    /// Returns the directory the project marker was found under, if any.
    pub fn dir(&self) -> Option<&'a Utf8Path> {
        self.key.dir()
    }

    /// Returns the project directory relative to the session root, or the absolute directory if
    /// it lies outside the root.
    pub fn relative_dir(&self) -> Option<&Utf8Path> {
        self.relative_dir.as_deref()
    }
}

/// Supplies [`ProjectMetadata`] for projects.
///
/// Fetches for different projects may run concurrently.
pub trait MetadataProvider: Sync {
    /// Returns metadata for a project. Missing information is left as `None`.
    fn fetch(&self, project: &ProjectDescriptor<'_>) -> ProjectMetadata;
}

/// Fetches metadata for every project in parallel, returning results in the same order.
pub fn fetch_all(
    provider: &dyn MetadataProvider,
    projects: &[ProjectDescriptor<'_>],
) -> Vec<ProjectMetadata> {
    projects
        .par_iter()
        .map(|project| {
            let metadata = provider.fetch(project);
            debug!("fetched metadata for project {}", project.key());
            metadata
        })
        .collect()
}

/// Metadata read from the `[metadata]` section of the configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfiguredMetadata {
    /// Metadata applying to every project.
    #[serde(default)]
    pub default: ProjectMetadata,

    /// Per-project metadata, keyed by the project directory relative to the session root.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub projects: BTreeMap<String, ProjectMetadata>,
}

impl MetadataProvider for ConfiguredMetadata {
    fn fetch(&self, project: &ProjectDescriptor<'_>) -> ProjectMetadata {
        let specific = project
            .relative_dir()
            .and_then(|dir| self.projects.get(dir.as_str()));
        match specific {
            Some(specific) => self.default.clone().merge(specific.clone()),
            None => self.default.clone(),
        }
    }
}

/// Flattens a context map into `(dotted key, value)` rows, in key order.
pub fn flatten_context(context: &BTreeMap<String, serde_json::Value>) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    for (key, value) in context {
        flatten_value(key.clone(), value, &mut rows);
    }
    rows
}

fn flatten_value(prefix: String, value: &serde_json::Value, rows: &mut Vec<(String, String)>) {
    use serde_json::Value;

    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, value) in map {
                flatten_value(format!("{prefix}.{key}"), value, rows);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, value) in items.iter().enumerate() {
                flatten_value(format!("{prefix}.{index}"), value, rows);
            }
        }
        Value::Object(_) | Value::Array(_) | Value::Null => {
            rows.push((prefix, crate::UNDEFINED.to_owned()));
        }
        Value::String(s) => rows.push((prefix, s.clone())),
        Value::Bool(_) | Value::Number(_) => rows.push((prefix, value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn marker(dir: &str) -> ProjectKey {
        ProjectKey::Marker {
            marker: Utf8PathBuf::from(format!("{dir}/impl/project")),
            dir: dir.into(),
        }
    }

    fn configured() -> ConfiguredMetadata {
        serde_json::from_value(json!({
            "default": {
                "environment": "staging",
                "context": { "region": "eu-1", "browser": { "name": "firefox" } },
            },
            "projects": {
                "shop/checkout": {
                    "name": "Checkout",
                    "version": "2.1.0",
                    "tested-software": [{ "name": "cart-service", "version": "1.4" }],
                    "context": { "region": "us-2" },
                },
            },
        }))
        .expect("valid metadata")
    }

    #[test]
    fn configured_metadata_merges() {
        let provider = configured();
        let key = marker("/work/shop/checkout");
        let metadata = provider.fetch(&ProjectDescriptor::new(&key, Utf8Path::new("/work")));

        assert_eq!(metadata.name.as_deref(), Some("Checkout"));
        assert_eq!(metadata.version.as_deref(), Some("2.1.0"));
        assert_eq!(metadata.environment.as_deref(), Some("staging"));
        assert_eq!(
            flatten_context(&metadata.context),
            vec![
                ("browser.name".to_owned(), "firefox".to_owned()),
                ("region".to_owned(), "us-2".to_owned()),
            ]
        );
    }

    #[test]
    fn configured_metadata_falls_back_to_default() {
        let provider = configured();
        let other = marker("/work/shop/search");
        let descriptors = [
            ProjectDescriptor::new(&other, Utf8Path::new("/work")),
            ProjectDescriptor::new(&ProjectKey::Unresolved, Utf8Path::new("/work")),
        ];
        let fetched = fetch_all(&provider, &descriptors);
        assert_eq!(fetched, vec![provider.default.clone(), provider.default.clone()]);
    }

    #[test]
    fn descriptor_relative_dir() {
        let inside = marker("/work/a/b");
        let outside = marker("/elsewhere/c");
        let root = Utf8Path::new("/work");

        assert_eq!(
            ProjectDescriptor::new(&inside, root).relative_dir(),
            Some(Utf8Path::new("a/b"))
        );
        assert_eq!(
            ProjectDescriptor::new(&outside, root).relative_dir(),
            Some(Utf8Path::new("/elsewhere/c"))
        );
        assert_eq!(
            ProjectDescriptor::new(&ProjectKey::Unresolved, root).relative_dir(),
            None
        );
    }

    #[test]
    fn flatten_nested() {
        let context = serde_json::from_value(json!({
            "db": { "host": "localhost", "port": 5432, "replicas": ["r1", "r2"] },
            "debug": true,
            "empty": {},
            "missing": null,
        }))
        .expect("valid context");

        assert_eq!(
            flatten_context(&context),
            vec![
                ("db.host".to_owned(), "localhost".to_owned()),
                ("db.port".to_owned(), "5432".to_owned()),
                ("db.replicas.0".to_owned(), "r1".to_owned()),
                ("db.replicas.1".to_owned(), "r2".to_owned()),
                ("debug".to_owned(), "true".to_owned()),
                ("empty".to_owned(), "undefined".to_owned()),
                ("missing".to_owned(), "undefined".to_owned()),
            ]
        );
    }
}
