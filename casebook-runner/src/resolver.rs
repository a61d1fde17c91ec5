// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping test locations to the projects they belong to.
//!
//! A project is identified by a marker directory (by default `impl/project`). Starting from the
//! directory containing a test, the resolver walks up towards the session root and picks the first
//! directory under which the marker exists.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::{debug, trace};

/// The default marker path, relative to a project directory.
pub const DEFAULT_MARKER: &str = "impl/project";

/// Identifies the project a test belongs to.
///
/// Every test whose project could not be found maps to the same [`ProjectKey::Unresolved`] value,
/// so that they are reported together.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProjectKey {
    /// A marker was found.
    Marker {
        /// The resolved location of the marker. This is the identity of the project.
        marker: Utf8PathBuf,

        /// The directory the marker was found under.
        dir: Utf8PathBuf,
    },

    /// No marker was found between the test location and the session root.
    Unresolved,
}

impl ProjectKey {
    /// Returns the directory the marker was found under, if any.
    pub fn dir(&self) -> Option<&Utf8Path> {
        match self {
            ProjectKey::Marker { dir, .. } => Some(dir),
            ProjectKey::Unresolved => None,
        }
    }

    /// Returns the default display name for this project: the name of the directory the marker
    /// was found under.
    pub fn default_name(&self) -> Option<&str> {
        self.dir().and_then(|dir| dir.file_name())
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectKey::Marker { marker, .. } => write!(f, "{marker}"),
            ProjectKey::Unresolved => write!(f, "(no project)"),
        }
    }
}

type ResolverCache = HashMap<(Utf8PathBuf, Utf8PathBuf), ProjectKey>;

/// Resolves test locations to [`ProjectKey`]s, memoizing results.
///
/// The cache is keyed by the exact `(root, location)` pair. It is only valid for the filesystem
/// state of a single run: call [`clear`](Self::clear) before reusing a resolver for another run.
/// The cache is guarded by a mutex, so a resolver may be shared across threads.
#[derive(Debug)]
pub struct ProjectResolver {
    marker: Utf8PathBuf,
    cache: Mutex<ResolverCache>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ProjectResolver {
    /// Creates a new resolver looking for the given marker path, relative to each candidate
    /// directory.
    pub fn new(marker: impl Into<Utf8PathBuf>) -> Self {
        Self {
            marker: marker.into(),
            cache: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Resolves the project for a test at `location`, within a session rooted at `root`.
    ///
    /// A relative `location` is interpreted relative to `root`. Never fails: if no marker is
    /// found, [`ProjectKey::Unresolved`] is returned.
    pub fn resolve(&self, root: &Utf8Path, location: &Utf8Path) -> ProjectKey {
        let cache_key = (root.to_owned(), location.to_owned());
        if let Some(key) = self.lock_cache().get(&cache_key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return key.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let walk = self.walk(root, location);
        debug!(
            "resolved `{location}` to project {} after {} {}",
            walk.key,
            walk.iterations,
            if walk.iterations == 1 {
                "directory"
            } else {
                "directories"
            },
        );

        // If another thread raced us, keep the first entry so all callers agree.
        self.lock_cache()
            .entry(cache_key)
            .or_insert(walk.key)
            .clone()
    }

    /// Discards all memoized results.
    pub fn clear(&self) {
        let mut cache = self.lock_cache();
        if !cache.is_empty() {
            debug!(
                "clearing project cache ({} entries, {} hits, {} misses)",
                cache.len(),
                self.hits.load(Ordering::Relaxed),
                self.misses.load(Ordering::Relaxed),
            );
        }
        cache.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Returns the number of cache hits and misses since the last [`clear`](Self::clear).
    pub fn cache_stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn lock_cache(&self) -> MutexGuard<'_, ResolverCache> {
        // Entries are inserted whole, so a poisoned cache is still consistent.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn walk(&self, root: &Utf8Path, location: &Utf8Path) -> Walk {
        let root = normalize(root);
        let location = normalize(&root.join(location));

        let mut iterations = 0;
        let mut current = location.parent();
        while let Some(dir) = current {
            // Directories outside the session root are never checked.
            if !dir.starts_with(&root) {
                break;
            }
            iterations += 1;

            let marker = dir.join(&self.marker);
            trace!("checking for marker at `{marker}`");
            if marker.is_dir() {
                let marker = marker.canonicalize_utf8().unwrap_or(marker);
                return Walk {
                    key: ProjectKey::Marker {
                        marker,
                        dir: dir.to_owned(),
                    },
                    iterations,
                };
            }

            if dir == root {
                break;
            }
            current = dir.parent();
        }

        Walk {
            key: ProjectKey::Unresolved,
            iterations,
        }
    }
}

/// Lexically resolves `.` and `..` components, without touching the filesystem.
fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let last = out.components().next_back();
                if matches!(last, Some(Utf8Component::Normal(_))) {
                    out.pop();
                } else if last.is_none() || last == Some(Utf8Component::ParentDir) {
                    // `..` above the root of a relative path is kept.
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

impl Default for ProjectResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

#[derive(Debug)]
struct Walk {
    key: ProjectKey,
    iterations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::{Utf8TempDir, tempdir};
    use pretty_assertions::assert_eq;

    fn make_dirs(root: &Utf8TempDir, dirs: &[&str]) {
        for dir in dirs {
            fs_err::create_dir_all(root.path().join(dir)).expect("created directory");
        }
    }

    #[test]
    fn marker_two_levels_up() {
        let root = tempdir().expect("created temp dir");
        make_dirs(&root, &["suite/billing/impl/project", "suite/billing/a/b/c"]);

        let resolver = ProjectResolver::default();
        // The test file lives four directories below the project directory.
        let walk = resolver.walk(root.path(), Utf8Path::new("suite/billing/a/b/c/test_x.py"));
        assert_eq!(walk.iterations, 4);
        assert_eq!(walk.key.dir(), Some(root.path().join("suite/billing").as_path()));

        let walk = resolver.walk(root.path(), Utf8Path::new("suite/billing/a/test_x.py"));
        assert_eq!(walk.iterations, 2, "found on the second iteration");
        assert_eq!(walk.key.default_name(), Some("billing"));
    }

    #[test]
    fn nearest_marker_wins() {
        let root = tempdir().expect("created temp dir");
        make_dirs(
            &root,
            &["outer/impl/project", "outer/inner/impl/project", "outer/inner/tests"],
        );

        let resolver = ProjectResolver::default();
        let key = resolver.resolve(root.path(), Utf8Path::new("outer/inner/tests/test_a.py"));
        assert_eq!(key.default_name(), Some("inner"));
        let key = resolver.resolve(root.path(), Utf8Path::new("outer/test_b.py"));
        assert_eq!(key.default_name(), Some("outer"));
    }

    #[test]
    fn marker_must_be_directory() {
        let root = tempdir().expect("created temp dir");
        make_dirs(&root, &["proj/impl", "proj/tests"]);
        fs_err::write(root.path().join("proj/impl/project"), "").expect("wrote file");

        let resolver = ProjectResolver::default();
        let key = resolver.resolve(root.path(), Utf8Path::new("proj/tests/test_a.py"));
        assert_eq!(key, ProjectKey::Unresolved);
    }

    #[test]
    fn walk_stops_at_root() {
        let outer = tempdir().expect("created temp dir");
        make_dirs(&outer, &["impl/project", "session/tests"]);
        let root = outer.path().join("session");

        let resolver = ProjectResolver::default();
        let walk = resolver.walk(&root, Utf8Path::new("tests/test_a.py"));
        assert_eq!(walk.key, ProjectKey::Unresolved, "marker above the root is ignored");
        assert_eq!(walk.iterations, 2, "root itself is checked");
    }

    #[test]
    fn parent_components_stay_inside_root() {
        let outer = tempdir().expect("created temp dir");
        make_dirs(
            &outer,
            &["impl/project", "other/tests", "session/proj/impl/project", "session/proj/tests"],
        );
        let root = outer.path().join("session");

        let resolver = ProjectResolver::default();
        let walk = resolver.walk(&root, Utf8Path::new("../other/tests/test_a.py"));
        assert_eq!(walk.key, ProjectKey::Unresolved, "marker above the root is ignored");
        assert_eq!(walk.iterations, 0, "nothing outside the root is checked");

        let walk = resolver.walk(&root, Utf8Path::new("proj/tests/../tests/./test_a.py"));
        assert_eq!(walk.key.dir(), Some(root.join("proj").as_path()));
        assert_eq!(walk.iterations, 2);
    }

    #[test]
    fn normalize_components() {
        assert_eq!(normalize(Utf8Path::new("/a/b/../c/./d")), "/a/c/d");
        assert_eq!(normalize(Utf8Path::new("/a/../../b")), "/b");
        assert_eq!(normalize(Utf8Path::new("a/../../b")), "../b");
    }

    #[test]
    fn marker_at_root() {
        let root = tempdir().expect("created temp dir");
        make_dirs(&root, &["impl/project", "tests"]);

        let resolver = ProjectResolver::default();
        let key = resolver.resolve(root.path(), Utf8Path::new("tests/test_a.py"));
        assert_eq!(key.dir(), Some(root.path()));
    }

    #[test]
    fn custom_marker() {
        let root = tempdir().expect("created temp dir");
        make_dirs(&root, &["svc/.casebook", "svc/tests"]);

        let resolver = ProjectResolver::new(".casebook");
        let key = resolver.resolve(root.path(), Utf8Path::new("svc/tests/test_a.py"));
        assert_eq!(key.default_name(), Some("svc"));
    }

    #[test]
    fn memoized_until_cleared() {
        let root = tempdir().expect("created temp dir");
        make_dirs(&root, &["proj/tests"]);
        let location = Utf8Path::new("proj/tests/test_a.py");

        let resolver = ProjectResolver::default();
        let first = resolver.resolve(root.path(), location);
        let second = resolver.resolve(root.path(), location);
        assert_eq!(first, ProjectKey::Unresolved);
        assert_eq!(first, second, "sentinel is stable");
        assert_eq!(resolver.cache_stats(), (1, 1));

        // The cache does not see filesystem changes within a run.
        make_dirs(&root, &["proj/impl/project"]);
        assert_eq!(resolver.resolve(root.path(), location), ProjectKey::Unresolved);

        // A new run starts from a clean slate.
        resolver.clear();
        assert_eq!(resolver.cache_stats(), (0, 0));
        let key = resolver.resolve(root.path(), location);
        assert_eq!(key.default_name(), Some("proj"));
    }

    #[test]
    fn absolute_location() {
        let root = tempdir().expect("created temp dir");
        make_dirs(&root, &["proj/impl/project", "proj/tests"]);

        let resolver = ProjectResolver::default();
        let relative = resolver.resolve(root.path(), Utf8Path::new("proj/tests/test_a.py"));
        let absolute = resolver.resolve(root.path(), &root.path().join("proj/tests/test_a.py"));
        assert_eq!(relative, absolute);
    }
}
