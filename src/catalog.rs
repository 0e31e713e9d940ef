//! Test catalog resolution.
//!
//! A catalog maps (target identity, host platform) to the ordered list of
//! tests that apply. An empty list is a normal return for an unsupported
//! target, not an error; the orchestrator turns it into a fatal
//! configuration failure before any backend is constructed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::TargetIdentity;

/// A single test as the orchestrator sees it: a name plus backend-specific
/// metadata the core never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDescriptor {
    /// Test name, unique within a manifest
    pub name: String,
    /// Backend-specific metadata, passed through opaquely
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TestDescriptor {
    /// Create a descriptor with no extra metadata.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Resolves the tests applicable to a target on a host platform.
pub trait TestCatalog {
    /// Ordered list of applicable tests; empty when none are targeted.
    fn resolve(&self, target: &TargetIdentity, host_platform: &str) -> Vec<TestDescriptor>;
}

/// Errors raised while loading a test manifest.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest file was not valid JSON of the expected shape.
    #[error("failed to parse manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One manifest entry: a test plus the applicability lists the catalog
/// filters on before handing the bare descriptor to the orchestrator.
#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    name: String,
    /// Applications this test targets; empty means every application
    #[serde(default)]
    apps: Vec<String>,
    /// Host platforms this test targets; empty means every platform
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl ManifestEntry {
    fn applies_to(&self, target: &TargetIdentity, host_platform: &str) -> bool {
        let app_ok = self.apps.is_empty() || self.apps.iter().any(|a| a == &target.app);
        let platform_ok =
            self.platforms.is_empty() || self.platforms.iter().any(|p| p == host_platform);
        app_ok && platform_ok
    }

    fn into_descriptor(self) -> TestDescriptor {
        TestDescriptor {
            name: self.name,
            extra: self.extra,
        }
    }
}

/// Catalog backed by a JSON manifest file.
///
/// The manifest is a JSON array of test entries, each carrying `name` and
/// optional `apps`/`platforms` applicability lists; any other fields ride
/// along as opaque metadata.
#[derive(Debug)]
pub struct ManifestCatalog {
    entries: Vec<ManifestEntry>,
    /// When set, only the test with this exact name is resolved
    filter: Option<String>,
}

impl ManifestCatalog {
    /// Load a manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = serde_json::from_str(&data).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            entries,
            filter: None,
        })
    }

    /// Restrict resolution to a single named test.
    pub fn with_filter(mut self, name: Option<String>) -> Self {
        self.filter = name;
        self
    }
}

impl TestCatalog for ManifestCatalog {
    fn resolve(&self, target: &TargetIdentity, host_platform: &str) -> Vec<TestDescriptor> {
        self.entries
            .iter()
            .filter(|entry| entry.applies_to(target, host_platform))
            .filter(|entry| {
                self.filter
                    .as_ref()
                    .map(|name| &entry.name == name)
                    .unwrap_or(true)
            })
            .cloned()
            .map(ManifestEntry::into_descriptor)
            .collect()
    }
}

/// In-memory catalog for embedders and tests.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    tests: Vec<TestDescriptor>,
}

impl StaticCatalog {
    /// Create a catalog that resolves to the given tests for every target.
    pub fn new(tests: Vec<TestDescriptor>) -> Self {
        Self { tests }
    }
}

impl TestCatalog for StaticCatalog {
    fn resolve(&self, _target: &TargetIdentity, _host_platform: &str) -> Vec<TestDescriptor> {
        self.tests.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RunMode;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const MANIFEST: &str = r#"[
        {"name": "tp6-amazon", "apps": ["firefox", "chrome"], "platforms": ["linux", "mac"],
         "url": "https://amazon.example/", "page_cycles": 25},
        {"name": "tp6-wiki", "apps": ["firefox"], "platforms": ["linux"]},
        {"name": "speed-bench", "apps": ["fenix"], "platforms": ["android"]},
        {"name": "everywhere"}
    ]"#;

    fn write_manifest() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp manifest");
        file.write_all(MANIFEST.as_bytes()).expect("write manifest");
        file
    }

    fn target(app: &str) -> TargetIdentity {
        TargetIdentity::new(app, "/opt/browser/bin", RunMode::Extension)
    }

    #[test]
    fn test_resolve_filters_by_app_and_platform() {
        let file = write_manifest();
        let catalog = ManifestCatalog::load(file.path()).unwrap();

        let names: Vec<String> = catalog
            .resolve(&target("firefox"), "linux")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["tp6-amazon", "tp6-wiki", "everywhere"]);

        let names: Vec<String> = catalog
            .resolve(&target("chrome"), "mac")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["tp6-amazon", "everywhere"]);
    }

    #[test]
    fn test_resolve_unsupported_target_is_empty_except_catchall() {
        let file = write_manifest();
        let catalog = ManifestCatalog::load(file.path()).unwrap();
        let names: Vec<String> = catalog
            .resolve(&target("unknown-browser"), "win")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["everywhere"]);
    }

    #[test]
    fn test_resolve_single_test_filter() {
        let file = write_manifest();
        let catalog = ManifestCatalog::load(file.path())
            .unwrap()
            .with_filter(Some("tp6-wiki".to_string()));
        let resolved = catalog.resolve(&target("firefox"), "linux");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "tp6-wiki");
    }

    #[test]
    fn test_extra_metadata_is_preserved() {
        let file = write_manifest();
        let catalog = ManifestCatalog::load(file.path()).unwrap();
        let resolved = catalog.resolve(&target("firefox"), "linux");
        let amazon = resolved.iter().find(|t| t.name == "tp6-amazon").unwrap();
        assert_eq!(
            amazon.extra.get("url").and_then(|v| v.as_str()),
            Some("https://amazon.example/")
        );
        assert_eq!(
            amazon.extra.get("page_cycles").and_then(|v| v.as_u64()),
            Some(25)
        );
    }

    #[test]
    fn test_load_rejects_malformed_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        assert!(matches!(
            ManifestCatalog::load(file.path()),
            Err(CatalogError::Parse { .. })
        ));
    }
}
