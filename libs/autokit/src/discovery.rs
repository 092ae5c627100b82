use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use walkdir::WalkDir;

use crate::context::ModuleLookup;
use crate::descriptor::{BootstrapRegistration, ModuleDescriptor, ModuleValue};

/// File-name suffixes that mark a file as an autoloadable module descriptor.
const AUTOLOAD_SUFFIXES: &[&str] = &[".auto.json", ".auto.yaml", ".auto.yml"];

/// Turns a descriptor file into an in-memory [`ModuleDescriptor`].
///
/// Injected into [`Discovery`] so tests can substitute an in-memory fake for
/// the filesystem-backed [`FsLoader`].
pub trait DescriptorLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<ModuleDescriptor, DiscoveryError>;
}

/// Scans an ordered set of root directories for autoloadable module
/// descriptor files.
///
/// Discovery has no resolution logic; its output is consumed exactly once,
/// when the context is constructed.
pub struct Discovery {
    dirs: Vec<PathBuf>,
    loader: Arc<dyn DescriptorLoader>,
}

impl Discovery {
    pub fn new(loader: Arc<dyn DescriptorLoader>) -> Self {
        Self {
            dirs: Vec::new(),
            loader,
        }
    }

    pub fn with_dirs<I, P>(dirs: I, loader: Arc<dyn DescriptorLoader>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut discovery = Self::new(loader);
        for dir in dirs {
            discovery.add_dir(dir);
        }
        discovery
    }

    /// Append a scan root. Empty paths and exact duplicates are dropped so
    /// no directory is scanned twice.
    pub fn add_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if dir.as_os_str().is_empty() || self.dirs.contains(&dir) {
            return;
        }
        self.dirs.push(dir);
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Recursively find and load every descriptor file under the scan roots.
    ///
    /// The result is a deterministic concatenation: roots in registration
    /// order, entries within a root in sorted walk order. A missing or
    /// unreadable root contributes zero descriptors; optional plugin
    /// directories must not fail the whole scan.
    pub fn discover(&self) -> Result<Vec<ModuleDescriptor>, DiscoveryError> {
        let mut descriptors = Vec::new();
        for dir in &self.dirs {
            if !dir.is_dir() {
                tracing::warn!(
                    dir = %dir.display(),
                    "autoload directory missing or unreadable; skipping"
                );
                continue;
            }
            for entry in WalkDir::new(dir).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(
                            dir = %dir.display(),
                            error = %e,
                            "skipping unreadable directory entry"
                        );
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !is_autoload_file(entry.path()) {
                    continue;
                }
                descriptors.push(self.loader.load(entry.path())?);
            }
        }
        Ok(descriptors)
    }
}

fn is_autoload_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    AUTOLOAD_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

type RegisteredBootstrap = fn(&dyn ModuleLookup) -> anyhow::Result<ModuleValue>;

/// Production loader: parses descriptor manifests from disk and resolves
/// their `bootstrap` field against the registered bootstrap table.
///
/// A manifest without a `bootstrap` field is its own exported value: the
/// whole parsed document, as a `serde_json::Value`.
pub struct FsLoader {
    bootstraps: HashMap<&'static str, RegisteredBootstrap>,
}

impl FsLoader {
    /// Seed the bootstrap table from `inventory` submissions.
    pub fn new() -> Self {
        let mut bootstraps = HashMap::new();
        for registration in inventory::iter::<BootstrapRegistration> {
            bootstraps.insert(registration.name, registration.run);
        }
        Self { bootstraps }
    }

    /// Register a bootstrap programmatically, shadowing any inventory
    /// submission under the same name.
    pub fn with_bootstrap(mut self, name: &'static str, run: RegisteredBootstrap) -> Self {
        self.bootstraps.insert(name, run);
        self
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed view of the recognized manifest fields. Extra fields are the
/// module's payload and stay in the raw document.
#[derive(serde::Deserialize)]
struct RawManifest {
    // An absent id defaults to empty so the context performs the
    // construction-time validation.
    #[serde(default)]
    id: String,
    #[serde(default)]
    bootstrap: Option<String>,
    #[serde(default)]
    lazy: bool,
}

impl DescriptorLoader for FsLoader {
    fn load(&self, path: &Path) -> Result<ModuleDescriptor, DiscoveryError> {
        let raw = fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let manifest: serde_json::Value = if is_json {
            serde_json::from_str(&raw).map_err(|e| DiscoveryError::Parse {
                path: path.to_path_buf(),
                source: e.into(),
            })?
        } else {
            serde_yaml::from_str(&raw).map_err(|e| DiscoveryError::Parse {
                path: path.to_path_buf(),
                source: e.into(),
            })?
        };

        let fields: RawManifest =
            serde_json::from_value(manifest.clone()).map_err(|e| DiscoveryError::Parse {
                path: path.to_path_buf(),
                source: e.into(),
            })?;

        let descriptor = match fields.bootstrap {
            Some(name) => {
                let Some(&run) = self.bootstraps.get(name.as_str()) else {
                    return Err(DiscoveryError::UnknownBootstrap {
                        path: path.to_path_buf(),
                        name,
                    });
                };
                let descriptor = ModuleDescriptor::with_bootstrap(fields.id, run);
                if fields.lazy {
                    descriptor.lazy()
                } else {
                    descriptor
                }
            }
            None => ModuleDescriptor::with_value(fields.id, Arc::new(manifest)),
        };
        Ok(descriptor)
    }
}

/// Structured errors for the discovery scan.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read module descriptor at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse module descriptor at {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("descriptor at {} references unknown bootstrap '{}'", path.display(), name)]
    UnknownBootstrap { path: PathBuf, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /* --------------------------- Test helpers ------------------------- */

    /// In-memory fake: every marker file becomes a static descriptor named
    /// after its file stem, without reading the file contents.
    struct FakeLoader;

    impl DescriptorLoader for FakeLoader {
        fn load(&self, path: &Path) -> Result<ModuleDescriptor, DiscoveryError> {
            let name = path.file_name().unwrap().to_string_lossy();
            let id = name.split('.').next().unwrap_or_default().to_string();
            Ok(ModuleDescriptor::with_value(id, Arc::new(())))
        }
    }

    fn touch(path: &Path) {
        fs::write(path, "{}").unwrap();
    }

    /* ------------------------------- Tests ---------------------------- */

    #[test]
    fn scans_marker_files_only() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.auto.json"));
        touch(&dir.path().join("b.auto.yaml"));
        touch(&dir.path().join("plain.json"));
        touch(&dir.path().join("c.auto.txt"));

        let discovery = Discovery::with_dirs([dir.path()], Arc::new(FakeLoader));
        let found = discovery.discover().unwrap();
        let ids: Vec<&str> = found.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn recurses_into_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deep")).unwrap();
        touch(&dir.path().join("nested/deep/mod.auto.json"));

        let discovery = Discovery::with_dirs([dir.path()], Arc::new(FakeLoader));
        assert_eq!(discovery.discover().unwrap().len(), 1);
    }

    #[test]
    fn missing_directory_contributes_nothing() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.auto.json"));

        let discovery = Discovery::with_dirs(
            [dir.path().to_path_buf(), PathBuf::from("/nonexistent/plugins")],
            Arc::new(FakeLoader),
        );
        assert_eq!(discovery.discover().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_and_empty_dir_entries_collapse() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.auto.json"));

        let mut discovery = Discovery::new(Arc::new(FakeLoader));
        discovery.add_dir(dir.path());
        discovery.add_dir(dir.path());
        discovery.add_dir("");

        assert_eq!(discovery.dirs().len(), 1);
        assert_eq!(discovery.discover().unwrap().len(), 1);
    }

    #[test]
    fn fs_loader_parses_static_json_manifest() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("settings.auto.json"),
            r#"{"id": "settings", "retries": 3}"#,
        )
        .unwrap();

        let discovery = Discovery::with_dirs([dir.path()], Arc::new(FsLoader::new()));
        let found = discovery.discover().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "settings");
        assert!(!found[0].needs_bootstrap());
    }

    #[test]
    fn fs_loader_parses_static_yaml_manifest() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("settings.auto.yaml"),
            "id: settings\nretries: 3\n",
        )
        .unwrap();

        let loader = FsLoader::new();
        let descriptor = loader
            .load(&dir.path().join("settings.auto.yaml"))
            .unwrap();
        assert_eq!(descriptor.id(), "settings");
        assert!(!descriptor.needs_bootstrap());
    }

    #[test]
    fn fs_loader_resolves_bootstrap_by_name() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("cache.auto.yaml"),
            "id: cache\nbootstrap: test::cache\nlazy: true\n",
        )
        .unwrap();

        let loader = FsLoader::new()
            .with_bootstrap("test::cache", |_ctx| Ok(Arc::new(1i64) as ModuleValue));
        let descriptor = loader.load(&dir.path().join("cache.auto.yaml")).unwrap();
        assert_eq!(descriptor.id(), "cache");
        assert!(descriptor.needs_bootstrap());
        assert!(descriptor.is_lazy());
    }

    #[test]
    fn unknown_bootstrap_name_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("cache.auto.json"),
            r#"{"id": "cache", "bootstrap": "nowhere::missing"}"#,
        )
        .unwrap();

        let loader = FsLoader::new();
        let err = loader
            .load(&dir.path().join("cache.auto.json"))
            .unwrap_err();
        match err {
            DiscoveryError::UnknownBootstrap { name, .. } => {
                assert_eq!(name, "nowhere::missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.auto.json"), "{ not json").unwrap();

        let discovery = Discovery::with_dirs([dir.path()], Arc::new(FsLoader::new()));
        let err = discovery.discover().unwrap_err();
        assert!(matches!(err, DiscoveryError::Parse { .. }));
    }

    #[test]
    fn manifest_without_id_loads_with_empty_id() {
        // The context, not the loader, rejects id-less modules.
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("anon.auto.json"), r#"{"retries": 3}"#).unwrap();

        let loader = FsLoader::new();
        let descriptor = loader.load(&dir.path().join("anon.auto.json")).unwrap();
        assert_eq!(descriptor.id(), "");
    }
}
