//! Importer facade and the descriptor-file importer.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::descriptor::{DescriptorError, PackageDescriptor};
use crate::package::Package;

/// File suffix of exported package descriptors.
pub const DESCRIPTOR_SUFFIX: &str = ".types.json";

/// Name fragments of files produced by earlier generator runs. The
/// importer never reads these back.
const GENERATED_MARKERS: [&str; 2] = [".pb.", ".proteus."];

/// Loads a fully type-checked package for an import path.
///
/// Implementations must be shareable across the scanner's parallel
/// per-package tasks.
pub trait Importer: Send + Sync {
    fn import(&self, path: &str) -> Result<Arc<Package>, ImportError>;
}

/// Errors produced while locating or loading a package.
#[derive(Debug)]
pub enum ImportError {
    /// The `GOPATH` environment variable is not set.
    NoGoPathSet,
    NotADirectory(PathBuf),
    Io { path: PathBuf, source: io::Error },
    /// No descriptor file was found in the package directory.
    NoPackageSource(String),
    /// More than one package found in a directory.
    TooManyPackages(String),
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Descriptor {
        path: PathBuf,
        source: DescriptorError,
    },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::NoGoPathSet => {
                write!(f, "GOPATH environment variable is not set")
            }
            ImportError::NotADirectory(path) => {
                write!(f, "path is not directory: {}", path.display())
            }
            ImportError::Io { path, source } => {
                write!(f, "error reading {}: {}", path.display(), source)
            }
            ImportError::NoPackageSource(pkg) => {
                write!(f, "no package descriptor in path: {}", pkg)
            }
            ImportError::TooManyPackages(pkg) => {
                write!(f, "more than one package found in a directory: {}", pkg)
            }
            ImportError::Json { path, source } => {
                write!(f, "malformed descriptor {}: {}", path.display(), source)
            }
            ImportError::Descriptor { path, source } => {
                write!(f, "invalid descriptor {}: {}", path.display(), source)
            }
        }
    }
}

impl StdError for ImportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ImportError::Io { source, .. } => Some(source),
            ImportError::Json { source, .. } => Some(source),
            ImportError::Descriptor { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The workspace the host packages live in, rooted at `$GOPATH`.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Workspace { root: root.into() }
    }

    /// Read the root from the `GOPATH` environment variable.
    pub fn from_env() -> Result<Self, ImportError> {
        match std::env::var_os("GOPATH") {
            Some(root) if !root.is_empty() => Ok(Workspace::new(PathBuf::from(root))),
            _ => Err(ImportError::NoGoPathSet),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Directory holding the sources of an import path.
    pub fn package_dir(&self, import_path: &str) -> PathBuf {
        self.src_dir().join(import_path)
    }

    /// Validate that a package directory exists before the pipeline runs.
    pub fn check_package_dir(&self, import_path: &str) -> Result<(), ImportError> {
        let dir = self.package_dir(import_path);
        let meta = fs::metadata(&dir).map_err(|source| ImportError::Io {
            path: dir.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(ImportError::NotADirectory(dir));
        }
        Ok(())
    }
}

/// Importer reading `*.types.json` descriptors exported by the external
/// type-checker. Loaded packages are cached under a mutex; cache hits
/// share the same `Arc`.
pub struct DescriptorImporter {
    workspace: Workspace,
    cache: Mutex<HashMap<String, Arc<Package>>>,
}

impl DescriptorImporter {
    pub fn new(workspace: Workspace) -> Self {
        DescriptorImporter {
            workspace,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn descriptor_file(&self, import_path: &str) -> Result<PathBuf, ImportError> {
        let dir = self.workspace.package_dir(import_path);
        let entries = fs::read_dir(&dir).map_err(|source| ImportError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ImportError::Io {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(DESCRIPTOR_SUFFIX) && !is_generated_file(&name) {
                found.push(entry.path());
            }
        }

        match found.len() {
            0 => Err(ImportError::NoPackageSource(import_path.to_string())),
            1 => Ok(found.remove(0)),
            _ => Err(ImportError::TooManyPackages(import_path.to_string())),
        }
    }

    fn load(&self, import_path: &str) -> Result<Package, ImportError> {
        let file = self.descriptor_file(import_path)?;
        let data = fs::read_to_string(&file).map_err(|source| ImportError::Io {
            path: file.clone(),
            source,
        })?;
        let descriptor: PackageDescriptor =
            serde_json::from_str(&data).map_err(|source| ImportError::Json {
                path: file.clone(),
                source,
            })?;
        descriptor
            .into_package()
            .map_err(|source| ImportError::Descriptor { path: file, source })
    }
}

impl Importer for DescriptorImporter {
    fn import(&self, path: &str) -> Result<Arc<Package>, ImportError> {
        if let Some(pkg) = self.cache.lock().unwrap().get(path) {
            return Ok(Arc::clone(pkg));
        }

        // The lock is released while loading; a concurrent miss may load
        // the same package twice and the later insert wins.
        let pkg = Arc::new(self.load(path)?);
        self.cache
            .lock()
            .unwrap()
            .insert(path.to_string(), Arc::clone(&pkg));
        Ok(pkg)
    }
}

/// Whether a file name marks an artifact from a previous generator run.
fn is_generated_file(name: &str) -> bool {
    GENERATED_MARKERS.iter().any(|m| name.contains(m))
}
