//! Asset collaborator interface.
//!
//! The compiler never reads image bytes. It registers every path the
//! program uses with an [`AssetCollaborator`], then asks it to resolve and
//! validate each registered path, and reports every finding from every
//! asset together.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Outcome of validating one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReport {
    pub ok: bool,
    pub diagnostics: Vec<String>,
}

impl AssetReport {
    pub fn pass() -> Self {
        Self {
            ok: true,
            diagnostics: Vec::new(),
        }
    }

    /// A report that fails when any finding is present.
    pub fn from_findings(diagnostics: Vec<String>) -> Self {
        Self {
            ok: diagnostics.is_empty(),
            diagnostics,
        }
    }
}

/// One asset finding, tagged with the path as the program registered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDiagnostic {
    pub asset: String,
    pub message: String,
}

impl fmt::Display for AssetDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.asset, self.message)
    }
}

/// Resolves and checks asset files on behalf of the compiler.
pub trait AssetCollaborator {
    /// Turn a logical asset path into a concrete location, relative to
    /// `dir` when one is given.
    fn resolve_asset(&self, path: &str, dir: Option<&Path>) -> PathBuf;

    /// Check a resolved asset. All findings are returned together.
    fn validate_asset(&self, path: &Path) -> AssetReport;

    /// Record a logical path the program uses. Registering a path twice
    /// has no effect.
    fn register_asset(&mut self, path: &str);

    /// Registered logical paths, in registration order.
    fn asset_paths(&self) -> Vec<String>;
}

fn register(paths: &mut Vec<String>, path: &str) {
    if !paths.iter().any(|p| p == path) {
        paths.push(path.to_string());
    }
}

fn join(path: &str, dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.join(path),
        None => PathBuf::from(path),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// InMemoryAssets
// ══════════════════════════════════════════════════════════════════════════════

/// Accepts exactly the resolved paths it was given with [`provide`]. Used
/// by tests and by hosts that keep assets outside the filesystem.
///
/// [`provide`]: InMemoryAssets::provide
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    available: BTreeSet<PathBuf>,
    registered: Vec<String>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assets available at the given resolved paths.
    pub fn with<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut assets = Self::new();
        for path in paths {
            assets.provide(path);
        }
        assets
    }

    /// Make an asset available at a resolved path.
    pub fn provide(&mut self, path: impl Into<PathBuf>) {
        self.available.insert(path.into());
    }
}

impl AssetCollaborator for InMemoryAssets {
    fn resolve_asset(&self, path: &str, dir: Option<&Path>) -> PathBuf {
        join(path, dir)
    }

    fn validate_asset(&self, path: &Path) -> AssetReport {
        if self.available.contains(path) {
            AssetReport::pass()
        } else {
            AssetReport::from_findings(vec![format!("'{}' is not available", path.display())])
        }
    }

    fn register_asset(&mut self, path: &str) {
        register(&mut self.registered, path);
    }

    fn asset_paths(&self) -> Vec<String> {
        self.registered.clone()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// DirectoryAssets
// ══════════════════════════════════════════════════════════════════════════════

/// Checks assets on disk: the file exists, has a `.png` extension and is
/// not empty. Image contents are not parsed.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
    registered: Vec<String>,
}

impl DirectoryAssets {
    /// Paths without an explicit directory resolve against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registered: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetCollaborator for DirectoryAssets {
    fn resolve_asset(&self, path: &str, dir: Option<&Path>) -> PathBuf {
        join(path, Some(dir.unwrap_or(&self.root)))
    }

    fn validate_asset(&self, path: &Path) -> AssetReport {
        let mut findings = Vec::new();
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png {
            findings.push(format!("'{}' is not a .png file", path.display()));
        }
        match std::fs::metadata(path) {
            Ok(meta) if !meta.is_file() => {
                findings.push(format!("'{}' is not a file", path.display()));
            }
            Ok(meta) if meta.len() == 0 => {
                findings.push(format!("'{}' is empty", path.display()));
            }
            Ok(_) => {}
            Err(e) => findings.push(format!("'{}' cannot be read: {e}", path.display())),
        }
        AssetReport::from_findings(findings)
    }

    fn register_asset(&mut self, path: &str) {
        register(&mut self.registered, path);
    }

    fn asset_paths(&self) -> Vec<String> {
        self.registered.clone()
    }
}
