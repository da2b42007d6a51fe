//! Cartridge compiler: orchestrates the full compilation pipeline.
//!
//! ```text
//! build(...) → Program → Scene-graph check → Asset check → C Codegen → main.c
//! ```
//!
//! [`compile`] returns a [`Compilation`] or the first failing stage's
//! [`CompileError`]. [`compile_to_result`] folds either outcome into a
//! serializable [`CompileReport`] for hosts that want JSON.

pub mod asset;
pub mod error;
pub mod options;
pub mod validate;

use cartridge_codegen::SourceMap;
use cartridge_types::Program;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use asset::{AssetCollaborator, AssetDiagnostic, AssetReport, DirectoryAssets, InMemoryAssets};
pub use cartridge_builder::build;
pub use error::{CompileError, CompileResult};
pub use options::{CompileOptions, SceneGraphPolicy};
pub use validate::{check_scene_graph, Diagnostic};

/// Output of a successful compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compilation {
    /// Generated C translation unit.
    pub c_source: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_map: Option<SourceMap>,
    /// Lowercase hex SHA-256 of `c_source`.
    pub source_hash: String,
    /// Scene-graph findings under [`SceneGraphPolicy::Warn`].
    #[serde(default)]
    pub warnings: Vec<Diagnostic>,
}

/// Compile a program to C.
pub fn compile(
    program: &Program,
    options: &CompileOptions,
    assets: &mut dyn AssetCollaborator,
) -> CompileResult<Compilation> {
    // 1. Scene graph
    let warnings = match options.scene_graph {
        SceneGraphPolicy::Allow => Vec::new(),
        SceneGraphPolicy::Warn => {
            let found = check_scene_graph(program);
            for d in &found {
                tracing::warn!(program = %program.name, "{d}");
            }
            found
        }
        SceneGraphPolicy::Deny => {
            let found = check_scene_graph(program);
            if !found.is_empty() {
                return Err(CompileError::SceneGraph(found));
            }
            found
        }
    };

    // 2. Assets
    check_assets(program, options, assets)?;

    // 3. Codegen
    let (c_source, source_map) = cartridge_codegen::compile_with_source_map(program)?;

    // 4. Hash
    let source_hash = sha256_hex(c_source.as_bytes());
    tracing::debug!(
        program = %program.name,
        bytes = c_source.len(),
        warnings = warnings.len(),
        hash = %source_hash,
        "compiled"
    );

    Ok(Compilation {
        c_source,
        source_map: options.emit_source_map.then_some(source_map),
        source_hash,
        warnings,
    })
}

/// Register the program's assets, then validate everything the
/// collaborator has registered.
fn check_assets(
    program: &Program,
    options: &CompileOptions,
    assets: &mut dyn AssetCollaborator,
) -> CompileResult<()> {
    for asset in &program.assets {
        assets.register_asset(&asset.path);
    }
    let dir = options.asset_dir.as_deref();
    let mut findings = Vec::new();
    for path in assets.asset_paths() {
        let resolved = assets.resolve_asset(&path, dir);
        let report = assets.validate_asset(&resolved);
        tracing::debug!(asset = %path, ok = report.ok, "validated asset");
        if report.ok {
            continue;
        }
        if report.diagnostics.is_empty() {
            findings.push(AssetDiagnostic {
                asset: path.clone(),
                message: "rejected".into(),
            });
        }
        findings.extend(report.diagnostics.into_iter().map(|message| AssetDiagnostic {
            asset: path.clone(),
            message,
        }));
    }
    if findings.is_empty() {
        Ok(())
    } else {
        Err(CompileError::Assets(findings))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Serializable result
// ══════════════════════════════════════════════════════════════════════════════

/// Either outcome of [`compile`], in a form hosts can serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub c_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_hash: Option<String>,
    #[serde(default)]
    pub warnings: Vec<Diagnostic>,
    /// One message per problem; empty on success.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CompileReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Compile and fold the outcome into a [`CompileReport`].
pub fn compile_to_result(
    program: &Program,
    options: &CompileOptions,
    assets: &mut dyn AssetCollaborator,
) -> CompileReport {
    match compile(program, options, assets) {
        Ok(c) => CompileReport {
            success: true,
            c_source: Some(c.c_source),
            source_hash: Some(c.source_hash),
            warnings: c.warnings,
            errors: Vec::new(),
        },
        Err(err) => {
            let errors = match err {
                CompileError::SceneGraph(found) => found.iter().map(ToString::to_string).collect(),
                CompileError::Assets(found) => found.iter().map(ToString::to_string).collect(),
                other => vec![other.to_string()],
            };
            CompileReport {
                success: false,
                c_source: None,
                source_hash: None,
                warnings: Vec::new(),
                errors,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_of_abc() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
