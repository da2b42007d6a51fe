//! Compiler pipeline errors.

use cartridge_codegen::CodegenError;
use thiserror::Error;

use crate::asset::AssetDiagnostic;
use crate::validate::Diagnostic;

/// Errors returned by [`crate::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Scene-graph findings under [`crate::SceneGraphPolicy::Deny`].
    #[error("scene graph has {} problem(s): {}", .0.len(), join(.0))]
    SceneGraph(Vec<Diagnostic>),

    /// Every asset finding, reported together.
    #[error("{} asset problem(s): {}", .0.len(), join(.0))]
    Assets(Vec<AssetDiagnostic>),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("invalid compile options: {0}")]
    InvalidOptions(String),
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Compiler result type alias.
pub type CompileResult<T> = Result<T, CompileError>;
