//! Codegen error types.

use thiserror::Error;

/// Errors that can occur while generating C source.
///
/// The generator trusts the builder's validation; these only arise from a
/// structurally broken [`cartridge_types::Program`], usually one assembled by
/// hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// A reference to something the program does not contain.
    #[error("unresolved {kind} '{name}' in {context}")]
    UnresolvedSymbol {
        context: String,
        kind: &'static str,
        name: String,
    },

    /// The program's start scene is not one of its scenes.
    #[error("start scene '{0}' does not exist")]
    MissingStartScene(String),

    /// The program has no scenes at all.
    #[error("program '{0}' has no scenes")]
    EmptyProgram(String),

    /// A construct the target cannot express in this position.
    #[error("unsupported construct in {context}: {detail}")]
    Unsupported { context: String, detail: String },
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
