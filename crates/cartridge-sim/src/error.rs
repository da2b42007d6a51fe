//! Runtime error types for the simulator.

use std::fmt;

use cartridge_types::SaveError;

/// Simulation error. Programs produced by the builder never raise these;
/// they arise from hand-assembled or edited IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A reference to a variable, entity, pool, scene or record that the
    /// program does not contain.
    UnresolvedSymbol { kind: &'static str, name: String },
    /// A variable read with the wrong shape (scalar vs array) or type.
    TypeMismatch(String),
    /// A construct the target cannot express, e.g. playing an animation on
    /// a pool slot.
    Unsupported(String),
    /// A save record whose layout cannot be built.
    Save(SaveError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedSymbol { kind, name } => write!(f, "unresolved {kind}: {name}"),
            Self::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Self::Save(err) => write!(f, "save error: {err}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<SaveError> for SimError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::UnknownField { field, .. } => Self::UnresolvedSymbol {
                kind: "variable",
                name: field,
            },
            other => Self::Save(other),
        }
    }
}

impl SimError {
    pub(crate) fn unresolved(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnresolvedSymbol {
            kind,
            name: name.into(),
        }
    }
}

/// Result alias for simulator operations.
pub type SimResult<T> = Result<T, SimError>;
