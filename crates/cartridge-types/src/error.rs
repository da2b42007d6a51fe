use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Registry,
    Scope,
    Expression,
    Structure,
}

/// Numeric error code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Registry errors (E100–E199) ──
    pub const DUPLICATE_VARIABLE: Self = Self(100);
    pub const DUPLICATE_SYMBOL: Self = Self(101);
    pub const UNKNOWN_SYMBOL: Self = Self(102);
    pub const SLOT_EXHAUSTED: Self = Self(103);
    pub const INVALID_NAME: Self = Self(104);
    pub const UNSUPPORTED_SPRITE_SIZE: Self = Self(105);
    pub const INVALID_CAPACITY: Self = Self(106);
    pub const TILES_EXHAUSTED: Self = Self(107);
    pub const INVALID_ANIMATION: Self = Self(108);
    pub const MIXED_SPRITE_SIZES: Self = Self(109);

    // ── Scope errors (E200–E299) ──
    pub const SCOPE_MISMATCH: Self = Self(200);
    pub const NO_OPEN_SCOPE: Self = Self(201);

    // ── Expression errors (E300–E399) ──
    pub const ARITHMETIC: Self = Self(300);
    pub const UNSUPPORTED_OPERATOR: Self = Self(301);

    // ── Structure errors (E400–E499) ──
    pub const NO_SCENES: Self = Self(400);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Registry,
            200..=299 => ErrorCategory::Scope,
            300..=399 => ErrorCategory::Expression,
            _ => ErrorCategory::Structure,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Scope => write!(f, "scope"),
            Self::Expression => write!(f, "expression"),
            Self::Structure => write!(f, "structure"),
        }
    }
}

/// Errors raised by expression constructors, independent of any builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// Division or remainder by a literal zero.
    #[error("{op} by literal zero")]
    DivisionByZero { op: &'static str },

    /// Bitwise or shift operator applied to a signed operand.
    #[error("operator '{op}' requires unsigned operands, found {ty}")]
    SignedBitwise { op: &'static str, ty: crate::IntType },
}

/// What went wrong while recording a game description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildErrorKind {
    #[error("variable '{0}' is already registered")]
    DuplicateVariable(String),

    #[error("{kind} '{name}' is already registered")]
    DuplicateSymbol { kind: &'static str, name: String },

    #[error("unknown {kind} '{name}'")]
    UnknownSymbol { kind: &'static str, name: String },

    #[error("all {0} OAM slots are allocated")]
    SlotExhausted(usize),

    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),

    #[error("sprite '{name}' is {width}x{height}; only 8x8 and 8x16 are supported")]
    UnsupportedSpriteSize { name: String, width: u8, height: u8 },

    #[error("'{name}' has invalid capacity {capacity}")]
    InvalidCapacity { name: String, capacity: usize },

    #[error("sprite '{0}' does not fit in the 256 sprite tiles")]
    TilesExhausted(String),

    #[error("animation '{animation}' of sprite '{sprite}' is outside its frames or has zero speed")]
    InvalidAnimation { sprite: String, animation: String },

    #[error("sprite '{0}' mixes 8x8 and 8x16 sprites; the hardware uses one sprite size")]
    MixedSpriteSizes(String),

    #[error("scope closed out of order: expected depth {expected}, got {found}")]
    ScopeMismatch { expected: usize, found: usize },

    #[error("no statement scope is open")]
    NoOpenScope,

    #[error("arithmetic error: {0}")]
    Arithmetic(ExprError),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(ExprError),

    #[error("program has no scenes")]
    NoScenes,
}

impl BuildErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateVariable(_) => ErrorCode::DUPLICATE_VARIABLE,
            Self::DuplicateSymbol { .. } => ErrorCode::DUPLICATE_SYMBOL,
            Self::UnknownSymbol { .. } => ErrorCode::UNKNOWN_SYMBOL,
            Self::SlotExhausted(_) => ErrorCode::SLOT_EXHAUSTED,
            Self::InvalidName(_) => ErrorCode::INVALID_NAME,
            Self::UnsupportedSpriteSize { .. } => ErrorCode::UNSUPPORTED_SPRITE_SIZE,
            Self::InvalidCapacity { .. } => ErrorCode::INVALID_CAPACITY,
            Self::TilesExhausted(_) => ErrorCode::TILES_EXHAUSTED,
            Self::InvalidAnimation { .. } => ErrorCode::INVALID_ANIMATION,
            Self::MixedSpriteSizes(_) => ErrorCode::MIXED_SPRITE_SIZES,
            Self::ScopeMismatch { .. } => ErrorCode::SCOPE_MISMATCH,
            Self::NoOpenScope => ErrorCode::NO_OPEN_SCOPE,
            Self::Arithmetic(_) => ErrorCode::ARITHMETIC,
            Self::UnsupportedOperator(_) => ErrorCode::UNSUPPORTED_OPERATOR,
            Self::NoScenes => ErrorCode::NO_SCENES,
        }
    }
}

impl From<ExprError> for BuildErrorKind {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::DivisionByZero { .. } => Self::Arithmetic(err),
            ExprError::SignedBitwise { .. } => Self::UnsupportedOperator(err),
        }
    }
}

/// A construction-time error, with the builder call site when available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    pub kind: BuildErrorKind,
    pub location: Option<SourceLocation>,
}

impl BuildError {
    pub fn new(kind: BuildErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Attach a location unless one is already present.
    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        if self.location.is_none() {
            self.location = location;
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{loc}: ")?;
        }
        let code = self.code();
        write!(f, "{} [{}] {}", code, code.category(), self.kind)
    }
}

impl std::error::Error for BuildError {}

impl From<BuildErrorKind> for BuildError {
    fn from(kind: BuildErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<ExprError> for BuildError {
    fn from(err: ExprError) -> Self {
        Self::new(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_category() {
        assert_eq!(
            ErrorCode::DUPLICATE_VARIABLE.category(),
            ErrorCategory::Registry
        );
        assert_eq!(ErrorCode::SCOPE_MISMATCH.category(), ErrorCategory::Scope);
        assert_eq!(ErrorCode::ARITHMETIC.category(), ErrorCategory::Expression);
        assert_eq!(ErrorCode::NO_SCENES.category(), ErrorCategory::Structure);
    }

    #[test]
    fn expr_errors_map_to_kinds() {
        let div: BuildErrorKind = ExprError::DivisionByZero { op: "/" }.into();
        assert_eq!(div.code(), ErrorCode::ARITHMETIC);
        let bit: BuildErrorKind = ExprError::SignedBitwise {
            op: "&",
            ty: crate::IntType::I8,
        }
        .into();
        assert_eq!(bit.code(), ErrorCode::UNSUPPORTED_OPERATOR);
    }

    #[test]
    fn display_with_and_without_location() {
        let err = BuildError::new(BuildErrorKind::DuplicateVariable("score".into()));
        assert_eq!(
            format!("{err}"),
            "E100 [registry] variable 'score' is already registered"
        );
        let err = err.at(Some(SourceLocation::new("game.rs", 3, 9)));
        assert!(format!("{err}").starts_with("game.rs:3:9: E100"));
    }
}
