//! Shared types for Cartridge.
//!
//! This crate defines the value and expression model, statements, the
//! `Program` IR, the save-record byte layout, source locations and the
//! construction-time error types used across the builder and both backends.

mod error;
mod location;
pub mod expr;
pub mod program;
pub mod save;
pub mod stmt;
pub mod value;

pub use error::{BuildError, BuildErrorKind, ErrorCategory, ErrorCode, ExprError};
pub use expr::{Button, EntityField, EntityId, EntityRef, Expr, InputQuery, VarRef};
pub use location::{CallerLocation, LocationProvider, NoLocation, SourceLocation};
pub use program::{
    Animation, Asset, Entity, Hitbox, Hook, Pool, Program, SaveRecord, Scene, Sprite,
    SpriteSize, Storage, Variable, OAM_CAPACITY,
};
pub use save::{crc8, SaveError, SaveLayout, SAVE_MAGIC};
pub use stmt::{EntityOp, Place, PoolOp, SaveOp, Stmt};
pub use value::{BinOp, IntType, Value};

/// Result type used while recording a game description.
pub type BuildResult<T> = std::result::Result<T, BuildError>;
