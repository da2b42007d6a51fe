//! Cartridge C code generator: lowers a finished [`cartridge_types::Program`]
//! to a single GBDK-compatible C translation unit.
//!
//! # Architecture
//!
//! The generated file is self-contained apart from the tile data produced
//! by the asset pipeline (`extern const uint8_t <sprite>_tiles[]`).
//!
//! ## Layout
//! - prelude: input latches and the arithmetic helpers the program uses
//! - ids: `SCENE_*`, `ENT_*`, `ANIM_*`
//! - user globals, in registration order
//! - entity and pool state arrays
//! - pool helpers, sprite sync, save store/load
//! - `scene_<name>_<hook>` functions, one per scene and hook
//! - hook dispatch and `main`
//!
//! ## Tick
//! `main` latches the joypad, runs the current scene's frame function
//! (which ends with pool updates and the sprite sync), then performs any
//! pending scene transition before waiting for vblank.
//!
//! ## Arithmetic
//! Fixed-width C types with explicit casts. Division and remainder go
//! through helpers that return 0 for a zero divisor; shifts go through
//! helpers that return 0 past the operand width. See [`runtime`].

pub mod compiler;
pub mod error;
pub mod expr;
pub mod names;
pub mod runtime;
pub mod source_map;
pub mod stmt;
pub mod writer;

pub use compiler::{compile, compile_with_source_map, save_layouts};
pub use error::{CodegenError, CodegenResult};
pub use source_map::{SourceMap, SourceMapEntry};
