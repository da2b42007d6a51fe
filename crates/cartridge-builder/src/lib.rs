//! Cartridge builder: records a game description into a [`Program`].
//!
//! # Architecture
//!
//! A recording session is a [`GameBuilder`] value. Registrations
//! (variables, sprites, entities, pools, scenes, save records) return typed
//! handles; statement blocks are recorded by closures that receive a
//! [`Block`] and push statements into the innermost open scope of the
//! [`recorder::StatementRecorder`].
//!
//! ```text
//! build("demo", |g| {
//!     let score = g.u8_var("score", 0)?;
//!     g.scene("main", |s| {
//!         s.on_frame(|b| b.when(Expr::pressed(Button::A), |b| b.add_assign(&score, 10u8)))
//!     })?;
//!     Ok(())
//! })
//! ```
//!
//! ## Errors
//!
//! The first error poisons the session: every builder method returns it to
//! the caller, and [`GameBuilder::finish`] returns it again instead of a
//! partial program.
//!
//! [`Program`]: cartridge_types::Program

mod builder;
mod handle;
pub mod recorder;
pub mod registry;

pub use builder::{build, Block, EntitySpec, GameBuilder, PoolBuilder, SceneBuilder, SpriteSpec};
pub use handle::{
    ArrayHandle, EntityHandle, PoolHandle, SaveHandle, SceneHandle, SpriteHandle, VarHandle,
};
