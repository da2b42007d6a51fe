//! Cartridge simulator: frame-stepping interpreter for the Program IR.
//!
//! Runs a [`cartridge_types::Program`] on the host with the same semantics
//! as the generated C, so game logic can be tested without building a ROM.
//! Deterministic: there is no wall clock, and identical input scripts give
//! identical snapshots.

pub mod error;
pub mod evaluator;
pub mod event;
pub mod geometry;
pub mod harness;
pub mod input;
pub mod simulator;
pub mod store;

pub use error::{SimError, SimResult};
pub use evaluator::{EntityState, PoolState, SlotState, SpawnOutcome};
pub use event::SimEvent;
pub use geometry::Rect;
pub use harness::{run_scenarios, Check, RunSummary, Scenario, ScenarioFailure, ScenarioResult};
pub use input::{Buttons, InputState};
pub use simulator::{EntitySnapshot, PoolSnapshot, SimConfig, Simulator, Snapshot};
