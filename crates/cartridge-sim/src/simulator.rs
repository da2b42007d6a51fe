//! Simulator — frame-stepping execution of a [`Program`] on the host.
//!
//! One [`Simulator::step`] is one hardware frame:
//! 1. Latch input
//! 2. Run the current scene's frame block
//! 3. Update pools (update statements, then despawn predicates)
//! 4. Advance animations
//! 5. Apply a pending scene transition (exit, switch, enter)

use std::collections::BTreeMap;

use cartridge_types::{Expr, Hook, Program, Value};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::evaluator::{EntityState, Evaluator, PoolState, SlotState, SpawnOutcome};
use crate::event::SimEvent;
use crate::input::{Buttons, InputState};

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Bytes of battery-backed RAM; grown when save records need more.
    pub sram_size: usize,
    /// Maximum number of retained events.
    pub event_log_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sram_size: 0x2000,
            event_log_capacity: 256,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Snapshot
// ══════════════════════════════════════════════════════════════════════════════

/// Observable state after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub frame: u32,
    pub scene: String,
    pub variables: BTreeMap<String, Vec<Value>>,
    pub entities: Vec<EntitySnapshot>,
    pub pools: Vec<PoolSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub name: String,
    pub x: u8,
    pub y: u8,
    pub visible: bool,
    pub frame: u8,
    /// `sprite.animation` of the playing animation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub animation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub name: String,
    pub active: u8,
    pub slots: Vec<SlotState>,
}

impl Snapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Simulator
// ══════════════════════════════════════════════════════════════════════════════

/// Runtime instance of a program.
pub struct Simulator<'p> {
    eval: Evaluator<'p>,
    /// Index of the current scene in `program.scenes`.
    scene: usize,
}

impl<'p> Simulator<'p> {
    /// Create a simulator and run the start scene's enter block.
    pub fn new(program: &'p Program) -> SimResult<Self> {
        Self::with_config(program, SimConfig::default())
    }

    pub fn with_config(program: &'p Program, config: SimConfig) -> SimResult<Self> {
        let scene = program
            .scene_index(&program.start_scene)
            .ok_or_else(|| SimError::unresolved("scene", program.start_scene.clone()))?;
        let eval = Evaluator::new(program, config.sram_size, config.event_log_capacity)?;
        let mut sim = Self { eval, scene };
        sim.run_hook(Hook::Enter)?;
        Ok(sim)
    }

    fn run_hook(&mut self, hook: Hook) -> SimResult<()> {
        let program = self.eval.program;
        self.eval.exec_block(program.scenes[self.scene].block(hook), None)
    }

    /// Advance one frame with `buttons` held.
    pub fn step(&mut self, buttons: Buttons) -> SimResult<()> {
        self.eval.input.latch(buttons);
        self.eval.frame += 1;
        self.run_hook(Hook::Frame)?;
        self.eval.update_pools()?;
        self.eval.advance_animations();
        self.apply_transition()
    }

    /// Step once per entry of `inputs`.
    pub fn run(&mut self, inputs: &[Buttons]) -> SimResult<()> {
        for buttons in inputs {
            self.step(*buttons)?;
        }
        Ok(())
    }

    /// Perform the pending transition, if any. A `go_to` issued by the exit
    /// or enter block stays pending until the end of the next frame.
    fn apply_transition(&mut self) -> SimResult<()> {
        let Some(next) = self.eval.pending.take() else {
            return Ok(());
        };
        let program = self.eval.program;
        let to = program
            .scene_index(&next)
            .ok_or_else(|| SimError::unresolved("scene", next.clone()))?;
        let from = program.scenes[self.scene].name.clone();
        tracing::debug!(frame = self.eval.frame, %from, to = %next, "scene transition");
        self.run_hook(Hook::Exit)?;
        self.scene = to;
        self.run_hook(Hook::Enter)?;
        self.eval.events.push(SimEvent::Transition {
            frame: self.eval.frame,
            from,
            to: next,
        });
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Direct operations
    // ══════════════════════════════════════════════════════════════════════

    /// Spawn into `pool` outside of any block, as a `spawn` statement would.
    pub fn spawn(&mut self, pool: &str, x: u8, y: u8) -> SimResult<SpawnOutcome> {
        let p = self.eval.pool_index(pool)?;
        Ok(self.eval.spawn(p, x, y))
    }

    /// Evaluate an expression against the current state. Pool-slot
    /// references are not available here.
    pub fn eval(&self, expr: &Expr) -> SimResult<Value> {
        self.eval.eval(expr, None)
    }

    // ══════════════════════════════════════════════════════════════════════
    // State access
    // ══════════════════════════════════════════════════════════════════════

    pub fn program(&self) -> &'p Program {
        self.eval.program
    }

    /// Frames stepped so far.
    pub fn frame(&self) -> u32 {
        self.eval.frame
    }

    pub fn scene(&self) -> &str {
        &self.eval.program.scenes[self.scene].name
    }

    /// Scene requested for the end of the current frame, if any.
    pub fn pending_scene(&self) -> Option<&str> {
        self.eval.pending.as_deref()
    }

    /// Current value of a scalar variable.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.eval.vars.get(name).ok()
    }

    /// Every element of a variable.
    pub fn elements(&self, name: &str) -> Option<&[Value]> {
        self.eval.vars.elements(name)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityState> {
        self.eval.entities.iter().find(|e| e.name == name)
    }

    pub fn pool(&self, name: &str) -> Option<&PoolState> {
        self.eval.pools.iter().find(|p| p.name == name)
    }

    pub fn input(&self) -> InputState {
        self.eval.input
    }

    pub fn events(&self) -> impl Iterator<Item = &SimEvent> {
        self.eval.events.iter()
    }

    /// Remove and return all retained events.
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        self.eval.events.drain()
    }

    /// Simulated cartridge RAM.
    pub fn sram(&self) -> &[u8] {
        &self.eval.sram
    }

    /// Overwrite cartridge RAM from a previous session; extra bytes are
    /// ignored.
    pub fn restore_sram(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.eval.sram.len());
        self.eval.sram[..n].copy_from_slice(&bytes[..n]);
    }

    pub fn snapshot(&self) -> Snapshot {
        let eval = &self.eval;
        let entities = eval
            .entities
            .iter()
            .map(|e| EntitySnapshot {
                name: e.name.clone(),
                x: e.x,
                y: e.y,
                visible: e.visible,
                frame: e.frame,
                animation: e.animation.map(|i| {
                    let a = &eval.anims[i];
                    format!("{}.{}", a.sprite, a.animation.name)
                }),
            })
            .collect();
        let pools = eval
            .pools
            .iter()
            .map(|p| PoolSnapshot {
                name: p.name.clone(),
                active: p.count,
                slots: p.slots.clone(),
            })
            .collect();
        Snapshot {
            frame: eval.frame,
            scene: self.scene().to_string(),
            variables: eval.vars.snapshot(),
            entities,
            pools,
        }
    }
}
