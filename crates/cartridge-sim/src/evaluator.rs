//! Core expression and statement evaluator.
//!
//! Mirrors the generated C exactly: same-width wrapping arithmetic, the
//! division and shift helpers' edge cases, index wrapping, `u8` entity
//! coordinates and strict AABB collision.

use cartridge_types::{
    Animation, BinOp, EntityField, EntityOp, EntityRef, Expr, IntType, Place, PoolOp, Program,
    SaveLayout, SaveOp, Stmt, Value,
};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::event::{EventLog, SimEvent};
use crate::geometry::Rect;
use crate::input::InputState;
use crate::store::VariableStore;

// ══════════════════════════════════════════════════════════════════════════════
// Runtime state
// ══════════════════════════════════════════════════════════════════════════════

/// Live state of one registered entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    pub name: String,
    pub x: u8,
    pub y: u8,
    pub visible: bool,
    pub frame: u8,
    /// Index into the program-wide animation table.
    pub animation: Option<usize>,
    pub anim_tick: u8,
}

/// One pool slot. Inactive slots keep their last position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub active: bool,
    pub visible: bool,
    pub x: u8,
    pub y: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub name: String,
    pub slots: Vec<SlotState>,
    pub count: u8,
}

/// Result of a spawn request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnOutcome {
    /// The slot that was activated.
    Spawned(u8),
    /// Every slot was active; nothing changed.
    Rejected,
}

/// The pool slot whose update is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub pool: usize,
    pub slot: usize,
}

/// One entry of the animation table, ordered by sprite then declaration.
#[derive(Debug, Clone, Copy)]
pub struct AnimEntry<'p> {
    pub sprite: &'p str,
    pub animation: &'p Animation,
}

// ══════════════════════════════════════════════════════════════════════════════
// Evaluator
// ══════════════════════════════════════════════════════════════════════════════

/// Walks statements and expressions against the simulated machine state.
pub struct Evaluator<'p> {
    pub program: &'p Program,
    pub vars: VariableStore,
    pub entities: Vec<EntityState>,
    pub pools: Vec<PoolState>,
    pub input: InputState,
    /// Scene requested by the most recent `go_to`.
    pub pending: Option<String>,
    pub anims: Vec<AnimEntry<'p>>,
    /// Save records with their byte offset into SRAM.
    pub saves: Vec<(usize, SaveLayout)>,
    pub sram: Vec<u8>,
    pub events: EventLog,
    pub frame: u32,
}

impl<'p> Evaluator<'p> {
    pub fn new(program: &'p Program, sram_size: usize, event_capacity: usize) -> SimResult<Self> {
        let entities = program
            .entities
            .iter()
            .map(|e| EntityState {
                name: e.name.clone(),
                x: e.x,
                y: e.y,
                visible: e.visible,
                frame: 0,
                animation: None,
                anim_tick: 0,
            })
            .collect();
        let pools = program
            .pools
            .iter()
            .map(|p| PoolState {
                name: p.name.clone(),
                slots: vec![SlotState::default(); p.capacity as usize],
                count: 0,
            })
            .collect();
        let anims = program
            .sprites
            .iter()
            .flat_map(|s| {
                s.animations.iter().map(move |a| AnimEntry {
                    sprite: &s.name,
                    animation: a,
                })
            })
            .collect();

        // Records sit back to back from the start of SRAM.
        let mut saves = Vec::with_capacity(program.save_records.len());
        let mut offset = 0;
        for record in &program.save_records {
            let layout = SaveLayout::new(program, record)?;
            let size = layout.size();
            saves.push((offset, layout));
            offset += size;
        }

        Ok(Self {
            program,
            vars: VariableStore::new(&program.variables),
            entities,
            pools,
            input: InputState::default(),
            pending: None,
            anims,
            saves,
            sram: vec![0; sram_size.max(offset)],
            events: EventLog::new(event_capacity),
            frame: 0,
        })
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    fn entity_index(&self, entity: &EntityRef) -> SimResult<usize> {
        match entity {
            EntityRef::Entity(id) if (id.0 as usize) < self.entities.len() => Ok(id.0 as usize),
            EntityRef::Entity(id) => Err(SimError::unresolved("entity", format!("#{}", id.0))),
            EntityRef::PoolSelf(pool) => Err(SimError::unresolved("pool slot", pool.clone())),
        }
    }

    pub fn pool_index(&self, name: &str) -> SimResult<usize> {
        self.program
            .pools
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| SimError::unresolved("pool", name))
    }

    /// The slot a `PoolSelf` reference names; only valid inside that pool's
    /// update.
    fn own_slot(&self, pool: &str, at: Option<SlotRef>) -> SimResult<SlotRef> {
        match at {
            Some(at) if self.program.pools[at.pool].name == pool => Ok(at),
            _ => Err(SimError::unresolved("pool slot", pool)),
        }
    }

    // ── Entity fields ─────────────────────────────────────────────────────

    fn read_field(&self, entity: &EntityRef, field: EntityField, at: Option<SlotRef>) -> SimResult<u8> {
        if let EntityRef::PoolSelf(pool) = entity {
            let at = self.own_slot(pool, at)?;
            let slot = &self.pools[at.pool].slots[at.slot];
            return Ok(match field {
                EntityField::X => slot.x,
                EntityField::Y => slot.y,
                EntityField::Visible => slot.visible as u8,
                EntityField::Frame => 0,
            });
        }
        let e = &self.entities[self.entity_index(entity)?];
        Ok(match field {
            EntityField::X => e.x,
            EntityField::Y => e.y,
            EntityField::Visible => e.visible as u8,
            EntityField::Frame => e.frame,
        })
    }

    fn write_field(
        &mut self,
        entity: &EntityRef,
        field: EntityField,
        value: u8,
        at: Option<SlotRef>,
    ) -> SimResult<()> {
        if let EntityRef::PoolSelf(pool) = entity {
            let at = self.own_slot(pool, at)?;
            let slot = &mut self.pools[at.pool].slots[at.slot];
            match field {
                EntityField::X => slot.x = value,
                EntityField::Y => slot.y = value,
                EntityField::Visible => slot.visible = value != 0,
                EntityField::Frame => {}
            }
            return Ok(());
        }
        let index = self.entity_index(entity)?;
        let e = &mut self.entities[index];
        match field {
            EntityField::X => e.x = value,
            EntityField::Y => e.y = value,
            EntityField::Visible => e.visible = value != 0,
            EntityField::Frame => e.frame = value,
        }
        Ok(())
    }

    /// World-space hitbox, or `None` when the target has no hitbox.
    fn rect(&self, entity: &EntityRef, at: Option<SlotRef>) -> SimResult<Option<Rect>> {
        let hitbox = match entity {
            EntityRef::Entity(_) => {
                let index = self.entity_index(entity)?;
                self.program.entity_hitbox(&self.program.entities[index])
            }
            EntityRef::PoolSelf(pool) => {
                let at = self.own_slot(pool, at)?;
                self.program.pool_hitbox(&self.program.pools[at.pool])
            }
        };
        let Some(hitbox) = hitbox else {
            return Ok(None);
        };
        let x = self.read_field(entity, EntityField::X, at)?;
        let y = self.read_field(entity, EntityField::Y, at)?;
        Ok(Some(Rect::from_hitbox(x, y, hitbox)))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expression evaluation
    // ══════════════════════════════════════════════════════════════════════

    pub fn eval(&self, expr: &Expr, at: Option<SlotRef>) -> SimResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(*v),
            Expr::Var(var) => {
                let value = self.vars.get(&var.name)?;
                Self::expect_type(&var.name, var.ty, value)
            }
            Expr::Index { array, index } => {
                let index = self.eval(index, at)?;
                let value = self.vars.get_index(&array.name, index)?;
                Self::expect_type(&array.name, array.ty, value)
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, at)?;
                match op {
                    BinOp::And if !l.is_truthy() => return Ok(Value::bool(false)),
                    BinOp::Or if l.is_truthy() => return Ok(Value::bool(true)),
                    _ => {}
                }
                let r = self.eval(right, at)?;
                Ok(Value::binary(*op, l, r))
            }
            Expr::Not(inner) => Ok(self.eval(inner, at)?.not()),
            Expr::Input { query, button } => Ok(Value::bool(self.input.query(*query, *button))),
            Expr::EntityField { entity, field } => {
                Ok(Value::u8(self.read_field(entity, *field, at)?))
            }
            Expr::Collides { a, b } => {
                let hit = match (self.rect(a, at)?, self.rect(b, at)?) {
                    (Some(a), Some(b)) => a.overlaps(&b),
                    _ => false,
                };
                Ok(Value::bool(hit))
            }
            Expr::PoolCollides { pool, entity } => {
                let p = self.pool_index(pool)?;
                let target = self.rect(entity, at)?;
                let hitbox = self.program.pool_hitbox(&self.program.pools[p]);
                let hit = match (hitbox, target) {
                    (Some(hitbox), Some(target)) => self.pools[p]
                        .slots
                        .iter()
                        .filter(|s| s.active)
                        .any(|s| Rect::from_hitbox(s.x, s.y, hitbox).overlaps(&target)),
                    _ => false,
                };
                Ok(Value::bool(hit))
            }
            Expr::PoolActive(pool) => {
                let p = self.pool_index(pool)?;
                Ok(Value::u8(self.pools[p].count))
            }
        }
    }

    fn expect_type(name: &str, ty: IntType, value: Value) -> SimResult<Value> {
        if value.ty == ty {
            Ok(value)
        } else {
            Err(SimError::TypeMismatch(format!(
                "'{name}' is {}, referenced as {ty}",
                value.ty
            )))
        }
    }

    /// Evaluate and convert to a `u8` coordinate.
    fn eval_u8(&self, expr: &Expr, at: Option<SlotRef>) -> SimResult<u8> {
        Ok(self.eval(expr, at)?.cast(IntType::U8).raw as u8)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statement execution
    // ══════════════════════════════════════════════════════════════════════

    pub fn exec_block(&mut self, block: &[Stmt], at: Option<SlotRef>) -> SimResult<()> {
        for stmt in block {
            self.exec(stmt, at)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt, at: Option<SlotRef>) -> SimResult<()> {
        match stmt {
            Stmt::Assign { target, value } => {
                let value = self.eval(value, at)?;
                self.write(target, value, at)
            }
            Stmt::CompoundAssign { target, op, value } => {
                let current = self.eval(&target.read(), at)?;
                let value = self.eval(value, at)?;
                self.write(target, Value::binary(*op, current, value), at)
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                if self.eval(condition, at)?.is_truthy() {
                    self.exec_block(then_body, at)
                } else {
                    self.exec_block(else_body, at)
                }
            }
            Stmt::GoTo(scene) => {
                if self.program.scene(scene).is_none() {
                    return Err(SimError::unresolved("scene", scene.clone()));
                }
                self.pending = Some(scene.clone());
                Ok(())
            }
            Stmt::Entity { target, op } => self.exec_entity(target, op, at),
            Stmt::Pool(PoolOp::Spawn { pool, x, y }) => {
                let p = self.pool_index(pool)?;
                let x = self.eval_u8(x, at)?;
                let y = self.eval_u8(y, at)?;
                self.spawn(p, x, y);
                Ok(())
            }
            Stmt::Pool(PoolOp::Clear(pool)) => {
                let p = self.pool_index(pool)?;
                let state = &mut self.pools[p];
                for slot in &mut state.slots {
                    slot.active = false;
                }
                state.count = 0;
                Ok(())
            }
            Stmt::Save(SaveOp::Store(record)) => self.store(record),
            Stmt::Save(SaveOp::Load(record)) => self.load(record),
        }
    }

    fn write(&mut self, place: &Place, value: Value, at: Option<SlotRef>) -> SimResult<()> {
        match place {
            Place::Var(var) => self.vars.set(&var.name, value),
            Place::Index { array, index } => {
                let index = self.eval(index, at)?;
                self.vars.set_index(&array.name, index, value)
            }
        }
    }

    fn exec_entity(&mut self, target: &EntityRef, op: &EntityOp, at: Option<SlotRef>) -> SimResult<()> {
        match op {
            EntityOp::SetX(x) => {
                let x = self.eval_u8(x, at)?;
                self.write_field(target, EntityField::X, x, at)
            }
            EntityOp::SetY(y) => {
                let y = self.eval_u8(y, at)?;
                self.write_field(target, EntityField::Y, y, at)
            }
            EntityOp::MoveBy { dx, dy } => {
                // x is written before dy is evaluated, as in the C output.
                for (field, delta) in [(EntityField::X, dx), (EntityField::Y, dy)] {
                    let delta = self.eval_u8(delta, at)?;
                    let current = self.read_field(target, field, at)?;
                    self.write_field(target, field, current.wrapping_add(delta), at)?;
                }
                Ok(())
            }
            EntityOp::Show => self.write_field(target, EntityField::Visible, 1, at),
            EntityOp::Hide => self.write_field(target, EntityField::Visible, 0, at),
            EntityOp::Play(name) => {
                let EntityRef::Entity(_) = target else {
                    return Err(SimError::Unsupported(format!(
                        "pool slots cannot play '{name}'"
                    )));
                };
                let index = self.entity_index(target)?;
                let sprite = self.program.entities[index]
                    .sprite
                    .as_deref()
                    .ok_or_else(|| SimError::unresolved("animation", name.clone()))?;
                let anim = self
                    .anims
                    .iter()
                    .position(|a| a.sprite == sprite && a.animation.name == *name)
                    .ok_or_else(|| SimError::unresolved("animation", name.clone()))?;
                let start = self.anims[anim].animation.start;
                let e = &mut self.entities[index];
                e.animation = Some(anim);
                e.frame = start;
                e.anim_tick = 0;
                Ok(())
            }
        }
    }

    // ── Pools ─────────────────────────────────────────────────────────────

    /// Activate the lowest free slot of pool `p`.
    pub fn spawn(&mut self, p: usize, x: u8, y: u8) -> SpawnOutcome {
        let state = &mut self.pools[p];
        match state.slots.iter().position(|s| !s.active) {
            Some(free) => {
                state.slots[free] = SlotState {
                    active: true,
                    visible: true,
                    x,
                    y,
                };
                state.count = state.count.wrapping_add(1);
                SpawnOutcome::Spawned(free as u8)
            }
            None => {
                tracing::debug!(pool = %state.name, frame = self.frame, "spawn rejected: pool full");
                let pool = state.name.clone();
                self.events.push(SimEvent::SpawnRejected {
                    frame: self.frame,
                    pool,
                });
                SpawnOutcome::Rejected
            }
        }
    }

    /// Run every active slot's update, then free it when a despawn
    /// predicate holds.
    pub fn update_pools(&mut self) -> SimResult<()> {
        let program = self.program;
        for (p, pool) in program.pools.iter().enumerate() {
            for slot in 0..pool.capacity as usize {
                if !self.pools[p].slots[slot].active {
                    continue;
                }
                let at = Some(SlotRef { pool: p, slot });
                self.exec_block(&pool.update, at)?;
                if !self.pools[p].slots[slot].active {
                    continue;
                }
                let mut despawn = false;
                for pred in &pool.despawn_when {
                    if self.eval(pred, at)?.is_truthy() {
                        despawn = true;
                        break;
                    }
                }
                if despawn {
                    let state = &mut self.pools[p];
                    state.slots[slot].active = false;
                    state.count = state.count.wrapping_sub(1);
                }
            }
        }
        Ok(())
    }

    // ── Animation ─────────────────────────────────────────────────────────

    /// Advance every playing animation by one tick.
    pub fn advance_animations(&mut self) {
        for e in &mut self.entities {
            let Some(anim) = e.animation else {
                continue;
            };
            let a = self.anims[anim].animation;
            e.anim_tick = e.anim_tick.wrapping_add(1);
            if e.anim_tick < a.speed {
                continue;
            }
            e.anim_tick = 0;
            e.frame = e.frame.wrapping_add(1);
            if e.frame as u16 >= a.start as u16 + a.length as u16 {
                e.frame = a.start;
            }
        }
    }

    // ── Save data ─────────────────────────────────────────────────────────

    fn save_slot(&self, record: &str) -> SimResult<usize> {
        self.saves
            .iter()
            .position(|(_, l)| l.record == record)
            .ok_or_else(|| SimError::unresolved("save record", record))
    }

    fn store(&mut self, record: &str) -> SimResult<()> {
        let index = self.save_slot(record)?;
        let (offset, layout) = &self.saves[index];
        let bytes = layout.pack(|name| self.vars.elements(name).map(<[Value]>::to_vec))?;
        let offset = *offset;
        self.sram[offset..offset + bytes.len()].copy_from_slice(&bytes);
        self.events.push(SimEvent::SaveStored {
            frame: self.frame,
            record: record.to_string(),
        });
        Ok(())
    }

    fn load(&mut self, record: &str) -> SimResult<()> {
        let index = self.save_slot(record)?;
        let (offset, layout) = &self.saves[index];
        let bytes = &self.sram[*offset..*offset + layout.size()];
        match layout.unpack(bytes) {
            Ok(fields) => {
                for (name, values) in &fields {
                    self.vars.replace(name, values)?;
                }
                self.events.push(SimEvent::SaveLoaded {
                    frame: self.frame,
                    record: record.to_string(),
                });
            }
            Err(err) => {
                tracing::debug!(record, %err, "load found no valid save data");
                self.events.push(SimEvent::LoadRejected {
                    frame: self.frame,
                    record: record.to_string(),
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }
}
