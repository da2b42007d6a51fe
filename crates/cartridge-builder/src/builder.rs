//! The game description DSL.
//!
//! A [`GameBuilder`] is one recording session. Nested constructs receive the
//! builder (or a [`Block`] borrowing it) by `&mut`, so there is no ambient
//! "current builder": sessions on different threads are independent values.
//!
//! Every closure returns [`BuildResult`]. The first construction error
//! poisons the session, and [`GameBuilder::finish`] reports it instead of
//! producing a partial [`Program`].

use std::panic::Location;

use cartridge_types::{
    Animation, BinOp, BuildError, BuildErrorKind, BuildResult, CallerLocation, Entity,
    EntityId, EntityOp, EntityRef, Expr, Hitbox, IntType, LocationProvider, Place, Pool,
    PoolOp, Program, SaveOp, SaveRecord, Scene, SourceLocation, Sprite, SpriteSize, Stmt,
    Storage, Value, VarRef, Variable,
};

use crate::handle::{
    ArrayHandle, EntityHandle, PoolHandle, SaveHandle, SceneHandle, SpriteHandle, VarHandle,
};
use crate::recorder::StatementRecorder;
use crate::registry::{
    AssetRegistry, Catalog, EntityRegistry, SpriteRegistry, VariableRegistry,
};

// ══════════════════════════════════════════════════════════════════════════════
// Specs
// ══════════════════════════════════════════════════════════════════════════════

/// Sprite graphics description.
#[derive(Debug, Clone)]
pub struct SpriteSpec {
    name: String,
    asset: String,
    width: u8,
    height: u8,
    frames: u8,
    animations: Vec<Animation>,
}

impl SpriteSpec {
    pub fn new(name: impl Into<String>, asset: impl Into<String>, width: u8, height: u8) -> Self {
        Self {
            name: name.into(),
            asset: asset.into(),
            width,
            height,
            frames: 1,
            animations: Vec::new(),
        }
    }

    pub fn frames(mut self, frames: u8) -> Self {
        self.frames = frames;
        self
    }

    /// Add a named animation over `length` frames starting at `start`,
    /// advancing every `speed` ticks.
    pub fn animation(mut self, name: impl Into<String>, start: u8, length: u8, speed: u8) -> Self {
        self.animations.push(Animation {
            name: name.into(),
            start,
            length,
            speed,
        });
        self
    }
}

/// Entity description.
#[derive(Debug, Clone)]
pub struct EntitySpec {
    name: String,
    x: u8,
    y: u8,
    visible: bool,
    sprite: Option<String>,
    hitbox: Option<Hitbox>,
    tags: Vec<String>,
}

impl EntitySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: 0,
            y: 0,
            visible: true,
            sprite: None,
            hitbox: None,
            tags: Vec::new(),
        }
    }

    pub fn at(mut self, x: u8, y: u8) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn sprite(mut self, sprite: &SpriteHandle) -> Self {
        self.sprite = Some(sprite.name.clone());
        self
    }

    pub fn hitbox(mut self, hitbox: Hitbox) -> Self {
        self.hitbox = Some(hitbox);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// GameBuilder
// ══════════════════════════════════════════════════════════════════════════════

/// One recording session.
pub struct GameBuilder {
    name: String,
    recorder: StatementRecorder,
    variables: VariableRegistry,
    sprites: SpriteRegistry,
    entities: EntityRegistry,
    assets: AssetRegistry,
    pools: Catalog<Pool>,
    scenes: Catalog<Scene>,
    saves: Catalog<SaveRecord>,
    /// Pools whose definition closure is running.
    pending_pools: Vec<String>,
    start_scene: Option<(String, Option<SourceLocation>)>,
    locations: Box<dyn LocationProvider>,
    failure: Option<BuildError>,
}

impl GameBuilder {
    /// Start a session that reports builder call sites in diagnostics.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_locations(name, Box::new(CallerLocation))
    }

    /// Start a session with an explicit location capability.
    pub fn with_locations(name: impl Into<String>, locations: Box<dyn LocationProvider>) -> Self {
        Self {
            name: name.into(),
            recorder: StatementRecorder::new(),
            variables: VariableRegistry::default(),
            sprites: SpriteRegistry::default(),
            entities: EntityRegistry::default(),
            assets: AssetRegistry::default(),
            pools: Catalog::default(),
            scenes: Catalog::default(),
            saves: Catalog::default(),
            pending_pools: Vec::new(),
            start_scene: None,
            locations,
            failure: None,
        }
    }

    // ── Diagnostics ───────────────────────────────────────────────────────

    #[track_caller]
    fn locate(&self) -> Option<SourceLocation> {
        self.locations.locate(Location::caller())
    }

    fn fail(&mut self, err: BuildError) -> BuildError {
        if self.failure.is_none() {
            self.failure = Some(err.clone());
        }
        err
    }

    /// Convert a registry result, attaching the caller's location and
    /// poisoning the session on failure.
    #[track_caller]
    fn check<T>(&mut self, result: Result<T, BuildErrorKind>) -> BuildResult<T> {
        match result {
            Ok(v) => Ok(v),
            Err(kind) => {
                let location = self.locate();
                Err(self.fail(BuildError::new(kind).at(location)))
            }
        }
    }

    /// Like [`Self::check`] for errors that already carry a location.
    fn propagate<T>(&mut self, result: BuildResult<T>) -> BuildResult<T> {
        result.map_err(|err| self.fail(err))
    }

    /// The first error recorded in this session, if any.
    pub fn failure(&self) -> Option<&BuildError> {
        self.failure.as_ref()
    }

    // ── Variables ─────────────────────────────────────────────────────────

    /// Register a scalar variable with its type taken from `initial`.
    #[track_caller]
    pub fn variable(&mut self, name: &str, initial: Value) -> BuildResult<VarHandle> {
        let var = Variable {
            name: name.to_string(),
            ty: initial.ty,
            storage: Storage::Scalar,
            initial: vec![initial],
        };
        let registered = self.variables.register(var);
        self.check(registered)?;
        tracing::debug!(variable = name, ty = %initial.ty, "registered variable");
        Ok(VarHandle {
            var: VarRef::new(name, initial.ty),
        })
    }

    #[track_caller]
    pub fn u8_var(&mut self, name: &str, initial: u8) -> BuildResult<VarHandle> {
        self.variable(name, Value::u8(initial))
    }

    #[track_caller]
    pub fn i8_var(&mut self, name: &str, initial: i8) -> BuildResult<VarHandle> {
        self.variable(name, Value::i8(initial))
    }

    #[track_caller]
    pub fn u16_var(&mut self, name: &str, initial: u16) -> BuildResult<VarHandle> {
        self.variable(name, Value::u16(initial))
    }

    #[track_caller]
    pub fn i16_var(&mut self, name: &str, initial: i16) -> BuildResult<VarHandle> {
        self.variable(name, Value::i16(initial))
    }

    /// A `u8` variable holding 0 or 1.
    #[track_caller]
    pub fn bool_var(&mut self, name: &str, initial: bool) -> BuildResult<VarHandle> {
        self.variable(name, Value::bool(initial))
    }

    /// Register a zero-initialized array.
    #[track_caller]
    pub fn array(&mut self, name: &str, ty: IntType, len: u16) -> BuildResult<ArrayHandle> {
        self.array_of(name, ty, vec![Value::zero(ty); len as usize])
    }

    /// Register an array with explicit initial elements (converted to `ty`).
    #[track_caller]
    pub fn array_of(
        &mut self,
        name: &str,
        ty: IntType,
        initial: Vec<Value>,
    ) -> BuildResult<ArrayHandle> {
        let len = initial.len();
        if len == 0 || len > u16::MAX as usize {
            return self.check(Err(BuildErrorKind::InvalidCapacity {
                name: name.to_string(),
                capacity: len,
            }));
        }
        let var = Variable {
            name: name.to_string(),
            ty,
            storage: Storage::Array(len as u16),
            initial: initial.into_iter().map(|v| v.cast(ty)).collect(),
        };
        let registered = self.variables.register(var);
        self.check(registered)?;
        tracing::debug!(array = name, ty = %ty, len, "registered array");
        Ok(ArrayHandle {
            var: VarRef::new(name, ty),
            len: len as u16,
        })
    }

    // ── Sprites & entities ────────────────────────────────────────────────

    #[track_caller]
    pub fn sprite(&mut self, spec: SpriteSpec) -> BuildResult<SpriteHandle> {
        let Some(size) = SpriteSize::from_pixels(spec.width, spec.height) else {
            return self.check(Err(BuildErrorKind::UnsupportedSpriteSize {
                name: spec.name,
                width: spec.width,
                height: spec.height,
            }));
        };
        let frames = spec.frames.max(1);
        for anim in &spec.animations {
            let end = anim.start as u16 + anim.length as u16;
            if anim.length == 0 || anim.speed == 0 || end > frames as u16 {
                return self.check(Err(BuildErrorKind::InvalidAnimation {
                    sprite: spec.name.clone(),
                    animation: anim.name.clone(),
                }));
            }
        }
        let sprite = Sprite {
            name: spec.name.clone(),
            asset: spec.asset.clone(),
            size,
            frames,
            tile_base: 0,
            animations: spec.animations,
        };
        let registered = self.sprites.register(sprite);
        self.check(registered)?;
        self.assets.record(&spec.asset);
        tracing::debug!(sprite = %spec.name, asset = %spec.asset, "registered sprite");
        Ok(SpriteHandle { name: spec.name })
    }

    /// Grant the next OAM slot.
    #[track_caller]
    pub fn allocate_slot(&mut self) -> BuildResult<u8> {
        let slot = self.sprites.allocate_slot();
        self.check(slot)
    }

    #[track_caller]
    pub fn entity(&mut self, spec: EntitySpec) -> BuildResult<EntityHandle> {
        if self.entities.by_name(&spec.name).is_some() {
            return self.check(Err(BuildErrorKind::DuplicateSymbol {
                kind: "entity",
                name: spec.name,
            }));
        }
        let oam_slot = match &spec.sprite {
            Some(sprite) => {
                if self.sprites.get(sprite).is_none() {
                    return self.check(Err(BuildErrorKind::UnknownSymbol {
                        kind: "sprite",
                        name: sprite.clone(),
                    }));
                }
                Some(self.allocate_slot()?)
            }
            None => None,
        };
        let entity = Entity {
            id: EntityId(0),
            name: spec.name.clone(),
            x: spec.x,
            y: spec.y,
            visible: spec.visible,
            sprite: spec.sprite,
            hitbox: spec.hitbox,
            tags: spec.tags,
            oam_slot,
        };
        let inserted = self.entities.insert(entity);
        let id = self.check(inserted)?;
        tracing::debug!(entity = %spec.name, id = id.0, ?oam_slot, "registered entity");
        Ok(EntityHandle {
            id,
            name: spec.name,
        })
    }

    pub fn entity_named(&self, name: &str) -> Option<EntityHandle> {
        self.entities.by_name(name).map(|e| EntityHandle {
            id: e.id,
            name: e.name.clone(),
        })
    }

    /// All entities carrying `tag`, in registration order.
    pub fn tagged(&self, tag: &str) -> Vec<EntityHandle> {
        self.entities
            .tagged(tag)
            .into_iter()
            .map(|e| EntityHandle {
                id: e.id,
                name: e.name.clone(),
            })
            .collect()
    }

    // ── Pools ─────────────────────────────────────────────────────────────

    /// Define a pool of `capacity` reusable slots.
    #[track_caller]
    pub fn pool(
        &mut self,
        name: &str,
        capacity: u8,
        define: impl FnOnce(&mut PoolBuilder<'_>) -> BuildResult<()>,
    ) -> BuildResult<PoolHandle> {
        let available = if self.pending_pools.iter().any(|p| p == name) {
            Err(BuildErrorKind::DuplicateSymbol {
                kind: "pool",
                name: name.to_string(),
            })
        } else {
            self.pools.check_available(name)
        };
        self.check(available)?;
        if capacity == 0 {
            return self.check(Err(BuildErrorKind::InvalidCapacity {
                name: name.to_string(),
                capacity: 0,
            }));
        }

        self.pending_pools.push(name.to_string());
        let mut builder = PoolBuilder {
            game: &mut *self,
            pool: Pool {
                name: name.to_string(),
                capacity,
                sprite: None,
                hitbox: None,
                update: Vec::new(),
                despawn_when: Vec::new(),
                oam_base: None,
            },
        };
        let outcome = define(&mut builder);
        let mut pool = builder.pool;
        self.pending_pools.retain(|p| p != name);
        self.propagate(outcome)?;

        if pool.sprite.is_some() {
            let base = self.sprites.allocate_slots(capacity as usize);
            pool.oam_base = Some(self.check(base)?);
        }
        let inserted = self.pools.insert(pool);
        self.check(inserted)?;
        tracing::debug!(pool = name, capacity, "registered pool");
        Ok(PoolHandle {
            name: name.to_string(),
        })
    }

    fn pool_known(&self, name: &str) -> bool {
        self.pools.contains(name) || self.pending_pools.iter().any(|p| p == name)
    }

    // ── Scenes ────────────────────────────────────────────────────────────

    #[track_caller]
    pub fn scene(
        &mut self,
        name: &str,
        define: impl FnOnce(&mut SceneBuilder<'_>) -> BuildResult<()>,
    ) -> BuildResult<SceneHandle> {
        let available = self.scenes.check_available(name);
        self.check(available)?;
        let location = self.locate();
        let mut builder = SceneBuilder {
            game: &mut *self,
            scene: Scene {
                name: name.to_string(),
                enter: Vec::new(),
                exit: Vec::new(),
                frame: Vec::new(),
                location,
            },
        };
        let outcome = define(&mut builder);
        let scene = builder.scene;
        self.propagate(outcome)?;
        let inserted = self.scenes.insert(scene);
        self.check(inserted)?;
        tracing::debug!(scene = name, "registered scene");
        Ok(SceneHandle {
            name: name.to_string(),
        })
    }

    /// Choose the start scene (defaults to the first registered scene).
    #[track_caller]
    pub fn start_at(&mut self, scene: &str) {
        let location = self.locate();
        self.start_scene = Some((scene.to_string(), location));
    }

    // ── Save records ──────────────────────────────────────────────────────

    /// Declare a save record persisting `fields` in the given order.
    #[track_caller]
    pub fn save_record(&mut self, name: &str, version: u8, fields: &[&str]) -> BuildResult<SaveHandle> {
        for field in fields {
            if self.variables.get(field).is_none() {
                return self.check(Err(BuildErrorKind::UnknownSymbol {
                    kind: "variable",
                    name: field.to_string(),
                }));
            }
        }
        let record = SaveRecord {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            version,
        };
        let inserted = self.saves.insert(record);
        self.check(inserted)?;
        tracing::debug!(record = name, version, "registered save record");
        Ok(SaveHandle {
            name: name.to_string(),
        })
    }

    // ── Finish ────────────────────────────────────────────────────────────

    /// Close the session and produce the immutable [`Program`].
    pub fn finish(self) -> BuildResult<Program> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        if self.recorder.depth() != 0 {
            return Err(BuildError::new(BuildErrorKind::ScopeMismatch {
                expected: 0,
                found: self.recorder.depth(),
            }));
        }
        let start_scene = match (self.start_scene, self.scenes.first()) {
            (_, None) => return Err(BuildError::new(BuildErrorKind::NoScenes)),
            (Some((name, location)), _) => {
                if !self.scenes.contains(&name) {
                    return Err(BuildError::new(BuildErrorKind::UnknownSymbol {
                        kind: "scene",
                        name,
                    })
                    .at(location));
                }
                name
            }
            (None, Some(first)) => first.name.clone(),
        };
        let program = Program {
            name: self.name,
            variables: self.variables.into_vec(),
            sprites: self.sprites.into_vec(),
            entities: self.entities.into_vec(),
            pools: self.pools.into_vec(),
            scenes: self.scenes.into_vec(),
            assets: self.assets.into_vec(),
            save_records: self.saves.into_vec(),
            start_scene,
        };
        tracing::debug!(
            program = %program.name,
            scenes = program.scenes.len(),
            variables = program.variables.len(),
            "recording finished"
        );
        Ok(program)
    }

    // ── Semantic checks ───────────────────────────────────────────────────

    fn check_expr(&self, expr: &Expr, pool: Option<&str>) -> Result<(), BuildErrorKind> {
        match expr {
            Expr::Literal(_) | Expr::Input { .. } => Ok(()),
            Expr::Var(var) => self.check_var(var, false),
            Expr::Index { array, index } => {
                self.check_var(array, true)?;
                self.check_expr(index, pool)
            }
            Expr::Binary { op, left, right } => {
                Expr::check_operands(*op, left, right)?;
                self.check_expr(left, pool)?;
                self.check_expr(right, pool)
            }
            Expr::Not(inner) => self.check_expr(inner, pool),
            Expr::EntityField { entity, .. } => self.check_entity(entity, pool),
            Expr::Collides { a, b } => {
                self.check_entity(a, pool)?;
                self.check_entity(b, pool)
            }
            Expr::PoolCollides { pool: target, entity } => {
                self.check_pool(target)?;
                self.check_entity(entity, pool)
            }
            Expr::PoolActive(target) => self.check_pool(target),
        }
    }

    fn check_var(&self, var: &VarRef, array: bool) -> Result<(), BuildErrorKind> {
        match self.variables.get(&var.name) {
            Some(v) if v.ty == var.ty && v.storage.is_array() == array => Ok(()),
            _ => Err(BuildErrorKind::UnknownSymbol {
                kind: if array { "array" } else { "variable" },
                name: var.name.clone(),
            }),
        }
    }

    fn check_entity(&self, entity: &EntityRef, pool: Option<&str>) -> Result<(), BuildErrorKind> {
        match entity {
            EntityRef::Entity(id) if self.entities.get(*id).is_some() => Ok(()),
            EntityRef::Entity(id) => Err(BuildErrorKind::UnknownSymbol {
                kind: "entity",
                name: format!("#{}", id.0),
            }),
            EntityRef::PoolSelf(name) if pool == Some(name.as_str()) => Ok(()),
            EntityRef::PoolSelf(name) => Err(BuildErrorKind::UnknownSymbol {
                kind: "pool slot outside its update",
                name: name.clone(),
            }),
        }
    }

    fn check_pool(&self, name: &str) -> Result<(), BuildErrorKind> {
        if self.pool_known(name) {
            Ok(())
        } else {
            Err(BuildErrorKind::UnknownSymbol {
                kind: "pool",
                name: name.to_string(),
            })
        }
    }

    fn check_place(&self, place: &Place, pool: Option<&str>) -> Result<(), BuildErrorKind> {
        match place {
            Place::Var(var) => self.check_var(var, false),
            Place::Index { array, index } => {
                self.check_var(array, true)?;
                self.check_expr(index, pool)
            }
        }
    }

    /// Sprite used by an entity reference, for animation lookups.
    fn sprite_of(&self, entity: &EntityRef) -> Option<&Sprite> {
        match entity {
            EntityRef::Entity(id) => {
                let sprite = self.entities.get(*id)?.sprite.as_deref()?;
                self.sprites.get(sprite)
            }
            EntityRef::PoolSelf(_) => None,
        }
    }

    /// Record a block: open a scope, run `f`, close the scope.
    #[track_caller]
    fn record_block(
        &mut self,
        pool: Option<String>,
        f: impl FnOnce(&mut Block<'_>) -> BuildResult<()>,
    ) -> BuildResult<Vec<Stmt>> {
        let token = self.recorder.open_scope();
        let mut block = Block {
            game: &mut *self,
            pool,
        };
        let outcome = f(&mut block);
        let closed = self.recorder.close_scope(token);
        self.propagate(outcome)?;
        self.check(closed)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Scene & pool builders
// ══════════════════════════════════════════════════════════════════════════════

/// Records the lifecycle blocks of one scene.
pub struct SceneBuilder<'a> {
    game: &'a mut GameBuilder,
    scene: Scene,
}

impl SceneBuilder<'_> {
    pub fn name(&self) -> &str {
        &self.scene.name
    }

    /// Statements run once when the scene becomes current.
    #[track_caller]
    pub fn on_enter(&mut self, f: impl FnOnce(&mut Block<'_>) -> BuildResult<()>) -> BuildResult<()> {
        let stmts = self.game.record_block(None, f)?;
        self.scene.enter.extend(stmts);
        Ok(())
    }

    /// Statements run once when the scene is left.
    #[track_caller]
    pub fn on_exit(&mut self, f: impl FnOnce(&mut Block<'_>) -> BuildResult<()>) -> BuildResult<()> {
        let stmts = self.game.record_block(None, f)?;
        self.scene.exit.extend(stmts);
        Ok(())
    }

    /// Statements run every tick while the scene is current.
    #[track_caller]
    pub fn on_frame(&mut self, f: impl FnOnce(&mut Block<'_>) -> BuildResult<()>) -> BuildResult<()> {
        let stmts = self.game.record_block(None, f)?;
        self.scene.frame.extend(stmts);
        Ok(())
    }
}

/// Records a pool's template, update block and despawn predicates.
pub struct PoolBuilder<'a> {
    game: &'a mut GameBuilder,
    pool: Pool,
}

impl PoolBuilder<'_> {
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            name: self.pool.name.clone(),
        }
    }

    #[track_caller]
    pub fn sprite(&mut self, sprite: &SpriteHandle) -> BuildResult<()> {
        if self.game.sprites.get(&sprite.name).is_none() {
            return self.game.check(Err(BuildErrorKind::UnknownSymbol {
                kind: "sprite",
                name: sprite.name.clone(),
            }));
        }
        self.pool.sprite = Some(sprite.name.clone());
        Ok(())
    }

    pub fn hitbox(&mut self, hitbox: Hitbox) {
        self.pool.hitbox = Some(hitbox);
    }

    /// Statements run for every active slot each tick.
    #[track_caller]
    pub fn on_update(&mut self, f: impl FnOnce(&mut Block<'_>) -> BuildResult<()>) -> BuildResult<()> {
        let stmts = self.game.record_block(Some(self.pool.name.clone()), f)?;
        self.pool.update.extend(stmts);
        Ok(())
    }

    /// Free a slot when `condition` holds after its update.
    #[track_caller]
    pub fn despawn_when(&mut self, condition: Expr) -> BuildResult<()> {
        let checked = self.game.check_expr(&condition, Some(self.pool.name.as_str()));
        self.game.check(checked)?;
        self.pool.despawn_when.push(condition);
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Block
// ══════════════════════════════════════════════════════════════════════════════

/// The statement-recording surface handed to every block closure.
pub struct Block<'a> {
    game: &'a mut GameBuilder,
    /// Pool whose slot `PoolSelf` refers to, inside a pool update.
    pool: Option<String>,
}

impl Block<'_> {
    #[track_caller]
    fn push(&mut self, stmt: Stmt) -> BuildResult<()> {
        let pushed = self.game.recorder.push(stmt);
        self.game.check(pushed)
    }

    #[track_caller]
    fn expr(&mut self, expr: impl Into<Expr>) -> BuildResult<Expr> {
        let expr = expr.into();
        let checked = self.game.check_expr(&expr, self.pool.as_deref());
        self.game.check(checked)?;
        Ok(expr)
    }

    #[track_caller]
    fn place(&mut self, place: impl Into<Place>) -> BuildResult<Place> {
        let place = place.into();
        let checked = self.game.check_place(&place, self.pool.as_deref());
        self.game.check(checked)?;
        Ok(place)
    }

    #[track_caller]
    fn entity(&mut self, entity: impl Into<EntityRef>) -> BuildResult<EntityRef> {
        let entity = entity.into();
        let checked = self.game.check_entity(&entity, self.pool.as_deref());
        self.game.check(checked)?;
        Ok(entity)
    }

    // ── Assignment ────────────────────────────────────────────────────────

    /// `target = value`, converting to the target's type.
    #[track_caller]
    pub fn assign(&mut self, target: impl Into<Place>, value: impl Into<Expr>) -> BuildResult<()> {
        let target = self.place(target)?;
        let value = self.expr(value)?;
        self.push(Stmt::Assign { target, value })
    }

    /// `target op= value`, wrapping in the target's type.
    #[track_caller]
    pub fn compound(
        &mut self,
        target: impl Into<Place>,
        op: BinOp,
        value: impl Into<Expr>,
    ) -> BuildResult<()> {
        let target = self.place(target)?;
        let value = self.expr(value)?;
        let checked = Expr::check_operands(op, &target.read(), &value);
        self.game.check(checked.map_err(BuildErrorKind::from))?;
        self.push(Stmt::CompoundAssign { target, op, value })
    }

    #[track_caller]
    pub fn add_assign(&mut self, target: impl Into<Place>, value: impl Into<Expr>) -> BuildResult<()> {
        self.compound(target, BinOp::Add, value)
    }

    #[track_caller]
    pub fn sub_assign(&mut self, target: impl Into<Place>, value: impl Into<Expr>) -> BuildResult<()> {
        self.compound(target, BinOp::Sub, value)
    }

    #[track_caller]
    pub fn mul_assign(&mut self, target: impl Into<Place>, value: impl Into<Expr>) -> BuildResult<()> {
        self.compound(target, BinOp::Mul, value)
    }

    #[track_caller]
    pub fn div_assign(&mut self, target: impl Into<Place>, value: impl Into<Expr>) -> BuildResult<()> {
        self.compound(target, BinOp::Div, value)
    }

    #[track_caller]
    pub fn rem_assign(&mut self, target: impl Into<Place>, value: impl Into<Expr>) -> BuildResult<()> {
        self.compound(target, BinOp::Rem, value)
    }

    // ── Control flow ──────────────────────────────────────────────────────

    /// Run `then` when `condition` holds.
    #[track_caller]
    pub fn when(
        &mut self,
        condition: impl Into<Expr>,
        then: impl FnOnce(&mut Block<'_>) -> BuildResult<()>,
    ) -> BuildResult<()> {
        self.when_else(condition, then, |_| Ok(()))
    }

    /// Two-armed conditional.
    #[track_caller]
    pub fn when_else(
        &mut self,
        condition: impl Into<Expr>,
        then: impl FnOnce(&mut Block<'_>) -> BuildResult<()>,
        otherwise: impl FnOnce(&mut Block<'_>) -> BuildResult<()>,
    ) -> BuildResult<()> {
        let condition = self.expr(condition)?;
        let then_body = self.game.record_block(self.pool.clone(), then)?;
        let else_body = self.game.record_block(self.pool.clone(), otherwise)?;
        self.push(Stmt::If {
            condition,
            then_body,
            else_body,
        })
    }

    /// Request a transition to `scene` at the end of the current tick.
    #[track_caller]
    pub fn go_to(&mut self, scene: &str) -> BuildResult<()> {
        self.push(Stmt::GoTo(scene.to_string()))
    }

    // ── Entities ──────────────────────────────────────────────────────────

    #[track_caller]
    fn entity_op(&mut self, entity: impl Into<EntityRef>, op: EntityOp) -> BuildResult<()> {
        let target = self.entity(entity)?;
        self.push(Stmt::Entity { target, op })
    }

    #[track_caller]
    pub fn set_x(&mut self, entity: impl Into<EntityRef>, x: impl Into<Expr>) -> BuildResult<()> {
        let x = self.expr(x)?;
        self.entity_op(entity, EntityOp::SetX(x))
    }

    #[track_caller]
    pub fn set_y(&mut self, entity: impl Into<EntityRef>, y: impl Into<Expr>) -> BuildResult<()> {
        let y = self.expr(y)?;
        self.entity_op(entity, EntityOp::SetY(y))
    }

    /// Move by a delta; negative signed deltas move left/up.
    #[track_caller]
    pub fn move_by(
        &mut self,
        entity: impl Into<EntityRef>,
        dx: impl Into<Expr>,
        dy: impl Into<Expr>,
    ) -> BuildResult<()> {
        let dx = self.expr(dx)?;
        let dy = self.expr(dy)?;
        self.entity_op(entity, EntityOp::MoveBy { dx, dy })
    }

    #[track_caller]
    pub fn show(&mut self, entity: impl Into<EntityRef>) -> BuildResult<()> {
        self.entity_op(entity, EntityOp::Show)
    }

    #[track_caller]
    pub fn hide(&mut self, entity: impl Into<EntityRef>) -> BuildResult<()> {
        self.entity_op(entity, EntityOp::Hide)
    }

    /// Switch an entity to one of its sprite's animations.
    #[track_caller]
    pub fn play(&mut self, entity: impl Into<EntityRef>, animation: &str) -> BuildResult<()> {
        let target = self.entity(entity)?;
        let known = self
            .game
            .sprite_of(&target)
            .is_some_and(|s| s.animation(animation).is_some());
        if !known {
            return self.game.check(Err(BuildErrorKind::UnknownSymbol {
                kind: "animation",
                name: animation.to_string(),
            }));
        }
        self.push(Stmt::Entity {
            target,
            op: EntityOp::Play(animation.to_string()),
        })
    }

    // ── Pools ─────────────────────────────────────────────────────────────

    /// Activate a free slot at (x, y); a full pool ignores the request.
    #[track_caller]
    pub fn spawn(&mut self, pool: &PoolHandle, x: impl Into<Expr>, y: impl Into<Expr>) -> BuildResult<()> {
        let x = self.expr(x)?;
        let y = self.expr(y)?;
        self.push(Stmt::Pool(PoolOp::Spawn {
            pool: pool.name.clone(),
            x,
            y,
        }))
    }

    #[track_caller]
    pub fn clear_pool(&mut self, pool: &PoolHandle) -> BuildResult<()> {
        self.push(Stmt::Pool(PoolOp::Clear(pool.name.clone())))
    }

    // ── Save data ─────────────────────────────────────────────────────────

    #[track_caller]
    pub fn save(&mut self, record: &SaveHandle) -> BuildResult<()> {
        self.push(Stmt::Save(SaveOp::Store(record.name.clone())))
    }

    #[track_caller]
    pub fn load(&mut self, record: &SaveHandle) -> BuildResult<()> {
        self.push(Stmt::Save(SaveOp::Load(record.name.clone())))
    }
}

/// Run a recording session and return the finished program.
pub fn build(
    name: impl Into<String>,
    define: impl FnOnce(&mut GameBuilder) -> BuildResult<()>,
) -> BuildResult<Program> {
    let mut game = GameBuilder::new(name);
    define(&mut game)?;
    game.finish()
}
