//! Top-level C source assembler.
//!
//! Emits, in this fixed order:
//! 1. Header comment and includes
//! 2. Runtime prelude (input latches, arithmetic helpers, overlap, CRC)
//! 3. Scene, entity and animation ids plus scene state
//! 4. User globals, in registration order
//! 5. Sprite tile tables, animation table, entity and pool state
//! 6. Forward declarations
//! 7. Animation control, pool helpers, sprite sync, save functions
//! 8. Scene hook functions, one per scene per hook
//! 9. Hook dispatch and `main`

use cartridge_types::{
    Animation, Entity, Hook, Pool, Program, SaveError, SaveLayout, Sprite, SpriteSize, Storage,
    SAVE_MAGIC,
};

use crate::error::{CodegenError, CodegenResult};
use crate::expr::{box_text, literal, ExprGen};
use crate::names;
use crate::runtime::{self, RuntimeNeeds};
use crate::source_map::SourceMap;
use crate::stmt::emit_block;
use crate::writer::CWriter;

/// Start of cartridge RAM in the SM83 address space.
const SRAM_BASE: u16 = 0xA000;

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Compile a [`Program`] into GBDK C source.
pub fn compile(program: &Program) -> CodegenResult<String> {
    compile_with_source_map(program).map(|(source, _)| source)
}

/// Compile a [`Program`] and also return the scene-function source map.
pub fn compile_with_source_map(program: &Program) -> CodegenResult<(String, SourceMap)> {
    let generator = Generator::new(program)?;
    generator.run()
}

/// SRAM offset of every save record, laid out back to back in declaration
/// order. The simulator's SRAM model uses the same layout.
pub fn save_layouts(program: &Program) -> CodegenResult<Vec<(usize, SaveLayout)>> {
    let mut offset = 0;
    let mut layouts = Vec::with_capacity(program.save_records.len());
    for record in &program.save_records {
        let layout = SaveLayout::new(program, record).map_err(|err| match err {
            SaveError::UnknownField { record, field } => CodegenError::UnresolvedSymbol {
                context: format!("save record '{record}'"),
                kind: "variable",
                name: field,
            },
            other => CodegenError::Unsupported {
                context: format!("save record '{}'", record.name),
                detail: other.to_string(),
            },
        })?;
        let size = layout.size();
        layouts.push((offset, layout));
        offset += size;
    }
    Ok(layouts)
}

// ══════════════════════════════════════════════════════════════════════════════
// Generator
// ══════════════════════════════════════════════════════════════════════════════

struct Generator<'a> {
    program: &'a Program,
    w: CWriter,
    source_map: SourceMap,
    needs: RuntimeNeeds,
    /// Every animation, numbered in sprite then declaration order.
    anims: Vec<(&'a Sprite, &'a Animation)>,
    saves: Vec<(usize, SaveLayout)>,
}

impl<'a> Generator<'a> {
    /// Check the program's structure and collect metadata.
    fn new(program: &'a Program) -> CodegenResult<Self> {
        if program.scenes.is_empty() {
            return Err(CodegenError::EmptyProgram(program.name.clone()));
        }
        if program.scene(&program.start_scene).is_none() {
            return Err(CodegenError::MissingStartScene(program.start_scene.clone()));
        }
        for entity in &program.entities {
            Self::sprite_of(program, entity.sprite.as_deref(), || {
                format!("entity '{}'", entity.name)
            })?;
        }
        for pool in &program.pools {
            Self::sprite_of(program, pool.sprite.as_deref(), || format!("pool '{}'", pool.name))?;
        }
        let anims = program
            .sprites
            .iter()
            .flat_map(|s| s.animations.iter().map(move |a| (s, a)))
            .collect();
        Ok(Self {
            program,
            w: CWriter::new(),
            source_map: SourceMap::new(),
            needs: RuntimeNeeds::scan(program),
            anims,
            saves: save_layouts(program)?,
        })
    }

    fn sprite_of(
        program: &'a Program,
        sprite: Option<&str>,
        context: impl FnOnce() -> String,
    ) -> CodegenResult<Option<&'a Sprite>> {
        match sprite {
            None => Ok(None),
            Some(name) => program.sprite(name).map(Some).ok_or_else(|| {
                CodegenError::UnresolvedSymbol {
                    context: context(),
                    kind: "sprite",
                    name: name.to_string(),
                }
            }),
        }
    }

    fn run(mut self) -> CodegenResult<(String, SourceMap)> {
        self.emit_header();
        runtime::emit_prelude(&mut self.w, &self.needs);
        self.w.blank();
        self.emit_ids();
        self.w.blank();
        self.emit_globals();
        self.emit_state();
        self.emit_forward_decls();
        self.emit_play();
        let program = self.program;
        for pool in &program.pools {
            self.emit_pool(pool)?;
        }
        self.emit_sprite_sync();
        for index in 0..self.saves.len() {
            self.emit_save(index);
        }
        for scene in &program.scenes {
            for hook in Hook::ALL {
                self.emit_scene_fn(&scene.name, hook)?;
            }
        }
        self.emit_dispatch();
        self.emit_main();
        tracing::debug!(
            program = %self.program.name,
            lines = self.w.next_line() - 1,
            functions = self.source_map.entries.len(),
            "generated C source"
        );
        Ok((self.w.finish(), self.source_map))
    }

    // ── 1. Header ─────────────────────────────────────────────────────────

    fn emit_header(&mut self) {
        let name = self.program.name.replace("*/", "* /");
        self.w
            .line(format!("/* {name}: generated by cartridge. Do not edit. */"));
        self.w.line("#include <gb/gb.h>");
        self.w.line("#include <stdint.h>");
        self.w.blank();
    }

    // ── 3. Ids ────────────────────────────────────────────────────────────

    fn emit_ids(&mut self) {
        let program = self.program;
        self.w.line(format!("#define {} 0xFF", names::NO_SCENE));
        for (i, scene) in program.scenes.iter().enumerate() {
            self.w
                .line(format!("#define {} {i}", names::scene_id(&scene.name)));
        }
        for entity in &program.entities {
            self.w.line(format!(
                "#define {} {}",
                names::entity_id(&entity.name),
                entity.id.0
            ));
        }
        if !self.anims.is_empty() {
            self.w.line(format!("#define {} 0xFF", names::NO_ANIM));
            for (i, (sprite, anim)) in self.anims.iter().enumerate() {
                self.w.line(format!(
                    "#define {} {i}",
                    names::anim_id(&sprite.name, &anim.name)
                ));
            }
        }
        self.w.blank();
        self.w.line(format!(
            "static uint8_t cart_scene = {};",
            names::scene_id(&program.start_scene)
        ));
        self.w
            .line(format!("static uint8_t cart_next_scene = {};", names::NO_SCENE));
    }

    // ── 4. Globals ────────────────────────────────────────────────────────

    fn emit_globals(&mut self) {
        for var in &self.program.variables {
            let ty = var.ty.c_name();
            match var.storage {
                Storage::Scalar => {
                    let init = var.initial.first().map(|v| literal(*v));
                    self.w.line(format!(
                        "{ty} {} = {};",
                        var.name,
                        init.unwrap_or_else(|| "0".to_string())
                    ));
                }
                Storage::Array(len) => {
                    let init: Vec<_> = var.initial.iter().map(|v| literal(*v)).collect();
                    self.w.line(format!(
                        "{ty} {}[{len}] = {{{}}};",
                        var.name,
                        init.join(", ")
                    ));
                }
            }
        }
        if !self.program.variables.is_empty() {
            self.w.blank();
        }
    }

    // ── 5. Tables and state ───────────────────────────────────────────────

    fn emit_state(&mut self) {
        let program = self.program;
        for sprite in &program.sprites {
            self.w.line(format!(
                "extern const uint8_t {}[];",
                names::sprite_tiles(&sprite.name)
            ));
        }
        if !self.anims.is_empty() {
            let table = |f: fn(&Animation) -> u8| -> String {
                self.anims
                    .iter()
                    .map(|(_, a)| f(a).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let start = table(|a| a.start);
            let length = table(|a| a.length);
            let speed = table(|a| a.speed);
            self.w
                .line(format!("static const uint8_t cart_anim_start[] = {{{start}}};"));
            self.w
                .line(format!("static const uint8_t cart_anim_length[] = {{{length}}};"));
            self.w
                .line(format!("static const uint8_t cart_anim_speed[] = {{{speed}}};"));
        }
        if !program.entities.is_empty() {
            let n = program.entities.len();
            let column = |f: &dyn Fn(&Entity) -> String| -> String {
                program.entities.iter().map(f).collect::<Vec<_>>().join(", ")
            };
            let xs = column(&|e: &Entity| e.x.to_string());
            let ys = column(&|e: &Entity| e.y.to_string());
            let visible = column(&|e: &Entity| (e.visible as u8).to_string());
            let zeros = column(&|_: &Entity| "0".to_string());
            self.w.line(format!("static uint8_t ent_x[{n}] = {{{xs}}};"));
            self.w.line(format!("static uint8_t ent_y[{n}] = {{{ys}}};"));
            self.w
                .line(format!("static uint8_t ent_visible[{n}] = {{{visible}}};"));
            self.w
                .line(format!("static uint8_t ent_frame[{n}] = {{{zeros}}};"));
            if self.animated() {
                let none = column(&|_: &Entity| names::NO_ANIM.to_string());
                self.w
                    .line(format!("static uint8_t ent_anim[{n}] = {{{none}}};"));
                self.w
                    .line(format!("static uint8_t ent_anim_tick[{n}] = {{{zeros}}};"));
            }
        }
        for pool in &program.pools {
            let cap = pool.capacity;
            for member in ["active", "visible", "x", "y"] {
                self.w.line(format!(
                    "static uint8_t {}[{cap}];",
                    names::pool_member(&pool.name, member)
                ));
            }
            self.w.line(format!(
                "static uint8_t {};",
                names::pool_member(&pool.name, "count")
            ));
        }
        self.w.blank();
    }

    // ── 6. Forward declarations ───────────────────────────────────────────

    fn emit_forward_decls(&mut self) {
        let program = self.program;
        for pool in &program.pools {
            let name = &pool.name;
            self.w.line(format!(
                "static void {}(uint8_t x, uint8_t y);",
                names::pool_member(name, "spawn")
            ));
            self.w
                .line(format!("static void {}(void);", names::pool_member(name, "clear")));
            self.w
                .line(format!("static void {}(void);", names::pool_member(name, "update")));
            if self.emits_hits(pool) {
                self.w.line(format!(
                    "static uint8_t {}(int x, int y, int w, int h);",
                    names::pool_member(name, "hits")
                ));
            }
        }
        for (_, layout) in &self.saves {
            for op in ["store", "load"] {
                self.w
                    .line(format!("static void {}(void);", names::save_fn(&layout.record, op)));
            }
        }
        for scene in &program.scenes {
            for hook in Hook::ALL {
                self.w
                    .line(format!("static void {}(void);", names::scene_fn(&scene.name, hook)));
            }
        }
        self.w.blank();
    }

    fn emits_hits(&self, pool: &Pool) -> bool {
        self.needs.pool_hits(&pool.name) && self.program.pool_hitbox(pool).is_some()
    }

    // ── 7. Helpers ────────────────────────────────────────────────────────

    /// Entities exist and some sprite declares animations.
    fn animated(&self) -> bool {
        !self.anims.is_empty() && !self.program.entities.is_empty()
    }

    fn emit_play(&mut self) {
        if !self.animated() {
            return;
        }
        self.w.open("static void cart_play(uint8_t e, uint8_t anim)");
        self.w.line("ent_anim[e] = anim;");
        self.w.line("ent_frame[e] = cart_anim_start[anim];");
        self.w.line("ent_anim_tick[e] = 0;");
        self.w.close();
        self.w.blank();
    }

    fn emit_pool(&mut self, pool: &'a Pool) -> CodegenResult<()> {
        let member = |m: &str| names::pool_member(&pool.name, m);
        let cap = pool.capacity;
        let slot = names::POOL_SLOT;

        self.w
            .open(format!("static void {}(uint8_t x, uint8_t y)", member("spawn")));
        self.w.line("uint8_t i;");
        self.w.open(format!("for (i = 0; i < {cap}; i++)"));
        self.w.open(format!("if (!{}[i])", member("active")));
        self.w.line(format!("{}[i] = 1;", member("active")));
        self.w.line(format!("{}[i] = 1;", member("visible")));
        self.w.line(format!("{}[i] = x;", member("x")));
        self.w.line(format!("{}[i] = y;", member("y")));
        self.w.line(format!("{}++;", member("count")));
        self.w.line("return;");
        self.w.close();
        self.w.close();
        self.w.close();
        self.w.blank();

        self.w.open(format!("static void {}(void)", member("clear")));
        self.w.line("uint8_t i;");
        self.w.open(format!("for (i = 0; i < {cap}; i++)"));
        self.w.line(format!("{}[i] = 0;", member("active")));
        self.w.close();
        self.w.line(format!("{} = 0;", member("count")));
        self.w.close();
        self.w.blank();

        let gen = ExprGen::new(
            self.program,
            format!("pool '{}' update", pool.name),
            Some(pool),
        );
        self.w.open(format!("static void {}(void)", member("update")));
        self.w.line(format!("uint8_t {slot};"));
        self.w.open(format!("for ({slot} = 0; {slot} < {cap}; {slot}++)"));
        self.w
            .line(format!("if (!{}[{slot}]) continue;", member("active")));
        emit_block(&gen, &mut self.w, &pool.update)?;
        if !pool.despawn_when.is_empty() {
            let preds = pool
                .despawn_when
                .iter()
                .map(|p| gen.expr(p))
                .collect::<CodegenResult<Vec<_>>>()?;
            self.w.open(format!(
                "if ({}[{slot}] && ({}))",
                member("active"),
                preds.join(" || ")
            ));
            self.w.line(format!("{}[{slot}] = 0;", member("active")));
            self.w.line(format!("{}--;", member("count")));
            self.w.close();
        }
        self.w.close();
        self.w.close();
        self.w.blank();

        if self.emits_hits(pool) {
            if let Some(hb) = self.program.pool_hitbox(pool) {
                let own = box_text(&format!("{}[i]", member("x")), &format!("{}[i]", member("y")), hb);
                self.w.open(format!(
                    "static uint8_t {}(int x, int y, int w, int h)",
                    member("hits")
                ));
                self.w.line("uint8_t i;");
                self.w.open(format!("for (i = 0; i < {cap}; i++)"));
                self.w.line(format!(
                    "if ({}[i] && cart_overlap({own}, x, y, w, h)) return 1;",
                    member("active")
                ));
                self.w.close();
                self.w.line("return 0;");
                self.w.close();
                self.w.blank();
            }
        }
        Ok(())
    }

    fn emit_sprite_sync(&mut self) {
        let program = self.program;
        let sprited_pools = program.pools.iter().any(|p| p.sprite.is_some());
        self.w.open("static void cart_sprites_sync(void)");
        if self.animated() || sprited_pools {
            self.w.line("uint8_t i;");
        }
        if self.animated() {
            let n = program.entities.len();
            self.w.open(format!("for (i = 0; i < {n}; i++)"));
            self.w
                .line(format!("if (ent_anim[i] == {}) continue;", names::NO_ANIM));
            self.w
                .line("if (++ent_anim_tick[i] < cart_anim_speed[ent_anim[i]]) continue;");
            self.w.line("ent_anim_tick[i] = 0;");
            self.w.line("ent_frame[i]++;");
            self.w.open(
                "if (ent_frame[i] >= cart_anim_start[ent_anim[i]] + cart_anim_length[ent_anim[i]])",
            );
            self.w.line("ent_frame[i] = cart_anim_start[ent_anim[i]];");
            self.w.close();
            self.w.close();
        }
        for entity in &program.entities {
            let (Some(slot), Some(sprite)) = (entity.oam_slot, entity.sprite.as_deref()) else {
                continue;
            };
            let Some(sprite) = program.sprite(sprite) else {
                continue;
            };
            let id = names::entity_id(&entity.name);
            self.w.line(format!(
                "set_sprite_tile({slot}, (uint8_t)({} + ent_frame[{id}] * {}));",
                sprite.tile_base,
                sprite.size.tiles_per_frame()
            ));
            self.w.open(format!("if (ent_visible[{id}])"));
            self.w
                .line(format!("move_sprite({slot}, ent_x[{id}], ent_y[{id}]);"));
            self.w.close_with("} else {");
            self.w.line(format!("move_sprite({slot}, 0, 0);"));
            self.w.close();
        }
        for pool in &program.pools {
            let (Some(base), Some(sprite)) = (pool.oam_base, pool.sprite.as_deref()) else {
                continue;
            };
            let Some(sprite) = program.sprite(sprite) else {
                continue;
            };
            let member = |m: &str| names::pool_member(&pool.name, m);
            self.w.open(format!("for (i = 0; i < {}; i++)", pool.capacity));
            self.w.open(format!(
                "if ({}[i] && {}[i])",
                member("active"),
                member("visible")
            ));
            self.w
                .line(format!("set_sprite_tile({base} + i, {});", sprite.tile_base));
            self.w.line(format!(
                "move_sprite({base} + i, {}[i], {}[i]);",
                member("x"),
                member("y")
            ));
            self.w.close_with("} else {");
            self.w.line(format!("move_sprite({base} + i, 0, 0);"));
            self.w.close();
            self.w.close();
        }
        self.w.close();
        self.w.blank();
    }

    fn emit_save(&mut self, index: usize) {
        let (offset, layout) = &self.saves[index];
        let base = format!("(uint8_t *)0x{:04X}u + {offset}", SRAM_BASE);
        let payload = layout.payload_size();
        let has_arrays = layout.fields.iter().any(|f| f.len > 1);
        let mut w = std::mem::take(&mut self.w);

        // Store
        w.open(format!("static void {}(void)", names::save_fn(&layout.record, "store")));
        w.line(format!("uint8_t *p = {base};"));
        if has_arrays {
            w.line("uint16_t i;");
        }
        w.line("ENABLE_RAM;");
        for field in &layout.fields {
            let width = field.ty.bytes();
            let element = |i: &str| -> String {
                if field.len > 1 {
                    format!("{}[{i}]", field.name)
                } else {
                    field.name.clone()
                }
            };
            let at = |byte: usize| -> String {
                if field.len > 1 {
                    if width == 1 {
                        format!("p[{} + i]", field.offset + byte)
                    } else {
                        format!("p[{} + {width} * i]", field.offset + byte)
                    }
                } else {
                    format!("p[{}]", field.offset + byte)
                }
            };
            let u = field.ty.unsigned().c_name();
            let mut body = vec![format!("{} = (uint8_t){};", at(0), element("i"))];
            if width == 2 {
                body.push(format!("{} = (uint8_t)(({u}){} >> 8);", at(1), element("i")));
            }
            if field.len > 1 {
                w.open(format!("for (i = 0; i < {}u; i++)", field.len));
                for line in body {
                    w.line(line);
                }
                w.close();
            } else {
                for line in body {
                    w.line(line);
                }
            }
        }
        for (i, byte) in SAVE_MAGIC.iter().enumerate() {
            w.line(format!("p[{}] = 0x{byte:02X};", payload + i));
        }
        let version_at = payload + SAVE_MAGIC.len();
        w.line(format!("p[{version_at}] = {};", layout.version));
        w.line(format!(
            "p[{}] = cart_crc8(p, {});",
            version_at + 1,
            version_at + 1
        ));
        w.line("DISABLE_RAM;");
        w.close();
        w.blank();

        // Load
        w.open(format!("static void {}(void)", names::save_fn(&layout.record, "load")));
        w.line(format!("uint8_t *p = {base};"));
        if has_arrays {
            w.line("uint16_t i;");
        }
        w.line("ENABLE_RAM;");
        let mut checks: Vec<String> = SAVE_MAGIC
            .iter()
            .enumerate()
            .map(|(i, byte)| format!("p[{}] == 0x{byte:02X}", payload + i))
            .collect();
        checks.push(format!("p[{version_at}] == {}", layout.version));
        checks.push(format!(
            "p[{}] == cart_crc8(p, {})",
            version_at + 1,
            version_at + 1
        ));
        w.open(format!("if ({})", checks.join(" && ")));
        for field in &layout.fields {
            let t = field.ty.c_name();
            let width = field.ty.bytes();
            let (target, lo, hi) = if field.len > 1 {
                let stride = |byte: usize| {
                    if width == 1 {
                        format!("p[{} + i]", field.offset + byte)
                    } else {
                        format!("p[{} + {width} * i]", field.offset + byte)
                    }
                };
                (format!("{}[i]", field.name), stride(0), stride(1))
            } else {
                (
                    field.name.clone(),
                    format!("p[{}]", field.offset),
                    format!("p[{}]", field.offset + 1),
                )
            };
            let value = if width == 1 {
                format!("({t}){lo}")
            } else {
                format!("({t})((uint16_t){lo} | ((uint16_t){hi} << 8))")
            };
            if field.len > 1 {
                w.open(format!("for (i = 0; i < {}u; i++)", field.len));
                w.line(format!("{target} = {value};"));
                w.close();
            } else {
                w.line(format!("{target} = {value};"));
            }
        }
        w.close();
        w.line("DISABLE_RAM;");
        w.close();
        w.blank();
        self.w = w;
    }

    // ── 8. Scene functions ────────────────────────────────────────────────

    fn emit_scene_fn(&mut self, scene_name: &str, hook: Hook) -> CodegenResult<()> {
        let program = self.program;
        let Some(scene) = program.scene(scene_name) else {
            return Err(CodegenError::UnresolvedSymbol {
                context: "scene list".to_string(),
                kind: "scene",
                name: scene_name.to_string(),
            });
        };
        let func = names::scene_fn(&scene.name, hook);
        self.source_map.push(
            func.clone(),
            scene.name.clone(),
            hook,
            self.w.next_line(),
            scene.location.clone(),
        );
        let gen = ExprGen::new(
            program,
            format!("scene '{}' {}", scene.name, hook.name()),
            None,
        );
        self.w.open(format!("static void {func}(void)"));
        emit_block(&gen, &mut self.w, scene.block(hook))?;
        if hook == Hook::Frame {
            for pool in &program.pools {
                self.w
                    .line(format!("{}();", names::pool_member(&pool.name, "update")));
            }
            self.w.line("cart_sprites_sync();");
        }
        self.w.close();
        self.w.blank();
        tracing::debug!(function = %func, "emitted scene hook");
        Ok(())
    }

    // ── 9. Dispatch and main ──────────────────────────────────────────────

    fn emit_dispatch(&mut self) {
        let program = self.program;
        for hook in Hook::ALL {
            self.w.open(format!(
                "static void cart_dispatch_{}(uint8_t scene)",
                hook.name()
            ));
            self.w.open("switch (scene)");
            for scene in &program.scenes {
                self.w.line(format!(
                    "case {}: {}(); break;",
                    names::scene_id(&scene.name),
                    names::scene_fn(&scene.name, hook)
                ));
            }
            self.w.line("default: break;");
            self.w.close();
            self.w.close();
            self.w.blank();
        }
    }

    fn emit_main(&mut self) {
        let program = self.program;
        let tall = program
            .sprites
            .iter()
            .any(|s| s.size == SpriteSize::Tall16);
        self.w.open("void main(void)");
        self.w.line("DISPLAY_OFF;");
        self.w
            .line(if tall { "SPRITES_8x16;" } else { "SPRITES_8x8;" });
        for sprite in &program.sprites {
            self.w.line(format!(
                "set_sprite_data({}, {}, {});",
                sprite.tile_base,
                sprite.tile_count(),
                names::sprite_tiles(&sprite.name)
            ));
        }
        self.w.line("SHOW_SPRITES;");
        self.w.line("DISPLAY_ON;");
        self.w.line("cart_dispatch_enter(cart_scene);");
        self.w.open("while (1)");
        self.w.line("cart_prev = cart_cur;");
        self.w.line("cart_cur = joypad();");
        self.w.line("cart_dispatch_frame(cart_scene);");
        self.w
            .open(format!("if (cart_next_scene != {})", names::NO_SCENE));
        self.w.line("uint8_t next = cart_next_scene;");
        self.w
            .line(format!("cart_next_scene = {};", names::NO_SCENE));
        self.w.line("cart_dispatch_exit(cart_scene);");
        self.w.line("cart_scene = next;");
        self.w.line("cart_dispatch_enter(cart_scene);");
        self.w.close();
        self.w.line("wait_vbl_done();");
        self.w.close();
        self.w.close();
    }
}
