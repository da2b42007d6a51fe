//! Statement lowering.
//!
//! Conditionals become nested `if` blocks inside the enclosing function.

use cartridge_types::{EntityField, EntityOp, EntityRef, Expr, IntType, PoolOp, SaveOp, Stmt};

use crate::error::CodegenResult;
use crate::expr::{cast, ExprGen};
use crate::names;
use crate::writer::CWriter;

/// Emit a block of statements.
pub fn emit_block(gen: &ExprGen<'_>, w: &mut CWriter, block: &[Stmt]) -> CodegenResult<()> {
    for stmt in block {
        emit_stmt(gen, w, stmt)?;
    }
    Ok(())
}

fn emit_stmt(gen: &ExprGen<'_>, w: &mut CWriter, stmt: &Stmt) -> CodegenResult<()> {
    match stmt {
        Stmt::Assign { target, value } => {
            let lhs = gen.place(target)?;
            let rhs = cast(target.ty(), value.ty(), gen.expr(value)?);
            w.line(format!("{lhs} = {rhs};"));
        }
        Stmt::CompoundAssign { target, op, value } => {
            let lhs = gen.place(target)?;
            let current = target.read();
            let result_ty = op.result_type(current.ty(), value.ty());
            let rhs = cast(target.ty(), result_ty, gen.binary(*op, &current, value)?);
            w.line(format!("{lhs} = {rhs};"));
        }
        Stmt::If {
            condition,
            then_body,
            else_body,
        } => {
            w.open(format!("if ({})", gen.expr(condition)?));
            emit_block(gen, w, then_body)?;
            if !else_body.is_empty() {
                w.close_with("} else {");
                emit_block(gen, w, else_body)?;
            }
            w.close();
        }
        Stmt::GoTo(scene) => {
            if gen.program.scene(scene).is_none() {
                return Err(gen.unresolved("scene", scene));
            }
            w.line(format!("cart_next_scene = {};", names::scene_id(scene)));
        }
        Stmt::Entity { target, op } => emit_entity_op(gen, w, target, op)?,
        Stmt::Pool(op) => {
            let (pool, call) = match op {
                PoolOp::Spawn { pool, x, y } => {
                    let x = cast(IntType::U8, x.ty(), gen.expr(x)?);
                    let y = cast(IntType::U8, y.ty(), gen.expr(y)?);
                    (pool, format!("{}({x}, {y});", names::pool_member(pool, "spawn")))
                }
                PoolOp::Clear(pool) => (pool, format!("{}();", names::pool_member(pool, "clear"))),
            };
            if gen.program.pool(pool).is_none() {
                return Err(gen.unresolved("pool", pool));
            }
            w.line(call);
        }
        Stmt::Save(op) => {
            let (record, suffix) = match op {
                SaveOp::Store(record) => (record, "store"),
                SaveOp::Load(record) => (record, "load"),
            };
            if gen.program.save_record(record).is_none() {
                return Err(gen.unresolved("save record", record));
            }
            w.line(format!("{}();", names::save_fn(record, suffix)));
        }
    }
    Ok(())
}

fn emit_entity_op(
    gen: &ExprGen<'_>,
    w: &mut CWriter,
    target: &EntityRef,
    op: &EntityOp,
) -> CodegenResult<()> {
    let set = |w: &mut CWriter, field: EntityField, value: &Expr| -> CodegenResult<()> {
        let lhs = gen.entity_field(target, field)?;
        let rhs = cast(IntType::U8, value.ty(), gen.expr(value)?);
        w.line(format!("{lhs} = {rhs};"));
        Ok(())
    };
    let nudge = |w: &mut CWriter, field: EntityField, delta: &Expr| -> CodegenResult<()> {
        let lhs = gen.entity_field(target, field)?;
        let delta = cast(IntType::U8, delta.ty(), gen.expr(delta)?);
        w.line(format!("{lhs} = (uint8_t)({lhs} + {delta});"));
        Ok(())
    };
    match op {
        EntityOp::SetX(x) => set(w, EntityField::X, x)?,
        EntityOp::SetY(y) => set(w, EntityField::Y, y)?,
        EntityOp::MoveBy { dx, dy } => {
            nudge(w, EntityField::X, dx)?;
            nudge(w, EntityField::Y, dy)?;
        }
        EntityOp::Show | EntityOp::Hide => {
            let lhs = gen.entity_field(target, EntityField::Visible)?;
            let on = matches!(op, EntityOp::Show) as u8;
            w.line(format!("{lhs} = {on};"));
        }
        EntityOp::Play(animation) => {
            let EntityRef::Entity(id) = target else {
                return Err(gen.unsupported(format!("pool slots cannot play '{animation}'")));
            };
            let entity = gen
                .program
                .entity(*id)
                .ok_or_else(|| gen.unresolved("entity", format!("#{}", id.0)))?;
            let sprite = entity
                .sprite
                .as_deref()
                .and_then(|s| gen.program.sprite(s))
                .ok_or_else(|| gen.unresolved("sprite of entity", &entity.name))?;
            if sprite.animation(animation).is_none() {
                return Err(gen.unresolved("animation", animation.clone()));
            }
            w.line(format!(
                "cart_play({}, {});",
                names::entity_id(&entity.name),
                names::anim_id(&sprite.name, animation)
            ));
        }
    }
    Ok(())
}
