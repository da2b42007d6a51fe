//! Expression lowering.
//!
//! Every lowered expression is a C expression whose value, converted to the
//! node's [`Expr::ty`], equals the simulator's result. Operand text is
//! always safe to use as the operand of a cast, unary or binary operator.
//!
//! Arithmetic never relies on C's implicit widening for its result: each
//! operation is computed on operands converted to the unified type and the
//! result is cast back to that type. Signed add, subtract and multiply go
//! through the unsigned type of the same width so wraparound is defined;
//! 8-bit multiply is computed in `uint16_t`.

use cartridge_types::{
    BinOp, EntityField, EntityRef, Expr, Hitbox, InputQuery, IntType, Place, Pool, Program,
    Storage, Value, VarRef,
};

use crate::error::{CodegenError, CodegenResult};
use crate::names;
use crate::runtime;

/// C text of a literal.
pub fn literal(value: Value) -> String {
    match value.ty {
        IntType::I16 if value.raw == IntType::I16.min_value() => "(-32767 - 1)".to_string(),
        _ if value.raw < 0 => format!("({})", value.raw),
        IntType::U16 if value.raw > i16::MAX as i64 => format!("{}u", value.raw),
        _ => value.raw.to_string(),
    }
}

/// Convert operand text of type `from` to `to`, omitting no-op casts.
pub fn cast(to: IntType, from: IntType, text: String) -> String {
    if to == from {
        text
    } else {
        format!("({}){text}", to.c_name())
    }
}

/// Lowering context: the program plus where in it we are.
pub struct ExprGen<'a> {
    pub program: &'a Program,
    /// Human-readable location used in errors, e.g. `scene 'main' frame`.
    pub context: String,
    /// The pool whose update is being emitted; `PoolSelf` reads its slot.
    pub pool: Option<&'a Pool>,
}

impl<'a> ExprGen<'a> {
    pub fn new(program: &'a Program, context: impl Into<String>, pool: Option<&'a Pool>) -> Self {
        Self {
            program,
            context: context.into(),
            pool,
        }
    }

    pub fn unresolved(&self, kind: &'static str, name: impl Into<String>) -> CodegenError {
        CodegenError::UnresolvedSymbol {
            context: self.context.clone(),
            kind,
            name: name.into(),
        }
    }

    pub fn unsupported(&self, detail: impl Into<String>) -> CodegenError {
        CodegenError::Unsupported {
            context: self.context.clone(),
            detail: detail.into(),
        }
    }

    // ── Variables ─────────────────────────────────────────────────────────

    fn variable(&self, var: &VarRef, array: bool) -> CodegenResult<Storage> {
        match self.program.variable(&var.name) {
            Some(v) if v.ty == var.ty && v.storage.is_array() == array => Ok(v.storage),
            _ => Err(self.unresolved(if array { "array" } else { "variable" }, &var.name)),
        }
    }

    fn element(&self, array: &VarRef, index: &Expr) -> CodegenResult<String> {
        let len = self.variable(array, true)?.len();
        let index = cast(IntType::U16, index.ty(), self.expr(index)?);
        Ok(format!("{}[{index} % {len}u]", array.name))
    }

    /// Lvalue text of a place.
    pub fn place(&self, place: &Place) -> CodegenResult<String> {
        match place {
            Place::Var(var) => {
                self.variable(var, false)?;
                Ok(var.name.clone())
            }
            Place::Index { array, index } => self.element(array, index),
        }
    }

    // ── Entities ──────────────────────────────────────────────────────────

    /// The pool a `PoolSelf` reference names, if it is the one being updated.
    fn own_pool(&self, name: &str) -> CodegenResult<&'a Pool> {
        match self.pool {
            Some(pool) if pool.name == name => Ok(pool),
            _ => Err(self.unresolved("pool slot", name)),
        }
    }

    /// Lvalue text of an entity field (`visible` for show/hide).
    pub fn entity_field(&self, entity: &EntityRef, field: EntityField) -> CodegenResult<String> {
        match entity {
            EntityRef::Entity(id) => {
                let e = self
                    .program
                    .entity(*id)
                    .ok_or_else(|| self.unresolved("entity", format!("#{}", id.0)))?;
                Ok(format!(
                    "{}[{}]",
                    names::entity_array(field.name()),
                    names::entity_id(&e.name)
                ))
            }
            EntityRef::PoolSelf(name) => {
                let pool = self.own_pool(name)?;
                match field {
                    EntityField::Frame => Ok("0".to_string()),
                    _ => Ok(format!(
                        "{}[{}]",
                        names::pool_member(&pool.name, field.name()),
                        names::POOL_SLOT
                    )),
                }
            }
        }
    }

    fn hitbox(&self, entity: &EntityRef) -> CodegenResult<Option<Hitbox>> {
        match entity {
            EntityRef::Entity(id) => {
                let e = self
                    .program
                    .entity(*id)
                    .ok_or_else(|| self.unresolved("entity", format!("#{}", id.0)))?;
                Ok(self.program.entity_hitbox(e))
            }
            EntityRef::PoolSelf(name) => Ok(self.program.pool_hitbox(self.own_pool(name)?)),
        }
    }

    /// `x, y, w, h` arguments of an entity's hitbox, or `None` without one.
    fn box_args(&self, entity: &EntityRef) -> CodegenResult<Option<String>> {
        let Some(hb) = self.hitbox(entity)? else {
            return Ok(None);
        };
        let x = self.entity_field(entity, EntityField::X)?;
        let y = self.entity_field(entity, EntityField::Y)?;
        Ok(Some(box_text(&x, &y, hb)))
    }

    // ── Expressions ───────────────────────────────────────────────────────

    pub fn expr(&self, expr: &Expr) -> CodegenResult<String> {
        match expr {
            Expr::Literal(v) => Ok(literal(*v)),
            Expr::Var(var) => {
                self.variable(var, false)?;
                Ok(var.name.clone())
            }
            Expr::Index { array, index } => self.element(array, index),
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Not(inner) => Ok(format!("(uint8_t)!{}", self.expr(inner)?)),
            Expr::Input { query, button } => {
                let query = match query {
                    InputQuery::Held => "cart_held",
                    InputQuery::Pressed => "cart_pressed",
                    InputQuery::Released => "cart_released",
                };
                Ok(format!("{query}({})", button.c_name()))
            }
            Expr::EntityField { entity, field } => self.entity_field(entity, *field),
            Expr::Collides { a, b } => match (self.box_args(a)?, self.box_args(b)?) {
                (Some(a), Some(b)) => Ok(format!("cart_overlap({a}, {b})")),
                _ => Ok("0".to_string()),
            },
            Expr::PoolCollides { pool, entity } => {
                let p = self
                    .program
                    .pool(pool)
                    .ok_or_else(|| self.unresolved("pool", pool))?;
                match (self.program.pool_hitbox(p), self.box_args(entity)?) {
                    (Some(_), Some(args)) => {
                        Ok(format!("{}({args})", names::pool_member(pool, "hits")))
                    }
                    _ => Ok("0".to_string()),
                }
            }
            Expr::PoolActive(pool) => {
                self.program
                    .pool(pool)
                    .ok_or_else(|| self.unresolved("pool", pool))?;
                Ok(names::pool_member(pool, "count"))
            }
        }
    }

    /// Lower `left op right`.
    pub fn binary(&self, op: BinOp, left: &Expr, right: &Expr) -> CodegenResult<String> {
        let (lt, rt) = (left.ty(), right.ty());
        let l = self.expr(left)?;
        let r = self.expr(right)?;
        let ty = lt.unify(rt);
        let text = match op {
            // 8-bit operands promote to a 16-bit signed int, where 255 * 255
            // overflows; multiply as uint16_t and narrow.
            BinOp::Mul if ty.bits() == 8 => {
                let wide = |t: IntType, text: String| {
                    cast(IntType::U16, IntType::U8, cast(IntType::U8, t, text))
                };
                let product = format!("(uint8_t)({} * {})", wide(lt, l), wide(rt, r));
                cast(ty, IntType::U8, product)
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                let sym = op.symbol();
                if ty.is_signed() {
                    let u = ty.unsigned();
                    format!(
                        "({})({} {sym} {})",
                        ty.c_name(),
                        cast(u, lt, l),
                        cast(u, rt, r)
                    )
                } else {
                    format!("({})({} {sym} {})", ty.c_name(), cast(ty, lt, l), cast(ty, rt, r))
                }
            }
            BinOp::Div | BinOp::Rem => {
                let helper = if op == BinOp::Div {
                    runtime::div_fn(ty)
                } else {
                    runtime::rem_fn(ty)
                };
                format!("{helper}({}, {})", cast(ty, lt, l), cast(ty, rt, r))
            }
            BinOp::Shl | BinOp::Shr => {
                let helper = if op == BinOp::Shl {
                    runtime::shl_fn(lt)
                } else {
                    runtime::shr_fn(lt)
                };
                let u = lt.unsigned();
                let call = format!("{helper}({}, {})", cast(u, lt, l), cast(IntType::U8, rt, r));
                cast(lt, u, call)
            }
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => format!(
                "({})({} {} {})",
                ty.c_name(),
                cast(ty, lt, l),
                op.symbol(),
                cast(ty, rt, r)
            ),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => format!(
                "(uint8_t)({} {} {})",
                cast(ty, lt, l),
                op.symbol(),
                cast(ty, rt, r)
            ),
            BinOp::And | BinOp::Or => format!("(uint8_t)({l} {} {r})", op.symbol()),
        };
        Ok(text)
    }
}

/// `x + dx, y + dy, w, h` with the position widened to `int`.
pub fn box_text(x: &str, y: &str, hb: Hitbox) -> String {
    let offset = |pos: &str, d: u8| {
        if d == 0 {
            format!("(int){pos}")
        } else {
            format!("(int){pos} + {d}")
        }
    };
    format!("{}, {}, {}, {}", offset(x, hb.dx), offset(y, hb.dy), hb.w, hb.h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_formatting() {
        assert_eq!(literal(Value::u8(10)), "10");
        assert_eq!(literal(Value::i8(-5)), "(-5)");
        assert_eq!(literal(Value::u16(40_000)), "40000u");
        assert_eq!(literal(Value::i16(i16::MIN)), "(-32767 - 1)");
    }

    #[test]
    fn cast_skips_identity() {
        assert_eq!(cast(IntType::U8, IntType::U8, "a".into()), "a");
        assert_eq!(cast(IntType::U16, IntType::I8, "a".into()), "(uint16_t)a");
    }

    #[test]
    fn hitbox_offsets() {
        let hb = Hitbox::new(0, 2, 8, 4);
        assert_eq!(
            box_text("ent_x[ENT_a]", "ent_y[ENT_a]", hb),
            "(int)ent_x[ENT_a], (int)ent_y[ENT_a] + 2, 8, 4"
        );
    }
}
