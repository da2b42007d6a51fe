//! Runtime helpers emitted into the C prelude.
//!
//! Only helpers the program actually uses are emitted, so the output stays
//! free of unused static functions. Which helpers are needed is decided by
//! [`RuntimeNeeds::scan`] before any code is written.

use std::collections::BTreeSet;

use cartridge_types::stmt::walk_block;
use cartridge_types::{BinOp, Expr, IntType, Program, Stmt};

use crate::writer::CWriter;

// ══════════════════════════════════════════════════════════════════════════════
// Usage scan
// ══════════════════════════════════════════════════════════════════════════════

fn type_slot(ty: IntType) -> usize {
    match ty {
        IntType::U8 => 0,
        IntType::I8 => 1,
        IntType::U16 => 2,
        IntType::I16 => 3,
    }
}

/// Helpers required by one program.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuntimeNeeds {
    div: [bool; 4],
    rem: [bool; 4],
    /// Indexed by the unsigned type the shift runs in.
    shl: [bool; 4],
    shr: [bool; 4],
    pub overlap: bool,
    pub crc8: bool,
    /// Pools queried with `PoolCollides`.
    hits: BTreeSet<String>,
}

impl RuntimeNeeds {
    pub fn scan(program: &Program) -> Self {
        let mut needs = Self {
            crc8: !program.save_records.is_empty(),
            ..Self::default()
        };
        let mut blocks: Vec<&[Stmt]> = Vec::new();
        for scene in &program.scenes {
            blocks.extend([&scene.enter[..], &scene.exit[..], &scene.frame[..]]);
        }
        for pool in &program.pools {
            blocks.push(&pool.update);
            for pred in &pool.despawn_when {
                pred.walk(&mut |e| needs.note_expr(e));
            }
        }
        for block in blocks {
            walk_block(block, &mut |stmt| {
                for expr in stmt.exprs() {
                    expr.walk(&mut |e| needs.note_expr(e));
                }
                if let Stmt::CompoundAssign { target, op, value } = stmt {
                    needs.note_binary(*op, target.ty(), value.ty());
                }
            });
        }
        needs
    }

    fn note_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Binary { op, left, right } => self.note_binary(*op, left.ty(), right.ty()),
            Expr::Collides { .. } => self.overlap = true,
            Expr::PoolCollides { pool, .. } => {
                self.overlap = true;
                self.hits.insert(pool.clone());
            }
            _ => {}
        }
    }

    /// Whether `pool_<name>_hits` is called anywhere.
    pub fn pool_hits(&self, pool: &str) -> bool {
        self.hits.contains(pool)
    }

    fn note_binary(&mut self, op: BinOp, left: IntType, right: IntType) {
        let unified = type_slot(left.unify(right));
        let shifted = type_slot(left.unsigned());
        match op {
            BinOp::Div => self.div[unified] = true,
            BinOp::Rem => self.rem[unified] = true,
            BinOp::Shl => self.shl[shifted] = true,
            BinOp::Shr => self.shr[shifted] = true,
            _ => {}
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helper names
// ══════════════════════════════════════════════════════════════════════════════

/// `cart_div_<ty>`: truncating division, 0 when dividing by zero.
pub fn div_fn(ty: IntType) -> String {
    format!("cart_div_{}", ty.suffix())
}

/// `cart_rem_<ty>`: remainder with the sign of the dividend, 0 for a zero
/// divisor.
pub fn rem_fn(ty: IntType) -> String {
    format!("cart_rem_{}", ty.suffix())
}

/// `cart_shl_<uty>`: shift in the unsigned type; amounts past the width give 0.
pub fn shl_fn(ty: IntType) -> String {
    format!("cart_shl_{}", ty.unsigned().suffix())
}

/// `cart_shr_<uty>`: logical right shift.
pub fn shr_fn(ty: IntType) -> String {
    format!("cart_shr_{}", ty.unsigned().suffix())
}

// ══════════════════════════════════════════════════════════════════════════════
// Emission
// ══════════════════════════════════════════════════════════════════════════════

/// Input latches and queries. `cart_cur`/`cart_prev` are latched once per
/// tick by the main loop.
fn emit_input(w: &mut CWriter) {
    w.line("static uint8_t cart_cur;");
    w.line("static uint8_t cart_prev;");
    w.line("#define cart_held(b) ((uint8_t)((cart_cur & (b)) != 0))");
    w.line("#define cart_pressed(b) ((uint8_t)((cart_cur & (b)) != 0 && (cart_prev & (b)) == 0))");
    w.line("#define cart_released(b) ((uint8_t)((cart_cur & (b)) == 0 && (cart_prev & (b)) != 0))");
}

fn emit_div(w: &mut CWriter, ty: IntType) {
    let t = ty.c_name();
    w.open(format!("static {t} {}({t} a, {t} b)", div_fn(ty)));
    w.line("if (b == 0) return 0;");
    if ty.is_signed() {
        let u = ty.unsigned().c_name();
        w.line(format!("if (b == -1) return ({t})(0u - ({u})a);"));
    }
    w.line(format!("return ({t})(a / b);"));
    w.close();
}

fn emit_rem(w: &mut CWriter, ty: IntType) {
    let t = ty.c_name();
    w.open(format!("static {t} {}({t} a, {t} b)", rem_fn(ty)));
    if ty.is_signed() {
        w.line("if (b == 0 || b == -1) return 0;");
    } else {
        w.line("if (b == 0) return 0;");
    }
    w.line(format!("return ({t})(a % b);"));
    w.close();
}

fn emit_shift(w: &mut CWriter, ty: IntType, left: bool) {
    let t = ty.c_name();
    let (name, op) = if left {
        (shl_fn(ty), "<<")
    } else {
        (shr_fn(ty), ">>")
    };
    w.open(format!("static {t} {name}({t} a, uint8_t n)"));
    w.line(format!("if (n >= {}) return 0;", ty.bits()));
    w.line(format!("return ({t})(a {op} n);"));
    w.close();
}

/// Strict AABB overlap; touching edges do not collide.
fn emit_overlap(w: &mut CWriter) {
    w.open("static uint8_t cart_overlap(int ax, int ay, int aw, int ah, int bx, int by, int bw, int bh)");
    w.line("return (uint8_t)(ax < bx + bw && bx < ax + aw && ay < by + bh && by < ay + ah);");
    w.close();
}

/// CRC-8, polynomial 0x07, initial value 0.
fn emit_crc8(w: &mut CWriter) {
    w.open("static uint8_t cart_crc8(const uint8_t *data, uint16_t len)");
    w.line("uint8_t crc = 0;");
    w.line("uint8_t bit;");
    w.open("while (len--)");
    w.line("crc ^= *data++;");
    w.open("for (bit = 0; bit < 8; bit++)");
    w.line("crc = (crc & 0x80) ? (uint8_t)((crc << 1) ^ 0x07) : (uint8_t)(crc << 1);");
    w.close();
    w.close();
    w.line("return crc;");
    w.close();
}

/// Write the prelude: input handling plus every helper in `needs`.
pub fn emit_prelude(w: &mut CWriter, needs: &RuntimeNeeds) {
    emit_input(w);
    for ty in IntType::ALL {
        let slot = type_slot(ty);
        if needs.div[slot] {
            w.blank();
            emit_div(w, ty);
        }
        if needs.rem[slot] {
            w.blank();
            emit_rem(w, ty);
        }
        if needs.shl[slot] {
            w.blank();
            emit_shift(w, ty, true);
        }
        if needs.shr[slot] {
            w.blank();
            emit_shift(w, ty, false);
        }
    }
    if needs.overlap {
        w.blank();
        emit_overlap(w);
    }
    if needs.crc8 {
        w.blank();
        emit_crc8(w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(f: impl FnOnce(&mut CWriter)) -> String {
        let mut w = CWriter::new();
        f(&mut w);
        w.finish()
    }

    #[test]
    fn signed_division_guards_zero_and_minus_one() {
        let c = emitted(|w| emit_div(w, IntType::I8));
        assert!(c.starts_with("static int8_t cart_div_i8(int8_t a, int8_t b) {"));
        assert!(c.contains("if (b == 0) return 0;"));
        assert!(c.contains("if (b == -1) return (int8_t)(0u - (uint8_t)a);"));
    }

    #[test]
    fn unsigned_rem_has_no_minus_one_case() {
        let c = emitted(|w| emit_rem(w, IntType::U16));
        assert!(c.contains("cart_rem_u16(uint16_t a, uint16_t b)"));
        assert!(!c.contains("-1"));
    }

    #[test]
    fn shifts_saturate_at_width() {
        let c = emitted(|w| emit_shift(w, IntType::U16, true));
        assert!(c.contains("if (n >= 16) return 0;"));
        assert!(c.contains("return (uint16_t)(a << n);"));
    }

    #[test]
    fn helper_names_use_type_suffix() {
        assert_eq!(div_fn(IntType::I16), "cart_div_i16");
        assert_eq!(shl_fn(IntType::I8), "cart_shl_u8");
        assert_eq!(shr_fn(IntType::U16), "cart_shr_u16");
    }
}
