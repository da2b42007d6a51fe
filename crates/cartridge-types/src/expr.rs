//! Expression trees.
//!
//! Nodes are built through explicit constructors. The ones that can reject
//! their operands (`div`, `rem`, bitwise, shifts) return [`ExprError`]; the
//! rest are infallible. Each node is owned by exactly one parent.

use crate::error::ExprError;
use crate::value::{BinOp, IntType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// References
// ══════════════════════════════════════════════════════════════════════════════

/// A reference to a registered variable (scalar or array).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarRef {
    pub name: String,
    pub ty: IntType,
}

impl VarRef {
    pub fn new(name: impl Into<String>, ty: IntType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Index of an entity in [`crate::Program::entities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u16);

/// Something with a position and a hitbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    /// A registered entity.
    Entity(EntityId),
    /// The slot currently being updated by the named pool.
    PoolSelf(String),
}

/// Readable per-entity fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityField {
    X,
    Y,
    Visible,
    Frame,
}

impl EntityField {
    pub fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Visible => "visible",
            Self::Frame => "frame",
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Input
// ══════════════════════════════════════════════════════════════════════════════

/// Joypad buttons, with the bit values of GBDK's `J_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Self::Right,
        Self::Left,
        Self::Up,
        Self::Down,
        Self::A,
        Self::B,
        Self::Select,
        Self::Start,
    ];

    pub fn mask(self) -> u8 {
        match self {
            Self::Right => 0x01,
            Self::Left => 0x02,
            Self::Up => 0x04,
            Self::Down => 0x08,
            Self::A => 0x10,
            Self::B => 0x20,
            Self::Select => 0x40,
            Self::Start => 0x80,
        }
    }

    /// GBDK constant name.
    pub fn c_name(self) -> &'static str {
        match self {
            Self::Right => "J_RIGHT",
            Self::Left => "J_LEFT",
            Self::Up => "J_UP",
            Self::Down => "J_DOWN",
            Self::A => "J_A",
            Self::B => "J_B",
            Self::Select => "J_SELECT",
            Self::Start => "J_START",
        }
    }
}

/// Level or edge query on a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputQuery {
    Held,
    Pressed,
    Released,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expr
// ══════════════════════════════════════════════════════════════════════════════

/// An expression node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    Var(VarRef),
    /// `array[index % len]`
    Index {
        array: VarRef,
        index: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Input {
        query: InputQuery,
        button: Button,
    },
    EntityField {
        entity: EntityRef,
        field: EntityField,
    },
    /// AABB overlap between two hitboxes.
    Collides {
        a: EntityRef,
        b: EntityRef,
    },
    /// Any active slot of `pool` overlaps `entity`.
    PoolCollides {
        pool: String,
        entity: EntityRef,
    },
    /// Number of active slots in a pool.
    PoolActive(String),
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    // ── Leaves ────────────────────────────────────────────────────────────

    pub fn lit(value: Value) -> Self {
        Self::Literal(value)
    }

    pub fn u8(n: u8) -> Self {
        Self::Literal(Value::u8(n))
    }

    pub fn i8(n: i8) -> Self {
        Self::Literal(Value::i8(n))
    }

    pub fn u16(n: u16) -> Self {
        Self::Literal(Value::u16(n))
    }

    pub fn i16(n: i16) -> Self {
        Self::Literal(Value::i16(n))
    }

    pub fn bool(b: bool) -> Self {
        Self::Literal(Value::bool(b))
    }

    pub fn var(var: VarRef) -> Self {
        Self::Var(var)
    }

    pub fn held(button: Button) -> Self {
        Self::Input {
            query: InputQuery::Held,
            button,
        }
    }

    pub fn pressed(button: Button) -> Self {
        Self::Input {
            query: InputQuery::Pressed,
            button,
        }
    }

    pub fn released(button: Button) -> Self {
        Self::Input {
            query: InputQuery::Released,
            button,
        }
    }

    pub fn field(entity: EntityRef, field: EntityField) -> Self {
        Self::EntityField { entity, field }
    }

    pub fn collides(a: EntityRef, b: EntityRef) -> Self {
        Self::Collides { a, b }
    }

    pub fn pool_collides(pool: impl Into<String>, entity: EntityRef) -> Self {
        Self::PoolCollides {
            pool: pool.into(),
            entity,
        }
    }

    pub fn pool_active(pool: impl Into<String>) -> Self {
        Self::PoolActive(pool.into())
    }

    // ── Operators ─────────────────────────────────────────────────────────

    /// Build a binary node, rejecting operand combinations the target cannot
    /// express.
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Result<Expr, ExprError> {
        Self::check_operands(op, &left, &right)?;
        Ok(Self::node(op, left, right))
    }

    /// The operand checks performed by [`Expr::binary`].
    pub fn check_operands(op: BinOp, left: &Expr, right: &Expr) -> Result<(), ExprError> {
        if op.is_division() && right.as_literal().is_some_and(|v| v.raw == 0) {
            return Err(ExprError::DivisionByZero { op: op.symbol() });
        }
        if op.is_bitwise() {
            for ty in [left.ty(), right.ty()] {
                if ty.is_signed() {
                    return Err(ExprError::SignedBitwise {
                        op: op.symbol(),
                        ty,
                    });
                }
            }
        }
        Ok(())
    }

    fn node(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Add, self, rhs.into())
    }

    pub fn sub(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Sub, self, rhs.into())
    }

    pub fn mul(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Mul, self, rhs.into())
    }

    pub fn div(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        Self::binary(BinOp::Div, self, rhs.into())
    }

    pub fn rem(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        Self::binary(BinOp::Rem, self, rhs.into())
    }

    pub fn bit_and(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        Self::binary(BinOp::BitAnd, self, rhs.into())
    }

    pub fn bit_or(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        Self::binary(BinOp::BitOr, self, rhs.into())
    }

    pub fn bit_xor(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        Self::binary(BinOp::BitXor, self, rhs.into())
    }

    pub fn shl(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        Self::binary(BinOp::Shl, self, rhs.into())
    }

    pub fn shr(self, rhs: impl Into<Expr>) -> Result<Expr, ExprError> {
        Self::binary(BinOp::Shr, self, rhs.into())
    }

    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Eq, self, rhs.into())
    }

    pub fn ne(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Ne, self, rhs.into())
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Lt, self, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Le, self, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Gt, self, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Ge, self, rhs.into())
    }

    pub fn and(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::And, self, rhs.into())
    }

    pub fn or(self, rhs: impl Into<Expr>) -> Expr {
        Self::node(BinOp::Or, self, rhs.into())
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    // ── Inspection ────────────────────────────────────────────────────────

    /// The statically known result type.
    pub fn ty(&self) -> IntType {
        match self {
            Self::Literal(v) => v.ty,
            Self::Var(var) => var.ty,
            Self::Index { array, .. } => array.ty,
            Self::Binary { op, left, right } => op.result_type(left.ty(), right.ty()),
            Self::Not(_)
            | Self::Input { .. }
            | Self::EntityField { .. }
            | Self::Collides { .. }
            | Self::PoolCollides { .. }
            | Self::PoolActive(_) => IntType::U8,
        }
    }

    /// Visit this node and every sub-expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Self::Index { index, .. } => index.walk(visit),
            Self::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::Not(inner) => inner.walk(visit),
            _ => {}
        }
    }

    pub fn as_literal(&self) -> Option<Value> {
        match self {
            Self::Literal(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Self::Literal(v)
    }
}

impl From<u8> for Expr {
    fn from(n: u8) -> Self {
        Self::u8(n)
    }
}

impl From<i8> for Expr {
    fn from(n: i8) -> Self {
        Self::i8(n)
    }
}

impl From<u16> for Expr {
    fn from(n: u16) -> Self {
        Self::u16(n)
    }
}

impl From<i16> for Expr {
    fn from(n: i16) -> Self {
        Self::i16(n)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Self::bool(b)
    }
}

impl From<VarRef> for Expr {
    fn from(var: VarRef) -> Self {
        Self::Var(var)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity#{}", id.0),
            Self::PoolSelf(pool) => write!(f, "{pool}[self]"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Var(var) => write!(f, "{}", var.name),
            Self::Index { array, index } => write!(f, "{}[{index}]", array.name),
            Self::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::Input { query, button } => write!(f, "{query:?}({button:?})"),
            Self::EntityField { entity, field } => write!(f, "{entity}.{}", field.name()),
            Self::Collides { a, b } => write!(f, "collides({a}, {b})"),
            Self::PoolCollides { pool, entity } => write!(f, "collides({pool}, {entity})"),
            Self::PoolActive(pool) => write!(f, "active({pool})"),
        }
    }
}
