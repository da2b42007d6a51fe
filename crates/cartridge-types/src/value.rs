//! Fixed-width integer values with target-exact wraparound.
//!
//! Every arithmetic result is reduced modulo 2^width of its type, exactly as
//! the SM83 registers would hold it. The simulator evaluates through these
//! functions and the code generator emits C whose casts reproduce them.

use serde::{Deserialize, Serialize};
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// IntType
// ══════════════════════════════════════════════════════════════════════════════

/// The four integer types the target supports natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntType {
    U8,
    I8,
    U16,
    I16,
}

impl IntType {
    /// Bit width (8 or 16).
    pub fn bits(self) -> u32 {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::U16 | Self::I16 => 16,
        }
    }

    /// Storage size in bytes.
    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16)
    }

    /// The unsigned type of the same width.
    pub fn unsigned(self) -> Self {
        match self {
            Self::U8 | Self::I8 => Self::U8,
            Self::U16 | Self::I16 => Self::U16,
        }
    }

    /// Smallest representable value.
    pub fn min_value(self) -> i64 {
        match self {
            Self::U8 | Self::U16 => 0,
            Self::I8 => i8::MIN as i64,
            Self::I16 => i16::MIN as i64,
        }
    }

    /// Largest representable value.
    pub fn max_value(self) -> i64 {
        match self {
            Self::U8 => u8::MAX as i64,
            Self::I8 => i8::MAX as i64,
            Self::U16 => u16::MAX as i64,
            Self::I16 => i16::MAX as i64,
        }
    }

    /// Reduce an arbitrary integer into this type's range (two's complement).
    pub fn wrap(self, n: i64) -> i64 {
        match self {
            Self::U8 => n as u8 as i64,
            Self::I8 => n as i8 as i64,
            Self::U16 => n as u16 as i64,
            Self::I16 => n as i16 as i64,
        }
    }

    /// Result type of a binary operator applied to `self` and `other`.
    ///
    /// The wider operand wins; at equal width the unsigned operand wins.
    pub fn unify(self, other: Self) -> Self {
        match self.bits().cmp(&other.bits()) {
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Equal => {
                if self.is_signed() && other.is_signed() {
                    self
                } else {
                    self.unsigned()
                }
            }
        }
    }

    /// The C type name used by the code generator.
    pub fn c_name(self) -> &'static str {
        match self {
            Self::U8 => "uint8_t",
            Self::I8 => "int8_t",
            Self::U16 => "uint16_t",
            Self::I16 => "int16_t",
        }
    }

    /// Short suffix used for per-type runtime helpers (`u8`, `i16`, …).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
        }
    }

    pub const ALL: [IntType; 4] = [Self::U8, Self::I8, Self::U16, Self::I16];
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Comparison and logical operators yield a `U8` boolean.
    pub fn is_boolean(self) -> bool {
        self.is_comparison() || matches!(self, Self::And | Self::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Bitwise and shift operators, which require unsigned operands.
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            Self::BitAnd | Self::BitOr | Self::BitXor | Self::Shl | Self::Shr
        )
    }

    pub fn is_division(self) -> bool {
        matches!(self, Self::Div | Self::Rem)
    }

    /// The C spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    /// Type produced when applied to operands of the given types.
    pub fn result_type(self, left: IntType, right: IntType) -> IntType {
        if self.is_boolean() {
            IntType::U8
        } else if matches!(self, Self::Shl | Self::Shr) {
            left
        } else {
            left.unify(right)
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Value
// ══════════════════════════════════════════════════════════════════════════════

/// A typed integer whose `raw` is always in range for `ty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value {
    pub ty: IntType,
    pub raw: i64,
}

impl Value {
    /// Create a value, wrapping `n` into range.
    pub fn new(ty: IntType, n: i64) -> Self {
        Self { ty, raw: ty.wrap(n) }
    }

    pub fn u8(n: u8) -> Self {
        Self::new(IntType::U8, n as i64)
    }

    pub fn i8(n: i8) -> Self {
        Self::new(IntType::I8, n as i64)
    }

    pub fn u16(n: u16) -> Self {
        Self::new(IntType::U16, n as i64)
    }

    pub fn i16(n: i16) -> Self {
        Self::new(IntType::I16, n as i64)
    }

    /// Boolean as a `U8` 0/1.
    pub fn bool(b: bool) -> Self {
        Self::u8(b as u8)
    }

    pub fn zero(ty: IntType) -> Self {
        Self { ty, raw: 0 }
    }

    /// C-style conversion into another type.
    pub fn cast(self, ty: IntType) -> Self {
        Self::new(ty, self.raw)
    }

    pub fn is_truthy(self) -> bool {
        self.raw != 0
    }

    /// The bit pattern of this value as an unsigned integer of the same width.
    pub fn bits(self) -> u16 {
        self.raw as u16 & if self.ty.bits() == 8 { 0xFF } else { 0xFFFF }
    }

    /// Little-endian bytes of this value (1 or 2 bytes).
    pub fn to_le_bytes(self) -> Vec<u8> {
        let bits = self.bits();
        match self.ty.bytes() {
            1 => vec![bits as u8],
            _ => bits.to_le_bytes().to_vec(),
        }
    }

    /// Rebuild a value from little-endian bytes.
    pub fn from_le_bytes(ty: IntType, bytes: &[u8]) -> Self {
        let raw = match bytes {
            [lo] => *lo as i64,
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]) as i64,
            [] => 0,
        };
        Self::new(ty, raw)
    }

    /// Apply a binary operator to two already-evaluated operands.
    ///
    /// `And`/`Or` see both values here; evaluators that walk expression
    /// trees short-circuit before calling this.
    pub fn binary(op: BinOp, left: Value, right: Value) -> Value {
        let ty = left.ty.unify(right.ty);
        let a = left.cast(ty).raw;
        let b = right.cast(ty).raw;
        match op {
            BinOp::Shl | BinOp::Shr => {
                let amount = right.cast(IntType::U8).raw as u32;
                let out = if amount >= left.ty.bits() {
                    0
                } else if op == BinOp::Shl {
                    left.raw << amount
                } else {
                    (left.bits() as i64) >> amount
                };
                Value::new(left.ty, out)
            }
            BinOp::And => Value::bool(left.is_truthy() && right.is_truthy()),
            BinOp::Or => Value::bool(left.is_truthy() || right.is_truthy()),
            BinOp::Add => Value::new(ty, a + b),
            BinOp::Sub => Value::new(ty, a - b),
            BinOp::Mul => Value::new(ty, a * b),
            BinOp::Div if b == 0 => Value::zero(ty),
            BinOp::Div => Value::new(ty, a / b),
            BinOp::Rem if b == 0 => Value::zero(ty),
            BinOp::Rem => Value::new(ty, a % b),
            BinOp::BitAnd => Value::new(ty, a & b),
            BinOp::BitOr => Value::new(ty, a | b),
            BinOp::BitXor => Value::new(ty, a ^ b),
            BinOp::Eq => Value::bool(a == b),
            BinOp::Ne => Value::bool(a != b),
            BinOp::Lt => Value::bool(a < b),
            BinOp::Le => Value::bool(a <= b),
            BinOp::Gt => Value::bool(a > b),
            BinOp::Ge => Value::bool(a >= b),
        }
    }

    /// Logical negation.
    pub fn not(self) -> Value {
        Value::bool(!self.is_truthy())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.raw, self.ty)
    }
}
