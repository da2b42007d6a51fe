//! Statement nodes.
//!
//! Statements in a block run top to bottom. Conditionals own their bodies;
//! both backends lower them to nested branches in the same function.

use crate::expr::{EntityRef, Expr, VarRef};
use crate::value::{BinOp, IntType};
use serde::{Deserialize, Serialize};

/// An assignable location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Place {
    Var(VarRef),
    /// `array[index % len]`
    Index { array: VarRef, index: Expr },
}

impl Place {
    pub fn ty(&self) -> IntType {
        match self {
            Self::Var(var) => var.ty,
            Self::Index { array, .. } => array.ty,
        }
    }

    /// Name of the underlying variable.
    pub fn name(&self) -> &str {
        match self {
            Self::Var(var) => &var.name,
            Self::Index { array, .. } => &array.name,
        }
    }

    /// The expression reading this place's current value.
    pub fn read(&self) -> Expr {
        match self {
            Self::Var(var) => Expr::Var(var.clone()),
            Self::Index { array, index } => Expr::Index {
                array: array.clone(),
                index: Box::new(index.clone()),
            },
        }
    }
}

/// Mutation applied to an entity (or the current pool slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOp {
    SetX(Expr),
    SetY(Expr),
    /// Deltas are converted to `u8` and added modulo 256.
    MoveBy { dx: Expr, dy: Expr },
    Show,
    Hide,
    /// Switch to the named animation of the entity's sprite, from frame 0.
    Play(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolOp {
    Spawn { pool: String, x: Expr, y: Expr },
    Clear(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOp {
    Store(String),
    Load(String),
}

/// A recorded statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Assign {
        target: Place,
        value: Expr,
    },
    /// `target = (T)(target op value)`
    CompoundAssign {
        target: Place,
        op: BinOp,
        value: Expr,
    },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// Request a scene transition at the end of the current tick.
    GoTo(String),
    Entity {
        target: EntityRef,
        op: EntityOp,
    },
    Pool(PoolOp),
    Save(SaveOp),
}

impl Stmt {
    /// Expressions this statement evaluates itself, excluding those of
    /// nested statements.
    pub fn exprs(&self) -> Vec<&Expr> {
        fn place_index(place: &Place) -> Option<&Expr> {
            match place {
                Place::Var(_) => None,
                Place::Index { index, .. } => Some(index),
            }
        }
        match self {
            Stmt::Assign { target, value } | Stmt::CompoundAssign { target, value, .. } => {
                place_index(target).into_iter().chain([value]).collect()
            }
            Stmt::If { condition, .. } => vec![condition],
            Stmt::Entity { op, .. } => match op {
                EntityOp::SetX(e) | EntityOp::SetY(e) => vec![e],
                EntityOp::MoveBy { dx, dy } => vec![dx, dy],
                EntityOp::Show | EntityOp::Hide | EntityOp::Play(_) => vec![],
            },
            Stmt::Pool(PoolOp::Spawn { x, y, .. }) => vec![x, y],
            Stmt::GoTo(_) | Stmt::Pool(PoolOp::Clear(_)) | Stmt::Save(_) => vec![],
        }
    }

    /// Visit this statement and every nested statement, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Stmt)) {
        visit(self);
        if let Stmt::If {
            then_body,
            else_body,
            ..
        } = self
        {
            for stmt in then_body.iter().chain(else_body) {
                stmt.walk(visit);
            }
        }
    }
}

/// Visit every statement in a block, depth first.
pub fn walk_block<'a>(block: &'a [Stmt], visit: &mut impl FnMut(&'a Stmt)) {
    for stmt in block {
        stmt.walk(visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_visits_nested_bodies_in_order() {
        let block = vec![
            Stmt::GoTo("a".into()),
            Stmt::If {
                condition: Expr::bool(true),
                then_body: vec![Stmt::GoTo("b".into())],
                else_body: vec![Stmt::If {
                    condition: Expr::bool(false),
                    then_body: vec![Stmt::GoTo("c".into())],
                    else_body: vec![],
                }],
            },
        ];
        let mut seen = Vec::new();
        walk_block(&block, &mut |s| {
            if let Stmt::GoTo(t) = s {
                seen.push(t.as_str());
            }
        });
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn exprs_cover_place_index_and_value() {
        let stmt = Stmt::Assign {
            target: Place::Index {
                array: VarRef::new("hp", IntType::U8),
                index: Expr::u8(1),
            },
            value: Expr::u8(9),
        };
        assert_eq!(stmt.exprs(), vec![&Expr::u8(1), &Expr::u8(9)]);
        assert!(Stmt::GoTo("a".into()).exprs().is_empty());
    }

    #[test]
    fn place_read_mirrors_target() {
        let place = Place::Index {
            array: VarRef::new("hp", IntType::U8),
            index: Expr::u8(2),
        };
        assert_eq!(place.ty(), IntType::U8);
        assert_eq!(place.name(), "hp");
        assert!(matches!(place.read(), Expr::Index { .. }));
    }
}
