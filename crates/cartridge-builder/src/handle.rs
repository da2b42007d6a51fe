//! Typed handles returned by registrations.
//!
//! Handles are the only way user code refers to registered things, so an
//! expression built from a handle always names something that exists.

use cartridge_types::{EntityField, EntityId, EntityRef, Expr, IntType, Place, VarRef};

/// A scalar variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarHandle {
    pub(crate) var: VarRef,
}

impl VarHandle {
    pub fn name(&self) -> &str {
        &self.var.name
    }

    pub fn ty(&self) -> IntType {
        self.var.ty
    }

    /// Read the variable.
    pub fn get(&self) -> Expr {
        Expr::Var(self.var.clone())
    }

    pub fn place(&self) -> Place {
        Place::Var(self.var.clone())
    }
}

impl From<&VarHandle> for Expr {
    fn from(h: &VarHandle) -> Self {
        h.get()
    }
}

impl From<&VarHandle> for Place {
    fn from(h: &VarHandle) -> Self {
        h.place()
    }
}

/// A fixed-length array variable. Indices wrap modulo the length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayHandle {
    pub(crate) var: VarRef,
    pub(crate) len: u16,
}

impl ArrayHandle {
    pub fn name(&self) -> &str {
        &self.var.name
    }

    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: impl Into<Expr>) -> Expr {
        Expr::Index {
            array: self.var.clone(),
            index: Box::new(index.into()),
        }
    }

    pub fn at(&self, index: impl Into<Expr>) -> Place {
        Place::Index {
            array: self.var.clone(),
            index: index.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteHandle {
    pub(crate) name: String,
}

impl SpriteHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHandle {
    pub(crate) id: EntityId,
    pub(crate) name: String,
}

impl EntityHandle {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::Entity(self.id)
    }

    pub fn x(&self) -> Expr {
        Expr::field(self.reference(), EntityField::X)
    }

    pub fn y(&self) -> Expr {
        Expr::field(self.reference(), EntityField::Y)
    }

    pub fn visible(&self) -> Expr {
        Expr::field(self.reference(), EntityField::Visible)
    }

    pub fn frame(&self) -> Expr {
        Expr::field(self.reference(), EntityField::Frame)
    }

    pub fn collides_with(&self, other: impl Into<EntityRef>) -> Expr {
        Expr::collides(self.reference(), other.into())
    }
}

impl From<&EntityHandle> for EntityRef {
    fn from(h: &EntityHandle) -> Self {
        h.reference()
    }
}

/// A pool. `this*` accessors are only valid inside the pool's own update
/// block and despawn predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHandle {
    pub(crate) name: String,
}

impl PoolHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The slot being updated.
    pub fn this(&self) -> EntityRef {
        EntityRef::PoolSelf(self.name.clone())
    }

    pub fn this_x(&self) -> Expr {
        Expr::field(self.this(), EntityField::X)
    }

    pub fn this_y(&self) -> Expr {
        Expr::field(self.this(), EntityField::Y)
    }

    /// Number of active slots.
    pub fn active(&self) -> Expr {
        Expr::pool_active(self.name.clone())
    }

    /// Any active slot overlaps `entity`.
    pub fn hits(&self, entity: impl Into<EntityRef>) -> Expr {
        Expr::pool_collides(self.name.clone(), entity.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneHandle {
    pub(crate) name: String,
}

impl SceneHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveHandle {
    pub(crate) name: String,
}

impl SaveHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}
