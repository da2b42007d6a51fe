//! Append-only catalogs populated while a game description is recorded.
//!
//! Registries only validate identity and capacity. They never touch the
//! filesystem; asset paths are resolved later by the asset collaborator.

use cartridge_types::{
    Asset, BuildErrorKind, Entity, EntityId, Pool, SaveRecord, Scene, Sprite, Variable,
    OAM_CAPACITY,
};

/// Number of sprite tiles addressable from OAM.
pub const SPRITE_TILE_CAPACITY: u16 = 256;

/// C keywords, which cannot name generated globals.
const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while",
];

/// Prefixes of identifiers the code generator derives on its own.
const RESERVED_PREFIXES: &[&str] = &["cart_", "scene_", "pool_", "save_", "ent_", "anim_"];

/// Check that `name` is a C identifier that cannot collide with generated
/// names.
pub fn validate_name(name: &str) -> Result<(), BuildErrorKind> {
    let mut chars = name.chars();
    let lexical = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    let lower = name.to_ascii_lowercase();
    let valid = lexical
        && !C_KEYWORDS.contains(&name)
        && !RESERVED_PREFIXES.iter().any(|p| lower.starts_with(p));
    if valid {
        Ok(())
    } else {
        Err(BuildErrorKind::InvalidName(name.to_string()))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Variables
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct VariableRegistry {
    vars: Vec<Variable>,
}

impl VariableRegistry {
    /// Register a variable. A second registration under the same name fails
    /// regardless of type or initial value.
    pub fn register(&mut self, var: Variable) -> Result<(), BuildErrorKind> {
        if self.get(&var.name).is_some() {
            return Err(BuildErrorKind::DuplicateVariable(var.name));
        }
        validate_name(&var.name)?;
        self.vars.push(var);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn into_vec(self) -> Vec<Variable> {
        self.vars
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Sprites & OAM
// ══════════════════════════════════════════════════════════════════════════════

/// Sprite graphics plus the OAM slot allocator.
///
/// Slots are granted monotonically and never reused within one program.
#[derive(Debug, Default)]
pub struct SpriteRegistry {
    sprites: Vec<Sprite>,
    next_slot: usize,
    next_tile: u16,
}

impl SpriteRegistry {
    /// Grant the next OAM slot.
    pub fn allocate_slot(&mut self) -> Result<u8, BuildErrorKind> {
        self.allocate_slots(1)
    }

    /// Grant `count` consecutive OAM slots and return the first. Nothing is
    /// granted when the request does not fit.
    pub fn allocate_slots(&mut self, count: usize) -> Result<u8, BuildErrorKind> {
        if self.next_slot + count > OAM_CAPACITY {
            return Err(BuildErrorKind::SlotExhausted(OAM_CAPACITY));
        }
        let base = self.next_slot as u8;
        self.next_slot += count;
        Ok(base)
    }

    /// Number of slots granted so far.
    pub fn slots_allocated(&self) -> usize {
        self.next_slot
    }

    /// Register sprite graphics, assigning the next free tile range.
    pub fn register(&mut self, mut sprite: Sprite) -> Result<(), BuildErrorKind> {
        if self.get(&sprite.name).is_some() {
            return Err(BuildErrorKind::DuplicateSymbol {
                kind: "sprite",
                name: sprite.name,
            });
        }
        validate_name(&sprite.name)?;
        if self.sprites.iter().any(|s| s.size != sprite.size) {
            return Err(BuildErrorKind::MixedSpriteSizes(sprite.name));
        }
        let tiles = sprite.tile_count();
        if self.next_tile + tiles > SPRITE_TILE_CAPACITY {
            return Err(BuildErrorKind::TilesExhausted(sprite.name));
        }
        sprite.tile_base = self.next_tile as u8;
        self.next_tile += tiles;
        self.sprites.push(sprite);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.name == name)
    }

    pub fn into_vec(self) -> Vec<Sprite> {
        self.sprites
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Entities
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
}

impl EntityRegistry {
    /// Insert an entity, assigning its id.
    pub fn insert(&mut self, mut entity: Entity) -> Result<EntityId, BuildErrorKind> {
        if self.by_name(&entity.name).is_some() {
            return Err(BuildErrorKind::DuplicateSymbol {
                kind: "entity",
                name: entity.name,
            });
        }
        validate_name(&entity.name)?;
        let id = EntityId(self.entities.len() as u16);
        entity.id = id;
        self.entities.push(entity);
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0 as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// All entities carrying `tag`, in insertion order.
    pub fn tagged(&self, tag: &str) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.tags.iter().any(|t| t == tag))
            .collect()
    }

    pub fn into_vec(self) -> Vec<Entity> {
        self.entities
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Assets
// ══════════════════════════════════════════════════════════════════════════════

/// Logical asset paths, deduplicated, in first-seen order.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
}

impl AssetRegistry {
    pub fn record(&mut self, path: &str) {
        if !self.assets.iter().any(|a| a.path == path) {
            self.assets.push(Asset {
                path: path.to_string(),
            });
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.path.as_str())
    }

    pub fn into_vec(self) -> Vec<Asset> {
        self.assets
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Named catalogs (scenes, pools, save records)
// ══════════════════════════════════════════════════════════════════════════════

/// A record identified by a unique name.
pub trait Named {
    const KIND: &'static str;
    fn name(&self) -> &str;
}

impl Named for Scene {
    const KIND: &'static str = "scene";
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Pool {
    const KIND: &'static str = "pool";
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for SaveRecord {
    const KIND: &'static str = "save record";
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct Catalog<T> {
    items: Vec<T>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Named> Catalog<T> {
    /// Fail if `name` is taken or not an identifier.
    pub fn check_available(&self, name: &str) -> Result<(), BuildErrorKind> {
        if self.contains(name) {
            return Err(BuildErrorKind::DuplicateSymbol {
                kind: T::KIND,
                name: name.to_string(),
            });
        }
        validate_name(name)
    }

    pub fn insert(&mut self, item: T) -> Result<(), BuildErrorKind> {
        self.check_available(item.name())?;
        self.items.push(item);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.iter().find(|i| i.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}
