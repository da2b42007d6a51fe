//! The Program IR: the finished aggregate handed to both backends.
//!
//! All collections keep registration order. Nothing here is mutated after
//! the builder finishes; backends take `&Program`.

use crate::expr::{EntityId, Expr};
use crate::location::SourceLocation;
use crate::stmt::Stmt;
use crate::value::{IntType, Value};
use serde::{Deserialize, Serialize};

/// Number of hardware sprite attribute entries.
pub const OAM_CAPACITY: usize = 40;

// ══════════════════════════════════════════════════════════════════════════════
// Variables
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    Scalar,
    Array(u16),
}

impl Storage {
    /// Number of elements (1 for scalars).
    pub fn len(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Array(n) => n as usize,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, Self::Array(_))
    }
}

/// A global variable. `initial` has exactly `storage.len()` elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: IntType,
    pub storage: Storage,
    pub initial: Vec<Value>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Sprites
// ══════════════════════════════════════════════════════════════════════════════

/// Hardware sprite modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpriteSize {
    Square8,
    Tall16,
}

impl SpriteSize {
    pub fn from_pixels(width: u8, height: u8) -> Option<Self> {
        match (width, height) {
            (8, 8) => Some(Self::Square8),
            (8, 16) => Some(Self::Tall16),
            _ => None,
        }
    }

    pub fn width(self) -> u8 {
        8
    }

    pub fn height(self) -> u8 {
        match self {
            Self::Square8 => 8,
            Self::Tall16 => 16,
        }
    }

    pub fn tiles_per_frame(self) -> u8 {
        match self {
            Self::Square8 => 1,
            Self::Tall16 => 2,
        }
    }
}

/// A named run of frames, advanced every `speed` ticks and looping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    pub name: String,
    pub start: u8,
    pub length: u8,
    pub speed: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub name: String,
    /// Logical asset path, resolved by the asset collaborator.
    pub asset: String,
    pub size: SpriteSize,
    pub frames: u8,
    /// First VRAM tile of this sprite's frames.
    pub tile_base: u8,
    pub animations: Vec<Animation>,
}

impl Sprite {
    pub fn animation(&self, name: &str) -> Option<(usize, &Animation)> {
        self.animations
            .iter()
            .enumerate()
            .find(|(_, a)| a.name == name)
    }

    pub fn tile_count(&self) -> u16 {
        self.frames as u16 * self.size.tiles_per_frame() as u16
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Entities & pools
// ══════════════════════════════════════════════════════════════════════════════

/// Collision rectangle relative to the owner's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hitbox {
    pub dx: u8,
    pub dy: u8,
    pub w: u8,
    pub h: u8,
}

impl Hitbox {
    pub fn new(dx: u8, dy: u8, w: u8, h: u8) -> Self {
        Self { dx, dy, w, h }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub x: u8,
    pub y: u8,
    pub visible: bool,
    pub sprite: Option<String>,
    pub hitbox: Option<Hitbox>,
    pub tags: Vec<String>,
    pub oam_slot: Option<u8>,
}

/// Fixed-capacity set of reusable slots sharing one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    pub capacity: u8,
    pub sprite: Option<String>,
    pub hitbox: Option<Hitbox>,
    /// Runs for each active slot every tick.
    pub update: Vec<Stmt>,
    /// A slot is freed when any predicate holds after its update.
    pub despawn_when: Vec<Expr>,
    /// First OAM slot; the pool owns `capacity` consecutive slots.
    pub oam_base: Option<u8>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Scenes, assets, save records
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    pub enter: Vec<Stmt>,
    pub exit: Vec<Stmt>,
    pub frame: Vec<Stmt>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<SourceLocation>,
}

/// Scene lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hook {
    Enter,
    Exit,
    Frame,
}

impl Hook {
    pub const ALL: [Hook; 3] = [Self::Enter, Self::Exit, Self::Frame];

    pub fn name(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Frame => "frame",
        }
    }
}

impl Scene {
    pub fn block(&self, hook: Hook) -> &[Stmt] {
        match hook {
            Hook::Enter => &self.enter,
            Hook::Exit => &self.exit,
            Hook::Frame => &self.frame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub path: String,
}

/// A group of variables persisted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub name: String,
    pub fields: Vec<String>,
    pub version: u8,
}

// ══════════════════════════════════════════════════════════════════════════════
// Program
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub variables: Vec<Variable>,
    pub sprites: Vec<Sprite>,
    pub entities: Vec<Entity>,
    pub pools: Vec<Pool>,
    pub scenes: Vec<Scene>,
    pub assets: Vec<Asset>,
    pub save_records: Vec<SaveRecord>,
    pub start_scene: String,
}

impl Program {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.name == name)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0 as usize)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn pool(&self, name: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.name == name)
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name == name)
    }

    pub fn scene_index(&self, name: &str) -> Option<usize> {
        self.scenes.iter().position(|s| s.name == name)
    }

    pub fn save_record(&self, name: &str) -> Option<&SaveRecord> {
        self.save_records.iter().find(|r| r.name == name)
    }

    /// Effective hitbox of an entity: explicit, else the sprite's pixel box.
    pub fn entity_hitbox(&self, entity: &Entity) -> Option<Hitbox> {
        self.resolve_hitbox(entity.hitbox, entity.sprite.as_deref())
    }

    /// Effective hitbox shared by all slots of a pool.
    pub fn pool_hitbox(&self, pool: &Pool) -> Option<Hitbox> {
        self.resolve_hitbox(pool.hitbox, pool.sprite.as_deref())
    }

    fn resolve_hitbox(&self, explicit: Option<Hitbox>, sprite: Option<&str>) -> Option<Hitbox> {
        explicit.or_else(|| {
            let sprite = self.sprite(sprite?)?;
            Some(Hitbox::new(0, 0, sprite.size.width(), sprite.size.height()))
        })
    }

    /// Pretty JSON rendering of the IR, for fixtures and debugging.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_with_sprite() -> Program {
        Program {
            name: "t".into(),
            variables: vec![],
            sprites: vec![Sprite {
                name: "hero".into(),
                asset: "hero.png".into(),
                size: SpriteSize::Tall16,
                frames: 4,
                tile_base: 0,
                animations: vec![Animation {
                    name: "walk".into(),
                    start: 0,
                    length: 4,
                    speed: 8,
                }],
            }],
            entities: vec![Entity {
                id: EntityId(0),
                name: "player".into(),
                x: 10,
                y: 20,
                visible: true,
                sprite: Some("hero".into()),
                hitbox: None,
                tags: vec![],
                oam_slot: Some(0),
            }],
            pools: vec![],
            scenes: vec![],
            assets: vec![],
            save_records: vec![],
            start_scene: "main".into(),
        }
    }

    #[test]
    fn hitbox_defaults_to_sprite_size() {
        let p = program_with_sprite();
        let hb = p.entity_hitbox(&p.entities[0]).unwrap();
        assert_eq!(hb, Hitbox::new(0, 0, 8, 16));
    }

    #[test]
    fn sprite_tile_count() {
        let p = program_with_sprite();
        assert_eq!(p.sprites[0].tile_count(), 8);
        assert_eq!(p.sprites[0].animation("walk").map(|(i, _)| i), Some(0));
    }

    #[test]
    fn json_round_trip() {
        let p = program_with_sprite();
        let back: Program = serde_json::from_str(&p.to_json()).unwrap();
        assert_eq!(back, p);
    }
}
