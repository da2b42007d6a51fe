//! Axis-aligned rectangles for collision tests.

use cartridge_types::Hitbox;
use serde::{Deserialize, Serialize};

/// An AABB in screen pixels. Coordinates are `i32` so boxes near the 255
/// edge extend past it instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// The hitbox of something positioned at (`x`, `y`).
    pub fn from_hitbox(x: u8, y: u8, hitbox: Hitbox) -> Self {
        Self {
            x: x as i32 + hitbox.dx as i32,
            y: y as i32 + hitbox.dy as i32,
            w: hitbox.w as i32,
            h: hitbox.h as i32,
        }
    }

    /// Strictly positive overlap on both axes; shared edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}
