//! Naming conventions for generated C identifiers.
//!
//! Every name derives from a registered name plus a fixed prefix or suffix,
//! so the output is stable for an unchanged program.

use cartridge_types::Hook;

/// `scene_<name>_<hook>`
pub fn scene_fn(scene: &str, hook: Hook) -> String {
    format!("scene_{scene}_{}", hook.name())
}

/// `SCENE_<name>`
pub fn scene_id(scene: &str) -> String {
    format!("SCENE_{scene}")
}

/// `ENT_<name>`
pub fn entity_id(entity: &str) -> String {
    format!("ENT_{entity}")
}

/// `ANIM_<sprite>_<animation>`
pub fn anim_id(sprite: &str, animation: &str) -> String {
    format!("ANIM_{sprite}_{animation}")
}

/// `<sprite>_tiles`, the tile data produced by the asset pipeline.
pub fn sprite_tiles(sprite: &str) -> String {
    format!("{sprite}_tiles")
}

/// `pool_<name>_<member>` for pool state arrays and helpers.
pub fn pool_member(pool: &str, member: &str) -> String {
    format!("pool_{pool}_{member}")
}

/// `save_<record>_<op>`
pub fn save_fn(record: &str, op: &str) -> String {
    format!("save_{record}_{op}")
}

/// Entity state array for a field: `ent_<field>`.
pub fn entity_array(field: &str) -> String {
    format!("ent_{field}")
}

/// Loop variable naming the slot inside a pool update.
pub const POOL_SLOT: &str = "cart_slot";

/// Sentinel for "no scene transition pending".
pub const NO_SCENE: &str = "CART_NO_SCENE";

/// Sentinel for "no animation playing".
pub const NO_ANIM: &str = "CART_NO_ANIM";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_function_names() {
        assert_eq!(scene_fn("title", Hook::Enter), "scene_title_enter");
        assert_eq!(scene_fn("title", Hook::Exit), "scene_title_exit");
        assert_eq!(scene_fn("title", Hook::Frame), "scene_title_frame");
        assert_eq!(scene_id("title"), "SCENE_title");
    }

    #[test]
    fn derived_names() {
        assert_eq!(pool_member("bullets", "spawn"), "pool_bullets_spawn");
        assert_eq!(anim_id("hero", "walk"), "ANIM_hero_walk");
        assert_eq!(save_fn("progress", "store"), "save_progress_store");
        assert_eq!(entity_array("x"), "ent_x");
    }
}
