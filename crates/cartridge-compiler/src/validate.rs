//! Scene-graph validation.
//!
//! Every `go_to` is an edge from the scene whose block contains it. A
//! `go_to` inside a pool's update block can fire from any scene, so its
//! target is an edge from every scene.

use std::collections::VecDeque;
use std::fmt;

use cartridge_types::stmt::walk_block;
use cartridge_types::{Hook, Program, Stmt};
use serde::{Deserialize, Serialize};

/// A scene-graph finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A `go_to` names a scene that does not exist.
    DanglingGoTo { context: String, target: String },
    /// No chain of `go_to`s leads from the start scene to this scene.
    UnreachableScene { scene: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingGoTo { context, target } => {
                write!(f, "{context}: go_to unknown scene '{target}'")
            }
            Self::UnreachableScene { scene } => {
                write!(f, "scene '{scene}' is unreachable from the start scene")
            }
        }
    }
}

fn go_to_targets(block: &[Stmt]) -> Vec<&str> {
    let mut targets = Vec::new();
    walk_block(block, &mut |stmt| {
        if let Stmt::GoTo(target) = stmt {
            targets.push(target.as_str());
        }
    });
    targets
}

/// Find dangling `go_to` targets and scenes unreachable from the start
/// scene, in declaration order.
pub fn check_scene_graph(program: &Program) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); program.scenes.len()];
    let mut global = Vec::new();

    for (i, scene) in program.scenes.iter().enumerate() {
        for hook in Hook::ALL {
            for target in go_to_targets(scene.block(hook)) {
                match program.scene_index(target) {
                    Some(to) => edges[i].push(to),
                    None => diagnostics.push(Diagnostic::DanglingGoTo {
                        context: format!("scene '{}' {}", scene.name, hook.name()),
                        target: target.to_string(),
                    }),
                }
            }
        }
    }
    for pool in &program.pools {
        for target in go_to_targets(&pool.update) {
            match program.scene_index(target) {
                Some(to) => global.push(to),
                None => diagnostics.push(Diagnostic::DanglingGoTo {
                    context: format!("pool '{}' update", pool.name),
                    target: target.to_string(),
                }),
            }
        }
    }

    // A missing start scene is a codegen error; reachability is meaningless
    // without one.
    let Some(start) = program.scene_index(&program.start_scene) else {
        return diagnostics;
    };
    let mut reached = vec![false; program.scenes.len()];
    let mut queue = VecDeque::from([start]);
    reached[start] = true;
    while let Some(at) = queue.pop_front() {
        for &to in edges[at].iter().chain(&global) {
            if !reached[to] {
                reached[to] = true;
                queue.push_back(to);
            }
        }
    }
    for (scene, _) in program
        .scenes
        .iter()
        .zip(&reached)
        .filter(|(_, reached)| !**reached)
    {
        diagnostics.push(Diagnostic::UnreachableScene {
            scene: scene.name.clone(),
        });
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartridge_types::{Expr, Pool, Scene};

    fn scene(name: &str, frame: Vec<Stmt>) -> Scene {
        Scene {
            name: name.into(),
            enter: vec![],
            exit: vec![],
            frame,
            location: None,
        }
    }

    fn program(scenes: Vec<Scene>) -> Program {
        Program {
            name: "graph".into(),
            variables: vec![],
            sprites: vec![],
            entities: vec![],
            pools: vec![],
            start_scene: scenes[0].name.clone(),
            scenes,
            assets: vec![],
            save_records: vec![],
        }
    }

    fn go_to(target: &str) -> Stmt {
        Stmt::GoTo(target.into())
    }

    #[test]
    fn connected_graph_is_clean() {
        let p = program(vec![
            scene("title", vec![go_to("play")]),
            scene("play", vec![go_to("over")]),
            scene("over", vec![go_to("title")]),
        ]);
        assert!(check_scene_graph(&p).is_empty());
    }

    #[test]
    fn nested_go_to_counts_as_edge() {
        let p = program(vec![
            scene(
                "title",
                vec![Stmt::If {
                    condition: Expr::bool(true),
                    then_body: vec![],
                    else_body: vec![go_to("play")],
                }],
            ),
            scene("play", vec![]),
        ]);
        assert!(check_scene_graph(&p).is_empty());
    }

    #[test]
    fn dangling_target_names_its_hook() {
        let mut title = scene("title", vec![]);
        title.exit.push(go_to("nowhere"));
        let p = program(vec![title]);
        assert_eq!(
            check_scene_graph(&p),
            vec![Diagnostic::DanglingGoTo {
                context: "scene 'title' exit".into(),
                target: "nowhere".into(),
            }]
        );
    }

    #[test]
    fn unreachable_scenes_in_declaration_order() {
        let p = program(vec![
            scene("title", vec![]),
            scene("orphan", vec![go_to("title")]),
            scene("credits", vec![]),
        ]);
        let found: Vec<String> = check_scene_graph(&p).iter().map(|d| d.to_string()).collect();
        assert_eq!(
            found,
            vec![
                "scene 'orphan' is unreachable from the start scene",
                "scene 'credits' is unreachable from the start scene",
            ]
        );
    }

    #[test]
    fn pool_go_to_is_reachable_from_every_scene() {
        let mut p = program(vec![scene("play", vec![]), scene("over", vec![])]);
        p.pools.push(Pool {
            name: "enemies".into(),
            capacity: 2,
            sprite: None,
            hitbox: None,
            update: vec![go_to("over")],
            despawn_when: vec![],
            oam_base: None,
        });
        assert!(check_scene_graph(&p).is_empty());
    }

    #[test]
    fn missing_start_skips_reachability() {
        let mut p = program(vec![scene("a", vec![]), scene("b", vec![])]);
        p.start_scene = "missing".into();
        assert!(check_scene_graph(&p).is_empty());
    }

    #[test]
    fn diagnostics_serialize_with_kind_tag() {
        let d = Diagnostic::UnreachableScene {
            scene: "credits".into(),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"kind":"unreachable_scene","scene":"credits"}"#);
    }
}
