//! Integration tests for the simulator.
//!
//! Tests validate:
//! - input edge detection
//! - tick ordering: frame block, pool update then cull, transitions
//! - pool capacity and spawn rejection
//! - coordinate wraparound, animation stepping, collision
//! - save store/load through simulated SRAM
//! - the scenario harness
//! - determinism

use cartridge_builder::{build, Block, EntitySpec, SpriteSpec, VarHandle};
use cartridge_sim::{
    run_scenarios, Buttons, Rect, Scenario, ScenarioFailure, SimError, SimEvent, Simulator,
    SpawnOutcome,
};
use cartridge_types::{BuildResult, Button, Expr, Hitbox, IntType, Program, Value, VarRef};
use proptest::prelude::*;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const NONE: Buttons = Buttons::NONE;

fn press(button: Button) -> Buttons {
    Buttons::from(button)
}

fn u8_of(sim: &Simulator<'_>, name: &str) -> u8 {
    match sim.variable(name) {
        Some(v) => v.raw as u8,
        None => panic!("no variable '{name}'"),
    }
}

/// `trace = trace * 10 + digit`, to record hook order.
fn push_digit(b: &mut Block<'_>, trace: &VarHandle, digit: u8) -> BuildResult<()> {
    let next = trace.get().mul(10u8).add(digit);
    b.assign(trace, next)
}

fn score_game() -> Program {
    build("score", |g| {
        let score = g.u8_var("score", 0)?;
        g.scene("main", |s| {
            s.on_frame(|b| b.when(Expr::pressed(Button::A), |b| b.add_assign(&score, 10u8)))
        })?;
        Ok(())
    })
    .unwrap()
}

/// Pool of bullets moving up 4px per tick, freed above y = 8.
fn bullets_game(capacity: u8) -> Program {
    build("bullets", |g| {
        let updates = g.u8_var("updates", 0)?;
        let bullets = g.pool("bullets", capacity, |p| {
            let me = p.handle();
            p.hitbox(Hitbox::new(0, 0, 2, 4));
            p.on_update(|b| {
                b.add_assign(&updates, 1u8)?;
                b.move_by(me.this(), 0u8, Expr::i8(-4))
            })?;
            p.despawn_when(me.this_y().lt(8u8))
        })?;
        g.scene("main", |s| {
            s.on_frame(|b| b.when(Expr::pressed(Button::A), |b| b.spawn(&bullets, 10u8, 12u8)))
        })?;
        Ok(())
    })
    .unwrap()
}

// ══════════════════════════════════════════════════════════════════════════════
// Input & the score scenario
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn score_reaches_twenty_after_two_presses() {
    let program = score_game();
    let mut sim = Simulator::new(&program).unwrap();
    sim.run(&[press(Button::A), NONE, press(Button::A)]).unwrap();
    assert_eq!(sim.variable("score"), Some(Value::u8(20)));
    assert_eq!(sim.frame(), 3);
}

#[test]
fn holding_a_button_presses_once() {
    let program = build("edges", |g| {
        let presses = g.u8_var("presses", 0)?;
        let releases = g.u8_var("releases", 0)?;
        g.scene("main", |s| {
            s.on_frame(|b| {
                b.when(Expr::pressed(Button::Up), |b| b.add_assign(&presses, 1u8))?;
                b.when(Expr::released(Button::Up), |b| b.add_assign(&releases, 1u8))
            })
        })?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    let script = [NONE, NONE, press(Button::Up), press(Button::Up), NONE];
    let mut seen = Vec::new();
    for buttons in script {
        sim.step(buttons).unwrap();
        seen.push(u8_of(&sim, "presses"));
    }
    assert_eq!(seen, vec![0, 0, 1, 1, 1]);
    assert_eq!(u8_of(&sim, "releases"), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// Pools
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn full_pool_rejects_spawn() {
    let program = bullets_game(4);
    let mut sim = Simulator::new(&program).unwrap();
    for expected in 0..4u8 {
        assert_eq!(sim.spawn("bullets", 0, 100).unwrap(), SpawnOutcome::Spawned(expected));
    }
    assert_eq!(sim.spawn("bullets", 0, 100).unwrap(), SpawnOutcome::Rejected);
    assert_eq!(sim.pool("bullets").unwrap().count, 4);
    assert!(sim
        .events()
        .any(|e| matches!(e, SimEvent::SpawnRejected { pool, .. } if pool == "bullets")));
}

#[test]
fn spawn_reuses_lowest_free_slot() {
    let program = bullets_game(3);
    let mut sim = Simulator::new(&program).unwrap();
    sim.spawn("bullets", 0, 200).unwrap();
    sim.spawn("bullets", 0, 9).unwrap();
    sim.spawn("bullets", 0, 200).unwrap();
    // Slot 1 moves to y = 5 and is freed.
    sim.step(NONE).unwrap();
    assert!(!sim.pool("bullets").unwrap().slots[1].active);
    assert_eq!(sim.spawn("bullets", 0, 50).unwrap(), SpawnOutcome::Spawned(1));
}

#[test]
fn pool_update_runs_before_cull() {
    let program = bullets_game(4);
    let mut sim = Simulator::new(&program).unwrap();
    // Spawned at y = 12 on tick 1, then updated the same tick: y = 8.
    sim.step(press(Button::A)).unwrap();
    let pool = sim.pool("bullets").unwrap();
    assert_eq!(pool.count, 1);
    assert_eq!(pool.slots[0].y, 8);
    // Tick 2: y = 4, freed after its update.
    sim.step(NONE).unwrap();
    assert_eq!(sim.pool("bullets").unwrap().count, 0);
    assert_eq!(u8_of(&sim, "updates"), 2);

    // A slot that already satisfies the predicate still gets its update.
    sim.spawn("bullets", 0, 5).unwrap();
    sim.step(NONE).unwrap();
    assert_eq!(u8_of(&sim, "updates"), 3);
    assert_eq!(sim.pool("bullets").unwrap().count, 0);
}

#[test]
fn pool_collision_checks_active_slots() {
    let program = build("hits", |g| {
        let dot = g.sprite(SpriteSpec::new("dot", "dot.png", 8, 8))?;
        let player = g.entity(EntitySpec::new("player").sprite(&dot).at(40, 40))?;
        let hit = g.bool_var("hit", false)?;
        let rocks = g.pool("rocks", 2, |p| p.sprite(&dot))?;
        g.scene("main", |s| s.on_frame(|b| b.assign(&hit, rocks.hits(&player))))?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    sim.spawn("rocks", 48, 40).unwrap();
    sim.step(NONE).unwrap();
    assert_eq!(u8_of(&sim, "hit"), 0);
    sim.spawn("rocks", 47, 47).unwrap();
    sim.step(NONE).unwrap();
    assert_eq!(u8_of(&sim, "hit"), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// Scenes
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn transition_runs_exit_then_enter_then_next_frame() {
    let program = build("scenes", |g| {
        let trace = g.u16_var("trace", 0)?;
        g.scene("title", |s| {
            s.on_frame(|b| b.when(Expr::pressed(Button::Start), |b| b.go_to("play")))?;
            s.on_exit(|b| push_digit(b, &trace, 1))
        })?;
        g.scene("play", |s| {
            s.on_enter(|b| push_digit(b, &trace, 2))?;
            s.on_frame(|b| push_digit(b, &trace, 3))
        })?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    sim.step(press(Button::Start)).unwrap();
    assert_eq!(sim.scene(), "play");
    assert_eq!(sim.variable("trace"), Some(Value::u16(12)));
    sim.step(NONE).unwrap();
    assert_eq!(sim.variable("trace"), Some(Value::u16(123)));
    assert!(sim.events().any(|e| matches!(
        e,
        SimEvent::Transition { frame: 1, from, to } if from == "title" && to == "play"
    )));
}

#[test]
fn go_to_from_enter_waits_for_next_frame() {
    let program = build("chain", |g| {
        g.scene("a", |s| s.on_enter(|b| b.go_to("b")))?;
        g.scene("b", |s| s.on_enter(|b| b.go_to("c")))?;
        g.scene("c", |_| Ok(()))?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    assert_eq!(sim.scene(), "a");
    assert_eq!(sim.pending_scene(), Some("b"));
    sim.step(NONE).unwrap();
    assert_eq!(sim.scene(), "b");
    assert_eq!(sim.pending_scene(), Some("c"));
    sim.step(NONE).unwrap();
    assert_eq!(sim.scene(), "c");
    assert_eq!(sim.pending_scene(), None);
}

#[test]
fn last_go_to_in_a_frame_wins() {
    let program = build("last", |g| {
        g.scene("a", |s| {
            s.on_frame(|b| {
                b.go_to("b")?;
                b.go_to("c")
            })
        })?;
        g.scene("b", |_| Ok(()))?;
        g.scene("c", |_| Ok(()))?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    sim.step(NONE).unwrap();
    assert_eq!(sim.scene(), "c");
}

#[test]
fn dangling_go_to_is_an_error() {
    let program = build("dangling", |g| {
        g.scene("main", |s| s.on_frame(|b| b.go_to("nowhere")))?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    assert_eq!(
        sim.step(NONE).unwrap_err(),
        SimError::UnresolvedSymbol {
            kind: "scene",
            name: "nowhere".into()
        }
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Arithmetic, movement, animation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn runtime_division_by_zero_yields_zero() {
    let program = build("div", |g| {
        let a = g.i16_var("a", 100)?;
        let d = g.i16_var("d", 0)?;
        let r = g.i16_var("r", 7)?;
        g.scene("main", |s| {
            s.on_frame(|b| {
                b.assign(&r, a.get().rem(d.get())?)?;
                b.assign(&a, a.get().div(d.get())?)
            })
        })?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    sim.step(NONE).unwrap();
    assert_eq!(sim.variable("a"), Some(Value::i16(0)));
    assert_eq!(sim.variable("r"), Some(Value::i16(0)));
}

#[test]
fn logical_operators_short_circuit() {
    let program = score_game();
    let sim = Simulator::new(&program).unwrap();
    let ghost = || Expr::var(VarRef::new("ghost", IntType::U8));
    assert_eq!(sim.eval(&Expr::bool(false).and(ghost())), Ok(Value::bool(false)));
    assert_eq!(sim.eval(&Expr::bool(true).or(ghost())), Ok(Value::bool(true)));
    assert_eq!(
        sim.eval(&Expr::bool(true).and(ghost())),
        Err(SimError::UnresolvedSymbol {
            kind: "variable",
            name: "ghost".into()
        })
    );
}

#[test]
fn movement_wraps_at_256() {
    let program = build("wrap", |g| {
        let dot = g.sprite(SpriteSpec::new("dot", "dot.png", 8, 8))?;
        let e = g.entity(EntitySpec::new("e").sprite(&dot).at(250, 1))?;
        g.scene("main", |s| s.on_frame(|b| b.move_by(&e, 10u8, Expr::i8(-3))))?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    sim.step(NONE).unwrap();
    let e = sim.entity("e").unwrap();
    assert_eq!((e.x, e.y), (4, 254));
}

#[test]
fn animation_loops_within_its_range() {
    let program = build("anim", |g| {
        let hero = g.sprite(
            SpriteSpec::new("hero", "hero.png", 8, 8)
                .frames(4)
                .animation("walk", 1, 2, 2),
        )?;
        let player = g.entity(EntitySpec::new("player").sprite(&hero))?;
        g.scene("main", |s| s.on_enter(|b| b.play(&player, "walk")))?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    assert_eq!(sim.entity("player").unwrap().frame, 1);
    let mut frames = Vec::new();
    for _ in 0..4 {
        sim.step(NONE).unwrap();
        frames.push(sim.entity("player").unwrap().frame);
    }
    assert_eq!(frames, vec![1, 2, 2, 1]);
    assert_eq!(
        sim.snapshot().entities[0].animation.as_deref(),
        Some("hero.walk")
    );
}

#[test]
fn hidden_entities_still_collide() {
    let program = build("collide", |g| {
        let dot = g.sprite(SpriteSpec::new("dot", "dot.png", 8, 8))?;
        let a = g.entity(EntitySpec::new("a").sprite(&dot).at(0, 0).hidden())?;
        let b = g.entity(EntitySpec::new("b").sprite(&dot).at(8, 0))?;
        let hit = g.bool_var("hit", false)?;
        g.scene("main", |s| {
            s.on_frame(|blk| {
                blk.assign(&hit, a.collides_with(&b))?;
                blk.move_by(&b, Expr::i8(-1), 0u8)
            })
        })?;
        Ok(())
    })
    .unwrap();
    let mut sim = Simulator::new(&program).unwrap();
    sim.step(NONE).unwrap();
    assert_eq!(u8_of(&sim, "hit"), 0);
    sim.step(NONE).unwrap();
    assert_eq!(u8_of(&sim, "hit"), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// Save data
// ══════════════════════════════════════════════════════════════════════════════

fn save_game() -> Program {
    build("saves", |g| {
        let best = g.u16_var("best", 0)?;
        let progress = g.save_record("progress", 1, &["best"])?;
        g.scene("main", |s| {
            s.on_frame(|b| {
                b.when(Expr::pressed(Button::A), |b| b.add_assign(&best, 1000u16))?;
                b.when(Expr::pressed(Button::B), |b| b.save(&progress))?;
                b.when(Expr::pressed(Button::Select), |b| b.load(&progress))
            })
        })?;
        Ok(())
    })
    .unwrap()
}

#[test]
fn stored_record_survives_a_restart() {
    let program = save_game();
    let mut first = Simulator::new(&program).unwrap();
    first.run(&[press(Button::A), press(Button::B)]).unwrap();
    assert_eq!(&first.sram()[..2], &[0xE8, 0x03]);
    assert_eq!(&first.sram()[2..6], b"CART");
    assert_eq!(first.sram()[6], 1);

    let mut second = Simulator::new(&program).unwrap();
    second.restore_sram(first.sram());
    second.step(press(Button::Select)).unwrap();
    assert_eq!(second.variable("best"), Some(Value::u16(1000)));
    assert!(second
        .events()
        .any(|e| matches!(e, SimEvent::SaveLoaded { record, .. } if record == "progress")));
}

#[test]
fn loading_blank_sram_leaves_variables_untouched() {
    let program = save_game();
    let mut sim = Simulator::new(&program).unwrap();
    sim.run(&[press(Button::A), press(Button::Select)]).unwrap();
    assert_eq!(sim.variable("best"), Some(Value::u16(1000)));
    assert!(sim
        .events()
        .any(|e| matches!(e, SimEvent::LoadRejected { .. })));
}

// ══════════════════════════════════════════════════════════════════════════════
// Harness
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn failing_scenario_does_not_stop_others() {
    let program = score_game();
    let score = || Expr::var(VarRef::new("score", IntType::U8));
    let scenarios = vec![
        Scenario::new("wrong expectation")
            .inputs([press(Button::A)])
            .check(1, score().eq(20u8), "score doubled"),
        Scenario::new("two presses")
            .inputs([press(Button::A), NONE, press(Button::A)])
            .check(0, score().eq(0u8), "starts at zero")
            .check(3, score().eq(20u8), "score is 20"),
    ];
    let summary = run_scenarios(&program, &scenarios);
    assert_eq!((summary.passed, summary.failed), (1, 1));
    assert!(!summary.all_passed());
    match &summary.results[0].failure {
        Some(ScenarioFailure::Assertion {
            tick,
            message,
            condition,
            snapshot,
        }) => {
            assert_eq!(*tick, 1);
            assert_eq!(message, "score doubled");
            assert!(condition.contains("score"));
            assert_eq!(snapshot.variables["score"], vec![Value::u8(10)]);
        }
        other => panic!("expected assertion failure, got {other:?}"),
    }
    assert!(summary.results[1].passed());
    assert!(summary.to_string().contains("1 passed, 1 failed"));
}

#[test]
fn checks_past_the_script_step_with_no_input() {
    let program = score_game();
    let score = Expr::var(VarRef::new("score", IntType::U8));
    let scenario = Scenario::new("idle").check(5, score.eq(0u8), "idle frames score nothing");
    let summary = run_scenarios(&program, &[scenario]);
    assert!(summary.all_passed());
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism & properties
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn identical_scripts_give_identical_snapshots() {
    let program = bullets_game(4);
    let script: Vec<Buttons> = (0..60)
        .map(|i| if i % 3 == 0 { press(Button::A) } else { NONE })
        .collect();
    let run = || {
        let mut sim = Simulator::new(&program).unwrap();
        sim.run(&script).unwrap();
        sim.snapshot()
    };
    let first = run();
    for _ in 0..10 {
        let again = run();
        assert_eq!(again, first);
        assert_eq!(again.to_json(), first.to_json());
    }
}

proptest! {
    #[test]
    fn collision_is_symmetric(
        ax in -300i32..300, ay in -300i32..300, aw in 0i32..32, ah in 0i32..32,
        bx in -300i32..300, by in -300i32..300, bw in 0i32..32, bh in 0i32..32,
    ) {
        let a = Rect::new(ax, ay, aw, ah);
        let b = Rect::new(bx, by, bw, bh);
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }

    #[test]
    fn u8_addition_wraps_mod_256(a in any::<u8>(), b in any::<u8>()) {
        let program = build("add", |g| {
            let x = g.u8_var("x", a)?;
            g.scene("main", |s| s.on_frame(|blk| blk.add_assign(&x, b)))?;
            Ok(())
        })
        .unwrap();
        let mut sim = Simulator::new(&program).unwrap();
        sim.step(NONE).unwrap();
        prop_assert_eq!(sim.variable("x"), Some(Value::u8(((a as u16 + b as u16) % 256) as u8)));
    }
}
