//! Recording sessions: registrations, statement blocks, validation and
//! error poisoning.

use cartridge_builder::recorder::StatementRecorder;
use cartridge_builder::{build, EntitySpec, GameBuilder, SpriteSpec};
use cartridge_types::{
    BinOp, BuildErrorKind, BuildResult, Button, EntityOp, ErrorCode, Expr, Hitbox, IntType,
    NoLocation, Place, PoolOp, Stmt, Storage, Value, VarRef, OAM_CAPACITY,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn empty_scene(g: &mut GameBuilder, name: &str) {
    g.scene(name, |_| Ok(())).unwrap();
}

// ══════════════════════════════════════════════════════════════════════════════
// Registration
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn score_game_records_frame_block() {
    let program = build("score", |g| {
        let score = g.u8_var("score", 0)?;
        g.scene("main", |s| {
            s.on_frame(|b| b.when(Expr::pressed(Button::A), |b| b.add_assign(&score, 10u8)))
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(program.start_scene, "main");
    assert_eq!(program.variables.len(), 1);
    assert_eq!(program.variables[0].initial, vec![Value::u8(0)]);
    let frame = &program.scenes[0].frame;
    assert_eq!(frame.len(), 1);
    match &frame[0] {
        Stmt::If {
            condition,
            then_body,
            else_body,
        } => {
            assert_eq!(condition, &Expr::pressed(Button::A));
            assert!(else_body.is_empty());
            assert_eq!(
                then_body,
                &vec![Stmt::CompoundAssign {
                    target: Place::Var(VarRef::new("score", IntType::U8)),
                    op: BinOp::Add,
                    value: Expr::u8(10),
                }]
            );
        }
        other => panic!("expected conditional, got {other:?}"),
    }
}

#[test]
fn arrays_are_zeroed_or_initialized() {
    let program = build("arrays", |g| {
        g.array("hp", IntType::U8, 4)?;
        g.array_of("table", IntType::I16, vec![Value::i16(-1), Value::u8(200)])?;
        g.scene("main", |_| Ok(()))?;
        Ok(())
    })
    .unwrap();
    let hp = program.variable("hp").unwrap();
    assert_eq!(hp.storage, Storage::Array(4));
    assert_eq!(hp.initial, vec![Value::u8(0); 4]);
    let table = program.variable("table").unwrap();
    assert_eq!(table.initial, vec![Value::i16(-1), Value::i16(200)]);
}

#[test]
fn repeated_hooks_append() {
    let program = build("hooks", |g| {
        let n = g.u8_var("n", 0)?;
        g.scene("main", |s| {
            s.on_enter(|b| b.assign(&n, 1u8))?;
            s.on_enter(|b| b.assign(&n, 2u8))?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();
    assert_eq!(program.scenes[0].enter.len(), 2);
}

#[test]
fn entities_get_slots_only_with_sprites() {
    let program = build("entities", |g| {
        let hero = g.sprite(SpriteSpec::new("hero", "hero.png", 8, 16).frames(2))?;
        g.entity(EntitySpec::new("marker").at(1, 2))?;
        g.entity(EntitySpec::new("player").sprite(&hero).tag("actor"))?;
        g.entity(EntitySpec::new("rival").sprite(&hero).tag("actor"))?;
        let actors = g.tagged("actor");
        assert_eq!(actors.len(), 2);
        assert_eq!(actors[1].name(), "rival");
        g.scene("main", |_| Ok(()))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(program.entities[0].oam_slot, None);
    assert_eq!(program.entities[1].oam_slot, Some(0));
    assert_eq!(program.entities[2].oam_slot, Some(1));
    assert_eq!(program.assets.len(), 1);
    assert_eq!(program.assets[0].path, "hero.png");
}

#[test]
fn pool_records_update_and_despawn() {
    let program = build("pools", |g| {
        let shot = g.sprite(SpriteSpec::new("shot", "shot.png", 8, 8))?;
        g.entity(EntitySpec::new("player").sprite(&shot))?;
        let bullets = g.pool("bullets", 4, |p| {
            let me = p.handle();
            p.sprite(&shot)?;
            p.hitbox(Hitbox::new(2, 2, 4, 4));
            p.on_update(|b| b.move_by(me.this(), 0u8, Expr::i8(-2)))?;
            p.despawn_when(me.this_y().lt(8u8))
        })?;
        g.scene("main", |s| {
            s.on_frame(|b| {
                b.when(Expr::pressed(Button::A), |b| b.spawn(&bullets, 80u8, 120u8))
            })
        })?;
        Ok(())
    })
    .unwrap();

    let pool = program.pool("bullets").unwrap();
    assert_eq!(pool.capacity, 4);
    assert_eq!(pool.oam_base, Some(1));
    assert_eq!(pool.update.len(), 1);
    assert!(matches!(
        pool.update[0],
        Stmt::Entity {
            op: EntityOp::MoveBy { .. },
            ..
        }
    ));
    assert_eq!(pool.despawn_when.len(), 1);

    let mut spawns = 0;
    cartridge_types::stmt::walk_block(&program.scenes[0].frame, &mut |s| {
        if let Stmt::Pool(PoolOp::Spawn { pool, .. }) = s {
            assert_eq!(pool, "bullets");
            spawns += 1;
        }
    });
    assert_eq!(spawns, 1);
}

#[test]
fn explicit_start_scene() {
    let program = build("start", |g| {
        g.scene("title", |_| Ok(()))?;
        g.scene("play", |_| Ok(()))?;
        g.start_at("play");
        Ok(())
    })
    .unwrap();
    assert_eq!(program.start_scene, "play");
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn duplicate_variable_fails_even_with_same_type() {
    let err = build("dup", |g| {
        g.u8_var("score", 0)?;
        g.u8_var("score", 0)?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::DuplicateVariable("score".into()));
    assert_eq!(err.code(), ErrorCode::DUPLICATE_VARIABLE);
}

#[test]
fn first_error_poisons_the_session() {
    let mut g = GameBuilder::new("poison");
    g.u8_var("a", 0).unwrap();
    let first = g.i16_var("a", 5).unwrap_err();
    // Later registrations still work, but finishing reports the first error.
    g.u8_var("b", 0).unwrap();
    empty_scene(&mut g, "main");
    assert!(g.failure().is_some());
    assert_eq!(g.finish().unwrap_err(), first);
}

#[test]
fn error_inside_block_poisons_the_session() {
    let mut g = GameBuilder::new("poison");
    let n = g.u8_var("n", 0).unwrap();
    let result = g.scene("main", |s| {
        s.on_frame(|b| {
            let bad = Expr::i8(1).bit_and(n.get())?;
            b.assign(&n, bad)
        })
    });
    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::UNSUPPORTED_OPERATOR);
    assert_eq!(g.finish().unwrap_err(), err);
}

#[test]
fn error_location_is_the_builder_call_site() {
    let mut g = GameBuilder::new("loc");
    g.u8_var("a", 0).unwrap();
    let (err, line) = (g.u8_var("a", 1).unwrap_err(), line!());
    let loc = err.location.as_ref().expect("caller location");
    assert!(loc.file.ends_with("builder_tests.rs"));
    assert_eq!(loc.line, line);
    assert!(format!("{err}").contains("E100"));
}

#[test]
fn no_location_provider_omits_locations() {
    let mut g = GameBuilder::with_locations("loc", Box::new(NoLocation));
    g.u8_var("a", 0).unwrap();
    let err = g.u8_var("a", 1).unwrap_err();
    assert_eq!(err.location, None);
    assert!(format!("{err}").starts_with("E100"));
}

#[test]
fn program_without_scenes_is_rejected() {
    let err = build("empty", |g| {
        g.u8_var("a", 0)?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::NoScenes);
}

#[test]
fn unknown_start_scene_is_rejected() {
    let err = build("start", |g| {
        g.scene("title", |_| Ok(()))?;
        g.start_at("missing");
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(
        err.kind,
        BuildErrorKind::UnknownSymbol { kind: "scene", .. }
    ));
}

#[test]
fn oam_slots_run_out_at_forty() {
    let mut g = GameBuilder::new("slots");
    let s = g.sprite(SpriteSpec::new("dot", "dot.png", 8, 8)).unwrap();
    for i in 0..OAM_CAPACITY {
        g.entity(EntitySpec::new(format!("e{i}")).sprite(&s)).unwrap();
    }
    let err = g.entity(EntitySpec::new("extra").sprite(&s)).unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::SlotExhausted(OAM_CAPACITY));
}

#[test]
fn pool_larger_than_remaining_slots_is_rejected() {
    let mut g = GameBuilder::new("slots");
    let s = g.sprite(SpriteSpec::new("dot", "dot.png", 8, 8)).unwrap();
    for i in 0..30 {
        g.entity(EntitySpec::new(format!("e{i}")).sprite(&s)).unwrap();
    }
    let err = g.pool("many", 11, |p| p.sprite(&s)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SLOT_EXHAUSTED);
    // A spriteless pool needs no slots.
    let mut g = GameBuilder::new("slots");
    assert!(g.pool("logic", 200, |_| Ok(())).is_ok());
}

#[test]
fn zero_capacity_pool_is_rejected() {
    let mut g = GameBuilder::new("pools");
    let err = g.pool("none", 0, |_| Ok(())).unwrap_err();
    assert_eq!(err.code(), ErrorCode::INVALID_CAPACITY);
}

#[test]
fn unsupported_sprite_size_is_rejected() {
    let mut g = GameBuilder::new("sprites");
    let err = g
        .sprite(SpriteSpec::new("wide", "wide.png", 16, 16))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UNSUPPORTED_SPRITE_SIZE);
}

#[test]
fn animation_outside_frames_is_rejected() {
    let mut g = GameBuilder::new("sprites");
    let err = g
        .sprite(SpriteSpec::new("hero", "hero.png", 8, 8).frames(2).animation("walk", 1, 2, 4))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::INVALID_ANIMATION);
}

#[test]
fn unknown_variable_in_expression_is_rejected() {
    let err = build("ghost", |g| {
        let n = g.u8_var("n", 0)?;
        g.scene("main", |s| {
            s.on_frame(|b| b.assign(&n, Expr::var(VarRef::new("ghost", IntType::U8))))
        })?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(
        err.kind,
        BuildErrorKind::UnknownSymbol {
            kind: "variable",
            name: "ghost".into()
        }
    );
}

#[test]
fn pool_slot_outside_its_update_is_rejected() {
    let err = build("pool_self", |g| {
        let bullets = g.pool("bullets", 2, |_| Ok(()))?;
        g.scene("main", |s| s.on_frame(|b| b.set_x(bullets.this(), 3u8)))?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UNKNOWN_SYMBOL);
}

#[test]
fn unknown_animation_is_rejected() {
    let err = build("anim", |g| {
        let hero = g.sprite(SpriteSpec::new("hero", "hero.png", 8, 8).frames(2).animation(
            "walk", 0, 2, 4,
        ))?;
        let player = g.entity(EntitySpec::new("player").sprite(&hero))?;
        g.scene("main", |s| {
            s.on_enter(|b| b.play(&player, "walk"))?;
            s.on_frame(|b| b.play(&player, "jump"))
        })?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(
        err.kind,
        BuildErrorKind::UnknownSymbol {
            kind: "animation",
            name: "jump".into()
        }
    );
}

#[test]
fn compound_division_by_literal_zero_is_rejected() {
    let err = build("div", |g| {
        let n = g.u8_var("n", 0)?;
        g.scene("main", |s| s.on_frame(|b| b.div_assign(&n, 0u8)))?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ARITHMETIC);
}

#[test]
fn save_record_requires_known_fields() {
    let mut g = GameBuilder::new("save");
    g.u16_var("best", 0).unwrap();
    assert!(g.save_record("progress", 1, &["best"]).is_ok());
    let err = g.save_record("broken", 1, &["missing"]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UNKNOWN_SYMBOL);
}

#[test]
fn invalid_names_are_rejected() {
    let mut g = GameBuilder::new("names");
    let err = g.u8_var("high score", 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::INVALID_NAME);
}

#[test]
fn recorder_rejects_out_of_order_close() {
    let mut rec = StatementRecorder::new();
    let outer = rec.open_scope();
    let inner = rec.open_scope();
    let err = rec.close_scope(outer).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SCOPE_MISMATCH);
    rec.close_scope(inner).unwrap();
    rec.close_scope(outer).unwrap();
}

// ══════════════════════════════════════════════════════════════════════════════
// Isolation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn concurrent_sessions_are_independent() {
    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            std::thread::spawn(move || {
                build(format!("game{i}"), |g| {
                    let n = g.u8_var("n", i)?;
                    g.scene("main", |s| {
                        s.on_frame(|b| {
                            for _ in 0..=i {
                                b.add_assign(&n, 1u8)?;
                            }
                            Ok(())
                        })
                    })?;
                    Ok(())
                })
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let program = handle.join().unwrap().unwrap();
        assert_eq!(program.name, format!("game{i}"));
        assert_eq!(program.variables.len(), 1);
        assert_eq!(program.variables[0].initial, vec![Value::u8(i as u8)]);
        assert_eq!(program.scenes[0].frame.len(), i + 1);
    }
}

#[test]
fn same_description_builds_identical_programs() {
    fn describe(g: &mut GameBuilder) -> BuildResult<()> {
        let n = g.u8_var("n", 3)?;
        let hero = g.sprite(SpriteSpec::new("hero", "hero.png", 8, 8))?;
        let player = g.entity(EntitySpec::new("player").sprite(&hero).at(10, 10))?;
        g.scene("main", |s| {
            s.on_frame(|b| {
                b.when_else(
                    Expr::held(Button::Left),
                    |b| b.move_by(&player, Expr::i8(-1), 0u8),
                    |b| b.add_assign(&n, 1u8),
                )
            })
        })?;
        Ok(())
    }
    let a = build("same", describe).unwrap();
    let b = build("same", describe).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_json(), b.to_json());
}
