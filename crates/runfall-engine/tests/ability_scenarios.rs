//! End-to-end ability scenarios driven through the frame loop.
//!
//! Every test steps a real `FrameLoop` with the real ability systems; the
//! only scaffolding is the world setup.

use runfall_engine::events::{AbilityEnded, AbilityReady};
use runfall_engine::prelude::*;
use runfall_engine::systems::{KnockbackSystem, MeltSystem, StatsSystem};

// -- Helpers ----------------------------------------------------------------

fn new_world() -> World {
    let mut world = World::new();
    register_components(&mut world);
    world
}

fn frame_loop(world: World) -> FrameLoop {
    FrameLoop::new(world, FrameConfig::default()).unwrap()
}

fn count_events(reports: &[FrameReport], pred: impl Fn(&GameEvent) -> bool) -> usize {
    reports
        .iter()
        .flat_map(|r| r.events.iter())
        .filter(|e| pred(e))
        .count()
}

// -- Timer lifecycle --------------------------------------------------------

#[test]
fn duration_five_cooldown_ten_lifecycle() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits::default())
                .with(Transformation::new(5.0, 10.0, 1.5, 2.0)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop
        .add_system(AbilitySystem::<Transformation>::new())
        .unwrap();

    assert!(AbilityKind::Transformation.request(frame_loop.world_mut(), hero));

    let mut reports = Vec::new();
    for t in 0..=25u64 {
        reports.push(frame_loop.advance(1.0).unwrap());
        let ability = *frame_loop
            .world()
            .get_component::<Transformation>(hero)
            .unwrap();
        let timer = ability.timer;
        assert!(timer.remaining_time >= 0.0);
        assert!(timer.cooldown_remaining >= 0.0);
        match t {
            0..=4 => {
                assert!(timer.is_active, "t={t}");
                assert_eq!(ability.applied_speed, 1.5);
                assert_eq!(ability.applied_scale, 2.0);
            }
            5 => {
                assert!(!timer.is_active);
                assert_eq!(timer.remaining_time, 0.0);
                assert_eq!(timer.cooldown_remaining, 10.0);
                assert_eq!(ability.applied_speed, 1.0);
                assert_eq!(ability.applied_scale, 1.0);
            }
            6..=14 => assert!(timer.cooldown_remaining > 0.0, "t={t}"),
            _ => assert_eq!(timer.cooldown_remaining, 0.0, "t={t}"),
        }
    }

    let ready = GameEvent::AbilityReady(AbilityReady {
        entity: hero,
        kind: AbilityKind::Transformation,
    });
    assert_eq!(count_events(&reports, |e| *e == ready), 1);
    assert!(reports[15].events.contains(&ready));
    let ended = GameEvent::AbilityEnded(AbilityEnded {
        entity: hero,
        kind: AbilityKind::Transformation,
    });
    assert_eq!(count_events(&reports, |e| *e == ended), 1);
    assert!(reports[5].events.contains(&ended));
}

#[test]
fn request_during_cooldown_is_dropped() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits::default())
                .with(Transformation::new(1.0, 3.0, 1.2, 1.0)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop
        .add_system(AbilitySystem::<Transformation>::new())
        .unwrap();

    AbilityKind::Transformation.request(frame_loop.world_mut(), hero);
    frame_loop.advance(1.0).unwrap();
    frame_loop.advance(1.0).unwrap();

    // Ended at t=1; cooldown 3 left. Request now: dropped, not buffered.
    AbilityKind::Transformation.request(frame_loop.world_mut(), hero);
    let report = frame_loop.advance(1.0).unwrap();
    assert!(!report
        .events
        .iter()
        .any(|e| matches!(e, GameEvent::AbilityActivated(_))));
    let timer = AbilityKind::Transformation
        .timer(frame_loop.world(), hero)
        .unwrap();
    assert!(!timer.activation_requested);
    assert!(!timer.is_active);

    let activations = frame_loop
        .run_frames(5, 1.0)
        .unwrap()
        .iter()
        .flat_map(|r| r.events.iter())
        .filter(|e| matches!(e, GameEvent::AbilityActivated(_)))
        .count();
    assert_eq!(activations, 0);
}

#[test]
fn slow_cooldown_trait_stretches_recovery() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits {
                    cooldown_drain: 0.5,
                    ..CharacterTraits::default()
                })
                .with(Transformation::new(1.0, 2.0, 1.0, 1.0)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop
        .add_system(AbilitySystem::<Transformation>::new())
        .unwrap();
    AbilityKind::Transformation.request(frame_loop.world_mut(), hero);
    let reports = frame_loop.run_frames(8, 1.0).unwrap();
    // Ends at t=1, drains 0.5/s from t=2: ready at t=5.
    let ready_at: Vec<usize> = reports
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.events
                .iter()
                .any(|e| matches!(e, GameEvent::AbilityReady(_)))
        })
        .map(|(t, _)| t)
        .collect();
    assert_eq!(ready_at, vec![5]);
}

#[test]
fn activation_spawns_proxy_following_owner() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            runner_bundle(Position::default(), 0.0, 1000.0).with(Shield::new(2.0, 4.0, 2)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    install_default_systems(&mut frame_loop).unwrap();

    AbilityKind::Shield.request(frame_loop.world_mut(), hero);
    frame_loop.advance(0.5).unwrap();
    let proxies: Vec<_> = frame_loop
        .world()
        .query::<(&VisualProxy,)>()
        .map(|(e, (p,))| (e, *p))
        .collect();
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].1.owner, hero);
    let proxy = proxies[0].0;

    // Teleport the owner between frames; the proxy catches up next frame.
    let moved = Position::new(2.0, 0.0, 7.0);
    frame_loop
        .world_mut()
        .insert_component(hero, moved)
        .unwrap();
    frame_loop.advance(0.5).unwrap();
    assert_eq!(
        frame_loop.world().get_component::<Position>(proxy),
        Some(&moved)
    );

    frame_loop.run_frames(4, 0.5).unwrap();
    assert!(!frame_loop.world().is_alive(proxy));
}

// -- Aura -------------------------------------------------------------------

fn melt_loop(world: World) -> FrameLoop {
    let mut frame_loop = frame_loop(world);
    frame_loop.add_system(AbilitySystem::<Aura>::new()).unwrap();
    frame_loop.add_system_after(MeltSystem, &["aura"]).unwrap();
    frame_loop
}

fn spawn_aura_holder(world: &mut World, x: f32) -> EntityId {
    world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::new(x, 0.0, 0.0))
                .with(CharacterTraits::default())
                .with(Aura::new(10.0, 5.0, 4.0, 1.0, 0.0)),
        )
        .unwrap()
}

fn small_hazard(integrity: f32, melt_rate: f32) -> Hazard {
    Hazard {
        integrity,
        melt_rate,
        contact_radius: 0.5,
        damage: 0.0,
    }
}

#[test]
fn aura_melts_hazard_in_exactly_two_ticks() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits::default())
                .with(Aura::new(10.0, 5.0, 4.0, 1.0, 0.0)),
        )
        .unwrap();
    let hazard = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(Hazard {
                    integrity: 10.0,
                    melt_rate: 5.0,
                    contact_radius: 0.5,
                    damage: 0.0,
                }),
        )
        .unwrap();
    let mut frame_loop = melt_loop(world);

    AbilityKind::Aura.request(frame_loop.world_mut(), hero);
    frame_loop.advance(1.0).unwrap();
    assert_eq!(
        frame_loop
            .world()
            .get_component::<Hazard>(hazard)
            .unwrap()
            .integrity,
        10.0
    );

    frame_loop.advance(1.0).unwrap();
    assert_eq!(
        frame_loop
            .world()
            .get_component::<Hazard>(hazard)
            .unwrap()
            .integrity,
        5.0
    );

    frame_loop.advance(1.0).unwrap();
    assert!(!frame_loop.world().is_alive(hazard));
}

#[test]
fn aura_falloff_and_range() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits::default())
                .with(Aura::new(10.0, 5.0, 4.0, 1.0, 0.0)),
        )
        .unwrap();
    let spawn_hazard = |world: &mut World, x: f32| {
        world
            .spawn_bundle(
                ComponentBundle::new()
                    .with(Position::new(x, 0.0, 0.0))
                    .with(Hazard {
                        integrity: 10.0,
                        melt_rate: 4.0,
                        contact_radius: 0.5,
                        damage: 0.0,
                    }),
            )
            .unwrap()
    };
    let half = spawn_hazard(&mut world, 2.0);
    let outside = spawn_hazard(&mut world, 4.5);
    let mut frame_loop = melt_loop(world);
    AbilityKind::Aura.request(frame_loop.world_mut(), hero);
    frame_loop.run_frames(2, 1.0).unwrap();

    let world = frame_loop.world();
    assert_eq!(world.get_component::<Hazard>(half).unwrap().integrity, 8.0);
    assert_eq!(world.get_component::<Hazard>(outside).unwrap().integrity, 10.0);
}

#[test]
fn overlapping_auras_stack_their_melt() {
    let mut world = new_world();
    let left = spawn_aura_holder(&mut world, -1.0);
    let right = spawn_aura_holder(&mut world, 1.0);
    let hazard = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(small_hazard(10.0, 4.0)),
        )
        .unwrap();
    let mut frame_loop = melt_loop(world);
    AbilityKind::Aura.request(frame_loop.world_mut(), left);
    AbilityKind::Aura.request(frame_loop.world_mut(), right);
    frame_loop.run_frames(2, 1.0).unwrap();

    // Each aura is 1 away with radius 4: 4 * 0.75 per aura per second.
    let integrity = frame_loop
        .world()
        .get_component::<Hazard>(hazard)
        .unwrap()
        .integrity;
    assert_eq!(integrity, 4.0);
}

#[test]
fn set_on_a_hazard_melted_earlier_in_the_frame_is_skipped() {
    let mut world = new_world();
    let hero = spawn_aura_holder(&mut world, 0.0);
    let hazard = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(small_hazard(5.0, 5.0)),
        )
        .unwrap();
    let mut frame_loop = melt_loop(world);
    // Re-applies the hazard's original state every frame from a later batch.
    let retune = FnSystem::new(
        "retune_hazard",
        Lane::Simulation,
        move |_, world, scheduler, deps| {
            let job = Task::new("retune_hazard").run(move |_, log| {
                log.set(hazard, small_hazard(5.0, 5.0));
            });
            Ok(vec![scheduler.schedule(world, job, deps)?])
        },
    );
    frame_loop.add_system_after(retune, &["melt"]).unwrap();
    AbilityKind::Aura.request(frame_loop.world_mut(), hero);

    let first = frame_loop.advance(1.0).unwrap();
    assert_eq!(first.skipped_stale, 0);
    assert_eq!(first.conflicts, 0);
    assert!(frame_loop.world().is_alive(hazard));

    let second = frame_loop.advance(1.0).unwrap();
    assert!(!frame_loop.world().is_alive(hazard));
    assert_eq!(second.skipped_stale, 1);
    assert_eq!(second.conflicts, 0);

    let third = frame_loop.advance(1.0).unwrap();
    assert_eq!(third.skipped_stale, 1);
    assert!(frame_loop.world().get_component::<Hazard>(hazard).is_none());
}

#[test]
fn aura_pushes_enemies_away() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits::default())
                .with(Aura::new(10.0, 5.0, 5.0, 0.0, 4.0)),
        )
        .unwrap();
    let enemy = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Enemy)
                .with(Position::new(2.0, 0.0, 0.0)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop.add_system(AbilitySystem::<Aura>::new()).unwrap();
    frame_loop
        .add_system_after(KnockbackSystem, &["aura"])
        .unwrap();
    AbilityKind::Aura.request(frame_loop.world_mut(), hero);
    frame_loop.run_frames(3, 0.5).unwrap();

    let x = frame_loop.world().get_component::<Position>(enemy).unwrap().x;
    assert!(x > 2.0, "enemy x = {x}");
}

// -- Glitch -----------------------------------------------------------------

#[test]
fn glitch_teleports_past_barrier_on_fixed_lane() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(Movement::forward(0.0))
                .with(CharacterTraits::default())
                .with(Glitch::new(0.5, 3.0, 8.0)),
        )
        .unwrap();
    let barrier = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Barrier)
                .with(Position::new(1.0, 0.0, 5.0)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop.add_system(AbilitySystem::<Glitch>::new()).unwrap();
    assert_eq!(frame_loop.system_names(), vec!["glitch"]);

    AbilityKind::Glitch.request(frame_loop.world_mut(), hero);
    let first = frame_loop.advance(1.0 / 60.0).unwrap();
    assert_eq!(first.fixed_steps, 1);
    let glitch = *frame_loop.world().get_component::<Glitch>(hero).unwrap();
    let target = glitch.target.unwrap();
    assert_eq!(target.barrier, barrier);
    assert_eq!(target.end, Position::new(0.0, 0.0, 6.5));

    let mut previous = 0.0;
    let mut ended = false;
    for _ in 0..60 {
        let report = frame_loop.advance(1.0 / 60.0).unwrap();
        let z = frame_loop.world().get_component::<Position>(hero).unwrap().z;
        assert!(z >= previous, "teleport must not move backwards");
        previous = z;
        ended |= report.events.iter().any(|e| {
            matches!(e, GameEvent::AbilityEnded(a) if a.kind == AbilityKind::Glitch)
        });
    }
    assert!(ended);
    assert_eq!(
        frame_loop.world().get_component::<Position>(hero),
        Some(&Position::new(0.0, 0.0, 6.5))
    );
}

#[test]
fn glitch_without_target_ends_immediately() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits::default())
                .with(Glitch::new(0.5, 3.0, 8.0)),
        )
        .unwrap();
    world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Barrier)
                .with(Position::new(3.0, 0.0, 5.0)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop.add_system(AbilitySystem::<Glitch>::new()).unwrap();
    AbilityKind::Glitch.request(frame_loop.world_mut(), hero);
    frame_loop.advance(1.0 / 60.0).unwrap();
    let report = frame_loop.advance(1.0 / 60.0).unwrap();
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, GameEvent::AbilityEnded(a) if a.entity == hero)));
    assert_eq!(
        frame_loop.world().get_component::<Position>(hero),
        Some(&Position::default())
    );
}

// -- Allies -----------------------------------------------------------------

#[test]
fn allies_are_capped_by_affinity_and_dismissed_together() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            ComponentBundle::new()
                .with(Position::default())
                .with(CharacterTraits {
                    ally_affinity: 0.4,
                    ..CharacterTraits::default()
                })
                .with(Allies::new(2.0, 5.0, 3, 10.0)),
        )
        .unwrap();
    for z in [2.0, 4.0, 6.0, 30.0] {
        world
            .spawn_bundle(
                ComponentBundle::new()
                    .with(Enemy)
                    .with(Position::new(0.0, 0.0, z)),
            )
            .unwrap();
    }
    let mut frame_loop = frame_loop(world);
    frame_loop.add_system(AbilitySystem::<Allies>::new()).unwrap();
    AbilityKind::Allies.request(frame_loop.world_mut(), hero);

    frame_loop.advance(1.0).unwrap();
    let allies: Vec<Ally> = frame_loop
        .world()
        .query::<(&Ally,)>()
        .map(|(_, (a,))| *a)
        .collect();
    assert_eq!(allies.len(), 2);
    assert!(allies.iter().all(|a| a.owner == hero && a.target.is_some()));

    frame_loop.advance(1.0).unwrap();
    assert_eq!(frame_loop.world().query::<(&Ally,)>().count(), 2);
    frame_loop.advance(1.0).unwrap();
    assert_eq!(frame_loop.world().query::<(&Ally,)>().count(), 0);
}

// -- Stats and scheduling ---------------------------------------------------

#[test]
fn dash_speed_reaches_stats_and_reverts() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(
            runner_bundle(Position::default(), 10.0, 1000.0).with(Dash::new(0.25, 1.0, 2.0)),
        )
        .unwrap();
    let mut frame_loop = frame_loop(world);
    install_default_systems(&mut frame_loop).unwrap();

    AbilityKind::Dash.request(frame_loop.world_mut(), hero);
    frame_loop.advance(1.0 / 60.0).unwrap();
    let stats = *frame_loop.world().get_component::<CharacterStats>(hero).unwrap();
    assert_eq!(stats.speed_multiplier, 2.0);

    frame_loop.run_frames(30, 1.0 / 60.0).unwrap();
    let stats = *frame_loop.world().get_component::<CharacterStats>(hero).unwrap();
    assert_eq!(stats.speed_multiplier, 1.0);
}

#[test]
fn unordered_second_stats_writer_is_rejected() {
    let mut world = new_world();
    world
        .spawn_bundle(runner_bundle(Position::default(), 1.0, 10.0))
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop.add_system(StatsSystem).unwrap();
    frame_loop
        .add_system(FnSystem::new("slow_zone", Lane::Simulation, |_, world, scheduler, deps| {
            let job = ForEach::<(CharacterStats,)>::new("slow_zone").run(|_, item| {
                let (stats,) = item;
                stats.speed_multiplier *= 0.5;
            });
            Ok(vec![scheduler.schedule(world, job, deps)?])
        }))
        .unwrap();
    let err = frame_loop.advance(0.1).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Ecs(EcsError::AccessConflict { .. })
    ));
}

#[test]
fn ordered_second_stats_writer_runs_after() {
    let mut world = new_world();
    let hero = world
        .spawn_bundle(runner_bundle(Position::default(), 1.0, 10.0))
        .unwrap();
    let mut frame_loop = frame_loop(world);
    frame_loop.add_system(StatsSystem).unwrap();
    frame_loop
        .add_system_after(
            FnSystem::new("slow_zone", Lane::Simulation, |_, world, scheduler, deps| {
                let job = ForEach::<(CharacterStats,)>::new("slow_zone").run(|_, item| {
                    let (stats,) = item;
                    stats.speed_multiplier *= 0.5;
                });
                Ok(vec![scheduler.schedule(world, job, deps)?])
            }),
            &["stats"],
        )
        .unwrap();
    frame_loop.advance(0.1).unwrap();
    let stats = frame_loop.world().get_component::<CharacterStats>(hero).unwrap();
    assert_eq!(stats.speed_multiplier, 0.5);
}
