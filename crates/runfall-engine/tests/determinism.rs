//! Determinism: a busy level with every system installed, run twice from the
//! same seed, must produce identical state hashes and event streams.
//!
//! Jobs run in parallel on rayon workers; only the log's sort keys fix the
//! order structural changes are applied in.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use runfall_engine::prelude::*;

const RUNNERS: usize = 16;
const FRAMES: u64 = 240;

fn build_level(seed: u64) -> (FrameLoop, Vec<EntityId>) {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut world = World::new();
    register_components(&mut world);

    let mut runners = Vec::with_capacity(RUNNERS);
    for lane in 0..RUNNERS {
        let start = Position::new(lane as f32 * 4.0, 0.0, 0.0);
        let runner = world
            .spawn_bundle(
                runner_bundle(start, rng.gen_range(4.0..10.0), 20.0)
                    .with(CharacterTraits {
                        cooldown_drain: rng.gen_range(0.3..1.0),
                        ability_power: rng.gen_range(0.0..1.0),
                        ally_affinity: rng.gen_range(0.2..1.0),
                    })
                    .with(Dash::new(0.3, 1.5, 1.8))
                    .with(Glitch::new(0.4, 2.5, 8.0))
                    .with(Aura::new(1.5, 3.0, 3.0, 1.0, 2.0))
                    .with(Allies::new(1.5, 4.0, 3, 10.0))
                    .with(Shield::new(2.0, 5.0, 2))
                    .with(Transformation::new(1.0, 4.0, 1.3, 1.2))
                    .with(TutorialProgress::default()),
            )
            .unwrap();
        runners.push(runner);
    }

    for _ in 0..400 {
        let x = rng.gen_range(-2.0..RUNNERS as f32 * 4.0);
        let z = rng.gen_range(2.0..200.0);
        let kind = match rng.gen_range(0..10) {
            0 => CollectibleKind::Powerup(PowerupKind::ALL[rng.gen_range(0..PowerupKind::COUNT)]),
            1 | 2 => CollectibleKind::Gem,
            _ => CollectibleKind::Coin,
        };
        world
            .spawn_bundle(
                ComponentBundle::new()
                    .with(Position::new(x, 0.0, z))
                    .with(Collectible { kind, value: 5 }),
            )
            .unwrap();
    }
    for _ in 0..80 {
        let position = Position::new(
            rng.gen_range(-2.0..RUNNERS as f32 * 4.0),
            0.0,
            rng.gen_range(5.0..200.0),
        );
        let bundle = match rng.gen_range(0..3) {
            0 => ComponentBundle::new().with(Enemy),
            1 => ComponentBundle::new().with(Barrier),
            _ => ComponentBundle::new().with(Hazard {
                integrity: 8.0,
                melt_rate: 4.0,
                contact_radius: 1.0,
                damage: 10.0,
            }),
        };
        world.spawn_bundle(bundle.with(position)).unwrap();
    }

    let mut frame_loop = FrameLoop::new(world, FrameConfig::default()).unwrap();
    install_default_systems(&mut frame_loop).unwrap();
    (frame_loop, runners)
}

/// Runs the level and returns the final hash plus the serialized events.
fn run_level(seed: u64) -> (String, Vec<String>) {
    let (mut frame_loop, runners) = build_level(seed);
    let mut input = Pcg64Mcg::seed_from_u64(seed ^ 0xABCD);
    let mut events = Vec::new();
    for _ in 0..FRAMES {
        for &runner in &runners {
            if input.gen_bool(0.05) {
                let kind = AbilityKind::ALL[input.gen_range(0..AbilityKind::ALL.len())];
                kind.request(frame_loop.world_mut(), runner);
            }
        }
        let dt = input.gen_range(0.008..0.034);
        let report = frame_loop.advance(dt).unwrap();
        events.extend(
            report
                .events
                .iter()
                .map(|e| serde_json::to_string(e).unwrap()),
        );
    }
    (frame_loop.state_hash(), events)
}

#[test]
fn same_seed_same_hash_and_events() {
    let (hash_a, events_a) = run_level(7);
    let (hash_b, events_b) = run_level(7);
    assert_eq!(hash_a, hash_b);
    assert_eq!(events_a, events_b);
    assert!(!events_a.is_empty());
}

#[test]
fn different_seed_diverges() {
    let (hash_a, _) = run_level(7);
    let (hash_b, _) = run_level(8);
    assert_ne!(hash_a, hash_b);
}

#[test]
fn busy_level_emits_every_domain_event_family() {
    let (_, events) = run_level(11);
    for tag in [
        "\"type\":\"ability_activated\"",
        "\"type\":\"ability_ended\"",
        "\"type\":\"collectible_collected\"",
        "\"type\":\"score_updated\"",
        "\"type\":\"level_completed\"",
        "\"type\":\"level_unlocked\"",
        "\"type\":\"tutorial_step_completed\"",
    ] {
        assert!(
            events.iter().any(|e| e.contains(tag)),
            "no event with {tag}"
        );
    }
}
