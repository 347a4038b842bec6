//! Property tests for the deferred mutation log.
//!
//! Random entry sequences are appended from rayon workers in arbitrary
//! interleavings; playback must produce the same world as a sequential
//! append of the same entries.

use proptest::prelude::*;
use rayon::prelude::*;
use runfall_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Hp(u32);

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Score(i64);

#[derive(Debug, Clone)]
enum LogOp {
    SetHp(usize, u32),
    AddScore(usize, i64),
    RemoveHp(usize),
    Destroy(usize),
    Create(u32),
}

fn log_op_strategy() -> impl Strategy<Value = LogOp> {
    prop_oneof![
        (0..20usize, any::<u32>()).prop_map(|(i, v)| LogOp::SetHp(i, v)),
        (0..20usize, any::<i64>()).prop_map(|(i, v)| LogOp::AddScore(i, v)),
        (0..20usize).prop_map(LogOp::RemoveHp),
        (0..20usize).prop_map(LogOp::Destroy),
        any::<u32>().prop_map(LogOp::Create),
    ]
}

/// Create a fresh world with Hp and Score registered, plus 5 initial entities.
fn setup_world_and_entities() -> (World, Vec<EntityId>) {
    let mut world = World::new();
    world.register_component::<Hp>("hp");
    world.register_component::<Score>("score");
    let entities = (0..5u32)
        .map(|i| world.spawn_with(Hp(100 + i)).unwrap())
        .collect();
    (world, entities)
}

fn write(writer: &LogWriter<'_>, op: &LogOp, entities: &[EntityId]) {
    let pick = |idx: usize| entities[idx % entities.len()];
    match op {
        LogOp::SetHp(i, v) => writer.set(pick(*i), Hp(*v)),
        LogOp::AddScore(i, v) => writer.add(pick(*i), Score(*v)),
        LogOp::RemoveHp(i) => writer.remove::<Hp>(pick(*i)),
        LogOp::Destroy(i) => writer.destroy(pick(*i)),
        LogOp::Create(v) => {
            let pending = writer.create(ComponentBundle::new().with(Hp(*v)));
            writer.add(pending, Score(i64::from(*v)));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    /// Every entry is either applied, skipped as stale, or failed.
    #[test]
    fn report_accounts_for_every_entry(ops in prop::collection::vec(log_op_strategy(), 1..40)) {
        let (mut world, entities) = setup_world_and_entities();
        let mut log = DeferredMutationLog::new();
        let writer = log.writer(0, 0, "prop");
        for op in &ops {
            write(&writer, op, &entities);
        }
        let queued = log.len();
        let report = log.playback(&mut world);
        prop_assert_eq!(report.applied + report.skipped_stale + report.failed, queued);
        prop_assert!(log.is_empty());
        for (_, entity) in &report.created {
            prop_assert!(world.is_alive(*entity));
        }
    }

    /// Parallel appends keyed by writer produce the same world as sequential
    /// appends in key order.
    #[test]
    fn parallel_appends_match_sequential(
        groups in prop::collection::vec(prop::collection::vec(log_op_strategy(), 1..6), 1..16),
    ) {
        let sequential = {
            let (mut world, entities) = setup_world_and_entities();
            let mut log = DeferredMutationLog::new();
            for (key, ops) in groups.iter().enumerate() {
                let writer = log.writer(0, key as u32, "seq");
                for op in ops {
                    write(&writer, op, &entities);
                }
            }
            log.playback(&mut world);
            world.state_digest()
        };

        let parallel = {
            let (mut world, entities) = setup_world_and_entities();
            let mut log = DeferredMutationLog::new();
            groups.par_iter().enumerate().rev().for_each(|(key, ops)| {
                let writer = log.writer(0, key as u32, "par");
                for op in ops {
                    write(&writer, op, &entities);
                }
            });
            log.playback(&mut world);
            world.state_digest()
        };

        prop_assert_eq!(sequential, parallel);
    }

    /// Entries from one writer with increasing sort keys replay in append
    /// order: the final value is the last one written.
    #[test]
    fn fifo_replay_within_batch(values in prop::collection::vec(any::<u32>(), 1..30)) {
        let (mut world, entities) = setup_world_and_entities();
        let target = entities[0];
        let mut log = DeferredMutationLog::new();
        let writer = log.writer(3, 0, "fifo");
        for (key, v) in values.iter().enumerate() {
            writer.with_sort_key(key as u32).set(target, Hp(*v));
        }
        prop_assert_eq!(world.get_component::<Hp>(target), Some(&Hp(100)));
        log.playback(&mut world);
        let expected = values.last().map(|v| Hp(*v));
        prop_assert_eq!(world.get_component::<Hp>(target), expected.as_ref());
    }

    /// Mutations aimed at an entity destroyed earlier in the same playback are
    /// skipped rather than failing.
    #[test]
    fn destroy_then_modify_is_graceful(hp in any::<u32>(), score in any::<i64>()) {
        let (mut world, entities) = setup_world_and_entities();
        let target = entities[0];
        let mut log = DeferredMutationLog::new();
        let writer = log.writer(0, 0, "prop");
        writer.destroy(target);
        writer.set(target, Hp(hp));
        writer.add(target, Score(score));
        let report = log.playback(&mut world);
        prop_assert_eq!(report.applied, 1);
        prop_assert_eq!(report.skipped_stale, 2);
        prop_assert!(!world.is_alive(target));
    }
}
