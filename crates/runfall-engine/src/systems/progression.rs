//! Level and world unlocks.

use runfall_ecs::prelude::*;
use tracing::info;

use super::gameplay_config;
use crate::components::Progression;
use crate::events::{self, EventRow, LevelCompleted, LevelUnlocked, WorldUnlocked};
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// World number (1-based) of a 1-based level.
pub fn world_of(level: u32, levels_per_world: u32) -> u32 {
    level.saturating_sub(1) / levels_per_world.max(1) + 1
}

/// Owns `LevelCompleted`. Completing level `n` unlocks `n + 1` if it was
/// still locked; when `n + 1` is the first level of a world, that world is
/// unlocked too.
pub struct ProgressionSystem;

impl GameSystem for ProgressionSystem {
    fn name(&self) -> &str {
        "progression"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let completed = world.snapshot::<EventRow<LevelCompleted>>()?;
        if completed.is_empty() {
            return Ok(Vec::new());
        }
        let levels_per_world = gameplay_config(world).levels_per_world.max(1);
        let frame = frame.frame;
        let job = ForEach::<(Progression,)>::new("progression").run(move |row, item| {
            let (progression,) = item;
            let owner = row.entity();
            let log = row.log();
            for (event, record) in completed.iter() {
                if record.event.entity != owner {
                    continue;
                }
                log.destroy(event);
                progression.levels_completed += 1;
                let next = record.event.level + 1;
                if next <= progression.highest_unlocked {
                    continue;
                }
                progression.highest_unlocked = next;
                info!(entity = ?owner, level = next, "level unlocked");
                events::emit(log, frame, LevelUnlocked { entity: owner, level: next });
                if (next - 1) % levels_per_world == 0 {
                    let unlocked = world_of(next, levels_per_world);
                    info!(entity = ?owner, world = unlocked, "world unlocked");
                    events::emit(log, frame, WorldUnlocked { entity: owner, world: unlocked });
                }
            }
        });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::register_components;
    use crate::config::{FrameConfig, GameplayConfig};
    use crate::events::GameEvent;
    use crate::tick::{FnSystem, FrameLoop};
    use crate::time::Lane;

    #[test]
    fn world_numbers() {
        assert_eq!(world_of(1, 5), 1);
        assert_eq!(world_of(5, 5), 1);
        assert_eq!(world_of(6, 5), 2);
        assert_eq!(world_of(11, 5), 3);
        assert_eq!(world_of(3, 0), 3);
    }

    fn complete_levels(levels: Vec<u32>) -> (FrameLoop, EntityId, Vec<GameEvent>) {
        let mut world = World::new();
        register_components(&mut world);
        world.insert_resource(GameplayConfig {
            levels_per_world: 3,
            ..GameplayConfig::default()
        });
        let runner = world.spawn_with(Progression::default()).unwrap();
        let mut frame_loop = FrameLoop::new(world, FrameConfig::default()).unwrap();
        let count = levels.len() as u64;
        frame_loop
            .add_system(FnSystem::new("finish", Lane::Simulation, move |ctx, world, scheduler, deps| {
                let Some(&level) = levels.get(ctx.frame as usize) else {
                    return Ok(Vec::new());
                };
                let frame = ctx.frame;
                let job = Task::new("finish").run(move |_, log| {
                    events::emit(log, frame, LevelCompleted { entity: runner, level });
                });
                Ok(vec![scheduler.schedule(world, job, deps)?])
            }))
            .unwrap();
        frame_loop.add_system(ProgressionSystem).unwrap();
        let events = frame_loop
            .run_frames(count + 1, 0.1)
            .unwrap()
            .into_iter()
            .flat_map(|r| r.events)
            .collect();
        (frame_loop, runner, events)
    }

    #[test]
    fn finishing_last_level_of_a_world_unlocks_the_next_world() {
        let (frame_loop, runner, events) = complete_levels(vec![1, 2, 3]);
        let progression = frame_loop.world().get_component::<Progression>(runner).unwrap();
        assert_eq!(progression.highest_unlocked, 4);
        assert_eq!(progression.levels_completed, 3);
        let worlds: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::WorldUnlocked(w) => Some(w.world),
                _ => None,
            })
            .collect();
        assert_eq!(worlds, vec![2]);
    }

    #[test]
    fn replaying_a_level_unlocks_nothing() {
        let (frame_loop, runner, events) = complete_levels(vec![1, 1]);
        let progression = frame_loop.world().get_component::<Progression>(runner).unwrap();
        assert_eq!(progression.highest_unlocked, 2);
        assert_eq!(progression.levels_completed, 2);
        let unlocks = events
            .iter()
            .filter(|e| matches!(e, GameEvent::LevelUnlocked(_)))
            .count();
        assert_eq!(unlocks, 1);
    }
}
