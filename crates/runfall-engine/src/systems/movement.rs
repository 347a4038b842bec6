//! Runner movement, level distance, and knockback.

use runfall_ecs::prelude::*;
use tracing::debug;

use crate::components::{CharacterStats, Knockback, Movement, Position, RunProgress};
use crate::events::{self, LevelCompleted};
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// Moves runners along their direction and emits `LevelCompleted` once per
/// level when the distance reaches the level length.
pub struct MovementSystem;

impl GameSystem for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let frame = *frame;
        let job = ForEach::<(Position, RunProgress)>::new("movement")
            .with::<Movement>()
            .read::<CharacterStats>()
            .run(move |row, item| {
                let (position, progress) = item;
                let owner = row.entity();
                let Some(movement) = row.get::<Movement>(owner) else {
                    return;
                };
                let multiplier = row
                    .get::<CharacterStats>(owner)
                    .map_or(1.0, |s| s.speed_multiplier);
                let step = (movement.speed * multiplier * frame.dt).max(0.0);
                let (dx, dz) = movement.direction();
                position.x += dx * step;
                position.z += dz * step;
                progress.distance += step;

                if !progress.completed && progress.distance >= progress.level_length {
                    progress.completed = true;
                    debug!(entity = ?owner, level = progress.level, "level completed");
                    events::emit(
                        row.log(),
                        frame.frame,
                        LevelCompleted {
                            entity: owner,
                            level: progress.level,
                        },
                    );
                }
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}

/// Applies pending pushes in place and zeroes them.
///
/// The component stays on the entity; a new push added through the log
/// overwrites it and is applied next frame.
pub struct KnockbackSystem;

impl GameSystem for KnockbackSystem {
    fn name(&self) -> &str {
        "knockback"
    }

    fn schedule(
        &self,
        _frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let job = ForEach::<(Position, Knockback)>::new("knockback").run(|_, item| {
            let (position, knockback) = item;
            if knockback.dx == 0.0 && knockback.dz == 0.0 {
                return;
            }
            position.x += knockback.dx;
            position.z += knockback.dz;
            *knockback = Knockback::default();
        });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}
