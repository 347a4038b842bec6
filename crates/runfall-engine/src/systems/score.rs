//! Score and combo.
//!
//! Owns `CollectibleCollected`. Every collection adds `value` (times the
//! score multiplier while that powerup runs) and extends the combo; a combo
//! that sees no collection for `combo_window` seconds lapses.

use runfall_ecs::prelude::*;
use tracing::{debug, trace};

use super::gameplay_config;
use crate::components::Score;
use crate::events::{self, CollectibleCollected, ComboEnded, ComboMilestone, EventRow, ScoreUpdated};
use crate::powerup::{ActivePowerups, PowerupKind};
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// Consumes this frame's collections per collector and emits
/// `ScoreUpdated`, `ComboMilestone` and `ComboEnded` as they happen.
///
/// The combo timer only counts down on frames with no collection.
pub struct ScoreSystem;

impl GameSystem for ScoreSystem {
    fn name(&self) -> &str {
        "score"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let collected = world.snapshot::<EventRow<CollectibleCollected>>()?;
        let config = gameplay_config(world);
        let frame = *frame;
        let job = ForEach::<(Score,)>::new("score")
            .read::<ActivePowerups>()
            .run(move |row, item| {
                let (score,) = item;
                let owner = row.entity();
                let log = row.log();
                let multiplier = if row
                    .get::<ActivePowerups>(owner)
                    .is_some_and(|p| p.is_active(PowerupKind::ScoreMultiplier))
                {
                    u64::from(config.score_multiplier)
                } else {
                    1
                };

                let before = score.total;
                let mut any = false;
                for (event, record) in collected.iter() {
                    if record.event.collector != owner {
                        continue;
                    }
                    any = true;
                    log.destroy(event);
                    score.total += u64::from(record.event.value) * multiplier;
                    score.combo += 1;
                    score.best_combo = score.best_combo.max(score.combo);
                    score.combo_timer = config.combo_window;
                    if config.combo_milestone > 0 && score.combo % config.combo_milestone == 0 {
                        debug!(entity = ?owner, combo = score.combo, "combo milestone");
                        events::emit(
                            log,
                            frame.frame,
                            ComboMilestone {
                                entity: owner,
                                combo: score.combo,
                            },
                        );
                    }
                }

                if !any && score.combo > 0 {
                    score.combo_timer -= frame.dt;
                    if score.combo_timer <= 0.0 {
                        trace!(entity = ?owner, combo = score.combo, "combo lapsed");
                        events::emit(
                            log,
                            frame.frame,
                            ComboEnded {
                                entity: owner,
                                combo: score.combo,
                            },
                        );
                        score.combo = 0;
                        score.combo_timer = 0.0;
                    }
                }

                if score.total != before {
                    events::emit(
                        log,
                        frame.frame,
                        ScoreUpdated {
                            entity: owner,
                            total: score.total,
                        },
                    );
                }
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}
