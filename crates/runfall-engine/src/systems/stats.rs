//! Folds ability and powerup modifiers into `CharacterStats`.

use runfall_ecs::prelude::*;

use super::gameplay_config;
use crate::ability::{Dash, Transformation};
use crate::components::CharacterStats;
use crate::powerup::{ActivePowerups, PowerupKind};
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// Rebuilds `CharacterStats` from scratch each step.
///
/// `speed_multiplier` is the product of the dash and transformation boosts
/// and, while the speed powerup runs, `speed_boost_multiplier`. Only the
/// transformation changes `scale_multiplier`. Entities without a source get
/// 1.0 for both, so an ended ability leaves no residue.
pub struct StatsSystem;

impl GameSystem for StatsSystem {
    fn name(&self) -> &str {
        "stats"
    }

    fn schedule(
        &self,
        _frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let boost = gameplay_config(world).speed_boost_multiplier;
        let job = ForEach::<(CharacterStats,)>::new("stats")
            .read::<Dash>()
            .read::<Transformation>()
            .read::<ActivePowerups>()
            .run(move |row, item| {
                let (stats,) = item;
                let owner = row.entity();
                let mut speed = 1.0;
                let mut scale = 1.0;
                if let Some(dash) = row.get::<Dash>(owner) {
                    speed *= dash.applied_speed;
                }
                if let Some(transformation) = row.get::<Transformation>(owner) {
                    speed *= transformation.applied_speed;
                    scale *= transformation.applied_scale;
                }
                if row
                    .get::<ActivePowerups>(owner)
                    .is_some_and(|p| p.is_active(PowerupKind::SpeedBoost))
                {
                    speed *= boost;
                }
                stats.speed_multiplier = speed;
                stats.scale_multiplier = scale;
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}
