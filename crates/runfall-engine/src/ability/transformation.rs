//! Transformation: speed and scale multipliers for the active duration.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Ability, AbilityCtx, AbilityKind, AbilityTimer};

/// Temporary change of form: faster and larger while active.
///
/// The configured multipliers are scaled by the owner's ability power at
/// activation and held in the `applied_*` fields, which
/// [`StatsSystem`](crate::systems::StatsSystem) folds into `CharacterStats`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub timer: AbilityTimer,
    /// Configured speed multiplier, before ability power.
    pub speed_multiplier: f32,
    /// Configured size multiplier, before ability power.
    pub scale_multiplier: f32,
    /// Speed multiplier in effect; 1.0 while inactive.
    pub applied_speed: f32,
    /// Size multiplier in effect; 1.0 while inactive.
    pub applied_scale: f32,
}

impl Transformation {
    /// Inactive and ready, with neutral applied multipliers.
    pub fn new(duration: f32, cooldown: f32, speed_multiplier: f32, scale_multiplier: f32) -> Self {
        Self {
            timer: AbilityTimer::new(duration, cooldown),
            speed_multiplier,
            scale_multiplier,
            applied_speed: 1.0,
            applied_scale: 1.0,
        }
    }
}

impl Ability for Transformation {
    const KIND: AbilityKind = AbilityKind::Transformation;
    type Env = ();

    fn timer(&self) -> &AbilityTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut AbilityTimer {
        &mut self.timer
    }

    fn capture(_world: &World) -> Result<(), EcsError> {
        Ok(())
    }

    fn on_activate(&mut self, ctx: &AbilityCtx<'_, '_>, _env: &()) {
        let scale = ctx.power_scale();
        self.applied_speed = self.speed_multiplier * scale;
        self.applied_scale = self.scale_multiplier * scale;
    }

    fn on_end(&mut self, _ctx: &AbilityCtx<'_, '_>, _env: &()) {
        self.applied_speed = 1.0;
        self.applied_scale = 1.0;
    }
}
