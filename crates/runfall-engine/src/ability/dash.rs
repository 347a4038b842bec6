//! Dash: a short speed boost stepped on the fixed lane.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Ability, AbilityCtx, AbilityKind, AbilityTimer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dash {
    pub timer: AbilityTimer,
    /// Speed multiplier granted while active, before trait scaling.
    pub speed_boost: f32,
    /// Multiplier currently applied; 1 when inactive.
    pub applied_speed: f32,
}

impl Dash {
    pub fn new(duration: f32, cooldown: f32, speed_boost: f32) -> Self {
        Self {
            timer: AbilityTimer::new(duration, cooldown),
            speed_boost,
            applied_speed: 1.0,
        }
    }
}

impl Ability for Dash {
    const KIND: AbilityKind = AbilityKind::Dash;
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
        self.applied_speed = self.speed_boost * ctx.power_scale();
    }

    fn on_end(&mut self, _ctx: &AbilityCtx<'_, '_>, _env: &()) {
        self.applied_speed = 1.0;
    }

    /// Speed trail for the length of the dash.
    fn proxy_lifetime(&self) -> Option<f32> {
        Some(self.timer.duration)
    }
}
