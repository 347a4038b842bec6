//! Aura: melts nearby hazards and pushes enemies away while active.
//!
//! The aura itself only pushes. Melting is done from the hazard side by
//! [`MeltSystem`](crate::systems::MeltSystem), which sums every pulsing
//! aura in range, so overlapping auras stack. Pushes do not: each aura
//! queues an `add` of [`Knockback`], and the last one in playback order
//! wins.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Ability, AbilityCtx, AbilityKind, AbilityTimer};
use crate::components::{Knockback, Position};
use crate::rows::EnemyRow;

/// Enemies closer than this are pushed as if they were this far away.
const MIN_REPEL_DISTANCE: f32 = 0.5;

/// Heat field around its owner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aura {
    pub timer: AbilityTimer,
    /// Base radius before the power trait.
    pub radius: f32,
    /// Scales each hazard's own melt rate.
    pub melt_factor: f32,
    /// Push strength at unit distance, per second.
    pub repel_force: f32,
    /// Radius in effect; set at activation.
    pub applied_radius: f32,
    /// True after a step in which the aura ran its per-tick effect. Cleared
    /// on activation and on end, so hazards melt only on running ticks.
    pub pulsing: bool,
}

impl Aura {
    pub fn new(duration: f32, cooldown: f32, radius: f32, melt_factor: f32, repel_force: f32) -> Self {
        Self {
            timer: AbilityTimer::new(duration, cooldown),
            radius,
            melt_factor,
            repel_force,
            applied_radius: radius,
            pulsing: false,
        }
    }

    fn repel(&self, ctx: &AbilityCtx<'_, '_>, origin: &Position, enemies: &Snapshot<EnemyRow>) {
        let radius = self.applied_radius;
        for (target, row) in enemies.iter() {
            if !ctx.row().exists(target) {
                continue;
            }
            let distance = origin.distance_xz(&row.position);
            if distance > radius {
                continue;
            }
            let (dir_x, dir_z) = if distance > f32::EPSILON {
                (
                    (row.position.x - origin.x) / distance,
                    (row.position.z - origin.z) / distance,
                )
            } else {
                (1.0, 0.0)
            };
            let strength = self.repel_force / distance.max(MIN_REPEL_DISTANCE) * ctx.dt();
            ctx.log().add(
                target,
                Knockback {
                    dx: dir_x * strength,
                    dz: dir_z * strength,
                },
            );
        }
    }
}

impl Ability for Aura {
    const KIND: AbilityKind = AbilityKind::Aura;
    type Env = Snapshot<EnemyRow>;

    fn timer(&self) -> &AbilityTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut AbilityTimer {
        &mut self.timer
    }

    fn capture(world: &World) -> Result<Snapshot<EnemyRow>, EcsError> {
        world.snapshot::<EnemyRow>()
    }

    fn on_activate(&mut self, ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<EnemyRow>) {
        self.applied_radius = self.radius * ctx.power_scale();
        self.pulsing = false;
    }

    fn on_tick(&mut self, ctx: &AbilityCtx<'_, '_>, enemies: &Snapshot<EnemyRow>) {
        self.pulsing = true;
        let Some(origin) = ctx.position() else {
            trace!(owner = ?ctx.owner(), "aura owner has no position");
            return;
        };
        if self.applied_radius <= 0.0 {
            return;
        }
        self.repel(ctx, &origin, enemies);
    }

    fn on_end(&mut self, _ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<EnemyRow>) {
        self.applied_radius = self.radius;
        self.pulsing = false;
    }
}
