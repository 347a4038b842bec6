//! Glitch: teleport through the nearest barrier ahead.
//!
//! On activation the owner searches a snapshot of barriers for the closest
//! one ahead along its movement direction, within `glitch_distance` and with
//! a lateral offset below the configured limit. While active, the owner's
//! position is eased from its start to just past the barrier with
//! `smoothstep`; once the eased progress exceeds 0.95 it snaps to the end
//! and the ability completes.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{Ability, AbilityCtx, AbilityKind, AbilityTimer};
use crate::components::{Movement, Position};
use crate::rows::BarrierRow;

/// Eased progress past which the teleport is finalized.
const ARRIVAL_THRESHOLD: f32 = 0.95;

/// Smoothstep ease: `p^2 * (3 - 2p)` for `p` clamped to `[0, 1]`.
pub fn smoothstep(p: f32) -> f32 {
    let p = p.clamp(0.0, 1.0);
    p * p * (3.0 - 2.0 * p)
}

/// Closest barrier ahead of `origin` along `direction` (a unit vector on the
/// ground plane), with forward distance in `(0, max_distance]` and lateral
/// offset strictly below `max_lateral`. Returns the barrier and its forward
/// distance. Ties keep the first candidate.
pub fn find_glitch_target<'a>(
    origin: &Position,
    direction: (f32, f32),
    barriers: impl IntoIterator<Item = (EntityId, &'a Position)>,
    max_distance: f32,
    max_lateral: f32,
) -> Option<(EntityId, f32)> {
    let (dir_x, dir_z) = direction;
    let mut best: Option<(EntityId, f32)> = None;
    for (barrier, position) in barriers {
        let rel_x = position.x - origin.x;
        let rel_z = position.z - origin.z;
        let forward = rel_x * dir_x + rel_z * dir_z;
        let lateral = (rel_x * dir_z - rel_z * dir_x).abs();
        if forward <= 0.0 || forward > max_distance || lateral >= max_lateral {
            continue;
        }
        if best.map_or(true, |(_, d)| forward < d) {
            best = Some((barrier, forward));
        }
    }
    best
}

/// Barrier chosen at activation and the path through it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlitchTarget {
    pub barrier: EntityId,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glitch {
    pub timer: AbilityTimer,
    /// Search range ahead of the owner.
    pub glitch_distance: f32,
    pub target: Option<GlitchTarget>,
    pub arrived: bool,
}

impl Glitch {
    pub fn new(duration: f32, cooldown: f32, glitch_distance: f32) -> Self {
        Self {
            timer: AbilityTimer::new(duration, cooldown),
            glitch_distance,
            target: None,
            arrived: false,
        }
    }
}

impl Ability for Glitch {
    const KIND: AbilityKind = AbilityKind::Glitch;
    type Env = Snapshot<BarrierRow>;

    fn timer(&self) -> &AbilityTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut AbilityTimer {
        &mut self.timer
    }

    fn capture(world: &World) -> Result<Snapshot<BarrierRow>, EcsError> {
        world.snapshot::<BarrierRow>()
    }

    fn declare(job: ForEach<(Self,)>) -> ForEach<(Self,)> {
        job.read::<Movement>()
    }

    /// Done once arrived; lost when there was no target or the barrier is
    /// gone.
    fn is_complete(&self, ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<BarrierRow>) -> bool {
        self.arrived
            || self
                .target
                .map_or(true, |target| !ctx.row().exists(target.barrier))
    }

    fn on_activate(&mut self, ctx: &AbilityCtx<'_, '_>, barriers: &Snapshot<BarrierRow>) {
        self.target = None;
        self.arrived = false;
        let Some(origin) = ctx.position() else {
            trace!(owner = ?ctx.owner(), "glitch owner has no position");
            return;
        };
        let direction = ctx
            .row()
            .get::<Movement>(ctx.owner())
            .map_or((0.0, 1.0), Movement::direction);
        let found = find_glitch_target(
            &origin,
            direction,
            barriers.iter().map(|(e, row)| (e, &row.position)),
            self.glitch_distance,
            ctx.config().glitch_max_lateral,
        );
        let Some((barrier, forward)) = found else {
            debug!(owner = ?ctx.owner(), "no barrier in glitch range");
            return;
        };
        let travel = forward + ctx.config().glitch_exit_offset;
        self.target = Some(GlitchTarget {
            barrier,
            start: origin,
            end: Position {
                x: origin.x + direction.0 * travel,
                y: origin.y,
                z: origin.z + direction.1 * travel,
            },
        });
    }

    fn on_tick(&mut self, ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<BarrierRow>) {
        let Some(target) = self.target else {
            return;
        };
        let progress = if self.timer.duration > 0.0 {
            1.0 - self.timer.remaining_time / self.timer.duration
        } else {
            1.0
        };
        let eased = smoothstep(progress);
        if eased > ARRIVAL_THRESHOLD {
            ctx.log().set(ctx.owner(), target.end);
            self.arrived = true;
        } else {
            ctx.log().set(ctx.owner(), target.start.lerp(&target.end, eased));
        }
    }

    fn on_end(&mut self, ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<BarrierRow>) {
        if let Some(target) = self.target.take() {
            if !self.arrived && ctx.row().exists(target.barrier) {
                ctx.log().set(ctx.owner(), target.end);
            }
        }
        self.arrived = false;
    }
}
