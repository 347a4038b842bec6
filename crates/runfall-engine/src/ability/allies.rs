//! Allies: summon helpers next to nearby enemies.
//!
//! Up to `min(max_allies, ally_affinity * 5)` allies are spawned at
//! activation, one per detected enemy, nearest first. Each ally carries its
//! own countdown (see [`crate::systems::proxy`]) and all of an owner's
//! allies are destroyed together when the ability ends.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Ability, AbilityCtx, AbilityKind, AbilityTimer};
use crate::components::{Ally, Position};
use crate::rows::{AllyRow, EnemyRow};

/// Allies summoned per point of `ally_affinity`.
const ALLIES_PER_AFFINITY: f32 = 5.0;

/// Half-width of the placement jitter around a target.
const SPAWN_JITTER: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allies {
    pub timer: AbilityTimer,
    pub max_allies: u32,
    pub detect_radius: f32,
    /// Countdown given to each summoned ally.
    pub ally_lifetime: f32,
    /// Allies spawned by the current activation.
    pub summoned: u32,
}

impl Allies {
    pub fn new(duration: f32, cooldown: f32, max_allies: u32, detect_radius: f32) -> Self {
        Self {
            timer: AbilityTimer::new(duration, cooldown),
            max_allies,
            detect_radius,
            ally_lifetime: duration,
            summoned: 0,
        }
    }

    /// Number of allies an owner with `affinity` may summon.
    pub fn summon_limit(&self, affinity: f32) -> u32 {
        let from_trait = (affinity * ALLIES_PER_AFFINITY).floor();
        if from_trait.is_finite() && from_trait > 0.0 {
            self.max_allies.min(from_trait as u32)
        } else {
            0
        }
    }
}

pub struct AlliesEnv {
    pub enemies: Snapshot<EnemyRow>,
    pub allies: Snapshot<AllyRow>,
}

/// Placement RNG seeded from the frame and the owner, so replays match.
fn placement_rng(frame: u64, owner: EntityId) -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(frame.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ owner.to_raw())
}

impl Ability for Allies {
    const KIND: AbilityKind = AbilityKind::Allies;
    type Env = AlliesEnv;

    fn timer(&self) -> &AbilityTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut AbilityTimer {
        &mut self.timer
    }

    fn capture(world: &World) -> Result<AlliesEnv, EcsError> {
        Ok(AlliesEnv {
            enemies: world.snapshot::<EnemyRow>()?,
            allies: world.snapshot::<AllyRow>()?,
        })
    }

    fn on_activate(&mut self, ctx: &AbilityCtx<'_, '_>, env: &AlliesEnv) {
        self.summoned = 0;
        let Some(origin) = ctx.position() else {
            return;
        };
        let limit = self.summon_limit(ctx.traits().ally_affinity) as usize;
        let mut targets: Vec<(f32, EntityId, Position)> = env
            .enemies
            .iter()
            .filter(|(enemy, _)| ctx.row().exists(*enemy))
            .map(|(enemy, row)| (origin.distance_xz(&row.position), enemy, row.position))
            .filter(|(distance, _, _)| *distance <= self.detect_radius)
            .collect();
        targets.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        targets.truncate(limit);

        let mut rng = placement_rng(ctx.frame().frame, ctx.owner());
        for (_, enemy, position) in &targets {
            let spawn_at = Position {
                x: position.x + rng.gen_range(-SPAWN_JITTER..=SPAWN_JITTER),
                y: position.y,
                z: position.z + rng.gen_range(-SPAWN_JITTER..=SPAWN_JITTER),
            };
            ctx.log().create(
                ComponentBundle::new()
                    .with(Ally {
                        owner: ctx.owner(),
                        target: Some(*enemy),
                        remaining: self.ally_lifetime,
                    })
                    .with(spawn_at),
            );
        }
        self.summoned = targets.len() as u32;
        debug!(owner = ?ctx.owner(), summoned = self.summoned, limit, "allies summoned");
    }

    fn on_end(&mut self, ctx: &AbilityCtx<'_, '_>, env: &AlliesEnv) {
        let owner = ctx.owner();
        for (ally, _) in env.allies.iter().filter(|(_, row)| row.ally.owner == owner) {
            ctx.log().destroy(ally);
        }
        self.summoned = 0;
    }
}
