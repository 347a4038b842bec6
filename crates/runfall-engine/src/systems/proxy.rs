//! Transient owned entities: visual proxies and summoned allies.
//!
//! Both carry an owner handle that may dangle. Each tick they count down and
//! are destroyed when the countdown runs out or the owner is gone.

use runfall_ecs::prelude::*;
use tracing::trace;

use crate::components::{Ally, Position, VisualProxy};
use crate::rows::{EnemyRow, OwnerRow};
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// Units per second an ally closes on its target.
const ALLY_SPEED: f32 = 6.0;

/// Re-syncs proxies to their owner's position.
pub struct VisualProxySystem;

impl GameSystem for VisualProxySystem {
    fn name(&self) -> &str {
        "visual_proxy"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let owners = world.snapshot::<OwnerRow>()?;
        let dt = frame.dt;
        let job = ForEach::<(VisualProxy, Position)>::new("visual_proxy").run(move |row, item| {
            let (proxy, position) = item;
            proxy.remaining -= dt;
            let owner = row
                .exists(proxy.owner)
                .then(|| owners.find(proxy.owner))
                .flatten();
            match owner {
                Some(owner) if proxy.remaining > 0.0 => *position = owner.position,
                _ => {
                    trace!(proxy = ?row.entity(), owner = ?proxy.owner, "proxy released");
                    row.log().destroy(row.entity());
                }
            }
        });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}

/// Counts allies down and moves them towards their target enemy.
pub struct AllyTickSystem;

impl GameSystem for AllyTickSystem {
    fn name(&self) -> &str {
        "ally_tick"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let enemies = world.snapshot::<EnemyRow>()?;
        let dt = frame.dt;
        let job = ForEach::<(Ally,)>::new("ally_tick")
            .read::<Position>()
            .run(move |row, item| {
                let (ally,) = item;
                let entity = row.entity();
                ally.remaining -= dt;
                if ally.remaining <= 0.0 || !row.exists(ally.owner) {
                    trace!(ally = ?entity, owner = ?ally.owner, "ally dismissed");
                    row.log().destroy(entity);
                    return;
                }

                let target = ally
                    .target
                    .filter(|t| row.exists(*t))
                    .and_then(|t| enemies.find(t));
                let Some(target) = target else {
                    ally.target = None;
                    return;
                };
                let Some(position) = row.get::<Position>(entity) else {
                    return;
                };
                let distance = position.distance_xz(&target.position);
                if distance <= f32::EPSILON {
                    return;
                }
                let step = (ALLY_SPEED * dt).min(distance);
                row.log()
                    .set(entity, position.lerp(&target.position, step / distance));
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}
