//! Collectibles: magnet pull and pickup.
//!
//! Both systems snapshot the small set (magnet sources, collectors) and run
//! over the large set of collectibles in parallel.

use runfall_ecs::prelude::*;
use tracing::trace;

use crate::components::{Collectible, CollectibleKind, Position};
use crate::events::{self, CollectibleCollected, PowerupCollected};
use crate::rows::{CollectorRow, MagnetRow};
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// Nearest row within its own radius of `target`, ties to the lower entity
/// index (snapshot order).
fn nearest_in_range<'s, R>(
    snapshot: &'s Snapshot<R>,
    target: &Position,
    reach: impl Fn(&R) -> (Position, f32),
) -> Option<(EntityId, &'s R, f32)> {
    let mut best: Option<(EntityId, &R, f32)> = None;
    for (entity, row) in snapshot.iter() {
        let (position, radius) = reach(row);
        let distance = position.distance_xz(target);
        if distance > radius {
            continue;
        }
        if best.map_or(true, |(_, _, d)| distance < d) {
            best = Some((entity, row, distance));
        }
    }
    best
}

/// Pulls collectibles towards the nearest runner with an active magnet.
pub struct MagnetSystem;

impl GameSystem for MagnetSystem {
    fn name(&self) -> &str {
        "magnet"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let sources = world.snapshot::<MagnetRow>()?;
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let dt = frame.dt;
        let job = ForEach::<(Position,)>::new("magnet")
            .with::<Collectible>()
            .run(move |row, item| {
                let (position,) = item;
                let Some((source, magnet, distance)) =
                    nearest_in_range(&sources, position, |m| (m.position, m.radius))
                else {
                    return;
                };
                if !row.exists(source) || distance <= f32::EPSILON {
                    return;
                }
                let step = (magnet.pull_speed * dt).min(distance);
                *position = position.lerp(&magnet.position, step / distance);
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}

/// Destroys collectibles inside a collector's radius and emits the pickup
/// event for the nearest collector.
pub struct PickupSystem;

impl GameSystem for PickupSystem {
    fn name(&self) -> &str {
        "pickup"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let collectors = world.snapshot::<CollectorRow>()?;
        if collectors.is_empty() {
            return Ok(Vec::new());
        }
        let frame = frame.frame;
        let job = ForEach::<()>::new("pickup")
            .with::<Collectible>()
            .read::<Position>()
            .run(move |row, _| {
                let item = row.entity();
                let (Some(position), Some(collectible)) =
                    (row.get::<Position>(item), row.get::<Collectible>(item))
                else {
                    return;
                };
                let Some((collector, _, _)) =
                    nearest_in_range(&collectors, position, |c| (c.position, c.radius))
                else {
                    return;
                };
                if !row.exists(collector) {
                    return;
                }
                let log = row.log();
                log.destroy(item);
                match collectible.kind {
                    CollectibleKind::Powerup(kind) => {
                        events::emit(log, frame, PowerupCollected { entity: collector, kind });
                    }
                    kind => {
                        events::emit(
                            log,
                            frame,
                            CollectibleCollected {
                                collector,
                                kind,
                                value: collectible.value,
                            },
                        );
                    }
                }
                trace!(collector = ?collector, item = ?item, kind = ?collectible.kind, "collected");
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}
