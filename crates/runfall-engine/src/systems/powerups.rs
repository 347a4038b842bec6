//! Powerup slots: start on pickup, expire on timeout.

use runfall_ecs::prelude::*;
use tracing::debug;

use crate::events::{self, EventRow, PowerupCollected, PowerupExpired};
use crate::powerup::ActivePowerups;
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// Owns `PowerupCollected`: starts or refreshes the slot and destroys the
/// event. Slots are ticked before new pickups are applied, so a fresh
/// pickup starts at full duration.
pub struct PowerupSystem;

impl GameSystem for PowerupSystem {
    fn name(&self) -> &str {
        "powerups"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let collected = world.snapshot::<EventRow<PowerupCollected>>()?;
        let frame = *frame;
        let job = ForEach::<(ActivePowerups,)>::new("powerups").run(move |row, item| {
            let (powerups,) = item;
            let owner = row.entity();
            let log = row.log();

            let expired = powerups.tick(frame.dt);

            let mut started = Vec::new();
            for (event, record) in collected.iter() {
                if record.event.entity != owner {
                    continue;
                }
                powerups.start(record.event.kind);
                started.push(record.event.kind);
                log.destroy(event);
                debug!(entity = ?owner, powerup = record.event.kind.name(), "powerup started");
            }

            for kind in expired.into_iter().filter(|k| !started.contains(k)) {
                debug!(entity = ?owner, powerup = kind.name(), "powerup expired");
                events::emit(log, frame.frame, PowerupExpired { entity: owner, kind });
            }
        });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}
