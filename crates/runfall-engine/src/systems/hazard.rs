//! Hazards: contact damage and melting under auras.

use runfall_ecs::prelude::*;
use tracing::{debug, trace};

use super::gameplay_config;
use crate::ability::{Aura, Shield};
use crate::components::{Hazard, Health, Position};
use crate::rows::{AuraRow, HazardRow};
use crate::tick::GameSystem;
use crate::time::FrameContext;

/// Damages every entity with `Health` that stands inside a hazard's contact
/// radius, at `damage * hazard_damage_scale` per second per hazard. A
/// blocking shield stops all of it; the shield ability pays for the hits
/// itself and stops blocking once breached.
pub struct HazardContactSystem;

impl GameSystem for HazardContactSystem {
    fn name(&self) -> &str {
        "hazard_contact"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let hazards = world.snapshot::<HazardRow>()?;
        if hazards.is_empty() {
            return Ok(Vec::new());
        }
        let scale = gameplay_config(world).hazard_damage_scale;
        let dt = frame.dt;
        let job = ForEach::<(Health,)>::new("hazard_contact")
            .read::<Position>()
            .read::<Shield>()
            .run(move |row, item| {
                let (health,) = item;
                let owner = row.entity();
                let Some(position) = row.get::<Position>(owner) else {
                    return;
                };
                if row.get::<Shield>(owner).is_some_and(|s| s.is_blocking()) {
                    return;
                }
                let damage: f32 = hazards
                    .iter()
                    .filter(|(hazard, h)| {
                        row.exists(*hazard)
                            && position.distance_xz(&h.position) <= h.hazard.contact_radius
                    })
                    .map(|(_, h)| h.hazard.damage * scale * dt)
                    .sum();
                if damage > 0.0 {
                    health.current = (health.current - damage).max(0.0);
                    debug!(entity = ?owner, damage, health = health.current, "hazard contact");
                }
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}

/// Melts hazards inside pulsing auras.
///
/// Runs after the aura system and reads each aura's post-step state. A
/// hazard at distance `d` from an aura of radius `r` loses
/// `melt_rate * melt_factor * (1 - d / r) * dt` per aura, summed over every
/// aura in range, and is destroyed through the log once its integrity
/// reaches zero.
pub struct MeltSystem;

impl GameSystem for MeltSystem {
    fn name(&self) -> &str {
        "melt"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let sources = world.snapshot::<AuraRow>()?;
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let hazards = world.snapshot::<HazardRow>()?;
        let dt = frame.dt;
        let job = ForEach::<(Hazard,)>::new("melt")
            .read::<Aura>()
            .run(move |row, item| {
                let (hazard,) = item;
                let entity = row.entity();
                let Some(here) = hazards.find(entity) else {
                    return;
                };
                let melted: f32 = sources
                    .iter()
                    .filter(|(source, _)| row.exists(*source))
                    .filter_map(|(source, aura_row)| {
                        let aura = row.get::<Aura>(source)?;
                        let radius = aura.applied_radius;
                        if !aura.pulsing || radius <= 0.0 {
                            return None;
                        }
                        let distance = aura_row.position.distance_xz(&here.position);
                        (distance <= radius).then(|| {
                            hazard.melt_rate * aura.melt_factor * (1.0 - distance / radius) * dt
                        })
                    })
                    .sum();
                if melted <= 0.0 {
                    return;
                }
                hazard.integrity -= melted;
                if hazard.integrity <= 0.0 {
                    hazard.integrity = 0.0;
                    trace!(hazard = ?entity, "hazard melted");
                    row.log().destroy(entity);
                }
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::register_components;
    use crate::config::FrameConfig;
    use crate::tick::FrameLoop;

    fn hazard_world(shield: Option<Shield>) -> (FrameLoop, EntityId) {
        let mut world = World::new();
        register_components(&mut world);
        let mut runner = ComponentBundle::new()
            .with(Position::default())
            .with(Health::full(100.0));
        if let Some(shield) = shield {
            runner.add(shield);
        }
        let runner = world.spawn_bundle(runner).unwrap();
        for x in [0.5, 20.0] {
            world
                .spawn_bundle(
                    ComponentBundle::new()
                        .with(Position::new(x, 0.0, 0.0))
                        .with(Hazard {
                            integrity: 10.0,
                            melt_rate: 1.0,
                            contact_radius: 1.0,
                            damage: 30.0,
                        }),
                )
                .unwrap();
        }
        let mut frame_loop = FrameLoop::new(world, FrameConfig::default()).unwrap();
        frame_loop.add_system(HazardContactSystem).unwrap();
        (frame_loop, runner)
    }

    #[test]
    fn contact_damages_per_second() {
        let (mut frame_loop, runner) = hazard_world(None);
        frame_loop.advance(0.5).unwrap();
        let health = frame_loop.world().get_component::<Health>(runner).unwrap();
        assert_eq!(health.current, 85.0);
        frame_loop.run_frames(10, 1.0).unwrap();
        let health = frame_loop.world().get_component::<Health>(runner).unwrap();
        assert_eq!(health.current, 0.0);
    }

    #[test]
    fn active_shield_blocks_damage() {
        let mut shield = Shield::new(5.0, 1.0, 3);
        assert!(shield.timer.try_activate());
        shield.charges = 3;
        let (mut frame_loop, runner) = hazard_world(Some(shield));
        frame_loop.advance(0.5).unwrap();
        let health = frame_loop.world().get_component::<Health>(runner).unwrap();
        assert_eq!(health.current, 100.0);
    }

    #[test]
    fn melt_needs_a_pulsing_aura() {
        let mut world = World::new();
        register_components(&mut world);
        let holder = world
            .spawn_bundle(
                ComponentBundle::new()
                    .with(Position::default())
                    .with(Aura::new(5.0, 1.0, 2.0, 1.0, 0.0)),
            )
            .unwrap();
        let hazard = world
            .spawn_bundle(
                ComponentBundle::new()
                    .with(Position::new(1.0, 0.0, 0.0))
                    .with(Hazard {
                        integrity: 3.0,
                        melt_rate: 4.0,
                        contact_radius: 1.0,
                        damage: 0.0,
                    }),
            )
            .unwrap();
        let mut frame_loop = FrameLoop::new(world, FrameConfig::default()).unwrap();
        frame_loop.add_system(MeltSystem).unwrap();

        frame_loop.advance(0.5).unwrap();
        let integrity = frame_loop.world().get_component::<Hazard>(hazard).unwrap().integrity;
        assert_eq!(integrity, 3.0);

        frame_loop
            .world_mut()
            .get_component_mut::<Aura>(holder)
            .unwrap()
            .pulsing = true;
        frame_loop.advance(0.5).unwrap();
        let integrity = frame_loop.world().get_component::<Hazard>(hazard).unwrap().integrity;
        assert_eq!(integrity, 2.0);

        frame_loop.run_frames(2, 0.5).unwrap();
        assert!(!frame_loop.world().is_alive(hazard));
    }
}
