//! Snapshot rows for the secondary sets systems test against.
//!
//! Each row type names its filter and copies just the fields the consuming
//! job needs. Rows are taken at schedule time, so they reflect the world at
//! the start of the lane step.

use runfall_ecs::prelude::*;

use crate::ability::Aura;
use crate::components::{
    Ally, Barrier, CharacterTraits, Collector, Enemy, Hazard, Position, Runner,
};
use crate::config::GameplayConfig;
use crate::powerup::{ActivePowerups, PowerupKind};

/// A hazard and where it sits. Read by contact damage, melting and shields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardRow {
    pub position: Position,
    /// Hazard state as of the step start.
    pub hazard: Hazard,
}

impl SnapshotRow for HazardRow {
    fn filter() -> Filter {
        Filter::new().with::<Hazard>().with::<Position>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            position: *world.get_component::<Position>(entity)?,
            hazard: *world.get_component::<Hazard>(entity)?,
        })
    }
}

/// Enemy position, for aura pushes and ally targeting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyRow {
    pub position: Position,
}

impl SnapshotRow for EnemyRow {
    fn filter() -> Filter {
        Filter::new().with::<Enemy>().with::<Position>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            position: *world.get_component::<Position>(entity)?,
        })
    }
}

/// Barrier position, for glitch target search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierRow {
    pub position: Position,
}

impl SnapshotRow for BarrierRow {
    fn filter() -> Filter {
        Filter::new().with::<Barrier>().with::<Position>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            position: *world.get_component::<Position>(entity)?,
        })
    }
}

/// A summoned ally, for counting and dismissing an owner's allies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllyRow {
    pub ally: Ally,
}

impl SnapshotRow for AllyRow {
    fn filter() -> Filter {
        Filter::new().with::<Ally>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            ally: *world.get_component::<Ally>(entity)?,
        })
    }
}

/// Characters that can own visual proxies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OwnerRow {
    pub position: Position,
}

impl SnapshotRow for OwnerRow {
    fn filter() -> Filter {
        Filter::new().with::<CharacterTraits>().with::<Position>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            position: *world.get_component::<Position>(entity)?,
        })
    }
}

/// Anything that picks up collectibles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectorRow {
    pub position: Position,
    /// Pickup reach.
    pub radius: f32,
}

impl SnapshotRow for CollectorRow {
    fn filter() -> Filter {
        Filter::new().with::<Collector>().with::<Position>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            position: *world.get_component::<Position>(entity)?,
            radius: world.get_component::<Collector>(entity)?.radius,
        })
    }
}

/// Runners with an active magnet powerup. Runners without one are left out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnetRow {
    pub position: Position,
    /// Pull range, from the gameplay config.
    pub radius: f32,
    /// Units per second a collectible moves towards the magnet.
    pub pull_speed: f32,
}

impl SnapshotRow for MagnetRow {
    fn filter() -> Filter {
        Filter::new()
            .with::<Runner>()
            .with::<Position>()
            .with::<ActivePowerups>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        if !world
            .get_component::<ActivePowerups>(entity)?
            .is_active(PowerupKind::Magnet)
        {
            return None;
        }
        let defaults = GameplayConfig::default();
        let config = world.resource::<GameplayConfig>().unwrap_or(&defaults);
        Some(Self {
            position: *world.get_component::<Position>(entity)?,
            radius: config.magnet_radius,
            pull_speed: config.magnet_pull_speed,
        })
    }
}

/// Aura holders with a position. The aura state itself is read live by the
/// melt job, after the aura system has stepped it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuraRow {
    pub position: Position,
}

impl SnapshotRow for AuraRow {
    fn filter() -> Filter {
        Filter::new().with::<Aura>().with::<Position>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            position: *world.get_component::<Position>(entity)?,
        })
    }
}
