//! Gameplay components shared across systems.
//!
//! Everything here is plain data. Stored entity handles (`VisualProxy::owner`,
//! `Ally::owner`, `Ally::target`) may dangle; systems check them with
//! `exists()` before use.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ability::{Aura, Allies, Dash, Glitch, Shield, Transformation};
use crate::events;
use crate::powerup::{ActivePowerups, PowerupKind};
use crate::systems::tutorial::TutorialProgress;

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// World-space position. The run advances along +z; x is lateral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Lateral offset from the track centre.
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance on the ground plane.
    pub fn distance_xz(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Linear interpolation towards `other`.
    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

/// Running direction and base speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Direction on the ground plane; need not be normalized.
    pub direction_x: f32,
    pub direction_z: f32,
    /// Units per second before stat multipliers.
    pub speed: f32,
}

impl Movement {
    /// Straight down the track at `speed`.
    pub fn forward(speed: f32) -> Self {
        Self {
            direction_x: 0.0,
            direction_z: 1.0,
            speed,
        }
    }

    /// Unit direction on the ground plane; `(0, 1)` when degenerate.
    pub fn direction(&self) -> (f32, f32) {
        let len = (self.direction_x * self.direction_x + self.direction_z * self.direction_z).sqrt();
        if len > f32::EPSILON && len.is_finite() {
            (self.direction_x / len, self.direction_z / len)
        } else {
            (0.0, 1.0)
        }
    }
}

/// Pending push. The knockback system moves the entity by it and zeroes
/// it; the component stays for the next push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Knockback {
    /// Lateral displacement, applied in one step.
    pub dx: f32,
    pub dz: f32,
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

/// Marks the player-controlled runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Runner;

/// Character traits that scale abilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterTraits {
    /// Cooldown drain rate; clamped to `[0, 1]` when used.
    pub cooldown_drain: f32,
    /// Boosts ability parameters at activation.
    pub ability_power: f32,
    /// Allies summoned is `min(max_allies, ally_affinity * 5)`.
    pub ally_affinity: f32,
}

impl Default for CharacterTraits {
    fn default() -> Self {
        Self {
            cooldown_drain: 1.0,
            ability_power: 0.0,
            ally_affinity: 1.0,
        }
    }
}

impl CharacterTraits {
    /// Cooldown reduction factor in `[0, 1]`. Non-finite drains count as 1.
    pub fn reduction_factor(&self) -> f32 {
        if self.cooldown_drain.is_finite() {
            self.cooldown_drain.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Derived per-frame multipliers, rebuilt by the stats system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    /// Product of every active speed boost; 1 when none.
    pub speed_multiplier: f32,
    /// Product of every active size change; 1 when none.
    pub scale_multiplier: f32,
}

impl Default for CharacterStats {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            scale_multiplier: 1.0,
        }
    }
}

/// Hit points. Hazard contact drains it; nothing drops below zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    /// Full health at `max`.
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }
}

/// Distance covered in the current level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    /// 1-based level number.
    pub level: u32,
    /// Distance run since the level started.
    pub distance: f32,
    /// Distance at which the level counts as completed.
    pub level_length: f32,
    /// Set once `LevelCompleted` has been emitted for this level.
    pub completed: bool,
}

impl RunProgress {
    /// Start of `level`, nothing covered yet.
    pub fn new(level: u32, level_length: f32) -> Self {
        Self {
            level,
            distance: 0.0,
            level_length,
            completed: false,
        }
    }
}

/// Unlock state of the level map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    /// Highest playable level. Level 1 is always unlocked.
    pub highest_unlocked: u32,
    pub levels_completed: u32,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            highest_unlocked: 1,
            levels_completed: 0,
        }
    }
}

/// Running score and combo state, kept by the score system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub total: u64,
    /// Collections inside the current combo window.
    pub combo: u32,
    /// Seconds left before the combo lapses.
    pub combo_timer: f32,
    /// Longest combo this run.
    pub best_combo: u32,
}

// ---------------------------------------------------------------------------
// World objects
// ---------------------------------------------------------------------------

/// Picks up collectibles within `radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collector {
    pub radius: f32,
}

/// What a pickup grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectibleKind {
    Coin,
    Gem,
    /// Starts or refreshes a powerup slot instead of scoring.
    Powerup(PowerupKind),
}

/// An item on the track, destroyed when picked up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    pub kind: CollectibleKind,
    /// Score granted, before multipliers.
    pub value: u32,
}

/// Environmental hazard: meltable by heat, damaging on contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    /// Melted away at zero, which destroys the hazard.
    pub integrity: f32,
    /// Integrity lost per second under full heat.
    pub melt_rate: f32,
    /// Reach of both contact damage and shield blocking.
    pub contact_radius: f32,
    /// Damage per second while in contact.
    pub damage: f32,
}

/// Pushed away by auras and chased by allies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Enemy;

/// Obstacle the barrier teleport can pass through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Barrier;

// ---------------------------------------------------------------------------
// Transient entities
// ---------------------------------------------------------------------------

/// Cosmetic stand-in that follows its owner until `remaining` runs out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualProxy {
    pub owner: EntityId,
    /// Seconds until the proxy is destroyed.
    pub remaining: f32,
}

/// Summoned helper, keyed to the entity whose ability spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ally {
    pub owner: EntityId,
    /// Enemy being chased; cleared once it is gone.
    pub target: Option<EntityId>,
    pub remaining: f32,
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register every component and event type the engine uses.
pub fn register_components(world: &mut World) {
    world.register_component::<Position>("position");
    world.register_component::<Movement>("movement");
    world.register_component::<Knockback>("knockback");
    world.register_component::<Runner>("runner");
    world.register_component::<CharacterTraits>("character_traits");
    world.register_component::<CharacterStats>("character_stats");
    world.register_component::<Health>("health");
    world.register_component::<RunProgress>("run_progress");
    world.register_component::<Progression>("progression");
    world.register_component::<Score>("score");
    world.register_component::<Collector>("collector");
    world.register_component::<Collectible>("collectible");
    world.register_component::<Hazard>("hazard");
    world.register_component::<Enemy>("enemy");
    world.register_component::<Barrier>("barrier");
    world.register_component::<VisualProxy>("visual_proxy");
    world.register_component::<Ally>("ally");
    world.register_component::<ActivePowerups>("active_powerups");
    world.register_component::<TutorialProgress>("tutorial_progress");

    world.register_component::<Dash>("ability_dash");
    world.register_component::<Aura>("ability_aura");
    world.register_component::<Glitch>("ability_glitch");
    world.register_component::<Allies>("ability_allies");
    world.register_component::<Shield>("ability_shield");
    world.register_component::<Transformation>("ability_transformation");

    events::register_events(world);
}

/// The standard runner bundle: position, movement, stats and bookkeeping.
///
/// Abilities are added separately with [`ComponentBundle::with`].
pub fn runner_bundle(position: Position, speed: f32, level_length: f32) -> ComponentBundle {
    ComponentBundle::new()
        .with(Runner)
        .with(position)
        .with(Movement::forward(speed))
        .with(CharacterTraits::default())
        .with(CharacterStats::default())
        .with(Health::full(100.0))
        .with(RunProgress::new(1, level_length))
        .with(Progression::default())
        .with(Score::default())
        .with(Collector { radius: 1.0 })
        .with(ActivePowerups::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_direction_defaults_forward() {
        let m = Movement {
            direction_x: 0.0,
            direction_z: 0.0,
            speed: 1.0,
        };
        assert_eq!(m.direction(), (0.0, 1.0));
        let m = Movement {
            direction_x: 3.0,
            direction_z: 4.0,
            speed: 1.0,
        };
        let (x, z) = m.direction();
        assert!((x - 0.6).abs() < 1e-6 && (z - 0.8).abs() < 1e-6);
    }

    #[test]
    fn reduction_factor_is_clamped() {
        let mut traits = CharacterTraits::default();
        traits.cooldown_drain = 2.5;
        assert_eq!(traits.reduction_factor(), 1.0);
        traits.cooldown_drain = -1.0;
        assert_eq!(traits.reduction_factor(), 0.0);
        traits.cooldown_drain = f32::NAN;
        assert_eq!(traits.reduction_factor(), 1.0);
    }

    #[test]
    fn runner_bundle_spawns_after_registration() {
        let mut world = World::new();
        register_components(&mut world);
        let e = world
            .spawn_bundle(runner_bundle(Position::default(), 5.0, 100.0))
            .unwrap();
        assert!(world.has_component::<Runner>(e));
        assert_eq!(world.get_component::<RunProgress>(e).map(|p| p.level), Some(1));
    }
}
