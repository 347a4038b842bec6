//! Gameplay systems and the default frame pipeline.
//!
//! Every system follows the same shape: capture the secondary set it tests
//! against into a snapshot, then schedule one parallel job over the primary
//! set. Cross-system effects go through the deferred log or event entities.

pub mod collect;
pub mod hazard;
pub mod movement;
pub mod powerups;
pub mod progression;
pub mod proxy;
pub mod score;
pub mod stats;
pub mod tutorial;

use runfall_ecs::prelude::*;

use crate::ability::{
    Allies, AbilitySystem, Aura, Dash, Glitch, Shield, Transformation,
};
use crate::config::GameplayConfig;
use crate::tick::FrameLoop;
use crate::EngineError;

pub use collect::{MagnetSystem, PickupSystem};
pub use hazard::{HazardContactSystem, MeltSystem};
pub use movement::{KnockbackSystem, MovementSystem};
pub use powerups::PowerupSystem;
pub use progression::ProgressionSystem;
pub use proxy::{AllyTickSystem, VisualProxySystem};
pub use score::ScoreSystem;
pub use stats::StatsSystem;
pub use tutorial::{TutorialProgress, TutorialStep, TutorialSystem};

/// The gameplay config resource, or the defaults when none is installed.
pub(crate) fn gameplay_config(world: &World) -> GameplayConfig {
    world
        .resource::<GameplayConfig>()
        .cloned()
        .unwrap_or_default()
}

/// Register the standard pipeline on `frame_loop`.
///
/// Fixed lane: `dash`, then `glitch`.
///
/// Simulation lane: the ability systems and `powerups` first, with `melt`
/// right after `aura`. `stats` folds ability and powerup modifiers, and
/// `movement` plus everything that touches positions runs after every
/// reader of the old positions.
pub fn install_default_systems(frame_loop: &mut FrameLoop) -> Result<(), EngineError> {
    frame_loop.add_system(AbilitySystem::<Dash>::new())?;
    frame_loop.add_system_after(AbilitySystem::<Glitch>::new(), &["dash"])?;

    frame_loop.add_system(AbilitySystem::<Aura>::new())?;
    frame_loop.add_system_after(MeltSystem, &["aura"])?;
    frame_loop.add_system(AbilitySystem::<Allies>::new())?;
    frame_loop.add_system(AbilitySystem::<Shield>::new())?;
    frame_loop.add_system(AbilitySystem::<Transformation>::new())?;
    frame_loop.add_system(PowerupSystem)?;

    frame_loop.add_system_after(StatsSystem, &["transformation", "powerups"])?;
    frame_loop.add_system_after(MovementSystem, &["stats", "aura", "allies", "shield"])?;
    frame_loop.add_system_after(KnockbackSystem, &["movement"])?;
    frame_loop.add_system_after(MagnetSystem, &["knockback"])?;
    frame_loop.add_system_after(PickupSystem, &["magnet"])?;
    frame_loop.add_system_after(VisualProxySystem, &["pickup"])?;
    frame_loop.add_system_after(AllyTickSystem, &["visual_proxy"])?;
    frame_loop.add_system_after(HazardContactSystem, &["visual_proxy"])?;

    frame_loop.add_system_after(ScoreSystem, &["powerups"])?;
    frame_loop.add_system(ProgressionSystem)?;
    frame_loop.add_system_after(TutorialSystem, &["powerups"])?;
    Ok(())
}
