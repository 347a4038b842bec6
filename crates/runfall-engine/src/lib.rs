//! Runfall Engine -- deterministic gameplay simulation for an endless runner.
//!
//! This crate builds on [`runfall_ecs`] to provide the game layer: a
//! two-lane [`FrameLoop`](tick::FrameLoop) (fixed-step and variable-step),
//! the generic ability state machine and its concrete abilities, powerups,
//! collectibles, hazards, scoring, progression, and the event entities that
//! carry one-shot records between systems and out to collaborators.
//!
//! # Quick Start
//!
//! ```
//! use runfall_engine::prelude::*;
//!
//! let mut world = World::new();
//! register_components(&mut world);
//! let runner = world
//!     .spawn_bundle(
//!         runner_bundle(Position::default(), 8.0, 500.0)
//!             .with(Dash::new(0.5, 3.0, 2.0)),
//!     )
//!     .unwrap();
//!
//! let mut frame_loop = FrameLoop::new(world, FrameConfig::default()).unwrap();
//! install_default_systems(&mut frame_loop).unwrap();
//!
//! AbilityKind::Dash.request(frame_loop.world_mut(), runner);
//! let report = frame_loop.advance(1.0 / 60.0).unwrap();
//! assert!(report
//!     .events
//!     .iter()
//!     .any(|e| matches!(e, GameEvent::AbilityActivated(a) if a.entity == runner)));
//! ```

#![deny(unsafe_code)]

pub mod ability;
pub mod components;
pub mod config;
pub mod events;
pub mod powerup;
pub mod rows;
pub mod systems;
pub mod tick;
pub mod time;

use runfall_ecs::EcsError;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use runfall_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the frame loop and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A config value is out of range or the document failed to parse.
    #[error("invalid config: {0}")]
    Config(String),

    #[error("system '{system}' depends on unknown system '{dependency}'")]
    UnknownSystem { system: String, dependency: String },

    #[error("system '{name}' is already registered")]
    DuplicateSystem { name: String },

    #[error("system ordering cycle through '{system}'")]
    DependencyCycle { system: String },

    /// Frame deltas must be finite and non-negative.
    #[error("invalid frame delta {dt}")]
    InvalidDelta { dt: f64 },
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install a `tracing` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (for example `"warn"` or `"runfall_engine=debug"`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .try_init()
        .is_ok()
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS prelude.
    pub use runfall_ecs::prelude::*;

    // Engine-specific exports.
    pub use crate::ability::{
        Ability, AbilityKind, AbilitySystem, AbilityTimer, Allies, Aura, Dash, Glitch, Shield,
        Transformation,
    };
    pub use crate::components::{
        register_components, runner_bundle, Ally, Barrier, CharacterStats, CharacterTraits,
        Collectible, CollectibleKind, Collector, Enemy, Hazard, Health, Knockback, Movement,
        Position, Progression, RunProgress, Runner, Score, VisualProxy,
    };
    pub use crate::config::{FrameConfig, GameplayConfig};
    pub use crate::events::GameEvent;
    pub use crate::powerup::{ActivePowerups, PowerupKind};
    pub use crate::systems::{install_default_systems, TutorialProgress, TutorialStep};
    pub use crate::tick::{FnSystem, FrameLoop, FrameReport, GameSystem};
    pub use crate::time::{FrameContext, FrameTime, Lane};
    pub use crate::{init_tracing, EngineError};
}
