//! The generic ability state machine and its concrete instances.
//!
//! Every ability component embeds an [`AbilityTimer`] and implements
//! [`Ability`]. One [`AbilitySystem`] per ability type schedules a
//! `ForEach` job that writes the ability component in place and steps the
//! timer for every owner in parallel:
//!
//! 1. **Active**: `remaining_time -= dt`. When it reaches 0, or the
//!    ability's completion condition holds, the ability ends: stat
//!    modifiers are reverted, `cooldown_remaining` is reset to `cooldown`
//!    and `AbilityEnded` is emitted. Otherwise the per-tick effect runs.
//! 2. **Cooldown**: while inactive (and not on the tick the ability ended),
//!    `cooldown_remaining` drains by `dt * reduction_factor`, clamped to 0.
//!    Reaching 0 emits `AbilityReady`.
//! 3. **Request**: a pending activation request is consumed. It activates
//!    the ability only when `!is_active && cooldown_remaining <= 0`;
//!    otherwise it is dropped.
//!
//! Effects on other entities (melting hazards, spawning allies, moving the
//! owner through a barrier) go through the deferred log. Secondary sets are
//! captured as snapshots before the job is scheduled.

pub mod allies;
pub mod aura;
pub mod dash;
pub mod glitch;
pub mod shield;
pub mod transformation;

use std::marker::PhantomData;

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::components::{CharacterTraits, Position, VisualProxy};
use crate::config::GameplayConfig;
use crate::events::{self, AbilityActivated, AbilityEnded, AbilityReady, EventRecord};
use crate::tick::GameSystem;
use crate::time::{FrameContext, Lane};

pub use allies::Allies;
pub use aura::Aura;
pub use dash::Dash;
pub use glitch::{find_glitch_target, smoothstep, Glitch, GlitchTarget};
pub use shield::Shield;
pub use transformation::Transformation;

// ---------------------------------------------------------------------------
// AbilityTimer
// ---------------------------------------------------------------------------

/// The Inactive / Active / cooldown timer shared by every ability and by
/// powerup slots.
///
/// Invariants: `remaining_time >= 0` and `cooldown_remaining >= 0` after
/// every operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityTimer {
    pub is_active: bool,
    /// Seconds of activity left; 0 while inactive.
    pub remaining_time: f32,
    /// Active duration, never negative.
    pub duration: f32,
    /// Seconds until the next activation is allowed. Starts at `cooldown`
    /// on activation and drains only while inactive.
    pub cooldown_remaining: f32,
    pub cooldown: f32,
    /// One-shot request flag. Set by the producer (input, AI), cleared by
    /// the ability system on the tick it evaluates it.
    pub activation_requested: bool,
}

/// Outcome of [`AbilityTimer::tick_active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTick {
    /// Not active; nothing happened.
    Idle,
    /// Still active after the countdown.
    Running,
    /// Transitioned to inactive this tick.
    Ended,
}

impl ActiveTick {
    pub fn ended(self) -> bool {
        self == ActiveTick::Ended
    }
}

impl AbilityTimer {
    /// Inactive, ready, no request pending.
    pub fn new(duration: f32, cooldown: f32) -> Self {
        Self {
            is_active: false,
            remaining_time: 0.0,
            duration: duration.max(0.0),
            cooldown_remaining: 0.0,
            cooldown: cooldown.max(0.0),
            activation_requested: false,
        }
    }

    /// Ask for activation on the next tick.
    pub fn request(&mut self) {
        self.activation_requested = true;
    }

    /// Consume the request flag.
    pub fn take_request(&mut self) -> bool {
        std::mem::take(&mut self.activation_requested)
    }

    /// Inactive with the cooldown spent.
    pub fn can_activate(&self) -> bool {
        !self.is_active && self.cooldown_remaining <= 0.0
    }

    /// Inactive -> Active. Returns false, changing nothing, when not legal.
    pub fn try_activate(&mut self) -> bool {
        if !self.can_activate() {
            return false;
        }
        self.is_active = true;
        self.remaining_time = self.duration;
        self.cooldown_remaining = self.cooldown;
        true
    }

    /// Force Active at full duration, ignoring cooldown. Powerup pickups use
    /// this to start or extend a slot.
    pub fn refresh(&mut self) {
        self.is_active = true;
        self.remaining_time = self.duration;
    }

    /// Active -> Inactive. A no-op returning false when already inactive.
    pub fn end(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.remaining_time = 0.0;
        self.cooldown_remaining = self.cooldown;
        true
    }

    /// Step 1: count down the active time and end on expiry or `complete`.
    pub fn tick_active(&mut self, dt: f32, complete: bool) -> ActiveTick {
        if !self.is_active {
            return ActiveTick::Idle;
        }
        self.remaining_time = (self.remaining_time - dt.max(0.0)).max(0.0);
        if self.remaining_time <= 0.0 || complete {
            self.end();
            ActiveTick::Ended
        } else {
            ActiveTick::Running
        }
    }

    /// Step 2: drain the cooldown. Returns true when it reached 0 on this
    /// call.
    pub fn drain_cooldown(&mut self, dt: f32, reduction_factor: f32) -> bool {
        if self.cooldown_remaining <= 0.0 {
            return false;
        }
        let factor = if reduction_factor.is_finite() {
            reduction_factor.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.cooldown_remaining -= dt.max(0.0) * factor;
        if self.cooldown_remaining <= 0.0 {
            self.cooldown_remaining = 0.0;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// AbilityKind dispatch table
// ---------------------------------------------------------------------------

/// Concrete ability types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    Dash,
    Aura,
    Glitch,
    Allies,
    Shield,
    Transformation,
}

/// Static data and type-erased entry points for one ability kind.
pub struct AbilityDescriptor {
    pub kind: AbilityKind,
    /// System name and diagnostic label.
    pub name: &'static str,
    pub lane: Lane,
    request: fn(&mut World, EntityId) -> bool,
    timer: fn(&World, EntityId) -> Option<AbilityTimer>,
}

impl std::fmt::Debug for AbilityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("lane", &self.lane)
            .finish()
    }
}

fn request_on<A: Ability>(world: &mut World, entity: EntityId) -> bool {
    match world.get_component_mut::<A>(entity) {
        Some(ability) => {
            ability.timer_mut().request();
            true
        }
        None => false,
    }
}

fn timer_of<A: Ability>(world: &World, entity: EntityId) -> Option<AbilityTimer> {
    world.get_component::<A>(entity).map(|a| *a.timer())
}

/// Indexed by [`AbilityKind::index`].
static ABILITY_TABLE: [AbilityDescriptor; 6] = [
    AbilityDescriptor {
        kind: AbilityKind::Dash,
        name: "dash",
        lane: Lane::Fixed,
        request: request_on::<Dash>,
        timer: timer_of::<Dash>,
    },
    AbilityDescriptor {
        kind: AbilityKind::Aura,
        name: "aura",
        lane: Lane::Simulation,
        request: request_on::<Aura>,
        timer: timer_of::<Aura>,
    },
    AbilityDescriptor {
        kind: AbilityKind::Glitch,
        name: "glitch",
        lane: Lane::Fixed,
        request: request_on::<Glitch>,
        timer: timer_of::<Glitch>,
    },
    AbilityDescriptor {
        kind: AbilityKind::Allies,
        name: "allies",
        lane: Lane::Simulation,
        request: request_on::<Allies>,
        timer: timer_of::<Allies>,
    },
    AbilityDescriptor {
        kind: AbilityKind::Shield,
        name: "shield",
        lane: Lane::Simulation,
        request: request_on::<Shield>,
        timer: timer_of::<Shield>,
    },
    AbilityDescriptor {
        kind: AbilityKind::Transformation,
        name: "transformation",
        lane: Lane::Simulation,
        request: request_on::<Transformation>,
        timer: timer_of::<Transformation>,
    },
];

impl AbilityKind {
    pub const ALL: [AbilityKind; 6] = [
        AbilityKind::Dash,
        AbilityKind::Aura,
        AbilityKind::Glitch,
        AbilityKind::Allies,
        AbilityKind::Shield,
        AbilityKind::Transformation,
    ];

    fn index(self) -> usize {
        match self {
            AbilityKind::Dash => 0,
            AbilityKind::Aura => 1,
            AbilityKind::Glitch => 2,
            AbilityKind::Allies => 3,
            AbilityKind::Shield => 4,
            AbilityKind::Transformation => 5,
        }
    }

    pub fn descriptor(self) -> &'static AbilityDescriptor {
        &ABILITY_TABLE[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ABILITY_TABLE.iter().find(|d| d.name == name).map(|d| d.kind)
    }

    /// Set the activation request flag on `entity`'s ability of this kind.
    /// Returns false when the entity is gone or lacks the ability.
    pub fn request(self, world: &mut World, entity: EntityId) -> bool {
        (self.descriptor().request)(world, entity)
    }

    /// Copy of `entity`'s timer for this kind.
    pub fn timer(self, world: &World, entity: EntityId) -> Option<AbilityTimer> {
        (self.descriptor().timer)(world, entity)
    }
}

impl std::fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Ability trait
// ---------------------------------------------------------------------------

/// Per-row context handed to ability hooks.
pub struct AbilityCtx<'r, 'a> {
    row: &'r EntityCtx<'a>,
    frame: FrameContext,
    traits: CharacterTraits,
    config: &'r GameplayConfig,
}

impl<'r, 'a> AbilityCtx<'r, 'a> {
    /// The entity owning the ability.
    pub fn owner(&self) -> EntityId {
        self.row.entity()
    }

    pub fn row(&self) -> &'r EntityCtx<'a> {
        self.row
    }

    pub fn frame(&self) -> &FrameContext {
        &self.frame
    }

    pub fn dt(&self) -> f32 {
        self.frame.dt
    }

    pub fn traits(&self) -> &CharacterTraits {
        &self.traits
    }

    pub fn config(&self) -> &GameplayConfig {
        self.config
    }

    /// Owner position, if it has one.
    pub fn position(&self) -> Option<Position> {
        self.row.get::<Position>(self.owner()).copied()
    }

    /// Multiplier for activation-time stat boosts:
    /// `1 + ability_power * trait_coefficient`.
    pub fn power_scale(&self) -> f32 {
        1.0 + self.traits.ability_power * self.config.trait_coefficient
    }

    pub fn log(&self) -> &LogWriter<'a> {
        self.row.log()
    }

    /// Queue an event entity.
    pub fn emit<E: EventRecord>(&self, event: E) -> PendingEntity {
        events::emit(self.row.log(), self.frame.frame, event)
    }
}

/// An ability component driven by the generic state machine.
///
/// Hooks default to doing nothing, so a pure stat-modifier ability only
/// implements the timer accessors and `on_activate` / `on_end`.
pub trait Ability: Component + Sized {
    const KIND: AbilityKind;

    /// Read-only data captured before the job is scheduled.
    type Env: Send + Sync + 'static;

    fn timer(&self) -> &AbilityTimer;

    fn timer_mut(&mut self) -> &mut AbilityTimer;

    /// Snapshot the secondary sets this ability interacts with.
    fn capture(world: &World) -> Result<Self::Env, EcsError>;

    /// Declare component reads beyond `Position` and `CharacterTraits`.
    fn declare(job: ForEach<(Self,)>) -> ForEach<(Self,)> {
        job
    }

    /// Ability-specific completion condition, checked while active.
    fn is_complete(&self, _ctx: &AbilityCtx<'_, '_>, _env: &Self::Env) -> bool {
        false
    }

    /// Apply stat modifiers and pick targets.
    fn on_activate(&mut self, _ctx: &AbilityCtx<'_, '_>, _env: &Self::Env) {}

    /// Per-tick effect while active.
    fn on_tick(&mut self, _ctx: &AbilityCtx<'_, '_>, _env: &Self::Env) {}

    /// Revert stat modifiers and release owned entities.
    fn on_end(&mut self, _ctx: &AbilityCtx<'_, '_>, _env: &Self::Env) {}

    /// Lifetime of the visual proxy spawned on activation, if any.
    fn proxy_lifetime(&self) -> Option<f32> {
        None
    }
}

/// One state-machine tick for one owner.
pub fn tick_ability<A: Ability>(
    row: &EntityCtx<'_>,
    ability: &mut A,
    env: &A::Env,
    frame: &FrameContext,
    config: &GameplayConfig,
) {
    let owner = row.entity();
    let traits = row
        .get::<CharacterTraits>(owner)
        .copied()
        .unwrap_or_default();
    let ctx = AbilityCtx {
        row,
        frame: *frame,
        traits,
        config,
    };

    let complete = ability.timer().is_active && ability.is_complete(&ctx, env);
    let ended = match ability.timer_mut().tick_active(frame.dt, complete) {
        ActiveTick::Ended => {
            ability.on_end(&ctx, env);
            ctx.emit(AbilityEnded {
                entity: owner,
                kind: A::KIND,
            });
            debug!(entity = ?owner, ability = %A::KIND, complete, "ability ended");
            true
        }
        ActiveTick::Running => {
            ability.on_tick(&ctx, env);
            false
        }
        ActiveTick::Idle => false,
    };

    if !ended
        && !ability.timer().is_active
        && ability
            .timer_mut()
            .drain_cooldown(frame.dt, traits.reduction_factor())
    {
        ctx.emit(AbilityReady {
            entity: owner,
            kind: A::KIND,
        });
        trace!(entity = ?owner, ability = %A::KIND, "ability ready");
    }

    if ability.timer_mut().take_request() {
        if ability.timer_mut().try_activate() {
            ability.on_activate(&ctx, env);
            let position = ctx.position().unwrap_or_default();
            ctx.emit(AbilityActivated {
                entity: owner,
                kind: A::KIND,
                position,
                duration: ability.timer().duration,
            });
            if let Some(lifetime) = ability.proxy_lifetime().filter(|l| *l > 0.0) {
                ctx.log().create(
                    ComponentBundle::new()
                        .with(VisualProxy {
                            owner,
                            remaining: lifetime,
                        })
                        .with(position),
                );
            }
            debug!(entity = ?owner, ability = %A::KIND, "ability activated");
        } else {
            trace!(
                entity = ?owner,
                ability = %A::KIND,
                active = ability.timer().is_active,
                cooldown = ability.timer().cooldown_remaining,
                "activation request dropped"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// AbilitySystem
// ---------------------------------------------------------------------------

/// Frame-loop system stepping every `A` component.
pub struct AbilitySystem<A> {
    _ability: PhantomData<fn() -> A>,
}

impl<A> AbilitySystem<A> {
    pub fn new() -> Self {
        Self {
            _ability: PhantomData,
        }
    }
}

impl<A> Default for AbilitySystem<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Ability> GameSystem for AbilitySystem<A> {
    fn name(&self) -> &str {
        A::KIND.name()
    }

    fn lane(&self) -> Lane {
        A::KIND.descriptor().lane
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let env = A::capture(world)?;
        let config = world
            .resource::<GameplayConfig>()
            .cloned()
            .unwrap_or_default();
        let frame = *frame;
        let job = A::declare(
            ForEach::<(A,)>::new(A::KIND.name())
                .read::<Position>()
                .read::<CharacterTraits>(),
        )
        .run(move |row, item| {
            let (ability,) = item;
            tick_ability(row, ability, &env, &frame, &config);
        });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}
