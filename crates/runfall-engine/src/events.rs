//! Event entities: one-shot records used as the only channel between
//! producer and consumer systems.
//!
//! An event is a fresh entity carrying an [`EventStamp`] plus exactly one
//! event component. Producers create it through the deferred log with
//! [`emit`]; the frame loop reports it to collaborators as a [`GameEvent`]
//! when the log is played back. Consumers read events from a snapshot; an
//! event whose effect must apply once (a pickup, a completed level) has a
//! single owning consumer that destroys it. Events left behind by observers
//! are swept once they are older than the current frame.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ability::AbilityKind;
use crate::components::{CollectibleKind, Position};
use crate::powerup::PowerupKind;
use crate::systems::tutorial::TutorialStep;

/// Frame in which the event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStamp {
    /// Frame counter at emission.
    pub frame: u64,
}

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

/// An ability went active this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityActivated {
    pub entity: EntityId,
    pub kind: AbilityKind,
    /// Owner position at activation, for effects spawned on the spot.
    pub position: Position,
    /// Configured active duration.
    pub duration: f32,
}

/// An ability left its active state, by timeout or by completing early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityEnded {
    pub entity: EntityId,
    pub kind: AbilityKind,
}

/// The cooldown of an ability reached zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityReady {
    pub entity: EntityId,
    pub kind: AbilityKind,
}

/// A collectible was picked up. Owned by the score system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectibleCollected {
    /// Runner that picked it up.
    pub collector: EntityId,
    pub kind: CollectibleKind,
    /// Base value, before the score multiplier.
    pub value: u32,
}

/// A powerup pickup was collected. Owned by the powerup system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerupCollected {
    pub entity: EntityId,
    pub kind: PowerupKind,
}

/// A powerup slot ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerupExpired {
    pub entity: EntityId,
    pub kind: PowerupKind,
}

/// Score changed this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdated {
    pub entity: EntityId,
    /// Score after the change.
    pub total: u64,
}

/// The combo reached a multiple of `combo_milestone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboMilestone {
    pub entity: EntityId,
    pub combo: u32,
}

/// The combo window lapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboEnded {
    pub entity: EntityId,
    /// Combo length when it lapsed.
    pub combo: u32,
}

/// The runner covered the level length. Owned by progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCompleted {
    pub entity: EntityId,
    pub level: u32,
}

/// The next level became playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUnlocked {
    pub entity: EntityId,
    /// Level that was unlocked.
    pub level: u32,
}

/// The unlocked level starts a new world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldUnlocked {
    pub entity: EntityId,
    pub world: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialStepCompleted {
    pub entity: EntityId,
    pub step: TutorialStep,
}

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// Every event record, as delivered to collaborators in
/// [`FrameReport::events`](crate::tick::FrameReport::events).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    AbilityActivated(AbilityActivated),
    AbilityEnded(AbilityEnded),
    AbilityReady(AbilityReady),
    CollectibleCollected(CollectibleCollected),
    PowerupCollected(PowerupCollected),
    PowerupExpired(PowerupExpired),
    ScoreUpdated(ScoreUpdated),
    ComboMilestone(ComboMilestone),
    ComboEnded(ComboEnded),
    LevelCompleted(LevelCompleted),
    LevelUnlocked(LevelUnlocked),
    WorldUnlocked(WorldUnlocked),
    TutorialStepCompleted(TutorialStepCompleted),
}

impl GameEvent {
    /// The entity the event is about.
    pub fn subject(&self) -> EntityId {
        match self {
            GameEvent::AbilityActivated(e) => e.entity,
            GameEvent::AbilityEnded(e) => e.entity,
            GameEvent::AbilityReady(e) => e.entity,
            GameEvent::CollectibleCollected(e) => e.collector,
            GameEvent::PowerupCollected(e) => e.entity,
            GameEvent::PowerupExpired(e) => e.entity,
            GameEvent::ScoreUpdated(e) => e.entity,
            GameEvent::ComboMilestone(e) => e.entity,
            GameEvent::ComboEnded(e) => e.entity,
            GameEvent::LevelCompleted(e) => e.entity,
            GameEvent::LevelUnlocked(e) => e.entity,
            GameEvent::WorldUnlocked(e) => e.entity,
            GameEvent::TutorialStepCompleted(e) => e.entity,
        }
    }
}

/// A component that is an event record.
pub trait EventRecord: Component + Copy {
    /// Registered component name.
    const NAME: &'static str;

    /// Wrap the record for collaborators.
    fn into_event(self) -> GameEvent;
}

macro_rules! event_record {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            impl EventRecord for $ty {
                const NAME: &'static str = $name;

                fn into_event(self) -> GameEvent {
                    GameEvent::$ty(self)
                }
            }
        )*

        /// Readers for every event kind, tried in order.
        const EVENT_READERS: &[fn(&World, EntityId) -> Option<GameEvent>] = &[
            $(read_record::<$ty>,)*
        ];

        /// Register [`EventStamp`] and every event record type.
        pub fn register_events(world: &mut World) {
            world.register_component::<EventStamp>("event_stamp");
            $(world.register_component::<$ty>(<$ty as EventRecord>::NAME);)*
        }
    };
}

event_record! {
    AbilityActivated => "event_ability_activated",
    AbilityEnded => "event_ability_ended",
    AbilityReady => "event_ability_ready",
    CollectibleCollected => "event_collectible_collected",
    PowerupCollected => "event_powerup_collected",
    PowerupExpired => "event_powerup_expired",
    ScoreUpdated => "event_score_updated",
    ComboMilestone => "event_combo_milestone",
    ComboEnded => "event_combo_ended",
    LevelCompleted => "event_level_completed",
    LevelUnlocked => "event_level_unlocked",
    WorldUnlocked => "event_world_unlocked",
    TutorialStepCompleted => "event_tutorial_step_completed",
}

fn read_record<E: EventRecord>(world: &World, entity: EntityId) -> Option<GameEvent> {
    world.get_component::<E>(entity).map(|e| e.into_event())
}

/// The event carried by `entity`, if it is an event entity.
pub fn read_event(world: &World, entity: EntityId) -> Option<GameEvent> {
    if !world.has_component::<EventStamp>(entity) {
        return None;
    }
    EVENT_READERS.iter().find_map(|read| read(world, entity))
}

/// Queue an event entity carrying `event`, stamped with `frame`.
pub fn emit<E: EventRecord>(log: &LogWriter<'_>, frame: u64, event: E) -> PendingEntity {
    log.create(ComponentBundle::new().with(EventStamp { frame }).with(event))
}

/// Event entities stamped before `frame`.
pub fn stale_events(world: &World, frame: u64) -> Vec<EntityId> {
    world
        .query::<(&EventStamp,)>()
        .filter(|(_, (stamp,))| stamp.frame < frame)
        .map(|(entity, _)| entity)
        .collect()
}

// ---------------------------------------------------------------------------
// Snapshot rows
// ---------------------------------------------------------------------------

/// Snapshot row for consumers of one event kind.
#[derive(Debug, Clone, Copy)]
pub struct EventRow<E> {
    pub stamp: EventStamp,
    /// The record itself, copied out of the world.
    pub event: E,
}

impl<E: EventRecord> SnapshotRow for EventRow<E> {
    fn filter() -> Filter {
        Filter::new().with::<EventStamp>().with::<E>()
    }

    fn fetch(world: &World, entity: EntityId) -> Option<Self> {
        Some(Self {
            stamp: *world.get_component::<EventStamp>(entity)?,
            event: *world.get_component::<E>(entity)?,
        })
    }
}
