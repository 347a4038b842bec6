//! Runfall ECS -- column-based Entity Component System with a parallel job
//! scheduler and a deferred mutation log.
//!
//! Entities are generational ids. Each registered component type owns one
//! column indexed by entity index. Per-frame work runs as jobs: a job declares
//! which component types it reads and writes, the [`Scheduler`](schedule::Scheduler)
//! refuses to run conflicting jobs side by side, and structural changes
//! (spawn, despawn, add/remove/set on other entities) are appended to a
//! [`DeferredMutationLog`](command::DeferredMutationLog) that is played back
//! single-threaded in a deterministic order.
//!
//! # Quick Start
//!
//! ```
//! use runfall_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut world = World::new();
//! world.register_component::<Position>("position");
//! world.register_component::<Velocity>("velocity");
//!
//! let entity = world
//!     .spawn_bundle(
//!         ComponentBundle::new()
//!             .with(Position { x: 0.0, y: 0.0 })
//!             .with(Velocity { dx: 1.0, dy: 0.0 }),
//!     )
//!     .unwrap();
//!
//! let mut scheduler = Scheduler::new();
//! let job = ForEach::<(Position,)>::new("integrate")
//!     .read::<Velocity>()
//!     .run(|ctx, (pos,)| {
//!         if let Some(vel) = ctx.get::<Velocity>(ctx.entity()) {
//!             pos.x += vel.dx;
//!             pos.y += vel.dy;
//!         }
//!     });
//! scheduler.schedule(&world, job, &[]).unwrap();
//!
//! let mut log = DeferredMutationLog::new();
//! scheduler.run(&mut world, &log).unwrap();
//! log.playback(&mut world);
//!
//! assert_eq!(world.get_component::<Position>(entity), Some(&Position { x: 1.0, y: 0.0 }));
//! ```

#![deny(unsafe_code)]

pub mod access;
pub mod command;
pub mod component;
pub mod entity;
pub mod fetch;
pub mod query;
pub mod schedule;
pub mod snapshot;
pub mod storage;
pub mod world;

use access::AccessKind;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered")]
    UnknownComponent { name: String },

    /// A `set` targeted an entity that lacks the component.
    #[error("entity {entity:?} has no '{component}' component")]
    MissingComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// The column is lent to a running job.
    #[error("column '{component}' is lent to a running job")]
    ColumnUnavailable { component: String },

    /// A type-erased value did not match the column's type.
    #[error("value of type {type_name} does not fit column '{component}'")]
    ComponentTypeMismatch {
        component: String,
        type_name: &'static str,
    },

    /// Two jobs without a dependency path touch the same component type and
    /// at least one of them writes it.
    #[error(
        "job '{job}' {ours} '{component}' which job '{other}' {theirs}; \
         declare a dependency between them"
    )]
    AccessConflict {
        job: String,
        other: String,
        component: String,
        ours: AccessKind,
        theirs: AccessKind,
    },

    /// A dependency handle does not belong to this scheduler's current frame.
    #[error("unknown job handle {handle}")]
    UnknownJob { handle: usize },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::access::{Access, AccessKind};
    pub use crate::command::{
        DeferredMutationLog, LogWriter, MutationOp, MutationTarget, PendingEntity, PlaybackReport,
    };
    pub use crate::component::{Component, ComponentKey, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::EntityId;
    pub use crate::fetch::WriteSet;
    pub use crate::query::{Filter, Query, QueryItem, QueryIter};
    pub use crate::schedule::{
        EntityCtx, ForEach, Job, JobHandle, JobView, ScheduleReport, Scheduler, Task,
    };
    pub use crate::snapshot::{Snapshot, SnapshotRow, SnapshotWatch};
    pub use crate::storage::ComponentValue;
    pub use crate::world::{ComponentBundle, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
