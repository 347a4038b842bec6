//! Read-only snapshot arrays of a secondary entity set.
//!
//! Systems that test a large primary set against a small secondary set
//! (hazards, magnet sources, barriers) copy the secondary set into a
//! [`Snapshot`] before scheduling the primary job. The job captures the
//! snapshot by value; it is shared behind an `Arc` and cannot be mutated.
//! Changes to the live secondary entities go through the deferred log.
//!
//! The snapshot is released when the last clone is dropped, which happens
//! when the scheduler drops the jobs that captured it at the end of
//! [`Scheduler::run`](crate::schedule::Scheduler::run).
//! A [`SnapshotWatch`] observes the release without keeping the data alive.

use std::sync::{Arc, Weak};

use crate::entity::EntityId;
use crate::query::Filter;
use crate::world::World;
use crate::EcsError;

/// One row of a snapshot: the component values a primary job needs from a
/// secondary entity.
pub trait SnapshotRow: Send + Sync + Sized + 'static {
    /// Default filter selecting the secondary set.
    fn filter() -> Filter;

    /// Copy the row for `entity`. `None` skips the entity.
    fn fetch(world: &World, entity: EntityId) -> Option<Self>;
}

struct SnapshotData<R> {
    entities: Vec<EntityId>,
    rows: Vec<R>,
    /// Only ever strongly held here; watches hold weak references.
    token: Arc<()>,
}

impl<R> Drop for SnapshotData<R> {
    fn drop(&mut self) {
        tracing::trace!(
            rows = self.rows.len(),
            row_type = std::any::type_name::<R>(),
            "snapshot released"
        );
    }
}

/// Immutable, point-in-time copy of a query's matching entities and rows.
///
/// `entities[i]` owns `rows[i]`; entities are in ascending index order.
pub struct Snapshot<R> {
    data: Arc<SnapshotData<R>>,
}

impl<R> Clone for Snapshot<R> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for Snapshot<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("entities", &self.data.entities)
            .field("rows", &self.data.rows)
            .finish()
    }
}

impl<R> Snapshot<R> {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.rows.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.data.rows.is_empty()
    }

    /// Entity ids, parallel to [`rows`](Self::rows).
    pub fn entities(&self) -> &[EntityId] {
        &self.data.entities
    }

    /// Row values, parallel to [`entities`](Self::entities).
    pub fn rows(&self) -> &[R] {
        &self.data.rows
    }

    /// Iterate `(entity, row)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &R)> + '_ {
        self.data
            .entities
            .iter()
            .copied()
            .zip(self.data.rows.iter())
    }

    /// Row captured for `entity`, if it was in the set.
    pub fn find(&self, entity: EntityId) -> Option<&R> {
        let pos = self
            .data
            .entities
            .binary_search_by_key(&entity.index(), |e| e.index())
            .ok()?;
        (self.data.entities[pos] == entity).then(|| &self.data.rows[pos])
    }

    /// A handle that reports when every clone has been dropped.
    pub fn watch(&self) -> SnapshotWatch {
        SnapshotWatch {
            token: Arc::downgrade(&self.data.token),
        }
    }
}

/// Observes a snapshot's lifetime without extending it.
#[derive(Clone)]
pub struct SnapshotWatch {
    token: Weak<()>,
}

impl SnapshotWatch {
    /// Whether the snapshot has been released.
    pub fn is_released(&self) -> bool {
        self.token.strong_count() == 0
    }
}

impl std::fmt::Debug for SnapshotWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWatch")
            .field("released", &self.is_released())
            .finish()
    }
}

impl World {
    /// Materialize the entities matching `filter` into a [`Snapshot`].
    ///
    /// Entities for which [`SnapshotRow::fetch`] returns `None` are left out.
    pub fn to_array<R: SnapshotRow>(&self, filter: &Filter) -> Result<Snapshot<R>, EcsError> {
        let matched = self.matching(filter)?;
        let mut entities = Vec::with_capacity(matched.len());
        let mut rows = Vec::with_capacity(matched.len());
        for entity in matched {
            if let Some(row) = R::fetch(self, entity) {
                entities.push(entity);
                rows.push(row);
            }
        }
        tracing::trace!(
            rows = rows.len(),
            row_type = std::any::type_name::<R>(),
            "snapshot captured"
        );
        Ok(Snapshot {
            data: Arc::new(SnapshotData {
                entities,
                rows,
                token: Arc::new(()),
            }),
        })
    }

    /// [`to_array`](Self::to_array) with the row type's default filter.
    pub fn snapshot<R: SnapshotRow>(&self) -> Result<Snapshot<R>, EcsError> {
        self.to_array(&R::filter())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
