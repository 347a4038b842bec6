//! Deferred mutation log for structural changes made during parallel phases.
//!
//! Jobs never change the shape of the world while they run. Creating and
//! destroying entities, and adding, removing or setting components on
//! entities other than the row being processed, are appended to a
//! [`DeferredMutationLog`] through a [`LogWriter`]. Appends are lock-free and
//! safe from any worker thread.
//!
//! At a synchronization point the owner calls
//! [`playback`](DeferredMutationLog::playback), which drains the log, orders
//! the entries by `(batch, sort_key, seq)` and applies them single-threaded.
//! `batch` is the submission index of the job that wrote the entry, `sort_key`
//! is chosen by the writer (the row's entity index inside a `ForEach`), and
//! `seq` is a global append counter, so entries from one writer with one sort
//! key replay in append order. The result does not depend on how the workers
//! interleaved.
//!
//! # Example
//!
//! ```
//! use runfall_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Integrity(f32);
//!
//! let mut world = World::new();
//! world.register_component::<Integrity>("integrity");
//! let ice = world.spawn_with(Integrity(10.0)).unwrap();
//!
//! let mut log = DeferredMutationLog::new();
//! log.writer(0, 0, "melt").set(ice, Integrity(5.0));
//! assert_eq!(world.get_component::<Integrity>(ice), Some(&Integrity(10.0)));
//!
//! let report = log.playback(&mut world);
//! assert_eq!(report.applied, 1);
//! assert_eq!(world.get_component::<Integrity>(ice), Some(&Integrity(5.0)));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use tracing::{debug, warn};

use crate::component::{Component, ComponentKey};
use crate::entity::EntityId;
use crate::storage::ComponentValue;
use crate::world::{ComponentBundle, World};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Placeholder for an entity queued for creation in the same log.
///
/// Later entries may target it; playback substitutes the real [`EntityId`]
/// once the create entry has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingEntity(u32);

impl PendingEntity {
    /// Raw placeholder number, unique per log.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// What an entry operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    /// An entity that existed when the entry was written. It may be gone by
    /// playback time.
    Live(EntityId),
    /// An entity created earlier in the same playback.
    Pending(PendingEntity),
}

impl From<EntityId> for MutationTarget {
    fn from(entity: EntityId) -> Self {
        Self::Live(entity)
    }
}

impl From<PendingEntity> for MutationTarget {
    fn from(pending: PendingEntity) -> Self {
        Self::Pending(pending)
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// The mutation an entry performs.
#[derive(Debug)]
pub enum MutationOp {
    /// Spawn a new entity with the bundle's components. The target is the
    /// placeholder handed out when the entry was written.
    Create(ComponentBundle),
    /// Despawn the target.
    Destroy,
    /// Insert a component, overwriting any existing value.
    Add(ComponentValue),
    /// Overwrite an existing component. Fails if the target lacks it.
    Set(ComponentValue),
    /// Remove a component. Removing an absent component is a no-op.
    Remove(ComponentKey),
}

impl MutationOp {
    fn kind(&self) -> &'static str {
        match self {
            MutationOp::Create(_) => "create",
            MutationOp::Destroy => "destroy",
            MutationOp::Add(_) => "add",
            MutationOp::Set(_) => "set",
            MutationOp::Remove(_) => "remove",
        }
    }

    /// Component type touched by add/set/remove, for conflict detection.
    fn component(&self) -> Option<(std::any::TypeId, &'static str)> {
        match self {
            MutationOp::Add(value) | MutationOp::Set(value) => {
                Some((value.type_id(), value.type_name()))
            }
            MutationOp::Remove(key) => Some((key.type_id(), key.type_name())),
            MutationOp::Create(_) | MutationOp::Destroy => None,
        }
    }
}

/// One queued mutation.
#[derive(Debug)]
pub struct MutationEntry {
    /// Submission index of the writing job.
    pub batch: u32,
    /// Writer-chosen ordering key within the batch.
    pub sort_key: u32,
    /// Global append counter; breaks ties in append order.
    pub seq: u64,
    /// Name of the writer, for diagnostics.
    pub issued_by: Arc<str>,
    /// Entity the operation applies to.
    pub target: MutationTarget,
    /// The operation.
    pub op: MutationOp,
}

// ---------------------------------------------------------------------------
// PlaybackReport
// ---------------------------------------------------------------------------

/// Summary of one [`DeferredMutationLog::playback`] call.
///
/// `conflict_count` is the number of `(target, component)` pairs written by
/// more than one entry; they resolve last-write-wins and are logged as
/// warnings, not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Entries that changed the world.
    pub applied: usize,
    /// Entries whose target was destroyed (or never created) before playback.
    pub skipped_stale: usize,
    /// Entries that failed for another reason (missing component, type error).
    pub failed: usize,
    /// `(target, component)` pairs written by more than one entry.
    pub conflict_count: usize,
    /// Placeholders resolved during this playback, in creation order.
    pub created: Vec<(PendingEntity, EntityId)>,
}

impl PlaybackReport {
    /// Real entity created for `pending`, if it was created by this playback.
    pub fn resolve(&self, pending: PendingEntity) -> Option<EntityId> {
        self.created
            .iter()
            .find(|(p, _)| *p == pending)
            .map(|(_, e)| *e)
    }
}

// ---------------------------------------------------------------------------
// DeferredMutationLog
// ---------------------------------------------------------------------------

/// Thread-safe, append-only log of structural mutations.
pub struct DeferredMutationLog {
    queue: SegQueue<MutationEntry>,
    next_seq: AtomicU64,
    next_pending: AtomicU32,
    last_report: PlaybackReport,
}

impl DeferredMutationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            next_seq: AtomicU64::new(0),
            next_pending: AtomicU32::new(0),
            last_report: PlaybackReport::default(),
        }
    }

    /// A writer appending under `batch` with `sort_key`.
    pub fn writer(&self, batch: u32, sort_key: u32, issued_by: impl Into<Arc<str>>) -> LogWriter<'_> {
        LogWriter {
            log: self,
            batch,
            sort_key,
            issued_by: issued_by.into(),
        }
    }

    /// Append a raw entry. Safe to call concurrently from any thread.
    pub fn append(
        &self,
        batch: u32,
        sort_key: u32,
        issued_by: Arc<str>,
        target: MutationTarget,
        op: MutationOp,
    ) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.queue.push(MutationEntry {
            batch,
            sort_key,
            seq,
            issued_by,
            target,
            op,
        });
    }

    fn reserve_pending(&self) -> PendingEntity {
        PendingEntity(self.next_pending.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Report from the last [`playback`](Self::playback) call.
    pub fn last_playback_report(&self) -> &PlaybackReport {
        &self.last_report
    }

    /// Drain the log and apply every entry in `(batch, sort_key, seq)` order.
    ///
    /// Entries whose target no longer exists are skipped and counted. Taking
    /// `&mut self` guarantees no writer is still appending.
    pub fn playback(&mut self, world: &mut World) -> PlaybackReport {
        let mut entries = Vec::with_capacity(self.queue.len());
        while let Some(entry) = self.queue.pop() {
            entries.push(entry);
        }
        entries.sort_by_key(|e| (e.batch, e.sort_key, e.seq));

        // --- Conflict detection ---
        let mut seen: HashMap<(MutationTarget, std::any::TypeId), (&'static str, Vec<u64>)> =
            HashMap::new();
        for entry in &entries {
            if let Some((type_id, type_name)) = entry.op.component() {
                seen.entry((entry.target, type_id))
                    .or_insert_with(|| (type_name, Vec::new()))
                    .1
                    .push(entry.seq);
            }
        }
        let mut conflict_count = 0;
        for ((target, _), (component, seqs)) in &seen {
            if seqs.len() > 1 {
                conflict_count += 1;
                warn!(
                    target = ?target,
                    component = %component,
                    seqs = ?seqs,
                    "conflict: {} entries write the same entity+component in one playback (last-write-wins)",
                    seqs.len()
                );
            }
        }

        // --- Apply loop ---
        let mut report = PlaybackReport {
            conflict_count,
            ..PlaybackReport::default()
        };
        let mut created: HashMap<PendingEntity, EntityId> = HashMap::new();

        for entry in entries {
            let MutationEntry {
                batch,
                sort_key,
                issued_by,
                target,
                op,
                ..
            } = entry;
            let kind = op.kind();

            if let MutationOp::Create(bundle) = op {
                match world.spawn_bundle(bundle) {
                    Ok(entity) => {
                        if let MutationTarget::Pending(pending) = target {
                            created.insert(pending, entity);
                            report.created.push((pending, entity));
                        }
                        report.applied += 1;
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(batch, sort_key, issued_by = %issued_by, error = %e, "deferred create failed");
                    }
                }
                continue;
            }

            let entity = match target {
                MutationTarget::Live(entity) => Some(entity),
                MutationTarget::Pending(pending) => created.get(&pending).copied(),
            };
            let Some(entity) = entity.filter(|e| world.is_alive(*e)) else {
                report.skipped_stale += 1;
                debug!(target = ?target, op = kind, issued_by = %issued_by, "skipping entry for dead entity");
                continue;
            };

            let result = match op {
                MutationOp::Destroy => world.despawn(entity),
                MutationOp::Add(value) => world.insert_value(entity, value),
                MutationOp::Set(value) => world.set_value(entity, value),
                MutationOp::Remove(key) => key
                    .resolve(world.registry())
                    .and_then(|id| world.remove_component_id(entity, id))
                    .map(|_| ()),
                MutationOp::Create(_) => unreachable!("create handled above"),
            };

            match result {
                Ok(()) => report.applied += 1,
                Err(EcsError::StaleEntity { .. }) => report.skipped_stale += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        batch,
                        sort_key,
                        entity = ?entity,
                        op = kind,
                        issued_by = %issued_by,
                        error = %e,
                        "deferred mutation failed"
                    );
                }
            }
        }

        self.last_report = report.clone();
        report
    }
}

impl Default for DeferredMutationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeferredMutationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredMutationLog")
            .field("queued", &self.queue.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LogWriter
// ---------------------------------------------------------------------------

/// Appends entries under a fixed `(batch, sort_key)`.
///
/// Cheap to create; jobs get one per processed row.
#[derive(Debug, Clone)]
pub struct LogWriter<'a> {
    log: &'a DeferredMutationLog,
    batch: u32,
    sort_key: u32,
    issued_by: Arc<str>,
}

impl<'a> LogWriter<'a> {
    /// The same writer with a different sort key.
    pub fn with_sort_key(&self, sort_key: u32) -> LogWriter<'a> {
        LogWriter {
            sort_key,
            ..self.clone()
        }
    }

    /// Batch this writer appends under.
    pub fn batch(&self) -> u32 {
        self.batch
    }

    /// Sort key this writer appends under.
    pub fn sort_key(&self) -> u32 {
        self.sort_key
    }

    fn push(&self, target: MutationTarget, op: MutationOp) {
        self.log
            .append(self.batch, self.sort_key, self.issued_by.clone(), target, op);
    }

    /// Queue creation of an entity with `bundle`.
    pub fn create(&self, bundle: ComponentBundle) -> PendingEntity {
        let pending = self.log.reserve_pending();
        self.push(MutationTarget::Pending(pending), MutationOp::Create(bundle));
        pending
    }

    /// Queue destruction of `target`.
    pub fn destroy(&self, target: impl Into<MutationTarget>) {
        self.push(target.into(), MutationOp::Destroy);
    }

    /// Queue insertion (or overwrite) of `value` on `target`.
    pub fn add<T: Component>(&self, target: impl Into<MutationTarget>, value: T) {
        self.push(target.into(), MutationOp::Add(ComponentValue::new(value)));
    }

    /// Queue an overwrite of an existing `T` on `target`.
    pub fn set<T: Component>(&self, target: impl Into<MutationTarget>, value: T) {
        self.push(target.into(), MutationOp::Set(ComponentValue::new(value)));
    }

    /// Queue removal of `T` from `target`.
    pub fn remove<T: Component>(&self, target: impl Into<MutationTarget>) {
        self.push(target.into(), MutationOp::Remove(ComponentKey::of::<T>()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
