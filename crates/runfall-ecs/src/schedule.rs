//! Dependency-ordered parallel job scheduler.
//!
//! Each frame, systems submit jobs to a [`Scheduler`] together with the
//! handles of jobs they depend on. Every job declares its component access
//! up front: the types it writes in place, the types it reads, and the
//! types in its filter (which count as reads). A job whose access conflicts
//! with an already-scheduled job is rejected unless that job is one of its
//! transitive dependencies, so two writers of the same type can never share a
//! phase.
//!
//! [`Scheduler::run`] executes the dependency graph as topological levels.
//! Jobs in one level run in parallel on the rayon pool; inside a [`ForEach`]
//! job, rows are processed in parallel too. A job's written columns are taken
//! out of the world for the duration of its level and handed to it as owned
//! values, so in-place writes need neither locks nor shared mutable state.
//! Everything else a job changes goes through the
//! [`DeferredMutationLog`](crate::command::DeferredMutationLog).

use std::marker::PhantomData;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::access::Access;
use crate::command::{DeferredMutationLog, LogWriter};
use crate::component::{Component, ComponentKey, ComponentTypeId};
use crate::entity::EntityId;
use crate::fetch::WriteSet;
use crate::query::{Filter, Query, QueryIter, ResolvedFilter};
use crate::storage::ErasedColumn;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Job trait
// ---------------------------------------------------------------------------

/// What a job touches, resolved against one world's registry.
#[derive(Debug, Clone, Default)]
pub struct JobDecl {
    /// Read and write sets.
    pub access: Access,
    /// Columns to lend, in the order the job expects them.
    pub writes: Vec<ComponentTypeId>,
    /// Rows the job runs over.
    pub filter: ResolvedFilter,
}

/// Everything a job sees while it runs.
pub struct JobRun<'a> {
    /// The world, minus the columns lent to running jobs.
    pub world: &'a World,
    /// This job's lent columns, in [`JobDecl::writes`] order.
    pub columns: &'a mut [Box<dyn ErasedColumn>],
    /// Log for deferred structural changes.
    pub log: &'a DeferredMutationLog,
    /// Submission index of the job this frame; the log batch.
    pub batch: u32,
    /// Job name.
    pub name: &'a Arc<str>,
    /// The job's resolved declaration.
    pub decl: &'a JobDecl,
}

/// A unit of scheduled work.
pub trait Job: Send + Sync {
    /// Name used in diagnostics and conflict errors.
    fn name(&self) -> &str;

    /// Resolve the job's access against `world`.
    fn declare(&self, world: &World) -> Result<JobDecl, EcsError>;

    /// Execute. Returns the number of rows processed.
    fn run(&self, run: JobRun<'_>) -> Result<usize, EcsError>;
}

// ---------------------------------------------------------------------------
// JobView / EntityCtx
// ---------------------------------------------------------------------------

/// Read-only, access-checked view of the world inside a running job.
///
/// # Panics
///
/// Reading a component type the job did not declare (or one it writes in
/// place, which is lent out) panics. That is a bug in the job, not a runtime
/// condition.
pub struct JobView<'a> {
    world: &'a World,
    access: &'a Access,
    job: &'a str,
}

impl<'a> JobView<'a> {
    fn check_read(&self, key: ComponentKey) {
        let readable = key
            .resolve(self.world.registry())
            .is_ok_and(|id| self.access.can_read(id) && !self.access.can_write(id));
        if !readable {
            panic!(
                "job '{}' reads component {} without declaring it (or it is written in place)",
                self.job,
                key.type_name()
            );
        }
    }

    /// `T` on `entity`, if the entity is alive and has it.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&'a T> {
        self.check_read(ComponentKey::of::<T>());
        self.world.get_component::<T>(entity)
    }

    /// Whether `entity` is alive and has `T`.
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Whether `entity` is alive.
    pub fn exists(&self, entity: EntityId) -> bool {
        self.world.is_alive(entity)
    }

    /// A world resource. Resources are read-only while jobs run.
    pub fn resource<R: Send + Sync + 'static>(&self) -> Option<&'a R> {
        self.world.resource::<R>()
    }

    /// Typed iteration over declared read types.
    pub fn query<Q: Query>(&self, filter: &Filter) -> QueryIter<'a, Q> {
        for key in Q::keys()
            .into_iter()
            .chain(filter.required().iter().copied())
            .chain(filter.excluded().iter().copied())
        {
            self.check_read(key);
        }
        self.world.query_filtered::<Q>(filter)
    }
}

/// Per-row context handed to a [`ForEach`] closure.
pub struct EntityCtx<'a> {
    entity: EntityId,
    view: &'a JobView<'a>,
    log: LogWriter<'a>,
}

impl<'a> EntityCtx<'a> {
    /// The row's entity.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Sort key used for this row's log entries.
    pub fn sort_key(&self) -> u32 {
        self.log.sort_key()
    }

    /// Access-checked read of a declared component.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&'a T> {
        self.view.get::<T>(entity)
    }

    /// Whether `entity` is alive and has `T`.
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.view.has::<T>(entity)
    }

    /// Whether `entity` is alive.
    pub fn exists(&self, entity: EntityId) -> bool {
        self.view.exists(entity)
    }

    /// A world resource.
    pub fn resource<R: Send + Sync + 'static>(&self) -> Option<&'a R> {
        self.view.resource::<R>()
    }

    /// The job's read-only view.
    pub fn view(&self) -> &JobView<'a> {
        self.view
    }

    /// Writer for deferred changes, keyed by this row.
    pub fn log(&self) -> &LogWriter<'a> {
        &self.log
    }
}

// ---------------------------------------------------------------------------
// ForEach
// ---------------------------------------------------------------------------

/// Builder for a per-entity job writing the component tuple `W` in place.
///
/// ```ignore
/// let job = ForEach::<(Hazard,)>::new("hazard_decay")
///     .without::<Frozen>()
///     .read::<Transform>()
///     .run(|ctx, (hazard,)| hazard.integrity -= 1.0);
/// ```
pub struct ForEach<W> {
    name: String,
    filter: Filter,
    reads: Vec<ComponentKey>,
    _writes: PhantomData<fn() -> W>,
}

impl<W: WriteSet> ForEach<W> {
    /// Start a job named `name`. Rows are the entities holding every `W`
    /// component.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: Filter::new(),
            reads: Vec::new(),
            _writes: PhantomData,
        }
    }

    /// Only rows that also have `T`.
    pub fn with<T: Component>(mut self) -> Self {
        self.filter = self.filter.with::<T>();
        self
    }

    /// Only rows without `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.filter = self.filter.without::<T>();
        self
    }

    /// Declare a read of `T` on any entity.
    pub fn read<T: Component>(mut self) -> Self {
        let key = ComponentKey::of::<T>();
        if !self.reads.contains(&key) {
            self.reads.push(key);
        }
        self
    }

    /// Finish the job with its per-row closure.
    pub fn run<F>(self, func: F) -> ForEachJob<W, F>
    where
        F: for<'w> Fn(&EntityCtx<'_>, W::Item<'w>) + Send + Sync,
    {
        ForEachJob {
            builder: self,
            func,
        }
    }
}

/// A finished [`ForEach`] job.
pub struct ForEachJob<W, F> {
    builder: ForEach<W>,
    func: F,
}

impl<W, F> Job for ForEachJob<W, F>
where
    W: WriteSet,
    F: for<'w> Fn(&EntityCtx<'_>, W::Item<'w>) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.builder.name
    }

    fn declare(&self, world: &World) -> Result<JobDecl, EcsError> {
        let registry = world.registry();
        let mut access = Access::new();
        let writes = W::keys()
            .iter()
            .map(|key| key.resolve(registry))
            .collect::<Result<Vec<_>, _>>()?;
        for &id in &writes {
            access.add_write(id);
        }
        let filter = self.builder.filter.resolve(world)?;
        for &id in filter.required.iter().chain(&filter.excluded) {
            access.add_read(id);
        }
        for key in &self.builder.reads {
            access.add_read(key.resolve(registry)?);
        }
        Ok(JobDecl {
            access,
            writes,
            filter,
        })
    }

    fn run(&self, run: JobRun<'_>) -> Result<usize, EcsError> {
        let JobRun {
            world,
            columns,
            log,
            batch,
            name,
            decl,
        } = run;
        let excludes_written = decl
            .filter
            .excluded
            .iter()
            .any(|id| decl.writes.contains(id));
        let rows: Vec<Option<EntityId>> = (0..world.capacity() as u32)
            .into_par_iter()
            .map(|index| {
                world.entity_at(index).filter(|_| {
                    !excludes_written && decl.filter.matches_index(world, index, &decl.writes)
                })
            })
            .collect();

        let view = JobView {
            world,
            access: &decl.access,
            job: name,
        };
        W::for_each(columns, &rows, |entity, item| {
            let ctx = EntityCtx {
                entity,
                view: &view,
                log: log.writer(batch, entity.index(), Arc::clone(name)),
            };
            (self.func)(&ctx, item);
        })
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Builder for a single-invocation job with declared reads. It writes only
/// through the log.
pub struct Task {
    name: String,
    reads: Vec<ComponentKey>,
}

impl Task {
    /// Start a task named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reads: Vec::new(),
        }
    }

    /// Declare a read of `T`.
    pub fn read<T: Component>(mut self) -> Self {
        let key = ComponentKey::of::<T>();
        if !self.reads.contains(&key) {
            self.reads.push(key);
        }
        self
    }

    /// Finish the task with its body.
    pub fn run<F>(self, func: F) -> TaskJob<F>
    where
        F: Fn(&JobView<'_>, &LogWriter<'_>) + Send + Sync,
    {
        TaskJob { builder: self, func }
    }
}

/// A finished [`Task`].
pub struct TaskJob<F> {
    builder: Task,
    func: F,
}

impl<F> Job for TaskJob<F>
where
    F: Fn(&JobView<'_>, &LogWriter<'_>) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.builder.name
    }

    fn declare(&self, world: &World) -> Result<JobDecl, EcsError> {
        let mut access = Access::new();
        for key in &self.builder.reads {
            access.add_read(key.resolve(world.registry())?);
        }
        Ok(JobDecl {
            access,
            ..JobDecl::default()
        })
    }

    fn run(&self, run: JobRun<'_>) -> Result<usize, EcsError> {
        let view = JobView {
            world: run.world,
            access: &run.decl.access,
            job: run.name,
        };
        let writer = run.log.writer(run.batch, 0, Arc::clone(run.name));
        (self.func)(&view, &writer);
        Ok(1)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Handle to a job scheduled this frame. Used to declare dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    epoch: u64,
    index: usize,
}

impl JobHandle {
    /// Submission index within the frame.
    pub fn index(self) -> usize {
        self.index
    }
}

/// Summary of one [`Scheduler::run`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Jobs executed.
    pub jobs: usize,
    /// Topological levels (parallel phases) executed.
    pub levels: usize,
    /// Rows processed across all jobs (a task counts as one).
    pub entities_processed: usize,
}

struct Node {
    name: Arc<str>,
    job: Box<dyn Job>,
    decl: JobDecl,
    /// `ancestors[i]` is true when job `i` is a transitive dependency.
    ancestors: Vec<bool>,
    level: usize,
}

/// Per-frame job graph.
#[derive(Default)]
pub struct Scheduler {
    nodes: Vec<Node>,
    epoch: u64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("epoch", &self.epoch)
            .field("jobs", &self.nodes.iter().map(|n| &*n.name).collect::<Vec<_>>())
            .finish()
    }
}

impl Scheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to run.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no jobs are waiting.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add `job` to the frame after every job in `depends_on`.
    ///
    /// Fails with [`EcsError::AccessConflict`] if the job's access overlaps a
    /// scheduled job outside its dependency closure, and with
    /// [`EcsError::UnknownJob`] for handles from another frame.
    pub fn schedule<J: Job + 'static>(
        &mut self,
        world: &World,
        job: J,
        depends_on: &[JobHandle],
    ) -> Result<JobHandle, EcsError> {
        let index = self.nodes.len();
        let mut ancestors = vec![false; index];
        let mut level = 0;
        for dep in depends_on {
            if dep.epoch != self.epoch || dep.index >= index {
                return Err(EcsError::UnknownJob { handle: dep.index });
            }
            let parent = &self.nodes[dep.index];
            ancestors[dep.index] = true;
            for (i, is_ancestor) in parent.ancestors.iter().enumerate() {
                ancestors[i] |= *is_ancestor;
            }
            level = level.max(parent.level + 1);
        }

        let decl = job.declare(world)?;
        for (i, other) in self.nodes.iter().enumerate() {
            if ancestors[i] {
                continue;
            }
            if let Some(conflict) = decl.access.conflict_with(&other.decl.access) {
                return Err(EcsError::AccessConflict {
                    job: job.name().to_owned(),
                    other: other.name.to_string(),
                    component: world.registry().name_of(conflict.component).to_owned(),
                    ours: conflict.ours,
                    theirs: conflict.theirs,
                });
            }
        }

        let name: Arc<str> = Arc::from(job.name());
        trace!(job = %name, index, level, deps = depends_on.len(), "job scheduled");
        self.nodes.push(Node {
            name,
            job: Box::new(job),
            decl,
            ancestors,
            level,
        });
        Ok(JobHandle {
            epoch: self.epoch,
            index,
        })
    }

    /// Run every scheduled job, level by level, then clear the graph.
    ///
    /// Jobs (and any snapshots they captured) are dropped before this
    /// returns. Handles from this frame become invalid.
    pub fn run(
        &mut self,
        world: &mut World,
        log: &DeferredMutationLog,
    ) -> Result<ScheduleReport, EcsError> {
        let nodes = std::mem::take(&mut self.nodes);
        self.epoch += 1;

        let level_count = nodes.iter().map(|n| n.level + 1).max().unwrap_or(0);
        let mut levels: Vec<Vec<(u32, Node)>> = (0..level_count).map(|_| Vec::new()).collect();
        for (batch, node) in nodes.into_iter().enumerate() {
            levels[node.level].push((batch as u32, node));
        }

        let mut report = ScheduleReport {
            levels: level_count,
            ..ScheduleReport::default()
        };
        for (level, jobs) in levels.into_iter().enumerate() {
            report.jobs += jobs.len();
            report.entities_processed += run_level(world, log, level, jobs)?;
        }
        debug!(
            jobs = report.jobs,
            levels = report.levels,
            rows = report.entities_processed,
            "frame jobs complete"
        );
        Ok(report)
    }
}

/// Lend columns, run one level's jobs in parallel, restore the columns.
fn run_level(
    world: &mut World,
    log: &DeferredMutationLog,
    level: usize,
    jobs: Vec<(u32, Node)>,
) -> Result<usize, EcsError> {
    let mut lent: Vec<(u32, Node, Vec<Box<dyn ErasedColumn>>)> = Vec::with_capacity(jobs.len());
    let mut lend_error = None;
    for (batch, node) in jobs {
        let mut columns = Vec::with_capacity(node.decl.writes.len());
        for &id in &node.decl.writes {
            match world.lend_column(id) {
                Ok(column) => columns.push(column),
                Err(e) => {
                    lend_error = Some(e);
                    break;
                }
            }
        }
        lent.push((batch, node, columns));
        if lend_error.is_some() {
            break;
        }
    }

    let results: Vec<Result<usize, EcsError>> = if lend_error.is_none() {
        let shared: &World = world;
        lent.par_iter_mut()
            .map(|(batch, node, columns)| {
                trace!(job = %node.name, level, "job start");
                node.job.run(JobRun {
                    world: shared,
                    columns,
                    log,
                    batch: *batch,
                    name: &node.name,
                    decl: &node.decl,
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    for (_, node, columns) in lent {
        for (&id, column) in node.decl.writes.iter().zip(columns) {
            world.restore_column(id, column);
        }
    }

    if let Some(e) = lend_error {
        return Err(e);
    }
    results.into_iter().sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessKind;
    use crate::world::ComponentBundle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Speed(f32);

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Distance(f32);

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Frozen;

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Speed>("speed");
        world.register_component::<Distance>("distance");
        world.register_component::<Frozen>("frozen");
        world
    }

    fn runner(world: &mut World, speed: f32) -> EntityId {
        world
            .spawn_bundle(
                ComponentBundle::new()
                    .with(Speed(speed))
                    .with(Distance(0.0)),
            )
            .unwrap()
    }

    #[test]
    fn unrelated_writers_of_same_type_are_rejected() {
        let world = setup_world();
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule(&world, ForEach::<(Speed,)>::new("boost").run(|_, _| {}), &[])
            .unwrap();
        let err = scheduler
            .schedule(&world, ForEach::<(Speed,)>::new("slow").run(|_, _| {}), &[])
            .unwrap_err();
        match err {
            EcsError::AccessConflict {
                job,
                other,
                component,
                ours,
                theirs,
            } => {
                assert_eq!(job, "slow");
                assert_eq!(other, "boost");
                assert_eq!(component, "speed");
                assert_eq!(ours, AccessKind::Write);
                assert_eq!(theirs, AccessKind::Write);
            }
            other => panic!("expected AccessConflict, got {other:?}"),
        }
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn dependent_writers_run_in_order() {
        let mut world = setup_world();
        let e = runner(&mut world, 1.0);
        let mut scheduler = Scheduler::new();
        let first = scheduler
            .schedule(
                &world,
                ForEach::<(Speed,)>::new("double").run(|_, (speed,)| speed.0 *= 2.0),
                &[],
            )
            .unwrap();
        scheduler
            .schedule(
                &world,
                ForEach::<(Speed,)>::new("add").run(|_, (speed,)| speed.0 += 1.0),
                &[first],
            )
            .unwrap();
        let log = DeferredMutationLog::new();
        let report = scheduler.run(&mut world, &log).unwrap();
        assert_eq!(report.levels, 2);
        assert_eq!(world.get_component::<Speed>(e), Some(&Speed(3.0)));
    }

    #[test]
    fn transitive_dependency_clears_conflict() {
        let world = setup_world();
        let mut scheduler = Scheduler::new();
        let a = scheduler
            .schedule(&world, ForEach::<(Speed,)>::new("a").run(|_, _| {}), &[])
            .unwrap();
        let b = scheduler
            .schedule(&world, ForEach::<(Distance,)>::new("b").run(|_, _| {}), &[a])
            .unwrap();
        scheduler
            .schedule(&world, ForEach::<(Speed,)>::new("c").run(|_, _| {}), &[b])
            .unwrap();
    }

    #[test]
    fn filter_types_count_as_reads() {
        let world = setup_world();
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule(&world, ForEach::<(Speed,)>::new("writer").run(|_, _| {}), &[])
            .unwrap();
        let err = scheduler
            .schedule(
                &world,
                ForEach::<(Distance,)>::new("filtered")
                    .without::<Speed>()
                    .run(|_, _| {}),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, EcsError::AccessConflict { .. }));
    }

    #[test]
    fn readers_share_a_level() {
        let mut world = setup_world();
        runner(&mut world, 2.0);
        let mut scheduler = Scheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for name in ["r1", "r2"] {
            let hits = Arc::clone(&hits);
            scheduler
                .schedule(
                    &world,
                    ForEach::<()>::new(name)
                        .with::<Speed>()
                        .run(move |ctx, ()| {
                            assert_eq!(ctx.get::<Speed>(ctx.entity()), Some(&Speed(2.0)));
                            hits.fetch_add(1, Ordering::Relaxed);
                        }),
                    &[],
                )
                .unwrap();
        }
        let log = DeferredMutationLog::new();
        let report = scheduler.run(&mut world, &log).unwrap();
        assert_eq!(report.levels, 1);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn excluded_rows_are_not_visited() {
        let mut world = setup_world();
        let moving = runner(&mut world, 1.0);
        let frozen = runner(&mut world, 1.0);
        world.insert_component(frozen, Frozen).unwrap();

        let mut scheduler = Scheduler::new();
        scheduler
            .schedule(
                &world,
                ForEach::<(Distance, Speed)>::new("advance")
                    .without::<Frozen>()
                    .run(|_, (distance, speed)| distance.0 += speed.0),
                &[],
            )
            .unwrap();
        let log = DeferredMutationLog::new();
        let report = scheduler.run(&mut world, &log).unwrap();
        assert_eq!(report.entities_processed, 1);
        assert_eq!(world.get_component::<Distance>(moving), Some(&Distance(1.0)));
        assert_eq!(world.get_component::<Distance>(frozen), Some(&Distance(0.0)));
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut world = setup_world();
        let mut scheduler = Scheduler::new();
        let handle = scheduler
            .schedule(&world, ForEach::<(Speed,)>::new("a").run(|_, _| {}), &[])
            .unwrap();
        let log = DeferredMutationLog::new();
        scheduler.run(&mut world, &log).unwrap();
        let err = scheduler
            .schedule(&world, ForEach::<(Speed,)>::new("b").run(|_, _| {}), &[handle])
            .unwrap_err();
        assert!(matches!(err, EcsError::UnknownJob { .. }));
    }

    #[test]
    fn task_reads_and_logs() {
        let mut world = setup_world();
        let e = runner(&mut world, 4.0);
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule(
                &world,
                Task::new("stop_fast").read::<Speed>().run(|view, log| {
                    for (entity, (speed,)) in view.query::<(&Speed,)>(&Filter::new()) {
                        if speed.0 > 3.0 {
                            log.add(entity, Frozen);
                        }
                    }
                }),
                &[],
            )
            .unwrap();
        let mut log = DeferredMutationLog::new();
        scheduler.run(&mut world, &log).unwrap();
        assert!(!world.has_component::<Frozen>(e));
        log.playback(&mut world);
        assert!(world.has_component::<Frozen>(e));
    }

    #[test]
    #[should_panic(expected = "without declaring it")]
    fn undeclared_read_panics() {
        let mut world = setup_world();
        runner(&mut world, 1.0);
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule(
                &world,
                ForEach::<(Speed,)>::new("sneaky").run(|ctx, _| {
                    let _ = ctx.get::<Distance>(ctx.entity());
                }),
                &[],
            )
            .unwrap();
        let log = DeferredMutationLog::new();
        let _ = scheduler.run(&mut world, &log);
    }

    #[test]
    fn columns_are_restored_after_run() {
        let mut world = setup_world();
        let e = runner(&mut world, 1.0);
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule(
                &world,
                ForEach::<(Speed, Distance)>::new("both").run(|_, _| {}),
                &[],
            )
            .unwrap();
        let log = DeferredMutationLog::new();
        scheduler.run(&mut world, &log).unwrap();
        assert!(world.get_component::<Speed>(e).is_some());
        assert!(world.get_component::<Distance>(e).is_some());
        assert!(scheduler.is_empty());
    }
}
