//! Two-lane frame loop for the deterministic simulation.
//!
//! The [`FrameLoop`] drives the game forward one frame per
//! [`advance`](FrameLoop::advance) call. Each frame:
//!
//! 1. The frame delta is scaled by the shared `time_scale`.
//! 2. The **fixed lane** runs zero or more steps of `fixed_dt` out of an
//!    accumulator (capped at `max_fixed_steps`).
//! 3. The **simulation lane** runs once with the scaled delta.
//! 4. Event entities older than this frame that nobody consumed are swept.
//!
//! A lane step asks every registered system of that lane, in registration
//! order, to schedule its jobs; a system's jobs depend on the jobs of the
//! systems it was registered `after`. The scheduler then runs the job graph
//! in parallel phases and the deferred log is played back. Events created by
//! the playback are collected into the [`FrameReport`].
//!
//! Given the same initial world, the same systems and the same sequence of
//! deltas, the loop produces the same state: playback order is fixed by the
//! log's sort keys, never by thread timing.
//!
//! # Example
//!
//! ```
//! use runfall_engine::prelude::*;
//!
//! let mut world = World::new();
//! register_components(&mut world);
//!
//! let mut frame_loop = FrameLoop::new(world, FrameConfig::default()).unwrap();
//! install_default_systems(&mut frame_loop).unwrap();
//!
//! for _ in 0..10 {
//!     frame_loop.advance(1.0 / 60.0).unwrap();
//! }
//! assert_eq!(frame_loop.frame_count(), 10);
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::FrameConfig;
use crate::events::{self, GameEvent};
use crate::time::{FrameContext, FrameTime, Lane};
use crate::EngineError;

// ---------------------------------------------------------------------------
// GameSystem
// ---------------------------------------------------------------------------

/// A system schedules jobs for one lane step.
///
/// Systems never touch the world directly: they capture snapshots, build
/// jobs, and submit them with the handles in `deps` as dependencies. The
/// returned handles become the dependencies of systems registered after
/// this one.
pub trait GameSystem: Send {
    fn name(&self) -> &str;

    fn lane(&self) -> Lane {
        Lane::Simulation
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError>;
}

/// Signature of a closure-backed system.
pub type ScheduleFn = dyn Fn(&FrameContext, &World, &mut Scheduler, &[JobHandle]) -> Result<Vec<JobHandle>, EcsError>
    + Send;

/// A [`GameSystem`] built from a closure.
pub struct FnSystem {
    name: String,
    lane: Lane,
    func: Box<ScheduleFn>,
}

impl FnSystem {
    pub fn new<F>(name: impl Into<String>, lane: Lane, func: F) -> Self
    where
        F: Fn(&FrameContext, &World, &mut Scheduler, &[JobHandle]) -> Result<Vec<JobHandle>, EcsError>
            + Send
            + 'static,
    {
        Self {
            name: name.into(),
            lane,
            func: Box::new(func),
        }
    }
}

impl GameSystem for FnSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn lane(&self) -> Lane {
        self.lane
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        (self.func)(frame, world, scheduler, deps)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Timing and playback totals for one lane step.
#[derive(Debug, Clone, Default)]
pub struct LaneDiagnostics {
    pub lane: Option<Lane>,
    pub jobs: usize,
    pub levels: usize,
    pub rows: usize,
    pub applied: usize,
    pub skipped_stale: usize,
    pub failed: usize,
    pub conflicts: usize,
    pub schedule_time: Duration,
    pub run_time: Duration,
    pub playback_time: Duration,
}

/// Everything that happened in one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameReport {
    /// Index of the frame (0 for the first call to `advance`).
    pub frame: u64,
    /// Scaled delta of the simulation lane.
    pub dt: f64,
    /// Fixed-lane steps run this frame.
    pub fixed_steps: u32,
    /// Events created this frame, in playback order.
    pub events: Vec<GameEvent>,
    /// Unconsumed events destroyed by the end-of-frame sweep.
    pub swept_events: usize,
    /// Deferred entries skipped because their target was already gone.
    pub skipped_stale: usize,
    /// `(entity, component)` pairs written more than once in one playback.
    pub conflicts: usize,
    /// Wall-clock diagnostics per lane step. Not serialized.
    #[serde(skip)]
    pub lanes: Vec<LaneDiagnostics>,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

struct RegisteredSystem {
    system: Box<dyn GameSystem>,
    after: Vec<String>,
}

/// The deterministic two-lane frame loop.
pub struct FrameLoop {
    world: World,
    log: DeferredMutationLog,
    systems: Vec<RegisteredSystem>,
    config: FrameConfig,
    frame_counter: u64,
    accumulator: f64,
    fixed_steps_total: u64,
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("frame", &self.frame_counter)
            .field("systems", &self.system_names())
            .field("world", &self.world)
            .finish()
    }
}

impl FrameLoop {
    /// Create a frame loop over `world`.
    ///
    /// Inserts a [`FrameTime`] resource (replacing any present) whose
    /// `time_scale` comes from the config.
    pub fn new(mut world: World, config: FrameConfig) -> Result<Self, EngineError> {
        config.validate()?;
        world.insert_resource(FrameTime {
            time_scale: config.time_scale,
            ..FrameTime::default()
        });
        Ok(Self {
            world,
            log: DeferredMutationLog::new(),
            systems: Vec::new(),
            config,
            frame_counter: 0,
            accumulator: 0.0,
            fixed_steps_total: 0,
        })
    }

    /// Register a system with no ordering constraints.
    pub fn add_system(&mut self, system: impl GameSystem + 'static) -> Result<(), EngineError> {
        self.add_system_after(system, &[])
    }

    /// Register a system whose jobs run after the jobs of every system in
    /// `after`. Those systems must already be registered.
    pub fn add_system_after(
        &mut self,
        system: impl GameSystem + 'static,
        after: &[&str],
    ) -> Result<(), EngineError> {
        let name = system.name().to_owned();
        for dep in after {
            if !self.systems.iter().any(|s| s.system.name() == *dep) {
                return Err(EngineError::UnknownSystem {
                    system: name,
                    dependency: (*dep).to_owned(),
                });
            }
        }
        if self.systems.iter().any(|s| s.system.name() == name) {
            return Err(EngineError::DuplicateSystem { name });
        }

        self.systems.push(RegisteredSystem {
            system: Box::new(system),
            after: after.iter().map(|s| s.to_string()).collect(),
        });

        if let Err(e) = self.validate_system_order() {
            self.systems.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Depth-first search for back edges in the `after` graph.
    fn validate_system_order(&self) -> Result<(), EngineError> {
        fn dfs(
            systems: &[RegisteredSystem],
            idx: usize,
            visited: &mut [bool],
            in_stack: &mut [bool],
        ) -> Result<(), usize> {
            if in_stack[idx] {
                return Err(idx);
            }
            if visited[idx] {
                return Ok(());
            }
            visited[idx] = true;
            in_stack[idx] = true;
            for dep_name in &systems[idx].after {
                if let Some(dep_idx) = systems.iter().position(|s| s.system.name() == *dep_name) {
                    dfs(systems, dep_idx, visited, in_stack)?;
                }
            }
            in_stack[idx] = false;
            Ok(())
        }

        let mut visited = vec![false; self.systems.len()];
        let mut in_stack = vec![false; self.systems.len()];
        for i in 0..self.systems.len() {
            dfs(&self.systems, i, &mut visited, &mut in_stack).map_err(|idx| {
                EngineError::DependencyCycle {
                    system: self.systems[idx].system.name().to_owned(),
                }
            })?;
        }
        Ok(())
    }

    /// Advance by one frame of `dt` real seconds.
    pub fn advance(&mut self, dt: f64) -> Result<FrameReport, EngineError> {
        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(EngineError::InvalidDelta { dt });
        }
        let frame_time = self.frame_time();
        let scaled = dt * frame_time.time_scale;
        let frame = self.frame_counter;
        let mut report = FrameReport {
            frame,
            dt: scaled,
            ..FrameReport::default()
        };

        // Phase 1: fixed lane.
        self.accumulator += scaled;
        let fixed_dt = self.config.fixed_dt;
        let mut fixed_elapsed = frame_time.elapsed;
        while self.accumulator >= fixed_dt && report.fixed_steps < self.config.max_fixed_steps {
            let ctx = FrameContext::fixed(frame, fixed_dt as f32, fixed_elapsed, report.fixed_steps);
            self.run_lane(&ctx, &mut report)?;
            self.accumulator -= fixed_dt;
            fixed_elapsed += fixed_dt;
            report.fixed_steps += 1;
        }
        if self.accumulator >= fixed_dt {
            debug!(
                frame,
                dropped = self.accumulator,
                "fixed lane hit max_fixed_steps; dropping backlog"
            );
            self.accumulator %= fixed_dt;
        }
        self.fixed_steps_total += u64::from(report.fixed_steps);

        // Phase 2: simulation lane.
        let ctx = FrameContext::simulation(frame, scaled as f32, frame_time.elapsed);
        self.run_lane(&ctx, &mut report)?;

        // Phase 3: sweep unconsumed events.
        report.swept_events = self.sweep_events(frame);

        // Phase 4: advance the clock.
        self.frame_counter += 1;
        if let Some(time) = self.world.resource_mut::<FrameTime>() {
            time.frame = self.frame_counter;
            time.elapsed += scaled;
        }
        trace!(
            frame,
            events = report.events.len(),
            fixed_steps = report.fixed_steps,
            "frame complete"
        );
        Ok(report)
    }

    /// Advance `count` frames of `dt` each; returns the reports in order.
    pub fn run_frames(&mut self, count: u64, dt: f64) -> Result<Vec<FrameReport>, EngineError> {
        (0..count).map(|_| self.advance(dt)).collect()
    }

    /// Schedule, run and play back one lane step.
    fn run_lane(&mut self, ctx: &FrameContext, report: &mut FrameReport) -> Result<(), EngineError> {
        let mut diag = LaneDiagnostics {
            lane: Some(ctx.lane),
            ..LaneDiagnostics::default()
        };

        let schedule_start = Instant::now();
        let mut scheduler = Scheduler::new();
        let mut handles: HashMap<&str, Vec<JobHandle>> = HashMap::new();
        for registered in &self.systems {
            let name = registered.system.name();
            let deps: Vec<JobHandle> = registered
                .after
                .iter()
                .filter_map(|dep| handles.get(dep.as_str()))
                .flatten()
                .copied()
                .collect();
            if registered.system.lane() != ctx.lane {
                // Keep ordering transitive through systems of the other lane.
                handles.insert(name, deps);
                continue;
            }
            let mut produced = registered
                .system
                .schedule(ctx, &self.world, &mut scheduler, &deps)?;
            if produced.is_empty() {
                produced = deps;
            }
            handles.insert(name, produced);
        }
        diag.schedule_time = schedule_start.elapsed();

        let run_start = Instant::now();
        let run = scheduler.run(&mut self.world, &self.log)?;
        diag.run_time = run_start.elapsed();
        diag.jobs = run.jobs;
        diag.levels = run.levels;
        diag.rows = run.entities_processed;

        let playback_start = Instant::now();
        let playback = self.log.playback(&mut self.world);
        diag.playback_time = playback_start.elapsed();
        diag.applied = playback.applied;
        diag.skipped_stale = playback.skipped_stale;
        diag.failed = playback.failed;
        diag.conflicts = playback.conflict_count;

        for (_, entity) in &playback.created {
            if let Some(event) = events::read_event(&self.world, *entity) {
                report.events.push(event);
            }
        }
        report.skipped_stale += playback.skipped_stale;
        report.conflicts += playback.conflict_count;
        report.lanes.push(diag);
        Ok(())
    }

    /// Destroy event entities stamped before `frame`.
    fn sweep_events(&mut self, frame: u64) -> usize {
        let stale = events::stale_events(&self.world, frame);
        if stale.is_empty() {
            return 0;
        }
        let writer = self.log.writer(0, 0, "event_sweep");
        for entity in &stale {
            writer.destroy(*entity);
        }
        let swept = self.log.playback(&mut self.world).applied;
        debug!(frame, swept, "swept unconsumed events");
        swept
    }

    // -- accessors ----------------------------------------------------------

    /// Frames completed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// Fixed-lane steps run so far.
    pub fn fixed_step_count(&self) -> u64 {
        self.fixed_steps_total
    }

    /// Scaled seconds simulated so far.
    pub fn elapsed(&self) -> f64 {
        self.frame_time().elapsed
    }

    /// Seconds banked for the fixed lane.
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    fn frame_time(&self) -> FrameTime {
        self.world
            .resource::<FrameTime>()
            .copied()
            .unwrap_or_default()
    }

    pub fn time_scale(&self) -> f64 {
        self.frame_time().time_scale
    }

    /// Change the shared time scale from the next frame on. Negative or
    /// non-finite values are rejected.
    pub fn set_time_scale(&mut self, time_scale: f64) -> Result<(), EngineError> {
        if !(time_scale >= 0.0 && time_scale.is_finite()) {
            return Err(EngineError::Config(format!(
                "time_scale must be non-negative and finite, got {time_scale}"
            )));
        }
        let mut time = self.frame_time();
        time.time_scale = time_scale;
        self.world.insert_resource(time);
        Ok(())
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, for setup, input and tests. Jobs never
    /// see this; they write through the deferred log.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// System names in registration order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.system.name()).collect()
    }

    /// BLAKE3 hex hash of the world digest and the frame counter.
    pub fn state_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.world.state_digest().as_bytes());
        hasher.update(&self.frame_counter.to_le_bytes());
        hasher.update(&self.accumulator.to_le_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
