//! Frame time: the shared clock resource and the per-step context handed to
//! systems.

use serde::{Deserialize, Serialize};

/// Which scheduling lane a system runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    /// Fixed-step lane, run zero or more times per frame before the
    /// simulation lane. Used where stepping must not depend on frame rate.
    Fixed,
    /// Variable-step lane, run once per frame with the scaled frame delta.
    Simulation,
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::Fixed => f.write_str("fixed"),
            Lane::Simulation => f.write_str("simulation"),
        }
    }
}

/// World resource holding the shared clock.
///
/// `time_scale` is the one mutable scalar every system sees. Change it
/// between frames with [`FrameLoop::set_time_scale`](crate::tick::FrameLoop::set_time_scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    /// Frames completed.
    pub frame: u64,
    /// Scaled seconds simulated so far.
    pub elapsed: f64,
    /// Multiplier applied to every incoming frame delta.
    pub time_scale: f64,
}

impl Default for FrameTime {
    fn default() -> Self {
        Self {
            frame: 0,
            elapsed: 0.0,
            time_scale: 1.0,
        }
    }
}

/// Per-step context passed explicitly to every system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Index of the frame being built.
    pub frame: u64,
    /// Lane being stepped.
    pub lane: Lane,
    /// Seconds covered by this step (already scaled).
    pub dt: f32,
    /// Scaled seconds simulated before this frame.
    pub elapsed: f64,
    /// Step number within the lane this frame (always 0 for the simulation
    /// lane).
    pub step: u32,
}

impl FrameContext {
    /// Context for a simulation-lane step.
    pub fn simulation(frame: u64, dt: f32, elapsed: f64) -> Self {
        Self {
            frame,
            lane: Lane::Simulation,
            dt,
            elapsed,
            step: 0,
        }
    }

    /// Context for fixed-lane step `step`.
    pub fn fixed(frame: u64, dt: f32, elapsed: f64, step: u32) -> Self {
        Self {
            frame,
            lane: Lane::Fixed,
            dt,
            elapsed,
            step,
        }
    }
}
