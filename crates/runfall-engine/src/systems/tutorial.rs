//! Tutorial tracking: marks first-time milestones and emits one
//! `TutorialStepCompleted` per step.
//!
//! The tutorial only observes events; it never destroys them.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::{
    self, AbilityActivated, EventRow, LevelUnlocked, ScoreUpdated, TutorialStepCompleted,
};
use crate::powerup::ActivePowerups;
use crate::tick::GameSystem;
use crate::time::FrameContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorialStep {
    FirstPickup,
    FirstAbility,
    FirstPowerup,
    FirstLevel,
}

impl TutorialStep {
    pub const COUNT: usize = 4;

    pub const ALL: [TutorialStep; TutorialStep::COUNT] = [
        TutorialStep::FirstPickup,
        TutorialStep::FirstAbility,
        TutorialStep::FirstPowerup,
        TutorialStep::FirstLevel,
    ];

    fn index(self) -> usize {
        match self {
            TutorialStep::FirstPickup => 0,
            TutorialStep::FirstAbility => 1,
            TutorialStep::FirstPowerup => 2,
            TutorialStep::FirstLevel => 3,
        }
    }
}

/// Which tutorial steps a runner has completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialProgress {
    completed: [bool; TutorialStep::COUNT],
}

impl TutorialProgress {
    pub fn is_completed(&self, step: TutorialStep) -> bool {
        self.completed[step.index()]
    }

    /// Mark `step` done; returns `true` the first time only.
    pub fn complete(&mut self, step: TutorialStep) -> bool {
        let slot = &mut self.completed[step.index()];
        !std::mem::replace(slot, true)
    }

    pub fn is_finished(&self) -> bool {
        self.completed.iter().all(|done| *done)
    }

    /// Steps still to do, in tutorial order.
    pub fn remaining(&self) -> impl Iterator<Item = TutorialStep> + '_ {
        TutorialStep::ALL
            .into_iter()
            .filter(|step| !self.is_completed(*step))
    }
}

struct TutorialEnv {
    abilities: Snapshot<EventRow<AbilityActivated>>,
    scores: Snapshot<EventRow<ScoreUpdated>>,
    unlocks: Snapshot<EventRow<LevelUnlocked>>,
}

pub struct TutorialSystem;

impl GameSystem for TutorialSystem {
    fn name(&self) -> &str {
        "tutorial"
    }

    fn schedule(
        &self,
        frame: &FrameContext,
        world: &World,
        scheduler: &mut Scheduler,
        deps: &[JobHandle],
    ) -> Result<Vec<JobHandle>, EcsError> {
        let env = TutorialEnv {
            abilities: world.snapshot()?,
            scores: world.snapshot()?,
            unlocks: world.snapshot()?,
        };
        let frame = frame.frame;
        let job = ForEach::<(TutorialProgress,)>::new("tutorial")
            .read::<ActivePowerups>()
            .run(move |row, item| {
                let (progress,) = item;
                if progress.is_finished() {
                    return;
                }
                let owner = row.entity();
                let reached = [
                    (
                        TutorialStep::FirstPickup,
                        env.scores.rows().iter().any(|r| r.event.entity == owner),
                    ),
                    (
                        TutorialStep::FirstAbility,
                        env.abilities.rows().iter().any(|r| r.event.entity == owner),
                    ),
                    (
                        TutorialStep::FirstPowerup,
                        row.get::<ActivePowerups>(owner)
                            .is_some_and(|p| p.any_active()),
                    ),
                    (
                        TutorialStep::FirstLevel,
                        env.unlocks.rows().iter().any(|r| r.event.entity == owner),
                    ),
                ];
                for (step, hit) in reached {
                    if hit && progress.complete(step) {
                        debug!(entity = ?owner, ?step, "tutorial step completed");
                        events::emit(
                            row.log(),
                            frame,
                            TutorialStepCompleted {
                                entity: owner,
                                step,
                            },
                        );
                    }
                }
            });
        Ok(vec![scheduler.schedule(world, job, deps)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_complete_once() {
        let mut progress = TutorialProgress::default();
        assert!(progress.complete(TutorialStep::FirstAbility));
        assert!(!progress.complete(TutorialStep::FirstAbility));
        assert!(progress.is_completed(TutorialStep::FirstAbility));
        assert_eq!(
            progress.remaining().collect::<Vec<_>>(),
            vec![
                TutorialStep::FirstPickup,
                TutorialStep::FirstPowerup,
                TutorialStep::FirstLevel
            ]
        );
    }

    #[test]
    fn finished_after_every_step() {
        let mut progress = TutorialProgress::default();
        for step in TutorialStep::ALL {
            assert!(!progress.is_finished());
            progress.complete(step);
        }
        assert!(progress.is_finished());
    }
}
