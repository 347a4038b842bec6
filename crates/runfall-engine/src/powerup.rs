//! Powerup kinds and the per-runner slot array.
//!
//! Each powerup kind owns one slot in [`ActivePowerups`]; a slot is an
//! [`AbilityTimer`] with no cooldown, so collection starts or refreshes it
//! and the usual active countdown expires it.

use serde::{Deserialize, Serialize};

use crate::ability::AbilityTimer;

/// Kinds of timed powerup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerupKind {
    Magnet,
    ScoreMultiplier,
    SpeedBoost,
}

/// Static data for one powerup kind.
#[derive(Debug)]
pub struct PowerupDescriptor {
    pub kind: PowerupKind,
    pub name: &'static str,
    /// Seconds a fresh pickup lasts.
    pub duration: f32,
}

/// Indexed by [`PowerupKind::slot`].
static POWERUP_TABLE: [PowerupDescriptor; PowerupKind::COUNT] = [
    PowerupDescriptor {
        kind: PowerupKind::Magnet,
        name: "magnet",
        duration: 8.0,
    },
    PowerupDescriptor {
        kind: PowerupKind::ScoreMultiplier,
        name: "score_multiplier",
        duration: 10.0,
    },
    PowerupDescriptor {
        kind: PowerupKind::SpeedBoost,
        name: "speed_boost",
        duration: 5.0,
    },
];

impl PowerupKind {
    pub const COUNT: usize = 3;

    pub const ALL: [PowerupKind; PowerupKind::COUNT] = [
        PowerupKind::Magnet,
        PowerupKind::ScoreMultiplier,
        PowerupKind::SpeedBoost,
    ];

    /// Slot index in [`ActivePowerups`].
    pub fn slot(self) -> usize {
        match self {
            PowerupKind::Magnet => 0,
            PowerupKind::ScoreMultiplier => 1,
            PowerupKind::SpeedBoost => 2,
        }
    }

    pub fn descriptor(self) -> &'static PowerupDescriptor {
        &POWERUP_TABLE[self.slot()]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        POWERUP_TABLE.iter().find(|d| d.name == name).map(|d| d.kind)
    }
}

/// Bounded inline array of powerup timers, one per kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePowerups {
    slots: [AbilityTimer; PowerupKind::COUNT],
}

impl Default for ActivePowerups {
    fn default() -> Self {
        Self {
            slots: PowerupKind::ALL.map(|kind| AbilityTimer::new(kind.descriptor().duration, 0.0)),
        }
    }
}

impl ActivePowerups {
    pub fn is_active(&self, kind: PowerupKind) -> bool {
        self.slots[kind.slot()].is_active
    }

    /// Seconds left on `kind`, 0 when inactive.
    pub fn remaining(&self, kind: PowerupKind) -> f32 {
        self.slots[kind.slot()].remaining_time
    }

    pub fn any_active(&self) -> bool {
        self.slots.iter().any(|slot| slot.is_active)
    }

    /// Start `kind`, or restart it at full duration if already running.
    pub fn start(&mut self, kind: PowerupKind) {
        self.slots[kind.slot()].refresh();
    }

    /// Advance every slot by `dt`; returns the kinds that expired.
    pub fn tick(&mut self, dt: f32) -> Vec<PowerupKind> {
        PowerupKind::ALL
            .into_iter()
            .filter(|kind| self.slots[kind.slot()].tick_active(dt, false).ended())
            .collect()
    }
}
