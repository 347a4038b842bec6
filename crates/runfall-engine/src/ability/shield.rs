//! Shield: blocks hazard damage until its charges run out.
//!
//! Each distinct hazard the owner touches while the shield is up consumes
//! one charge; a hazard stays paid for while contact lasts. A hazard that
//! arrives when no charge is left breaches the shield: it stops blocking
//! at once, and the ability ends on the next tick. The hazard contact
//! system skips damage only for owners whose shield is blocking.

use runfall_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Ability, AbilityCtx, AbilityKind, AbilityTimer};
use crate::rows::HazardRow;

/// Hazards a shield can hold off at the same time. Past this, an extra
/// hazard pays again on every tick it stays in contact.
pub const HELD_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shield {
    pub timer: AbilityTimer,
    /// Charges granted at activation, before the power trait.
    pub max_charges: u32,
    /// Charges left in the current activation.
    pub charges: u32,
    /// Hazards already paid for and still in contact.
    pub held: [Option<EntityId>; HELD_CAPACITY],
    /// Set when a hazard touched the shield with no charge left, or when it
    /// was activated with none.
    pub breached: bool,
}

impl Shield {
    pub fn new(duration: f32, cooldown: f32, max_charges: u32) -> Self {
        Self {
            timer: AbilityTimer::new(duration, cooldown),
            max_charges,
            charges: 0,
            held: [None; HELD_CAPACITY],
            breached: false,
        }
    }

    /// Whether hazard damage is blocked right now.
    pub fn is_blocking(&self) -> bool {
        self.timer.is_active && !self.breached
    }

    fn is_held(&self, hazard: EntityId) -> bool {
        self.held.contains(&Some(hazard))
    }

    /// Pay for `hazard`. Returns false, breaching the shield, when no charge
    /// is left.
    fn absorb(&mut self, hazard: EntityId) -> bool {
        if self.charges == 0 {
            self.breached = true;
            return false;
        }
        self.charges -= 1;
        if let Some(slot) = self.held.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(hazard);
        }
        true
    }
}

impl Ability for Shield {
    const KIND: AbilityKind = AbilityKind::Shield;
    type Env = Snapshot<HazardRow>;

    fn timer(&self) -> &AbilityTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut AbilityTimer {
        &mut self.timer
    }

    fn capture(world: &World) -> Result<Snapshot<HazardRow>, EcsError> {
        world.snapshot::<HazardRow>()
    }

    fn is_complete(&self, _ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<HazardRow>) -> bool {
        self.charges == 0 || self.breached
    }

    fn on_activate(&mut self, ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<HazardRow>) {
        self.charges = (self.max_charges as f32 * ctx.power_scale()).round() as u32;
        self.held = [None; HELD_CAPACITY];
        self.breached = self.charges == 0;
    }

    fn on_tick(&mut self, ctx: &AbilityCtx<'_, '_>, hazards: &Snapshot<HazardRow>) {
        let Some(origin) = ctx.position() else {
            return;
        };
        let touching: Vec<EntityId> = hazards
            .iter()
            .filter(|(hazard, row)| {
                ctx.row().exists(*hazard)
                    && origin.distance_xz(&row.position) <= row.hazard.contact_radius
            })
            .map(|(hazard, _)| hazard)
            .collect();

        for slot in &mut self.held {
            if slot.is_some_and(|h| !touching.contains(&h)) {
                *slot = None;
            }
        }
        for hazard in touching {
            if self.is_held(hazard) {
                continue;
            }
            if !self.absorb(hazard) {
                debug!(owner = ?ctx.owner(), hazard = ?hazard, "shield breached");
                break;
            }
            debug!(owner = ?ctx.owner(), hazard = ?hazard, charges = self.charges, "shield blocked hazard");
        }
    }

    fn on_end(&mut self, _ctx: &AbilityCtx<'_, '_>, _env: &Snapshot<HazardRow>) {
        self.charges = 0;
        self.held = [None; HELD_CAPACITY];
        self.breached = false;
    }

    /// Bubble shown for the full duration.
    fn proxy_lifetime(&self) -> Option<f32> {
        Some(self.timer.duration)
    }
}
