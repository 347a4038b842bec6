//! Entity handles and the slot table that hands them out.
//!
//! A handle is a slot index plus the generation the slot had when the handle
//! was issued. Releasing a slot bumps its generation, so every handle issued
//! before the release stops matching. Gameplay components keep handles to
//! other entities (owners, targets) for many frames, and the deferred log
//! keeps them until playback; both rely on [`EntitySlots::contains`] to tell
//! a live target from a dead one.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A generational entity handle, `[generation: u32 | index: u32]`.
///
/// Ordering follows the raw value, so handles sort by generation first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self(u64::from(generation) << 32 | u64::from(index))
    }

    /// Slot index. Component columns are indexed by it.
    #[inline]
    pub fn index(self) -> u32 {
        (self.0 & u64::from(u32::MAX)) as u32
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Packed value; stable across runs, used for digests and seeding.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    occupied: bool,
}

/// Slot table behind the [`World`](crate::world::World).
///
/// Invariants:
/// - `live` equals the number of occupied slots.
/// - `vacant` holds each free, non-retired slot exactly once, oldest release
///   first.
/// - A slot whose generation is `u32::MAX` is retired on release rather than
///   recycled, so a generation never wraps back onto an old handle.
#[derive(Debug, Default)]
pub struct EntitySlots {
    slots: Vec<Slot>,
    vacant: VecDeque<u32>,
    live: usize,
}

impl EntitySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy a slot: the longest-vacant one if any, otherwise a new one.
    pub fn insert(&mut self) -> EntityId {
        self.live += 1;
        if let Some(index) = self.vacant.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.occupied = true;
            return EntityId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            occupied: true,
        });
        EntityId::new(index, 0)
    }

    /// Free `id`'s slot. Returns false, changing nothing, for a handle that
    /// is not live.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let index = id.index();
        let slot = &mut self.slots[index as usize];
        slot.occupied = false;
        self.live -= 1;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.vacant.push_back(index);
            }
            None => tracing::debug!(index, "entity slot retired at generation limit"),
        }
        true
    }

    /// Whether `id` names the current occupant of its slot.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index() as usize)
            .is_some_and(|s| s.occupied && s.generation == id.generation())
    }

    /// Handle of whoever occupies `index` now. Jobs and snapshots walk the
    /// index range with this.
    #[inline]
    pub fn occupant(&self, index: u32) -> Option<EntityId> {
        self.slots
            .get(index as usize)
            .filter(|s| s.occupied)
            .map(|s| EntityId::new(index, s.generation))
    }

    /// Live handles in index order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.slots.len() as u32).filter_map(|index| self.occupant(index))
    }

    /// Slots ever created, occupied or not. Upper bound for index walks.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_keeps_index_and_generation_apart() {
        let id = EntityId::new(u32::MAX, 3);
        assert_eq!(id.index(), u32::MAX);
        assert_eq!(id.generation(), 3);
        assert!(EntityId::new(0, 1) > EntityId::new(u32::MAX, 0));
    }

    #[test]
    fn vacant_slots_are_reused_oldest_first() {
        let mut slots = EntitySlots::new();
        let ids: Vec<_> = (0..4).map(|_| slots.insert()).collect();
        slots.remove(ids[2]);
        slots.remove(ids[0]);
        assert_eq!(slots.insert(), EntityId::new(2, 1));
        assert_eq!(slots.insert(), EntityId::new(0, 1));
        assert_eq!(slots.insert(), EntityId::new(4, 0));
        assert_eq!(slots.slot_count(), 5);
    }

    #[test]
    fn occupant_follows_recycling_and_old_handle_goes_stale() {
        let mut slots = EntitySlots::new();
        let first = slots.insert();
        assert_eq!(slots.occupant(first.index()), Some(first));
        slots.remove(first);
        assert_eq!(slots.occupant(first.index()), None);

        let second = slots.insert();
        assert_eq!(second.index(), first.index());
        assert_eq!(slots.occupant(first.index()), Some(second));
        assert!(!slots.contains(first));
        assert!(!slots.remove(first));
        assert!(slots.contains(second));
    }

    #[test]
    fn live_count_tracks_churn() {
        let mut slots = EntitySlots::new();
        let mut held = Vec::new();
        for round in 0..50u32 {
            held.push(slots.insert());
            if round % 3 == 0 {
                let id = held.remove(0);
                assert!(slots.remove(id));
                assert!(!slots.remove(id));
            }
            assert_eq!(slots.len(), held.len());
            assert_eq!(slots.iter().count(), held.len());
        }
        let mut live: Vec<_> = slots.iter().collect();
        held.sort_by_key(|id| id.index());
        live.sort_by_key(|id| id.index());
        assert_eq!(live, held);
    }

    #[test]
    fn slot_at_generation_limit_is_retired() {
        let mut slots = EntitySlots::new();
        let id = slots.insert();
        slots.slots[0].generation = u32::MAX;
        let id = EntityId::new(id.index(), u32::MAX);
        assert!(slots.remove(id));
        assert!(slots.is_empty());
        assert_eq!(slots.insert().index(), 1);
        assert_eq!(slots.occupant(0), None);
    }
}
