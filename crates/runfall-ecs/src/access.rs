//! Per-job component access declarations.
//!
//! An [`Access`] records which component types a job reads and which it
//! writes. Two accesses conflict when one writes a type the other reads or
//! writes; the scheduler refuses to let conflicting jobs share a phase unless
//! one depends on the other.

use std::collections::BTreeSet;

use crate::component::ComponentTypeId;

/// How a job touches a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Shared, read-only.
    Read,
    /// Exclusive, read-write.
    Write,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Read => f.write_str("reads"),
            AccessKind::Write => f.write_str("writes"),
        }
    }
}

/// A conflicting pair found by [`Access::conflict_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessConflict {
    /// The contested component type.
    pub component: ComponentTypeId,
    /// How `self` touches it.
    pub ours: AccessKind,
    /// How the other access touches it.
    pub theirs: AccessKind,
}

/// Read and write sets of one job. A type in `writes` is never also listed in
/// `reads`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Access {
    reads: BTreeSet<ComponentTypeId>,
    writes: BTreeSet<ComponentTypeId>,
}

impl Access {
    /// Empty access.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a read. Ignored if the type is already written.
    pub fn add_read(&mut self, id: ComponentTypeId) {
        if !self.writes.contains(&id) {
            self.reads.insert(id);
        }
    }

    /// Declare a write. Upgrades an existing read.
    pub fn add_write(&mut self, id: ComponentTypeId) {
        self.reads.remove(&id);
        self.writes.insert(id);
    }

    /// Types read but not written.
    pub fn reads(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.reads.iter().copied()
    }

    /// Types written.
    pub fn writes(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.writes.iter().copied()
    }

    /// Whether the job may read `id` (writers may read their own types).
    pub fn can_read(&self, id: ComponentTypeId) -> bool {
        self.reads.contains(&id) || self.writes.contains(&id)
    }

    /// Whether the job may write `id`.
    pub fn can_write(&self, id: ComponentTypeId) -> bool {
        self.writes.contains(&id)
    }

    /// Whether this access writes nothing.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// First conflicting component between two accesses, if any.
    ///
    /// Conflicts are W/W, W/R and R/W; R/R never conflicts.
    pub fn conflict_with(&self, other: &Access) -> Option<AccessConflict> {
        for &id in &self.writes {
            if other.writes.contains(&id) {
                return Some(AccessConflict {
                    component: id,
                    ours: AccessKind::Write,
                    theirs: AccessKind::Write,
                });
            }
            if other.reads.contains(&id) {
                return Some(AccessConflict {
                    component: id,
                    ours: AccessKind::Write,
                    theirs: AccessKind::Read,
                });
            }
        }
        for &id in &self.reads {
            if other.writes.contains(&id) {
                return Some(AccessConflict {
                    component: id,
                    ours: AccessKind::Read,
                    theirs: AccessKind::Write,
                });
            }
        }
        None
    }

    /// Whether the two accesses conflict.
    pub fn conflicts_with(&self, other: &Access) -> bool {
        self.conflict_with(other).is_some()
    }
}
