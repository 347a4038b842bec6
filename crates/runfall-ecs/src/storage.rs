//! Per-type component columns.
//!
//! Each registered component type owns one [`Column`], a slot vector indexed by
//! entity index. Slot `i` belongs to whichever entity currently occupies index
//! `i`; the world clears every column's slot when an entity is despawned, so a
//! filled slot never outlives its entity.
//!
//! Columns are stored type-erased behind [`ErasedColumn`] so the world can
//! lend a writable column to a job as an owned value and take it back after
//! the job's phase completes.

use std::any::{Any, TypeId};

use crate::component::Component;

// ---------------------------------------------------------------------------
// ComponentValue
// ---------------------------------------------------------------------------

/// A type-erased component value travelling through the deferred log or a
/// [`ComponentBundle`](crate::world::ComponentBundle).
///
/// Carries the Rust `TypeId` rather than a registry id, so it can be built on
/// a worker thread without access to the registry.
pub struct ComponentValue {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl ComponentValue {
    /// Box a typed component.
    pub fn new<T: Component>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// Rust `TypeId` of the boxed value.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the boxed value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Recover the typed value, or `None` if `T` is not the boxed type.
    pub fn downcast<T: Component>(self) -> Option<T> {
        self.value.downcast::<T>().ok().map(|b| *b)
    }

    pub(crate) fn into_box(self) -> Box<dyn Any + Send> {
        self.value
    }
}

impl std::fmt::Debug for ComponentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentValue")
            .field("type", &self.type_name)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Dense slot storage for one component type.
#[derive(Debug)]
pub struct Column<T> {
    slots: Vec<Option<T>>,
    count: usize,
}

impl<T: Component> Column<T> {
    /// An empty column.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
        }
    }

    /// Component stored at `index`.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    /// Mutable component stored at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Whether `index` holds a value.
    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Store `value` at `index`, returning the previous value.
    pub fn insert(&mut self, index: u32, value: T) -> Option<T> {
        let idx = index as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        let previous = self.slots[idx].replace(value);
        if previous.is_none() {
            self.count += 1;
        }
        previous
    }

    /// Clear `index`, returning the removed value.
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let removed = self.slots.get_mut(index as usize).and_then(Option::take);
        if removed.is_some() {
            self.count -= 1;
        }
        removed
    }

    /// Number of filled slots.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Read-only view of every slot.
    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    /// Mutable view of every slot for in-place parallel writes.
    ///
    /// Callers may mutate filled values but must not fill or clear slots,
    /// which would desynchronize `count`.
    pub(crate) fn slots_mut(&mut self) -> &mut [Option<T>] {
        &mut self.slots
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ErasedColumn
// ---------------------------------------------------------------------------

/// Object-safe operations the world performs on a column without knowing `T`.
pub trait ErasedColumn: Send + Sync {
    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Whether `index` holds a value.
    fn contains(&self, index: u32) -> bool;
    /// Drop the value at `index`. Returns whether a value was present.
    fn remove_erased(&mut self, index: u32) -> bool;
    /// Insert or overwrite from a boxed value. Hands the box back on a type
    /// mismatch.
    fn insert_boxed(
        &mut self,
        index: u32,
        value: Box<dyn Any + Send>,
    ) -> Result<(), Box<dyn Any + Send>>;
    /// Overwrite an existing value. `Ok(false)` when the slot is empty.
    fn set_boxed(
        &mut self,
        index: u32,
        value: Box<dyn Any + Send>,
    ) -> Result<bool, Box<dyn Any + Send>>;
    /// Grow the slot vector to at least `len` slots.
    fn ensure_len(&mut self, len: usize);
    /// Serialize the value at `index` for digests and diagnostics.
    fn serialize_at(&self, index: u32) -> Option<serde_json::Value>;
    /// Number of filled slots.
    fn count(&self) -> usize;
}

impl<T: Component> ErasedColumn for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn contains(&self, index: u32) -> bool {
        Column::contains(self, index)
    }

    fn remove_erased(&mut self, index: u32) -> bool {
        self.remove(index).is_some()
    }

    fn insert_boxed(
        &mut self,
        index: u32,
        value: Box<dyn Any + Send>,
    ) -> Result<(), Box<dyn Any + Send>> {
        let typed = value.downcast::<T>()?;
        self.insert(index, *typed);
        Ok(())
    }

    fn set_boxed(
        &mut self,
        index: u32,
        value: Box<dyn Any + Send>,
    ) -> Result<bool, Box<dyn Any + Send>> {
        let typed = value.downcast::<T>()?;
        match self.get_mut(index) {
            Some(slot) => {
                *slot = *typed;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_len(&mut self, len: usize) {
        if self.slots.len() < len {
            self.slots.resize_with(len, || None);
        }
    }

    fn serialize_at(&self, index: u32) -> Option<serde_json::Value> {
        let value = self.get(index)?;
        match serde_json::to_value(value) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(
                    component = std::any::type_name::<T>(),
                    error = %e,
                    "component failed to serialize"
                );
                None
            }
        }
    }

    fn count(&self) -> usize {
        self.count
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
