//! The [`World`] is the entity store. It owns the entity slot table, the
//! component registry, one column per registered component type, and a typed
//! resource table for frame-wide shared values.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityId, EntitySlots};
use crate::storage::{Column, ComponentValue, ErasedColumn};
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentBundle
// ---------------------------------------------------------------------------

/// A set of components to attach to a new entity in one step.
///
/// Usage:
/// ```ignore
/// let bundle = ComponentBundle::new()
///     .with(Transform::default())
///     .with(Hazard::ice(10.0, 5.0));
/// world.spawn_bundle(bundle)?;
/// ```
#[derive(Debug, Default)]
pub struct ComponentBundle {
    values: Vec<ComponentValue>,
}

impl ComponentBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Builder-style [`add`](Self::add).
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.add(value);
        self
    }

    /// Add a component. A later value of the same type replaces the earlier one.
    pub fn add<T: Component>(&mut self, value: T) {
        let type_id = TypeId::of::<T>();
        self.values.retain(|v| v.type_id() != type_id);
        self.values.push(ComponentValue::new(value));
    }

    /// Number of components in the bundle.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn into_values(self) -> Vec<ComponentValue> {
        self.values
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Typed table of singleton values shared by every system in a frame.
///
/// Resources are read-only while jobs run; they are written only between
/// frames through `&mut World`.
#[derive(Default)]
struct Resources {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    fn insert<R: Send + Sync + 'static>(&mut self, value: R) -> Option<R> {
        self.values
            .insert(TypeId::of::<R>(), Box::new(value))
            .and_then(|old| old.downcast::<R>().ok().map(|b| *b))
    }

    fn get<R: Send + Sync + 'static>(&self) -> Option<&R> {
        self.values.get(&TypeId::of::<R>())?.downcast_ref::<R>()
    }

    fn get_mut<R: Send + Sync + 'static>(&mut self) -> Option<&mut R> {
        self.values.get_mut(&TypeId::of::<R>())?.downcast_mut::<R>()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level entity store.
pub struct World {
    entities: EntitySlots,
    registry: ComponentRegistry,
    /// One column per registered type, indexed by `ComponentTypeId`. A slot is
    /// `None` while its column is lent to a running job.
    columns: Vec<Option<Box<dyn ErasedColumn>>>,
    resources: Resources,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("component_types", &self.registry.len())
            .finish()
    }
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self {
            entities: EntitySlots::new(),
            registry: ComponentRegistry::new(),
            columns: Vec::new(),
            resources: Resources::default(),
        }
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register a component type and create its column.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let id = self.registry.register::<T>(name);
        if id.index() >= self.columns.len() {
            self.columns.resize_with(id.index() + 1, || None);
        }
        if self.columns[id.index()].is_none() {
            self.columns[id.index()] = Some(Box::new(Column::<T>::new()));
        }
        id
    }

    /// Registry id for `T`, if registered.
    pub fn component_type_id<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.registry.lookup::<T>()
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity with no components.
    pub fn spawn(&mut self) -> EntityId {
        self.entities.insert()
    }

    /// Spawn a new entity with a single component.
    pub fn spawn_with<T: Component>(&mut self, component: T) -> Result<EntityId, EcsError> {
        self.spawn_bundle(ComponentBundle::new().with(component))
    }

    /// Spawn a new entity from a [`ComponentBundle`].
    ///
    /// Every component type is resolved before the entity is allocated, so an
    /// unregistered type leaves the world untouched.
    pub fn spawn_bundle(&mut self, bundle: ComponentBundle) -> Result<EntityId, EcsError> {
        let values = bundle.into_values();
        let mut resolved = Vec::with_capacity(values.len());
        for value in values {
            let id = self.resolve(&value)?;
            resolved.push((id, value));
        }

        let entity = self.entities.insert();
        for (id, value) in resolved {
            self.insert_resolved(entity, id, value)?;
        }
        Ok(entity)
    }

    /// Despawn an entity, clearing all of its components and recycling the ID.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if !self.entities.contains(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        if let Some(slot) = self.columns.iter().position(Option::is_none) {
            return Err(EcsError::ColumnUnavailable {
                component: self.registry.name_of(ComponentTypeId(slot as u32)).to_owned(),
            });
        }
        let index = entity.index();
        for column in self.columns.iter_mut().flatten() {
            column.remove_erased(index);
        }
        self.entities.remove(entity);
        Ok(())
    }

    /// Whether `entity` refers to a live entity. The only safe way to use a
    /// handle stored inside another component.
    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    /// Live entity currently occupying `index`.
    #[inline]
    pub fn entity_at(&self, index: u32) -> Option<EntityId> {
        self.entities.occupant(index)
    }

    /// Total number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of index slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.entities.slot_count()
    }

    // -- component access ---------------------------------------------------

    /// Typed column for `T`, unless unregistered or currently lent out.
    pub fn column<T: Component>(&self) -> Option<&Column<T>> {
        let id = self.registry.lookup::<T>()?;
        self.erased_column(id)?.as_any().downcast_ref::<Column<T>>()
    }

    fn column_mut<T: Component>(&mut self) -> Option<&mut Column<T>> {
        let id = self.registry.lookup::<T>()?;
        self.columns
            .get_mut(id.index())?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<Column<T>>()
    }

    /// Type-erased column for `id`, unless currently lent out.
    pub fn erased_column(&self, id: ComponentTypeId) -> Option<&dyn ErasedColumn> {
        self.columns.get(id.index())?.as_deref()
    }

    /// Get an immutable reference to a component on an entity.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        if !self.entities.contains(entity) {
            return None;
        }
        self.column::<T>()?.get(entity.index())
    }

    /// Get a mutable reference to a component on an entity.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        if !self.entities.contains(entity) {
            return None;
        }
        self.column_mut::<T>()?.get_mut(entity.index())
    }

    /// Check whether an entity has a given component type.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    /// Check presence of a component by registry id.
    pub fn has_component_id(&self, entity: EntityId, id: ComponentTypeId) -> bool {
        self.entities.contains(entity)
            && self
                .erased_column(id)
                .is_some_and(|column| column.contains(entity.index()))
    }

    /// Insert a component on an entity, overwriting any existing value.
    pub fn insert_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<(), EcsError> {
        self.insert_value(entity, ComponentValue::new(value))
    }

    /// Insert (or overwrite) a type-erased component value.
    pub fn insert_value(&mut self, entity: EntityId, value: ComponentValue) -> Result<(), EcsError> {
        if !self.entities.contains(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let id = self.resolve(&value)?;
        self.insert_resolved(entity, id, value)
    }

    /// Overwrite an existing component. Fails with
    /// [`EcsError::MissingComponent`] if the entity lacks it.
    pub fn set_value(&mut self, entity: EntityId, value: ComponentValue) -> Result<(), EcsError> {
        if !self.entities.contains(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let id = self.resolve(&value)?;
        let type_name = value.type_name();
        let column = column_slot(&mut self.columns, &self.registry, id)?;
        match column.set_boxed(entity.index(), value.into_box()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(EcsError::MissingComponent {
                entity,
                component: self.registry.name_of(id).to_owned(),
            }),
            Err(_) => Err(EcsError::ComponentTypeMismatch {
                component: self.registry.name_of(id).to_owned(),
                type_name,
            }),
        }
    }

    /// Remove a component type from an entity, returning the old value.
    pub fn remove_component<T: Component>(
        &mut self,
        entity: EntityId,
    ) -> Result<Option<T>, EcsError> {
        if !self.entities.contains(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let column = self.column_mut::<T>().ok_or_else(|| EcsError::UnknownComponent {
            name: std::any::type_name::<T>().to_owned(),
        })?;
        Ok(column.remove(entity.index()))
    }

    /// Remove a component by registry id. Returns whether a value was present.
    pub fn remove_component_id(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
    ) -> Result<bool, EcsError> {
        if !self.entities.contains(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let column = column_slot(&mut self.columns, &self.registry, id)?;
        Ok(column.remove_erased(entity.index()))
    }

    /// Serialized value of the component registered as `name`, for
    /// diagnostics.
    pub fn component_json(&self, entity: EntityId, name: &str) -> Option<serde_json::Value> {
        if !self.entities.contains(entity) {
            return None;
        }
        let id = self.registry.lookup_by_name(name)?;
        self.erased_column(id)?.serialize_at(entity.index())
    }

    // -- resources ----------------------------------------------------------

    /// Insert a resource, returning the previous value of the same type.
    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, value: R) -> Option<R> {
        self.resources.insert(value)
    }

    /// Read a resource.
    pub fn resource<R: Send + Sync + 'static>(&self) -> Option<&R> {
        self.resources.get::<R>()
    }

    /// Mutate a resource.
    pub fn resource_mut<R: Send + Sync + 'static>(&mut self) -> Option<&mut R> {
        self.resources.get_mut::<R>()
    }

    // -- column lending -----------------------------------------------------

    /// Take the column for `id` out of the world so a job can own it for one
    /// phase. The column is grown to cover every allocated index first.
    pub(crate) fn lend_column(
        &mut self,
        id: ComponentTypeId,
    ) -> Result<Box<dyn ErasedColumn>, EcsError> {
        let capacity = self.entities.slot_count();
        let mut column = self
            .columns
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| EcsError::ColumnUnavailable {
                component: self.registry.name_of(id).to_owned(),
            })?;
        column.ensure_len(capacity);
        Ok(column)
    }

    /// Put a lent column back.
    pub(crate) fn restore_column(&mut self, id: ComponentTypeId, column: Box<dyn ErasedColumn>) {
        debug_assert!(self.columns[id.index()].is_none(), "column restored twice");
        self.columns[id.index()] = Some(column);
    }

    // -- digests ------------------------------------------------------------

    /// BLAKE3 hex digest of every live entity and its serialized components,
    /// in index order with components sorted by name.
    pub fn state_digest(&self) -> String {
        let mut names: Vec<(&str, ComponentTypeId)> = self
            .registry
            .registered_names()
            .into_iter()
            .filter_map(|name| Some((name, self.registry.lookup_by_name(name)?)))
            .collect();
        names.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = blake3::Hasher::new();
        for entity in self.entities.iter() {
            let index = entity.index();
            hasher.update(&entity.to_raw().to_le_bytes());
            for (name, id) in &names {
                let Some(json) = self
                    .erased_column(*id)
                    .and_then(|column| column.serialize_at(index))
                else {
                    continue;
                };
                hasher.update(name.as_bytes());
                hasher.update(json.to_string().as_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    // -- internal helpers ---------------------------------------------------

    fn resolve(&self, value: &ComponentValue) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup_type_id(value.type_id())
            .ok_or_else(|| EcsError::UnknownComponent {
                name: value.type_name().to_owned(),
            })
    }

    fn insert_resolved(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
        value: ComponentValue,
    ) -> Result<(), EcsError> {
        let type_name = value.type_name();
        let column = column_slot(&mut self.columns, &self.registry, id)?;
        column
            .insert_boxed(entity.index(), value.into_box())
            .map_err(|_| EcsError::ComponentTypeMismatch {
                component: self.registry.name_of(id).to_owned(),
                type_name,
            })
    }
}

/// The column for `id`, or `ColumnUnavailable` while it is lent out.
fn column_slot<'a>(
    columns: &'a mut [Option<Box<dyn ErasedColumn>>],
    registry: &ComponentRegistry,
    id: ComponentTypeId,
) -> Result<&'a mut Box<dyn ErasedColumn>, EcsError> {
    columns
        .get_mut(id.index())
        .and_then(Option::as_mut)
        .ok_or_else(|| EcsError::ColumnUnavailable {
            component: registry.name_of(id).to_owned(),
        })
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
