//! Component type registration and metadata.
//!
//! Every component type used in the store must be registered at runtime in a
//! [`ComponentRegistry`]. Registration produces a [`ComponentTypeId`] that is
//! used as the key for column lookups, query matching, and access tracking.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Bound shared by every component type.
///
/// Components are plain data: cloneable (snapshots copy them), shareable
/// across worker threads, and serializable for state digests.
pub trait Component: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Component for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Position of this type in the registry (and in the world's column table).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentKey
// ---------------------------------------------------------------------------

/// Registry-independent name for a component type.
///
/// Filters and job declarations are built from keys so they can be written
/// without a world at hand; they are resolved to [`ComponentTypeId`]s when the
/// job is scheduled or the filter is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ComponentKey {
    /// Key for `T`.
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Rust `TypeId` of the keyed type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Resolve against a registry.
    pub fn resolve(&self, registry: &ComponentRegistry) -> Result<ComponentTypeId, EcsError> {
        registry
            .lookup_type_id(self.type_id)
            .ok_or_else(|| EcsError::UnknownComponent {
                name: self.type_name.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller).
    pub name: String,
    /// `std::mem::size_of::<T>()`
    pub size: usize,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
    /// `std::any::type_name::<T>()`, for diagnostics.
    pub type_name: &'static str,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing [`ComponentTypeId`].
#[derive(Debug)]
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Name -> ComponentTypeId for lookup by string name.
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            infos: Vec::new(),
        }
    }

    /// Register a component type under the given `name`.
    ///
    /// If the type has already been registered, the existing
    /// [`ComponentTypeId`] is returned and `name` is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken by a different type.
    pub fn register<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return existing;
        }
        if self.by_name.contains_key(name) {
            panic!(
                "component name '{}' is already registered for a different type",
                name
            );
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            size: std::mem::size_of::<T>(),
            type_id: rust_type_id,
            type_name: std::any::type_name::<T>(),
        });
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Look up a component type by its Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.lookup_type_id(TypeId::of::<T>())
    }

    /// Look up a component type by a Rust `TypeId` captured elsewhere
    /// (deferred log payloads carry the `TypeId`, not the registry id).
    pub fn lookup_type_id(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.by_type.get(&type_id).copied()
    }

    /// Look up a component type by its registered string name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Registered name for `id`, or `"<unregistered>"`.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id).map_or("<unregistered>", |info| info.name.as_str())
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Pos>("position");
        assert_eq!(reg.lookup::<Pos>(), Some(id));
        assert_eq!(reg.lookup_by_name("position"), Some(id));
        assert_eq!(reg.lookup_type_id(TypeId::of::<Pos>()), Some(id));
    }

    #[test]
    fn same_type_same_id() {
        let mut reg = ComponentRegistry::new();
        let id1 = reg.register::<Pos>("position");
        let id2 = reg.register::<Pos>("position_again");
        assert_eq!(id1, id2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn different_types_different_ids() {
        let mut reg = ComponentRegistry::new();
        let p = reg.register::<Pos>("position");
        let v = reg.register::<Vel>("velocity");
        assert_ne!(p, v);
        assert_eq!(reg.name_of(v), "velocity");
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn name_clash_panics() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Pos>("thing");
        reg.register::<Vel>("thing");
    }

    #[test]
    fn key_resolution() {
        let mut reg = ComponentRegistry::new();
        assert!(ComponentKey::of::<Pos>().resolve(&reg).is_err());
        let id = reg.register::<Pos>("position");
        assert_eq!(ComponentKey::of::<Pos>().resolve(&reg).unwrap(), id);
    }

    #[test]
    fn info_correctness() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Pos>("position");
        let info = reg.get_info(id).unwrap();
        assert_eq!(info.name, "position");
        assert_eq!(info.size, std::mem::size_of::<Pos>());
        assert_eq!(info.type_id, TypeId::of::<Pos>());
    }
}
