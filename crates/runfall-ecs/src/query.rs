//! Query engine: filters over component sets and typed read-only iteration.
//!
//! A [`Filter`] names required and excluded component types. It is stateless
//! and cheap to rebuild every frame; evaluating it against a [`World`] yields
//! the current matching entity set in ascending index order.
//!
//! [`World::query`] iterates `(EntityId, (&A, &B, ..))` tuples for read-only
//! access outside of jobs. Mutation during a frame goes through jobs and the
//! deferred log instead.

use crate::component::{Component, ComponentKey, ComponentTypeId};
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Declarative `(required, excluded)` component filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    required: Vec<ComponentKey>,
    excluded: Vec<ComponentKey>,
}

impl Filter {
    /// A filter matching every live entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `T`.
    pub fn with<T: Component>(mut self) -> Self {
        self.require(ComponentKey::of::<T>());
        self
    }

    /// Exclude `T`.
    pub fn without<T: Component>(mut self) -> Self {
        let key = ComponentKey::of::<T>();
        if !self.excluded.contains(&key) {
            self.excluded.push(key);
        }
        self
    }

    pub(crate) fn require(&mut self, key: ComponentKey) {
        if !self.required.contains(&key) {
            self.required.push(key);
        }
    }

    /// Required component keys.
    pub fn required(&self) -> &[ComponentKey] {
        &self.required
    }

    /// Excluded component keys.
    pub fn excluded(&self) -> &[ComponentKey] {
        &self.excluded
    }

    /// Resolve the keys against the world's registry.
    pub fn resolve(&self, world: &World) -> Result<ResolvedFilter, EcsError> {
        let registry = world.registry();
        let required = self
            .required
            .iter()
            .map(|key| key.resolve(registry))
            .collect::<Result<Vec<_>, _>>()?;
        let excluded = self
            .excluded
            .iter()
            .map(|key| key.resolve(registry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedFilter { required, excluded })
    }
}

/// A [`Filter`] resolved to registry ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFilter {
    /// Types every match must have.
    pub required: Vec<ComponentTypeId>,
    /// Types no match may have.
    pub excluded: Vec<ComponentTypeId>,
}

impl ResolvedFilter {
    /// Whether the live entity at `index` matches, skipping the types in
    /// `skip` (columns the caller has already checked itself).
    ///
    /// Every non-skipped column must be present in the world.
    pub(crate) fn matches_index(&self, world: &World, index: u32, skip: &[ComponentTypeId]) -> bool {
        let present = |id: &ComponentTypeId| {
            world
                .erased_column(*id)
                .is_some_and(|column| column.contains(index))
        };
        self.required
            .iter()
            .filter(|id| !skip.contains(id))
            .all(present)
            && !self
                .excluded
                .iter()
                .filter(|id| !skip.contains(id))
                .any(present)
    }

    /// Whether `entity` is alive and matches.
    pub fn matches(&self, world: &World, entity: EntityId) -> bool {
        world.is_alive(entity) && self.matches_index(world, entity.index(), &[])
    }
}

impl World {
    /// Current set of entities matching `filter`, in ascending index order.
    pub fn matching(&self, filter: &Filter) -> Result<Vec<EntityId>, EcsError> {
        let resolved = filter.resolve(self)?;
        Ok((0..self.capacity() as u32)
            .filter_map(|index| self.entity_at(index))
            .filter(|entity| resolved.matches_index(self, entity.index(), &[]))
            .collect())
    }

    /// Number of entities matching `filter`.
    pub fn count_matching(&self, filter: &Filter) -> Result<usize, EcsError> {
        Ok(self.matching(filter)?.len())
    }

    /// Read-only typed iteration over every entity holding all of `Q`'s
    /// components.
    pub fn query<Q: Query>(&self) -> QueryIter<'_, Q> {
        self.query_filtered::<Q>(&Filter::new())
    }

    /// Like [`query`](Self::query) with extra filter constraints. Unknown
    /// component types yield an empty iterator.
    pub fn query_filtered<Q: Query>(&self, filter: &Filter) -> QueryIter<'_, Q> {
        let mut filter = filter.clone();
        for key in Q::keys() {
            filter.require(key);
        }
        let resolved = match filter.resolve(self) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                tracing::debug!(error = %e, "query over unregistered component matches nothing");
                None
            }
        };
        QueryIter {
            world: self,
            filter: resolved,
            cursor: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryItem / Query
// ---------------------------------------------------------------------------

/// A single element of a read query tuple: `&T`.
pub trait QueryItem {
    /// The output type yielded per row.
    type Item<'w>;
    /// Key of the accessed component type.
    fn key() -> ComponentKey;
    /// Fetch the item for the entity at `index`.
    fn fetch(world: &World, index: u32) -> Option<Self::Item<'_>>;
}

impl<T: Component> QueryItem for &T {
    type Item<'w> = &'w T;

    fn key() -> ComponentKey {
        ComponentKey::of::<T>()
    }

    fn fetch(world: &World, index: u32) -> Option<Self::Item<'_>> {
        world.column::<T>()?.get(index)
    }
}

/// A tuple of [`QueryItem`]s: `(&A,)`, `(&A, &B)`, `(&A, &B, &C)`.
pub trait Query {
    /// The per-row output type.
    type Item<'w>;
    /// Keys of every accessed component type.
    fn keys() -> Vec<ComponentKey>;
    /// Fetch one row.
    fn fetch_row(world: &World, index: u32) -> Option<Self::Item<'_>>;
}

impl<A: QueryItem> Query for (A,) {
    type Item<'w> = (A::Item<'w>,);

    fn keys() -> Vec<ComponentKey> {
        vec![A::key()]
    }

    fn fetch_row(world: &World, index: u32) -> Option<Self::Item<'_>> {
        Some((A::fetch(world, index)?,))
    }
}

impl<A: QueryItem, B: QueryItem> Query for (A, B) {
    type Item<'w> = (A::Item<'w>, B::Item<'w>);

    fn keys() -> Vec<ComponentKey> {
        vec![A::key(), B::key()]
    }

    fn fetch_row(world: &World, index: u32) -> Option<Self::Item<'_>> {
        Some((A::fetch(world, index)?, B::fetch(world, index)?))
    }
}

impl<A: QueryItem, B: QueryItem, C: QueryItem> Query for (A, B, C) {
    type Item<'w> = (A::Item<'w>, B::Item<'w>, C::Item<'w>);

    fn keys() -> Vec<ComponentKey> {
        vec![A::key(), B::key(), C::key()]
    }

    fn fetch_row(world: &World, index: u32) -> Option<Self::Item<'_>> {
        Some((
            A::fetch(world, index)?,
            B::fetch(world, index)?,
            C::fetch(world, index)?,
        ))
    }
}

// ---------------------------------------------------------------------------
// QueryIter
// ---------------------------------------------------------------------------

/// Iterator yielding `(EntityId, Q::Item)` for all matching entities, in
/// ascending index order.
pub struct QueryIter<'w, Q: Query> {
    world: &'w World,
    filter: Option<ResolvedFilter>,
    cursor: u32,
    _marker: std::marker::PhantomData<Q>,
}

impl<'w, Q: Query> Iterator for QueryIter<'w, Q> {
    type Item = (EntityId, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter.as_ref()?;
        while (self.cursor as usize) < self.world.capacity() {
            let index = self.cursor;
            self.cursor += 1;
            let Some(entity) = self.world.entity_at(index) else {
                continue;
            };
            if !filter.matches_index(self.world, index, &[]) {
                continue;
            }
            if let Some(item) = Q::fetch_row(self.world, index) {
                return Some((entity, item));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ComponentBundle;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Position {
        x: f32,
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Barrier;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Broken;

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Position>("position");
        world.register_component::<Barrier>("barrier");
        world.register_component::<Broken>("broken");
        world
    }

    #[test]
    fn filter_required_and_excluded() {
        let mut world = setup_world();
        let a = world
            .spawn_bundle(ComponentBundle::new().with(Position { x: 1.0 }).with(Barrier))
            .unwrap();
        let _b = world
            .spawn_bundle(
                ComponentBundle::new()
                    .with(Position { x: 2.0 })
                    .with(Barrier)
                    .with(Broken),
            )
            .unwrap();
        let _c = world.spawn_with(Position { x: 3.0 }).unwrap();

        let filter = Filter::new().with::<Barrier>().without::<Broken>();
        assert_eq!(world.matching(&filter).unwrap(), vec![a]);
        assert_eq!(world.count_matching(&Filter::new().with::<Position>()).unwrap(), 3);
    }

    #[test]
    fn unknown_component_in_filter_is_an_error() {
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        struct Ghost;
        let world = setup_world();
        assert!(matches!(
            world.matching(&Filter::new().with::<Ghost>()),
            Err(EcsError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn typed_query_skips_entities_missing_required() {
        let mut world = setup_world();
        let a = world
            .spawn_bundle(ComponentBundle::new().with(Position { x: 1.0 }).with(Barrier))
            .unwrap();
        world.spawn_with(Position { x: 10.0 }).unwrap();

        let results: Vec<_> = world.query::<(&Position, &Barrier)>().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, a);
        assert_eq!(results[0].1 .0, &Position { x: 1.0 });
    }

    #[test]
    fn query_filtered_excludes() {
        let mut world = setup_world();
        world
            .spawn_bundle(ComponentBundle::new().with(Position { x: 1.0 }).with(Broken))
            .unwrap();
        let keep = world.spawn_with(Position { x: 2.0 }).unwrap();
        let found: Vec<EntityId> = world
            .query_filtered::<(&Position,)>(&Filter::new().without::<Broken>())
            .map(|(e, _)| e)
            .collect();
        assert_eq!(found, vec![keep]);
    }

    #[test]
    fn matching_reflects_despawn() {
        let mut world = setup_world();
        let a = world.spawn_with(Barrier).unwrap();
        let b = world.spawn_with(Barrier).unwrap();
        world.despawn(a).unwrap();
        assert_eq!(world.matching(&Filter::new().with::<Barrier>()).unwrap(), vec![b]);
    }
}
