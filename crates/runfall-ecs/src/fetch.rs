//! Write sets: the component tuples a `ForEach` job mutates in place.
//!
//! A [`WriteSet`] is a tuple of component types `()`, `(A,)`, `(A, B)` or
//! `(A, B, C)`. The scheduler lends the matching columns to the job; the
//! write set walks them in parallel with rayon, zipped with a per-index row
//! mask, and hands the closure `&mut` references for every row where all
//! written components are present.

use rayon::prelude::*;

use crate::component::{Component, ComponentKey};
use crate::entity::EntityId;
use crate::storage::{Column, ErasedColumn};
use crate::EcsError;

/// Tuple of component types written by a job.
pub trait WriteSet: 'static {
    /// Per-row mutable references handed to the job closure.
    type Item<'a>;

    /// Keys of the written types, in tuple order.
    fn keys() -> Vec<ComponentKey>;

    /// Run `f` over every row selected by `rows` whose written components
    /// are all present. `columns` holds the lent columns in [`keys`](Self::keys)
    /// order; `rows[i]` is the entity at index `i` when it passed the rest of
    /// the job's filter. Returns the number of rows processed.
    fn for_each<F>(
        columns: &mut [Box<dyn ErasedColumn>],
        rows: &[Option<EntityId>],
        f: F,
    ) -> Result<usize, EcsError>
    where
        F: for<'a> Fn(EntityId, Self::Item<'a>) + Send + Sync;
}

fn typed<T: Component>(column: &mut Box<dyn ErasedColumn>) -> Result<&mut Column<T>, EcsError> {
    column
        .as_any_mut()
        .downcast_mut::<Column<T>>()
        .ok_or_else(|| EcsError::ComponentTypeMismatch {
            component: std::any::type_name::<T>().to_owned(),
            type_name: std::any::type_name::<T>(),
        })
}

fn arity_mismatch(expected: usize, got: usize) -> EcsError {
    EcsError::ColumnUnavailable {
        component: format!("write set expected {expected} columns, got {got}"),
    }
}

impl WriteSet for () {
    type Item<'a> = ();

    fn keys() -> Vec<ComponentKey> {
        Vec::new()
    }

    fn for_each<F>(
        columns: &mut [Box<dyn ErasedColumn>],
        rows: &[Option<EntityId>],
        f: F,
    ) -> Result<usize, EcsError>
    where
        F: for<'a> Fn(EntityId, Self::Item<'a>) + Send + Sync,
    {
        if !columns.is_empty() {
            return Err(arity_mismatch(0, columns.len()));
        }
        Ok(rows
            .par_iter()
            .filter_map(|row| *row)
            .map(|entity| {
                f(entity, ());
                1
            })
            .sum())
    }
}

impl<A: Component> WriteSet for (A,) {
    type Item<'a> = (&'a mut A,);

    fn keys() -> Vec<ComponentKey> {
        vec![ComponentKey::of::<A>()]
    }

    fn for_each<F>(
        columns: &mut [Box<dyn ErasedColumn>],
        rows: &[Option<EntityId>],
        f: F,
    ) -> Result<usize, EcsError>
    where
        F: for<'a> Fn(EntityId, Self::Item<'a>) + Send + Sync,
    {
        let got = columns.len();
        let [a] = columns else {
            return Err(arity_mismatch(1, got));
        };
        let a = typed::<A>(a)?;
        Ok(a.slots_mut()
            .par_iter_mut()
            .zip(rows.par_iter())
            .map(|(sa, row)| match (row, sa.as_mut()) {
                (Some(entity), Some(a)) => {
                    f(*entity, (a,));
                    1
                }
                _ => 0,
            })
            .sum())
    }
}

impl<A: Component, B: Component> WriteSet for (A, B) {
    type Item<'a> = (&'a mut A, &'a mut B);

    fn keys() -> Vec<ComponentKey> {
        vec![ComponentKey::of::<A>(), ComponentKey::of::<B>()]
    }

    fn for_each<F>(
        columns: &mut [Box<dyn ErasedColumn>],
        rows: &[Option<EntityId>],
        f: F,
    ) -> Result<usize, EcsError>
    where
        F: for<'a> Fn(EntityId, Self::Item<'a>) + Send + Sync,
    {
        let got = columns.len();
        let [a, b] = columns else {
            return Err(arity_mismatch(2, got));
        };
        let a = typed::<A>(a)?;
        let b = typed::<B>(b)?;
        Ok(a.slots_mut()
            .par_iter_mut()
            .zip(b.slots_mut().par_iter_mut())
            .zip(rows.par_iter())
            .map(|((sa, sb), row)| match (row, sa.as_mut(), sb.as_mut()) {
                (Some(entity), Some(a), Some(b)) => {
                    f(*entity, (a, b));
                    1
                }
                _ => 0,
            })
            .sum())
    }
}

impl<A: Component, B: Component, C: Component> WriteSet for (A, B, C) {
    type Item<'a> = (&'a mut A, &'a mut B, &'a mut C);

    fn keys() -> Vec<ComponentKey> {
        vec![
            ComponentKey::of::<A>(),
            ComponentKey::of::<B>(),
            ComponentKey::of::<C>(),
        ]
    }

    fn for_each<F>(
        columns: &mut [Box<dyn ErasedColumn>],
        rows: &[Option<EntityId>],
        f: F,
    ) -> Result<usize, EcsError>
    where
        F: for<'a> Fn(EntityId, Self::Item<'a>) + Send + Sync,
    {
        let got = columns.len();
        let [a, b, c] = columns else {
            return Err(arity_mismatch(3, got));
        };
        let a = typed::<A>(a)?;
        let b = typed::<B>(b)?;
        let c = typed::<C>(c)?;
        Ok(a.slots_mut()
            .par_iter_mut()
            .zip(b.slots_mut().par_iter_mut())
            .zip(c.slots_mut().par_iter_mut())
            .zip(rows.par_iter())
            .map(
                |(((sa, sb), sc), row)| match (row, sa.as_mut(), sb.as_mut(), sc.as_mut()) {
                    (Some(entity), Some(a), Some(b), Some(c)) => {
                        f(*entity, (a, b, c));
                        1
                    }
                    _ => 0,
                },
            )
            .sum())
    }
}
