//! The aggregate container: a live root and the snapshot it started from.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use ap_deepeq::{DeepEquals, Inspect};
use tracing::debug;

use crate::comparator::DeepComparator;
use crate::copier::DeepCopier;
use crate::delta::{ChangedEntity, CollectionDelta};
use crate::error::{AggregateError, AggregateResult, CollectionSide};
use crate::versioned::Versioned;

/// An aggregate root together with a snapshot of its loaded state.
///
/// Repositories hand out aggregates, the application mutates the root, and
/// the repository compares root and snapshot on save to decide what to
/// write. The snapshot is taken once, on construction, and never changes.
pub struct Aggregate<R, C = DeepEquals> {
    root: R,
    snapshot: R,
    comparator: C,
}

impl<R, C> Aggregate<R, C>
where
    R: Versioned + Inspect,
    C: DeepComparator,
{
    /// Wrap `root`, snapshotting it with `copier`.
    pub fn new<P: DeepCopier<R> + ?Sized>(root: R, copier: &P, comparator: C) -> AggregateResult<Self> {
        let snapshot = copier.copy(&root)?;
        debug!(
            root = std::any::type_name::<R>(),
            version = root.version(),
            "aggregate snapshot taken"
        );
        Ok(Self {
            root,
            snapshot,
            comparator,
        })
    }

    pub fn root(&self) -> &R {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut R {
        &mut self.root
    }

    /// The root as it was when the aggregate was created.
    pub fn snapshot(&self) -> &R {
        &self.snapshot
    }

    pub fn into_root(self) -> R {
        self.root
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Returns `true` if the root has never been persisted.
    pub fn is_new(&self) -> bool {
        self.root.is_new_version()
    }

    /// Returns `true` if the root differs in value from its snapshot.
    pub fn is_changed(&self) -> AggregateResult<bool> {
        Ok(!self.comparator.is_deep_equal(&self.root, &self.snapshot)?)
    }

    /// Split a child collection into entities to insert, update and delete.
    ///
    /// `selector` picks the collection out of a root; `id_fn` extracts each
    /// entity's identity, which must be unique within the collection.
    /// Entities present only in the root are new, entities present only in
    /// the snapshot are removed, and entities present in both are updated
    /// when their values differ. For a new aggregate every entity is new.
    pub fn find_collection_delta<'a, T, I, K, S, F>(
        &'a self,
        selector: S,
        id_fn: F,
    ) -> AggregateResult<CollectionDelta<'a, T>>
    where
        T: Inspect + 'a,
        I: IntoIterator<Item = &'a T>,
        K: Eq + Hash + Debug,
        S: Fn(&'a R) -> I,
        F: Fn(&T) -> K,
    {
        if self.is_new() {
            let delta = CollectionDelta {
                new: selector(&self.root).into_iter().collect(),
                ..CollectionDelta::default()
            };
            debug!(new = delta.new.len(), "collection delta of new aggregate");
            return Ok(delta);
        }

        let diff = self.diff_collection(&selector, &id_fn)?;
        let delta = CollectionDelta {
            new: diff.new,
            updated: diff.changed.iter().map(|c| c.current).collect(),
            removed: diff.removed,
        };
        debug!(
            new = delta.new.len(),
            updated = delta.updated.len(),
            removed = delta.removed.len(),
            "collection delta computed"
        );
        Ok(delta)
    }

    /// Updated entities of a child collection, each paired with its
    /// snapshot value. Empty for a new aggregate.
    pub fn find_changed_entities<'a, T, I, K, S, F>(
        &'a self,
        selector: S,
        id_fn: F,
    ) -> AggregateResult<Vec<ChangedEntity<'a, T>>>
    where
        T: Inspect + 'a,
        I: IntoIterator<Item = &'a T>,
        K: Eq + Hash + Debug,
        S: Fn(&'a R) -> I,
        F: Fn(&T) -> K,
    {
        if self.is_new() {
            return Ok(Vec::new());
        }
        Ok(self.diff_collection(&selector, &id_fn)?.changed)
    }

    fn diff_collection<'a, T, I, K, S, F>(
        &'a self,
        selector: &S,
        id_fn: &F,
    ) -> AggregateResult<CollectionDiff<'a, T>>
    where
        T: Inspect + 'a,
        I: IntoIterator<Item = &'a T>,
        K: Eq + Hash + Debug,
        S: Fn(&'a R) -> I,
        F: Fn(&T) -> K,
    {
        let current = IdIndex::build(selector(&self.root), id_fn, CollectionSide::Current)?;
        let snapshot = IdIndex::build(selector(&self.snapshot), id_fn, CollectionSide::Snapshot)?;

        let mut diff = CollectionDiff {
            new: Vec::new(),
            changed: Vec::new(),
            removed: Vec::new(),
        };
        for &entity in &current.items {
            let id = id_fn(entity);
            if !snapshot.contains(&id) {
                diff.new.push(entity);
                continue;
            }
            let before = snapshot.get(&id)?;
            let after = current.get(&id)?;
            if !self.comparator.is_deep_equal(before, after)? {
                diff.changed.push(ChangedEntity {
                    snapshot: before,
                    current: after,
                });
            }
        }
        for &entity in &snapshot.items {
            if !current.contains(&id_fn(entity)) {
                diff.removed.push(entity);
            }
        }
        Ok(diff)
    }
}

impl<R: Debug, C> Debug for Aggregate<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate")
            .field("root", &self.root)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

struct CollectionDiff<'a, T> {
    new: Vec<&'a T>,
    changed: Vec<ChangedEntity<'a, T>>,
    removed: Vec<&'a T>,
}

/// Entities of one collection in selection order, indexed by identity.
struct IdIndex<'a, T, K> {
    items: Vec<&'a T>,
    by_id: HashMap<K, &'a T>,
    side: CollectionSide,
}

impl<'a, T, K: Eq + Hash + Debug> IdIndex<'a, T, K> {
    fn build(
        entities: impl IntoIterator<Item = &'a T>,
        id_fn: &impl Fn(&T) -> K,
        side: CollectionSide,
    ) -> AggregateResult<Self> {
        let mut items = Vec::new();
        let mut by_id = HashMap::new();
        for entity in entities {
            match by_id.entry(id_fn(entity)) {
                Entry::Occupied(slot) => {
                    return Err(AggregateError::DuplicateIdentity {
                        id: format!("{:?}", slot.key()),
                        side,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entity);
                }
            }
            items.push(entity);
        }
        Ok(Self { items, by_id, side })
    }

    fn contains(&self, id: &K) -> bool {
        self.by_id.contains_key(id)
    }

    fn get(&self, id: &K) -> AggregateResult<&'a T> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| AggregateError::EntityNotFound {
                id: format!("{id:?}"),
                side: self.side,
            })
    }
}
