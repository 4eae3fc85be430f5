//! Results of comparing a child collection against its snapshot.

use std::fmt;

/// The kind of write an entity needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaType {
    /// Present now, absent from the snapshot: insert.
    New,
    /// Present in both with different values: update.
    Updated,
    /// Present in the snapshot, absent now: delete.
    Removed,
}

impl fmt::Display for DeltaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaType::New => f.write_str("new"),
            DeltaType::Updated => f.write_str("updated"),
            DeltaType::Removed => f.write_str("removed"),
        }
    }
}

/// Entities of one child collection grouped by the write they need.
///
/// `new` and `updated` borrow from the live root, `removed` from the
/// snapshot.
#[derive(Debug)]
pub struct CollectionDelta<'a, T> {
    pub new: Vec<&'a T>,
    pub updated: Vec<&'a T>,
    pub removed: Vec<&'a T>,
}

impl<'a, T> CollectionDelta<'a, T> {
    /// Entities of one kind.
    pub fn get(&self, kind: DeltaType) -> &[&'a T] {
        match kind {
            DeltaType::New => &self.new,
            DeltaType::Updated => &self.updated,
            DeltaType::Removed => &self.removed,
        }
    }

    /// Returns `true` if nothing needs to be written.
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of entities needing a write.
    pub fn len(&self) -> usize {
        self.new.len() + self.updated.len() + self.removed.len()
    }
}

impl<T> Clone for CollectionDelta<'_, T> {
    fn clone(&self) -> Self {
        Self {
            new: self.new.clone(),
            updated: self.updated.clone(),
            removed: self.removed.clone(),
        }
    }
}

impl<T> Default for CollectionDelta<'_, T> {
    fn default() -> Self {
        Self {
            new: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// An updated entity together with its snapshot value, for building
/// partial updates.
#[derive(Debug)]
pub struct ChangedEntity<'a, T> {
    pub snapshot: &'a T,
    pub current: &'a T,
}

impl<T> Clone for ChangedEntity<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ChangedEntity<'_, T> {}
