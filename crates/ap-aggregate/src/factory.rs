//! Builds aggregates with a shared copier and comparator.

use ap_deepeq::{DeepEquals, Inspect};

use crate::aggregate::Aggregate;
use crate::comparator::DeepComparator;
use crate::copier::{BincodeCopier, DeepCopier};
use crate::error::AggregateResult;
use crate::versioned::Versioned;

/// Creates [`Aggregate`]s, snapshotting each root with the same copier and
/// handing each one a clone of the same comparator.
#[derive(Clone, Debug, Default)]
pub struct AggregateFactory<P = BincodeCopier, C = DeepEquals> {
    copier: P,
    comparator: C,
}

impl AggregateFactory {
    /// A factory using [`BincodeCopier`] and a default [`DeepEquals`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P, C> AggregateFactory<P, C> {
    pub fn with_copier(copier: P, comparator: C) -> Self {
        Self { copier, comparator }
    }

    pub fn copier(&self) -> &P {
        &self.copier
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Wrap a freshly loaded or created root.
    pub fn create<R>(&self, root: R) -> AggregateResult<Aggregate<R, C>>
    where
        R: Versioned + Inspect,
        P: DeepCopier<R>,
        C: DeepComparator + Clone,
    {
        Aggregate::new(root, &self.copier, self.comparator.clone())
    }
}
