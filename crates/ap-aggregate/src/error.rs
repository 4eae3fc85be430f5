//! Error types for aggregate change tracking.

use std::fmt;

use ap_deepeq::DeepEqualsError;

/// Which copy of the aggregate a collection was selected from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionSide {
    /// The live root.
    Current,
    /// The snapshot taken when the aggregate was created.
    Snapshot,
}

impl fmt::Display for CollectionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionSide::Current => f.write_str("current"),
            CollectionSide::Snapshot => f.write_str("snapshot"),
        }
    }
}

/// Errors that can occur while tracking changes to an aggregate.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The copier could not produce a snapshot of the root.
    #[error("snapshot failed: {0}")]
    Snapshot(String),

    /// Deep comparison of root or entities failed.
    #[error("comparison failed: {0}")]
    Compare(#[from] DeepEqualsError),

    /// An identity found during delta computation had no entity behind it.
    #[error("entity {id} not found in {side} collection")]
    EntityNotFound {
        /// Debug rendering of the identity.
        id: String,
        /// The collection searched.
        side: CollectionSide,
    },

    /// Two entities of one collection share an identity.
    #[error("duplicate identity {id} in {side} collection")]
    DuplicateIdentity {
        /// Debug rendering of the identity.
        id: String,
        /// The collection holding the duplicates.
        side: CollectionSide,
    },
}

/// Convenience alias for aggregate results.
pub type AggregateResult<T> = Result<T, AggregateError>;
