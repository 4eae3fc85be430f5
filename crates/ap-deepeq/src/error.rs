//! Error types for deep comparison.
//!
//! Two graphs that simply differ never produce an error: they compare as
//! `Ok(false)`. Errors are reserved for failures that make the comparison
//! itself meaningless, such as a value that cannot be inspected or a
//! misconfigured comparator.

/// Errors that can occur while inspecting or comparing object graphs.
#[derive(Debug, thiserror::Error)]
pub enum DeepEqualsError {
    /// A `RefCell` was already mutably borrowed when inspection reached it.
    #[error("cannot inspect {type_name}: value is mutably borrowed")]
    BorrowFailed {
        /// The type held by the cell.
        type_name: &'static str,
    },

    /// A lock guarding an inspected value was poisoned.
    #[error("cannot inspect {type_name}: lock poisoned")]
    LockPoisoned {
        /// The type held by the lock.
        type_name: &'static str,
    },

    /// A record type declared a different field list than the one cached
    /// for it earlier in the process.
    #[error("field layout of {type_name} changed: expected {expected:?}, got {actual:?}")]
    FieldLayoutMismatch {
        /// The record type.
        type_name: &'static str,
        /// The cached field list.
        expected: Vec<&'static str>,
        /// The field list declared by this instance.
        actual: Vec<&'static str>,
    },

    /// `RecordBuilder::flatten` was given a value that does not inspect as
    /// a record.
    #[error("cannot flatten {type_name} into {into}: not a record")]
    FlattenNotRecord {
        /// The flattened type.
        type_name: &'static str,
        /// The record being built.
        into: &'static str,
    },

    /// A field-level operation was requested for a value that is not a
    /// record.
    #[error("{type_name} is not a record")]
    NotARecord {
        /// The inspected type.
        type_name: &'static str,
    },

    /// A comparator is registered for a type whose inspection does not
    /// capture the value, so the comparator has nothing to compare.
    #[error("comparator registered for {type_name}, but its inspection captures no value")]
    ComparatorUnsupported {
        /// The type with the registered comparator.
        type_name: &'static str,
    },

    /// A registered comparator could not accept the values it was given.
    #[error("comparator registered for {type_name} rejected the compared values")]
    ComparatorRejected {
        /// The type with the registered comparator.
        type_name: &'static str,
    },

    /// Comparison options could not be built from configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for deep comparison results.
pub type DeepEqResult<T> = Result<T, DeepEqualsError>;
