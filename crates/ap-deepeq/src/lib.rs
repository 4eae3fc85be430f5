//! Deep structural equality for object graphs.
//!
//! Answers "are these two graphs equivalent in value?" for graphs that may
//! contain cycles, shared references, unordered containers, rounding-noisy
//! numbers and types whose own `PartialEq` is not the equality wanted.
//! Values take part by implementing [`Inspect`], which lowers them into an
//! arena the engine walks with an explicit work list.
//!
//! # Key Types
//!
//! - [`DeepEquals`] -- The comparison engine (`is_deep_equal`, `changed_fields`)
//! - [`DeepEqualsOptions`] / [`DeepEqualsConfig`] -- Custom equality, ignored fields, comparators, tolerances
//! - [`Inspect`] / [`GraphBuilder`] / [`RecordBuilder`] -- Describing a type's compared structure
//! - [`TypePolicy`] / [`TypeRegistry`] -- Per-type facts cached for the process

pub mod engine;
pub mod error;
pub mod graph;
mod hash;
pub mod inspect;
pub mod numeric;
pub mod options;
mod pair;
pub mod policy;
mod worklist;

pub use engine::DeepEquals;
pub use error::{DeepEqResult, DeepEqualsError};
pub use graph::{ContainerKind, GraphBuilder, NodeId, RecordBuilder, Scalar};
pub use inspect::Inspect;
pub use numeric::nearly_equal;
pub use options::{
    Comparator, DeepEqualsConfig, DeepEqualsOptions, DEFAULT_DECIMAL_EPSILON,
    DEFAULT_DOUBLE_EPSILON, DEFAULT_FLOAT_EPSILON,
};
pub use policy::{short_type_name, TypePolicy, TypeRegistry};
