//! Aggregate change tracking on top of deep equality.
//!
//! An [`Aggregate`] pairs a live root with a snapshot taken when it was
//! loaded. Before saving, a repository asks whether the root is new,
//! whether it changed, and which child entities must be inserted, updated
//! or deleted. Nothing here performs writes.
//!
//! # Key Types
//!
//! - [`Aggregate`] -- Root plus snapshot (`is_new`, `is_changed`, `find_collection_delta`)
//! - [`AggregateFactory`] -- Creates aggregates with a shared copier and comparator
//! - [`CollectionDelta`] / [`DeltaType`] / [`ChangedEntity`] -- Results of comparing a child collection
//! - [`DeepCopier`] -- Snapshot strategy (`BincodeCopier`, `JsonCopier`, `CloneCopier`, closures)
//! - [`Versioned`] -- Persistence version of a root
//!
//! # Example
//!
//! ```
//! use ap_aggregate::{AggregateFactory, Versioned};
//! use ap_deepeq::inspect_record;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Line { sku: String, qty: u32 }
//! inspect_record!(Line { sku, qty });
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Order { lines: Vec<Line>, version: i64 }
//! inspect_record!(Order { lines, version });
//!
//! impl Versioned for Order {
//!     fn version(&self) -> i64 { self.version }
//! }
//!
//! let order = Order {
//!     lines: vec![Line { sku: "a".into(), qty: 1 }],
//!     version: 1,
//! };
//! let mut agg = AggregateFactory::new().create(order)?;
//! agg.root_mut().lines[0].qty = 2;
//! agg.root_mut().lines.push(Line { sku: "b".into(), qty: 1 });
//!
//! let delta = agg.find_collection_delta(|o| &o.lines, |l: &Line| l.sku.clone())?;
//! assert_eq!(delta.new.len(), 1);
//! assert_eq!(delta.updated.len(), 1);
//! assert!(delta.removed.is_empty());
//! # Ok::<(), ap_aggregate::AggregateError>(())
//! ```

pub mod aggregate;
pub mod comparator;
pub mod copier;
pub mod delta;
pub mod error;
pub mod factory;
pub mod versioned;

pub use aggregate::Aggregate;
pub use comparator::DeepComparator;
pub use copier::{BincodeCopier, CloneCopier, DeepCopier, JsonCopier};
pub use delta::{ChangedEntity, CollectionDelta, DeltaType};
pub use error::{AggregateError, AggregateResult, CollectionSide};
pub use factory::AggregateFactory;
pub use versioned::{Versioned, NEW_VERSION};
