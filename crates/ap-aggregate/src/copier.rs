//! Snapshot copiers.
//!
//! A copier produces an independent deep copy of an aggregate root. The
//! copy must share no mutable state with the original, otherwise changes to
//! the root would leak into the snapshot and go undetected.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AggregateError, AggregateResult};

/// Produces a deep copy of a root.
pub trait DeepCopier<R> {
    fn copy(&self, root: &R) -> AggregateResult<R>;
}

impl<R, F> DeepCopier<R> for F
where
    F: Fn(&R) -> R,
{
    fn copy(&self, root: &R) -> AggregateResult<R> {
        Ok(self(root))
    }
}

/// Copies by round-tripping through `bincode`.
///
/// Shared pointers are serialized by value, so the copy never shares
/// allocations with the original.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCopier;

impl<R: Serialize + DeserializeOwned> DeepCopier<R> for BincodeCopier {
    fn copy(&self, root: &R) -> AggregateResult<R> {
        let bytes = bincode::serialize(root).map_err(|e| AggregateError::Snapshot(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| AggregateError::Snapshot(e.to_string()))
    }
}

/// Copies by round-tripping through a JSON value.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCopier;

impl<R: Serialize + DeserializeOwned> DeepCopier<R> for JsonCopier {
    fn copy(&self, root: &R) -> AggregateResult<R> {
        let value = serde_json::to_value(root).map_err(|e| AggregateError::Snapshot(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| AggregateError::Snapshot(e.to_string()))
    }
}

/// Copies with `Clone`.
///
/// Only a deep copy when the root holds no `Rc`/`Arc` to mutable state.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloneCopier;

impl<R: Clone> DeepCopier<R> for CloneCopier {
    fn copy(&self, root: &R) -> AggregateResult<R> {
        Ok(root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: String,
        lines: Vec<(String, u32)>,
        tags: BTreeMap<String, String>,
    }

    fn order() -> Order {
        Order {
            id: "o-1".into(),
            lines: vec![("apple".into(), 2), ("pear".into(), 1)],
            tags: [("channel".to_string(), "web".to_string())].into_iter().collect(),
        }
    }

    #[test]
    fn bincode_round_trip() {
        let original = order();
        assert_eq!(BincodeCopier.copy(&original).unwrap(), original);
    }

    #[test]
    fn json_round_trip() {
        let original = order();
        assert_eq!(JsonCopier.copy(&original).unwrap(), original);
    }

    #[test]
    fn clone_copier() {
        let original = order();
        assert_eq!(CloneCopier.copy(&original).unwrap(), original);
    }

    #[test]
    fn closure_copier() {
        let copier = |o: &Order| Order {
            id: o.id.clone(),
            lines: o.lines.clone(),
            tags: o.tags.clone(),
        };
        assert_eq!(copier.copy(&order()).unwrap(), order());
    }

    #[test]
    fn serializing_copiers_detach_shared_pointers() {
        let shared = Rc::new(vec![1, 2]);
        let copy = BincodeCopier.copy(&shared).unwrap();
        assert_eq!(copy, shared);
        assert!(!Rc::ptr_eq(&copy, &shared));
    }

    #[test]
    fn json_copier_reports_unrepresentable_values() {
        let root: BTreeMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();
        let err = JsonCopier.copy(&root).unwrap_err();
        assert!(matches!(err, AggregateError::Snapshot(_)));
    }
}
