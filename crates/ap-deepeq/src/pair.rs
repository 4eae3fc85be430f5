//! Classification of a pair of nodes about to be compared.

use std::fmt;

use crate::graph::{Graph, Node, NodeId, NodeKind};

/// A pair of resolved nodes, one from each side of a comparison.
///
/// Equality and hashing are by node identity, which is what makes a pair
/// usable as a visited-set key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodePair {
    pub(crate) left: NodeId,
    pub(crate) right: NodeId,
}

impl NodePair {
    /// Build a pair with both sides resolved through aliases.
    pub(crate) fn resolved(graph: &Graph, left: NodeId, right: NodeId) -> Self {
        Self {
            left: graph.resolve(left),
            right: graph.resolve(right),
        }
    }
}

impl fmt::Display for NodePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.left, self.right)
    }
}

/// What kind of comparison a pair calls for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PairClass {
    /// Both sides are the same node; nothing to compare.
    Identical,
    /// Exactly one side is null.
    NullMismatch,
    /// The sides can never be equal because of their types or shapes.
    Incompatible,
    /// Both sides are scalars.
    Values,
    /// Both sides are containers of compatible flavor.
    Containers,
    /// Both sides are records of the same type.
    Records,
}

/// Both nodes of a pair, with the type and shape checks the engine needs.
pub(crate) struct DualNode<'g> {
    pub(crate) pair: NodePair,
    pub(crate) left: &'g Node,
    pub(crate) right: &'g Node,
}

impl<'g> DualNode<'g> {
    pub(crate) fn new(graph: &'g Graph, pair: NodePair) -> Self {
        Self {
            pair,
            left: graph.node(pair.left),
            right: graph.node(pair.right),
        }
    }

    pub(crate) fn is_identical(&self) -> bool {
        self.pair.left == self.pair.right || (self.left.is_null() && self.right.is_null())
    }

    /// Whether the two sides may be equal at all.
    ///
    /// Nulls never match a non-null. Different types never match unless both
    /// sides are collection-like (sequences or sets) or both are maps, so a
    /// `Vec` may equal a `VecDeque` and a `HashMap` a `BTreeMap`. Arrays only
    /// match their own type.
    pub(crate) fn validate_type(&self) -> bool {
        if self.left.is_null() || self.right.is_null() {
            return false;
        }
        if self.left.type_id == self.right.type_id {
            return true;
        }
        (self.left.is_collection_like() && self.right.is_collection_like())
            || (self.left.is_map_like() && self.right.is_map_like())
    }

    pub(crate) fn is_value_type(&self) -> bool {
        matches!(
            (&self.left.kind, &self.right.kind),
            (NodeKind::Value(_), NodeKind::Value(_))
        )
    }

    pub(crate) fn is_container(&self) -> bool {
        self.left.container_len().is_some() && self.right.container_len().is_some()
    }

    pub(crate) fn same_container_size(&self) -> bool {
        self.left.container_len() == self.right.container_len()
    }

    pub(crate) fn classify(&self) -> PairClass {
        if self.is_identical() {
            return PairClass::Identical;
        }
        if self.left.is_null() != self.right.is_null() {
            return PairClass::NullMismatch;
        }
        if !self.validate_type() {
            return PairClass::Incompatible;
        }
        if self.is_value_type() {
            PairClass::Values
        } else if self.is_container() {
            PairClass::Containers
        } else if matches!(
            (&self.left.kind, &self.right.kind),
            (NodeKind::Record(_), NodeKind::Record(_))
        ) {
            PairClass::Records
        } else {
            PairClass::Incompatible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::Inspect;
    use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

    fn classify<A: Inspect + ?Sized, B: Inspect + ?Sized>(a: &A, b: &B) -> PairClass {
        let mut builder = GraphBuilder::new();
        let left = builder.inspect(a).unwrap();
        let right = builder.inspect(b).unwrap();
        let graph = builder.finish();
        DualNode::new(&graph, NodePair::resolved(&graph, left, right)).classify()
    }

    #[test]
    fn null_against_value_is_a_null_mismatch() {
        assert_eq!(classify(&None::<u8>, &Some(1u8)), PairClass::NullMismatch);
    }

    #[test]
    fn null_against_null_is_identical() {
        assert_eq!(classify(&None::<u8>, &None::<String>), PairClass::Identical);
    }

    #[test]
    fn different_scalar_types_are_incompatible() {
        assert_eq!(classify(&1i32, &1i64), PairClass::Incompatible);
        assert_eq!(classify(&1i32, &2i32), PairClass::Values);
    }

    #[test]
    fn collection_like_types_are_interchangeable() {
        let vec = vec![1u8];
        let deque: VecDeque<u8> = vec.iter().copied().collect();
        let set: HashSet<u8> = vec.iter().copied().collect();
        assert_eq!(classify(&vec, &deque), PairClass::Containers);
        assert_eq!(classify(&vec, &set), PairClass::Containers);
    }

    #[test]
    fn map_types_are_interchangeable() {
        let hash: HashMap<u8, u8> = [(1, 2)].into_iter().collect();
        let tree: BTreeMap<u8, u8> = [(1, 2)].into_iter().collect();
        assert_eq!(classify(&hash, &tree), PairClass::Containers);
    }

    #[test]
    fn arrays_only_match_their_own_type() {
        assert_eq!(classify(&[1u8, 2], &vec![1u8, 2]), PairClass::Incompatible);
        assert_eq!(classify(&[1u8, 2], &[2u8, 1]), PairClass::Containers);
    }

    #[test]
    fn container_size_is_reported() {
        let mut builder = GraphBuilder::new();
        let left = builder.inspect(&vec![1u8, 2]).unwrap();
        let right = builder.inspect(&vec![1u8]).unwrap();
        let graph = builder.finish();
        let dual = DualNode::new(&graph, NodePair::resolved(&graph, left, right));
        assert!(dual.is_container());
        assert!(!dual.same_container_size());
        assert!(!dual.is_value_type());
    }
}
