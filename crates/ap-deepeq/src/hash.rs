//! Order-independent structural hash used to bucket elements of unordered
//! containers.
//!
//! The hash is only ever a bucketing key inside one comparison. Equal graphs
//! must hash alike; unequal graphs may collide freely, and the engine falls
//! back to full comparison when they do.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::graph::{Graph, NodeId, NodeKind, Record, Scalar};
use crate::options::DeepEqualsOptions;

/// Contribution of an edge back to a node still being hashed.
const BACK_EDGE: u64 = 0x9e37_79b9_7f4a_7c15;

enum Visit {
    Enter(NodeId),
    Exit(NodeId),
}

/// Hash the graph reachable from `root`.
///
/// A node's hash is the `wrapping_add` of its children's hashes, so element
/// order inside containers does not matter. Node hashes are memoized and
/// added once per reference, so a value reached twice through one shared
/// allocation hashes like the same value held twice. An edge back to a node
/// still on the traversal path adds [`BACK_EDGE`] instead.
pub(crate) fn deep_hash(graph: &Graph, root: NodeId, options: &DeepEqualsOptions) -> u64 {
    let root = graph.resolve(root);
    let mut memo: HashMap<NodeId, u64> = HashMap::new();
    let mut on_path = HashSet::new();
    let mut stack = vec![Visit::Enter(root)];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(id) => {
                if memo.contains_key(&id) || !on_path.insert(id) {
                    continue;
                }
                stack.push(Visit::Exit(id));
                stack.extend(children(graph, id, options).into_iter().map(Visit::Enter));
            }
            Visit::Exit(id) => {
                on_path.remove(&id);
                let hash = node_hash(graph, id, options, &memo);
                memo.insert(id, hash);
            }
        }
    }
    memo.get(&root).copied().unwrap_or_default()
}

/// Resolved children of `id` that contribute to its hash.
fn children(graph: &Graph, id: NodeId, options: &DeepEqualsOptions) -> Vec<NodeId> {
    match &graph.node(id).kind {
        NodeKind::Sequence { items, .. } => items.iter().map(|&item| graph.resolve(item)).collect(),
        NodeKind::Map(entries) => entries
            .iter()
            .flat_map(|&(key, value)| [graph.resolve(key), graph.resolve(value)])
            .collect(),
        NodeKind::Record(record) if custom_hash(record).is_none() => record
            .policy
            .fields()
            .iter()
            .zip(&record.fields)
            .filter(|(name, _)| !options.is_field_ignored(&record.policy, name))
            .map(|(_, &field)| graph.resolve(field))
            .collect(),
        _ => Vec::new(),
    }
}

fn node_hash(
    graph: &Graph,
    id: NodeId,
    options: &DeepEqualsOptions,
    memo: &HashMap<NodeId, u64>,
) -> u64 {
    match &graph.node(id).kind {
        NodeKind::Value(scalar) => hash_scalar(scalar),
        NodeKind::Record(record) => match custom_hash(record) {
            Some(custom) => custom,
            None => sum_children(graph, id, options, memo),
        },
        NodeKind::Sequence { .. } | NodeKind::Map(_) => sum_children(graph, id, options, memo),
        NodeKind::Null | NodeKind::Pending | NodeKind::Alias(_) => 0,
    }
}

fn custom_hash(record: &Record) -> Option<u64> {
    record.captured.as_ref().and_then(|c| c.custom_hash())
}

// Children absent from the memo are ancestors still on the path.
fn sum_children(
    graph: &Graph,
    id: NodeId,
    options: &DeepEqualsOptions,
    memo: &HashMap<NodeId, u64>,
) -> u64 {
    children(graph, id, options)
        .iter()
        .map(|child| memo.get(child).copied().unwrap_or(BACK_EDGE))
        .fold(0u64, u64::wrapping_add)
}

fn hash_scalar(scalar: &Scalar) -> u64 {
    let mut hasher = DefaultHasher::new();
    match scalar {
        Scalar::Unit => ().hash(&mut hasher),
        Scalar::Bool(v) => v.hash(&mut hasher),
        Scalar::Char(v) => v.hash(&mut hasher),
        Scalar::Int(v) => v.hash(&mut hasher),
        Scalar::UInt(v) => v.hash(&mut hasher),
        Scalar::F32(v) => hash_float(f64::from(*v), &mut hasher),
        Scalar::F64(v) => hash_float(*v, &mut hasher),
        Scalar::Str(v) => v.hash(&mut hasher),
        Scalar::Date(v) => v.hash(&mut hasher),
        Scalar::Time(v) => v.hash(&mut hasher),
        Scalar::DateTime(v) => v.hash(&mut hasher),
        Scalar::Instant(v) => v.hash(&mut hasher),
        Scalar::Uuid(v) => v.hash(&mut hasher),
        Scalar::Type(v) => v.hash(&mut hasher),
    }
    hasher.finish()
}

// Rounded so values within the float tolerance usually share a bucket.
fn hash_float(value: f64, hasher: &mut DefaultHasher) {
    if value.is_finite() {
        (value.round() as i128).hash(hasher);
    } else {
        value.to_bits().hash(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::{inspect_record, Inspect};
    use rust_decimal::Decimal;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Row {
        id: u32,
        stamp: u64,
    }

    inspect_record!(Row { id, stamp });

    struct Ring {
        value: i32,
        next: RefCell<Option<Rc<Ring>>>,
    }

    inspect_record!(Ring { value, next });

    fn hashes<A: Inspect + ?Sized, B: Inspect + ?Sized>(
        a: &A,
        b: &B,
        options: &DeepEqualsOptions,
    ) -> (u64, u64) {
        let mut builder = GraphBuilder::new();
        let left = builder.inspect(a).unwrap();
        let right = builder.inspect(b).unwrap();
        let graph = builder.finish();
        (
            deep_hash(&graph, left, options),
            deep_hash(&graph, right, options),
        )
    }

    #[test]
    fn element_order_does_not_matter() {
        let (a, b) = hashes(&vec![1, 2, 3], &vec![3, 1, 2], &DeepEqualsOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn different_contents_usually_differ() {
        let (a, b) = hashes(&vec!["x"], &vec!["y"], &DeepEqualsOptions::default());
        assert_ne!(a, b);
    }

    #[test]
    fn floats_are_rounded_before_hashing() {
        let options = DeepEqualsOptions::default();
        let (a, b) = hashes(&10.000_000_1f64, &10.0f64, &options);
        assert_eq!(a, b);
        let (a, b) = hashes(&f64::NAN, &f64::NAN, &options);
        assert_eq!(a, b);
    }

    #[test]
    fn ignored_fields_are_not_hashed() {
        let options = DeepEqualsOptions::default().ignore_fields::<Row>(["stamp"]);
        let (a, b) = hashes(&Row { id: 1, stamp: 1 }, &Row { id: 1, stamp: 2 }, &options);
        assert_eq!(a, b);
    }

    #[test]
    fn custom_hash_is_used_for_decimals() {
        let (a, b) = hashes(
            &Decimal::new(110, 2),
            &Decimal::new(11, 1),
            &DeepEqualsOptions::default(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn cyclic_graph_terminates() {
        let ring = Rc::new(Ring {
            value: 1,
            next: RefCell::new(None),
        });
        *ring.next.borrow_mut() = Some(Rc::clone(&ring));

        let (a, b) = hashes(&ring, &ring, &DeepEqualsOptions::default());
        assert_eq!(a, b);

        ring.next.borrow_mut().take();
    }

    struct Pair {
        left: Rc<String>,
        right: Rc<String>,
    }

    inspect_record!(Pair { left, right });

    #[test]
    fn shared_and_separate_allocations_hash_alike() {
        let shared = Rc::new(String::from("same"));
        let one = Pair {
            left: Rc::clone(&shared),
            right: Rc::clone(&shared),
        };
        let two = Pair {
            left: Rc::new(String::from("same")),
            right: Rc::new(String::from("same")),
        };
        let (a, b) = hashes(&one, &two, &DeepEqualsOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_values_are_counted() {
        let (a, b) = hashes(&vec![1, 1], &vec![1], &DeepEqualsOptions::default());
        assert_ne!(a, b);
    }

    #[test]
    fn equal_rings_built_separately_hash_alike() {
        let ring = |values: [i32; 2]| {
            let first = Rc::new(Ring {
                value: values[0],
                next: RefCell::new(None),
            });
            let second = Rc::new(Ring {
                value: values[1],
                next: RefCell::new(Some(Rc::clone(&first))),
            });
            *first.next.borrow_mut() = Some(Rc::clone(&second));
            first
        };
        let (left, right) = (ring([1, 2]), ring([1, 2]));
        let (a, b) = hashes(&left, &right, &DeepEqualsOptions::default());
        assert_eq!(a, b);

        left.next.borrow_mut().take();
        right.next.borrow_mut().take();
    }
}
