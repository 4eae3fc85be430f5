//! The deep comparison engine.

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::{DeepEqResult, DeepEqualsError};
use crate::graph::{Graph, GraphBuilder, NodeId, NodeKind, Record, Scalar};
use crate::hash::deep_hash;
use crate::inspect::Inspect;
use crate::numeric::nearly_equal;
use crate::options::DeepEqualsOptions;
use crate::pair::{DualNode, NodePair, PairClass};
use crate::worklist::WorkList;

/// Compares object graphs by value.
///
/// Two graphs are deep-equal when every reachable value is equal, regardless
/// of where the values live in memory. Containers are compared without regard
/// to element order, floats within a relative tolerance, and cycles are
/// followed at most once per pair of nodes.
///
/// ```
/// use std::collections::HashSet;
/// use ap_deepeq::DeepEquals;
///
/// let engine = DeepEquals::new();
/// let a = vec![3, 1, 2];
/// let b: HashSet<i32> = [1, 2, 3].into_iter().collect();
/// assert!(engine.is_deep_equal(&a, &b).unwrap());
/// assert!(!engine.is_deep_equal(&a, &vec![1, 2]).unwrap());
/// ```
#[derive(Clone, Debug, Default)]
pub struct DeepEquals {
    options: DeepEqualsOptions,
}

impl DeepEquals {
    /// An engine with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DeepEqualsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DeepEqualsOptions {
        &self.options
    }

    /// Returns `true` if `a` and `b` are equivalent in value.
    ///
    /// Differences never produce an error. Errors mean a value could not be
    /// inspected or a comparator was misconfigured.
    pub fn is_deep_equal<A, B>(&self, a: &A, b: &B) -> DeepEqResult<bool>
    where
        A: Inspect + ?Sized,
        B: Inspect + ?Sized,
    {
        if same_reference(a, b) {
            return Ok(true);
        }

        let mut builder = GraphBuilder::new();
        let left = builder.inspect(a)?;
        let right = builder.inspect(b)?;
        let graph = builder.finish();

        let equal = self.compare(&graph, left, right)?;
        debug!(
            left = std::any::type_name::<A>(),
            right = std::any::type_name::<B>(),
            nodes = graph.len(),
            equal,
            "deep comparison finished"
        );
        Ok(equal)
    }

    /// Names of the top-level fields of a record whose values differ.
    ///
    /// Fields ignored by the options are never reported.
    pub fn changed_fields<T: Inspect + ?Sized>(
        &self,
        old: &T,
        current: &T,
    ) -> DeepEqResult<Vec<&'static str>> {
        self.changed_fields_ignoring(old, current, &[])
    }

    /// Like [`changed_fields`](Self::changed_fields), additionally skipping
    /// the fields named in `ignored`.
    pub fn changed_fields_ignoring<T: Inspect + ?Sized>(
        &self,
        old: &T,
        current: &T,
        ignored: &[&str],
    ) -> DeepEqResult<Vec<&'static str>> {
        let mut builder = GraphBuilder::new();
        let left = builder.inspect(old)?;
        let right = builder.inspect(current)?;
        let graph = builder.finish();

        let not_a_record = || DeepEqualsError::NotARecord {
            type_name: std::any::type_name::<T>(),
        };
        let NodeKind::Record(before) = &graph.node(left).kind else {
            return Err(not_a_record());
        };
        let NodeKind::Record(after) = &graph.node(right).kind else {
            return Err(not_a_record());
        };

        let mut changed = Vec::new();
        for ((&name, &a), &b) in before
            .policy
            .fields()
            .iter()
            .zip(&before.fields)
            .zip(&after.fields)
        {
            if ignored.contains(&name) || self.options.is_field_ignored(&before.policy, name) {
                continue;
            }
            if !self.compare(&graph, a, b)? {
                changed.push(name);
            }
        }
        debug!(
            type_name = before.policy.short_name(),
            changed = changed.len(),
            "computed changed fields"
        );
        Ok(changed)
    }

    fn compare(&self, graph: &Graph, left: NodeId, right: NodeId) -> DeepEqResult<bool> {
        let mut active = HashSet::new();
        self.compare_pair(graph, NodePair::resolved(graph, left, right), &mut active)
    }

    /// Walk the graphs from `root`.
    ///
    /// `active` holds the pairs that enclosing comparisons are still
    /// deciding. Reaching one of them again is taken as a provisional match,
    /// which is what bounds nested comparisons on cyclic graphs.
    fn compare_pair(
        &self,
        graph: &Graph,
        root: NodePair,
        active: &mut HashSet<NodePair>,
    ) -> DeepEqResult<bool> {
        let mut work = WorkList::new(root);

        while let Some(pair) = work.pop() {
            if pair != root && active.contains(&pair) {
                continue;
            }
            let dual = DualNode::new(graph, pair);
            let equal = match dual.classify() {
                PairClass::Identical => continue,
                PairClass::NullMismatch => {
                    trace!(pair = %pair, "null against non-null");
                    false
                }
                PairClass::Incompatible => {
                    trace!(
                        pair = %pair,
                        left = dual.left.type_name,
                        right = dual.right.type_name,
                        "incompatible types"
                    );
                    false
                }
                PairClass::Values => self.compare_values(&dual),
                PairClass::Containers => self.compare_containers(graph, &dual, &mut work, active)?,
                PairClass::Records => self.compare_records(graph, &dual, &mut work)?,
            };
            if !equal {
                return Ok(false);
            }
        }
        trace!(pairs = work.visited_count(), "graphs matched");
        Ok(true)
    }

    /// Compare a colliding candidate eagerly, unless an enclosing comparison
    /// is already deciding the same pair.
    fn compare_nested(
        &self,
        graph: &Graph,
        left: NodeId,
        right: NodeId,
        active: &mut HashSet<NodePair>,
    ) -> DeepEqResult<bool> {
        let pair = NodePair::resolved(graph, left, right);
        if !active.insert(pair) {
            return Ok(true);
        }
        let equal = self.compare_pair(graph, pair, active);
        active.remove(&pair);
        equal
    }

    fn compare_values(&self, dual: &DualNode<'_>) -> bool {
        let (NodeKind::Value(a), NodeKind::Value(b)) = (&dual.left.kind, &dual.right.kind) else {
            return false;
        };
        let equal = match (a, b) {
            (Scalar::F64(a), Scalar::F64(b)) => nearly_equal(*a, *b, self.options.double_epsilon()),
            (Scalar::F32(a), Scalar::F32(b)) => {
                nearly_equal(f64::from(*a), f64::from(*b), self.options.float_epsilon())
            }
            (a, b) => a == b,
        };
        if !equal {
            trace!(pair = %dual.pair, left = ?a, right = ?b, "values differ");
        }
        equal
    }

    fn compare_containers(
        &self,
        graph: &Graph,
        dual: &DualNode<'_>,
        work: &mut WorkList,
        active: &mut HashSet<NodePair>,
    ) -> DeepEqResult<bool> {
        if !dual.same_container_size() {
            trace!(
                pair = %dual.pair,
                left = ?dual.left.container_len(),
                right = ?dual.right.container_len(),
                "container sizes differ"
            );
            return Ok(false);
        }
        let entered = active.insert(dual.pair);
        let equal = match (&dual.left.kind, &dual.right.kind) {
            (NodeKind::Sequence { items: a, .. }, NodeKind::Sequence { items: b, .. }) => {
                self.compare_unordered(graph, a, b, work, active)
            }
            (NodeKind::Map(a), NodeKind::Map(b)) => {
                self.compare_unordered_map(graph, a, b, work, active)
            }
            _ => Ok(false),
        };
        if entered {
            active.remove(&dual.pair);
        }
        equal
    }

    /// Match every element of `a` against the elements of `b` bucketed by
    /// deep hash. A bucket holding one candidate is queued for comparison; a
    /// bucket with colliding candidates is searched eagerly and the matched
    /// candidate consumed.
    fn compare_unordered(
        &self,
        graph: &Graph,
        a: &[NodeId],
        b: &[NodeId],
        work: &mut WorkList,
        active: &mut HashSet<NodePair>,
    ) -> DeepEqResult<bool> {
        let mut buckets: HashMap<u64, Vec<NodeId>> = HashMap::new();
        for &item in b {
            buckets
                .entry(deep_hash(graph, item, &self.options))
                .or_default()
                .push(item);
        }

        for &item in a {
            let hash = deep_hash(graph, item, &self.options);
            let Some(candidates) = buckets.get_mut(&hash).filter(|c| !c.is_empty()) else {
                trace!(item = %item, hash, "no element with matching hash");
                return Ok(false);
            };
            if candidates.len() == 1 {
                let other = candidates[0];
                buckets.remove(&hash);
                work.push(NodePair::resolved(graph, item, other));
                continue;
            }

            let mut matched = None;
            for (index, &candidate) in candidates.iter().enumerate() {
                if self.compare_nested(graph, item, candidate, active)? {
                    matched = Some(index);
                    break;
                }
            }
            match matched {
                Some(index) => {
                    candidates.remove(index);
                }
                None => {
                    trace!(item = %item, hash, "no colliding element matched");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn compare_unordered_map(
        &self,
        graph: &Graph,
        a: &[(NodeId, NodeId)],
        b: &[(NodeId, NodeId)],
        work: &mut WorkList,
        active: &mut HashSet<NodePair>,
    ) -> DeepEqResult<bool> {
        let mut buckets: HashMap<u64, Vec<(NodeId, NodeId)>> = HashMap::new();
        for &entry in b {
            buckets
                .entry(deep_hash(graph, entry.0, &self.options))
                .or_default()
                .push(entry);
        }

        for &(key, value) in a {
            let hash = deep_hash(graph, key, &self.options);
            let Some(candidates) = buckets.get_mut(&hash).filter(|c| !c.is_empty()) else {
                trace!(key = %key, hash, "no key with matching hash");
                return Ok(false);
            };
            if candidates.len() == 1 {
                let (other_key, other_value) = candidates[0];
                buckets.remove(&hash);
                work.push(NodePair::resolved(graph, key, other_key));
                work.push(NodePair::resolved(graph, value, other_value));
                continue;
            }

            let mut matched = None;
            for (index, &(other_key, other_value)) in candidates.iter().enumerate() {
                if self.compare_nested(graph, key, other_key, active)?
                    && self.compare_nested(graph, value, other_value, active)?
                {
                    matched = Some(index);
                    break;
                }
            }
            match matched {
                Some(index) => {
                    candidates.remove(index);
                }
                None => {
                    trace!(key = %key, hash, "no colliding entry matched");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn compare_records(
        &self,
        graph: &Graph,
        dual: &DualNode<'_>,
        work: &mut WorkList,
    ) -> DeepEqResult<bool> {
        let (NodeKind::Record(left), NodeKind::Record(right)) = (&dual.left.kind, &dual.right.kind)
        else {
            return Ok(false);
        };

        if self.options.uses_custom_equality(&left.policy) {
            if let Some(equal) = custom_equality(left, right) {
                if !equal {
                    trace!(pair = %dual.pair, type_name = left.policy.short_name(), "custom equality failed");
                }
                return Ok(equal);
            }
        }

        if let Some(compare) = self.options.comparator(dual.left.type_id) {
            let type_name = dual.left.type_name;
            let (Some(a), Some(b)) = (&left.captured, &right.captured) else {
                return Err(DeepEqualsError::ComparatorUnsupported { type_name });
            };
            let ordering = compare(a.value(), b.value())
                .ok_or(DeepEqualsError::ComparatorRejected { type_name })?;
            if ordering != Ordering::Equal {
                trace!(pair = %dual.pair, type_name, ?ordering, "comparator reported difference");
            }
            return Ok(ordering == Ordering::Equal);
        }

        let policy = &left.policy;
        for ((name, &a), &b) in policy.fields().iter().zip(&left.fields).zip(&right.fields) {
            if self.options.is_field_ignored(policy, name) {
                continue;
            }
            work.push(NodePair::resolved(graph, a, b));
        }
        Ok(true)
    }
}

fn custom_equality(left: &Record, right: &Record) -> Option<bool> {
    let (a, b) = (left.captured.as_ref()?, right.captured.as_ref()?);
    a.custom_eq(b)
}

/// Same address, same size and same type: the caller passed one value twice.
fn same_reference<A, B>(a: &A, b: &B) -> bool
where
    A: ?Sized + 'static,
    B: ?Sized + 'static,
{
    TypeId::of::<A>() == TypeId::of::<B>()
        && std::ptr::addr_eq(a, b)
        && std::mem::size_of_val(a) == std::mem::size_of_val(b)
}
