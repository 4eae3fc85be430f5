//! Arena representation of inspected object graphs.
//!
//! Both sides of a comparison are lowered into one [`Graph`]. Every value
//! becomes a node addressed by a [`NodeId`]; composite values refer to their
//! parts by id. Shared allocations (`Rc`, `Arc`) are lowered once and keyed
//! by address, so a cycle in the source graph becomes a back-edge in the
//! arena and two references to the same allocation share one id.
//!
//! The arena is built through [`GraphBuilder`], which [`Inspect`]
//! implementations drive.
//!
//! [`Inspect`]: crate::Inspect

use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::error::{DeepEqResult, DeepEqualsError};
use crate::inspect::Inspect;
use crate::policy::{TypePolicy, TypeRegistry};

/// Index of a node inside a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The node every absent value (`None`, dropped `Weak`) lowers to.
    pub const NULL: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value compared by direct equality rather than field expansion.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Unit,
    Bool(bool),
    Char(char),
    Int(i128),
    UInt(u128),
    F32(f32),
    F64(f64),
    Str(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// A zoned timestamp, normalized to UTC.
    Instant(DateTime<Utc>),
    Uuid(Uuid),
    /// Type metadata.
    Type(TypeId),
}

/// The flavor of a sequence-shaped container.
///
/// All three are compared without regard to element order. The distinction
/// matters for type compatibility: sequences and sets may be compared with
/// each other across concrete types, arrays only with their own type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Fixed-size arrays and slices.
    Array,
    /// Growable ordered collections (`Vec`, `VecDeque`, `LinkedList`).
    Sequence,
    /// Sets (`HashSet`, `BTreeSet`).
    Set,
}

type EqFn = fn(&dyn Any, &dyn Any) -> bool;
type HashFn = fn(&dyn Any) -> u64;

/// A clone of an inspected value kept for custom equality, custom hashing,
/// or registered comparators.
pub(crate) struct Captured {
    value: Box<dyn Any>,
    eq: Option<EqFn>,
    hash: Option<HashFn>,
}

impl Captured {
    pub(crate) fn new(value: Box<dyn Any>, eq: Option<EqFn>, hash: Option<HashFn>) -> Self {
        Self { value, eq, hash }
    }

    fn with_equality<T: PartialEq + Hash + 'static>(value: T) -> Self {
        Self::new(Box::new(value), Some(eq_of::<T>), Some(hash_of::<T>))
    }

    fn value_only<T: 'static>(value: T) -> Self {
        Self::new(Box::new(value), None, None)
    }

    pub(crate) fn value(&self) -> &dyn Any {
        self.value.as_ref()
    }

    pub(crate) fn custom_eq(&self, other: &Captured) -> Option<bool> {
        self.eq.map(|eq| eq(self.value(), other.value()))
    }

    pub(crate) fn custom_hash(&self) -> Option<u64> {
        self.hash.map(|hash| hash(self.value()))
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Captured")
            .field("custom_eq", &self.eq.is_some())
            .field("custom_hash", &self.hash.is_some())
            .finish()
    }
}

fn eq_of<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn hash_of<T: Hash + 'static>(value: &dyn Any) -> u64 {
    value.downcast_ref::<T>().map_or(0, |v| {
        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    })
}

/// A composite value expanded field by field.
#[derive(Debug)]
pub(crate) struct Record {
    pub(crate) policy: Arc<TypePolicy>,
    pub(crate) fields: Vec<NodeId>,
    pub(crate) captured: Option<Captured>,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Null,
    /// A shared allocation whose contents are still being lowered.
    Pending,
    /// A shared allocation, pointing at the node of its contents.
    Alias(NodeId),
    Value(Scalar),
    Sequence {
        kind: ContainerKind,
        items: Vec<NodeId>,
    },
    Map(Vec<(NodeId, NodeId)>),
    Record(Record),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) kind: NodeKind,
}

impl Node {
    fn of<T: ?Sized + 'static>(kind: NodeKind) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind,
        }
    }

    pub(crate) fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    pub(crate) fn is_collection_like(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Sequence {
                kind: ContainerKind::Sequence | ContainerKind::Set,
                ..
            }
        )
    }

    pub(crate) fn is_map_like(&self) -> bool {
        matches!(self.kind, NodeKind::Map(_))
    }

    pub(crate) fn container_len(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::Sequence { items, .. } => Some(items.len()),
            NodeKind::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }
}

/// Marker type for the null node.
struct Null;

/// A finished, immutable arena.
#[derive(Debug)]
pub(crate) struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Follow aliases to the node that holds the actual value.
    pub(crate) fn resolve(&self, id: NodeId) -> NodeId {
        resolve_in(&self.nodes, id)
    }

    /// The resolved node for `id`.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[self.resolve(id).index()]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn resolve_in(nodes: &[Node], id: NodeId) -> NodeId {
    let mut current = id;
    // Alias chains are acyclic once lowering finishes; the bound only
    // guards against a malformed arena.
    for _ in 0..nodes.len() {
        match nodes[current.index()].kind {
            NodeKind::Alias(next) => current = next,
            _ => return current,
        }
    }
    current
}

/// Builds a [`Graph`] from inspected values.
pub struct GraphBuilder {
    nodes: Vec<Node>,
    shared: HashMap<(usize, TypeId), NodeId>,
    registry: &'static TypeRegistry,
}

impl GraphBuilder {
    /// Create a builder backed by the global type registry.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::of::<Null>(NodeKind::Null)],
            shared: HashMap::new(),
            registry: TypeRegistry::global(),
        }
    }

    /// Lower `value` and return its node.
    pub fn inspect<T: Inspect + ?Sized>(&mut self, value: &T) -> DeepEqResult<NodeId> {
        value.inspect(self)
    }

    /// The node for an absent value.
    pub fn null(&self) -> NodeId {
        NodeId::NULL
    }

    /// Add a value-type node of type `T`.
    pub fn value<T: ?Sized + 'static>(&mut self, scalar: Scalar) -> NodeId {
        self.push(Node::of::<T>(NodeKind::Value(scalar)))
    }

    /// Add a sequence-shaped container of type `C`.
    pub fn sequence<'v, C, E, I>(&mut self, kind: ContainerKind, items: I) -> DeepEqResult<NodeId>
    where
        C: ?Sized + 'static,
        E: Inspect + ?Sized + 'v,
        I: IntoIterator<Item = &'v E>,
    {
        let items = items
            .into_iter()
            .map(|item| item.inspect(self))
            .collect::<DeepEqResult<Vec<_>>>()?;
        Ok(self.push(Node::of::<C>(NodeKind::Sequence { kind, items })))
    }

    /// Add a key-value container of type `C`.
    pub fn map<'v, C, K, V, I>(&mut self, entries: I) -> DeepEqResult<NodeId>
    where
        C: ?Sized + 'static,
        K: Inspect + ?Sized + 'v,
        V: Inspect + ?Sized + 'v,
        I: IntoIterator<Item = (&'v K, &'v V)>,
    {
        let mut lowered = Vec::new();
        for (key, value) in entries {
            let key = key.inspect(self)?;
            let value = value.inspect(self)?;
            lowered.push((key, value));
        }
        Ok(self.push(Node::of::<C>(NodeKind::Map(lowered))))
    }

    /// Start a record node of type `T`.
    pub fn record<T: ?Sized + 'static>(&mut self) -> RecordBuilder<'_> {
        RecordBuilder {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            names: Vec::new(),
            fields: Vec::new(),
            captured: None,
            graph: self,
        }
    }

    /// Lower the contents of a shared allocation at most once.
    ///
    /// The first visit reserves a node for `ptr` before lowering the
    /// contents, so references back to the same allocation found while
    /// lowering resolve to the reserved node.
    pub fn shared<T: ?Sized + 'static>(
        &mut self,
        ptr: *const T,
        contents: impl FnOnce(&mut Self) -> DeepEqResult<NodeId>,
    ) -> DeepEqResult<NodeId> {
        let key = (ptr as *const () as usize, TypeId::of::<T>());
        if let Some(&id) = self.shared.get(&key) {
            return Ok(id);
        }
        let slot = self.push(Node::of::<T>(NodeKind::Pending));
        self.shared.insert(key, slot);

        let inner = contents(self)?;
        let kind = if resolve_in(&self.nodes, inner) == slot {
            // Nothing but pointers between the allocation and itself.
            NodeKind::Null
        } else {
            NodeKind::Alias(inner)
        };
        self.nodes[slot.index()].kind = kind;
        Ok(slot)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn resolve(&self, id: NodeId) -> NodeId {
        resolve_in(&self.nodes, id)
    }

    pub(crate) fn finish(self) -> Graph {
        Graph { nodes: self.nodes }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("node_count", &self.nodes.len())
            .field("shared_count", &self.shared.len())
            .finish()
    }
}

/// Declares the fields of one record node.
///
/// Obtained from [`GraphBuilder::record`]. Fields are compared in the order
/// they are declared; values that are not declared are never compared.
pub struct RecordBuilder<'g> {
    graph: &'g mut GraphBuilder,
    type_id: TypeId,
    type_name: &'static str,
    names: Vec<&'static str>,
    fields: Vec<NodeId>,
    captured: Option<Captured>,
}

impl<'g> RecordBuilder<'g> {
    /// Declare a field.
    pub fn field<F: Inspect + ?Sized>(mut self, name: &'static str, value: &F) -> DeepEqResult<Self> {
        let id = value.inspect(self.graph)?;
        self.names.push(name);
        self.fields.push(id);
        Ok(self)
    }

    /// Merge all fields of an embedded base record into this record.
    pub fn flatten<F: Inspect + ?Sized>(mut self, base: &F) -> DeepEqResult<Self> {
        let id = base.inspect(self.graph)?;
        let resolved = self.graph.resolve(id);
        match &self.graph.nodes[resolved.index()].kind {
            NodeKind::Record(record) => {
                self.names.extend_from_slice(record.policy.fields());
                self.fields.extend_from_slice(&record.fields);
                Ok(self)
            }
            _ => Err(DeepEqualsError::FlattenNotRecord {
                type_name: std::any::type_name::<F>(),
                into: self.type_name,
            }),
        }
    }

    /// Keep a clone of the value so the type's own `PartialEq` and `Hash`
    /// can be used when the comparison options allow it.
    pub fn custom_equality<T: PartialEq + Hash + Clone + 'static>(mut self, value: &T) -> Self {
        self.captured = Some(Captured::with_equality(value.clone()));
        self
    }

    /// Keep a clone of the value for registered comparators.
    pub fn capture<T: Clone + 'static>(mut self, value: &T) -> Self {
        self.captured = Some(Captured::value_only(value.clone()));
        self
    }

    pub(crate) fn captured(mut self, captured: Captured) -> Self {
        self.captured = Some(captured);
        self
    }

    /// Finish the record and return its node.
    pub fn finish(self) -> DeepEqResult<NodeId> {
        let custom_equality = self.captured.as_ref().is_some_and(|c| c.eq.is_some());
        let custom_hash = self.captured.as_ref().is_some_and(|c| c.hash.is_some());
        let policy = self.graph.registry.get_or_insert_with(self.type_id, || {
            TypePolicy::new(
                self.type_id,
                self.type_name,
                self.names.clone(),
                custom_equality,
                custom_hash,
            )
        });
        if policy.fields() != self.names.as_slice() {
            return Err(DeepEqualsError::FieldLayoutMismatch {
                type_name: self.type_name,
                expected: policy.fields().to_vec(),
                actual: self.names,
            });
        }

        let node = Node {
            type_id: self.type_id,
            type_name: self.type_name,
            kind: NodeKind::Record(Record {
                policy,
                fields: self.fields,
                captured: self.captured,
            }),
        };
        Ok(self.graph.push(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Link {
        label: String,
        next: RefCell<Option<Rc<Link>>>,
    }

    impl Inspect for Link {
        fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
            graph
                .record::<Self>()
                .field("label", &self.label)?
                .field("next", &self.next)?
                .finish()
        }
    }

    struct Base {
        id: u32,
    }

    struct Derived {
        base: Base,
        name: String,
    }

    impl Inspect for Base {
        fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
            graph.record::<Self>().field("id", &self.id)?.finish()
        }
    }

    impl Inspect for Derived {
        fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
            graph
                .record::<Self>()
                .flatten(&self.base)?
                .field("name", &self.name)?
                .finish()
        }
    }

    #[test]
    fn none_lowers_to_the_shared_null_node() {
        let mut builder = GraphBuilder::new();
        let a = builder.inspect(&Option::<u8>::None).unwrap();
        let b = builder.inspect(&Option::<String>::None).unwrap();
        assert_eq!(a, NodeId::NULL);
        assert_eq!(b, NodeId::NULL);
    }

    #[test]
    fn shared_allocation_is_lowered_once() {
        let shared = Rc::new(String::from("x"));
        let pair = (Rc::clone(&shared), Rc::clone(&shared));
        let mut builder = GraphBuilder::new();
        let first = builder.inspect(&pair.0).unwrap();
        let second = builder.inspect(&pair.1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cycle_becomes_back_edge() {
        let node = Rc::new(Link {
            label: "a".into(),
            next: RefCell::new(None),
        });
        *node.next.borrow_mut() = Some(Rc::clone(&node));

        let mut builder = GraphBuilder::new();
        let root = builder.inspect(&node).unwrap();
        let graph = builder.finish();

        let NodeKind::Record(record) = &graph.node(root).kind else {
            panic!("expected record");
        };
        assert_eq!(graph.resolve(record.fields[1]), graph.resolve(root));

        // Break the cycle so the test does not leak.
        node.next.borrow_mut().take();
    }

    #[test]
    fn flatten_merges_base_fields() {
        let value = Derived {
            base: Base { id: 7 },
            name: "n".into(),
        };
        let mut builder = GraphBuilder::new();
        let root = builder.inspect(&value).unwrap();
        let graph = builder.finish();

        let NodeKind::Record(record) = &graph.node(root).kind else {
            panic!("expected record");
        };
        assert_eq!(record.policy.fields(), &["id", "name"]);
        assert_eq!(record.fields.len(), 2);
    }

    #[test]
    fn flatten_rejects_non_record() {
        let mut builder = GraphBuilder::new();
        let err = builder
            .record::<Derived>()
            .flatten(&5u32)
            .err()
            .unwrap();
        assert!(matches!(err, DeepEqualsError::FlattenNotRecord { .. }));
    }

    #[test]
    fn changed_field_layout_is_rejected() {
        struct Shifty;
        let mut builder = GraphBuilder::new();
        builder
            .record::<Shifty>()
            .field("a", &1u8)
            .unwrap()
            .finish()
            .unwrap();
        let err = builder
            .record::<Shifty>()
            .field("b", &1u8)
            .unwrap()
            .finish()
            .unwrap_err();
        assert!(matches!(err, DeepEqualsError::FieldLayoutMismatch { .. }));
    }

    #[test]
    fn container_len_reports_items() {
        let mut builder = GraphBuilder::new();
        let id = builder.inspect(&vec![1, 2, 3]).unwrap();
        let graph = builder.finish();
        assert_eq!(graph.node(id).container_len(), Some(3));
        assert!(graph.node(id).is_collection_like());
    }
}
