//! The [`Inspect`] trait and its implementations for standard types.
//!
//! Implementing `Inspect` is how a type takes part in deep comparison: it
//! lowers itself into a [`GraphBuilder`] as a scalar, a container, or a
//! record with named fields. Most record types use [`inspect_record!`].
//!
//! [`inspect_record!`]: crate::inspect_record

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::{Hash, Hasher};
use std::rc::{self, Rc};
use std::sync::{self, Arc, Mutex, RwLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DeepEqResult, DeepEqualsError};
use crate::graph::{Captured, ContainerKind, GraphBuilder, NodeId, Scalar};

/// A value that can be lowered into an object graph for deep comparison.
///
/// # Example
///
/// ```
/// use ap_deepeq::{DeepEqResult, GraphBuilder, Inspect, NodeId};
///
/// struct Point {
///     x: i32,
///     y: i32,
///     // Not declared, so never compared.
///     cached_len: f64,
/// }
///
/// impl Inspect for Point {
///     fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
///         graph
///             .record::<Self>()
///             .field("x", &self.x)?
///             .field("y", &self.y)?
///             .finish()
///     }
/// }
/// ```
///
/// The field list of a record type is fixed the first time it is seen, so
/// an enum whose variants carry different fields must not use
/// `record::<Self>()` for all of them. Give each variant its own marker
/// type instead; values of different variants then never compare equal.
///
/// ```
/// use ap_deepeq::{DeepEqResult, DeepEquals, GraphBuilder, Inspect, NodeId};
///
/// enum Payment {
///     Card { last4: String },
///     Transfer { iban: String, reference: String },
/// }
///
/// struct CardFields;
/// struct TransferFields;
///
/// impl Inspect for Payment {
///     fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
///         match self {
///             Payment::Card { last4 } => graph
///                 .record::<CardFields>()
///                 .field("last4", last4)?
///                 .finish(),
///             Payment::Transfer { iban, reference } => graph
///                 .record::<TransferFields>()
///                 .field("iban", iban)?
///                 .field("reference", reference)?
///                 .finish(),
///         }
///     }
/// }
///
/// let card = Payment::Card { last4: "4242".into() };
/// let transfer = Payment::Transfer { iban: "DE89".into(), reference: "r".into() };
/// assert!(!DeepEquals::new().is_deep_equal(&card, &transfer).unwrap());
/// ```
pub trait Inspect: 'static {
    /// Lower `self` into `graph` and return the node that represents it.
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId>;
}

/// Implement [`Inspect`] for a struct by declaring its compared fields.
///
/// ```
/// use ap_deepeq::{inspect_record, DeepEquals};
///
/// struct Account {
///     id: u64,
///     owner: String,
///     balance_cents: i64,
/// }
///
/// inspect_record!(Account { id, owner, balance_cents });
///
/// let a = Account { id: 1, owner: "ann".into(), balance_cents: 10 };
/// let b = Account { id: 1, owner: "ann".into(), balance_cents: 10 };
/// assert!(DeepEquals::new().is_deep_equal(&a, &b).unwrap());
/// ```
#[macro_export]
macro_rules! inspect_record {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Inspect for $ty {
            fn inspect(
                &self,
                graph: &mut $crate::GraphBuilder,
            ) -> $crate::DeepEqResult<$crate::NodeId> {
                graph
                    .record::<Self>()
                    $(.field(stringify!($field), &self.$field)?)*
                    .finish()
            }
        }
    };
}

macro_rules! inspect_scalar {
    ($($ty:ty => |$v:ident| $scalar:expr),* $(,)?) => {
        $(
            impl Inspect for $ty {
                fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
                    let $v = self;
                    Ok(graph.value::<Self>($scalar))
                }
            }
        )*
    };
}

inspect_scalar! {
    () => |_v| Scalar::Unit,
    bool => |v| Scalar::Bool(*v),
    char => |v| Scalar::Char(*v),
    i8 => |v| Scalar::Int(i128::from(*v)),
    i16 => |v| Scalar::Int(i128::from(*v)),
    i32 => |v| Scalar::Int(i128::from(*v)),
    i64 => |v| Scalar::Int(i128::from(*v)),
    i128 => |v| Scalar::Int(*v),
    isize => |v| Scalar::Int(*v as i128),
    u8 => |v| Scalar::UInt(u128::from(*v)),
    u16 => |v| Scalar::UInt(u128::from(*v)),
    u32 => |v| Scalar::UInt(u128::from(*v)),
    u64 => |v| Scalar::UInt(u128::from(*v)),
    u128 => |v| Scalar::UInt(*v),
    usize => |v| Scalar::UInt(*v as u128),
    f32 => |v| Scalar::F32(*v),
    f64 => |v| Scalar::F64(*v),
    TypeId => |v| Scalar::Type(*v),
    NaiveDate => |v| Scalar::Date(*v),
    NaiveTime => |v| Scalar::Time(*v),
    NaiveDateTime => |v| Scalar::DateTime(*v),
    Uuid => |v| Scalar::Uuid(*v),
}

// All string flavors share the type identity of `String`.
impl Inspect for String {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        Ok(graph.value::<String>(Scalar::Str(self.clone())))
    }
}

impl Inspect for str {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        Ok(graph.value::<String>(Scalar::Str(self.to_owned())))
    }
}

impl Inspect for Cow<'static, str> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        Ok(graph.value::<String>(Scalar::Str(self.as_ref().to_owned())))
    }
}

impl<Tz> Inspect for DateTime<Tz>
where
    Tz: TimeZone + 'static,
{
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        Ok(graph.value::<Self>(Scalar::Instant(self.with_timezone(&Utc))))
    }
}

impl Inspect for Decimal {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph
            .record::<Self>()
            .field("mantissa", &self.mantissa())?
            .field("scale", &self.scale())?
            .captured(Captured::new(
                Box::new(*self),
                Some(decimal_eq),
                Some(decimal_hash),
            ))
            .finish()
    }
}

fn decimal_eq(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<Decimal>(), b.downcast_ref::<Decimal>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

// Rounded so values within the comparison tolerance usually share a bucket.
fn decimal_hash(value: &dyn Any) -> u64 {
    value.downcast_ref::<Decimal>().map_or(0, |d| {
        let mut hasher = DefaultHasher::new();
        d.round().normalize().hash(&mut hasher);
        hasher.finish()
    })
}

impl<T: Inspect> Inspect for Option<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        match self {
            Some(value) => value.inspect(graph),
            None => Ok(graph.null()),
        }
    }
}

impl<T: Inspect + ?Sized> Inspect for &'static T {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        (**self).inspect(graph)
    }
}

impl<T: Inspect + ?Sized> Inspect for Box<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        (**self).inspect(graph)
    }
}

impl<T: Inspect + ?Sized> Inspect for Rc<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.shared(Rc::as_ptr(self), |graph| (**self).inspect(graph))
    }
}

impl<T: Inspect + ?Sized> Inspect for Arc<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.shared(Arc::as_ptr(self), |graph| (**self).inspect(graph))
    }
}

impl<T: Inspect + ?Sized> Inspect for rc::Weak<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        match self.upgrade() {
            Some(strong) => strong.inspect(graph),
            None => Ok(graph.null()),
        }
    }
}

impl<T: Inspect + ?Sized> Inspect for sync::Weak<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        match self.upgrade() {
            Some(strong) => strong.inspect(graph),
            None => Ok(graph.null()),
        }
    }
}

impl<T: Inspect + ?Sized> Inspect for RefCell<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        let value = self
            .try_borrow()
            .map_err(|_| DeepEqualsError::BorrowFailed {
                type_name: std::any::type_name::<T>(),
            })?;
        value.inspect(graph)
    }
}

impl<T: Inspect + Copy> Inspect for Cell<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        self.get().inspect(graph)
    }
}

impl<T: Inspect + ?Sized> Inspect for Mutex<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        let value = self.lock().map_err(|_| DeepEqualsError::LockPoisoned {
            type_name: std::any::type_name::<T>(),
        })?;
        value.inspect(graph)
    }
}

impl<T: Inspect + ?Sized> Inspect for RwLock<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        let value = self.read().map_err(|_| DeepEqualsError::LockPoisoned {
            type_name: std::any::type_name::<T>(),
        })?;
        value.inspect(graph)
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.sequence::<Self, T, _>(ContainerKind::Sequence, self)
    }
}

impl<T: Inspect> Inspect for VecDeque<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.sequence::<Self, T, _>(ContainerKind::Sequence, self)
    }
}

impl<T: Inspect> Inspect for LinkedList<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.sequence::<Self, T, _>(ContainerKind::Sequence, self)
    }
}

impl<T: Inspect, const N: usize> Inspect for [T; N] {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.sequence::<Self, T, _>(ContainerKind::Array, self)
    }
}

impl<T: Inspect> Inspect for [T] {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.sequence::<Self, T, _>(ContainerKind::Array, self)
    }
}

impl<T: Inspect, S: 'static> Inspect for HashSet<T, S> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.sequence::<Self, T, _>(ContainerKind::Set, self)
    }
}

impl<T: Inspect> Inspect for BTreeSet<T> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.sequence::<Self, T, _>(ContainerKind::Set, self)
    }
}

impl<K: Inspect, V: Inspect, S: 'static> Inspect for HashMap<K, V, S> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.map::<Self, K, V, _>(self)
    }
}

impl<K: Inspect, V: Inspect> Inspect for BTreeMap<K, V> {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        graph.map::<Self, K, V, _>(self)
    }
}

impl Inspect for serde_json::Value {
    fn inspect(&self, graph: &mut GraphBuilder) -> DeepEqResult<NodeId> {
        use serde_json::Value;

        match self {
            Value::Null => Ok(graph.null()),
            Value::Bool(b) => b.inspect(graph),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.inspect(graph)
                } else if let Some(u) = n.as_u64() {
                    u.inspect(graph)
                } else {
                    n.as_f64().unwrap_or(f64::NAN).inspect(graph)
                }
            }
            Value::String(s) => s.inspect(graph),
            Value::Array(items) => {
                graph.sequence::<Vec<Value>, Value, _>(ContainerKind::Sequence, items)
            }
            Value::Object(entries) => {
                graph.map::<serde_json::Map<String, Value>, String, Value, _>(entries)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use serde_json::json;

    fn lower<T: Inspect + ?Sized>(value: &T) -> (crate::graph::Graph, NodeId) {
        let mut builder = GraphBuilder::new();
        let id = builder.inspect(value).unwrap();
        (builder.finish(), id)
    }

    struct Tagged {
        tag: String,
        weight: u32,
    }

    inspect_record!(Tagged { tag, weight });

    #[test]
    fn string_flavors_share_one_type() {
        let (graph, owned) = lower(&String::from("a"));
        let owned_type = graph.node(owned).type_id;
        let (graph, borrowed) = lower("a");
        assert_eq!(graph.node(borrowed).type_id, owned_type);
        let (graph, cow) = lower(&Cow::<'static, str>::Borrowed("a"));
        assert_eq!(graph.node(cow).type_id, TypeId::of::<String>());
    }

    #[test]
    fn integers_widen_without_loss() {
        let (graph, id) = lower(&-5i8);
        assert!(matches!(graph.node(id).kind, NodeKind::Value(Scalar::Int(-5))));
        let (graph, id) = lower(&u64::MAX);
        assert!(matches!(
            graph.node(id).kind,
            NodeKind::Value(Scalar::UInt(v)) if v == u128::from(u64::MAX)
        ));
    }

    #[test]
    fn mutably_borrowed_cell_is_an_error() {
        let cell = RefCell::new(3u8);
        let _guard = cell.borrow_mut();
        let mut builder = GraphBuilder::new();
        let err = builder.inspect(&cell).unwrap_err();
        assert!(matches!(err, DeepEqualsError::BorrowFailed { type_name: "u8" }));
    }

    #[test]
    fn poisoned_mutex_is_an_error() {
        let lock = Arc::new(Mutex::new(1i32));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        let mut builder = GraphBuilder::new();
        let err = builder.inspect(&lock).unwrap_err();
        assert!(matches!(err, DeepEqualsError::LockPoisoned { .. }));
    }

    #[test]
    fn dropped_weak_is_null() {
        let weak = {
            let strong = Rc::new(1u8);
            Rc::downgrade(&strong)
        };
        let (_, id) = lower(&weak);
        assert_eq!(id, NodeId::NULL);
    }

    #[test]
    fn weak_and_strong_share_a_node() {
        let strong = Arc::new(String::from("s"));
        let weak = Arc::downgrade(&strong);
        let mut builder = GraphBuilder::new();
        let a = builder.inspect(&strong).unwrap();
        let b = builder.inspect(&weak).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decimal_is_a_record_with_captured_value() {
        let (graph, id) = lower(&Decimal::new(1050, 2));
        let NodeKind::Record(record) = &graph.node(id).kind else {
            panic!("expected record");
        };
        assert_eq!(record.policy.fields(), &["mantissa", "scale"]);
        assert!(record.policy.has_custom_equality());
        let captured = record.captured.as_ref().unwrap();
        assert_eq!(captured.value().downcast_ref::<Decimal>(), Some(&Decimal::new(1050, 2)));
    }

    #[test]
    fn decimal_hash_ignores_scale() {
        let a = Decimal::new(1050, 2);
        let b = Decimal::new(10500, 3);
        assert_eq!(decimal_hash(&a), decimal_hash(&b));
        assert!(decimal_eq(&a, &b));
    }

    #[test]
    fn json_documents_lower_to_maps_and_sequences() {
        let doc = json!({ "name": "x", "tags": [1, 2], "missing": null });
        let (graph, id) = lower(&doc);
        let NodeKind::Map(entries) = &graph.node(id).kind else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 3);
        let tags = entries
            .iter()
            .find(|(k, _)| matches!(&graph.node(*k).kind, NodeKind::Value(Scalar::Str(s)) if s == "tags"))
            .map(|(_, v)| *v)
            .unwrap();
        assert_eq!(graph.node(tags).container_len(), Some(2));
    }

    #[test]
    fn macro_declares_fields_in_order() {
        let value = Tagged {
            tag: "t".into(),
            weight: 2,
        };
        let (graph, id) = lower(&value);
        let NodeKind::Record(record) = &graph.node(id).kind else {
            panic!("expected record");
        };
        assert_eq!(record.policy.fields(), &["tag", "weight"]);
        assert_eq!(record.policy.short_name(), "Tagged");
    }

    #[test]
    fn arrays_and_vecs_differ_in_kind() {
        let (graph, array) = lower(&[1u8, 2]);
        assert!(!graph.node(array).is_collection_like());
        let (graph, vec) = lower(&vec![1u8, 2]);
        assert!(graph.node(vec).is_collection_like());
    }
}
