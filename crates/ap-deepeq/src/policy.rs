//! Per-type facts cached for the lifetime of the process.
//!
//! A [`TypePolicy`] records what the engine needs to know about a record
//! type: its ordered field names and whether it brings its own equality and
//! hash. Policies are computed the first time a type is inspected and shared
//! through [`TypeRegistry::global`] afterwards.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

static GLOBAL: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::new);

/// Static facts about one record type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypePolicy {
    type_id: TypeId,
    type_name: &'static str,
    short_name: &'static str,
    fields: Vec<&'static str>,
    custom_equality: bool,
    custom_hash: bool,
}

impl TypePolicy {
    /// Build a policy for `type_id` with the given field layout.
    pub fn new(
        type_id: TypeId,
        type_name: &'static str,
        fields: Vec<&'static str>,
        custom_equality: bool,
        custom_hash: bool,
    ) -> Self {
        Self {
            type_id,
            type_name,
            short_name: short_type_name(type_name),
            fields,
            custom_equality,
            custom_hash,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name as reported by `std::any::type_name`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name, without generic arguments.
    pub fn short_name(&self) -> &'static str {
        self.short_name
    }

    /// Ordered field names, including flattened base fields.
    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    /// Whether the type compares itself through its own `PartialEq`.
    pub fn has_custom_equality(&self) -> bool {
        self.custom_equality
    }

    /// Whether the type hashes itself through its own `Hash`.
    pub fn has_custom_hash(&self) -> bool {
        self.custom_hash
    }

    /// Returns `true` if `name` matches either the full or the short name.
    pub fn matches_name(&self, name: &str) -> bool {
        self.type_name == name || self.short_name == name
    }
}

/// Concurrent read-through cache of [`TypePolicy`] values keyed by type.
///
/// Entries are append-only and never change once stored. Two threads may
/// compute the policy for the same type at the same time; the first one
/// stored wins and both observe it.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    policies: RwLock<HashMap<TypeId, Arc<TypePolicy>>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by inspection.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    /// Look up a cached policy.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypePolicy>> {
        // Entries are immutable, so a poisoned lock still guards valid data.
        let map = self.policies.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&type_id).cloned()
    }

    /// Return the cached policy for `type_id`, computing it with `make` if
    /// absent. `make` runs outside the lock.
    pub fn get_or_insert_with(
        &self,
        type_id: TypeId,
        make: impl FnOnce() -> TypePolicy,
    ) -> Arc<TypePolicy> {
        if let Some(policy) = self.get(type_id) {
            return policy;
        }
        let computed = Arc::new(make());
        let mut map = self.policies.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(type_id).or_insert(computed).clone()
    }

    /// Number of cached types.
    pub fn len(&self) -> usize {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no type has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip the module path and generic arguments from a type name.
///
/// `alloc::vec::Vec<my::Order>` becomes `Vec`, `my::order::Order` becomes
/// `Order`.
pub fn short_type_name(type_name: &'static str) -> &'static str {
    let base = match type_name.find('<') {
        Some(idx) => &type_name[..idx],
        None => type_name,
    };
    match base.rfind("::") {
        Some(idx) => &base[idx + 2..],
        None => base,
    }
}
