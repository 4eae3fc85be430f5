//! Comparison options and their serializable configuration.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DeepEqResult, DeepEqualsError};
use crate::policy::TypePolicy;

/// Default relative tolerance for `f32` values.
pub const DEFAULT_FLOAT_EPSILON: f64 = 1e-6;
/// Default relative tolerance for `f64` values.
pub const DEFAULT_DOUBLE_EPSILON: f64 = 1e-15;
/// Default absolute tolerance for `Decimal` values (`0.000001`).
pub const DEFAULT_DECIMAL_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// A type-erased comparator. Returns `None` when either value is not of the
/// type the comparator was registered for.
pub type Comparator = Arc<dyn Fn(&dyn Any, &dyn Any) -> Option<Ordering> + Send + Sync>;

/// Options controlling a deep comparison.
///
/// Built once, then shared read-only by any number of comparisons. The
/// defaults ignore types' own `PartialEq`, compare floats with a relative
/// tolerance and compare `Decimal` values with an absolute tolerance.
///
/// ```
/// use ap_deepeq::{inspect_record, DeepEquals, DeepEqualsOptions};
///
/// struct Entry {
///     key: String,
///     touched_at: u64,
/// }
///
/// inspect_record!(Entry { key, touched_at });
///
/// let options = DeepEqualsOptions::default().ignore_fields::<Entry>(["touched_at"]);
/// let engine = DeepEquals::with_options(options);
/// let a = Entry { key: "k".into(), touched_at: 1 };
/// let b = Entry { key: "k".into(), touched_at: 2 };
/// assert!(engine.is_deep_equal(&a, &b).unwrap());
/// ```
#[derive(Clone)]
pub struct DeepEqualsOptions {
    ignore_custom_equality: bool,
    custom_equality_types: HashSet<TypeId>,
    custom_equality_names: HashSet<String>,
    ignored_fields: HashMap<TypeId, HashSet<String>>,
    ignored_fields_by_name: HashMap<String, HashSet<String>>,
    comparators: HashMap<TypeId, Comparator>,
    float_epsilon: f64,
    double_epsilon: f64,
    decimal_epsilon: Decimal,
}

impl Default for DeepEqualsOptions {
    fn default() -> Self {
        let mut comparators: HashMap<TypeId, Comparator> = HashMap::new();
        comparators.insert(
            TypeId::of::<Decimal>(),
            decimal_comparator(DEFAULT_DECIMAL_EPSILON),
        );
        Self {
            ignore_custom_equality: true,
            custom_equality_types: HashSet::new(),
            custom_equality_names: HashSet::new(),
            ignored_fields: HashMap::new(),
            ignored_fields_by_name: HashMap::new(),
            comparators,
            float_epsilon: DEFAULT_FLOAT_EPSILON,
            double_epsilon: DEFAULT_DOUBLE_EPSILON,
            decimal_epsilon: DEFAULT_DECIMAL_EPSILON,
        }
    }
}

impl DeepEqualsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a validated configuration.
    pub fn from_config(config: &DeepEqualsConfig) -> DeepEqResult<Self> {
        config.validate()?;
        let mut options = Self::default()
            .ignore_custom_equality(config.ignore_custom_equality)
            .with_float_epsilon(config.float_epsilon)
            .with_double_epsilon(config.double_epsilon)
            .with_decimal_epsilon(config.decimal_epsilon);
        for name in &config.custom_equality_types {
            options = options.use_custom_equality_named(name.clone());
        }
        for (type_name, fields) in &config.ignored_fields {
            options = options.ignore_fields_named(type_name.clone(), fields.iter().cloned());
        }
        Ok(options)
    }

    /// Whether types' own `PartialEq` is bypassed in favor of field-by-field
    /// comparison. Defaults to `true`.
    pub fn ignore_custom_equality(mut self, ignore: bool) -> Self {
        self.ignore_custom_equality = ignore;
        self
    }

    /// Use `T`'s own `PartialEq` even when custom equality is ignored.
    pub fn use_custom_equality<T: ?Sized + 'static>(mut self) -> Self {
        self.custom_equality_types.insert(TypeId::of::<T>());
        self
    }

    /// Like [`use_custom_equality`](Self::use_custom_equality), matching the
    /// full or short type name.
    pub fn use_custom_equality_named(mut self, type_name: impl Into<String>) -> Self {
        self.custom_equality_names.insert(type_name.into());
        self
    }

    /// Skip the named fields of `T` during comparison.
    pub fn ignore_fields<T: ?Sized + 'static>(
        mut self,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ignored_fields
            .entry(TypeId::of::<T>())
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Like [`ignore_fields`](Self::ignore_fields), matching the full or
    /// short type name.
    pub fn ignore_fields_named(
        mut self,
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ignored_fields_by_name
            .entry(type_name.into())
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Compare values of `T` with `compare`; `Ordering::Equal` means equal.
    ///
    /// Only types whose inspection captures the value can be compared this
    /// way (see `RecordBuilder::capture`); anything else fails the
    /// comparison with `ComparatorUnsupported`.
    pub fn with_comparator<T: 'static>(
        mut self,
        compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        let erased: Comparator = Arc::new(move |a: &dyn Any, b: &dyn Any| {
            Some(compare(a.downcast_ref::<T>()?, b.downcast_ref::<T>()?))
        });
        self.comparators.insert(TypeId::of::<T>(), erased);
        self
    }

    /// Remove the comparator registered for `T`, including the default
    /// `Decimal` comparator.
    pub fn without_comparator<T: 'static>(mut self) -> Self {
        self.comparators.remove(&TypeId::of::<T>());
        self
    }

    pub fn with_float_epsilon(mut self, epsilon: f64) -> Self {
        self.float_epsilon = epsilon;
        self
    }

    pub fn with_double_epsilon(mut self, epsilon: f64) -> Self {
        self.double_epsilon = epsilon;
        self
    }

    /// Set the `Decimal` tolerance and re-register the `Decimal` comparator
    /// with it.
    pub fn with_decimal_epsilon(mut self, epsilon: Decimal) -> Self {
        self.decimal_epsilon = epsilon;
        self.comparators
            .insert(TypeId::of::<Decimal>(), decimal_comparator(epsilon));
        self
    }

    pub fn ignores_custom_equality(&self) -> bool {
        self.ignore_custom_equality
    }

    pub fn float_epsilon(&self) -> f64 {
        self.float_epsilon
    }

    pub fn double_epsilon(&self) -> f64 {
        self.double_epsilon
    }

    pub fn decimal_epsilon(&self) -> Decimal {
        self.decimal_epsilon
    }

    pub fn has_comparator<T: 'static>(&self) -> bool {
        self.comparators.contains_key(&TypeId::of::<T>())
    }

    /// Whether a record of this type should be compared with its own
    /// `PartialEq`.
    pub(crate) fn uses_custom_equality(&self, policy: &TypePolicy) -> bool {
        if !policy.has_custom_equality() {
            return false;
        }
        !self.ignore_custom_equality
            || self.custom_equality_types.contains(&policy.type_id())
            || self
                .custom_equality_names
                .iter()
                .any(|name| policy.matches_name(name))
    }

    pub(crate) fn is_field_ignored(&self, policy: &TypePolicy, field: &str) -> bool {
        self.ignored_fields
            .get(&policy.type_id())
            .is_some_and(|fields| fields.contains(field))
            || self
                .ignored_fields_by_name
                .iter()
                .any(|(name, fields)| policy.matches_name(name) && fields.contains(field))
    }

    pub(crate) fn comparator(&self, type_id: TypeId) -> Option<&Comparator> {
        self.comparators.get(&type_id)
    }
}

impl fmt::Debug for DeepEqualsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepEqualsOptions")
            .field("ignore_custom_equality", &self.ignore_custom_equality)
            .field("custom_equality_types", &self.custom_equality_types.len())
            .field("custom_equality_names", &self.custom_equality_names)
            .field("ignored_fields", &self.ignored_fields.len())
            .field("ignored_fields_by_name", &self.ignored_fields_by_name)
            .field("comparators", &self.comparators.len())
            .field("float_epsilon", &self.float_epsilon)
            .field("double_epsilon", &self.double_epsilon)
            .field("decimal_epsilon", &self.decimal_epsilon)
            .finish()
    }
}

fn decimal_comparator(epsilon: Decimal) -> Comparator {
    Arc::new(move |a: &dyn Any, b: &dyn Any| {
        let (a, b) = (a.downcast_ref::<Decimal>()?, b.downcast_ref::<Decimal>()?);
        // Overflowing subtraction means the values are far apart.
        let ordering = match a.checked_sub(*b) {
            Some(diff) if diff.abs() <= epsilon => Ordering::Equal,
            _ => a.cmp(b),
        };
        Some(ordering)
    })
}

/// Serializable form of [`DeepEqualsOptions`].
///
/// Comparators cannot be expressed in configuration; they are registered on
/// the options built from it.
///
/// ```toml
/// ignore_custom_equality = true
/// custom_equality_types = ["Money"]
/// float_epsilon = 1e-6
/// double_epsilon = 1e-15
/// decimal_epsilon = "0.000001"
///
/// [ignored_fields]
/// Loan = ["last_modified"]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepEqualsConfig {
    /// Bypass types' own `PartialEq`.
    pub ignore_custom_equality: bool,
    /// Type names exempt from `ignore_custom_equality`.
    pub custom_equality_types: Vec<String>,
    /// Relative tolerance for `f32`.
    pub float_epsilon: f64,
    /// Relative tolerance for `f64`.
    pub double_epsilon: f64,
    /// Absolute tolerance for `Decimal`.
    pub decimal_epsilon: Decimal,
    /// Type name to field names skipped during comparison.
    pub ignored_fields: BTreeMap<String, Vec<String>>,
}

impl Default for DeepEqualsConfig {
    fn default() -> Self {
        Self {
            ignore_custom_equality: true,
            custom_equality_types: Vec::new(),
            float_epsilon: DEFAULT_FLOAT_EPSILON,
            double_epsilon: DEFAULT_DOUBLE_EPSILON,
            decimal_epsilon: DEFAULT_DECIMAL_EPSILON,
            ignored_fields: BTreeMap::new(),
        }
    }
}

impl DeepEqualsConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> DeepEqResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| DeepEqualsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> DeepEqResult<String> {
        toml::to_string(self).map_err(|e| DeepEqualsError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> DeepEqResult<()> {
        for (name, value) in [
            ("float_epsilon", self.float_epsilon),
            ("double_epsilon", self.double_epsilon),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DeepEqualsError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.decimal_epsilon < Decimal::ZERO {
            return Err(DeepEqualsError::InvalidConfig(format!(
                "decimal_epsilon must be non-negative, got {}",
                self.decimal_epsilon
            )));
        }
        if self.custom_equality_types.iter().any(|name| name.trim().is_empty()) {
            return Err(DeepEqualsError::InvalidConfig(
                "custom_equality_types contains an empty type name".into(),
            ));
        }
        for (type_name, fields) in &self.ignored_fields {
            if type_name.trim().is_empty() {
                return Err(DeepEqualsError::InvalidConfig(
                    "ignored_fields contains an empty type name".into(),
                ));
            }
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(DeepEqualsError::InvalidConfig(format!(
                    "ignored_fields.{type_name} contains an empty field name"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn policy_named<T: 'static>(custom_equality: bool) -> TypePolicy {
        TypePolicy::new(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            vec!["a", "b"],
            custom_equality,
            custom_equality,
        )
    }

    struct Money;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn decimal_ordering(options: &DeepEqualsOptions, a: &str, b: &str) -> Option<Ordering> {
        let compare = options.comparator(TypeId::of::<Decimal>()).unwrap();
        compare(&dec(a), &dec(b))
    }

    #[test]
    fn default_options() {
        let options = DeepEqualsOptions::default();
        assert!(options.ignores_custom_equality());
        assert_eq!(options.float_epsilon(), 1e-6);
        assert_eq!(options.double_epsilon(), 1e-15);
        assert_eq!(options.decimal_epsilon(), dec("0.000001"));
        assert!(options.has_comparator::<Decimal>());
    }

    #[test]
    fn decimal_tolerance_is_inclusive() {
        let options = DeepEqualsOptions::default();
        assert_eq!(
            decimal_ordering(&options, "0.000001", "0.000002"),
            Some(Ordering::Equal)
        );
        assert_eq!(
            decimal_ordering(&options, "0.000001", "0.0000021"),
            Some(Ordering::Less)
        );
        assert_eq!(
            decimal_ordering(&options, "1.10", "1.1"),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn decimal_overflow_is_not_equal() {
        let options = DeepEqualsOptions::default();
        let compare = options.comparator(TypeId::of::<Decimal>()).unwrap();
        assert_eq!(
            compare(&Decimal::MAX, &Decimal::MIN),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn decimal_epsilon_reregisters_comparator() {
        let options = DeepEqualsOptions::default().with_decimal_epsilon(dec("0.01"));
        assert_eq!(
            decimal_ordering(&options, "1.00", "1.01"),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn comparator_rejects_foreign_values() {
        let options = DeepEqualsOptions::default().with_comparator::<String>(|a, b| a.len().cmp(&b.len()));
        let compare = options.comparator(TypeId::of::<String>()).unwrap();
        assert_eq!(compare(&String::from("ab"), &String::from("cd")), Some(Ordering::Equal));
        assert_eq!(compare(&1u8, &String::from("cd")), None);
    }

    #[test]
    fn without_comparator_removes_default() {
        let options = DeepEqualsOptions::default().without_comparator::<Decimal>();
        assert!(!options.has_comparator::<Decimal>());
    }

    #[test]
    fn custom_equality_requires_opt_in() {
        let policy = policy_named::<Money>(true);
        assert!(!DeepEqualsOptions::default().uses_custom_equality(&policy));
        assert!(DeepEqualsOptions::default()
            .use_custom_equality::<Money>()
            .uses_custom_equality(&policy));
        assert!(DeepEqualsOptions::default()
            .use_custom_equality_named("Money")
            .uses_custom_equality(&policy));
        assert!(DeepEqualsOptions::default()
            .ignore_custom_equality(false)
            .uses_custom_equality(&policy));
    }

    #[test]
    fn types_without_custom_equality_never_use_it() {
        let policy = policy_named::<Money>(false);
        let options = DeepEqualsOptions::default()
            .ignore_custom_equality(false)
            .use_custom_equality::<Money>();
        assert!(!options.uses_custom_equality(&policy));
    }

    #[test]
    fn ignored_fields_match_by_type_and_name() {
        let policy = policy_named::<Money>(false);
        let by_type = DeepEqualsOptions::default().ignore_fields::<Money>(["a"]);
        assert!(by_type.is_field_ignored(&policy, "a"));
        assert!(!by_type.is_field_ignored(&policy, "b"));

        let by_name = DeepEqualsOptions::default().ignore_fields_named("Money", ["b"]);
        assert!(by_name.is_field_ignored(&policy, "b"));
        assert!(!by_name.is_field_ignored(&policy, "a"));
    }

    #[test]
    fn default_config_matches_default_options() {
        let config = DeepEqualsConfig::default();
        let options = DeepEqualsOptions::from_config(&config).unwrap();
        assert!(options.ignores_custom_equality());
        assert_eq!(options.float_epsilon(), DEFAULT_FLOAT_EPSILON);
        assert_eq!(options.decimal_epsilon(), DEFAULT_DECIMAL_EPSILON);
    }

    #[test]
    fn config_from_toml() {
        let config = DeepEqualsConfig::from_toml_str(
            r#"
            ignore_custom_equality = false
            custom_equality_types = ["Money"]
            decimal_epsilon = "0.01"

            [ignored_fields]
            Money = ["b"]
            "#,
        )
        .unwrap();
        assert!(!config.ignore_custom_equality);
        assert_eq!(config.float_epsilon, DEFAULT_FLOAT_EPSILON);
        assert_eq!(config.decimal_epsilon, dec("0.01"));

        let options = DeepEqualsOptions::from_config(&config).unwrap();
        let policy = policy_named::<Money>(true);
        assert!(options.is_field_ignored(&policy, "b"));
        assert!(options.uses_custom_equality(&policy));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = DeepEqualsConfig::default();
        config.ignored_fields.insert("Loan".into(), vec!["touched".into()]);
        let text = config.to_toml_string().unwrap();
        assert_eq!(DeepEqualsConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = DeepEqualsConfig::from_toml_str("float_epsilon = -1.0").unwrap_err();
        assert!(matches!(err, DeepEqualsError::InvalidConfig(_)));

        let err = DeepEqualsConfig::from_toml_str("decimal_epsilon = \"-0.1\"").unwrap_err();
        assert!(matches!(err, DeepEqualsError::InvalidConfig(_)));

        let err = DeepEqualsConfig::from_toml_str("[ignored_fields]\nLoan = [\"\"]").unwrap_err();
        assert!(matches!(err, DeepEqualsError::InvalidConfig(_)));

        let err = DeepEqualsConfig::from_toml_str("float_epsilon = \"x\"").unwrap_err();
        assert!(matches!(err, DeepEqualsError::InvalidConfig(_)));
    }
}
