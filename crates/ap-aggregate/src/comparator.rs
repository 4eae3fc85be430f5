//! The equality seam used by aggregates.

use ap_deepeq::{DeepEqResult, DeepEquals, Inspect};

/// Decides whether two values of the same type are equivalent.
pub trait DeepComparator {
    fn is_deep_equal<T: Inspect + ?Sized>(&self, a: &T, b: &T) -> DeepEqResult<bool>;
}

impl DeepComparator for DeepEquals {
    fn is_deep_equal<T: Inspect + ?Sized>(&self, a: &T, b: &T) -> DeepEqResult<bool> {
        DeepEquals::is_deep_equal(self, a, b)
    }
}

impl<C: DeepComparator + ?Sized> DeepComparator for &C {
    fn is_deep_equal<T: Inspect + ?Sized>(&self, a: &T, b: &T) -> DeepEqResult<bool> {
        (**self).is_deep_equal(a, b)
    }
}
