//! Optimistic-lock versions of aggregate roots.

/// The version of a root that has never been persisted.
pub const NEW_VERSION: i64 = 0;

/// A root that carries a persistence version.
///
/// Repositories bump the version on every successful write; a root still at
/// [`NEW_VERSION`] has never been written.
pub trait Versioned {
    fn version(&self) -> i64;

    /// Returns `true` if the root has never been persisted.
    fn is_new_version(&self) -> bool {
        self.version() == NEW_VERSION
    }
}

impl<T: Versioned + ?Sized> Versioned for Box<T> {
    fn version(&self) -> i64 {
        (**self).version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Root(i64);

    impl Versioned for Root {
        fn version(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn new_version_is_zero() {
        assert!(Root(NEW_VERSION).is_new_version());
        assert!(!Root(3).is_new_version());
        assert!(Box::new(Root(0)).is_new_version());
    }
}
