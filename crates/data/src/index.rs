//! Index types. See [`::index_vec`].

pub use index_vec::{Idx, IndexSlice, IndexVec, index_vec};

/// Creates a new index to use with [`::index_vec`].
#[macro_export]
macro_rules! newtype_index {
    () => {};
    ($(#[$attr:meta])* $vis:vis struct $name:ident; $($rest:tt)*) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $vis struct $name(std::num::NonZero<u32>);

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.get())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl $crate::index::Idx for $name {
            #[inline(always)]
            fn from_usize(value: usize) -> Self {
                let value = u32::try_from(value).expect("index overflowed");
                Self::new(value)
            }

            #[inline(always)]
            fn index(self) -> usize {
                self.get() as usize
            }
        }

        impl $name {
            /// Creates a new index from the given `value`.
            #[inline(always)]
            $vis const fn new(value: u32) -> Self {
                let inner_repr = value.checked_add(1).expect("index overflowed");
                Self(std::num::NonZero::new(inner_repr).expect("inner_repr should never be zero"))
            }

            /// Gets the underlying index value.
            #[inline(always)]
            $vis const fn get(self) -> u32 {
                self.0.get() - 1
            }
        }

        $crate::newtype_index!($($rest)*);
    };
}

newtype_index! {
    /// Position of a state field in declaration order.
    pub struct FieldId;
    pub struct FunctionId;
    pub struct EventId;
    /// Function-scoped local variable; parameters come first.
    pub struct LocalId;
}

#[cfg(test)]
mod tests {
    use super::*;

    newtype_index!(
        struct MyIndex;
    );

    #[test]
    fn test_newtype_index() {
        assert_eq!(MyIndex::new(0).get(), 0);
        assert_eq!(MyIndex::new(7).get(), 7);
        assert_eq!(MyIndex::new(0xFFFF_FF00).get(), 0xFFFF_FF00);
        assert_eq!(LocalId::from_usize(3).index(), 3);
    }

    #[test]
    fn test_index_size() {
        assert_eq!(std::mem::size_of::<FieldId>(), 4);
        assert_eq!(std::mem::size_of::<Option<FieldId>>(), 4);
        assert_eq!(std::mem::size_of::<Option<LocalId>>(), 4);
    }
}
