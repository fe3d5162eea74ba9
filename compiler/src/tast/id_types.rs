//! Core ID Types for the typed unit
//!
//! Every element (type, variable, method) and every expression node is
//! addressed by a lightweight `u32` newtype. Element IDs index the arenas in
//! [`ElementTable`](super::elements::ElementTable); expression IDs are unique
//! within one unit and are what the lowering passes use to talk about tree
//! positions without holding borrows into the tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Trait for ID types that can be created and validated
pub trait IdType: Copy + Clone + PartialEq + Eq + std::hash::Hash + fmt::Debug {
    /// Create a new ID from a raw u32 value
    fn from_raw(raw: u32) -> Self;

    /// Get the raw u32 value of this ID
    fn as_raw(self) -> u32;

    /// Check if this ID is valid (not a sentinel value)
    fn is_valid(self) -> bool;

    /// Get an invalid/null sentinel value
    fn invalid() -> Self;
}

/// Macro to define ID types with consistent behavior
macro_rules! define_id_type {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Create a new ID from a raw u32 value
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw u32 value of this ID
            pub const fn as_raw(self) -> u32 {
                self.0
            }

            /// Check if this ID is valid (not the sentinel value)
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            /// Get an invalid/null sentinel value
            pub const fn invalid() -> Self {
                Self(u32::MAX)
            }

            /// Index into an arena keyed by this ID
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl IdType for $name {
            fn from_raw(raw: u32) -> Self {
                Self::from_raw(raw)
            }

            fn as_raw(self) -> u32 {
                self.as_raw()
            }

            fn is_valid(self) -> bool {
                self.is_valid()
            }

            fn invalid() -> Self {
                Self::invalid()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::invalid()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(<invalid>)", stringify!($name))
                }
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self::from_raw(raw)
            }
        }
    };
}

define_id_type! {
    /// Identifier of a class, interface, anonymous class or lambda element
    TypeElementId
}

define_id_type! {
    /// Identifier of a field, parameter or local variable element
    VariableId
}

define_id_type! {
    /// Identifier of a method, constructor or generated function element
    MethodId
}

define_id_type! {
    /// Identifier of an expression node, unique within its unit
    ///
    /// Used by the access ledger and the rewriters to refer to tree
    /// positions across mutation.
    ExpressionId
}

/// Monotonic generator for one ID kind.
///
/// Serialized with the unit so that passes running on a deserialized unit
/// keep allocating fresh IDs.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct IdGenerator<T: IdType> {
    next_id: u32,
    #[serde(skip)]
    _phantom: PhantomData<T>,
}

impl<T: IdType> IdGenerator<T> {
    /// Create a new ID generator starting from the first valid ID
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            _phantom: PhantomData,
        }
    }

    /// Create a new ID generator starting from a specific ID
    pub const fn with_start(start_id: u32) -> Self {
        Self {
            next_id: start_id,
            _phantom: PhantomData,
        }
    }

    /// Generate the next unique ID
    ///
    /// Panics if we run out of valid IDs (after 2^32 - 2 allocations).
    pub fn next(&mut self) -> T {
        let raw_id = self.next_id;
        if raw_id == u32::MAX {
            panic!(
                "ID generator overflow: exhausted all valid IDs for {}",
                std::any::type_name::<T>()
            );
        }
        self.next_id += 1;
        T::from_raw(raw_id)
    }

    /// Get the number of IDs generated so far
    pub fn count(&self) -> u32 {
        self.next_id
    }
}

impl<T: IdType> Clone for IdGenerator<T> {
    fn clone(&self) -> Self {
        Self::with_start(self.next_id)
    }
}

impl<T: IdType> Default for IdGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministically ordered maps and sets keyed by IDs.
pub mod collections {
    use super::IdType;
    use fxhash::FxBuildHasher;
    use indexmap::{IndexMap, IndexSet};

    /// Insertion-ordered map keyed by an ID type
    pub type IdMap<K, V> = IndexMap<K, V, FxBuildHasher>;

    /// Insertion-ordered set of IDs
    pub type IdSet<K> = IndexSet<K, FxBuildHasher>;

    /// Create an empty ID map
    pub fn new_id_map<K: IdType, V>() -> IdMap<K, V> {
        IdMap::with_hasher(FxBuildHasher::default())
    }

    /// Create an empty ID set
    pub fn new_id_set<K: IdType>() -> IdSet<K> {
        IdSet::with_hasher(FxBuildHasher::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sentinel() {
        let id = VariableId::invalid();
        assert!(!id.is_valid());
        assert_eq!(VariableId::default(), id);
        assert_eq!(format!("{}", id), "VariableId(<invalid>)");
        assert_eq!(format!("{}", VariableId::from_raw(3)), "VariableId(3)");
    }

    #[test]
    fn test_generator_is_monotonic() {
        let mut generator: IdGenerator<ExpressionId> = IdGenerator::with_start(10);
        assert_eq!(generator.next(), ExpressionId::from_raw(10));
        assert_eq!(generator.next(), ExpressionId::from_raw(11));
        assert_eq!(generator.count(), 12);

        let mut cloned = generator.clone();
        assert_eq!(cloned.next(), ExpressionId::from_raw(12));
    }

    #[test]
    fn test_id_map_keeps_insertion_order() {
        let mut map = collections::new_id_map::<TypeElementId, &str>();
        map.insert(TypeElementId::from_raw(5), "five");
        map.insert(TypeElementId::from_raw(1), "one");
        let keys: Vec<_> = map.keys().map(|k| k.as_raw()).collect();
        assert_eq!(keys, vec![5, 1]);
    }

    #[test]
    fn test_generator_serde_round_trip() {
        let mut generator: IdGenerator<MethodId> = IdGenerator::new();
        generator.next();
        let json = serde_json::to_string(&generator).unwrap();
        let restored: IdGenerator<MethodId> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.count(), 1);
    }
}
