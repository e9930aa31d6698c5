#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// A HashMap implementation backed by the linear-probe table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers.
pub mod hash_map;

/// The core open-addressing hash table over caller-defined entries.
pub mod hash_table;

/// A hash set implementation backed by the linear-probe table.
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable hashers.
pub mod hash_set;

pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::EntryEq;
pub use hash_table::EntryHash;
pub use hash_table::HashTable;
pub use hash_table::hash_bytes;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Default hash builder used by [`HashMap`] and [`HashSet`].
        ///
        /// With the `foldhash` feature enabled this is
        /// `foldhash::fast::RandomState`.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Default hash builder used by [`HashMap`] and [`HashSet`].
        ///
        /// Without the `foldhash` feature this falls back to the standard
        /// library's `RandomState`.
        pub type DefaultHashBuilder = std::collections::hash_map::RandomState;
    } else {
        /// Placeholder hash builder used when no default hasher is available.
        ///
        /// This type is uninhabited and does not implement `BuildHasher`;
        /// enable the `foldhash` or `std` feature, or supply an explicit
        /// hash builder via `with_hasher`.
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}
    }
}
