#![deny(missing_docs)]

//! This crate implements [OrderedMap] and [OrderedMultiSet], sorted containers similar to
//! [std::collections::BTreeMap], backed by a red-black tree.
//!
//! Unlike the std collections, every element has a [NodeId] handle, returned by insert,
//! which stays valid until that element is removed. A handle can be used to read the
//! element, start a cursor at it, or erase exactly that element.
//!
//! Most of the implementation is in the [rb] module, see [rb::RbTree].
//!
//! # Example
//!
//! ```
//!     use rb_collections::{OrderedMap, OrderedMultiSet};
//!     let mut mymap = OrderedMap::new();
//!     mymap.insert("England", "London");
//!     mymap.insert("France", "Paris");
//!     println!("The capital of France is {}", mymap["France"]);
//!
//!     let mut bag = OrderedMultiSet::from([3, 1, 3, 3, 2]);
//!     assert_eq!(bag.count(&3), 3);
//!     bag.remove(&3);
//!     assert!(bag.iter().eq(&[1, 2, 3, 3]));
//! ```
//!
//!# Features
//!
//! This crate supports the following cargo features:
//! - `unsafe-optim` : skips node arena bounds checks in release builds.

/// Red-black tree engine shared by both containers.
pub mod rb;

/// [OrderedMap] and its cursor and iterator types.
pub mod map;

/// [OrderedMultiSet] and its cursor and iterator types.
pub mod multiset;

/// Error type for fallible operations.
pub mod error;

mod slab;

pub use error::{Error, Result};
pub use map::OrderedMap;
pub use multiset::OrderedMultiSet;
pub use rb::NodeId;

/// Cursor returned by [OrderedMap::find], [OrderedMap::lower_bound], [OrderedMap::upper_bound].
pub type Cursor<'a, K, V> = map::Cursor<'a, K, V>;

/// Iterator returned by [OrderedMap::iter].
pub type Iter<'a, K, V> = map::Iter<'a, K, V>;

/// Iterator returned by [OrderedMap::iter_mut].
pub type IterMut<'a, K, V> = map::IterMut<'a, K, V>;

/// Consuming iterator returned by [OrderedMap::into_iter].
pub type IntoIter<K, V> = map::IntoIter<K, V>;

/// Iterator returned by [OrderedMap::keys].
pub type Keys<'a, K, V> = map::Keys<'a, K, V>;

/// Iterator returned by [OrderedMap::values].
pub type Values<'a, K, V> = map::Values<'a, K, V>;

/// Iterator returned by [OrderedMultiSet::equal_range].
pub type EqualRange<'a, K> = multiset::EqualRange<'a, K>;

#[cfg(all(test, not(miri)))]
use mimalloc::MiMalloc;

#[cfg(all(test, not(miri)))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[cfg(test)]
mod mytests;
