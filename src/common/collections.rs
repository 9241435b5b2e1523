//! Hash collections used throughout the crate.
//!
//! Window ids are small integers, so the Fx hasher is a better fit than SipHash.

pub use std::collections::{BTreeMap, BTreeSet, hash_map};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
