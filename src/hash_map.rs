use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::DefaultHashBuilder;
use crate::hash_table::EntryEq;
use crate::hash_table::EntryHash;
use crate::hash_table::HashTable;

/// Hashes the key half of a stored pair through the map's hash builder.
#[derive(Clone)]
struct PairHash<S> {
    hash_builder: S,
}

impl<S> PairHash<S>
where
    S: BuildHasher,
{
    fn hash_key<K: Hash>(&self, key: &K) -> u32 {
        self.hash_builder.hash_one(key) as u32
    }
}

impl<K, V, S> EntryHash<(K, V)> for PairHash<S>
where
    K: Hash,
    S: BuildHasher,
{
    fn hash_entry(&self, entry: &(K, V)) -> u32 {
        self.hash_key(&entry.0)
    }
}

/// Compares stored pairs by key.
#[derive(Clone)]
struct PairEq;

impl<K, V> EntryEq<(K, V)> for PairEq
where
    K: Eq,
{
    fn eq_entry(&self, a: &(K, V), b: &(K, V)) -> bool {
        a.0 == b.0
    }
}

/// A hash map implemented over the linear-probe [`HashTable`].
///
/// `HashMap<K, V, S>` stores key-value pairs where keys implement
/// `Hash + Eq` and uses a configurable hash builder `S` to hash keys. Pairs
/// are stored as whole entries in the underlying table, keyed by their
/// first element; the 64-bit output of the hash builder is truncated into
/// the table's 32-bit hash domain.
///
/// Nothing is allocated until the first insertion.
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use probe_hash::HashMap;
///
/// let mut map: HashMap<&str, u32> = HashMap::new();
/// map.insert("a", 1);
/// map.insert("b", 2);
/// assert_eq!(map.get(&"a"), Some(&1));
/// assert_eq!(map.len(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    table: HashTable<(K, V), PairHash<S>, PairEq>,
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a new hash map with the given hash builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "std")]
    /// # {
    /// use std::collections::hash_map::RandomState;
    ///
    /// use probe_hash::HashMap;
    ///
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(RandomState::new());
    /// assert!(map.is_empty());
    /// # }
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: HashTable::new(PairHash { hash_builder }, PairEq),
        }
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots in the underlying table: 0 before the
    /// first insertion, a power of two afterwards.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all elements while keeping the allocated capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// map.clear();
    /// assert!(map.is_empty());
    /// # }
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, `None` is returned. If it
    /// did, the value is updated and the old value is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// # }
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.table.insert((key, value)).map(|(_, value)| value)
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// # }
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.table.hash_fn().hash_key(key);
        self.table
            .find_keyed(hash, |stored| stored.0 == *key)
            .map(|entry| &entry.1)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, u32> = HashMap::new();
    /// map.insert(1, 10);
    /// if let Some(value) = map.get_mut(&1) {
    ///     *value += 1;
    /// }
    /// assert_eq!(map.get(&1), Some(&11));
    /// # }
    /// ```
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.table.hash_fn().hash_key(key);
        self.table
            .find_keyed_mut(hash, |stored| stored.0 == *key)
            .map(|entry| &mut entry.1)
    }

    /// Returns `true` if the map contains a value for the key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// # }
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes a key from the map, returning the stored key and value if
    /// the key was present.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.table.hash_fn().hash_key(key);
        self.table.remove_keyed(hash, |stored| stored.0 == *key)
    }

    /// Returns an iterator over the key-value pairs in arbitrary order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::HashMap;
    ///
    /// let mut map: HashMap<i32, u32> = HashMap::new();
    /// map.insert(1, 10);
    /// map.insert(2, 20);
    ///
    /// let total: u32 = map.iter().map(|(_, v)| v).sum();
    /// assert_eq!(total, 30);
    /// # }
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys in arbitrary order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values in arbitrary order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates a new hash map using the default hash builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use probe_hash::HashMap;
    ///
    /// let map: HashMap<i32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the key-value pairs of a [`HashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }
}

/// An iterator over the keys of a [`HashMap`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over the values of a [`HashMap`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k0: u64,
        k1: u64,
    }

    impl SipHashBuilder {
        fn random() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            Self {
                k0: 0x0706050403020100,
                k1: 0x0f0e0d0c0b0a0908,
            }
        }
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[test]
    fn insert_get_remove() {
        let mut map = HashMap::with_hasher(SipHashBuilder::random());

        assert_eq!(map.insert("one".to_string(), 1), None);
        assert_eq!(map.insert("two".to_string(), 2), None);
        assert_eq!(map.len(), 2);

        assert_eq!(map.get(&"one".to_string()), Some(&1));
        assert_eq!(map.get(&"two".to_string()), Some(&2));
        assert_eq!(map.get(&"three".to_string()), None);
        assert!(map.contains_key(&"one".to_string()));

        assert_eq!(map.remove(&"one".to_string()), Some(1));
        assert_eq!(map.remove(&"one".to_string()), None);
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key(&"one".to_string()));
    }

    #[test]
    fn insert_overwrites_and_returns_old_value() {
        let mut map = HashMap::with_hasher(SipHashBuilder::random());

        assert_eq!(map.insert(7u64, "a"), None);
        assert_eq!(map.insert(7u64, "b"), Some("a"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&7), Some(&"b"));
    }

    #[test]
    fn get_mut_updates_value() {
        let mut map = HashMap::with_hasher(SipHashBuilder::random());

        map.insert(1u32, 10u32);
        if let Some(value) = map.get_mut(&1) {
            *value += 5;
        }
        assert_eq!(map.get(&1), Some(&15));
        assert!(map.get_mut(&2).is_none());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut map = HashMap::with_hasher(SipHashBuilder::random());

        for k in 0..100u64 {
            map.insert(k, k * 2);
        }
        let capacity = map.capacity();

        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.capacity(), capacity);
        assert_eq!(map.get(&1), None);
    }

    #[test]
    fn iter_keys_values_cover_contents() {
        let mut map = HashMap::with_hasher(SipHashBuilder::random());

        for k in 0..10u64 {
            map.insert(k, k + 100);
        }

        let mut pairs: Vec<(u64, u64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.sort_unstable();
        assert_eq!(pairs.len(), 10);
        for (i, (k, v)) in pairs.iter().enumerate() {
            assert_eq!(*k, i as u64);
            assert_eq!(*v, i as u64 + 100);
        }

        let mut keys: Vec<u64> = map.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..10u64).collect::<Vec<_>>());

        let total: u64 = map.values().sum();
        assert_eq!(total, (0..10u64).map(|k| k + 100).sum());

        let by_ref: usize = (&map).into_iter().count();
        assert_eq!(by_ref, 10);
    }

    #[test]
    fn many_string_keys_survive_growth() {
        let mut map = HashMap::with_hasher(SipHashBuilder::random());

        for k in 0..1000u32 {
            let mut key = String::from("key_");
            key.push_str(&k.to_string());
            assert_eq!(map.insert(key, k), None);
        }
        assert_eq!(map.len(), 1000);

        for k in 0..1000u32 {
            let mut key = String::from("key_");
            key.push_str(&k.to_string());
            assert_eq!(map.get(&key), Some(&k));
        }
    }

    #[test]
    fn extend_and_from_iter() {
        let mut map: HashMap<u32, u32, SipHashBuilder> =
            (0..5u32).map(|k| (k, k * k)).collect();
        assert_eq!(map.len(), 5);
        assert_eq!(map.get(&4), Some(&16));

        map.extend([(5u32, 25u32), (6, 36)]);
        assert_eq!(map.len(), 7);
        assert_eq!(map.get(&6), Some(&36));
    }

    #[test]
    fn clone_is_independent() {
        let mut map = HashMap::with_hasher(SipHashBuilder::random());
        map.insert(1u32, "one");
        map.insert(2u32, "two");

        let cloned = map.clone();
        map.remove(&1);

        assert_eq!(cloned.get(&1), Some(&"one"));
        assert_eq!(cloned.len(), 2);
        assert_eq!(map.len(), 1);
    }

    #[cfg(any(feature = "std", feature = "foldhash"))]
    #[test]
    fn default_hash_builder_works() {
        let mut map: HashMap<u32, u32> = HashMap::new();
        map.insert(1, 2);
        assert_eq!(map.get(&1), Some(&2));
    }
}
