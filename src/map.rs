use crate::{
    error::{Error, Result},
    rb::{self, NodeId, RbTree},
};
use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt,
    fmt::Debug,
    hash::{Hash, Hasher},
    iter::FusedIterator,
    mem,
};

pub use rb::{Cursor, IntoIter, Iter, IterMut};

/// Map with unique keys kept in key order, backed by a red-black tree.
///
/// Insert, remove and lookup are O(log n). Each element is identified by a [`NodeId`]
/// which stays valid until that element is removed.
pub struct OrderedMap<K, V> {
    tree: RbTree<K, V>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OrderedMap<K, V> {
    /// Returns a new, empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }

    /// Get number of key-value pairs in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Is the map empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Largest number of elements the map could hold.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.tree.max_size()
    }

    /// Clear the map.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Reserve capacity for at least `additional` more elements.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.tree.try_reserve(additional)
    }

    /// Insert key-value pair into map if the key is not already present.
    ///
    /// Returns the handle of the element with the key, and whether it was newly inserted.
    /// An existing element keeps its value.
    pub fn insert(&mut self, key: K, value: V) -> (NodeId, bool)
    where
        K: Ord,
    {
        match self.tree.find(&key) {
            Some(id) => (id, false),
            None => (self.tree.insert(key, value), true),
        }
    }

    /// Same as [`OrderedMap::insert`], but reports allocation failure as an error.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(NodeId, bool)>
    where
        K: Ord,
    {
        match self.tree.find(&key) {
            Some(id) => Ok((id, false)),
            None => Ok((self.tree.try_insert(key, value)?, true)),
        }
    }

    /// Insert key-value pair, replacing the value if the key is already present.
    ///
    /// Returns the element handle and true if the key was newly inserted.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> (NodeId, bool)
    where
        K: Ord,
    {
        match self.tree.find(&key) {
            Some(id) => {
                *self.tree.value_mut(id) = value;
                (id, false)
            }
            None => (self.tree.insert(key, value), true),
        }
    }

    /// Insert each pair in turn as [`OrderedMap::insert`] would, returning the outcome of each.
    pub fn insert_many<I>(&mut self, iter: I) -> Vec<(NodeId, bool)>
    where
        K: Ord,
        I: IntoIterator<Item = (K, V)>,
    {
        iter.into_iter().map(|(k, v)| self.insert(k, v)).collect()
    }

    /// Get mutable reference to the value for key, inserting `V::default()` first if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        K: Ord,
        V: Default,
    {
        let id = match self.tree.find(&key) {
            Some(id) => id,
            None => self.tree.insert(key, V::default()),
        };
        self.tree.value_mut(id)
    }

    /// Get reference to the value for key, or [`Error::KeyNotFound`].
    pub fn at<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Get mutable reference to the value for key, or [`Error::KeyNotFound`].
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Get reference to the value corresponding to the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.find(key).map(|id| self.tree.value(id))
    }

    /// Get a mutable reference to the value corresponding to the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let id = self.tree.find(key)?;
        Some(self.tree.value_mut(id))
    }

    /// Get references to the corresponding key and value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.find(key).map(|id| self.tree.get(id))
    }

    /// Does the map have an entry for the specified key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.contains(key)
    }

    /// Same as [`OrderedMap::contains_key`].
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.contains(key)
    }

    /// Cursor at the element with the key, or past-the-end if there is none.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.cursor(self.tree.find(key))
    }

    /// Key and value of the element `id` refers to. Panics if it was removed.
    pub fn get_node(&self, id: NodeId) -> (&K, &V) {
        self.tree.get(id)
    }

    /// Key and mutable value of the element `id` refers to. Panics if it was removed.
    pub fn get_node_mut(&mut self, id: NodeId) -> (&K, &mut V) {
        self.tree.get_mut(id)
    }

    /// Does `id` still refer to an element of this map?
    #[must_use]
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.tree.is_valid(id)
    }

    /// Remove key-value pair from map, returning just the value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|(_k, v)| v)
    }

    /// Remove key-value pair from map.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key)
    }

    /// Remove the element `id` refers to. Every other handle stays valid.
    ///
    /// Panics if the element was already removed.
    pub fn erase(&mut self, id: NodeId) -> (K, V) {
        self.tree.remove_node(id)
    }

    /// Returns first key-value pair in map.
    #[must_use]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|id| self.tree.get(id))
    }

    /// Returns last key-value pair in map.
    #[must_use]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|id| self.tree.get(id))
    }

    /// Remove first key-value pair from map.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let id = self.tree.first()?;
        Some(self.tree.remove_node(id))
    }

    /// Remove last key-value pair from map.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let id = self.tree.last()?;
        Some(self.tree.remove_node(id))
    }

    /// Cursor at the first element with key not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.cursor(self.tree.lower_bound(key))
    }

    /// Cursor at the first element with key greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.cursor(self.tree.upper_bound(key))
    }

    /// Cursor at the first element, past-the-end when the map is empty.
    #[must_use]
    pub fn cursor_front(&self) -> Cursor<'_, K, V> {
        self.tree.cursor(self.tree.first())
    }

    /// Cursor at the last element, past-the-end when the map is empty.
    #[must_use]
    pub fn cursor_back(&self) -> Cursor<'_, K, V> {
        self.tree.cursor(self.tree.last())
    }

    /// Cursor at the element `id` refers to. Panics if it was removed.
    pub fn cursor_at(&self, id: NodeId) -> Cursor<'_, K, V> {
        self.tree.cursor(Some(id))
    }

    /// Exchange contents with another map.
    pub fn swap(&mut self, other: &mut Self) {
        log::trace!("swapping maps of {} and {} entries", self.len(), other.len());
        mem::swap(&mut self.tree, &mut other.tree);
    }

    /// Copy every entry of `other` into `self`; `other` is left unchanged.
    ///
    /// Where both maps have a key, the value from `other` replaces the value in `self`.
    pub fn merge(&mut self, other: &Self)
    where
        K: Ord + Clone,
        V: Clone,
    {
        log::trace!("merging {} entries into map of {}", other.len(), self.len());
        for (k, v) in other {
            self.insert_or_assign(k.clone(), v.clone());
        }
    }

    /// Moves all elements from `other` into `self`, leaving `other` empty.
    ///
    /// Where both maps have a key, the value from `other` replaces the value in `self`.
    pub fn append(&mut self, other: &mut Self)
    where
        K: Ord,
    {
        log::trace!("appending {} entries to map of {}", other.len(), self.len());
        for (k, v) in mem::take(other) {
            self.insert_or_assign(k, v);
        }
    }

    /// Remove all key-value pairs for which `f` returns false, visiting in key order.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.tree.retain(|k, v| f(k, v));
    }

    /// Get iterator of references to key-value pairs.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.tree.iter()
    }

    /// Get iterator of mutable references to key-value pairs.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.tree.iter_mut()
    }

    /// Get iterator of references to keys.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    /// Get iterator of references to values.
    #[must_use]
    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    /// Get iterator of mutable references to values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut(self.iter_mut())
    }

    /// Get consuming iterator that returns all the keys, in sorted order.
    #[must_use]
    pub fn into_keys(self) -> IntoKeys<K, V> {
        IntoKeys(self.into_iter())
    }

    /// Get consuming iterator that returns all the values, in sorted order.
    #[must_use]
    pub fn into_values(self) -> IntoValues<K, V> {
        IntoValues(self.into_iter())
    }

    #[cfg(test)]
    pub(crate) fn check(&self)
    where
        K: Ord,
    {
        if let Err(v) = self.tree.validate() {
            panic!("map structure broken: {v:?}");
        }
    }
} // End impl OrderedMap

impl<K: Hash, V: Hash> Hash for OrderedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for elt in self {
            elt.hash(state);
        }
    }
}
impl<K: PartialEq, V: PartialEq> PartialEq for OrderedMap<K, V> {
    fn eq(&self, other: &OrderedMap<K, V>) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}
impl<K: Eq, V: Eq> Eq for OrderedMap<K, V> {}

impl<K: PartialOrd, V: PartialOrd> PartialOrd for OrderedMap<K, V> {
    fn partial_cmp(&self, other: &OrderedMap<K, V>) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}
impl<K: Ord, V: Ord> Ord for OrderedMap<K, V> {
    fn cmp(&self, other: &OrderedMap<K, V>) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K, V> IntoIterator for OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    /// Convert OrderedMap to [`IntoIter`].
    fn into_iter(self) -> IntoIter<K, V> {
        self.tree.into_iter()
    }
}
impl<'a, K, V> IntoIterator for &'a OrderedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
impl<'a, K, V> IntoIterator for &'a mut OrderedMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

impl<K, V> Clone for OrderedMap<K, V>
where
    K: Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> OrderedMap<K, V> {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
impl<K, V, const N: usize> From<[(K, V); N]> for OrderedMap<K, V>
where
    K: Ord,
{
    fn from(arr: [(K, V); N]) -> OrderedMap<K, V> {
        let mut map = OrderedMap::new();
        for (k, v) in arr {
            map.insert(k, v);
        }
        map
    }
}
impl<K, V> Extend<(K, V)> for OrderedMap<K, V>
where
    K: Ord,
{
    fn extend<T>(&mut self, iter: T)
    where
        T: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}
impl<'a, K, V> Extend<(&'a K, &'a V)> for OrderedMap<K, V>
where
    K: Ord + Copy,
    V: Copy,
{
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        for (&k, &v) in iter {
            self.insert(k, v);
        }
    }
}
impl<K, Q, V> std::ops::Index<&Q> for OrderedMap<K, V>
where
    K: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    type Output = V;

    /// Returns a reference to the value corresponding to the supplied key.
    ///
    /// Panics if the key is not present in the `OrderedMap`.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}
impl<K: Debug, V: Debug> Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// Key and value iterators.

/// Iterator returned by [`OrderedMap::keys`].
#[derive(Clone)]
pub struct Keys<'a, K, V>(Iter<'a, K, V>);
impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(k, _)| k)
    }
}
impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator returned by [`OrderedMap::values`].
#[derive(Clone)]
pub struct Values<'a, K, V>(Iter<'a, K, V>);
impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, v)| v)
    }
}
impl<K, V> ExactSizeIterator for Values<'_, K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Iterator returned by [`OrderedMap::values_mut`].
pub struct ValuesMut<'a, K, V>(IterMut<'a, K, V>);
impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<K, V> DoubleEndedIterator for ValuesMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, v)| v)
    }
}
impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Consuming iterator returned by [`OrderedMap::into_keys`].
pub struct IntoKeys<K, V>(IntoIter<K, V>);
impl<K, V> Iterator for IntoKeys<K, V> {
    type Item = K;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<K, V> DoubleEndedIterator for IntoKeys<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(k, _)| k)
    }
}
impl<K, V> ExactSizeIterator for IntoKeys<K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<K, V> FusedIterator for IntoKeys<K, V> {}

/// Consuming iterator returned by [`OrderedMap::into_values`].
pub struct IntoValues<K, V>(IntoIter<K, V>);
impl<K, V> Iterator for IntoValues<K, V> {
    type Item = V;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<K, V> DoubleEndedIterator for IntoValues<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, v)| v)
    }
}
impl<K, V> ExactSizeIterator for IntoValues<K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<K, V> FusedIterator for IntoValues<K, V> {}
