use crate::{
    error::Result,
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

/// Sorted collection that allows duplicate keys, backed by a red-black tree.
///
/// Equal keys are kept in insertion order. Every element, including each copy of a
/// repeated key, has its own [`NodeId`], so one particular copy can be removed with
/// [`OrderedMultiSet::erase`].
pub struct OrderedMultiSet<K> {
    tree: RbTree<K, ()>,
}

impl<K> Default for OrderedMultiSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> OrderedMultiSet<K> {
    /// Returns a new, empty multiset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }

    /// Get number of elements, counting every copy of a repeated key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Is the multiset empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Largest number of elements the multiset could hold.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.tree.max_size()
    }

    /// Clear the multiset.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Reserve capacity for at least `additional` more elements.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.tree.try_reserve(additional)
    }

    /// Insert a key, after any equal keys already present. Always succeeds.
    pub fn insert(&mut self, key: K) -> NodeId
    where
        K: Ord,
    {
        self.tree.insert(key, ())
    }

    /// Same as [`OrderedMultiSet::insert`], but reports allocation failure as an error.
    pub fn try_insert(&mut self, key: K) -> Result<NodeId>
    where
        K: Ord,
    {
        self.tree.try_insert(key, ())
    }

    /// Insert every key, returning their handles in the order given.
    pub fn insert_many<I>(&mut self, iter: I) -> Vec<NodeId>
    where
        K: Ord,
        I: IntoIterator<Item = K>,
    {
        iter.into_iter().map(|k| self.insert(k)).collect()
    }

    /// Number of elements equal to `key`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.equal_range(key).count()
    }

    /// Is there at least one element equal to `key`?
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.contains(key)
    }

    /// Cursor at the first element equal to `key`, or past-the-end if there is none.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        Cursor(self.tree.cursor(self.tree.find(key)))
    }

    /// Cursor at the first element not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor<'_, K>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        Cursor(self.tree.cursor(self.tree.lower_bound(key)))
    }

    /// Cursor at the first element greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Cursor<'_, K>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        Cursor(self.tree.cursor(self.tree.upper_bound(key)))
    }

    /// Iterator over exactly the elements equal to `key`, in insertion order.
    pub fn equal_range<Q>(&self, key: &Q) -> EqualRange<'_, K>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let from = self.tree.find(key);
        let to = match from {
            Some(_) => self.tree.upper_bound(key),
            None => None,
        };
        EqualRange(self.tree.range(from, to))
    }

    /// Key of the element `id` refers to. Panics if it was removed.
    pub fn get_node(&self, id: NodeId) -> &K {
        self.tree.key(id)
    }

    /// Does `id` still refer to an element of this multiset?
    #[must_use]
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.tree.is_valid(id)
    }

    /// Cursor at the element `id` refers to. Panics if it was removed.
    pub fn cursor_at(&self, id: NodeId) -> Cursor<'_, K> {
        Cursor(self.tree.cursor(Some(id)))
    }

    /// Cursor at the first element, past-the-end when the multiset is empty.
    #[must_use]
    pub fn cursor_front(&self) -> Cursor<'_, K> {
        Cursor(self.tree.cursor(self.tree.first()))
    }

    /// Remove exactly the element `id` refers to, leaving any equal keys in place.
    ///
    /// Panics if the element was already removed.
    pub fn erase(&mut self, id: NodeId) -> K {
        self.tree.remove_node(id).0
    }

    /// Remove one element equal to `key` (the first in order), if any.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|(k, ())| k)
    }

    /// Remove every element equal to `key`, returning how many were removed.
    pub fn remove_all<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut n = 0;
        while self.tree.remove(key).is_some() {
            n += 1;
        }
        n
    }

    /// Smallest element.
    #[must_use]
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|id| self.tree.key(id))
    }

    /// Largest element.
    #[must_use]
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|id| self.tree.key(id))
    }

    /// Remove and return the smallest element.
    pub fn pop_first(&mut self) -> Option<K> {
        let id = self.tree.first()?;
        Some(self.tree.remove_node(id).0)
    }

    /// Remove and return the largest element.
    pub fn pop_last(&mut self) -> Option<K> {
        let id = self.tree.last()?;
        Some(self.tree.remove_node(id).0)
    }

    /// Exchange contents with another multiset.
    pub fn swap(&mut self, other: &mut Self) {
        log::trace!("swapping multisets of {} and {} elements", self.len(), other.len());
        mem::swap(&mut self.tree, &mut other.tree);
    }

    /// Move every element of `other` into `self`, leaving `other` empty.
    pub fn merge(&mut self, other: &mut Self)
    where
        K: Ord,
    {
        log::trace!("merging {} elements into multiset of {}", other.len(), self.len());
        for k in mem::take(other) {
            self.tree.insert(k, ());
        }
    }

    /// Remove all elements for which `f` returns false, returning how many were removed.
    pub fn retain<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        self.tree.retain(|k, _| f(k))
    }

    /// Get iterator of references to the elements, in order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K> {
        Iter(self.tree.iter())
    }

    #[cfg(test)]
    pub(crate) fn check(&self)
    where
        K: Ord,
    {
        if let Err(v) = self.tree.validate() {
            panic!("multiset structure broken: {v:?}");
        }
    }
} // End impl OrderedMultiSet

impl<K: Hash> Hash for OrderedMultiSet<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for elt in self {
            elt.hash(state);
        }
    }
}
impl<K: PartialEq> PartialEq for OrderedMultiSet<K> {
    fn eq(&self, other: &OrderedMultiSet<K>) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}
impl<K: Eq> Eq for OrderedMultiSet<K> {}

impl<K: PartialOrd> PartialOrd for OrderedMultiSet<K> {
    fn partial_cmp(&self, other: &OrderedMultiSet<K>) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}
impl<K: Ord> Ord for OrderedMultiSet<K> {
    fn cmp(&self, other: &OrderedMultiSet<K>) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K> IntoIterator for OrderedMultiSet<K> {
    type Item = K;
    type IntoIter = IntoIter<K>;

    /// Convert OrderedMultiSet to [`IntoIter`].
    fn into_iter(self) -> IntoIter<K> {
        IntoIter(self.tree.into_iter())
    }
}
impl<'a, K> IntoIterator for &'a OrderedMultiSet<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;
    fn into_iter(self) -> Iter<'a, K> {
        self.iter()
    }
}

impl<K: Clone> Clone for OrderedMultiSet<K> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: Ord> FromIterator<K> for OrderedMultiSet<K> {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> OrderedMultiSet<K> {
        let mut set = OrderedMultiSet::new();
        for k in iter {
            set.insert(k);
        }
        set
    }
}
impl<K: Ord, const N: usize> From<[K; N]> for OrderedMultiSet<K> {
    fn from(arr: [K; N]) -> OrderedMultiSet<K> {
        let mut set = OrderedMultiSet::new();
        for k in arr {
            set.insert(k);
        }
        set
    }
}
impl<K: Ord> Extend<K> for OrderedMultiSet<K> {
    fn extend<T>(&mut self, iter: T)
    where
        T: IntoIterator<Item = K>,
    {
        for k in iter {
            self.insert(k);
        }
    }
}
impl<'a, K: Ord + Copy + 'a> Extend<&'a K> for OrderedMultiSet<K> {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = &'a K>,
    {
        for &k in iter {
            self.insert(k);
        }
    }
}
impl<K: Debug> Debug for OrderedMultiSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// Cursors.

/// Read-only position in an [`OrderedMultiSet`]: an element, or past-the-end.
///
/// Stepping back from the first element lands on past-the-end. Stepping from
/// past-the-end, or reading its key, panics.
pub struct Cursor<'a, K>(rb::Cursor<'a, K, ()>);

impl<K> Clone for Cursor<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K> Copy for Cursor<'_, K> {}
impl<K> PartialEq for Cursor<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<K> Eq for Cursor<'_, K> {}
impl<K: Debug> Debug for Cursor<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get()).finish()
    }
}

impl<'a, K> Cursor<'a, K> {
    /// Handle of the current element, `None` at past-the-end.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.0.node()
    }

    /// Is the cursor past-the-end?
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.0.is_end()
    }

    /// Key at the cursor, `None` at past-the-end.
    #[must_use]
    pub fn get(&self) -> Option<&'a K> {
        self.0.get().map(|(k, _)| k)
    }

    /// Key at the cursor. Panics at past-the-end.
    #[must_use]
    pub fn key(&self) -> &'a K {
        self.0.key()
    }

    /// Step to the next element. Panics at past-the-end.
    pub fn move_next(&mut self) {
        self.0.move_next();
    }

    /// Step to the previous element. Panics at past-the-end.
    pub fn move_prev(&mut self) {
        self.0.move_prev();
    }

    /// Key of the next element.
    #[must_use]
    pub fn peek_next(&self) -> Option<&'a K> {
        self.0.peek_next().map(|(k, _)| k)
    }

    /// Key of the previous element.
    #[must_use]
    pub fn peek_prev(&self) -> Option<&'a K> {
        self.0.peek_prev().map(|(k, _)| k)
    }
}

// Iterators.

/// Iterator returned by [`OrderedMultiSet::iter`].
pub struct Iter<'a, K>(rb::Iter<'a, K, ()>);
impl<K> Clone for Iter<'_, K> {
    fn clone(&self) -> Self {
        Iter(self.0.clone())
    }
}
impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<K> DoubleEndedIterator for Iter<'_, K> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(k, _)| k)
    }
}
impl<K> ExactSizeIterator for Iter<'_, K> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<K> FusedIterator for Iter<'_, K> {}

/// Consuming iterator returned by [`OrderedMultiSet::into_iter`].
pub struct IntoIter<K>(rb::IntoIter<K, ()>);
impl<K> Iterator for IntoIter<K> {
    type Item = K;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, ())| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<K> DoubleEndedIterator for IntoIter<K> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(k, ())| k)
    }
}
impl<K> ExactSizeIterator for IntoIter<K> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<K> FusedIterator for IntoIter<K> {}

/// Iterator returned by [`OrderedMultiSet::equal_range`].
pub struct EqualRange<'a, K>(rb::Range<'a, K, ()>);
impl<K> Clone for EqualRange<'_, K> {
    fn clone(&self) -> Self {
        EqualRange(self.0.clone())
    }
}
impl<'a, K> Iterator for EqualRange<'a, K> {
    type Item = &'a K;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }
}
impl<K> FusedIterator for EqualRange<'_, K> {}
