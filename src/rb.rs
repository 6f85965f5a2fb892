//! Red-black tree storage engine shared by [`OrderedMap`](crate::OrderedMap) and
//! [`OrderedMultiSet`](crate::OrderedMultiSet).
//!
//! General guide to implementation:
//!
//! Nodes live in an arena (`Slab`) and refer to each other by index. Each node owns
//! nothing: `left`/`right` are plain indices, and `parent` is the back-reference used to
//! step to the in-order successor or predecessor without a stack.
//!
//! The tree itself does not reject duplicate keys. A new key is linked in at the upper
//! bound of its equal run, so equal keys keep insertion order. Uniqueness is decided by
//! the wrapper before it calls [`RbTree::insert`].
//!
//! Removing a node with two children exchanges its *position* (links and color) with
//! its in-order successor rather than its payload, so a [`NodeId`] of any element other
//! than the removed one stays valid.

use crate::{
    error::{Error, Result},
    slab::Slab,
};
use std::{
    borrow::Borrow,
    cell::UnsafeCell,
    fmt,
    iter::FusedIterator,
    marker::PhantomData,
};

// Height of a red-black tree is at most 2*log2(n+1), which fits comfortably for any n
// that can be addressed.
type StkVec<T> = arrayvec::ArrayVec<T, 128>;

/// Node color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Red node, never has a red child.
    Red,
    /// Black node, counted by black-height.
    Black,
}

/// Handle to an element of a tree.
///
/// A `NodeId` keeps referring to the same element until that element is removed;
/// inserting or removing other elements does not affect it. Using a `NodeId` after its
/// element was removed panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    ix: usize,
    gen: u64,
}

struct Node<K, V> {
    key: K,
    // Shared access to the tree never touches a value through this cell except via
    // `Node::value`; `IterMut` is the only place a `&mut V` is produced from `&RbTree`.
    value: UnsafeCell<V>,
    color: Color,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Self {
        Self {
            key,
            value: UnsafeCell::new(value),
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
        }
    }

    #[inline]
    fn value(&self) -> &V {
        unsafe { &*self.value.get() }
    }
}

/// Red-black tree of key-value pairs ordered by key.
///
/// Invariants, holding between public calls:
/// - the root, if any, is black;
/// - a red node has no red child;
/// - every path from a node down to an absent child passes the same number of black nodes;
/// - in-order traversal yields keys in non-decreasing order;
/// - `parent` links agree with the `left`/`right` links pointing back at them.
pub struct RbTree<K, V> {
    nodes: Slab<Node<K, V>>,
    root: Option<usize>,
}

// Node holds its value in an UnsafeCell, which is only reached mutably through `&mut RbTree`
// or an `IterMut` borrowing it mutably.
unsafe impl<K: Sync, V: Sync> Sync for RbTree<K, V> {}

impl<K, V> Default for RbTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RbTree<K, V> {
    /// Returns a new, empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Slab::new(),
            root: None,
        }
    }

    /// Get number of elements in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the tree empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Number of elements the arena can hold without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Upper limit on the number of elements, set by the arena's address space.
    #[must_use]
    pub fn max_size(&self) -> usize {
        isize::MAX as usize / std::mem::size_of::<Node<K, V>>().max(1)
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        log::trace!("clearing red-black tree of {} nodes", self.len());
        self.root = None;
        self.nodes.clear();
    }

    /// Release unused arena capacity.
    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Reserve capacity for at least `additional` more elements.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.nodes.try_reserve(additional).map_err(|e| {
            log::debug!("reserving {additional} tree nodes failed: {e}");
            Error::AllocFailed(e)
        })
    }

    /// Insert an element, returning its handle. Equal keys are permitted; the new
    /// element is placed after any elements with an equal key.
    pub fn insert(&mut self, key: K, value: V) -> NodeId
    where
        K: Ord,
    {
        let (parent, left) = self.insert_pos(&key);
        let (x, _) = self.nodes.insert(Node::new(key, value));
        self.link(x, parent, left)
    }

    /// Same as [`RbTree::insert`] but reports allocation failure instead of aborting.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<NodeId>
    where
        K: Ord,
    {
        let (parent, left) = self.insert_pos(&key);
        let (x, _) = self.nodes.try_insert(Node::new(key, value)).map_err(|e| {
            log::debug!("tree node allocation failed at len {}: {e}", self.len());
            Error::AllocFailed(e)
        })?;
        Ok(self.link(x, parent, left))
    }

    /// Find the first element (in key order) whose key equals `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.find_ix(key).map(|x| self.id(x))
    }

    /// Is there an element with the specified key?
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.find_ix(key).is_some()
    }

    /// First element whose key is not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.seek(key, false).map(|x| self.id(x))
    }

    /// First element whose key is greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.seek(key, true).map(|x| self.id(x))
    }

    /// Remove the first element whose key equals `key`, if there is one.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let x = self.find_ix(key)?;
        Some(self.remove_ix(x))
    }

    /// Remove the element `id` refers to.
    ///
    /// Panics if the element was already removed.
    pub fn remove_node(&mut self, id: NodeId) -> (K, V) {
        let x = self.resolve(id);
        self.remove_ix(x)
    }

    /// Element with the smallest key.
    #[must_use]
    pub fn first(&self) -> Option<NodeId> {
        self.root.map(|r| self.id(self.min_from(r)))
    }

    /// Element with the largest key.
    #[must_use]
    pub fn last(&self) -> Option<NodeId> {
        self.root.map(|r| self.id(self.max_from(r)))
    }

    /// In-order successor of `id`, `None` when `id` is the last element.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.succ(self.resolve(id)).map(|x| self.id(x))
    }

    /// In-order predecessor of `id`, `None` when `id` is the first element.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.pred(self.resolve(id)).map(|x| self.id(x))
    }

    /// Does `id` refer to an element of this tree that has not been removed?
    #[must_use]
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.nodes.is_live(id.ix, id.gen)
    }

    /// Key of the element `id` refers to.
    pub fn key(&self, id: NodeId) -> &K {
        &self.node(self.resolve(id)).key
    }

    /// Value of the element `id` refers to.
    pub fn value(&self, id: NodeId) -> &V {
        self.node(self.resolve(id)).value()
    }

    /// Mutable value of the element `id` refers to.
    pub fn value_mut(&mut self, id: NodeId) -> &mut V {
        let x = self.resolve(id);
        self.node_mut(x).value.get_mut()
    }

    /// Key and value of the element `id` refers to.
    pub fn get(&self, id: NodeId) -> (&K, &V) {
        let n = self.node(self.resolve(id));
        (&n.key, n.value())
    }

    /// Key and mutable value of the element `id` refers to.
    pub fn get_mut(&mut self, id: NodeId) -> (&K, &mut V) {
        let x = self.resolve(id);
        let n = self.node_mut(x);
        (&n.key, n.value.get_mut())
    }

    /// Cursor positioned at `id`, or past-the-end for `None`.
    pub fn cursor(&self, id: Option<NodeId>) -> Cursor<'_, K, V> {
        Cursor {
            tree: self,
            node: id.map(|id| self.resolve(id)),
        }
    }

    /// Get iterator of references to key-value pairs, in key order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            front: self.root.map(|r| self.min_from(r)),
            back: self.root.map(|r| self.max_from(r)),
            len: self.len(),
        }
    }

    /// Get iterator of references to keys with mutable references to values, in key order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let (front, back) = (
            self.root.map(|r| self.min_from(r)),
            self.root.map(|r| self.max_from(r)),
        );
        IterMut {
            tree: self,
            front,
            back,
            len: self.len(),
            _pd: PhantomData,
        }
    }

    /// Iterator over the elements from `from` up to but not including `to`
    /// (`None` meaning past-the-end).
    pub fn range(&self, from: Option<NodeId>, to: Option<NodeId>) -> Range<'_, K, V> {
        Range {
            tree: self,
            front: from.map(|id| self.resolve(id)),
            end: to.map(|id| self.resolve(id)),
        }
    }

    /// Remove all elements for which `f` returns false, visiting in key order.
    /// Returns the number of elements removed.
    pub fn retain<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut removed = 0;
        let mut cur = self.root.map(|r| self.min_from(r));
        while let Some(x) = cur {
            cur = self.succ(x);
            let n = self.node_mut(x);
            if !f(&n.key, n.value.get_mut()) {
                self.remove_ix(x);
                removed += 1;
            }
        }
        removed
    }

    // Arena access.

    #[inline]
    fn node(&self, x: usize) -> &Node<K, V> {
        self.nodes.ix(x)
    }

    #[inline]
    fn node_mut(&mut self, x: usize) -> &mut Node<K, V> {
        self.nodes.ixm(x)
    }

    #[inline]
    fn parent(&self, x: usize) -> Option<usize> {
        self.node(x).parent
    }

    #[inline]
    fn left(&self, x: usize) -> Option<usize> {
        self.node(x).left
    }

    #[inline]
    fn right(&self, x: usize) -> Option<usize> {
        self.node(x).right
    }

    /// Absent children count as black.
    #[inline]
    fn is_red(&self, x: Option<usize>) -> bool {
        x.is_some_and(|x| self.node(x).color == Color::Red)
    }

    #[inline]
    fn set_color(&mut self, x: usize, color: Color) {
        self.node_mut(x).color = color;
    }

    fn id(&self, x: usize) -> NodeId {
        NodeId {
            ix: x,
            gen: self.nodes.gen(x),
        }
    }

    fn resolve(&self, id: NodeId) -> usize {
        assert!(
            self.nodes.is_live(id.ix, id.gen),
            "invalid NodeId: element has been removed"
        );
        id.ix
    }

    // Navigation.

    fn min_from(&self, mut x: usize) -> usize {
        while let Some(l) = self.left(x) {
            x = l;
        }
        x
    }

    fn max_from(&self, mut x: usize) -> usize {
        while let Some(r) = self.right(x) {
            x = r;
        }
        x
    }

    fn succ(&self, mut x: usize) -> Option<usize> {
        if let Some(r) = self.right(x) {
            return Some(self.min_from(r));
        }
        while let Some(p) = self.parent(x) {
            if self.left(p) == Some(x) {
                return Some(p);
            }
            x = p;
        }
        None
    }

    fn pred(&self, mut x: usize) -> Option<usize> {
        if let Some(l) = self.left(x) {
            return Some(self.max_from(l));
        }
        while let Some(p) = self.parent(x) {
            if self.right(p) == Some(x) {
                return Some(p);
            }
            x = p;
        }
        None
    }

    /// Leftmost node with key >= key, or with key > key when `strict`.
    fn seek<Q>(&self, key: &Q, strict: bool) -> Option<usize>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let (mut cur, mut best) = (self.root, None);
        while let Some(x) = cur {
            let k: &Q = self.node(x).key.borrow();
            let go_left = if strict { k > key } else { k >= key };
            if go_left {
                best = Some(x);
                cur = self.left(x);
            } else {
                cur = self.right(x);
            }
        }
        best
    }

    fn find_ix<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.seek(key, false).filter(|&x| {
            let k: &Q = self.node(x).key.borrow();
            k == key
        })
    }

    // Rotations. These only relink; colors are left to the fixups.

    /// Make `new` the child of `parent` that `old` used to be (or the root).
    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: Option<usize>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let n = self.node_mut(p);
                if n.left == Some(old) {
                    n.left = new;
                } else {
                    n.right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.right(x).expect("rotate_left without right child");
        let b = self.left(y);
        self.node_mut(x).right = b;
        if let Some(b) = b {
            self.node_mut(b).parent = Some(x);
        }
        let p = self.parent(x);
        self.node_mut(y).parent = p;
        self.replace_child(p, x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.left(x).expect("rotate_right without left child");
        let b = self.right(y);
        self.node_mut(x).left = b;
        if let Some(b) = b {
            self.node_mut(b).parent = Some(x);
        }
        let p = self.parent(x);
        self.node_mut(y).parent = p;
        self.replace_child(p, x, Some(y));
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    // Insertion.

    /// Parent for a new node with `key`, and whether it becomes the left child.
    fn insert_pos(&self, key: &K) -> (Option<usize>, bool)
    where
        K: Ord,
    {
        let (mut cur, mut parent, mut left) = (self.root, None, false);
        while let Some(x) = cur {
            parent = Some(x);
            left = *key < self.node(x).key;
            cur = if left { self.left(x) } else { self.right(x) };
        }
        (parent, left)
    }

    fn link(&mut self, x: usize, parent: Option<usize>, left: bool) -> NodeId {
        self.node_mut(x).parent = parent;
        match parent {
            None => self.root = Some(x),
            Some(p) if left => self.node_mut(p).left = Some(x),
            Some(p) => self.node_mut(p).right = Some(x),
        }
        self.insert_fixup(x);
        self.id(x)
    }

    fn insert_fixup(&mut self, mut x: usize) {
        while let Some(p) = self.parent(x) {
            if !self.is_red(Some(p)) {
                break;
            }
            // The root is black, so a red parent has a parent.
            let g = self.parent(p).expect("red node without parent");
            let p_left = self.left(g) == Some(p);
            let uncle = if p_left { self.right(g) } else { self.left(g) };
            if let Some(u) = uncle.filter(|&u| self.is_red(Some(u))) {
                self.set_color(p, Color::Black);
                self.set_color(u, Color::Black);
                self.set_color(g, Color::Red);
                x = g;
                continue;
            }
            let mut top = p;
            if p_left {
                if self.right(p) == Some(x) {
                    self.rotate_left(p);
                    top = x;
                }
                self.rotate_right(g);
            } else {
                if self.left(p) == Some(x) {
                    self.rotate_right(p);
                    top = x;
                }
                self.rotate_left(g);
            }
            self.set_color(top, Color::Black);
            self.set_color(g, Color::Red);
            break;
        }
        if let Some(r) = self.root {
            self.set_color(r, Color::Black);
        }
    }

    // Deletion.

    fn remove_ix(&mut self, z: usize) -> (K, V) {
        if let (Some(_), Some(r)) = (self.left(z), self.right(z)) {
            let s = self.min_from(r);
            self.swap_with_successor(z, s);
        }
        let child = self.left(z).or(self.right(z));
        let parent = self.parent(z);
        self.replace_child(parent, z, child);
        if let Some(c) = child {
            self.node_mut(c).parent = parent;
        }
        if self.node(z).color == Color::Black {
            self.delete_fixup(child, parent);
        }
        let n = self.nodes.remove(z);
        (n.key, n.value.into_inner())
    }

    /// Exchange the tree positions and colors of `z` and its in-order successor `s`
    /// (the leftmost node of z's right subtree). Afterwards z has no left child.
    fn swap_with_successor(&mut self, z: usize, s: usize) {
        let (zp, zl, zr) = (self.parent(z), self.left(z), self.right(z));
        let (sp, sr) = (self.parent(s), self.right(s));

        let (zc, sc) = (self.node(z).color, self.node(s).color);
        self.set_color(z, sc);
        self.set_color(s, zc);

        self.replace_child(zp, z, Some(s));
        self.node_mut(s).parent = zp;
        self.node_mut(s).left = zl;
        if let Some(l) = zl {
            self.node_mut(l).parent = Some(s);
        }

        self.node_mut(z).left = None;
        self.node_mut(z).right = sr;
        if let Some(c) = sr {
            self.node_mut(c).parent = Some(z);
        }

        if zr == Some(s) {
            self.node_mut(s).right = Some(z);
            self.node_mut(z).parent = Some(s);
        } else {
            self.node_mut(s).right = zr;
            if let Some(r) = zr {
                self.node_mut(r).parent = Some(s);
            }
            // s was the left child of sp.
            let sp = sp.expect("successor below right child has a parent");
            self.node_mut(sp).left = Some(z);
            self.node_mut(z).parent = Some(sp);
        }
    }

    /// Position `x` (possibly empty) under `parent` is one black short.
    fn delete_fixup(&mut self, mut x: Option<usize>, mut parent: Option<usize>) {
        while let Some(p) = parent {
            if self.is_red(x) {
                break;
            }
            // A black deficit on one side means the other side holds at least one black node.
            if self.left(p) == x {
                let mut w = self.right(p).expect("black deficit without sibling");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_left(p);
                    w = self.right(p).expect("black deficit without sibling");
                }
                if !self.is_red(self.left(w)) && !self.is_red(self.right(w)) {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    parent = self.parent(p);
                    continue;
                }
                if !self.is_red(self.right(w)) {
                    let near = self.left(w).expect("red near nephew");
                    self.set_color(near, Color::Black);
                    self.set_color(w, Color::Red);
                    self.rotate_right(w);
                    w = self.right(p).expect("black deficit without sibling");
                }
                let far = self.right(w).expect("red far nephew");
                self.set_color(w, self.node(p).color);
                self.set_color(p, Color::Black);
                self.set_color(far, Color::Black);
                self.rotate_left(p);
            } else {
                let mut w = self.left(p).expect("black deficit without sibling");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_right(p);
                    w = self.left(p).expect("black deficit without sibling");
                }
                if !self.is_red(self.left(w)) && !self.is_red(self.right(w)) {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    parent = self.parent(p);
                    continue;
                }
                if !self.is_red(self.left(w)) {
                    let near = self.right(w).expect("red near nephew");
                    self.set_color(near, Color::Black);
                    self.set_color(w, Color::Red);
                    self.rotate_left(w);
                    w = self.left(p).expect("black deficit without sibling");
                }
                let far = self.left(w).expect("red far nephew");
                self.set_color(w, self.node(p).color);
                self.set_color(p, Color::Black);
                self.set_color(far, Color::Black);
                self.rotate_right(p);
            }
            return;
        }
        // Red position absorbs the deficit; the root just turns black.
        if let Some(x) = x {
            self.set_color(x, Color::Black);
        }
    }

    // Self check.

    /// Recompute every invariant, returning the black-height of the root.
    #[cfg(test)]
    pub(crate) fn validate(&self) -> std::result::Result<usize, Violation>
    where
        K: Ord,
    {
        let Some(r) = self.root else {
            return if self.is_empty() {
                Ok(0)
            } else {
                Err(Violation::Len {
                    reachable: 0,
                    len: self.len(),
                })
            };
        };
        if self.parent(r).is_some() {
            return Err(Violation::ParentLink(r));
        }
        if self.is_red(Some(r)) {
            return Err(Violation::RedRoot);
        }
        let mut reachable = 0;
        let bh = self.check_subtree(r, &mut reachable)?;
        if reachable != self.len() {
            return Err(Violation::Len {
                reachable,
                len: self.len(),
            });
        }
        let mut x = self.min_from(r);
        while let Some(y) = self.succ(x) {
            if self.node(y).key < self.node(x).key {
                return Err(Violation::Order(y));
            }
            x = y;
        }
        Ok(bh)
    }

    #[cfg(test)]
    fn check_subtree(
        &self,
        x: usize,
        count: &mut usize,
    ) -> std::result::Result<usize, Violation> {
        *count += 1;
        let red = self.is_red(Some(x));
        let mut heights = [0; 2];
        for (h, c) in heights.iter_mut().zip([self.left(x), self.right(x)]) {
            if let Some(c) = c {
                if self.parent(c) != Some(x) {
                    return Err(Violation::ParentLink(c));
                }
                if red && self.is_red(Some(c)) {
                    return Err(Violation::RedRed(c));
                }
                *h = self.check_subtree(c, count)?;
            }
        }
        if heights[0] != heights[1] {
            return Err(Violation::BlackHeight(x));
        }
        Ok(heights[0] + usize::from(!red))
    }
}

/// Broken structural invariant found by `RbTree::validate`.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Violation {
    RedRoot,
    RedRed(usize),
    BlackHeight(usize),
    ParentLink(usize),
    Order(usize),
    Len { reachable: usize, len: usize },
}

impl<K, V> Clone for RbTree<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Structural copy: same shape and colors, in a fresh compact arena.
    fn clone(&self) -> Self {
        log::trace!("deep copy of red-black tree with {} nodes", self.len());
        let mut nodes = Slab::with_capacity(self.len());
        let Some(r) = self.root else {
            return Self { nodes, root: None };
        };
        let dup = |n: &Node<K, V>, parent| Node {
            key: n.key.clone(),
            value: UnsafeCell::new(n.value().clone()),
            color: n.color,
            parent,
            left: None,
            right: None,
        };
        let (root, _) = nodes.insert(dup(self.node(r), None));
        // Pre-order: (source node, copied parent, is left child).
        let mut stk: StkVec<(usize, usize, bool)> = StkVec::new();
        if let Some(c) = self.right(r) {
            stk.push((c, root, false));
        }
        if let Some(c) = self.left(r) {
            stk.push((c, root, true));
        }
        while let Some((src, parent, is_left)) = stk.pop() {
            let (d, _) = nodes.insert(dup(self.node(src), Some(parent)));
            if is_left {
                nodes.ixm(parent).left = Some(d);
            } else {
                nodes.ixm(parent).right = Some(d);
            }
            if let Some(c) = self.right(src) {
                stk.push((c, d, false));
            }
            if let Some(c) = self.left(src) {
                stk.push((c, d, true));
            }
        }
        Self {
            nodes,
            root: Some(root),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for RbTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> IntoIterator for RbTree<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    /// Convert `RbTree` to [`IntoIter`].
    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self)
    }
}

impl<'a, K, V> IntoIterator for &'a RbTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

// Cursor.

/// Read-only position in a tree: an element, or past-the-end.
///
/// [`Cursor::move_next`] and [`Cursor::move_prev`] step to the in-order successor and
/// predecessor. Stepping back from the first element lands on past-the-end; stepping
/// in either direction from past-the-end is a contract violation and panics.
pub struct Cursor<'a, K, V> {
    tree: &'a RbTree<K, V>,
    node: Option<usize>,
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K, V> Copy for Cursor<'_, K, V> {}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.node == other.node
    }
}
impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get()).finish()
    }
}

impl<'a, K, V> Cursor<'a, K, V> {
    /// Handle of the current element, `None` at past-the-end.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.node.map(|x| self.tree.id(x))
    }

    /// Is the cursor past-the-end?
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Key and value at the cursor, `None` at past-the-end.
    #[must_use]
    pub fn get(&self) -> Option<(&'a K, &'a V)> {
        let n = self.tree.node(self.node?);
        Some((&n.key, n.value()))
    }

    /// Key at the cursor. Panics at past-the-end.
    #[must_use]
    pub fn key(&self) -> &'a K {
        &self.tree.node(self.current()).key
    }

    /// Value at the cursor. Panics at past-the-end.
    #[must_use]
    pub fn value(&self) -> &'a V {
        self.tree.node(self.current()).value()
    }

    /// Step to the in-order successor. Panics at past-the-end.
    pub fn move_next(&mut self) {
        self.node = self.tree.succ(self.current());
    }

    /// Step to the in-order predecessor. Panics at past-the-end.
    pub fn move_prev(&mut self) {
        self.node = self.tree.pred(self.current());
    }

    /// Key and value of the in-order successor.
    #[must_use]
    pub fn peek_next(&self) -> Option<(&'a K, &'a V)> {
        let mut c = *self;
        c.move_next();
        c.get()
    }

    /// Key and value of the in-order predecessor.
    #[must_use]
    pub fn peek_prev(&self) -> Option<(&'a K, &'a V)> {
        let mut c = *self;
        c.move_prev();
        c.get()
    }

    fn current(&self) -> usize {
        match self.node {
            Some(x) => x,
            None => panic!("cursor is past-the-end"),
        }
    }
}

// Iterators.

/// Iterator returned by [`RbTree::iter`].
pub struct Iter<'a, K, V> {
    tree: &'a RbTree<K, V>,
    front: Option<usize>,
    back: Option<usize>,
    len: usize,
}
impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            back: self.back,
            len: self.len,
        }
    }
}
impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let x = self.front?;
        self.len -= 1;
        self.front = self.tree.succ(x);
        let n = self.tree.node(x);
        Some((&n.key, n.value()))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}
impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let x = self.back?;
        self.len -= 1;
        self.back = self.tree.pred(x);
        let n = self.tree.node(x);
        Some((&n.key, n.value()))
    }
}
impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.len
    }
}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator returned by [`RbTree::iter_mut`].
pub struct IterMut<'a, K, V> {
    // Links and keys are only read; values are handed out once each through the cell.
    tree: &'a RbTree<K, V>,
    front: Option<usize>,
    back: Option<usize>,
    len: usize,
    _pd: PhantomData<&'a mut V>,
}
impl<'a, K, V> IterMut<'a, K, V> {
    fn item(&self, x: usize) -> (&'a K, &'a mut V) {
        let n = self.tree.node(x);
        // Each node is yielded at most once (front and back never cross because of len)
        // and the tree is mutably borrowed for 'a, so this is the only reference to the value.
        (&n.key, unsafe { &mut *n.value.get() })
    }
}
impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let x = self.front?;
        self.len -= 1;
        self.front = self.tree.succ(x);
        Some(self.item(x))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}
impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let x = self.back?;
        self.len -= 1;
        self.back = self.tree.pred(x);
        Some(self.item(x))
    }
}
impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {
    fn len(&self) -> usize {
        self.len
    }
}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator returned by [`RbTree::range`].
pub struct Range<'a, K, V> {
    tree: &'a RbTree<K, V>,
    front: Option<usize>,
    end: Option<usize>,
}
impl<K, V> Clone for Range<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            end: self.end,
        }
    }
}
impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        let x = self.front.filter(|&x| Some(x) != self.end)?;
        self.front = self.tree.succ(x);
        let n = self.tree.node(x);
        Some((&n.key, n.value()))
    }
}
impl<K, V> FusedIterator for Range<'_, K, V> {}

/// Consuming iterator returned by [`RbTree::into_iter`].
pub struct IntoIter<K, V> {
    nodes: Slab<Node<K, V>>,
    order: std::vec::IntoIter<usize>,
}
impl<K, V> IntoIter<K, V> {
    fn new(tree: RbTree<K, V>) -> Self {
        let mut order = Vec::with_capacity(tree.len());
        let mut cur = tree.root.map(|r| tree.min_from(r));
        while let Some(x) = cur {
            order.push(x);
            cur = tree.succ(x);
        }
        Self {
            nodes: tree.nodes,
            order: order.into_iter(),
        }
    }
    fn take(&mut self, x: usize) -> (K, V) {
        let n = self.nodes.remove(x);
        (n.key, n.value.into_inner())
    }
}
impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    fn next(&mut self) -> Option<Self::Item> {
        let x = self.order.next()?;
        Some(self.take(x))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}
impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let x = self.order.next_back()?;
        Some(self.take(x))
    }
}
impl<K, V> ExactSizeIterator for IntoIter<K, V> {
    fn len(&self) -> usize {
        self.order.len()
    }
}
impl<K, V> FusedIterator for IntoIter<K, V> {}
