use std::{collections::TryReserveError, fmt, mem};

/// In debug mode or feature unsafe-optim not enabled, same as assert! otherwise does nothing.
#[cfg(any(debug_assertions, not(feature = "unsafe-optim")))]
macro_rules! safe_assert {
    ( $cond: expr ) => {
        assert!($cond)
    };
}

/// In debug mode or feature unsafe-optim not enabled, same as assert! otherwise does nothing.
#[cfg(all(not(debug_assertions), feature = "unsafe-optim"))]
macro_rules! safe_assert {
    ( $cond: expr ) => {};
}

enum Slot<T> {
    Full { gen: u64, value: T },
    Free { gen: u64, next: Option<usize> },
}

impl<T> Slot<T> {
    fn gen(&self) -> u64 {
        match self {
            Slot::Full { gen, .. } | Slot::Free { gen, .. } => *gen,
        }
    }
}

/// Arena of values addressed by stable index.
///
/// Freed slots are chained into a free list and reused by later inserts.
/// Every slot carries a generation which is bumped when the slot is freed,
/// so a stale `(index, generation)` pair can be told apart from the value
/// that later reuses the slot.
pub(crate) struct Slab<T> {
    slots: Vec<Slot<T>>,
    free: Option<usize>,
    len: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: None,
            len: 0,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(cap),
            free: None,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Make sure `additional` more values can be inserted without reallocating.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let spare = self.slots.len() - self.len;
        if additional > spare {
            self.slots.try_reserve(additional - spare)?;
        }
        Ok(())
    }

    /// Store value, returning its index and generation.
    pub fn insert(&mut self, value: T) -> (usize, u64) {
        match self.free {
            Some(ix) => {
                let gen = match self.slots[ix] {
                    Slot::Free { gen, next } => {
                        self.free = next;
                        gen
                    }
                    Slot::Full { .. } => unreachable!("free list points at occupied slot"),
                };
                self.slots[ix] = Slot::Full { gen, value };
                self.len += 1;
                (ix, gen)
            }
            None => {
                let ix = self.slots.len();
                self.slots.push(Slot::Full { gen: 0, value });
                self.len += 1;
                (ix, 0)
            }
        }
    }

    /// Same as insert, but reports allocation failure instead of aborting.
    pub fn try_insert(&mut self, value: T) -> Result<(usize, u64), TryReserveError> {
        if self.free.is_none() {
            self.slots.try_reserve(1)?;
        }
        Ok(self.insert(value))
    }

    /// Remove value at ix, freeing the slot.
    pub fn remove(&mut self, ix: usize) -> T {
        let gen = self.slots[ix].gen();
        let old = mem::replace(
            &mut self.slots[ix],
            Slot::Free {
                gen: gen + 1,
                next: self.free,
            },
        );
        match old {
            Slot::Full { value, .. } => {
                self.free = Some(ix);
                self.len -= 1;
                value
            }
            Slot::Free { .. } => panic!("slab slot {ix} removed twice"),
        }
    }

    /// Is the slot at ix occupied with generation gen?
    pub fn is_live(&self, ix: usize, gen: u64) -> bool {
        matches!(self.slots.get(ix), Some(Slot::Full { gen: g, .. }) if *g == gen)
    }

    #[inline]
    pub fn gen(&self, ix: usize) -> u64 {
        self.slots[ix].gen()
    }

    /// Get reference to the value at ix.
    #[inline]
    pub fn ix(&self, ix: usize) -> &T {
        safe_assert!(ix < self.slots.len());
        #[cfg(all(not(debug_assertions), feature = "unsafe-optim"))]
        let slot = unsafe { self.slots.get_unchecked(ix) };
        #[cfg(any(debug_assertions, not(feature = "unsafe-optim")))]
        let slot = &self.slots[ix];
        match slot {
            Slot::Full { value, .. } => value,
            Slot::Free { .. } => vacant(ix),
        }
    }

    /// Get mutable reference to the value at ix.
    #[inline]
    pub fn ixm(&mut self, ix: usize) -> &mut T {
        safe_assert!(ix < self.slots.len());
        #[cfg(all(not(debug_assertions), feature = "unsafe-optim"))]
        let slot = unsafe { self.slots.get_unchecked_mut(ix) };
        #[cfg(any(debug_assertions, not(feature = "unsafe-optim")))]
        let slot = &mut self.slots[ix];
        match slot {
            Slot::Full { value, .. } => value,
            Slot::Free { .. } => vacant(ix),
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free = None;
        self.len = 0;
    }

    pub fn shrink_to_fit(&mut self) {
        if self.len == 0 {
            self.clear();
        }
        self.slots.shrink_to_fit();
    }
}

#[cold]
#[inline(never)]
fn vacant(ix: usize) -> ! {
    panic!("slab slot {ix} is vacant")
}

impl<T> fmt::Debug for Slab<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().enumerate().filter_map(|(i, s)| match s {
                Slot::Full { value, .. } => Some((i, value)),
                Slot::Free { .. } => None,
            }))
            .finish()
    }
}
