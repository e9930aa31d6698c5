use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

/// Marker for a slot that has never held an entry.
///
/// All-zero bytes, so a freshly zeroed marker region is entirely empty.
const EMPTY: u32 = 0;

/// Marker for a slot whose entry was removed.
///
/// Distinct from `EMPTY` so a probe that walks past a deletion still reaches
/// later entries in the same cluster.
const TOMBSTONE: u32 = 1;

/// Capacity of the first allocation. Capacities are always powers of two so
/// the probe sequence can wrap with a mask instead of a modulo.
const INITIAL_CAPACITY: usize = 8;

/// Occupied-or-tombstoned slots allowed before the table grows: 75% of
/// capacity, computed in integer arithmetic. Exact for every power-of-two
/// capacity this table can have.
#[inline(always)]
fn max_load(capacity: usize) -> usize {
    (capacity >> 1) + (capacity >> 2)
}

/// Remaps raw hashes 0 and 1 to 2 and 3; marker values below 2 are reserved
/// for `EMPTY` and `TOMBSTONE`.
#[inline(always)]
fn adjust_hash(hash: u32) -> u32 {
    if hash < 2 { hash + 2 } else { hash }
}

#[inline(always)]
fn is_live(marker: u32) -> bool {
    marker != EMPTY && marker != TOMBSTONE
}

/// Hashes a byte slice with 32-bit FNV-1a.
///
/// A convenience for hand-written hash functions over raw key bytes: offset
/// basis `2166136261`, prime `16777619`, one XOR-then-multiply step per
/// byte, no finalization.
///
/// # Examples
///
/// ```rust
/// use probe_hash::hash_bytes;
///
/// assert_eq!(hash_bytes(b""), 0x811c9dc5);
/// assert_ne!(hash_bytes(b"main"), hash_bytes(b"mains"));
/// ```
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hash = 2166136261u32;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Hash function supplied when a table is constructed.
///
/// Implemented for every `Fn(&V) -> u32` closure, so most tables are built
/// straight from a closure pair; implement it by hand when the hasher
/// carries state of its own, such as a keyed hash builder.
///
/// Implementations must be deterministic and consistent with the table's
/// [`EntryEq`]: entries that compare equal must hash equally.
pub trait EntryHash<V> {
    /// Computes the 32-bit hash of an entry.
    fn hash_entry(&self, entry: &V) -> u32;
}

impl<V, F> EntryHash<V> for F
where
    F: Fn(&V) -> u32,
{
    fn hash_entry(&self, entry: &V) -> u32 {
        self(entry)
    }
}

/// Equality predicate supplied when a table is constructed.
///
/// Decides whether two entries identify the same key. Typically only a
/// designated subset of the entry's fields participates; the rest is
/// payload.
pub trait EntryEq<V> {
    /// Returns `true` when both entries identify the same key.
    fn eq_entry(&self, a: &V, b: &V) -> bool;
}

impl<V, F> EntryEq<V> for F
where
    F: Fn(&V, &V) -> bool,
{
    fn eq_entry(&self, a: &V, b: &V) -> bool {
        self(a, b)
    }
}

#[derive(Debug, Clone, Copy)]
struct DataLayout {
    layout: Layout,
    buckets_offset: usize,
    entries_offset: usize,
}

impl DataLayout {
    fn new<V>(capacity: usize) -> Self {
        let buckets_layout = Layout::array::<u32>(capacity).expect("allocation size overflow");
        let entries_layout =
            Layout::array::<MaybeUninit<V>>(capacity).expect("allocation size overflow");

        let (layout, buckets_offset) = Layout::new::<()>().extend(buckets_layout).unwrap();
        let (layout, entries_offset) = layout.extend(entries_layout).unwrap();

        DataLayout {
            layout,
            buckets_offset,
            entries_offset,
        }
    }
}

/// A hash table using open addressing with linear probing and tombstone
/// deletion.
///
/// `HashTable<V, H, E>` stores entries of type `V` by value. An entry is a
/// single record carrying both its key-identifying fields and its payload;
/// the hash function `H` and equality predicate `E` given at construction
/// decide which fields participate in identity. Lookups and removals take a
/// probe entry with the key fields populated; payload fields of the probe
/// are ignored.
///
/// The table keeps two index-aligned regions in one allocation: a `u32`
/// marker per slot (empty, tombstone, or the entry's hash) and the entry
/// storage itself. Collisions resolve by stepping to the next slot with
/// wraparound; removals leave tombstones so probe chains stay intact, and
/// the table doubles in capacity whenever occupied-or-tombstoned slots
/// would exceed 75% of capacity. Construction allocates nothing; the first
/// insertion allocates 8 slots.
///
/// Allocation failure aborts via [`handle_alloc_error`].
///
/// # Example
///
/// ```rust
/// use probe_hash::HashTable;
/// use probe_hash::hash_bytes;
///
/// #[derive(Debug, PartialEq)]
/// struct Symbol {
///     name: String,
///     address: u64,
/// }
///
/// let mut table = HashTable::new(
///     |s: &Symbol| hash_bytes(s.name.as_bytes()),
///     |a: &Symbol, b: &Symbol| a.name == b.name,
/// );
///
/// table.insert(Symbol {
///     name: "main".to_string(),
///     address: 0x4000,
/// });
///
/// let probe = Symbol {
///     name: "main".to_string(),
///     address: 0,
/// };
/// assert_eq!(table.find(&probe).map(|s| s.address), Some(0x4000));
/// ```
pub struct HashTable<V, H, E> {
    hash: H,
    equal: E,

    layout: DataLayout,
    alloc: NonNull<u8>,

    /// `capacity - 1` when allocated, 0 before the first growth.
    mask: usize,
    /// Slots that are not pristine empty, tombstones included. This is what
    /// the growth trigger watches, since tombstones consume probe budget.
    occupied: usize,
    /// Slots holding a live entry.
    populated: usize,

    _phantom: core::marker::PhantomData<V>,
}

impl<V, H, E> Debug for HashTable<V, H, E>
where
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<V, H, E> Clone for HashTable<V, H, E>
where
    V: Clone,
    H: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        let mut new_table = Self {
            hash: self.hash.clone(),
            equal: self.equal.clone(),
            layout: self.layout,
            alloc: NonNull::dangling(),
            mask: 0,
            occupied: 0,
            populated: 0,
            _phantom: core::marker::PhantomData,
        };

        if self.mask == 0 {
            return new_table;
        }

        // SAFETY: the source is allocated, so the shared layout has a
        // non-zero size. EMPTY is all-zero bytes.
        new_table.alloc = unsafe {
            let raw = alloc::alloc::alloc(self.layout.layout);
            if raw.is_null() {
                handle_alloc_error(self.layout.layout);
            }
            core::ptr::write_bytes(
                raw.add(self.layout.buckets_offset).cast::<u32>(),
                0,
                self.mask + 1,
            );
            NonNull::new_unchecked(raw)
        };
        new_table.mask = self.mask;

        // Live entries are re-placed from their stored hashes, exactly like
        // a rehash; tombstones are not carried over. The counters only ever
        // cover slots already written, so an unwinding clone drops just
        // those.
        for index in 0..=self.mask {
            // SAFETY: a live marker means the source slot is initialized;
            // probed indices stay masked into bounds, and the new table has
            // spare empty slots because it holds at most the source's live
            // entries.
            unsafe {
                let marker = *self.buckets_ptr().as_ref().get_unchecked(index);
                if !is_live(marker) {
                    continue;
                }
                let value = self
                    .entries_ptr()
                    .as_ref()
                    .get_unchecked(index)
                    .assume_init_ref()
                    .clone();

                let mut new_index = marker as usize & self.mask;
                while *new_table.buckets_ptr().as_ref().get_unchecked(new_index) != EMPTY {
                    new_index = (new_index + 1) & self.mask;
                }
                new_table
                    .entries_ptr()
                    .as_mut()
                    .get_unchecked_mut(new_index)
                    .write(value);
                *new_table
                    .buckets_ptr()
                    .as_mut()
                    .get_unchecked_mut(new_index) = marker;
                new_table.occupied += 1;
                new_table.populated += 1;
            }
        }

        debug_assert_eq!(new_table.populated, self.populated);

        new_table
    }
}

impl<V, H, E> Drop for HashTable<V, H, E> {
    fn drop(&mut self) {
        // SAFETY: live markers mean initialized entries, and the allocation
        // was made with `self.layout`.
        unsafe {
            if core::mem::needs_drop::<V>() && self.populated > 0 {
                for index in 0..=self.mask {
                    if is_live(*self.buckets_ptr().as_ref().get_unchecked(index)) {
                        self.entries_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            if self.layout.layout.size() != 0 {
                alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
            }
        }
    }
}

impl<V, H, E> HashTable<V, H, E>
where
    H: EntryHash<V>,
    E: EntryEq<V>,
{
    /// Creates an empty table with the given hash function and equality
    /// predicate.
    ///
    /// Nothing is allocated until the first insertion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// let table = HashTable::new(|&n: &u64| n as u32, |a: &u64, b: &u64| a == b);
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), 0);
    /// ```
    pub fn new(hash: H, equal: E) -> Self {
        Self {
            hash,
            equal,
            layout: DataLayout::new::<V>(0),
            alloc: NonNull::dangling(),
            mask: 0,
            occupied: 0,
            populated: 0,
            _phantom: core::marker::PhantomData,
        }
    }

    fn hash_of(&self, entry: &V) -> u32 {
        adjust_hash(self.hash.hash_entry(entry))
    }

    /// Returns a reference to the stored entry matching `probe`, if any.
    ///
    /// Only the key-identifying fields of `probe` matter; its payload
    /// fields are ignored. Never mutates the table, and a miss is a normal
    /// `None`, including on a table that has never allocated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// let mut table = HashTable::new(|&n: &u64| n as u32, |a: &u64, b: &u64| a == b);
    /// table.insert(7u64);
    /// assert_eq!(table.find(&7), Some(&7));
    /// assert_eq!(table.find(&8), None);
    /// ```
    pub fn find(&self, probe: &V) -> Option<&V> {
        if self.mask == 0 {
            return None;
        }
        let hash = self.hash_of(probe);
        let index = self.probe_slot(hash, |stored| self.equal.eq_entry(stored, probe));
        // SAFETY: `index` comes from `probe_slot` on the current state.
        unsafe { self.live_ref(index) }
    }

    /// Returns a mutable reference to the stored entry matching `probe`.
    ///
    /// The caller must not alter the entry's key-identifying fields through
    /// the returned reference; doing so strands the entry in a slot its
    /// hash no longer reaches.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Counter {
    ///     id: u32,
    ///     hits: u32,
    /// }
    ///
    /// let mut table = HashTable::new(
    ///     |c: &Counter| c.id,
    ///     |a: &Counter, b: &Counter| a.id == b.id,
    /// );
    /// table.insert(Counter { id: 1, hits: 0 });
    ///
    /// let probe = Counter { id: 1, hits: 0 };
    /// if let Some(counter) = table.find_mut(&probe) {
    ///     counter.hits += 1;
    /// }
    /// assert_eq!(table.find(&probe).map(|c| c.hits), Some(1));
    /// ```
    pub fn find_mut(&mut self, probe: &V) -> Option<&mut V> {
        if self.mask == 0 {
            return None;
        }
        let hash = self.hash_of(probe);
        let index = self.probe_slot(hash, |stored| self.equal.eq_entry(stored, probe));
        // SAFETY: `index` comes from `probe_slot` on the current state.
        unsafe { self.live_mut(index) }
    }

    /// Inserts an entry, replacing any stored entry with the same key.
    ///
    /// Returns the replaced entry, or `None` when the key was not present.
    /// On replacement the whole entry is overwritten, so non-key fields are
    /// last-write-wins. Growth, when needed, happens before the probe.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Pair {
    ///     key: u32,
    ///     value: i32,
    /// }
    ///
    /// let mut table = HashTable::new(
    ///     |p: &Pair| p.key,
    ///     |a: &Pair, b: &Pair| a.key == b.key,
    /// );
    ///
    /// assert_eq!(table.insert(Pair { key: 9, value: 1 }), None);
    /// assert_eq!(
    ///     table.insert(Pair { key: 9, value: 2 }),
    ///     Some(Pair { key: 9, value: 1 }),
    /// );
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn insert(&mut self, value: V) -> Option<V> {
        if self.occupied + 1 > max_load(self.capacity()) {
            self.grow();
        }

        let hash = self.hash_of(&value);
        let index = self.probe_slot(hash, |stored| self.equal.eq_entry(stored, &value));
        // SAFETY: `index` comes from `probe_slot`, and growth ran first so
        // claiming one more slot stays within the load budget.
        unsafe { self.store_slot(index, hash, value) }
    }

    /// Removes and returns the stored entry matching `probe`.
    ///
    /// The slot is tombstoned, not compacted: storage never shrinks, and
    /// the tombstone keeps later entries in the cluster reachable until the
    /// next growth discards it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// let mut table = HashTable::new(|&n: &u64| n as u32, |a: &u64, b: &u64| a == b);
    /// table.insert(3u64);
    /// assert_eq!(table.remove(&3), Some(3));
    /// assert_eq!(table.remove(&3), None);
    /// assert!(table.is_empty());
    /// ```
    pub fn remove(&mut self, probe: &V) -> Option<V> {
        if self.mask == 0 {
            return None;
        }
        let hash = self.hash_of(probe);
        let index = self.probe_slot(hash, |stored| self.equal.eq_entry(stored, probe));
        // SAFETY: `index` comes from `probe_slot` on the current state.
        unsafe { self.take_slot(index) }
    }
}

impl<V, H, E> HashTable<V, H, E> {
    /// Returns the number of live entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// let mut table = HashTable::new(|&n: &u64| n as u32, |a: &u64, b: &u64| a == b);
    /// assert_eq!(table.len(), 0);
    /// table.insert(1u64);
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of allocated slots: 0 before the first insertion,
    /// a power of two afterwards.
    ///
    /// At most 75% of the slots hold entries or tombstones at any time.
    pub fn capacity(&self) -> usize {
        if self.mask == 0 { 0 } else { self.mask + 1 }
    }

    /// Removes every entry while keeping the allocated capacity.
    ///
    /// A no-op on a table that has never allocated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// let mut table = HashTable::new(|&n: &u64| n as u32, |a: &u64, b: &u64| a == b);
    /// table.insert(1u64);
    /// let capacity = table.capacity();
    ///
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        if self.mask == 0 {
            return;
        }
        // SAFETY: live markers mean initialized entries; the marker region
        // holds `mask + 1` u32s.
        unsafe {
            if core::mem::needs_drop::<V>() && self.populated > 0 {
                for index in 0..=self.mask {
                    if is_live(*self.buckets_ptr().as_ref().get_unchecked(index)) {
                        self.entries_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }
            self.buckets_ptr().as_mut().fill(EMPTY);
        }
        self.occupied = 0;
        self.populated = 0;
    }

    /// Returns an iterator over the live entries in slot order.
    ///
    /// Slot order is unrelated to insertion order and changes when the
    /// table grows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::HashTable;
    ///
    /// let mut table = HashTable::new(|&n: &u64| n as u32, |a: &u64, b: &u64| a == b);
    /// table.insert(1u64);
    /// table.insert(2u64);
    ///
    /// let total: u64 = table.iter().sum();
    /// assert_eq!(total, 3);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        // SAFETY: the slices borrow `self`, which keeps the allocation
        // alive for their lifetime.
        unsafe {
            Iter {
                buckets: self.buckets_ptr().as_ref(),
                entries: self.entries_ptr().as_ref(),
                index: 0,
            }
        }
    }

    fn buckets_ptr(&self) -> NonNull<[u32]> {
        if self.mask == 0 {
            return NonNull::slice_from_raw_parts(NonNull::dangling(), 0);
        }
        // SAFETY: the table is allocated and the marker region holds
        // `mask + 1` u32s.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.buckets_offset).cast(),
                self.mask + 1,
            )
        }
    }

    fn entries_ptr(&self) -> NonNull<[MaybeUninit<V>]> {
        if self.mask == 0 {
            return NonNull::slice_from_raw_parts(NonNull::dangling(), 0);
        }
        // SAFETY: the table is allocated and the entry region holds
        // `mask + 1` slots.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.entries_offset).cast(),
                self.mask + 1,
            )
        }
    }

    /// Linear probe for `hash`, starting at `hash & mask` and stepping by
    /// one with wraparound. Returns the matching slot if `matches` accepts
    /// a stored entry with an equal hash; otherwise the first tombstone
    /// seen, or failing that the empty slot that ended the probe. Callers
    /// tell the cases apart by the marker at the returned slot.
    ///
    /// The load bound keeps at least one slot empty, so the probe always
    /// terminates.
    fn probe_slot(&self, hash: u32, matches: impl Fn(&V) -> bool) -> usize {
        debug_assert!(self.mask != 0, "probe on an unallocated table");
        debug_assert!(hash > TOMBSTONE);

        let mut index = hash as usize & self.mask;
        let mut tombstone = None;

        // SAFETY: indices stay masked into bounds, and a marker above
        // TOMBSTONE means the slot's entry is initialized.
        unsafe {
            let buckets = self.buckets_ptr();
            let entries = self.entries_ptr();
            loop {
                let marker = *buckets.as_ref().get_unchecked(index);
                if marker == EMPTY {
                    return tombstone.unwrap_or(index);
                }
                if marker == TOMBSTONE {
                    // remember the first tombstone, but keep probing: a
                    // match may sit later in the cluster
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                } else if marker == hash
                    && matches(entries.as_ref().get_unchecked(index).assume_init_ref())
                {
                    return index;
                }
                index = (index + 1) & self.mask;
            }
        }
    }

    /// # Safety
    ///
    /// `index` must come from `probe_slot` on the table in its current
    /// state.
    unsafe fn live_ref(&self, index: usize) -> Option<&V> {
        // SAFETY: per the contract, `index` is in bounds; a live marker
        // means the slot is initialized.
        unsafe {
            if is_live(*self.buckets_ptr().as_ref().get_unchecked(index)) {
                Some(
                    self.entries_ptr()
                        .as_ref()
                        .get_unchecked(index)
                        .assume_init_ref(),
                )
            } else {
                None
            }
        }
    }

    /// # Safety
    ///
    /// Same contract as [`Self::live_ref`].
    unsafe fn live_mut(&mut self, index: usize) -> Option<&mut V> {
        // SAFETY: per the contract, `index` is in bounds; a live marker
        // means the slot is initialized.
        unsafe {
            if is_live(*self.buckets_ptr().as_ref().get_unchecked(index)) {
                Some(
                    self.entries_ptr()
                        .as_mut()
                        .get_unchecked_mut(index)
                        .assume_init_mut(),
                )
            } else {
                None
            }
        }
    }

    /// # Safety
    ///
    /// Same contract as [`Self::live_ref`].
    unsafe fn take_slot(&mut self, index: usize) -> Option<V> {
        // SAFETY: per the contract, `index` is in bounds; a live marker
        // means the slot is initialized, and tombstoning it transfers the
        // entry to the caller.
        unsafe {
            if !is_live(*self.buckets_ptr().as_ref().get_unchecked(index)) {
                return None;
            }
            *self.buckets_ptr().as_mut().get_unchecked_mut(index) = TOMBSTONE;
            self.populated -= 1;
            Some(
                self.entries_ptr()
                    .as_ref()
                    .get_unchecked(index)
                    .assume_init_read(),
            )
        }
    }

    /// # Safety
    ///
    /// Same contract as [`Self::live_ref`], and when the slot is not
    /// already live the table must have spare load budget for one more
    /// occupied slot.
    unsafe fn store_slot(&mut self, index: usize, hash: u32, value: V) -> Option<V> {
        debug_assert!(hash > TOMBSTONE);
        // SAFETY: per the contract, `index` is in bounds; a live marker
        // means the old entry is initialized and is moved out before the
        // overwrite.
        unsafe {
            let marker = *self.buckets_ptr().as_ref().get_unchecked(index);
            let replaced = if is_live(marker) {
                Some(
                    self.entries_ptr()
                        .as_ref()
                        .get_unchecked(index)
                        .assume_init_read(),
                )
            } else {
                self.populated += 1;
                if marker == EMPTY {
                    self.occupied += 1;
                }
                None
            };
            *self.buckets_ptr().as_mut().get_unchecked_mut(index) = hash;
            self.entries_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .write(value);
            replaced
        }
    }

    /// Doubles the capacity (first allocation: 8 slots) and rehashes every
    /// live entry into the new storage, discarding tombstones.
    fn grow(&mut self) {
        let new_capacity = if self.mask == 0 {
            INITIAL_CAPACITY
        } else {
            (self.mask + 1) * 2
        };
        let new_mask = new_capacity - 1;
        let new_layout = DataLayout::new::<V>(new_capacity);

        // SAFETY: the layout covers at least INITIAL_CAPACITY markers, so
        // its size is non-zero. EMPTY is all-zero bytes.
        let new_alloc = unsafe {
            let raw = alloc::alloc::alloc(new_layout.layout);
            if raw.is_null() {
                handle_alloc_error(new_layout.layout);
            }
            core::ptr::write_bytes(
                raw.add(new_layout.buckets_offset).cast::<u32>(),
                0,
                new_capacity,
            );
            NonNull::new_unchecked(raw)
        };

        let mut reinserted = 0;
        if self.mask != 0 {
            // SAFETY: live markers mean initialized old slots whose entries
            // are moved, not copied; new indices stay masked into bounds,
            // and the new table has spare empty slots so the placement
            // probe terminates.
            unsafe {
                let old_buckets = self.buckets_ptr();
                let old_entries = self.entries_ptr();
                let new_buckets: *mut u32 =
                    new_alloc.as_ptr().add(new_layout.buckets_offset).cast();
                let new_entries: *mut MaybeUninit<V> =
                    new_alloc.as_ptr().add(new_layout.entries_offset).cast();

                for index in 0..=self.mask {
                    let marker = *old_buckets.as_ref().get_unchecked(index);
                    if !is_live(marker) {
                        continue;
                    }
                    // The stored hash decides the new probe start; the hash
                    // function is not re-run. The new table has no
                    // tombstones yet, so the first empty slot wins.
                    let mut new_index = marker as usize & new_mask;
                    while *new_buckets.add(new_index) != EMPTY {
                        new_index = (new_index + 1) & new_mask;
                    }
                    *new_buckets.add(new_index) = marker;
                    new_entries.add(new_index).write(MaybeUninit::new(
                        old_entries.as_ref().get_unchecked(index).assume_init_read(),
                    ));
                    reinserted += 1;
                }
            }
        }

        // SAFETY: the old allocation was made with `self.layout`; its live
        // entries were moved out above.
        unsafe {
            if self.layout.layout.size() != 0 {
                alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
            }
        }

        debug_assert_eq!(reinserted, self.populated);

        self.layout = new_layout;
        self.alloc = new_alloc;
        self.mask = new_mask;
        self.occupied = reinserted;
    }

    pub(crate) fn hash_fn(&self) -> &H {
        &self.hash
    }

    pub(crate) fn find_keyed(&self, hash: u32, matches: impl Fn(&V) -> bool) -> Option<&V> {
        if self.mask == 0 {
            return None;
        }
        let hash = adjust_hash(hash);
        let index = self.probe_slot(hash, matches);
        // SAFETY: `index` comes from `probe_slot` on the current state.
        unsafe { self.live_ref(index) }
    }

    pub(crate) fn find_keyed_mut(
        &mut self,
        hash: u32,
        matches: impl Fn(&V) -> bool,
    ) -> Option<&mut V> {
        if self.mask == 0 {
            return None;
        }
        let hash = adjust_hash(hash);
        let index = self.probe_slot(hash, matches);
        // SAFETY: `index` comes from `probe_slot` on the current state.
        unsafe { self.live_mut(index) }
    }

    pub(crate) fn remove_keyed(&mut self, hash: u32, matches: impl Fn(&V) -> bool) -> Option<V> {
        if self.mask == 0 {
            return None;
        }
        let hash = adjust_hash(hash);
        let index = self.probe_slot(hash, matches);
        // SAFETY: `index` comes from `probe_slot` on the current state.
        unsafe { self.take_slot(index) }
    }
}

/// An iterator over the live entries of a [`HashTable`] in slot order.
pub struct Iter<'a, V> {
    buckets: &'a [u32],
    entries: &'a [MaybeUninit<V>],
    index: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.buckets.len() {
            let index = self.index;
            self.index += 1;
            if is_live(self.buckets[index]) {
                // SAFETY: a live marker means the slot holds an entry that
                // stays initialized for the borrow's lifetime.
                return Some(unsafe { self.entries[index].assume_init_ref() });
            }
        }
        None
    }
}

impl<'a, V, H, E> IntoIterator for &'a HashTable<V, H, E> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
