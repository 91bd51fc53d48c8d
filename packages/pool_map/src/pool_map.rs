use std::cell::{RefCell, RefMut};
use std::fmt;
use std::hash::Hash;
use std::num::NonZero;
use std::rc::Rc;

use drop_queue::DeferDrop;
use foldhash::{HashMap, HashMapExt};

use crate::reentry::ReentryFlag;
use crate::{DrainablePool, DrainedCallback, PoolMapBuilder, PoolRef};

/// A keyed container of lazily created connection pools.
///
/// For each unique key the map constructs a pool on first use via a caller-supplied
/// factory and owns it exclusively from then on; later lookups with an equal key return
/// the same pool. See the [package-level documentation][crate] for the full lifecycle
/// story (drain fan-out, drained fan-in, capacity-bounded admission, deferred
/// destruction).
///
/// # Capacity
///
/// An unbounded map ([`new()`][Self::new]) admits every key. A bounded map
/// ([`builder()`][Self::builder] + [`capacity_limit()`][PoolMapBuilder::capacity_limit])
/// admits a new key at the limit only by evicting one pool that reports no active
/// connections; if every pool is busy, [`get_or_create()`][Self::get_or_create] returns
/// `None` and the caller is expected to fall back (reject the request, retry later).
///
/// # Re-entry
///
/// No map operation may be invoked while another is still on the stack - in practice,
/// from a drained callback fired synchronously by a pool. Debug builds panic on
/// violation; pools are expected to deliver drained notifications asynchronously, from
/// the event loop.
///
/// # Example
///
/// ```rust
/// use drop_queue::DropQueue;
/// use pool_map::{DrainablePool, DrainedCallback, PoolMap};
/// #
/// # #[derive(Default)]
/// # struct HttpPool { drained: Vec<DrainedCallback> }
/// # impl DrainablePool for HttpPool {
/// #     fn has_active_connections(&self) -> bool { false }
/// #     fn drain_connections(&mut self) {}
/// #     fn add_drained_callback(&mut self, callback: DrainedCallback) {
/// #         self.drained.push(callback);
/// #     }
/// # }
///
/// let queue = DropQueue::new();
/// let map = PoolMap::<u32, HttpPool>::new(queue.clone());
///
/// let pool = map.get_or_create(1, HttpPool::default);
/// assert!(pool.is_some());
/// drop(pool);
///
/// assert_eq!(map.len(), 1);
/// ```
pub struct PoolMap<K, P>
where
    K: Clone + Eq + Hash,
    P: DrainablePool + 'static,
{
    /// Receives every pool this map stops owning. Pool destructors may interact with
    /// the event loop or with their own callback machinery, so they must never run
    /// synchronously inside a map operation.
    dispatcher: Box<dyn DeferDrop>,

    /// Maximum number of pools this map may own at once. `None` means unbounded.
    /// Checked only at admission time; a pool becoming active after admission never
    /// retroactively violates the bound.
    limit: Option<NonZero<usize>>,

    /// Entries and the drained-callback buffer, behind one cell so that public methods
    /// can take `&self` while mutating. Exactly one borrow is taken per operation.
    inner: RefCell<Inner<K, P>>,

    /// Trips in debug builds if a callback re-enters the map while an operation is
    /// still on the stack.
    entered: ReentryFlag,
}

struct Inner<K, P> {
    /// The owned pools. Iteration order is arbitrary but deterministic for a given
    /// map instance; the eviction scan relies only on that.
    pools: HashMap<K, P>,

    /// Every callback ever subscribed, in subscription order. Each is registered on
    /// every pool the map owns, present or future, exactly once per (callback, pool)
    /// pair.
    drained_callbacks: Vec<DrainedCallback>,
}

impl<K, P> PoolMap<K, P>
where
    K: Clone + Eq + Hash,
    P: DrainablePool + 'static,
{
    /// Creates an unbounded map that defers pool destruction to `dispatcher`.
    ///
    /// The dispatcher is typically a cheap cloneable handle such as
    /// [`drop_queue::DropQueue`]; it must remain operative for the map's lifetime.
    ///
    /// # Example
    ///
    /// ```rust
    /// use drop_queue::DropQueue;
    /// use pool_map::{DrainablePool, DrainedCallback, PoolMap};
    /// #
    /// # struct HttpPool;
    /// # impl DrainablePool for HttpPool {
    /// #     fn has_active_connections(&self) -> bool { false }
    /// #     fn drain_connections(&mut self) {}
    /// #     fn add_drained_callback(&mut self, _callback: DrainedCallback) {}
    /// # }
    ///
    /// let map = PoolMap::<u32, HttpPool>::new(DropQueue::new());
    ///
    /// assert!(map.is_empty());
    /// assert_eq!(map.limit(), None);
    /// ```
    #[must_use]
    pub fn new(dispatcher: impl DeferDrop + 'static) -> Self {
        Self::new_inner(Box::new(dispatcher), None)
    }

    /// Returns a builder for creating a map with custom configuration, in particular a
    /// capacity limit.
    ///
    /// # Example
    ///
    /// ```rust
    /// use drop_queue::DropQueue;
    /// use new_zealand::nz;
    /// use pool_map::{DrainablePool, DrainedCallback, PoolMap};
    /// #
    /// # struct HttpPool;
    /// # impl DrainablePool for HttpPool {
    /// #     fn has_active_connections(&self) -> bool { false }
    /// #     fn drain_connections(&mut self) {}
    /// #     fn add_drained_callback(&mut self, _callback: DrainedCallback) {}
    /// # }
    ///
    /// let map = PoolMap::<u32, HttpPool>::builder(DropQueue::new())
    ///     .capacity_limit(nz!(8))
    ///     .build();
    ///
    /// assert_eq!(map.limit(), Some(nz!(8)));
    /// ```
    pub fn builder(dispatcher: impl DeferDrop + 'static) -> PoolMapBuilder<K, P> {
        PoolMapBuilder::new(Box::new(dispatcher))
    }

    pub(crate) fn new_inner(
        dispatcher: Box<dyn DeferDrop>,
        limit: Option<NonZero<usize>>,
    ) -> Self {
        Self {
            dispatcher,
            limit,
            inner: RefCell::new(Inner {
                pools: HashMap::new(),
                drained_callbacks: Vec::new(),
            }),
            entered: ReentryFlag::new(),
        }
    }

    /// Returns the pool for `key`, creating it if absent.
    ///
    /// If `key` is already present, the existing pool is returned and `factory` is not
    /// invoked. Otherwise the map admits a new pool: at the capacity limit it first
    /// evicts one pool reporting no active connections (handing it to the dispatcher
    /// for deferred destruction), then invokes `factory` exactly once, registers every
    /// previously subscribed drained callback on the new pool in subscription order,
    /// and inserts it.
    ///
    /// Returns `None` only when the map is at its capacity limit and every pool is
    /// busy; the map is unchanged and `factory` is not invoked. A panicking `factory`
    /// propagates; nothing is inserted and the map remains usable.
    ///
    /// Release the returned [`PoolRef`] before calling any other map operation.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if invoked re-entrantly from a callback fired inside
    /// another operation of this map.
    ///
    /// # Example
    ///
    /// ```rust
    /// use drop_queue::DropQueue;
    /// use pool_map::{DrainablePool, DrainedCallback, PoolMap};
    /// #
    /// # #[derive(Default)]
    /// # struct HttpPool { drained: Vec<DrainedCallback> }
    /// # impl DrainablePool for HttpPool {
    /// #     fn has_active_connections(&self) -> bool { false }
    /// #     fn drain_connections(&mut self) {}
    /// #     fn add_drained_callback(&mut self, callback: DrainedCallback) {
    /// #         self.drained.push(callback);
    /// #     }
    /// # }
    ///
    /// let map = PoolMap::<u32, HttpPool>::new(DropQueue::new());
    ///
    /// let created = map.get_or_create(1, HttpPool::default);
    /// assert!(created.is_some());
    /// drop(created);
    ///
    /// // An equal key returns the same pool; this factory is never invoked.
    /// let existing = map.get_or_create(1, || unreachable!("key already present"));
    /// assert!(existing.is_some());
    /// ```
    #[must_use]
    pub fn get_or_create(
        &self,
        key: K,
        factory: impl FnOnce() -> P,
    ) -> Option<PoolRef<'_, P>> {
        let _entry = self.entered.enter();
        let mut inner = self.inner.borrow_mut();

        if !inner.pools.contains_key(&key) {
            if let Some(limit) = self.limit {
                if inner.pools.len() >= limit.get() && !self.evict_one_idle(&mut inner) {
                    tracing::debug!(
                        limit = limit.get(),
                        "pool limit reached with every pool active; admission refused"
                    );
                    return None;
                }
            }

            let mut pool = factory();

            for callback in &inner.drained_callbacks {
                pool.add_drained_callback(Rc::clone(callback));
            }

            tracing::trace!(pools = inner.pools.len() + 1, "created pool for new key");
            inner.pools.insert(key.clone(), pool);
        }

        Some(PoolRef::new(RefMut::map(inner, |inner| {
            inner
                .pools
                .get_mut(&key)
                .expect("entry was just found or inserted under this key")
        })))
    }

    /// Returns the pool for `key` if one exists, without creating anything.
    ///
    /// Release the returned [`PoolRef`] before calling any other map operation.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if invoked re-entrantly from a callback fired inside
    /// another operation of this map.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<PoolRef<'_, P>> {
        let _entry = self.entered.enter();
        let inner = self.inner.borrow_mut();

        RefMut::filter_map(inner, |inner| inner.pools.get_mut(key))
            .ok()
            .map(PoolRef::new)
    }

    /// Hands every owned pool to the dispatcher for deferred destruction and empties
    /// the map.
    ///
    /// This is a map-state reset, not a subscription reset: the drained-callback
    /// buffer is retained, and pools created afterwards still receive every previously
    /// subscribed callback. No-op on an empty map.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if invoked re-entrantly from a callback fired inside
    /// another operation of this map.
    ///
    /// # Example
    ///
    /// ```rust
    /// use drop_queue::DropQueue;
    /// use pool_map::{DrainablePool, DrainedCallback, PoolMap};
    /// #
    /// # #[derive(Default)]
    /// # struct HttpPool { drained: Vec<DrainedCallback> }
    /// # impl DrainablePool for HttpPool {
    /// #     fn has_active_connections(&self) -> bool { false }
    /// #     fn drain_connections(&mut self) {}
    /// #     fn add_drained_callback(&mut self, callback: DrainedCallback) {
    /// #         self.drained.push(callback);
    /// #     }
    /// # }
    ///
    /// let queue = DropQueue::new();
    /// let map = PoolMap::<u32, HttpPool>::new(queue.clone());
    ///
    /// drop(map.get_or_create(1, HttpPool::default));
    /// drop(map.get_or_create(2, HttpPool::default));
    ///
    /// map.clear();
    ///
    /// assert_eq!(map.len(), 0);
    /// assert_eq!(queue.len(), 2);
    /// ```
    pub fn clear(&self) {
        let _entry = self.entered.enter();
        let mut inner = self.inner.borrow_mut();

        let count = inner.pools.len();

        for (_, pool) in inner.pools.drain() {
            self.dispatcher.defer_drop(Box::new(pool));
        }

        if count > 0 {
            tracing::debug!(count, "cleared all pools");
        }
    }

    /// Requests that every owned pool drain its connections.
    ///
    /// Pure fan-out in iteration order; the map retains ownership of every pool and
    /// expects drained notifications to arrive asynchronously via the callbacks
    /// registered through [`add_drained_callback()`][Self::add_drained_callback].
    /// No-op when empty.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if invoked re-entrantly from a callback fired inside
    /// another operation of this map.
    pub fn drain_connections(&self) {
        let _entry = self.entered.enter();
        let mut inner = self.inner.borrow_mut();

        for pool in inner.pools.values_mut() {
            pool.drain_connections();
        }
    }

    /// Subscribes `callback` to drained notifications from every pool the map owns,
    /// present or future.
    ///
    /// The callback is registered on every currently owned pool before this method
    /// returns, so a subscriber that follows up with
    /// [`drain_connections()`][Self::drain_connections] is guaranteed its callback is
    /// live on every pool. Pools created later receive the callback at creation time.
    /// The callback fires once per pool that reaches the drained state; a subscriber
    /// observing N pools should expect up to N invocations.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if invoked re-entrantly from a callback fired inside
    /// another operation of this map.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::rc::Rc;
    ///
    /// use drop_queue::DropQueue;
    /// use pool_map::{DrainablePool, DrainedCallback, PoolMap};
    /// #
    /// # #[derive(Default)]
    /// # struct HttpPool { drained: Vec<DrainedCallback> }
    /// # impl DrainablePool for HttpPool {
    /// #     fn has_active_connections(&self) -> bool { false }
    /// #     fn drain_connections(&mut self) {}
    /// #     fn add_drained_callback(&mut self, callback: DrainedCallback) {
    /// #         self.drained.push(callback);
    /// #     }
    /// # }
    ///
    /// let map = PoolMap::<u32, HttpPool>::new(DropQueue::new());
    ///
    /// map.add_drained_callback(Rc::new(|| println!("a pool finished draining")));
    ///
    /// // Pools created from here on receive the callback as well.
    /// drop(map.get_or_create(1, HttpPool::default));
    /// ```
    pub fn add_drained_callback(&self, callback: DrainedCallback) {
        let _entry = self.entered.enter();
        let mut inner = self.inner.borrow_mut();

        for pool in inner.pools.values_mut() {
            pool.add_drained_callback(Rc::clone(&callback));
        }

        inner.drained_callbacks.push(callback);
    }

    /// Returns the number of pools the map currently owns.
    ///
    /// Pools handed to the dispatcher but not yet destroyed are not counted.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if invoked re-entrantly from a callback fired inside
    /// another operation of this map.
    #[must_use]
    pub fn len(&self) -> usize {
        let _entry = self.entered.enter();

        self.inner.borrow().pools.len()
    }

    /// Returns whether the map owns no pools.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if invoked re-entrantly from a callback fired inside
    /// another operation of this map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let _entry = self.entered.enter();

        self.inner.borrow().pools.is_empty()
    }

    /// Returns the capacity limit the map was configured with, if any.
    #[must_use]
    pub fn limit(&self) -> Option<NonZero<usize>> {
        self.limit
    }

    /// Evicts one pool that reports no active connections, handing it to the
    /// dispatcher for deferred destruction.
    ///
    /// Scans in the map's natural iteration order and stops at the first idle pool.
    /// Frees exactly one slot; over-eviction would discard pools that might be reused
    /// on the very next call. Returns whether a slot was freed.
    fn evict_one_idle(&self, inner: &mut Inner<K, P>) -> bool {
        let idle_key = inner
            .pools
            .iter()
            .find(|(_, pool)| !pool.has_active_connections())
            .map(|(key, _)| key.clone());

        let Some(key) = idle_key else {
            return false;
        };

        let pool = inner
            .pools
            .remove(&key)
            .expect("key was produced by scanning this map");
        self.dispatcher.defer_drop(Box::new(pool));

        tracing::debug!("evicted one idle pool to free a slot");

        true
    }
}

impl<K, P> Drop for PoolMap<K, P>
where
    K: Clone + Eq + Hash,
    P: DrainablePool + 'static,
{
    fn drop(&mut self) {
        // Destruction stays deferred even when the map itself goes away: a pool's
        // destructor must never run inside a map operation, and dropping the map may
        // itself happen deep inside a dispatch turn.
        let inner = self.inner.get_mut();

        for (_, pool) in inner.pools.drain() {
            self.dispatcher.defer_drop(Box::new(pool));
        }
    }
}

impl<K, P> fmt::Debug for PoolMap<K, P>
where
    K: Clone + Eq + Hash,
    P: DrainablePool + 'static,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for the debug representation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PoolMap");

        match self.inner.try_borrow() {
            Ok(inner) => s.field("pools", &inner.pools.len()),
            Err(_) => s.field("pools", &"<borrowed>"),
        };

        s.field("limit", &self.limit).finish_non_exhaustive()
    }
}
