use std::rc::Rc;

/// Zero-argument notification fired when a pool reaches the fully drained state.
///
/// Callbacks are cheaply cloneable function handles. A callback registered on a pool
/// fires at most once for that pool; the same callback registered on several pools
/// fires independently for each of them. Callbacks must not re-enter the [`PoolMap`]
/// that registered them while one of its operations is still on the stack.
///
/// [`PoolMap`]: crate::PoolMap
pub type DrainedCallback = Rc<dyn Fn()>;

/// The capability set a [`PoolMap`] requires of the pools it manages.
///
/// The map treats pools as opaque: it never inspects connections, protocols, or
/// endpoints. These three operations are the entire contract.
///
/// [`PoolMap`]: crate::PoolMap
pub trait DrainablePool {
    /// Returns whether the pool currently holds traffic-bearing state.
    ///
    /// This is a cheap, pure query. A pool reporting `false` is eligible for eviction
    /// when its map needs to free a slot; the map trusts the self-report and performs
    /// no connection accounting of its own.
    fn has_active_connections(&self) -> bool;

    /// Requests that the pool close idle connections and finish active ones.
    ///
    /// The request is idempotent: repeating it against an already draining pool has no
    /// additional effect.
    fn drain_connections(&mut self);

    /// Registers a notification to fire once the pool has no further active or pending
    /// connections.
    ///
    /// Each registered callback fires at most once. Pools are expected to deliver the
    /// notification asynchronously, from the event loop rather than from inside a map
    /// operation.
    fn add_drained_callback(&mut self, callback: DrainedCallback);
}

impl<P> DrainablePool for Box<P>
where
    P: DrainablePool + ?Sized,
{
    fn has_active_connections(&self) -> bool {
        (**self).has_active_connections()
    }

    fn drain_connections(&mut self) {
        (**self).drain_connections();
    }

    fn add_drained_callback(&mut self, callback: DrainedCallback) {
        (**self).add_drained_callback(callback);
    }
}
