use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZero;

use drop_queue::DeferDrop;

use crate::{DrainablePool, PoolMap};

/// Builder for creating an instance of [`PoolMap`].
///
/// You only need to use this builder if you want a capacity-bounded map. The unbounded
/// configuration used by [`PoolMap::new()`][1] is sufficient otherwise.
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
///     .capacity_limit(nz!(4))
///     .build();
///
/// assert_eq!(map.limit(), Some(nz!(4)));
/// ```
///
/// [1]: PoolMap::new
#[must_use]
pub struct PoolMapBuilder<K, P>
where
    K: Clone + Eq + Hash,
    P: DrainablePool + 'static,
{
    dispatcher: Box<dyn DeferDrop>,
    limit: Option<NonZero<usize>>,

    _entries: PhantomData<(K, P)>,
}

impl<K, P> std::fmt::Debug for PoolMapBuilder<K, P>
where
    K: Clone + Eq + Hash,
    P: DrainablePool + 'static,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for the debug representation.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolMapBuilder")
            .field(
                "key_type",
                &std::format_args!("{}", std::any::type_name::<K>()),
            )
            .field(
                "pool_type",
                &std::format_args!("{}", std::any::type_name::<P>()),
            )
            .field("limit", &self.limit)
            .finish()
    }
}

impl<K, P> PoolMapBuilder<K, P>
where
    K: Clone + Eq + Hash,
    P: DrainablePool + 'static,
{
    pub(crate) fn new(dispatcher: Box<dyn DeferDrop>) -> Self {
        Self {
            dispatcher,
            limit: None,
            _entries: PhantomData,
        }
    }

    /// Caps the number of pools the map may own at once.
    ///
    /// When the cap is reached, admitting a new key requires evicting one idle pool;
    /// if every pool is busy, the admission is refused. Without a cap the map grows
    /// without bound.
    pub fn capacity_limit(mut self, limit: NonZero<usize>) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builds the pool map with the specified configuration.
    #[must_use]
    pub fn build(self) -> PoolMap<K, P> {
        PoolMap::new_inner(self.dispatcher, self.limit)
    }
}
