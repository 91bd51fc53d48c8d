use std::cell::RefMut;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Exclusive reference to a pool owned by a [`PoolMap`].
///
/// Returned by [`get_or_create()`][1] and [`get()`][2]. Dereferences to the pool type.
///
/// The reference borrows the map's storage: while it is alive, every other map
/// operation is off-limits (calling one panics). Release the reference - typically by
/// letting it fall out of scope - before touching the map again. This is the
/// single-threaded analogue of the map's no-re-entry rule, enforced by the borrow
/// rather than by the debug-build flag.
///
/// [`PoolMap`]: crate::PoolMap
/// [1]: crate::PoolMap::get_or_create
/// [2]: crate::PoolMap::get
pub struct PoolRef<'m, P> {
    inner: RefMut<'m, P>,
}

impl<'m, P> PoolRef<'m, P> {
    pub(crate) fn new(inner: RefMut<'m, P>) -> Self {
        Self { inner }
    }
}

impl<P> Deref for PoolRef<'_, P> {
    type Target = P;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<P> DerefMut for PoolRef<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<P> fmt::Debug for PoolRef<'_, P>
where
    P: fmt::Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for the debug representation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PoolRef").field(&*self.inner).finish()
    }
}
