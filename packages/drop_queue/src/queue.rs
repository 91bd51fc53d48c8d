use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

/// Accepts ownership of objects whose destruction must be deferred until the current
/// dispatch turn has unwound.
///
/// This is the one capability a deferred-destruction collaborator must offer. Components
/// that need to destroy objects safely from deep inside a call stack depend on this
/// trait rather than on a concrete queue, so tests and embedders can substitute their
/// own implementation.
pub trait DeferDrop {
    /// Takes ownership of `object` and destroys it at some later point, after the
    /// calling stack frame has unwound.
    ///
    /// Implementations must not drop `object` synchronously within this call.
    fn defer_drop(&self, object: Box<dyn Any>);
}

/// A per-thread queue of objects awaiting deferred destruction.
///
/// This type is a cheaply cloneable handle; all clones refer to the same underlying
/// queue. The worker's event loop is expected to call [`flush()`][Self::flush] between
/// dispatch turns, destroying everything queued during the turn that just completed.
///
/// # Example
///
/// ```rust
/// use drop_queue::{DeferDrop, DropQueue};
///
/// let queue = DropQueue::new();
/// let handle = queue.clone();
///
/// handle.defer_drop(Box::new(vec![1_u8, 2, 3]));
///
/// // Both handles observe the same queue.
/// assert_eq!(queue.len(), 1);
///
/// queue.flush();
/// assert!(handle.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct DropQueue {
    /// Objects queued for destruction, in arrival order. Arrival order is also drop
    /// order, though nothing may rely on that.
    inner: Rc<RefCell<Vec<Box<dyn Any>>>>,
}

impl DropQueue {
    /// Creates a new, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects currently awaiting destruction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Returns whether no objects are awaiting destruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Destroys every queued object and returns how many were destroyed.
    ///
    /// A destructor may itself defer further objects to this queue. The flush keeps
    /// going until the queue is observed empty, so such cascades are fully drained
    /// within a single call.
    pub fn flush(&self) -> usize {
        let mut dropped = 0;

        loop {
            // Take the batch out before dropping anything. Destructors are allowed to
            // call `defer_drop` on this same queue, which needs the borrow released.
            let batch = mem::take(&mut *self.inner.borrow_mut());

            if batch.is_empty() {
                return dropped;
            }

            dropped += batch.len();
            drop(batch);
        }
    }
}

impl DeferDrop for DropQueue {
    fn defer_drop(&self, object: Box<dyn Any>) {
        self.inner.borrow_mut().push(object);
    }
}

impl fmt::Debug for DropQueue {
    #[cfg_attr(test, mutants::skip)] // No API contract for the debug representation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DropQueue");

        match self.inner.try_borrow() {
            Ok(queued) => s.field("len", &queued.len()),
            Err(_) => s.field("len", &"<borrowed>"),
        };

        s.finish()
    }
}
