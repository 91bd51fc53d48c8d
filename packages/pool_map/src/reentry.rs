use std::cell::Cell;

/// Detects re-entry into a single-threaded resource.
///
/// Public entry points take the flag for the duration of their stack frame via
/// [`enter()`][Self::enter]. Entering while the flag is already taken means a callback
/// fired from inside one operation has invoked another; that would invalidate the
/// iteration and ownership accounting of the caller, so debug builds panic immediately.
/// Release builds compile the check out.
#[derive(Debug, Default)]
pub(crate) struct ReentryFlag {
    entered: Cell<bool>,
}

impl ReentryFlag {
    pub(crate) const fn new() -> Self {
        Self {
            entered: Cell::new(false),
        }
    }

    /// Takes the flag for the scope of the returned guard.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the flag is already taken.
    pub(crate) fn enter(&self) -> ReentryGuard<'_> {
        let was_entered = self.entered.replace(true);
        debug_assert!(!was_entered, "A resource should only be entered once");

        ReentryGuard { flag: self }
    }
}

/// Releases the owning [`ReentryFlag`] when dropped, on every exit path including
/// unwinding.
pub(crate) struct ReentryGuard<'f> {
    flag: &'f ReentryFlag,
}

impl Drop for ReentryGuard<'_> {
    fn drop(&mut self) {
        self.flag.entered.set(false);
    }
}
