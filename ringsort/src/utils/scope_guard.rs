use std::marker::PhantomData;

/// Runs a closure when it goes out of scope, unless disarmed first. Used to
/// undo partial setup when a later step fails.
pub(crate) struct ScopeGuard<'a, F: FnOnce()> {
    // `Option` so the closure runs at most once.
    closure: Option<F>,

    _p: PhantomData<&'a ()>,
}

impl<'a, F: FnOnce()> ScopeGuard<'a, F> {
    pub(crate) fn new(closure: F) -> Self {
        ScopeGuard {
            closure: Some(closure),
            _p: PhantomData,
        }
    }

    /// Setup succeeded, keep what was done.
    pub(crate) fn disarm(&mut self) {
        self.closure.take();
    }
}

impl<'a, F: FnOnce()> Drop for ScopeGuard<'a, F> {
    fn drop(&mut self) {
        if let Some(closure) = self.closure.take() {
            closure();
        }
    }
}
