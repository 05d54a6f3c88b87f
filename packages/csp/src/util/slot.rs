//! Hand-off cell for a single value.

use parking_lot::Mutex;


/// Like a shared `Option<T>` that is filled once and `take`n once.
pub(crate) struct Slot<T>(Mutex<Option<T>>);

impl<T> Slot<T> {
    /// Construct without a value.
    pub(crate) const fn empty() -> Self {
        Slot(Mutex::new(None))
    }

    /// Fill the slot.
    pub(crate) fn put(&self, val: T) {
        let prev = self.0.lock().replace(val);
        debug_assert!(prev.is_none(), "slot filled twice (internal bug)");
    }

    /// Try to take the value.
    pub(crate) fn take(&self) -> Option<T> {
        self.0.lock().take()
    }
}
