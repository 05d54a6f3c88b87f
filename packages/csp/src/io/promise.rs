// single-assignment promises.

use super::polling::{Timeout, wait};
use crate::{
    exec::Exec,
    error::{UsageError, WouldBlockError},
};
use std::{
    fmt::{self, Formatter, Debug},
    mem,
    sync::Arc,
    time::{Duration, Instant},
};
use parking_lot::Mutex;
use smallvec::SmallVec;


// callbacks stored inline before spilling to the heap. most promises have exactly one waiter.
const INLINE_CALLBACKS: usize = 2;

type Callback<T> = Box<dyn FnOnce(T) + Send + 'static>;


/// Single-assignment container for a value that may not exist yet
///
/// A promise is either pending or completed, and once completed its value never changes.
/// Callbacks registered while pending are submitted to the executor in registration order upon
/// completion. Callbacks registered after completion are submitted to the executor immediately.
/// Callbacks never run inline on the thread that delivers or registers.
///
/// Cloning a `Promise` clones a handle to the same promise.
pub struct Promise<T>(Arc<Shared<T>>);

struct Shared<T> {
    exec: Exec,
    state: Mutex<State<T>>,
}

enum State<T> {
    Pending(SmallVec<[Callback<T>; INLINE_CALLBACKS]>),
    Completed(T),
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Construct pending.
    pub fn new(exec: &Exec) -> Self {
        Promise(Arc::new(Shared {
            exec: exec.clone(),
            state: Mutex::new(State::Pending(SmallVec::new())),
        }))
    }

    /// Construct already completed with `value`.
    pub fn completed(exec: &Exec, value: T) -> Self {
        Promise(Arc::new(Shared {
            exec: exec.clone(),
            state: Mutex::new(State::Completed(value)),
        }))
    }

    /// The executor this promise submits callbacks to.
    pub fn exec(&self) -> &Exec {
        &self.0.exec
    }

    /// Complete the promise with `value`.
    ///
    /// Errors with [`UsageError::AlreadyDelivered`] if the promise is already completed, in which
    /// case the existing value is kept.
    pub fn deliver(&self, value: T) -> Result<(), UsageError> {
        let mut lock = self.0.state.lock();
        let callbacks = match mem::replace(&mut *lock, State::Completed(value.clone())) {
            State::Pending(callbacks) => callbacks,
            completed @ State::Completed(_) => {
                *lock = completed;
                return Err(UsageError::AlreadyDelivered);
            }
        };
        drop(lock);
        self.fire(callbacks, value);
        Ok(())
    }

    /// Try to complete the promise with `value`, returning whether this call is the one that
    /// completed it.
    ///
    /// Unlike [`deliver`](Self::deliver), losing the race to complete the promise is not an error.
    pub fn try_deliver(&self, value: T) -> bool {
        self.deliver(value).is_ok()
    }

    /// Register a callback to receive the value once the promise completes.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let mut lock = self.0.state.lock();
        let value = match &mut *lock {
            &mut State::Pending(ref mut callbacks) => {
                callbacks.push(Box::new(callback));
                return;
            }
            &mut State::Completed(ref value) => value.clone(),
        };
        drop(lock);
        self.0.exec.submit(move || callback(value));
    }

    /// Whether the promise has been completed.
    pub fn is_completed(&self) -> bool {
        matches!(&*self.0.state.lock(), &State::Completed(_))
    }

    /// Clone of the value if the promise has been completed.
    pub fn peek(&self) -> Option<T> {
        match &*self.0.state.lock() {
            &State::Completed(ref value) => Some(value.clone()),
            &State::Pending(_) => None,
        }
    }

    /// Block the calling thread until the promise completes.
    ///
    /// Must not be called from a callback running on this promise's executor, since the callback
    /// that would wake it might be queued behind it.
    pub fn block(&self) -> T {
        wait(self, Timeout::Never).expect("wait timed out with Timeout::Never")
    }

    /// Block the calling thread until the promise completes or a timeout elapses.
    pub fn block_timeout(&self, timeout: Duration) -> Result<T, WouldBlockError> {
        self.block_deadline(Instant::now() + timeout)
    }

    /// Block the calling thread until the promise completes or the deadline is reached.
    pub fn block_deadline(&self, deadline: Instant) -> Result<T, WouldBlockError> {
        wait(self, Timeout::At(deadline)).ok_or(WouldBlockError)
    }

    /// Get the value without blocking, or error if the promise is still pending.
    pub fn try_now(&self) -> Result<T, WouldBlockError> {
        wait(self, Timeout::NonBlocking).ok_or(WouldBlockError)
    }

    // submit callbacks in registration order, moving the value into the last one.
    fn fire(&self, callbacks: SmallVec<[Callback<T>; INLINE_CALLBACKS]>, value: T) {
        let mut callbacks = callbacks.into_iter();
        let Some(last) = callbacks.next_back() else { return };
        for callback in callbacks {
            let value = value.clone();
            self.0.exec.submit(move || callback(value));
        }
        self.0.exec.submit(move || last(value));
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise(Arc::clone(&self.0))
    }
}

impl<T: Debug> Debug for Promise<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &*self.0.state.lock() {
            &State::Pending(ref callbacks) => f
                .debug_struct("Promise")
                .field("pending_callbacks", &callbacks.len())
                .finish(),
            &State::Completed(ref value) => f
                .debug_struct("Promise")
                .field("value", value)
                .finish(),
        }
    }
}
