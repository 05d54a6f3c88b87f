// blocking wait on a promise for threads outside of the executor.
//
// design based on the condvar signal of a blocking future poller, except that the promise tells
// us when it completes through a callback rather than through a waker.

use super::promise::Promise;
use std::{
    sync::Arc,
    time::Instant,
};
use parking_lot::{Condvar, Mutex};


// timeout for blocking on a promise.
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
    // time out if the promise is not already completed.
    NonBlocking,
}

// synchronization signal. the callback fills the slot and notifies.
struct Signal<T> {
    value: Mutex<Option<T>>,
    cond: Condvar,
}

// block until the promise completes or the timeout is reached, in which case return none.
pub(crate) fn wait<T>(promise: &Promise<T>, timeout: Timeout) -> Option<T>
where
    T: Clone + Send + 'static,
{
    // fast path, which is also the only path for non-blocking waits
    if let Some(value) = promise.peek() {
        return Some(value);
    }
    if let Timeout::NonBlocking = timeout {
        return None;
    }

    let signal = Arc::new(Signal { value: Mutex::new(None), cond: Condvar::new() });
    promise.on_complete({
        let signal = Arc::clone(&signal);
        move |value| {
            *signal.value.lock() = Some(value);
            signal.cond.notify_all();
        }
    });

    let mut lock = signal.value.lock();
    loop {
        if let Some(value) = lock.take() {
            return Some(value);
        }
        match &timeout {
            &Timeout::Never => signal.cond.wait(&mut lock),
            &Timeout::At(deadline) => {
                if signal.cond.wait_until(&mut lock, deadline).timed_out() {
                    // the callback may have raced the deadline
                    return lock.take();
                }
            }
            &Timeout::NonBlocking => unreachable!("non-blocking wait reached blocking loop"),
        }
    }
}
