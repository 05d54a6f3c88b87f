// adapter for awaiting promises from async code.

use super::promise::Promise;
use std::{
    future::{Future, IntoFuture},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};
use parking_lot::Mutex;


/// Future which resolves to the value of a [`Promise`]
///
/// Does not depend on any particular async runtime. The promise's executor wakes the task through
/// an ordinary callback.
pub struct PromiseFut<T> {
    promise: Promise<T>,
    // registered with the promise on first pending poll. holds the most recent waker.
    waker: Option<Arc<Mutex<Option<Waker>>>>,
    terminated: bool,
}

impl<T: Clone + Send + 'static> Future for PromiseFut<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<T> {
        let this = self.get_mut();
        // for implementation of FusedFuture
        if this.terminated {
            return Poll::Pending;
        }
        if let Some(value) = this.promise.peek() {
            this.terminated = true;
            return Poll::Ready(value);
        }

        let slot = this.waker.get_or_insert_with(|| {
            let slot = Arc::new(Mutex::new(None::<Waker>));
            this.promise.on_complete({
                let slot = Arc::clone(&slot);
                move |_| {
                    if let Some(waker) = slot.lock().take() {
                        waker.wake();
                    }
                }
            });
            slot
        });
        *slot.lock() = Some(cx.waker().clone());

        // the promise may have completed before the waker was stored
        match this.promise.peek() {
            Some(value) => {
                this.terminated = true;
                Poll::Ready(value)
            }
            None => Poll::Pending,
        }
    }
}

impl<T> PromiseFut<T> {
    /// Whether this future has already resolved
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[cfg(feature = "futures")]
impl<T: Clone + Send + 'static> futures::future::FusedFuture for PromiseFut<T> {
    fn is_terminated(&self) -> bool {
        Self::is_terminated(self)
    }
}

impl<T: Clone + Send + 'static> IntoFuture for Promise<T> {
    type Output = T;
    type IntoFuture = PromiseFut<T>;

    fn into_future(self) -> PromiseFut<T> {
        PromiseFut { promise: self, waker: None, terminated: false }
    }
}
